use super::forms::{CreatePostForm, UpdatePostForm};
use super::{require_admin, require_tutor, viewer};
use crate::config::init::AppState;
use crate::dao::store::PostFilter;
use crate::model::{post::PostKind, user::Caller};
use crate::types::response::{Response, ResponseResult};
use axum::{
    extract::{Extension, Json as AxumJson, Path, Query},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

pub async fn list_posts(
    Extension(state): Extension<Arc<AppState>>,
    caller: Option<Extension<Caller>>,
) -> ResponseResult {
    let posts = state.posts.list(PostFilter::TopLevel, viewer(caller)).await?;
    Ok(Response::from(posts).into_response())
}

pub async fn get_post(
    Extension(state): Extension<Arc<AppState>>,
    caller: Option<Extension<Caller>>,
    Path(post_id): Path<i64>,
) -> ResponseResult {
    Ok(Response::from(state.posts.get(post_id, viewer(caller)).await?).into_response())
}

pub async fn get_comments(
    Extension(state): Extension<Arc<AppState>>,
    caller: Option<Extension<Caller>>,
    Path(post_id): Path<i64>,
) -> ResponseResult {
    let comments = state
        .posts
        .list(PostFilter::CommentsOf(post_id), viewer(caller))
        .await?;
    Ok(Response::from(comments).into_response())
}

pub async fn posts_of_user(
    Extension(state): Extension<Arc<AppState>>,
    caller: Option<Extension<Caller>>,
    Path(user_id): Path<i64>,
) -> ResponseResult {
    let posts = state.posts.list(PostFilter::PostsBy(user_id), viewer(caller)).await?;
    Ok(Response::from(posts).into_response())
}

pub async fn comments_of_user(
    Extension(state): Extension<Arc<AppState>>,
    caller: Option<Extension<Caller>>,
    Path(user_id): Path<i64>,
) -> ResponseResult {
    let posts = state
        .posts
        .list(PostFilter::CommentsBy(user_id), viewer(caller))
        .await?;
    Ok(Response::from(posts).into_response())
}

pub async fn posts_in_module(
    Extension(state): Extension<Arc<AppState>>,
    caller: Option<Extension<Caller>>,
    Path(module_id): Path<i64>,
) -> ResponseResult {
    state.catalog.module(module_id).await?;
    let posts = state
        .posts
        .list(PostFilter::InModule(module_id), viewer(caller))
        .await?;
    Ok(Response::from(posts).into_response())
}

pub async fn liked_posts(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ResponseResult {
    let posts = state
        .posts
        .list(PostFilter::LikedBy(caller.user_id), Some(caller.user_id))
        .await?;
    Ok(Response::from(posts).into_response())
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn search_posts(
    Extension(state): Extension<Arc<AppState>>,
    caller: Option<Extension<Caller>>,
    Query(query): Query<SearchQuery>,
) -> ResponseResult {
    let posts = state.posts.search(query.q.as_str(), viewer(caller)).await?;
    Ok(Response::from(posts).into_response())
}

pub async fn create_post(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AxumJson(form): AxumJson<CreatePostForm>,
) -> ResponseResult {
    let new = form.into_new_post()?;
    if new.kind() == PostKind::Topic {
        require_tutor(&caller)?;
    }
    let post = state.posts.create(caller.user_id, new).await?;
    let view = state.posts.get(post.post_id, Some(caller.user_id)).await?;
    Ok(Response::new("post created", view).into_response())
}

pub async fn update_post(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(post_id): Path<i64>,
    AxumJson(form): AxumJson<UpdatePostForm>,
) -> ResponseResult {
    super::forms::check(&form)?;
    let view = state
        .posts
        .update(post_id, caller.user_id, form.title, form.content)
        .await?;
    Ok(Response::new("post updated", view).into_response())
}

pub async fn delete_post(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(post_id): Path<i64>,
) -> ResponseResult {
    require_admin(&caller)?;
    state.posts.delete(post_id).await?;
    Ok(Response::from_msg("post deleted").into_response())
}

pub async fn toggle_like(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(post_id): Path<i64>,
) -> ResponseResult {
    let liked = state.posts.toggle_like(post_id, caller.user_id).await?;
    Ok(Response::from(crate::json_map!("liked" => liked)).into_response())
}
