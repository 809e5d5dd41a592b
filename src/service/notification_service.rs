use crate::config::init::AppState;
use crate::model::user::Caller;
use crate::types::{
    error_response::ErrorResponse,
    response::{Response, ResponseResult},
};
use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> ResponseResult {
    let items = state.notifier.list(caller.user_id, query.unread_only).await?;
    Ok(Response::from(items).into_response())
}

pub async fn unread_count(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ResponseResult {
    let count = state.notifier.unread_count(caller.user_id).await?;
    Ok(Response::from(crate::json_map!("count" => count)).into_response())
}

pub async fn mark_read(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ResponseResult {
    match state.notifier.mark_read(id, caller.user_id).await? {
        true => Ok(Response::from_msg("notification marked as read").into_response()),
        false => Err(ErrorResponse::not_found_with_str("notification not found")),
    }
}

pub async fn mark_all_read(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ResponseResult {
    let updated = state.notifier.mark_all_read(caller.user_id).await?;
    Ok(Response::new("all notifications marked as read", updated).into_response())
}

pub async fn delete(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> ResponseResult {
    match state.notifier.delete(id, caller.user_id).await? {
        true => Ok(Response::from_msg("notification deleted").into_response()),
        false => Err(ErrorResponse::not_found_with_str("notification not found")),
    }
}

pub async fn delete_read(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ResponseResult {
    let removed = state.notifier.delete_all_read(caller.user_id).await?;
    Ok(Response::new("read notifications deleted", removed).into_response())
}
