use super::forms::SubscribeForm;
use crate::config::init::AppState;
use crate::dao::subscription_dao::parse_target;
use crate::model::user::Caller;
use crate::types::response::{Response, ResponseResult};
use axum::{
    extract::{Extension, Json as AxumJson, Path},
    response::IntoResponse,
};
use std::sync::Arc;

pub async fn my_subscriptions(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ResponseResult {
    Ok(Response::from(state.subscriptions.list(caller.user_id).await?).into_response())
}

pub async fn my_subscriptions_by_type(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(kind): Path<i32>,
) -> ResponseResult {
    let kind = parse_target(kind, 0)?.kind();
    let subs = state.subscriptions.list_by_type(caller.user_id, kind).await?;
    Ok(Response::from(subs).into_response())
}

pub async fn check(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((kind, id)): Path<(i32, i64)>,
) -> ResponseResult {
    let target = parse_target(kind, id)?;
    let subscribed = state.subscriptions.is_subscribed(caller.user_id, target).await?;
    Ok(Response::from(crate::json_map!("is_subscribed" => subscribed)).into_response())
}

pub async fn subscribe(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AxumJson(form): AxumJson<SubscribeForm>,
) -> ResponseResult {
    let target = parse_target(form.subscribable_type, form.subscribable_id)?;
    let sub = state.subscriptions.subscribe(caller.user_id, target).await?;
    Ok(Response::new("subscribed", sub).into_response())
}

pub async fn unsubscribe(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((kind, id)): Path<(i32, i64)>,
) -> ResponseResult {
    let target = parse_target(kind, id)?;
    match state.subscriptions.unsubscribe(caller.user_id, target).await? {
        true => Ok(Response::from_msg("unsubscribed").into_response()),
        false => Err(crate::types::error_response::ErrorResponse::not_found_with_str(
            "subscription not found",
        )),
    }
}

pub async fn subscribers(
    Extension(state): Extension<Arc<AppState>>,
    Path((kind, id)): Path<(i32, i64)>,
) -> ResponseResult {
    let target = parse_target(kind, id)?;
    Ok(Response::from(state.subscriptions.subscribers(target).await?).into_response())
}
