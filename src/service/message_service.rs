use super::forms::{check, SendMessageForm};
use crate::config::init::AppState;
use crate::model::user::Caller;
use crate::types::{
    error_response::ErrorResponse,
    response::{Response, ResponseResult},
};
use axum::{
    extract::{Extension, Json as AxumJson, Path},
    response::IntoResponse,
};
use std::sync::Arc;

pub async fn conversations(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ResponseResult {
    Ok(Response::from(state.messages.conversations(caller.user_id).await?).into_response())
}

pub async fn with_user(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(other_id): Path<i64>,
) -> ResponseResult {
    let thread = state.messages.with_user(caller.user_id, other_id).await?;
    Ok(Response::from(thread).into_response())
}

pub async fn send(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    AxumJson(form): AxumJson<SendMessageForm>,
) -> ResponseResult {
    check(&form)?;
    let msg = state
        .messages
        .send(caller.user_id, form.recipient_id, form.content.as_str(), form.material_id)
        .await?;
    Ok(Response::new("message sent", msg).into_response())
}

pub async fn mark_read(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(message_id): Path<i64>,
) -> ResponseResult {
    match state.messages.mark_read(message_id, caller.user_id).await? {
        true => Ok(Response::from_msg("message marked as read").into_response()),
        false => Err(ErrorResponse::not_found_with_str("message not found")),
    }
}

pub async fn unread_count(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ResponseResult {
    let count = state.messages.unread_count(caller.user_id).await?;
    Ok(Response::from(crate::json_map!("count" => count)).into_response())
}
