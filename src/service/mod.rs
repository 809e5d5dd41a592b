use crate::model::user::Caller;
use crate::types::error_response::ErrorResponse;
use axum::extract::Extension;

pub mod forms;
pub mod message_service;
pub mod module_service;
pub mod notification_service;
pub mod post_service;
pub mod subscription_service;
pub mod ticket_service;

/// The viewer of a public read, if the request carried a valid token.
pub fn viewer(caller: Option<Extension<Caller>>) -> Option<i64> {
    caller.map(|Extension(c)| c.user_id)
}

pub fn require_tutor(caller: &Caller) -> Result<(), ErrorResponse> {
    match caller.is_tutor() {
        true => Ok(()),
        false => Err(ErrorResponse::forbidden_with_str("tutor access required")),
    }
}

pub fn require_admin(caller: &Caller) -> Result<(), ErrorResponse> {
    match caller.is_admin() {
        true => Ok(()),
        false => Err(ErrorResponse::forbidden_with_str("admin access required")),
    }
}
