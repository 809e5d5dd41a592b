use super::error::{Error, ErrorType};
use super::response::Response;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response as AxumResponse},
};

use std::fmt::{Debug, Display, Formatter};

#[derive(Debug)]
pub struct ErrorResponse {
    status: StatusCode,
    info: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> AxumResponse {
        let mut resp = Response::from_msg(self.info.as_str()).into_response();
        *resp.status_mut() = self.status;
        resp
    }
}

impl Display for ErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl From<Error> for ErrorResponse {
    fn from(e: Error) -> Self {
        match e.error_type {
            ErrorType::Unauthorized => ErrorResponse::unauthorized_with_str(e.error.as_str()),
            ErrorType::Forbidden => ErrorResponse::forbidden_with_str(e.error.as_str()),
            ErrorType::NotFound => ErrorResponse::not_found_with_str(e.error.as_str()),
            ErrorType::BadRequest | ErrorType::Conflict(_) => {
                ErrorResponse::bad_request_with_str(e.error.as_str())
            }
            ErrorType::SystemError => {
                tracing::error!("request failed: {}", e.error);
                ErrorResponse::server_error_default()
            }
        }
    }
}

impl ErrorResponse {
    pub fn from(status: StatusCode, info: String) -> Self {
        Self { status, info }
    }
    pub fn status(&self) -> StatusCode {
        self.status
    }
    pub fn not_found_with_str(err: &str) -> Self {
        ErrorResponse::from(StatusCode::NOT_FOUND, err.to_string())
    }
    pub fn server_error_default() -> Self {
        ErrorResponse::from(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    }
    pub fn forbidden_with_str(err: &str) -> Self {
        ErrorResponse::from(StatusCode::FORBIDDEN, err.to_string())
    }
    pub fn unauthorized_default() -> Self {
        ErrorResponse::from(StatusCode::UNAUTHORIZED, "Not logged in".to_string())
    }
    pub fn unauthorized_with_str(err: &str) -> Self {
        ErrorResponse::from(StatusCode::UNAUTHORIZED, err.to_string())
    }
    pub fn bad_request_with_str(err: &str) -> Self {
        ErrorResponse::from(StatusCode::BAD_REQUEST, err.to_string())
    }
}
