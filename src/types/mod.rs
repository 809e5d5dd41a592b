pub mod error;
pub mod error_response;
pub mod response;
