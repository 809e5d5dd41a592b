use std::fmt::{Display, Formatter};
use thiserror::Error as ThisError;

/// Why a claim or respond call was refused. Each one is a distinct answer for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketConflict {
    /// Claim on a ticket another tutor already holds.
    AlreadyClaimed,
    /// Claim on a ticket that has been answered.
    AlreadyAnswered,
    /// Respond on a ticket nobody has claimed yet.
    NotClaimed,
    /// Respond on a ticket claimed by a different tutor.
    ClaimedByAnother,
}

impl Display for TicketConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketConflict::AlreadyClaimed => write!(f, "ticket is already claimed by another tutor"),
            TicketConflict::AlreadyAnswered => write!(f, "ticket has already been answered"),
            TicketConflict::NotClaimed => write!(f, "you must claim this ticket before responding"),
            TicketConflict::ClaimedByAnother => write!(f, "ticket is claimed by another tutor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Unauthorized,
    Forbidden,
    NotFound,
    BadRequest,
    Conflict(TicketConflict),
    SystemError,
}

impl Display for ErrorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorType::Unauthorized => write!(f, "Unauthorized"),
            ErrorType::Forbidden => write!(f, "Forbidden"),
            ErrorType::NotFound => write!(f, "Not Found"),
            ErrorType::BadRequest => write!(f, "Bad Request"),
            ErrorType::Conflict(_) => write!(f, "Conflict"),
            ErrorType::SystemError => write!(f, "SystemError"),
        }
    }
}

#[derive(Debug, ThisError)]
#[error("{error_type} : {error}")]
pub struct Error {
    pub error_type: ErrorType,
    pub error: String,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(error_type: ErrorType, error: &str) -> Self {
        Self {
            error_type,
            error: error.to_string(),
        }
    }
    pub fn unauthorized(error: &str) -> Self {
        Self::new(ErrorType::Unauthorized, error)
    }
    pub fn forbidden(error: &str) -> Self {
        Self::new(ErrorType::Forbidden, error)
    }
    pub fn not_found(error: &str) -> Self {
        Self::new(ErrorType::NotFound, error)
    }
    pub fn bad_request(error: &str) -> Self {
        Self::new(ErrorType::BadRequest, error)
    }
    pub fn conflict(conflict: TicketConflict) -> Self {
        Self::new(ErrorType::Conflict(conflict), conflict.to_string().as_str())
    }
    pub fn system_error(error: &str) -> Self {
        Self::new(ErrorType::SystemError, error)
    }

    pub fn is_not_found(&self) -> bool {
        self.error_type == ErrorType::NotFound
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(e: tokio_postgres::Error) -> Self {
        Error::system_error(e.to_string().as_str())
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        Error::system_error(format!("postgres pool: {}", e).as_str())
    }
}

impl From<mobc_redis::redis::RedisError> for Error {
    fn from(e: mobc_redis::redis::RedisError) -> Self {
        Error::system_error(format!("redis: {}", e).as_str())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::system_error(format!("json: {}", e).as_str())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::system_error(e.to_string().as_str())
    }
}
