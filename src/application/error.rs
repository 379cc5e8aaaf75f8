use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid credentials")]
    InvalidCredentials { remaining_attempts: Option<u32> },

    #[error("user not found")]
    UserNotFound,

    #[error("account locked for {remaining_minutes} more minute(s)")]
    AccountLocked { remaining_minutes: i64 },

    #[error("ip address is blocked")]
    IpBlocked,

    #[error("storage is full ({percent:.1}% used)")]
    StorageFull { percent: f64 },

    #[error("insufficient capacity: {available_bytes} bytes available, {requested_bytes} requested")]
    InsufficientCapacity {
        available_bytes: u64,
        requested_bytes: u64,
    },

    #[error("uploads are locked: {reason}")]
    UploadLocked { reason: String },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("persistence error: {0}")]
    PersistenceError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}
