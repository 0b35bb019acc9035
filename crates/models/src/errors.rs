use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Db(String),
}

impl ModelError {
    /// Single classification point for sea-orm failures. Unique-key
    /// violations become `Conflict`; connection-level failures become
    /// `Unavailable`; everything else stays a generic `Db` error.
    pub fn from_db_err(e: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(msg)) = e.sql_err() {
            return ModelError::Conflict(msg);
        }
        match e {
            DbErr::Conn(err) => ModelError::Unavailable(err.to_string()),
            DbErr::ConnectionAcquire(err) => ModelError::Unavailable(err.to_string()),
            other => ModelError::Db(other.to_string()),
        }
    }
}

impl From<DbErr> for ModelError {
    fn from(e: DbErr) -> Self {
        ModelError::from_db_err(e)
    }
}
