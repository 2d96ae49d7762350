use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Record not found.
    #[error("Record not found: {context}")]
    NotFound { context: String },

    /// Invalid input data.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Batch fell back to per-record upserts and some members failed.
    #[error("Batch upsert failed: {succeeded} succeeded ({changed} changed), {failed} failed")]
    PartialFailure {
        succeeded: usize,
        failed: usize,
        changed: u64,
    },
}

impl RepositoryError {
    /// Create a NotFound error for a surrogate id lookup.
    pub fn not_found_by_id(id: Uuid) -> Self {
        Self::NotFound {
            context: format!("id={id}"),
        }
    }

    /// Create a NotFound error for a feed identity lookup.
    pub fn not_found_by_external_id(external_id: i64) -> Self {
        Self::NotFound {
            context: format!("external_id={external_id}"),
        }
    }

    /// Whether retrying the same operation might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RepositoryError::Database(db_err) => is_transient_db_error(db_err),
            _ => false,
        }
    }
}

fn is_transient_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            // SQLite: database is locked, busy
            // PostgreSQL: connection refused, too many connections
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection")
                || err_str.contains("temporarily unavailable")
        }
        _ => false,
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
