//! # Sync Error Types
//!
//! Error types for replication, with the retryability classification the
//! per-table retry loop keys on.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering configuration, connection, and copy failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save the config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// Could not reach a database.
    #[error("Connection failed ({side}): {message}")]
    ConnectionFailed { side: &'static str, message: String },

    /// The database is locked or busy.
    #[error("Database busy: {0}")]
    Busy(String),

    // =========================================================================
    // Copy Errors
    // =========================================================================
    /// A table is missing on one side of the copy.
    #[error("Table {table} missing in {side} database")]
    TableMissing { table: String, side: &'static str },

    /// Local and remote schemas share no columns for a table.
    #[error("No matching columns for table {table}")]
    NoMatchingColumns { table: String },

    /// A row copy failed.
    #[error("Row copy failed for {table}: {message}")]
    RowCopyFailed { table: String, message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Local database layer error.
    #[error("Database error: {0}")]
    Database(String),

    /// Agent is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// A sync run is already in progress.
    #[error("Sync already in progress")]
    AlreadySyncing,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<quadtech_db::DbError> for SyncError {
    fn from(err: quadtech_db::DbError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        let message = err.to_string();
        // SQLite signals transient contention through these strings.
        if message.contains("database is locked") || message.contains("database table is locked") {
            return SyncError::Busy(message);
        }
        match err {
            sqlx::Error::Io(io) => SyncError::ConnectionFailed {
                side: "remote",
                message: io.to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => SyncError::ConnectionFailed {
                side: "remote",
                message,
            },
            _ => SyncError::Database(message),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// True when the operation may succeed on retry.
    ///
    /// Connection drops and lock contention are transient; schema and
    /// configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed { .. } | SyncError::Busy(_) | SyncError::RowCopyFailed { .. }
        )
    }

    /// True when the error points at the schema rather than the data.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            SyncError::TableMissing { .. } | SyncError::NoMatchingColumns { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed {
            side: "remote",
            message: "io error".into()
        }
        .is_retryable());
        assert!(SyncError::Busy("database is locked".into()).is_retryable());

        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::TableMissing {
            table: "products".into(),
            side: "remote"
        }
        .is_retryable());
    }

    #[test]
    fn test_locked_message_classified_busy() {
        let err: SyncError =
            sqlx::Error::Protocol("database is locked".to_string()).into();
        assert!(matches!(err, SyncError::Busy(_)));
    }

    #[test]
    fn test_schema_errors() {
        assert!(SyncError::NoMatchingColumns {
            table: "products".into()
        }
        .is_schema_error());
        assert!(!SyncError::Busy("x".into()).is_schema_error());
    }
}
