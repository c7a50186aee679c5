use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::reading::{NewReading, Reading, parse_datetime};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The engine could not be reached (connection, pool, transport).
    #[error("storage unavailable")]
    Unavailable(#[source] sqlx::Error),

    /// The engine refused the values (malformed date-time, constraint violation).
    #[error("storage rejected the reading")]
    Rejected(#[source] sqlx::Error),

    #[error("storage write failed")]
    WriteFailed(#[source] sqlx::Error),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Unavailable(_) => "storage_unavailable",
            StorageError::Rejected(_) => "storage_rejected",
            StorageError::WriteFailed(_) => "storage_write_failed",
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => StorageError::Unavailable(err),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // SQLSTATE class 22 (data exception) and 23 (integrity constraint violation).
                Some(code) if code.starts_with("22") || code.starts_with("23") => {
                    StorageError::Rejected(err)
                }
                // Class 08: connection exception.
                Some(code) if code.starts_with("08") => StorageError::Unavailable(err),
                _ => StorageError::WriteFailed(err),
            },
            _ => StorageError::WriteFailed(err),
        }
    }
}

/// Parses a reading's `datetime` before it reaches the engine.
///
/// Every store goes through this, so a value the engine would read as a
/// keyword (`infinity`, `now`) is rejected like any other malformed date-time.
pub fn parse_timestamp(reading: &NewReading) -> Result<NaiveDateTime, StorageError> {
    parse_datetime(&reading.datetime)
        .map_err(|err| StorageError::Rejected(sqlx::Error::Encode(Box::new(err))))
}

/// Append-only log of readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Creates the persistent structure if absent. Safe to call on every start.
    async fn ensure_schema(&self) -> Result<(), StorageError>;

    /// Appends a reading and returns it as stored, with its assigned id.
    async fn insert(&self, reading: &NewReading) -> Result<Reading, StorageError>;

    /// Most recent reading by `(timestamp, id)`, optionally restricted to one site.
    async fn latest(&self, site: Option<&str>) -> Result<Option<Reading>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::new_reading;
    use std::io;

    #[test]
    fn transport_failures_are_unavailable() {
        let err = StorageError::from(sqlx::Error::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        )));
        assert_eq!(err.code(), "storage_unavailable");

        assert_eq!(
            StorageError::from(sqlx::Error::PoolTimedOut).code(),
            "storage_unavailable"
        );
    }

    #[test]
    fn other_failures_are_write_failures() {
        assert_eq!(
            StorageError::from(sqlx::Error::RowNotFound).code(),
            "storage_write_failed"
        );
    }

    #[test]
    fn datetime_keywords_are_rejected_before_the_engine() {
        for datetime in ["infinity", "-infinity", "now", "yesterday", "epoch"] {
            let err = parse_timestamp(&new_reading(datetime, "Obs1")).unwrap_err();
            assert!(matches!(err, StorageError::Rejected(_)), "{datetime}: {err:?}");
            assert_eq!(err.code(), "storage_rejected");
        }

        assert!(parse_timestamp(&new_reading("2024-05-01 21:00:00", "Obs1")).is_ok());
    }

    #[test]
    fn display_hides_engine_detail() {
        let err = StorageError::from(sqlx::Error::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "db.internal:5432 refused",
        )));
        assert_eq!(err.to_string(), "storage unavailable");
    }
}
