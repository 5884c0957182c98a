use chrono::NaiveDate;
use thiserror::Error;

use crate::window::WindowStatus;

/// Errors raised by the report store, the summary cache, and the service on
/// top of them.
#[derive(Debug, Error)]
pub enum StandupError {
    #[error("invalid report: {0}")]
    Validation(String),

    #[error("{author} already submitted a standup for {date}")]
    DuplicateSubmission { author: String, date: NaiveDate },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("submission window is not open ({0})")]
    OutsideWindow(WindowStatus),

    #[error("summary generation failed: {0}")]
    Generation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StandupError>;

impl StandupError {
    pub(crate) fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        StandupError::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StandupError::NotFound { .. })
    }

    /// True for transactional conflicts and timeouts. The append unit is
    /// atomic, so these can be retried as a whole.
    pub fn is_retryable(&self) -> bool {
        match self {
            StandupError::Database(sqlx::Error::PoolTimedOut) => true,
            // serialization_failure, deadlock_detected, lock_not_available, query_canceled
            StandupError::Database(sqlx::Error::Database(db)) => db
                .code()
                .is_some_and(|code| matches!(&*code, "40001" | "40P01" | "55P03" | "57014")),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_submission_reads_as_already_submitted() {
        let err = StandupError::DuplicateSubmission {
            author: "alice".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "alice already submitted a standup for 2024-01-10"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn not_found_display_and_classification() {
        let err = StandupError::not_found("summary", "2024-01-10");
        assert_eq!(err.to_string(), "summary not found: 2024-01-10");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn pool_timeouts_are_retryable() {
        assert!(StandupError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!StandupError::Database(sqlx::Error::RowNotFound).is_retryable());
        assert!(!StandupError::Validation("plan".into()).is_retryable());
    }

    #[test]
    fn outside_window_mentions_status() {
        let err = StandupError::OutsideWindow(WindowStatus::After);
        assert_eq!(
            err.to_string(),
            "submission window is not open (closed for the day)"
        );
    }
}
