use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, StandupError};

/// A row from `standup.reports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub author: String,
    pub report_date: NaiveDate,
    pub submitted_at: DateTime<Utc>,
    pub prior_work: Option<String>,
    pub plan: String,
    pub blockers: Option<String>,
    pub notes: Option<String>,
    pub raw_message: String,
    pub within_window: bool,
    pub created_at: DateTime<Utc>,
}

/// Everything a caller supplies to append a report. Identity and
/// `created_at` are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
    pub author: String,
    pub report_date: NaiveDate,
    pub submitted_at: DateTime<Utc>,
    pub prior_work: Option<String>,
    pub plan: String,
    pub blockers: Option<String>,
    pub notes: Option<String>,
    pub raw_message: String,
    pub within_window: bool,
}

impl NewReport {
    /// Rejects blank required fields. Runs before any write.
    pub fn validate(&self) -> Result<()> {
        if self.author.trim().is_empty() {
            return Err(StandupError::Validation("author must not be empty".into()));
        }
        if self.plan.trim().is_empty() {
            return Err(StandupError::Validation(
                "current-period plan must not be empty".into(),
            ));
        }
        if self.raw_message.trim().is_empty() {
            return Err(StandupError::Validation(
                "raw message must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn into_report(self, id: Uuid, created_at: DateTime<Utc>) -> Report {
        Report {
            id,
            author: self.author.trim().to_string(),
            report_date: self.report_date,
            submitted_at: self.submitted_at,
            prior_work: non_blank(self.prior_work),
            plan: self.plan,
            blockers: non_blank(self.blockers),
            notes: non_blank(self.notes),
            raw_message: self.raw_message,
            within_window: self.within_window,
            created_at,
        }
    }
}

/// A row from `standup.daily_summaries`: the cached aggregate for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Summary {
    pub id: Uuid,
    pub summary_date: NaiveDate,
    pub summary_text: String,
    pub report_count: i32,
    pub generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Output of a summary generator, ready to be cached.
#[derive(Debug, Clone)]
pub struct NewSummary {
    pub summary_date: NaiveDate,
    pub summary_text: String,
    pub report_count: i32,
    pub generated_at: DateTime<Utc>,
}

/// Result of `SummaryCache::put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePut {
    Stored(Summary),
    /// A report landed after the summary was generated; nothing was written.
    Discarded,
}

/// Optional text fields arrive from parsers as empty strings just as often as
/// absent ones.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(author: &str, plan: &str, raw: &str) -> NewReport {
        NewReport {
            author: author.to_string(),
            report_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            submitted_at: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
            prior_work: Some("".to_string()),
            plan: plan.to_string(),
            blockers: Some("waiting on review".to_string()),
            notes: None,
            raw_message: raw.to_string(),
            within_window: true,
        }
    }

    #[test]
    fn validation_requires_plan_author_and_message() {
        assert!(sample("alice", "ship X", "raw").validate().is_ok());
        assert!(matches!(
            sample("alice", "   ", "raw").validate(),
            Err(StandupError::Validation(_))
        ));
        assert!(matches!(
            sample("", "ship X", "raw").validate(),
            Err(StandupError::Validation(_))
        ));
        assert!(matches!(
            sample("alice", "ship X", "").validate(),
            Err(StandupError::Validation(_))
        ));
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 1).unwrap();
        let report = sample("alice", "ship X", "raw").into_report(Uuid::nil(), created);
        assert_eq!(report.prior_work, None);
        assert_eq!(report.blockers.as_deref(), Some("waiting on review"));
        assert_eq!(report.created_at, created);
    }

    #[test]
    fn author_is_stored_trimmed() {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 1).unwrap();
        let report = sample("  alice\t", "ship X", "raw").into_report(Uuid::nil(), created);
        assert_eq!(report.author, "alice");
    }
}
