//! Report storage and the per-date summary cache.
//!
//! Both traits are implemented by the same backend type so that appending a
//! report and evicting the cached summary for its date commit together.
//!
//! - `PgStore`: Postgres, one transaction per append
//! - `MemoryStore`: in-process, one mutex section per append

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{CachePut, NewReport, NewSummary, Report, Summary};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Append-only log of standup reports, unique per (author, date).
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Validates and inserts a report, then evicts any cached summary for its
    /// date in the same unit of work.
    ///
    /// Fails with `DuplicateSubmission` when the author already has a report
    /// for that date; the existing report is left untouched.
    async fn append(&self, report: NewReport) -> Result<Report>;

    /// Reports for `date` ordered by `submitted_at` ascending.
    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Report>>;

    /// The report for (author, date), or `NotFound`.
    async fn get(&self, author: &str, date: NaiveDate) -> Result<Report>;

    async fn count_for_date(&self, date: NaiveDate) -> Result<i64>;
}

/// One cached summary per date.
#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// The cached summary for `date`, or `NotFound` on a miss. Never computes.
    async fn get_summary(&self, date: NaiveDate) -> Result<Summary>;

    /// Upserts the summary for its date unless a report landed after it was
    /// generated (its `report_count` is below the current count), in which
    /// case nothing is written and `CachePut::Discarded` is returned.
    async fn put_summary(&self, summary: NewSummary) -> Result<CachePut>;

    /// Deletes the summary for `date`; no-op when absent. `append` already
    /// does this for its own date.
    async fn invalidate(&self, date: NaiveDate) -> Result<()>;
}

/// A backend providing both halves of the contract.
pub trait StandupStore: ReportStore + SummaryCache {}

impl<T: ReportStore + SummaryCache> StandupStore for T {}
