use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::clock::{Clock, IdSource, RandomIds, SystemClock};
use crate::error::{Result, StandupError};
use crate::models::{CachePut, NewReport, NewSummary, Report, Summary};

use super::{ReportStore, SummaryCache};

#[derive(Debug, Default)]
struct Tables {
    reports: HashMap<(String, NaiveDate), Report>,
    summaries: HashMap<NaiveDate, Summary>,
}

impl Tables {
    fn count_for(&self, date: NaiveDate) -> usize {
        self.reports.keys().filter(|(_, d)| *d == date).count()
    }
}

/// In-process store. Every operation runs under one lock, which plays the
/// part of a serializable transaction.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_sources(Arc::new(SystemClock), Arc::new(RandomIds))
    }

    pub fn with_sources(clock: Arc<dyn Clock>, ids: Arc<dyn IdSource>) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            clock,
            ids,
        }
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn append(&self, report: NewReport) -> Result<Report> {
        report.validate()?;

        let mut tables = self.tables.lock().await;
        let key = (report.author.trim().to_string(), report.report_date);
        if tables.reports.contains_key(&key) {
            return Err(StandupError::DuplicateSubmission {
                author: key.0,
                date: key.1,
            });
        }

        let report = report.into_report(self.ids.next_id(), self.clock.now());
        tables.reports.insert(key, report.clone());
        if tables.summaries.remove(&report.report_date).is_some() {
            tracing::debug!(date = %report.report_date, "evicted cached summary");
        }
        Ok(report)
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Report>> {
        let tables = self.tables.lock().await;
        let mut reports: Vec<Report> = tables
            .reports
            .values()
            .filter(|r| r.report_date == date)
            .cloned()
            .collect();
        reports.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(reports)
    }

    async fn get(&self, author: &str, date: NaiveDate) -> Result<Report> {
        let tables = self.tables.lock().await;
        tables
            .reports
            .get(&(author.to_string(), date))
            .cloned()
            .ok_or_else(|| StandupError::not_found("report", format!("{author} on {date}")))
    }

    async fn count_for_date(&self, date: NaiveDate) -> Result<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.count_for(date) as i64)
    }
}

#[async_trait]
impl SummaryCache for MemoryStore {
    async fn get_summary(&self, date: NaiveDate) -> Result<Summary> {
        let tables = self.tables.lock().await;
        tables
            .summaries
            .get(&date)
            .cloned()
            .ok_or_else(|| StandupError::not_found("summary", date.to_string()))
    }

    async fn put_summary(&self, summary: NewSummary) -> Result<CachePut> {
        let mut tables = self.tables.lock().await;
        let current = tables.count_for(summary.summary_date) as i64;
        if i64::from(summary.report_count) < current {
            tracing::warn!(
                date = %summary.summary_date,
                summarized = summary.report_count,
                current,
                "discarding stale summary"
            );
            return Ok(CachePut::Discarded);
        }

        let (id, created_at) = match tables.summaries.get(&summary.summary_date) {
            Some(existing) => (existing.id, existing.created_at),
            None => (self.ids.next_id(), self.clock.now()),
        };
        let stored = Summary {
            id,
            summary_date: summary.summary_date,
            summary_text: summary.summary_text,
            report_count: summary.report_count,
            generated_at: summary.generated_at,
            created_at,
        };
        tables.summaries.insert(stored.summary_date, stored.clone());
        Ok(CachePut::Stored(stored))
    }

    async fn invalidate(&self, date: NaiveDate) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.summaries.remove(&date);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SequentialIds};
    use crate::store::contract;
    use uuid::Uuid;

    fn store() -> MemoryStore {
        MemoryStore::with_sources(
            Arc::new(FixedClock::new(contract::morning())),
            Arc::new(SequentialIds::default()),
        )
    }

    #[tokio::test]
    async fn duplicate_submission_keeps_first_report() {
        contract::duplicate_submission_keeps_first_report(&store()).await;
    }

    #[tokio::test]
    async fn padded_author_is_the_same_person() {
        contract::padded_author_is_the_same_person(&store()).await;
    }

    #[tokio::test]
    async fn append_evicts_cached_summary() {
        contract::append_evicts_cached_summary(&store()).await;
    }

    #[tokio::test]
    async fn list_is_in_submission_order() {
        contract::list_is_in_submission_order(&store()).await;
    }

    #[tokio::test]
    async fn invalid_report_writes_nothing() {
        contract::invalid_report_writes_nothing(&store()).await;
    }

    #[tokio::test]
    async fn put_replaces_and_keeps_one_row() {
        contract::put_replaces_and_keeps_one_row(&store()).await;
    }

    #[tokio::test]
    async fn stale_put_is_discarded() {
        contract::stale_put_is_discarded(&store()).await;
    }

    #[tokio::test]
    async fn invalidate_is_idempotent() {
        contract::invalidate_is_idempotent(&store()).await;
    }

    #[tokio::test]
    async fn identity_and_creation_time_come_from_injected_sources() {
        let store = store();
        let report = store
            .append(contract::report("alice", "ship X", contract::morning()))
            .await
            .unwrap();
        assert_eq!(report.id, Uuid::from_u128(1));
        assert_eq!(report.created_at, contract::morning());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_admit_exactly_one() {
        let store = store();
        let mut handles = Vec::new();
        for attempt in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append(contract::report(
                        "alice",
                        &format!("attempt {attempt}"),
                        contract::morning(),
                    ))
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(err) => assert!(matches!(err, StandupError::DuplicateSubmission { .. })),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(store.count_for_date(contract::date()).await.unwrap(), 1);
    }
}
