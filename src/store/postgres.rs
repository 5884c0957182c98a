use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use sqlx::{PgPool, Postgres, Transaction};

use crate::clock::{Clock, IdSource, RandomIds, SystemClock};
use crate::error::{Result, StandupError};
use crate::models::{CachePut, NewReport, NewSummary, Report, Summary};

use super::{ReportStore, SummaryCache};

// First key of the two-key advisory lock taken per summary date ("SD").
const SUMMARY_LOCK_SPACE: i32 = 0x5344;

const REPORT_COLUMNS: &str = "id, author, report_date, submitted_at, prior_work, plan, \
     blockers, notes, raw_message, within_window, created_at";

/// Postgres-backed store over the `standup` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_sources(pool, Arc::new(SystemClock), Arc::new(RandomIds))
    }

    pub fn with_sources(pool: PgPool, clock: Arc<dyn Clock>, ids: Arc<dyn IdSource>) -> Self {
        Self { pool, clock, ids }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Serializes appends and cache writes for one date until the transaction
/// ends, so a summary write can never interleave with a report insert for
/// the same date.
async fn lock_summary_date(tx: &mut Transaction<'_, Postgres>, date: NaiveDate) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(SUMMARY_LOCK_SPACE)
        .bind(date.num_days_from_ce())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn count_reports(tx: &mut Transaction<'_, Postgres>, date: NaiveDate) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM standup.reports WHERE report_date = $1")
            .bind(date)
            .fetch_one(&mut **tx)
            .await?;
    Ok(count)
}

#[async_trait]
impl ReportStore for PgStore {
    async fn append(&self, report: NewReport) -> Result<Report> {
        report.validate()?;
        let report = report.into_report(self.ids.next_id(), self.clock.now());

        let mut tx = self.pool.begin().await?;
        lock_summary_date(&mut tx, report.report_date).await?;

        let inserted = sqlx::query_as::<_, Report>(&format!(
            r#"
            INSERT INTO standup.reports
            ({REPORT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (author, report_date) DO NOTHING
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(report.id)
        .bind(&report.author)
        .bind(report.report_date)
        .bind(report.submitted_at)
        .bind(&report.prior_work)
        .bind(&report.plan)
        .bind(&report.blockers)
        .bind(&report.notes)
        .bind(&report.raw_message)
        .bind(report.within_window)
        .bind(report.created_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(inserted) = inserted else {
            tx.rollback().await?;
            return Err(StandupError::DuplicateSubmission {
                author: report.author,
                date: report.report_date,
            });
        };

        let evicted = sqlx::query("DELETE FROM standup.daily_summaries WHERE summary_date = $1")
            .bind(inserted.report_date)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if evicted > 0 {
            tracing::debug!(date = %inserted.report_date, "evicted cached summary");
        }
        Ok(inserted)
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Report>> {
        let reports = sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM standup.reports \
             WHERE report_date = $1 ORDER BY submitted_at ASC, created_at ASC"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(reports)
    }

    async fn get(&self, author: &str, date: NaiveDate) -> Result<Report> {
        sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM standup.reports \
             WHERE author = $1 AND report_date = $2"
        ))
        .bind(author)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StandupError::not_found("report", format!("{author} on {date}")))
    }

    async fn count_for_date(&self, date: NaiveDate) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM standup.reports WHERE report_date = $1")
                .bind(date)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl SummaryCache for PgStore {
    async fn get_summary(&self, date: NaiveDate) -> Result<Summary> {
        sqlx::query_as::<_, Summary>(
            r#"
            SELECT id, summary_date, summary_text, report_count, generated_at, created_at
            FROM standup.daily_summaries
            WHERE summary_date = $1
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StandupError::not_found("summary", date.to_string()))
    }

    async fn put_summary(&self, summary: NewSummary) -> Result<CachePut> {
        let mut tx = self.pool.begin().await?;
        lock_summary_date(&mut tx, summary.summary_date).await?;

        let current = count_reports(&mut tx, summary.summary_date).await?;
        if i64::from(summary.report_count) < current {
            tx.rollback().await?;
            tracing::warn!(
                date = %summary.summary_date,
                summarized = summary.report_count,
                current,
                "discarding stale summary"
            );
            return Ok(CachePut::Discarded);
        }

        let stored = sqlx::query_as::<_, Summary>(
            r#"
            INSERT INTO standup.daily_summaries
            (id, summary_date, summary_text, report_count, generated_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (summary_date) DO UPDATE
            SET summary_text = EXCLUDED.summary_text,
                report_count = EXCLUDED.report_count,
                generated_at = EXCLUDED.generated_at
            RETURNING id, summary_date, summary_text, report_count, generated_at, created_at
            "#,
        )
        .bind(self.ids.next_id())
        .bind(summary.summary_date)
        .bind(&summary.summary_text)
        .bind(summary.report_count)
        .bind(summary.generated_at)
        .bind(self.clock.now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CachePut::Stored(stored))
    }

    async fn invalidate(&self, date: NaiveDate) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        lock_summary_date(&mut tx, date).await?;
        sqlx::query("DELETE FROM standup.daily_summaries WHERE summary_date = $1")
            .bind(date)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Need a reachable Postgres: `DATABASE_URL=... cargo test -- --ignored`.

    use super::*;
    use crate::clock::{FixedClock, SequentialIds};
    use crate::store::contract;

    fn store(pool: PgPool) -> PgStore {
        PgStore::with_sources(
            pool,
            Arc::new(FixedClock::new(contract::morning())),
            Arc::new(SequentialIds::default()),
        )
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn duplicate_submission_keeps_first_report(pool: PgPool) {
        contract::duplicate_submission_keeps_first_report(&store(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn padded_author_is_the_same_person(pool: PgPool) {
        contract::padded_author_is_the_same_person(&store(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn append_evicts_cached_summary(pool: PgPool) {
        contract::append_evicts_cached_summary(&store(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn list_is_in_submission_order(pool: PgPool) {
        contract::list_is_in_submission_order(&store(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn invalid_report_writes_nothing(pool: PgPool) {
        contract::invalid_report_writes_nothing(&store(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn put_replaces_and_keeps_one_row(pool: PgPool) {
        contract::put_replaces_and_keeps_one_row(&store(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn stale_put_is_discarded(pool: PgPool) {
        contract::stale_put_is_discarded(&store(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn invalidate_is_idempotent(pool: PgPool) {
        contract::invalidate_is_idempotent(&store(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn failed_append_rolls_back_eviction(pool: PgPool) {
        let store = store(pool);
        store
            .append(contract::report("alice", "ship X", contract::morning()))
            .await
            .unwrap();
        store
            .put_summary(contract::summary("alice ships X", 1))
            .await
            .unwrap();

        let err = store
            .append(contract::report("alice", "again", contract::morning()))
            .await
            .unwrap_err();
        assert!(matches!(err, StandupError::DuplicateSubmission { .. }));

        let cached = store.get_summary(contract::date()).await.unwrap();
        assert_eq!(cached.summary_text, "alice ships X");
    }
}
