use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::StandupError;
use crate::models::NewReport;
use crate::store::ReportStore;

pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Outcome of a bulk append.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Appends a few demo standups for `date`, starting at `opens_at`.
pub async fn seed<S: ReportStore>(
    store: &S,
    date: NaiveDate,
    opens_at: DateTime<Utc>,
) -> anyhow::Result<ImportStats> {
    let standups = [
        (
            "Avery Lee",
            Some("Finished the onboarding checklist"),
            "Pair with Jules on the export job",
            None,
        ),
        (
            "Jules Moreno",
            None,
            "Fix flaky retry test in the sync worker",
            Some("Staging database is down"),
        ),
        (
            "Kiara Patel",
            Some("Reviewed three PRs"),
            "Draft the Q3 roadmap notes",
            None,
        ),
    ];

    let mut stats = ImportStats::default();
    for (minutes, (author, prior, plan, blockers)) in (0i64..).step_by(7).zip(standups) {
        let raw_message = format!(
            "Hi, I'm {author}. {}Today I'll {plan}.{}",
            prior.map(|p| format!("Yesterday: {p}. ")).unwrap_or_default(),
            blockers.map(|b| format!(" Blocked by: {b}.")).unwrap_or_default(),
        );
        let report = NewReport {
            author: author.to_string(),
            report_date: date,
            submitted_at: opens_at + Duration::minutes(minutes),
            prior_work: prior.map(str::to_string),
            plan: plan.to_string(),
            blockers: blockers.map(str::to_string),
            notes: None,
            raw_message,
            within_window: true,
        };
        tally(&mut stats, store.append(report).await)?;
    }

    Ok(stats)
}

pub async fn import_csv<S: ReportStore>(
    store: &S,
    csv_path: &std::path::Path,
    window: &crate::window::SubmissionWindow,
) -> anyhow::Result<ImportStats> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        author: String,
        report_date: NaiveDate,
        submitted_at: DateTime<Utc>,
        plan: String,
        prior_work: Option<String>,
        blockers: Option<String>,
        notes: Option<String>,
        raw_message: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut stats = ImportStats::default();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad CSV row {}", line + 2))?;
        let raw_message = row.raw_message.unwrap_or_else(|| row.plan.clone());
        let report = NewReport {
            within_window: window.contains(row.submitted_at),
            author: row.author,
            report_date: row.report_date,
            submitted_at: row.submitted_at,
            prior_work: row.prior_work,
            plan: row.plan,
            blockers: row.blockers,
            notes: row.notes,
            raw_message,
        };
        tally(&mut stats, store.append(report).await)
            .with_context(|| format!("failed to import CSV row {}", line + 2))?;
    }

    Ok(stats)
}

fn tally<T>(stats: &mut ImportStats, result: crate::Result<T>) -> anyhow::Result<()> {
    match result {
        Ok(_) => stats.inserted += 1,
        Err(StandupError::DuplicateSubmission { author, date }) => {
            tracing::info!(%author, %date, "skipping duplicate submission");
            stats.duplicates += 1;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
