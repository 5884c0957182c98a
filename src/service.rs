use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StandupError};
use crate::models::{CachePut, NewReport, NewSummary, Report, Summary};
use crate::report::SummaryGenerator;
use crate::store::StandupStore;
use crate::window::{SubmissionWindow, WindowStatus};

/// A standup as it arrives from a submission source, before the service
/// stamps it with time, date and window information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    pub author: String,
    pub prior_work: Option<String>,
    pub plan: String,
    pub blockers: Option<String>,
    pub notes: Option<String>,
    pub raw_message: String,
    /// Overrides the team-local date derived from the submission time.
    pub report_date: Option<NaiveDate>,
}

/// How a summary request was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryLookup {
    Cached(Summary),
    /// Freshly generated. `stored` is false when a report landed while
    /// generating and the cache write was discarded.
    Generated { summary: Summary, stored: bool },
    /// No reports for the date; nothing is cached.
    Empty,
}

/// Submission and read-through summary flow over a store.
pub struct Standup<S> {
    store: S,
    window: SubmissionWindow,
    clock: Arc<dyn Clock>,
    enforce_window: bool,
    append_retries: u32,
}

impl<S: StandupStore> Standup<S> {
    pub fn new(store: S, window: SubmissionWindow) -> Self {
        Self {
            store,
            window,
            clock: Arc::new(SystemClock),
            enforce_window: true,
            append_retries: 3,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn enforce_window(mut self, enforce: bool) -> Self {
        self.enforce_window = enforce;
        self
    }

    pub fn append_retries(mut self, retries: u32) -> Self {
        self.append_retries = retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn window(&self) -> &SubmissionWindow {
        &self.window
    }

    pub fn today(&self) -> NaiveDate {
        self.window.local_date(self.clock.now())
    }

    pub async fn has_submitted(&self, author: &str, date: NaiveDate) -> Result<bool> {
        match self.store.get(author, date).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Records a standup. The append unit is retried as a whole on
    /// transactional conflicts; duplicates and invalid input are not.
    pub async fn submit(&self, submission: Submission) -> Result<Report> {
        let now = self.clock.now();
        let status = self.window.status(now);
        let within_window = status == WindowStatus::During;
        if self.enforce_window && !within_window {
            return Err(StandupError::OutsideWindow(status));
        }

        let report = NewReport {
            author: submission.author.trim().to_string(),
            report_date: submission
                .report_date
                .unwrap_or_else(|| self.window.local_date(now)),
            submitted_at: now,
            prior_work: submission.prior_work,
            plan: submission.plan,
            blockers: submission.blockers,
            notes: submission.notes,
            raw_message: submission.raw_message,
            within_window,
        };

        let mut attempt = 0;
        loop {
            match self.store.append(report.clone()).await {
                Ok(saved) => {
                    tracing::info!(
                        author = %saved.author,
                        date = %saved.report_date,
                        within_window = saved.within_window,
                        "standup recorded"
                    );
                    return Ok(saved);
                }
                Err(err) if err.is_retryable() && attempt < self.append_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "append conflicted, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Cache hit, or generate from the day's reports and repopulate.
    pub async fn summary(
        &self,
        date: NaiveDate,
        generator: &dyn SummaryGenerator,
    ) -> Result<SummaryLookup> {
        match self.store.get_summary(date).await {
            Ok(summary) => {
                tracing::debug!(%date, "summary cache hit");
                return Ok(SummaryLookup::Cached(summary));
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(%date, "summary cache miss");
            }
            Err(err) => return Err(err),
        }

        let reports = self.store.list_by_date(date).await?;
        if reports.is_empty() {
            return Ok(SummaryLookup::Empty);
        }

        let text = generator.generate(date, &reports).await?;
        let report_count = i32::try_from(reports.len())
            .map_err(|_| StandupError::Generation("too many reports for one day".into()))?;
        let generated = NewSummary {
            summary_date: date,
            summary_text: text,
            report_count,
            generated_at: self.clock.now(),
        };

        match self.store.put_summary(generated.clone()).await? {
            CachePut::Stored(summary) => Ok(SummaryLookup::Generated {
                summary,
                stored: true,
            }),
            CachePut::Discarded => Ok(SummaryLookup::Generated {
                summary: Summary {
                    id: uuid::Uuid::nil(),
                    summary_date: generated.summary_date,
                    summary_text: generated.summary_text,
                    report_count: generated.report_count,
                    generated_at: generated.generated_at,
                    created_at: generated.generated_at,
                },
                stored: false,
            }),
        }
    }
}
