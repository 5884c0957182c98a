use std::fmt::Write;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};

use crate::error::Result;
use crate::models::{Report, Summary};

/// Turns the reports for one date into summary text.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    /// `reports` are in submission order and never empty.
    async fn generate(&self, date: NaiveDate, reports: &[Report]) -> Result<String>;
}

/// Deterministic markdown digest listing every author's update.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainSummaryGenerator;

#[async_trait]
impl SummaryGenerator for PlainSummaryGenerator {
    async fn generate(&self, date: NaiveDate, reports: &[Report]) -> Result<String> {
        Ok(build_summary(date, reports))
    }
}

pub fn build_summary(date: NaiveDate, reports: &[Report]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "**Team Updates - {}**", friendly_date(date));
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} team member{} submitted standups:",
        reports.len(),
        if reports.len() == 1 { "" } else { "s" }
    );

    for report in reports {
        let _ = writeln!(output);
        let _ = writeln!(output, "**{}:**", report.author);
        if let Some(prior) = &report.prior_work {
            let _ = writeln!(output, "- Yesterday: {prior}");
        }
        let _ = writeln!(output, "- Today: {}", report.plan);
        if let Some(blockers) = &report.blockers {
            let _ = writeln!(output, "- Blockers: {blockers}");
        }
        if let Some(notes) = &report.notes {
            let _ = writeln!(output, "- Notes: {notes}");
        }
    }

    let blocked: Vec<&str> = reports
        .iter()
        .filter(|r| r.blockers.is_some())
        .map(|r| r.author.as_str())
        .collect();
    if !blocked.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Blocked: {}", blocked.join(", "));
    }

    output
}

/// Header plus summary body, timestamps shown in team-local time.
pub fn render_digest(summary: &Summary, cached: bool, offset: FixedOffset) -> String {
    let mut output = String::new();
    let generated = summary.generated_at.with_timezone(&offset);

    let _ = writeln!(
        output,
        "# Daily Standup Summary - {}",
        friendly_date(summary.summary_date)
    );
    let _ = writeln!(
        output,
        "*{} {} | {} team members reported*",
        if cached { "Cached from" } else { "Generated at" },
        generated.format("%I:%M %p %:z"),
        summary.report_count
    );
    let _ = writeln!(output);
    output.push_str(&summary.summary_text);
    output
}

pub fn render_reports(date: NaiveDate, reports: &[Report], offset: FixedOffset) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Standups for {}", friendly_date(date));

    if reports.is_empty() {
        let _ = writeln!(output, "No standup reports found.");
        return output;
    }

    for report in reports {
        let submitted = report.submitted_at.with_timezone(&offset);
        let _ = writeln!(
            output,
            "- {} at {}{}: {}",
            report.author,
            submitted.format("%H:%M"),
            if report.within_window { "" } else { " (late)" },
            report.plan
        );
        if let Some(blockers) = &report.blockers {
            let _ = writeln!(output, "  blockers: {blockers}");
        }
    }
    output
}

pub fn friendly_date(date: NaiveDate) -> String {
    date.format("%A, %B %d, %Y").to_string()
}
