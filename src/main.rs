use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use standup_digest::config::Config;
use standup_digest::dates::parse_date_query;
use standup_digest::report::{render_digest, render_reports};
use standup_digest::{
    db, PgStore, PlainSummaryGenerator, ReportStore, Standup, StandupError, Submission,
    SubmissionWindow, SummaryLookup, WindowStatus,
};

#[derive(Parser)]
#[command(name = "standup-digest")]
#[command(about = "Daily standup reports with a cached per-day summary", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Append demo standups for today
    Seed,
    /// Append standups from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one standup
    Submit {
        #[arg(long, env = "STANDUP_AUTHOR")]
        author: String,
        /// What you are working on today
        #[arg(long)]
        plan: String,
        #[arg(long)]
        prior_work: Option<String>,
        #[arg(long)]
        blockers: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Original message text; defaults to the plan
        #[arg(long)]
        message: Option<String>,
        /// Date the standup is for, e.g. "today" or 2024-01-10
        #[arg(long)]
        date: Option<String>,
        /// Accept the submission outside the window (flagged as late)
        #[arg(long, env = "STANDUP_ALLOW_LATE")]
        allow_late: bool,
    },
    /// List standups for a date in submission order
    List {
        #[arg(long, default_value = "today")]
        date: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the summary for a date, generating and caching it on a miss
    Summary {
        #[arg(long, default_value = "today")]
        date: String,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the submission window status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "standup_digest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let window = config.window();

    if let Commands::Status = cli.command {
        print_status(&window);
        return Ok(());
    }

    let pool = db::connect(&config).await?;
    let standup = Standup::new(PgStore::new(pool), window)
        .enforce_window(config.enforce_window)
        .append_retries(config.append_retries);
    let today = standup.today();

    match cli.command {
        Commands::InitDb => {
            db::init_db(standup.store().pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let opens_at = today
                .and_time(window.start)
                .and_local_timezone(window.offset)
                .single()
                .context("window start is not a valid local time")?
                .with_timezone(&Utc);
            let stats = db::seed(standup.store(), today, opens_at).await?;
            println!(
                "Seeded {} standups for {today} ({} already present).",
                stats.inserted, stats.duplicates
            );
        }
        Commands::Import { csv } => {
            let stats = db::import_csv(standup.store(), &csv, &window).await?;
            println!(
                "Inserted {} standups from {} ({} duplicates skipped).",
                stats.inserted,
                csv.display(),
                stats.duplicates
            );
        }
        Commands::Submit {
            author,
            plan,
            prior_work,
            blockers,
            notes,
            message,
            date,
            allow_late,
        } => {
            let report_date = date
                .map(|query| resolve_date(&query, today))
                .transpose()?;
            let raw_message = message.unwrap_or_else(|| plan.clone());
            let submission = Submission {
                author,
                prior_work,
                plan,
                blockers,
                notes,
                raw_message,
                report_date,
            };

            let standup = standup.enforce_window(config.enforce_window && !allow_late);
            match standup.submit(submission).await {
                Ok(report) => {
                    println!(
                        "Recorded {}'s standup for {}{}.",
                        report.author,
                        report.report_date,
                        if report.within_window { "" } else { " (late)" }
                    );
                }
                Err(StandupError::DuplicateSubmission { author, date }) => {
                    println!(
                        "{author} already submitted a standup for {date}. \
                         Only one submission per person per day is accepted."
                    );
                }
                Err(StandupError::OutsideWindow(status)) => {
                    let (verb, at) = match status {
                        WindowStatus::Before => ("open", window.start),
                        _ => ("closed", window.end),
                    };
                    println!(
                        "Standup submissions {verb} at {} (UTC{}). Use --allow-late to record anyway.",
                        at.format("%H:%M"),
                        window.offset
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::List { date, json } => {
            let date = resolve_date(&date, today)?;
            let reports = standup.store().list_by_date(date).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                print!("{}", render_reports(date, &reports, window.offset));
            }
        }
        Commands::Summary { date, json, out } => {
            let date = resolve_date(&date, today)?;
            let rendered = match standup.summary(date, &PlainSummaryGenerator).await? {
                SummaryLookup::Empty => {
                    println!("No standup reports found for {date}.");
                    return Ok(());
                }
                SummaryLookup::Cached(summary) if json => serde_json::to_string_pretty(&summary)?,
                SummaryLookup::Generated { summary, .. } if json => {
                    serde_json::to_string_pretty(&summary)?
                }
                SummaryLookup::Cached(summary) => render_digest(&summary, true, window.offset),
                SummaryLookup::Generated { summary, .. } => {
                    render_digest(&summary, false, window.offset)
                }
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Summary written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Status => print_status(&window),
    }

    Ok(())
}

fn print_status(window: &SubmissionWindow) {
    let now = Utc::now();
    println!(
        "Window {} ({} - {}, UTC{}). Team-local date: {}.",
        window.status(now),
        window.start.format("%H:%M"),
        window.end.format("%H:%M"),
        window.offset,
        window.local_date(now)
    );
}

fn resolve_date(query: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    parse_date_query(query, today).with_context(|| format!("unrecognised date '{query}'"))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn submit_env(id: &str) -> Option<String> {
        let cli = Cli::command();
        let submit = cli.find_subcommand("submit")?;
        let arg = submit.get_arguments().find(|arg| arg.get_id() == id)?;
        arg.get_env().map(|env| env.to_string_lossy().into_owned())
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn submit_author_and_late_flag_read_the_environment() {
        assert_eq!(submit_env("author").as_deref(), Some("STANDUP_AUTHOR"));
        assert_eq!(submit_env("allow_late").as_deref(), Some("STANDUP_ALLOW_LATE"));
    }

    #[test]
    fn submit_flags_override_the_environment() {
        let cli = Cli::try_parse_from([
            "standup-digest",
            "submit",
            "--author",
            "alice",
            "--plan",
            "ship X",
            "--allow-late",
        ])
        .unwrap();
        let Commands::Submit { author, allow_late, .. } = cli.command else {
            panic!("expected the submit command");
        };
        assert_eq!(author, "alice");
        assert!(allow_late);
    }
}
