use std::{env, time::Duration};

use chrono::{FixedOffset, NaiveTime};

use crate::window::SubmissionWindow;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string (`DATABASE_URL`).
    pub database_url: Option<String>,
    /// Pool size (default: 5)
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection (default: 10)
    pub acquire_timeout_secs: u64,
    /// Team-local offset from UTC in minutes (default: 60, West Africa Time)
    pub utc_offset_minutes: i32,
    /// Window opening, local time (default: 09:30)
    pub window_start: NaiveTime,
    /// Window close, local time, inclusive (default: 12:30)
    pub window_end: NaiveTime,
    /// Reject submissions outside the window (default: true)
    pub enforce_window: bool,
    /// Extra attempts for an append that hit a transactional conflict (default: 3)
    pub append_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `DATABASE_URL`
    /// - `STANDUP_MAX_CONNECTIONS`
    /// - `STANDUP_ACQUIRE_TIMEOUT_SECS`
    /// - `STANDUP_UTC_OFFSET_MINUTES`
    /// - `STANDUP_WINDOW_START` / `STANDUP_WINDOW_END` (`HH:MM`)
    /// - `STANDUP_ENFORCE_WINDOW`
    /// - `STANDUP_APPEND_RETRIES`
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::defaults();
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            max_connections: parsed("STANDUP_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            acquire_timeout_secs: parsed("STANDUP_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or(defaults.acquire_timeout_secs),
            utc_offset_minutes: parsed("STANDUP_UTC_OFFSET_MINUTES")
                .filter(|m: &i32| FixedOffset::east_opt(m * 60).is_some())
                .unwrap_or(defaults.utc_offset_minutes),
            window_start: clock_time("STANDUP_WINDOW_START").unwrap_or(defaults.window_start),
            window_end: clock_time("STANDUP_WINDOW_END").unwrap_or(defaults.window_end),
            enforce_window: env::var("STANDUP_ENFORCE_WINDOW")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.enforce_window),
            append_retries: parsed("STANDUP_APPEND_RETRIES").unwrap_or(defaults.append_retries),
        }
    }

    pub fn defaults() -> Self {
        let window = SubmissionWindow::default();
        Self {
            database_url: None,
            max_connections: 5,
            acquire_timeout_secs: 10,
            utc_offset_minutes: 60,
            window_start: window.start,
            window_end: window.end,
            enforce_window: true,
            append_retries: 3,
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn window(&self) -> SubmissionWindow {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or(SubmissionWindow::default().offset);
        SubmissionWindow::new(self.window_start, self.window_end, offset)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn clock_time(key: &str) -> Option<NaiveTime> {
    env::var(key)
        .ok()
        .and_then(|v| NaiveTime::parse_from_str(v.trim(), "%H:%M").ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
