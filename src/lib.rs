//! Daily standup reports with a per-date summary cache that is evicted in the
//! same unit of work as every report append.

pub mod clock;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod service;
pub mod store;
pub mod window;

pub use error::{Result, StandupError};
pub use models::{CachePut, NewReport, NewSummary, Report, Summary};
pub use report::{PlainSummaryGenerator, SummaryGenerator};
pub use service::{Standup, Submission, SummaryLookup};
pub use store::{MemoryStore, PgStore, ReportStore, StandupStore, SummaryCache};
pub use window::{SubmissionWindow, WindowStatus};
