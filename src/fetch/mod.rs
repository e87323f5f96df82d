//! Reconstruction of per-course log histories.

pub mod course_logs;

pub use course_logs::{FetchError, FetchSummary, fetch_logs};
