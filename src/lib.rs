//! Archival pipeline for the standard log table.
//!
//! Aging rows are periodically extracted into CSV artifacts, uploaded to
//! Amazon S3, and deleted from the live table only after the upload is
//! confirmed. Per-course log histories can later be reconstructed from the
//! ordered archive objects plus whatever is still resident in the table.

pub mod archive;
pub mod check;
pub mod config;
pub mod db;
pub mod fetch;
pub mod services;

#[cfg(test)]
mod tests;
