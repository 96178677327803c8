//! faults-core library.
//!
//! Notices (single error occurrences) are bucketed into errs (error
//! signatures), and errs are grouped into problems, the unit people triage.
//! This crate keeps each problem's cached aggregates consistent with its
//! membership and implements merge/unmerge over a SQLite store.
//!
//! # Conventions
//!
//! - **Errors**: [`error::ProblemError`] for domain operations, `anyhow::Result`
//!   for database opening and configuration loading.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`) with
//!   structured fields.

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod problem;

pub use error::{ErrorCode, ProblemError};
pub use problem::ProblemManager;
