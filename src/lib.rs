//! contentpipe: a job orchestrator for content import, processing and deploy
//! pipelines.
//!
//! The [`engine`] holds the job model, capability-gated child jobs, staged
//! composites, the content ledger and the runner. [`jobs`] provides the
//! concrete job bodies and [`pipeline`] compiles declarative pipeline files
//! into jobs.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod notify;
pub mod pipeline;
pub mod ui;

pub use error::{PipeError, Result};
