//! Scenario harness for chanio channels.
//!
//! This crate provides:
//! - Fixtures: scripted operation sequences with expected outcomes (JSON)
//! - Runner: executes fixtures against a fresh descriptor table per case
//! - Verification: per-case transcripts, diffs, and summaries
//! - Reports: markdown and JSON, with fixture digests
//! - Structured logs: JSONL step events and a validator for them

#![forbid(unsafe_code)]

pub mod diff;
pub mod digest;
pub mod error;
pub mod fixtures;
pub mod report;
pub mod runner;
pub mod structured_log;
pub mod verify;

pub use error::HarnessError;
pub use fixtures::{FixtureCase, FixtureSet};
pub use report::ConformanceReport;
pub use runner::TestRunner;
pub use verify::VerificationResult;
