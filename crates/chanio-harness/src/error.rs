//! Harness-level failures (as opposed to channel errors, which are recorded
//! as step outcomes).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("fixture json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("step {step} refers to unknown handle '{handle}'")]
    UnknownHandle { step: usize, handle: String },

    #[error("no fixture files found in {0}")]
    NoFixtures(String),
}
