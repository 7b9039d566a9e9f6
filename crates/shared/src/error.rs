use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::progress::{PipelineStep, StepId, StepStatus};

/// Message returned to callers whenever a run fails. The cause stays in the logs.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Agent failed to generate outputs. Please refine the brief and retry.";

/// Shown when the agent itself cannot be reached, as opposed to a failed run
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "Unable to reach the content agent. Check network connectivity and retry.";

/// A signal source could not deliver. The collector logs these and moves on.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {source_name} failed: {message}")]
    Request {
        source_name: String,
        message: String,
    },

    #[error("{source_name} returned HTTP {status}")]
    Status { source_name: String, status: u16 },

    #[error("could not decode {source_name} response: {message}")]
    Decode {
        source_name: String,
        message: String,
    },
}

/// Which generation call a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deliverable {
    Newsletter,
    Blog,
    IdeaPitches,
}

impl fmt::Display for Deliverable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Deliverable::Newsletter => "newsletter",
            Deliverable::Blog => "blog article",
            Deliverable::IdeaPitches => "idea pitches",
        };
        f.write_str(name)
    }
}

/// The text-generation capability failed. Always fatal to the run.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("could not decode generation response: {0}")]
    Decode(String),

    #[error("{deliverable} came back empty")]
    EmptyOutput { deliverable: Deliverable },

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

impl GenerationError {
    pub fn is_rate_limit(&self) -> bool {
        match self {
            GenerationError::Api { status, body } => *status == 429 || body.contains("rate_limit"),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("step {step} cannot start before {blocking} is complete")]
    OutOfOrder { step: StepId, blocking: StepId },

    #[error("step {step} cannot move from {from} to {to}")]
    InvalidTransition {
        step: StepId,
        from: StepStatus,
        to: StepStatus,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("composition failed: {0}")]
    Composition(#[from] GenerationError),

    #[error("progress contract violated: {0}")]
    Progress(#[from] ProgressError),
}

/// A failed run: the cause plus the step states at the moment it failed
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    pub error: PipelineError,
    pub steps: Vec<PipelineStep>,
}

impl PipelineFailure {
    /// What the caller is allowed to see
    pub fn public_message(&self) -> &'static str {
        GENERIC_FAILURE_MESSAGE
    }
}

/// Calling a remote pipeline over HTTP
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{}", TRANSPORT_FAILURE_MESSAGE)]
    Transport(#[source] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response from the content agent: {0}")]
    Decode(String),
}
