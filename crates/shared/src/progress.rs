use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ProgressError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    Brief,
    Intel,
    Compose,
}

impl StepId {
    pub const ALL: [StepId; 3] = [StepId::Brief, StepId::Intel, StepId::Compose];

    fn index(self) -> usize {
        match self {
            StepId::Brief => 0,
            StepId::Intel => 1,
            StepId::Compose => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StepId::Brief => "Brief understanding",
            StepId::Intel => "Signal sweep",
            StepId::Compose => "Craft narratives",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StepId::Brief => "Parse intent, persona, and tone guidance",
            StepId::Intel => "Collect breaking headlines & trending insights",
            StepId::Compose => "Assemble newsletter and blog deliverables",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self {
            StepId::Brief => "brief",
            StepId::Intel => "intel",
            StepId::Compose => "compose",
        };
        f.write_str(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Complete,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            StepStatus::Pending => "pending",
            StepStatus::Active => "active",
            StepStatus::Complete => "complete",
        };
        f.write_str(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub id: StepId,
    pub label: String,
    pub description: String,
    pub status: StepStatus,
}

impl PipelineStep {
    fn pending(id: StepId) -> Self {
        Self {
            id,
            label: id.label().to_string(),
            description: id.description().to_string(),
            status: StepStatus::Pending,
        }
    }
}

/// The three steps in their initial state
pub fn initial_steps() -> Vec<PipelineStep> {
    StepId::ALL.iter().map(|id| PipelineStep::pending(*id)).collect()
}

/// Receives every step transition as it happens
pub trait ProgressObserver: Send + Sync {
    fn on_transition(&self, step: &PipelineStep);
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_transition(&self, _step: &PipelineStep) {}
}

/// Keeps every transition in order, mostly useful in tests
#[derive(Default)]
pub struct RecordingObserver {
    transitions: Mutex<Vec<PipelineStep>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<PipelineStep> {
        self.transitions
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_transition(&self, step: &PipelineStep) {
        if let Ok(mut transitions) = self.transitions.lock() {
            transitions.push(step.clone());
        }
    }
}

/// Forward-only state machine over the brief -> intel -> compose steps.
///
/// A step may only become active once every earlier step is complete, and
/// only an active step may complete.
pub struct ProgressTracker<'a> {
    steps: Vec<PipelineStep>,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self {
            steps: initial_steps(),
            observer,
        }
    }

    pub fn begin(&mut self, id: StepId) -> Result<(), ProgressError> {
        let index = id.index();
        if let Some(blocking) = self.steps[..index]
            .iter()
            .find(|s| s.status != StepStatus::Complete)
        {
            return Err(ProgressError::OutOfOrder {
                step: id,
                blocking: blocking.id,
            });
        }
        self.transition(id, StepStatus::Pending, StepStatus::Active)
    }

    pub fn complete(&mut self, id: StepId) -> Result<(), ProgressError> {
        self.transition(id, StepStatus::Active, StepStatus::Complete)
    }

    pub fn status(&self, id: StepId) -> StepStatus {
        self.steps[id.index()].status
    }

    pub fn snapshot(&self) -> Vec<PipelineStep> {
        self.steps.clone()
    }

    fn transition(
        &mut self,
        id: StepId,
        expected: StepStatus,
        next: StepStatus,
    ) -> Result<(), ProgressError> {
        let step = &mut self.steps[id.index()];
        if step.status != expected {
            return Err(ProgressError::InvalidTransition {
                step: id,
                from: step.status,
                to: next,
            });
        }
        step.status = next;
        self.observer.on_transition(step);
        Ok(())
    }
}

/// True when no complete step is followed by a pending one earlier in the sequence
pub fn is_monotonic(steps: &[PipelineStep]) -> bool {
    steps
        .windows(2)
        .all(|pair| pair[1].status == StepStatus::Pending || pair[0].status == StepStatus::Complete)
}
