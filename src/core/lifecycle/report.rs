//! End-of-run summary.

use super::phase::Phase;
use super::state::{Halt, PhaseOutcome, RecipeState};
use crate::core::artifact::ArtifactDescriptor;
use crate::core::error::RecipeError;
use crate::core::output;

/// Summary of one run, built from its final state.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub reference: String,
    pub outcomes: Vec<(Phase, PhaseOutcome)>,
    pub halt: Option<Halt>,
    pub test_failure: Option<RecipeError>,
    pub descriptor: Option<ArtifactDescriptor>,
}

impl RunReport {
    pub fn from_state(reference: impl Into<String>, state: &RecipeState) -> Self {
        Self {
            reference: reference.into(),
            outcomes: state
                .records()
                .iter()
                .map(|r| (r.phase, r.outcome.clone()))
                .collect(),
            halt: state.halt(),
            test_failure: state.test_failure().cloned(),
            descriptor: state.descriptor().cloned(),
        }
    }

    /// True when every phase that ran either completed or was skipped.
    pub fn succeeded(&self) -> bool {
        self.halt.is_none() && self.test_failure.is_none()
    }

    /// Exit code for the CLI: 0 on success, else the first failure's code.
    pub fn exit_code(&self) -> i32 {
        if let Some(Halt::Cancelled(phase)) = self.halt {
            return RecipeError::Cancelled(phase).exit_code();
        }
        self.outcomes
            .iter()
            .find_map(|(_, outcome)| match outcome {
                PhaseOutcome::Failed(e) => Some(e.exit_code()),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub fn print(&self) {
        output::action(&format!("Summary for {}", self.reference));
        for (phase, outcome) in &self.outcomes {
            match outcome {
                PhaseOutcome::Completed => output::detail(&format!("{:<13} completed", phase.name())),
                PhaseOutcome::Skipped(reason) => {
                    output::skip(&format!("{:<13} skipped ({})", phase.name(), reason))
                }
                PhaseOutcome::Failed(e) => output::error(&format!("{:<13} failed: {}", phase.name(), e)),
            }
        }
        if let Some(Halt::Cancelled(phase)) = self.halt {
            output::warning(&format!("cancelled before {}", phase));
        }
        if let Some(ref descriptor) = self.descriptor {
            output::success(&format!(
                "{}/{} published at {}",
                descriptor.name,
                descriptor.version,
                descriptor.root.display()
            ));
        }
    }
}
