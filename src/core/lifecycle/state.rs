//! Per-run mutable state
//!
//! Records only ever grow: a phase is appended once, in order, and never
//! rewritten. A halted run keeps its records for inspection.

use super::phase::Phase;
use crate::core::artifact::ArtifactDescriptor;
use crate::core::error::RecipeError;
use crate::core::export::ExportManifest;
use crate::core::resolve::ResolvedDeps;

/// How a phase ended.
#[derive(Debug, Clone)]
pub enum PhaseOutcome {
    Completed,
    /// Deliberately not run; never counts as a failure
    Skipped(String),
    Failed(RecipeError),
}

impl PhaseOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PhaseOutcome::Completed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PhaseOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseOutcome::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub outcome: PhaseOutcome,
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Failed(Phase),
    Cancelled(Phase),
}

impl Halt {
    pub fn phase(self) -> Phase {
        match self {
            Halt::Failed(p) | Halt::Cancelled(p) => p,
        }
    }
}

/// State owned by one recipe run.
#[derive(Debug)]
pub struct RecipeState {
    records: Vec<PhaseRecord>,
    halt: Option<Halt>,
    backend: String,
    export: Option<ExportManifest>,
    resolved: Option<ResolvedDeps>,
    descriptor: Option<ArtifactDescriptor>,
}

impl RecipeState {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            halt: None,
            backend: backend.into(),
            export: None,
            resolved: None,
            descriptor: None,
        }
    }

    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }

    pub fn outcome(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.records
            .iter()
            .find(|r| r.phase == phase)
            .map(|r| &r.outcome)
    }

    /// Phases that ran to completion, in order.
    pub fn completed_phases(&self) -> Vec<Phase> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_completed())
            .map(|r| r.phase)
            .collect()
    }

    pub fn is_completed(&self, phase: Phase) -> bool {
        self.outcome(phase).is_some_and(PhaseOutcome::is_completed)
    }

    pub fn is_skipped(&self, phase: Phase) -> bool {
        self.outcome(phase).is_some_and(PhaseOutcome::is_skipped)
    }

    /// The next phase in the fixed order, or `None` once PublishInfo is recorded.
    pub fn next_phase(&self) -> Option<Phase> {
        match self.records.last() {
            None => Some(Phase::Export),
            Some(last) => last.phase.next(),
        }
    }

    pub fn halt(&self) -> Option<Halt> {
        self.halt
    }

    pub fn failed_at(&self) -> Option<Phase> {
        match self.halt {
            Some(Halt::Failed(p)) => Some(p),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed_at().is_some()
    }

    /// PublishInfo completed.
    pub fn is_finished(&self) -> bool {
        self.is_completed(Phase::PublishInfo)
    }

    /// The error that failed the run, if any.
    pub fn error(&self) -> Option<&RecipeError> {
        let phase = self.failed_at()?;
        match self.outcome(phase) {
            Some(PhaseOutcome::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// A recorded test failure, fatal or not.
    pub fn test_failure(&self) -> Option<&RecipeError> {
        match self.outcome(Phase::Test) {
            Some(PhaseOutcome::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// Name of the backend session driving this run.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn export_manifest(&self) -> Option<&ExportManifest> {
        self.export.as_ref()
    }

    pub fn resolved(&self) -> Option<&ResolvedDeps> {
        self.resolved.as_ref()
    }

    pub fn descriptor(&self) -> Option<&ArtifactDescriptor> {
        self.descriptor.as_ref()
    }

    /// Check that `phase` is the next legal transition.
    pub(crate) fn check_can_enter(&self, phase: Phase) -> Result<(), RecipeError> {
        if let Some(halt) = self.halt {
            return Err(RecipeError::RunTerminated {
                phase,
                halted_at: halt.phase(),
            });
        }
        if self.outcome(phase).is_some() {
            return Err(RecipeError::AlreadyRan(phase));
        }
        if let Some(required) = phase.requires()
            && !self.is_completed(required)
        {
            return Err(RecipeError::PhaseOrder {
                phase,
                missing: required,
            });
        }
        match self.next_phase() {
            Some(expected) if expected == phase => Ok(()),
            Some(expected) => Err(RecipeError::PhaseOrder {
                phase,
                missing: expected,
            }),
            None => Err(RecipeError::AlreadyRan(phase)),
        }
    }

    /// Append a record. A fatal failure halts the run.
    pub(crate) fn record(&mut self, phase: Phase, outcome: PhaseOutcome, fatal: bool) {
        if fatal && outcome.is_failed() {
            self.halt = Some(Halt::Failed(phase));
        }
        self.records.push(PhaseRecord { phase, outcome });
    }

    pub(crate) fn cancel(&mut self, before: Phase) {
        if self.halt.is_none() {
            self.halt = Some(Halt::Cancelled(before));
        }
    }

    pub(crate) fn set_export(&mut self, manifest: ExportManifest) {
        self.export = Some(manifest);
    }

    pub(crate) fn set_resolved(&mut self, resolved: ResolvedDeps) {
        self.resolved = Some(resolved);
    }

    pub(crate) fn set_descriptor(&mut self, descriptor: ArtifactDescriptor) {
        self.descriptor = Some(descriptor);
    }
}
