//! Ordered validation stages with violation accumulation.
//!
//! `Unvalidated → FieldsChecked → WindowChecked → ConflictChecked → Accepted | Rejected`
//!
//! Each entity builds its own stage list. A stage added with [`Pipeline::gate`]
//! stops the run when it fails; stages added with [`Pipeline::stage`] always
//! run once reached, and every violation they find is kept.

use super::violation::{Verdict, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Fields,
    Window,
    Conflicts,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Fields => "fields",
            StageKind::Window => "window",
            StageKind::Conflicts => "conflicts",
        }
    }
}

/// Where a run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Unvalidated,
    Checked(StageKind),
    Accepted,
    Rejected,
}

type Check<'a, S> = Box<dyn Fn(&S) -> Vec<Violation> + Send + Sync + 'a>;

struct Stage<'a, S: ?Sized> {
    kind: StageKind,
    gate: bool,
    check: Check<'a, S>,
}

pub struct Pipeline<'a, S: ?Sized> {
    stages: Vec<Stage<'a, S>>,
}

impl<S: ?Sized> Default for Pipeline<'_, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, S: ?Sized> Pipeline<'a, S> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a stage whose failure stops the run.
    pub fn gate<F>(mut self, kind: StageKind, check: F) -> Self
    where
        F: Fn(&S) -> Vec<Violation> + Send + Sync + 'a,
    {
        self.stages.push(Stage { kind, gate: true, check: Box::new(check) });
        self
    }

    /// Add a stage that accumulates violations without stopping the run.
    pub fn stage<F>(mut self, kind: StageKind, check: F) -> Self
    where
        F: Fn(&S) -> Vec<Violation> + Send + Sync + 'a,
    {
        self.stages.push(Stage { kind, gate: false, check: Box::new(check) });
        self
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }

    pub fn run(&self, subject: &S) -> Verdict {
        self.run_traced(subject).0
    }

    /// Run the stages in order and report the final state alongside the verdict.
    pub fn run_traced(&self, subject: &S) -> (Verdict, PipelineState) {
        let mut state = PipelineState::Unvalidated;
        let mut violations = Vec::new();

        for stage in &self.stages {
            let found = (stage.check)(subject);
            let failed = !found.is_empty();
            tracing::trace!(from = ?state, stage = stage.kind.as_str(), violations = found.len(), "admission stage");
            violations.extend(found);
            state = PipelineState::Checked(stage.kind);
            if failed && stage.gate {
                break;
            }
        }

        let verdict = Verdict::from_violations(violations);
        let state = if verdict.is_accepted() {
            PipelineState::Accepted
        } else {
            PipelineState::Rejected
        };
        (verdict, state)
    }
}
