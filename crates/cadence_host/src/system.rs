// system.rs - Phase-tagged systems
//
// Systems are the orchestrator-side units of work. They run inline on the
// live world and only ever talk to each other through components,
// singletons, and events; the descriptor's ordering hints are the sole
// coupling between them.

use cadence_core::{EventBus, Phase, World};

/// Metadata describing where a system runs and how it orders against peers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemDescriptor {
    name: String,
    phase: Phase,
    before: Vec<String>,
    after: Vec<String>,
}

impl SystemDescriptor {
    pub fn new(name: impl Into<String>, phase: Phase) -> Self {
        Self {
            name: name.into(),
            phase,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// This system must run before the named one (same phase).
    pub fn runs_before(mut self, other: impl Into<String>) -> Self {
        self.before.push(other.into());
        self
    }

    /// This system must run after the named one (same phase).
    pub fn runs_after(mut self, other: impl Into<String>) -> Self {
        self.after.push(other.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn before_edges(&self) -> &[String] {
        &self.before
    }

    pub fn after_edges(&self) -> &[String] {
        &self.after
    }
}

/// Everything a system sees during one phase execution.
pub struct SystemContext<'a> {
    pub world: &'a mut World,
    pub events: &'a EventBus,
    pub dt: f64,
}

pub trait System: Send {
    fn descriptor(&self) -> SystemDescriptor;
    fn run(&mut self, ctx: &mut SystemContext<'_>);
}
