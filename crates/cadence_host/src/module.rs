// module.rs - The pluggable workload unit
//
// Modules are the open seam of the host: third parties implement this trait
// and the policy decides everything else. A module registers its types once
// at registration time through `descriptor`, then sees the world only
// through the leased view in its tick context.

use crate::policy::ExecutionPolicy;
use cadence_core::{CommandBuffer, ComponentTypeId, EventBus, EventFrame, EventTypeId, World};

/// Boxed tick error; faults are logged and swallowed by the safety envelope.
pub type ModuleError = Box<dyn std::error::Error + Send + Sync>;

/// Static description a module hands the host at registration.
#[derive(Clone, Debug)]
pub struct ModuleDescriptor {
    pub name: String,
    pub policy: ExecutionPolicy,
    /// Event types whose presence wakes the module.
    pub watch_events: Vec<EventTypeId>,
    /// Component types whose changes wake the module.
    pub watch_components: Vec<ComponentTypeId>,
    /// Component types the module reads; drives provider mask derivation.
    /// Empty means "all types".
    pub required_components: Vec<ComponentTypeId>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, policy: ExecutionPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            watch_events: Vec::new(),
            watch_components: Vec::new(),
            required_components: Vec::new(),
        }
    }

    pub fn watch_event(mut self, id: EventTypeId) -> Self {
        self.watch_events.push(id);
        self
    }

    pub fn watch_component(mut self, id: ComponentTypeId) -> Self {
        self.watch_components.push(id);
        self
    }

    pub fn requires(mut self, id: ComponentTypeId) -> Self {
        self.required_components.push(id);
        self
    }
}

/// Everything a module sees during one tick.
pub struct ModuleContext<'a> {
    /// Read view per the module's data strategy: the live world for Direct,
    /// a leased mirror otherwise.
    pub world: &'a World,
    /// Structural intent; played back on the orchestrator at harvest.
    pub commands: &'a mut CommandBuffer,
    /// The frame's captured events.
    pub events: &'a EventFrame,
    /// Accumulated simulation time since this module's previous run.
    pub dt: f64,
}

pub trait Module: Send {
    /// Called once at registration. The module registers the component and
    /// event types it uses and returns its descriptor.
    fn descriptor(&mut self, world: &mut World, events: &mut EventBus) -> ModuleDescriptor;

    fn tick(&mut self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError>;
}
