// worker.rs - Module dispatch onto the worker pool
//
// A dispatched task owns the module, its command buffer, a leased view, and
// the frame's event capture. Completion comes back over a channel that the
// orchestrator polls at harvest. Cancellation is cooperative only: a task
// that outlives its deadline is abandoned, its lease force-expired, and its
// command buffer discarded when it finally reports in.

use crate::module::{Module, ModuleContext, ModuleError};
use crate::provider::{LeaseState, SnapshotView};
use cadence_core::{CommandBuffer, EventFrame, World};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Why a task did not complete normally.
#[derive(Debug)]
pub(crate) enum TaskFault {
    Error(ModuleError),
    Panicked,
    StaleView,
}

pub(crate) struct TaskResult {
    pub module: Box<dyn Module>,
    pub commands: CommandBuffer,
    pub outcome: Result<(), TaskFault>,
    pub runtime: Duration,
}

/// Host-side handle to one in-flight task.
pub(crate) struct TaskHandle {
    pub receiver: Receiver<TaskResult>,
    pub deadline: Instant,
    /// Present for leased (non-Direct) views.
    pub lease: Option<Arc<LeaseState>>,
    pub view_world: Option<Arc<RwLock<World>>>,
    pub provider: Option<usize>,
    pub frame_synced: bool,
    /// Deadline passed without completion; the zombie's output is discarded.
    pub abandoned: bool,
}

/// Run the module body and classify the outcome. Shared by the inline
/// (synchronous) path and the worker task body.
pub(crate) fn run_module_body(
    module: &mut Box<dyn Module>,
    world: &World,
    commands: &mut CommandBuffer,
    events: &EventFrame,
    dt: f64,
) -> Result<(), TaskFault> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut ctx = ModuleContext {
            world,
            commands,
            events,
            dt,
        };
        module.tick(&mut ctx)
    }));
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(TaskFault::Error(error)),
        Err(_) => Err(TaskFault::Panicked),
    }
}

/// Move the module onto the worker pool. The result lands on `sender`
/// whether the tick succeeds, errors, panics, or finds its lease expired.
pub(crate) fn spawn_task(
    mut module: Box<dyn Module>,
    view: SnapshotView,
    events: Arc<EventFrame>,
    dt: f64,
    sender: Sender<TaskResult>,
) {
    rayon::spawn(move || {
        let started = Instant::now();
        let mut commands = CommandBuffer::new();
        let outcome = match view.read() {
            Ok(guard) => run_module_body(&mut module, &guard, &mut commands, &events, dt),
            Err(_) => Err(TaskFault::StaleView),
        };
        // The host may have given up on us; it still wants the module back.
        let _ = sender.send(TaskResult {
            module,
            commands,
            outcome,
            runtime: started.elapsed(),
        });
    });
}
