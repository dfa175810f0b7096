// host.rs - Per-frame orchestration of modules, systems, and providers
//
// One orchestrator thread owns the live world; workers only see leased
// mirror views and talk back through command buffers. The frame procedure:
//
//   tick -> Input -> BeforeSync -> flush deferred commands -> event swap ->
//   event capture -> provider sync -> harvest -> dispatch -> frame-synced
//   barrier -> PostSimulation -> Export
//
// Faults inside module ticks are logged and swallowed to preserve cadence;
// repository errors during playback are frame-fatal and leave the host in a
// defined paused state.

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::error::HostError;
use crate::module::{Module, ModuleDescriptor};
use crate::policy::{DataStrategy, RunMode, Trigger};
use crate::provider::{
    ConvoyProvider, OnDemandPool, PersistentReplica, ProviderTuning, SharedMirrorPool,
    SnapshotProvider,
};
use crate::scheduler::SystemScheduler;
use crate::system::System;
use crate::worker::{run_module_body, spawn_task, TaskFault, TaskHandle, TaskResult};
use cadence_metrics::{ExecutionStats, FrameTimer, StatsSnapshot};
use cadence_core::{
    CommandBuffer, ComponentMask, EventBus, EventFrame, Phase, World,
};
use cadence_time::{TimeCoordinator, TimeSample};
use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Captured event frames kept for late consumers.
const EVENT_HISTORY_FRAMES: usize = 64;

/// Host lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HostState {
    /// Registration window; frames cannot run yet.
    Configuring,
    Running,
    /// A frame-fatal repository error occurred; the host stays paused.
    Faulted,
}

/// What one frame actually did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub global_version: u64,
    pub modules_dispatched: u32,
    pub modules_harvested: u32,
    pub commands_applied: usize,
    pub commands_skipped: usize,
}

struct ModuleSlot {
    module: Option<Box<dyn Module>>,
    descriptor: ModuleDescriptor,
    skip: u32,
    provider: Option<usize>,
    breaker: CircuitBreaker,
    stats: ExecutionStats,
    accumulator: f64,
    frames_since_run: u32,
    last_run_version: u64,
    task: Option<TaskHandle>,
}

pub struct ModuleHost {
    world: World,
    events: EventBus,
    scheduler: SystemScheduler,
    modules: Vec<ModuleSlot>,
    providers: Vec<SnapshotProvider>,
    convoy_pool: Option<Arc<Mutex<SharedMirrorPool>>>,
    /// Deferred commands from systems or external threads, flushed at the
    /// frame's sync point.
    deferred: Arc<Mutex<CommandBuffer>>,
    history: VecDeque<Arc<EventFrame>>,
    tuning: ProviderTuning,
    time: Option<TimeCoordinator>,
    last_sample: TimeSample,
    frame_timer: FrameTimer,
    state: HostState,
}

impl ModuleHost {
    pub fn new() -> Self {
        Self::with_tuning(ProviderTuning::default())
    }

    pub fn with_tuning(tuning: ProviderTuning) -> Self {
        Self {
            world: World::new(),
            events: EventBus::new(),
            scheduler: SystemScheduler::new(),
            modules: Vec::new(),
            providers: Vec::new(),
            convoy_pool: None,
            deferred: Arc::new(Mutex::new(CommandBuffer::new())),
            history: VecDeque::new(),
            tuning,
            time: None,
            last_sample: TimeSample::default(),
            frame_timer: FrameTimer::new(120),
            state: HostState::Configuring,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Shared deferred command buffer; flushed every frame at the sync
    /// point. Cloneable across threads.
    pub fn deferred_commands(&self) -> Arc<Mutex<CommandBuffer>> {
        Arc::clone(&self.deferred)
    }

    pub fn attach_time(&mut self, coordinator: TimeCoordinator) {
        self.time = Some(coordinator);
    }

    pub fn time(&self) -> Option<&TimeCoordinator> {
        self.time.as_ref()
    }

    pub fn time_mut(&mut self) -> Option<&mut TimeCoordinator> {
        self.time.as_mut()
    }

    pub fn last_sample(&self) -> TimeSample {
        self.last_sample
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn frame_timer(&self) -> &FrameTimer {
        &self.frame_timer
    }

    pub fn register_system(&mut self, system: Box<dyn System>) -> Result<(), HostError> {
        if self.state != HostState::Configuring {
            return Err(HostError::AlreadyBuilt);
        }
        self.scheduler.register(system)
    }

    /// Register a module: it installs its types into the repository and the
    /// bus, and its policy is validated here.
    pub fn register_module(&mut self, mut module: Box<dyn Module>) -> Result<(), HostError> {
        if self.state != HostState::Configuring {
            return Err(HostError::AlreadyBuilt);
        }
        let descriptor = module.descriptor(&mut self.world, &mut self.events);
        descriptor.policy.validate(&descriptor.name)?;
        if self
            .modules
            .iter()
            .any(|slot| slot.descriptor.name == descriptor.name)
        {
            return Err(HostError::DuplicateModule {
                name: descriptor.name,
            });
        }

        let policy = &descriptor.policy;
        let slot = ModuleSlot {
            skip: policy.skip_frames(),
            breaker: CircuitBreaker::new(policy.failure_threshold, policy.reset_timeout()),
            stats: ExecutionStats::new(),
            accumulator: 0.0,
            frames_since_run: 0,
            last_run_version: 0,
            provider: None,
            task: None,
            module: Some(module),
            descriptor,
        };
        self.modules.push(slot);
        Ok(())
    }

    /// Finish registration: build the scheduler and auto-assign providers.
    /// Once-only; registration after build is rejected.
    pub fn build(&mut self) -> Result<(), HostError> {
        if self.state != HostState::Configuring {
            return Err(HostError::AlreadyBuilt);
        }
        self.scheduler.build()?;
        self.assign_providers();
        self.state = HostState::Running;
        Ok(())
    }

    /// Group modules by (run mode, data strategy, frequency) and hand each
    /// group its provider. Masks come from declared required components; an
    /// empty list conservatively maps to all types.
    fn assign_providers(&mut self) {
        let schema = self.world.schema();
        let mut groups: BTreeMap<(RunMode, DataStrategy, u32), Vec<usize>> = BTreeMap::new();
        for (index, slot) in self.modules.iter().enumerate() {
            if slot.descriptor.policy.data_strategy == DataStrategy::Direct {
                continue;
            }
            groups
                .entry(slot.descriptor.policy.group_key())
                .or_default()
                .push(index);
        }

        for ((_, strategy, _), members) in groups {
            let mut mask = ComponentMask::EMPTY;
            for &index in &members {
                let required = &self.modules[index].descriptor.required_components;
                if required.is_empty() {
                    mask = ComponentMask::ALL;
                    break;
                }
                for &id in required {
                    mask.set(id);
                }
            }

            let provider = match strategy {
                DataStrategy::Gdb => {
                    SnapshotProvider::Persistent(PersistentReplica::new(&schema, mask))
                }
                DataStrategy::Sod if members.len() == 1 => SnapshotProvider::OnDemand(
                    OnDemandPool::new(schema.clone(), mask, self.tuning.on_demand_initial_pool),
                ),
                DataStrategy::Sod => {
                    let pool = self.convoy_pool.get_or_insert_with(|| {
                        Arc::new(Mutex::new(SharedMirrorPool::new(
                            schema.clone(),
                            self.tuning.shared_pool_warmup,
                        )))
                    });
                    SnapshotProvider::SharedConvoy(ConvoyProvider::new(Arc::clone(pool), mask))
                }
                DataStrategy::Direct => unreachable!("Direct groups are filtered out"),
            };

            let provider_index = self.providers.len();
            self.providers.push(provider);
            for index in members {
                self.modules[index].provider = Some(provider_index);
            }
        }
    }

    /// Advance one frame using the attached time coordinator (or the
    /// nominal fixed step when none is attached).
    pub fn run_frame(&mut self) -> Result<FrameReport, HostError> {
        let sample = match &mut self.time {
            Some(coordinator) => coordinator.update(),
            None => TimeSample {
                dt: 1.0 / 60.0,
                unscaled_dt: 1.0 / 60.0,
                total_time: self.last_sample.total_time + 1.0 / 60.0,
                frame_number: self.last_sample.frame_number + 1,
                time_scale: 1.0,
            },
        };
        self.last_sample = sample;
        self.run_frame_with(sample.dt)
    }

    /// Advance one frame with an externally supplied dt.
    pub fn run_frame_with(&mut self, dt: f64) -> Result<FrameReport, HostError> {
        match self.state {
            HostState::Configuring => return Err(HostError::NotBuilt),
            HostState::Faulted => return Err(HostError::Faulted),
            HostState::Running => {}
        }
        self.frame_timer.begin();
        let mut report = FrameReport::default();

        // 1. One version bump per frame.
        self.world.tick();
        report.global_version = self.world.global_version();

        // 2-3. Input and pre-sync systems.
        self.world.begin_phase(Phase::Input);
        self.run_phase_fatal(Phase::Input, dt)?;
        self.world.begin_phase(Phase::BeforeSync);
        self.run_phase_fatal(Phase::BeforeSync, dt)?;

        // 4. Flush deferred commands into the live world.
        let deferred = Arc::clone(&self.deferred);
        {
            let mut buffer = deferred.lock().unwrap();
            if !buffer.is_empty() {
                let stats = self.fatal_on_err(|host| {
                    buffer.playback(&mut host.world, &host.events).map_err(HostError::from)
                })?;
                report.commands_applied += stats.applied;
                report.commands_skipped += stats.skipped;
            }
        }

        // 5-6. Swap event buffers and capture the frame's events.
        self.events.swap_buffers();
        let frame = Arc::new(self.events.capture_frame(self.world.global_version()));
        self.history.push_back(Arc::clone(&frame));
        while self.history.len() > EVENT_HISTORY_FRAMES {
            self.history.pop_front();
        }

        // 7. Providers refresh at the sync point.
        for provider in &mut self.providers {
            provider.update(&self.world);
        }

        // 8-9. Harvest finished tasks, then dispatch due modules.
        self.world.begin_phase(Phase::Simulation);
        self.harvest(&mut report)?;
        self.dispatch(&frame, dt, &mut report)?;

        // 10. Frame-synced tasks must finish inside the frame.
        self.frame_synced_barrier(&mut report)?;

        // 11-12. Post-simulation and export systems.
        self.world.begin_phase(Phase::PostSimulation);
        self.run_phase_fatal(Phase::PostSimulation, dt)?;
        self.world.begin_phase(Phase::Export);
        self.run_phase_fatal(Phase::Export, dt)?;

        self.frame_timer.end();
        Ok(report)
    }

    fn run_phase_fatal(&mut self, phase: Phase, dt: f64) -> Result<(), HostError> {
        let result = self
            .scheduler
            .run_phase(phase, &mut self.world, &self.events, dt);
        if result.is_err() {
            self.state = HostState::Faulted;
        }
        result
    }

    fn fatal_on_err<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        match f(self) {
            Ok(value) => Ok(value),
            Err(error) => {
                tracing::error!(%error, "frame-fatal repository error; pausing host");
                self.state = HostState::Faulted;
                Err(error)
            }
        }
    }

    /// Poll every outstanding task; apply completed work, abandon overdue
    /// tasks.
    fn harvest(&mut self, report: &mut FrameReport) -> Result<(), HostError> {
        for index in 0..self.modules.len() {
            if self.modules[index].task.is_none() {
                continue;
            }
            let polled = {
                let slot = &mut self.modules[index];
                let task = slot.task.as_mut().unwrap();
                match task.receiver.try_recv() {
                    Ok(result) => Some(Ok(result)),
                    Err(TryRecvError::Empty) => {
                        if !task.abandoned && Instant::now() >= task.deadline {
                            Self::abandon(&slot.descriptor.name, task, &mut slot.breaker, &mut slot.stats);
                        }
                        None
                    }
                    Err(TryRecvError::Disconnected) => Some(Err(())),
                }
            };
            match polled {
                Some(Ok(result)) => {
                    let task = self.modules[index].task.take().unwrap();
                    self.finish_task(index, task, result, report)?;
                }
                Some(Err(())) => {
                    // The worker vanished without reporting; treat as fault.
                    let slot = &mut self.modules[index];
                    slot.task = None;
                    slot.breaker.record_failure();
                    slot.stats.record_fault();
                    tracing::warn!(module = %slot.descriptor.name, "task channel dropped");
                }
                None => {}
            }
        }
        Ok(())
    }

    fn abandon(
        name: &str,
        task: &mut TaskHandle,
        breaker: &mut CircuitBreaker,
        stats: &mut ExecutionStats,
    ) {
        task.abandoned = true;
        if let Some(lease) = &task.lease {
            lease.invalidate();
        }
        breaker.record_failure();
        stats.record_timeout();
        tracing::warn!(module = name, "tick missed its deadline; abandoning task");
    }

    /// Apply one completed task: release its view, account the outcome, and
    /// play back its commands unless the lease died.
    fn finish_task(
        &mut self,
        index: usize,
        task: TaskHandle,
        result: TaskResult,
        report: &mut FrameReport,
    ) -> Result<(), HostError> {
        if let (Some(world_handle), Some(provider)) = (task.view_world, task.provider) {
            self.providers[provider].release(world_handle);
        }

        let lease_dead =
            task.abandoned || task.lease.as_ref().map_or(false, |lease| lease.is_expired());
        let name = self.modules[index].descriptor.name.clone();

        let mut commands = result.commands;
        let outcome = result.outcome;
        {
            let slot = &mut self.modules[index];
            slot.module = Some(result.module);
        }

        match outcome {
            Ok(()) if !lease_dead => {
                {
                    let slot = &mut self.modules[index];
                    slot.breaker.record_success();
                    slot.stats.record_run(result.runtime);
                }
                let stats = self.fatal_on_err(|host| {
                    commands
                        .playback(&mut host.world, &host.events)
                        .map_err(HostError::from)
                })?;
                report.commands_applied += stats.applied;
                report.commands_skipped += stats.skipped;
            }
            Ok(()) => {
                // Completed, but past its lease: the zombie's output is
                // dropped wholesale.
                report.commands_skipped += commands.len();
                tracing::warn!(module = %name, "discarding commands from an expired task");
            }
            Err(fault) => {
                let slot = &mut self.modules[index];
                if !task.abandoned {
                    slot.breaker.record_failure();
                    slot.stats.record_fault();
                }
                match fault {
                    TaskFault::Error(error) => {
                        tracing::warn!(module = %name, %error, "module tick failed")
                    }
                    TaskFault::Panicked => {
                        tracing::warn!(module = %name, "module tick panicked")
                    }
                    TaskFault::StaleView => {
                        tracing::warn!(module = %name, "module view expired before tick ran")
                    }
                }
            }
        }
        report.modules_harvested += 1;
        Ok(())
    }

    /// Accumulate dt and dispatch every module whose wake condition holds.
    fn dispatch(
        &mut self,
        frame: &Arc<EventFrame>,
        dt: f64,
        report: &mut FrameReport,
    ) -> Result<(), HostError> {
        for index in 0..self.modules.len() {
            {
                let slot = &mut self.modules[index];
                slot.accumulator += dt;
                slot.frames_since_run += 1;
                // Still running (or lost to a dead worker): accumulation
                // continues, dispatch waits.
                if slot.task.is_some() || slot.module.is_none() {
                    continue;
                }
            }
            if !self.should_run(index) {
                continue;
            }
            {
                let slot = &mut self.modules[index];
                if !slot.breaker.allow() {
                    slot.stats.record_suppressed();
                    continue;
                }
            }

            let module_dt = {
                let global_version = self.world.global_version();
                let slot = &mut self.modules[index];
                let consumed = slot.accumulator;
                slot.accumulator = 0.0;
                slot.frames_since_run = 0;
                slot.last_run_version = global_version - 1;
                consumed
            };

            match self.modules[index].descriptor.policy.run_mode {
                RunMode::Synchronous => self.dispatch_sync(index, module_dt, frame, report)?,
                RunMode::FrameSynced | RunMode::Asynchronous => {
                    self.dispatch_worker(index, module_dt, frame, report)?
                }
            }
        }
        Ok(())
    }

    /// Wake evaluation: trigger overrides short-circuit the default chain
    /// (watched events, watched component changes, periodic throttle).
    fn should_run(&self, index: usize) -> bool {
        let slot = &self.modules[index];
        match slot.descriptor.policy.trigger {
            Trigger::OnEvent(id) => self.events.has_event(id),
            Trigger::OnComponentChange(id) => {
                self.world.has_component_changed(id, slot.last_run_version)
            }
            Trigger::IntervalMs(ms) => slot.accumulator * 1000.0 >= ms as f64,
            Trigger::Always => {
                slot.descriptor
                    .watch_events
                    .iter()
                    .any(|&id| self.events.has_event(id))
                    || slot
                        .descriptor
                        .watch_components
                        .iter()
                        .any(|&id| self.world.has_component_changed(id, slot.last_run_version))
                    || slot.frames_since_run >= slot.skip
            }
        }
    }

    fn dispatch_sync(
        &mut self,
        index: usize,
        dt: f64,
        frame: &Arc<EventFrame>,
        report: &mut FrameReport,
    ) -> Result<(), HostError> {
        let mut module = self.modules[index].module.take().unwrap();
        let mut commands = CommandBuffer::new();
        let strategy = self.modules[index].descriptor.policy.data_strategy;
        let started = Instant::now();

        let outcome = match strategy {
            DataStrategy::Direct => {
                run_module_body(&mut module, &self.world, &mut commands, frame, dt)
            }
            _ => {
                let provider = self.modules[index].provider.unwrap();
                let lease_ttl = self.lease_ttl();
                match self.providers[provider].acquire(&self.world, lease_ttl) {
                    Ok(view) => {
                        let outcome = match view.read() {
                            Ok(guard) => {
                                run_module_body(&mut module, &guard, &mut commands, frame, dt)
                            }
                            Err(_) => Err(TaskFault::StaleView),
                        };
                        let handle = view.world_handle();
                        drop(view);
                        self.providers[provider].release(handle);
                        outcome
                    }
                    Err(error) => {
                        tracing::warn!(
                            module = %self.modules[index].descriptor.name,
                            %error,
                            "view acquisition failed; skipping dispatch"
                        );
                        let slot = &mut self.modules[index];
                        slot.module = Some(module);
                        slot.stats.record_fault();
                        return Ok(());
                    }
                }
            }
        };
        let runtime = started.elapsed();
        report.modules_dispatched += 1;

        let name = self.modules[index].descriptor.name.clone();
        let limit = self.modules[index].descriptor.policy.runtime_limit();
        {
            let slot = &mut self.modules[index];
            slot.module = Some(module);
        }
        match outcome {
            Ok(()) => {
                {
                    let slot = &mut self.modules[index];
                    if runtime > limit {
                        // Inline ticks cannot be preempted; an overrun still
                        // counts against the breaker.
                        slot.breaker.record_failure();
                        slot.stats.record_timeout();
                        tracing::warn!(module = %name, ?runtime, "synchronous tick overran its limit");
                    } else {
                        slot.breaker.record_success();
                        slot.stats.record_run(runtime);
                    }
                }
                let stats = self.fatal_on_err(|host| {
                    commands
                        .playback(&mut host.world, &host.events)
                        .map_err(HostError::from)
                })?;
                report.commands_applied += stats.applied;
                report.commands_skipped += stats.skipped;
            }
            Err(fault) => {
                let slot = &mut self.modules[index];
                slot.breaker.record_failure();
                slot.stats.record_fault();
                match fault {
                    TaskFault::Error(error) => {
                        tracing::warn!(module = %name, %error, "module tick failed")
                    }
                    TaskFault::Panicked => tracing::warn!(module = %name, "module tick panicked"),
                    TaskFault::StaleView => {
                        tracing::warn!(module = %name, "module view expired before tick ran")
                    }
                }
            }
        }
        Ok(())
    }

    fn dispatch_worker(
        &mut self,
        index: usize,
        dt: f64,
        frame: &Arc<EventFrame>,
        report: &mut FrameReport,
    ) -> Result<(), HostError> {
        let provider = self.modules[index]
            .provider
            .expect("non-direct policies always get a provider");
        let lease_ttl = self.lease_ttl();
        let view = match self.providers[provider].acquire(&self.world, lease_ttl) {
            Ok(view) => view,
            Err(error) => {
                tracing::warn!(
                    module = %self.modules[index].descriptor.name,
                    %error,
                    "view acquisition failed; skipping dispatch"
                );
                self.modules[index].stats.record_fault();
                return Ok(());
            }
        };

        let module = self.modules[index].module.take().unwrap();
        let lease = Arc::clone(view.lease());
        let world_handle = view.world_handle();
        let deadline = Instant::now() + self.modules[index].descriptor.policy.runtime_limit();
        let frame_synced =
            self.modules[index].descriptor.policy.run_mode == RunMode::FrameSynced;

        let (sender, receiver) = mpsc::channel();
        spawn_task(module, view, Arc::clone(frame), dt, sender);
        self.modules[index].task = Some(TaskHandle {
            receiver,
            deadline,
            lease: Some(lease),
            view_world: Some(world_handle),
            provider: Some(provider),
            frame_synced,
            abandoned: false,
        });
        report.modules_dispatched += 1;
        Ok(())
    }

    /// Block on every frame-synced task dispatched this frame, then harvest
    /// it immediately.
    fn frame_synced_barrier(&mut self, report: &mut FrameReport) -> Result<(), HostError> {
        for index in 0..self.modules.len() {
            let is_barrier_task = self.modules[index]
                .task
                .as_ref()
                .map_or(false, |task| task.frame_synced && !task.abandoned);
            if !is_barrier_task {
                continue;
            }

            let waited = {
                let slot = &mut self.modules[index];
                let task = slot.task.as_mut().unwrap();
                let budget = task.deadline.saturating_duration_since(Instant::now());
                match task.receiver.recv_timeout(budget) {
                    Ok(result) => Some(Ok(result)),
                    Err(RecvTimeoutError::Timeout) => {
                        Self::abandon(&slot.descriptor.name, task, &mut slot.breaker, &mut slot.stats);
                        None
                    }
                    Err(RecvTimeoutError::Disconnected) => Some(Err(())),
                }
            };
            match waited {
                Some(Ok(result)) => {
                    let task = self.modules[index].task.take().unwrap();
                    self.finish_task(index, task, result, report)?;
                }
                Some(Err(())) => {
                    let slot = &mut self.modules[index];
                    slot.task = None;
                    slot.breaker.record_failure();
                    slot.stats.record_fault();
                }
                None => {}
            }
        }
        Ok(())
    }

    fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.tuning.hard_lease_expiry_ms as u64)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn module_stats(&self, name: &str) -> Option<StatsSnapshot> {
        self.modules
            .iter()
            .find(|slot| slot.descriptor.name == name)
            .map(|slot| slot.stats.snapshot())
    }

    /// Explicitly zero a module's execution counters.
    pub fn reset_module_stats(&mut self, name: &str) {
        if let Some(slot) = self
            .modules
            .iter_mut()
            .find(|slot| slot.descriptor.name == name)
        {
            slot.stats.reset();
        }
    }

    pub fn breaker_state(&self, name: &str) -> Option<BreakerState> {
        self.modules
            .iter()
            .find(|slot| slot.descriptor.name == name)
            .map(|slot| slot.breaker.state())
    }

    /// Captured events of a recent frame, by repository version.
    pub fn event_frame(&self, global_version: u64) -> Option<&Arc<EventFrame>> {
        self.history
            .iter()
            .rev()
            .find(|frame| frame.version() == global_version)
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn module_provider(&self, name: &str) -> Option<usize> {
        self.modules
            .iter()
            .find(|slot| slot.descriptor.name == name)
            .and_then(|slot| slot.provider)
    }
}

impl Default for ModuleHost {
    fn default() -> Self {
        Self::new()
    }
}
