//! Cadence Runtime
//!
//! Minimal binary that boots a module host with a small moving-vehicles
//! demo: a synchronous movement system, an asynchronous telemetry module on
//! a pooled snapshot, and a standalone continuous time source.

mod config;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use cadence_core::{define_component, Event, EventBus, Phase, World};
use cadence_host::{
    DataStrategy, ExecutionPolicy, Module, ModuleContext, ModuleDescriptor, ModuleHost, RunMode,
    System, SystemContext, SystemDescriptor,
};
use cadence_time::{MonotonicClock, SyncBus, TimeCoordinator, WallClock, MASTER_NODE};
use config::HostConfig;
use glam::Vec2;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}
define_component!(Position, "Position");

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
    y: f32,
}
define_component!(Velocity, "Velocity");

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct BoundsCrossed {
    entity_bits: u64,
}
impl Event for BoundsCrossed {
    const NAME: &'static str = "BoundsCrossed";
}

/// Half-extent of the demo arena.
const ARENA: f32 = 100.0;

/// Integrates positions and publishes an event when a vehicle wraps.
struct MovementSystem;

impl System for MovementSystem {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("movement", Phase::Simulation)
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        let dt = ctx.dt as f32;
        let movers: Vec<_> = ctx
            .world
            .query()
            .with::<Position>()
            .with::<Velocity>()
            .iter()
            .collect();
        for entity in movers {
            let velocity = *ctx.world.get_component::<Velocity>(entity).unwrap();
            let position = ctx.world.get_component_mut::<Position>(entity).unwrap();
            let mut next = Vec2::new(position.x, position.y) + Vec2::new(velocity.x, velocity.y) * dt;

            let mut wrapped = false;
            if next.x.abs() > ARENA {
                next.x = -next.x.signum() * ARENA;
                wrapped = true;
            }
            if next.y.abs() > ARENA {
                next.y = -next.y.signum() * ARENA;
                wrapped = true;
            }
            position.x = next.x;
            position.y = next.y;
            if wrapped {
                ctx.events
                    .publish(BoundsCrossed {
                        entity_bits: entity.to_bits(),
                    })
                    .unwrap();
            }
        }
    }
}

/// Watches wrap events and tallies them off-thread on a pooled snapshot.
struct TelemetryModule {
    wraps_seen: u64,
}

impl Module for TelemetryModule {
    fn descriptor(&mut self, world: &mut World, events: &mut EventBus) -> ModuleDescriptor {
        let position = world.register_component::<Position>().unwrap();
        let wrap = events.register::<BoundsCrossed>().unwrap();
        ModuleDescriptor::new(
            "telemetry",
            ExecutionPolicy {
                run_mode: RunMode::Asynchronous,
                data_strategy: DataStrategy::Sod,
                target_frequency_hz: 2.0,
                ..Default::default()
            },
        )
        .watch_event(wrap)
        .requires(position)
    }

    fn tick(&mut self, ctx: &mut ModuleContext<'_>) -> Result<(), cadence_host::ModuleError> {
        let wraps = ctx.events.read::<BoundsCrossed>().len() as u64;
        self.wraps_seen += wraps;
        let vehicles = ctx.world.query().with::<Position>().iter().count();
        tracing::info!(
            vehicles,
            wraps_this_frame = wraps,
            wraps_total = self.wraps_seen,
            "telemetry"
        );
        Ok(())
    }
}

fn spawn_vehicles(world: &mut World, count: u32) -> Result<()> {
    world.register_component::<Position>()?;
    world.register_component::<Velocity>()?;
    for i in 0..count {
        let angle = i as f32 * 0.37;
        let entity = world.create_entity()?;
        world.add_component(
            entity,
            Position {
                x: (i as f32 * 3.1) % ARENA - ARENA / 2.0,
                y: (i as f32 * 7.3) % ARENA - ARENA / 2.0,
            },
        )?;
        world.add_component(
            entity,
            Velocity {
                x: angle.cos() * 20.0,
                y: angle.sin() * 20.0,
            },
        )?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => HostConfig::load(&PathBuf::from(path))?,
        None => HostConfig::default(),
    };
    tracing::info!(
        frames = config.frames,
        vehicles = config.vehicle_count,
        "Cadence runtime v{}",
        cadence_core::VERSION
    );

    let mut host = ModuleHost::with_tuning(config.providers);
    spawn_vehicles(host.world_mut(), config.vehicle_count)?;
    host.register_system(Box::new(MovementSystem))?;
    host.register_module(Box::new(TelemetryModule { wraps_seen: 0 }))?;
    host.build()?;

    let sync_bus = Arc::new(SyncBus::new());
    host.attach_time(TimeCoordinator::master(
        sync_bus,
        MASTER_NODE,
        Vec::new(),
        config.time,
        Box::new(|| Box::new(MonotonicClock::new()) as Box<dyn WallClock>),
    ));

    let frame_budget = std::time::Duration::from_secs_f32(config.time.fixed_delta_seconds);
    for _ in 0..config.frames {
        let started = std::time::Instant::now();
        host.run_frame()?;
        if let Some(remaining) = frame_budget.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    let timer = host.frame_timer();
    tracing::info!(
        fps = format!("{:.1}", timer.fps()),
        frame_ms = format!("{:.2}", timer.frame_time_ms()),
        "run complete"
    );
    if let Some(stats) = host.module_stats("telemetry") {
        tracing::info!(
            runs = stats.runs,
            faults = stats.faults,
            timeouts = stats.timeouts,
            "telemetry module stats"
        );
    }
    Ok(())
}
