// scheduler.rs - Topological ordering of phase-tagged systems
//
// Build happens once after all systems are registered. Within a phase,
// Kahn's algorithm orders systems by the declared runs-before/runs-after
// edges, keeping registration order among unconstrained peers so execution
// stays deterministic. A cycle fails the build with the member names.

use crate::error::HostError;
use crate::system::{System, SystemContext};
use cadence_core::{EventBus, Phase, World};
use std::collections::HashMap;

struct RegisteredSystem {
    system: Box<dyn System>,
    name: String,
    phase: Phase,
}

pub struct SystemScheduler {
    systems: Vec<RegisteredSystem>,
    name_lookup: HashMap<String, usize>,
    /// Execution order per phase, filled by `build`.
    order: Option<HashMap<Phase, Vec<usize>>>,
}

impl SystemScheduler {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            name_lookup: HashMap::new(),
            order: None,
        }
    }

    pub fn register(&mut self, system: Box<dyn System>) -> Result<(), HostError> {
        if self.order.is_some() {
            return Err(HostError::AlreadyBuilt);
        }
        let descriptor = system.descriptor();
        let name = descriptor.name().to_string();
        if self.name_lookup.contains_key(&name) {
            return Err(HostError::DuplicateSystem { name });
        }
        self.name_lookup.insert(name.clone(), self.systems.len());
        self.systems.push(RegisteredSystem {
            system,
            name,
            phase: descriptor.phase(),
        });
        Ok(())
    }

    /// Compute per-phase execution order. Once-only; re-initialization is
    /// rejected.
    pub fn build(&mut self) -> Result<(), HostError> {
        if self.order.is_some() {
            return Err(HostError::AlreadyBuilt);
        }

        let mut order = HashMap::new();
        for phase in Phase::ALL {
            let members: Vec<usize> = self
                .systems
                .iter()
                .enumerate()
                .filter(|(_, s)| s.phase == phase)
                .map(|(i, _)| i)
                .collect();
            order.insert(phase, self.sort_phase(phase, &members)?);
        }
        self.order = Some(order);
        Ok(())
    }

    fn sort_phase(&self, phase: Phase, members: &[usize]) -> Result<Vec<usize>, HostError> {
        // edges[a] contains b  <=>  a runs before b
        let position: HashMap<usize, usize> = members
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); members.len()];
        let mut indegree: Vec<usize> = vec![0; members.len()];

        for (local, &global) in members.iter().enumerate() {
            let descriptor = self.systems[global].system.descriptor();
            for target in descriptor.before_edges() {
                if let Some(&other) = self.name_lookup.get(target).and_then(|g| position.get(g)) {
                    successors[local].push(other);
                    indegree[other] += 1;
                }
            }
            for target in descriptor.after_edges() {
                if let Some(&other) = self.name_lookup.get(target).and_then(|g| position.get(g)) {
                    successors[other].push(local);
                    indegree[local] += 1;
                }
            }
        }

        // Kahn's algorithm; the ready list stays sorted by registration
        // order so unconstrained systems execute deterministically.
        let mut ready: Vec<usize> = (0..members.len()).filter(|&i| indegree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(members.len());
        while let Some(local) = ready.first().copied() {
            ready.remove(0);
            sorted.push(members[local]);
            for &next in &successors[local] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(next);
                    ready.sort_unstable();
                }
            }
        }

        if sorted.len() != members.len() {
            let cycle_members = members
                .iter()
                .enumerate()
                .filter(|(local, _)| indegree[*local] > 0)
                .map(|(_, &global)| self.systems[global].name.clone())
                .collect();
            return Err(HostError::CycleDetected {
                phase,
                members: cycle_members,
            });
        }
        Ok(sorted)
    }

    /// Run every system of `phase` in the built order.
    pub fn run_phase(
        &mut self,
        phase: Phase,
        world: &mut World,
        events: &EventBus,
        dt: f64,
    ) -> Result<(), HostError> {
        let order = self.order.as_ref().ok_or(HostError::NotBuilt)?;
        let indices = order.get(&phase).cloned().unwrap_or_default();
        for index in indices {
            let entry = &mut self.systems[index];
            let mut ctx = SystemContext { world, events, dt };
            entry.system.run(&mut ctx);
        }
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.order.is_some()
    }

    /// Built execution order of a phase, by system name (diagnostics).
    pub fn phase_order(&self, phase: Phase) -> Vec<&str> {
        match &self.order {
            Some(order) => order
                .get(&phase)
                .map(|indices| {
                    indices
                        .iter()
                        .map(|&i| self.systems[i].name.as_str())
                        .collect()
                })
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

impl Default for SystemScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemDescriptor;
    use std::sync::{Arc, Mutex};

    struct Probe {
        descriptor: SystemDescriptor,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl System for Probe {
        fn descriptor(&self) -> SystemDescriptor {
            self.descriptor.clone()
        }

        fn run(&mut self, _ctx: &mut SystemContext<'_>) {
            self.log
                .lock()
                .unwrap()
                .push(self.descriptor.name().to_string());
        }
    }

    fn probe(descriptor: SystemDescriptor, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn System> {
        Box::new(Probe {
            descriptor,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn edges_order_execution() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = SystemScheduler::new();
        scheduler
            .register(probe(
                SystemDescriptor::new("integrate", Phase::Simulation).runs_after("input"),
                &log,
            ))
            .unwrap();
        scheduler
            .register(probe(
                SystemDescriptor::new("input", Phase::Simulation),
                &log,
            ))
            .unwrap();
        scheduler
            .register(probe(
                SystemDescriptor::new("collide", Phase::Simulation).runs_after("integrate"),
                &log,
            ))
            .unwrap();
        scheduler.build().unwrap();

        let mut world = World::new();
        let events = EventBus::new();
        scheduler
            .run_phase(Phase::Simulation, &mut world, &events, 0.016)
            .unwrap();

        assert_eq!(
            log.lock().unwrap().as_slice(),
            &["input", "integrate", "collide"]
        );
    }

    #[test]
    fn registration_order_breaks_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = SystemScheduler::new();
        for name in ["c", "a", "b"] {
            scheduler
                .register(probe(SystemDescriptor::new(name, Phase::Export), &log))
                .unwrap();
        }
        scheduler.build().unwrap();
        assert_eq!(scheduler.phase_order(Phase::Export), vec!["c", "a", "b"]);
    }

    #[test]
    fn cycle_fails_build_with_member_names() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = SystemScheduler::new();
        scheduler
            .register(probe(
                SystemDescriptor::new("a", Phase::Input).runs_before("b"),
                &log,
            ))
            .unwrap();
        scheduler
            .register(probe(
                SystemDescriptor::new("b", Phase::Input).runs_before("a"),
                &log,
            ))
            .unwrap();

        match scheduler.build() {
            Err(HostError::CycleDetected { phase, members }) => {
                assert_eq!(phase, Phase::Input);
                assert!(members.contains(&"a".to_string()));
                assert!(members.contains(&"b".to_string()));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn build_is_once_only() {
        let mut scheduler = SystemScheduler::new();
        scheduler.build().unwrap();
        assert_eq!(scheduler.build(), Err(HostError::AlreadyBuilt));

        let log = Arc::new(Mutex::new(Vec::new()));
        assert_eq!(
            scheduler.register(probe(SystemDescriptor::new("late", Phase::Input), &log)),
            Err(HostError::AlreadyBuilt)
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = SystemScheduler::new();
        scheduler
            .register(probe(SystemDescriptor::new("dup", Phase::Input), &log))
            .unwrap();
        assert!(matches!(
            scheduler.register(probe(SystemDescriptor::new("dup", Phase::Input), &log)),
            Err(HostError::DuplicateSystem { .. })
        ));
    }

    #[test]
    fn cross_phase_edges_are_ignored() {
        // Ordering hints only apply within a phase; phases already order
        // globally.
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = SystemScheduler::new();
        scheduler
            .register(probe(
                SystemDescriptor::new("exporter", Phase::Export).runs_before("input"),
                &log,
            ))
            .unwrap();
        scheduler
            .register(probe(SystemDescriptor::new("input", Phase::Input), &log))
            .unwrap();
        assert!(scheduler.build().is_ok());
    }
}
