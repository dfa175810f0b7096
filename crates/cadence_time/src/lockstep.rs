// lockstep.rs - Deterministic stepped time, master and slave
//
// The master owns the slave roster. Each frame it publishes a FrameOrder and
// advances only after every declared slave has acknowledged that frame.
// Slaves execute exactly the ordered frames with the ordered fixed delta, so
// every node sees the identical dt sequence.

use crate::bus::{NodeId, SyncBus};
use crate::error::TimeError;
use crate::sample::{TimeSample, TimeState};
use crate::wire::{FrameAck, FrameOrder};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct LockstepMaster {
    bus: Arc<SyncBus>,
    node: NodeId,
    slaves: BTreeSet<NodeId>,
    acked: HashSet<NodeId>,
    fixed_delta: f32,
    /// Frame currently awaiting acknowledgements.
    current_frame: i64,
    order_published: bool,
    waiting_since: Option<Instant>,
    total_time: f64,
    time_scale: f64,
}

impl LockstepMaster {
    pub fn new(
        bus: Arc<SyncBus>,
        node: NodeId,
        slaves: impl IntoIterator<Item = NodeId>,
        fixed_delta: f32,
    ) -> Self {
        bus.join(node);
        Self {
            bus,
            node,
            slaves: slaves.into_iter().collect(),
            acked: HashSet::new(),
            fixed_delta,
            current_frame: 0,
            order_published: false,
            waiting_since: None,
            total_time: 0.0,
            time_scale: 1.0,
        }
    }

    /// Publish the order if needed, collect acks, and advance when the
    /// barrier is complete. Returns a zero-dt sample while waiting.
    pub fn update(&mut self) -> TimeSample {
        if !self.order_published {
            self.publish_order();
        }

        for ack in self.bus.drain_acks(self.node) {
            // Stale acknowledgements from frames we already left are noise.
            if ack.frame_id < self.current_frame {
                continue;
            }
            if ack.frame_id == self.current_frame && self.slaves.contains(&ack.node_id) {
                self.acked.insert(ack.node_id);
            }
        }

        if self.slaves.iter().all(|node| self.acked.contains(node)) {
            return self.advance();
        }

        if self.waiting_since.is_none() {
            self.waiting_since = Some(Instant::now());
        }
        TimeSample::waiting(self.total_time, self.current_frame, self.time_scale)
    }

    /// Manual mode: advance unconditionally by `fixed_delta` and publish the
    /// next order without waiting for the current barrier.
    pub fn step(&mut self, fixed_delta: f32) -> TimeSample {
        self.fixed_delta = fixed_delta;
        if !self.order_published {
            self.publish_order();
        }
        self.advance()
    }

    fn publish_order(&mut self) {
        self.bus.broadcast_order(
            self.node,
            FrameOrder {
                frame_id: self.current_frame,
                fixed_delta: self.fixed_delta,
            },
        );
        self.order_published = true;
    }

    fn advance(&mut self) -> TimeSample {
        let dt = self.fixed_delta as f64 * self.time_scale;
        self.total_time += dt;
        self.current_frame += 1;
        self.acked.clear();
        self.order_published = false;
        self.waiting_since = None;

        TimeSample {
            dt,
            unscaled_dt: self.fixed_delta as f64,
            total_time: self.total_time,
            frame_number: self.current_frame,
            time_scale: self.time_scale,
        }
    }

    /// Slaves that have not acknowledged the current frame within `deadline`
    /// of the first waiting update.
    pub fn poll_peers(&self, deadline: Duration) -> Result<(), TimeError> {
        let Some(since) = self.waiting_since else {
            return Ok(());
        };
        if since.elapsed() < deadline {
            return Ok(());
        }
        match self.slaves.iter().find(|node| !self.acked.contains(node)) {
            Some(&node) => Err(TimeError::PeerUnreachable { node }),
            None => Ok(()),
        }
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale;
    }

    pub fn state(&self) -> TimeState {
        TimeState {
            total_time: self.total_time,
            frame_number: self.current_frame,
            time_scale: self.time_scale,
        }
    }

    pub fn seed_state(&mut self, state: TimeState) {
        self.total_time = state.total_time;
        self.current_frame = state.frame_number;
        self.time_scale = state.time_scale;
        self.acked.clear();
        self.order_published = false;
        self.waiting_since = None;
    }
}

pub struct LockstepSlave {
    bus: Arc<SyncBus>,
    node: NodeId,
    master: NodeId,
    expected_frame: i64,
    total_time: f64,
    time_scale: f64,
}

impl LockstepSlave {
    pub fn new(bus: Arc<SyncBus>, node: NodeId, master: NodeId) -> Self {
        bus.join(node);
        Self {
            bus,
            node,
            master,
            expected_frame: 0,
            total_time: 0.0,
            time_scale: 1.0,
        }
    }

    /// Execute the next ordered frame if its order has arrived; otherwise
    /// return a zero-dt sample.
    pub fn update(&mut self) -> TimeSample {
        let mut executed: Option<TimeSample> = None;
        for order in self.bus.drain_orders(self.node) {
            if order.frame_id != self.expected_frame {
                // Stale or rebroadcast orders are dropped.
                continue;
            }
            let dt = order.fixed_delta as f64 * self.time_scale;
            self.total_time += dt;
            self.expected_frame += 1;
            self.bus.send_ack(
                self.master,
                FrameAck {
                    frame_id: order.frame_id,
                    node_id: self.node,
                },
            );
            executed = Some(TimeSample {
                dt,
                unscaled_dt: order.fixed_delta as f64,
                total_time: self.total_time,
                frame_number: self.expected_frame,
                time_scale: self.time_scale,
            });
            // One frame per update; later orders wait for the next update.
            break;
        }

        executed.unwrap_or_else(|| {
            TimeSample::waiting(self.total_time, self.expected_frame, self.time_scale)
        })
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale;
    }

    pub fn state(&self) -> TimeState {
        TimeState {
            total_time: self.total_time,
            frame_number: self.expected_frame,
            time_scale: self.time_scale,
        }
    }

    pub fn seed_state(&mut self, state: TimeState) {
        self.total_time = state.total_time;
        self.expected_frame = state.frame_number;
        self.time_scale = state.time_scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MASTER_NODE;

    const DELTA: f32 = 1.0 / 60.0;

    fn rig(slaves: &[NodeId]) -> (Arc<SyncBus>, LockstepMaster, Vec<LockstepSlave>) {
        let bus = Arc::new(SyncBus::new());
        let master = LockstepMaster::new(
            Arc::clone(&bus),
            MASTER_NODE,
            slaves.iter().copied(),
            DELTA,
        );
        let slave_controllers = slaves
            .iter()
            .map(|&node| LockstepSlave::new(Arc::clone(&bus), node, MASTER_NODE))
            .collect();
        (bus, master, slave_controllers)
    }

    #[test]
    fn happy_path_advances_after_all_acks() {
        let (_bus, mut master, mut slaves) = rig(&[1, 2, 3]);

        // Frame 0 order goes out; nothing acked yet.
        let sample = master.update();
        assert_eq!(sample.dt, 0.0);
        assert_eq!(sample.frame_number, 0);

        for slave in &mut slaves {
            let sample = slave.update();
            assert!((sample.dt - DELTA as f64).abs() < 1e-9);
            assert_eq!(sample.frame_number, 1);
        }

        let sample = master.update();
        assert!((sample.dt - DELTA as f64).abs() < 1e-9);
        assert_eq!(sample.frame_number, 1);
        assert!((sample.total_time - DELTA as f64).abs() < 1e-9);
    }

    #[test]
    fn master_waits_for_every_declared_slave() {
        let (_bus, mut master, mut slaves) = rig(&[1, 2]);

        master.update();
        // Only slave 1 executes.
        slaves[0].update();

        let sample = master.update();
        assert_eq!(sample.dt, 0.0, "one ack missing; master must not advance");

        slaves[1].update();
        let sample = master.update();
        assert!(sample.dt > 0.0);
    }

    #[test]
    fn stale_acks_are_ignored() {
        let (bus, mut master, mut slaves) = rig(&[1]);

        master.update();
        slaves[0].update();
        assert!(master.update().dt > 0.0);

        // Re-send an ack for the finished frame 0; it must not count toward
        // frame 1.
        bus.send_ack(
            MASTER_NODE,
            FrameAck {
                frame_id: 0,
                node_id: 1,
            },
        );
        let sample = master.update();
        assert_eq!(sample.dt, 0.0);
    }

    #[test]
    fn manual_step_advances_unconditionally() {
        let (_bus, mut master, mut slaves) = rig(&[1]);

        let sample = master.step(DELTA);
        assert!((sample.dt - DELTA as f64).abs() < 1e-9);
        assert_eq!(sample.frame_number, 1);

        // The slave still executes the published order.
        let sample = slaves[0].update();
        assert_eq!(sample.frame_number, 1);
    }

    #[test]
    fn slave_returns_zero_dt_without_order() {
        let (_bus, _master, mut slaves) = rig(&[1]);
        let sample = slaves[0].update();
        assert_eq!(sample.dt, 0.0);
        assert_eq!(sample.frame_number, 0);
    }

    #[test]
    fn unreachable_peer_is_reported_after_deadline() {
        let (_bus, mut master, _slaves) = rig(&[1]);
        master.update();
        // Deadline of zero trips immediately once waiting.
        assert_eq!(
            master.poll_peers(Duration::ZERO),
            Err(TimeError::PeerUnreachable { node: 1 })
        );
    }

    #[test]
    fn identical_dt_sequence_on_both_sides() {
        let (_bus, mut master, mut slaves) = rig(&[1]);
        let mut master_dts = Vec::new();
        let mut slave_dts = Vec::new();

        for _ in 0..5 {
            loop {
                let sample = master.update();
                if sample.dt > 0.0 {
                    master_dts.push(sample.dt);
                    break;
                }
                let sample = slaves[0].update();
                if sample.dt > 0.0 {
                    slave_dts.push(sample.dt);
                }
            }
        }
        assert_eq!(master_dts, slave_dts);
        assert_eq!(master_dts.len(), 5);
    }
}
