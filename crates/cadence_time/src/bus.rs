// bus.rs - In-process synchronization bus
//
// Stands in for the transport layer: master and slaves share one bus, each
// node owns a mailbox, broadcasts fan out to every mailbox but the sender's.
// Queues preserve publish order per message kind.

use crate::wire::{FrameAck, FrameOrder, SwitchTimeMode, TimePulse};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Node identity on the bus. The master conventionally uses 0.
pub type NodeId = i32;

pub const MASTER_NODE: NodeId = 0;

#[derive(Default)]
struct Mailbox {
    pulses: VecDeque<TimePulse>,
    orders: VecDeque<FrameOrder>,
    acks: VecDeque<FrameAck>,
    switches: VecDeque<SwitchTimeMode>,
}

/// Shared message fabric for the time subsystem.
pub struct SyncBus {
    inner: Mutex<HashMap<NodeId, Mailbox>>,
}

impl SyncBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create the node's mailbox. Idempotent.
    pub fn join(&self, node: NodeId) {
        self.inner.lock().unwrap().entry(node).or_default();
    }

    pub fn broadcast_pulse(&self, from: NodeId, pulse: TimePulse) {
        let mut inner = self.inner.lock().unwrap();
        for (&node, mailbox) in inner.iter_mut() {
            if node != from {
                mailbox.pulses.push_back(pulse);
            }
        }
    }

    pub fn broadcast_order(&self, from: NodeId, order: FrameOrder) {
        let mut inner = self.inner.lock().unwrap();
        for (&node, mailbox) in inner.iter_mut() {
            if node != from {
                mailbox.orders.push_back(order);
            }
        }
    }

    pub fn broadcast_switch(&self, from: NodeId, msg: SwitchTimeMode) {
        let mut inner = self.inner.lock().unwrap();
        for (&node, mailbox) in inner.iter_mut() {
            if node != from {
                mailbox.switches.push_back(msg);
            }
        }
    }

    /// Acks travel point-to-point to the master's mailbox.
    pub fn send_ack(&self, to: NodeId, ack: FrameAck) {
        let mut inner = self.inner.lock().unwrap();
        inner.entry(to).or_default().acks.push_back(ack);
    }

    pub fn drain_pulses(&self, node: NodeId) -> Vec<TimePulse> {
        self.drain(node, |m| &mut m.pulses)
    }

    pub fn drain_orders(&self, node: NodeId) -> Vec<FrameOrder> {
        self.drain(node, |m| &mut m.orders)
    }

    pub fn drain_acks(&self, node: NodeId) -> Vec<FrameAck> {
        self.drain(node, |m| &mut m.acks)
    }

    pub fn drain_switches(&self, node: NodeId) -> Vec<SwitchTimeMode> {
        self.drain(node, |m| &mut m.switches)
    }

    fn drain<T>(&self, node: NodeId, pick: impl FnOnce(&mut Mailbox) -> &mut VecDeque<T>) -> Vec<T> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(&node) {
            Some(mailbox) => pick(mailbox).drain(..).collect(),
            None => Vec::new(),
        }
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_skips_the_sender() {
        let bus = SyncBus::new();
        bus.join(MASTER_NODE);
        bus.join(1);
        bus.join(2);

        bus.broadcast_order(
            MASTER_NODE,
            FrameOrder {
                frame_id: 0,
                fixed_delta: 0.016,
            },
        );

        assert!(bus.drain_orders(MASTER_NODE).is_empty());
        assert_eq!(bus.drain_orders(1).len(), 1);
        assert_eq!(bus.drain_orders(2).len(), 1);
        // Drained mailboxes stay empty.
        assert!(bus.drain_orders(1).is_empty());
    }

    #[test]
    fn acks_are_point_to_point() {
        let bus = SyncBus::new();
        bus.join(MASTER_NODE);
        bus.join(1);

        bus.send_ack(
            MASTER_NODE,
            FrameAck {
                frame_id: 0,
                node_id: 1,
            },
        );
        assert_eq!(bus.drain_acks(MASTER_NODE).len(), 1);
        assert!(bus.drain_acks(1).is_empty());
    }
}
