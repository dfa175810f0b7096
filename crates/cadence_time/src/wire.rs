// wire.rs - Fixed-width little-endian synchronization messages
//
// Field order and widths are the wire contract; encode/decode are explicit
// so the layout never depends on Rust struct padding.

use crate::error::TimeError;

/// 1 Hz master broadcast carrying the wall-clock reference for the PLL.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimePulse {
    pub master_wall_ticks: i64,
    pub sim_time_snapshot: f64,
    pub time_scale: f32,
    pub sequence_id: i64,
}

impl TimePulse {
    pub const WIRE_SIZE: usize = 28;

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0..8].copy_from_slice(&self.master_wall_ticks.to_le_bytes());
        out[8..16].copy_from_slice(&self.sim_time_snapshot.to_le_bytes());
        out[16..20].copy_from_slice(&self.time_scale.to_le_bytes());
        out[20..28].copy_from_slice(&self.sequence_id.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        let bytes: &[u8; Self::WIRE_SIZE] =
            bytes.try_into().map_err(|_| TimeError::Truncated {
                message: "TimePulse",
            })?;
        Ok(Self {
            master_wall_ticks: i64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            sim_time_snapshot: f64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            time_scale: f32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            sequence_id: i64::from_le_bytes(bytes[20..28].try_into().unwrap()),
        })
    }
}

/// Lockstep frame directive from the master.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameOrder {
    pub frame_id: i64,
    pub fixed_delta: f32,
}

impl FrameOrder {
    pub const WIRE_SIZE: usize = 12;

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0..8].copy_from_slice(&self.frame_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.fixed_delta.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        let bytes: &[u8; Self::WIRE_SIZE] =
            bytes.try_into().map_err(|_| TimeError::Truncated {
                message: "FrameOrder",
            })?;
        Ok(Self {
            frame_id: i64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            fixed_delta: f32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        })
    }
}

/// Slave acknowledgement that a lockstep frame has executed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameAck {
    pub frame_id: i64,
    pub node_id: i32,
}

impl FrameAck {
    pub const WIRE_SIZE: usize = 12;

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0..8].copy_from_slice(&self.frame_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.node_id.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        let bytes: &[u8; Self::WIRE_SIZE] =
            bytes.try_into().map_err(|_| TimeError::Truncated {
                message: "FrameAck",
            })?;
        Ok(Self {
            frame_id: i64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            node_id: i32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        })
    }
}

/// Time mode on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireTimeMode {
    Continuous = 0,
    Deterministic = 1,
}

impl WireTimeMode {
    fn from_u8(value: u8, message: &'static str) -> Result<Self, TimeError> {
        match value {
            0 => Ok(Self::Continuous),
            1 => Ok(Self::Deterministic),
            _ => Err(TimeError::Truncated { message }),
        }
    }
}

/// Coordinated controller swap announcement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwitchTimeMode {
    pub target_mode: WireTimeMode,
    /// Frame at which all nodes swap (stepped target only).
    pub barrier_frame: i64,
    /// Master frame when the switch was announced.
    pub reference_frame: i64,
}

impl SwitchTimeMode {
    pub const WIRE_SIZE: usize = 17;

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0] = self.target_mode as u8;
        out[1..9].copy_from_slice(&self.barrier_frame.to_le_bytes());
        out[9..17].copy_from_slice(&self.reference_frame.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        let bytes: &[u8; Self::WIRE_SIZE] =
            bytes.try_into().map_err(|_| TimeError::Truncated {
                message: "SwitchTimeMode",
            })?;
        Ok(Self {
            target_mode: WireTimeMode::from_u8(bytes[0], "SwitchTimeMode")?,
            barrier_frame: i64::from_le_bytes(bytes[1..9].try_into().unwrap()),
            reference_frame: i64::from_le_bytes(bytes[9..17].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_wire_layout() {
        let pulse = TimePulse {
            master_wall_ticks: 0x0102_0304_0506_0708,
            sim_time_snapshot: 1.5,
            time_scale: 2.0,
            sequence_id: 9,
        };
        let bytes = pulse.encode();
        // Little-endian: least significant byte first.
        assert_eq!(bytes[0], 0x08);
        assert_eq!(bytes[7], 0x01);
        assert_eq!(TimePulse::decode(&bytes).unwrap(), pulse);
    }

    #[test]
    fn order_and_ack_roundtrip() {
        let order = FrameOrder {
            frame_id: 42,
            fixed_delta: 1.0 / 60.0,
        };
        assert_eq!(FrameOrder::decode(&order.encode()).unwrap(), order);

        let ack = FrameAck {
            frame_id: 42,
            node_id: 3,
        };
        assert_eq!(FrameAck::decode(&ack.encode()).unwrap(), ack);
    }

    #[test]
    fn switch_rejects_unknown_mode() {
        let msg = SwitchTimeMode {
            target_mode: WireTimeMode::Deterministic,
            barrier_frame: 100,
            reference_frame: 95,
        };
        let mut bytes = msg.encode();
        assert_eq!(SwitchTimeMode::decode(&bytes).unwrap(), msg);

        bytes[0] = 7;
        assert!(SwitchTimeMode::decode(&bytes).is_err());
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert!(TimePulse::decode(&[0u8; 5]).is_err());
        assert!(FrameOrder::decode(&[0u8; 11]).is_err());
    }
}
