// singleton.rs - Dedicated slots for singleton components

use super::ManagedRef;

pub(crate) enum SingletonValue {
    /// Packed POD payload, zero-initialized at registration.
    Unmanaged(Vec<u8>),
    /// Shared reference, unset until first write.
    Managed(Option<ManagedRef>),
}

/// One singleton slot; follows the same write-version rule as chunks.
pub(crate) struct SingletonSlot {
    pub(crate) value: SingletonValue,
    pub(crate) last_write_version: u64,
}

impl SingletonSlot {
    pub fn unmanaged(stride: usize) -> Self {
        Self {
            value: SingletonValue::Unmanaged(vec![0; stride]),
            last_write_version: 0,
        }
    }

    pub fn managed() -> Self {
        Self {
            value: SingletonValue::Managed(None),
            last_write_version: 0,
        }
    }

    pub fn copy_from(&mut self, source: &SingletonSlot) {
        match (&mut self.value, &source.value) {
            (SingletonValue::Unmanaged(dst), SingletonValue::Unmanaged(src)) => {
                dst.clear();
                dst.extend_from_slice(src);
            }
            (SingletonValue::Managed(dst), SingletonValue::Managed(src)) => {
                *dst = src.clone();
            }
            _ => unreachable!("singleton kind mismatch between schema-identical worlds"),
        }
        self.last_write_version = source.last_write_version;
    }
}
