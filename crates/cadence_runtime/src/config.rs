//! Runtime configuration loading

use anyhow::Context;
use cadence_host::ProviderTuning;
use cadence_time::TimeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level runtime configuration, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Frames to simulate before exiting.
    pub frames: u64,
    /// Entities spawned at startup.
    pub vehicle_count: u32,
    pub time: TimeConfig,
    pub providers: ProviderTuning,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frames: 300,
            vehicle_count: 64,
            time: TimeConfig::default(),
            providers: ProviderTuning::default(),
        }
    }
}

impl HostConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json() {
        let config = HostConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let parsed: HostConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.frames, config.frames);
        assert_eq!(parsed.vehicle_count, config.vehicle_count);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let parsed: HostConfig = serde_json::from_str(r#"{"frames": 10}"#).unwrap();
        assert_eq!(parsed.frames, 10);
        assert_eq!(parsed.vehicle_count, 64);
    }
}
