use serde::{Deserialize, Serialize};

/// Settings for nested-composition frame synchronization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reported drift beyond this many frames forces a full re-seek.
    pub drift_tolerance_frames: i64,
    /// Seeks requested within this window are coalesced into one.
    pub seek_debounce_ms: u64,
    /// Half-width of the advisory preload window, in local frames.
    pub preload_frames: i64,
    pub preload_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { drift_tolerance_frames: 2, seek_debounce_ms: 16, preload_frames: 30, preload_enabled: true }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum undo depth; the oldest entries are dropped first.
    pub max_history: usize,
    /// Quiet period before a scheduled autosave is written.
    pub autosave_debounce_ms: u64,
    pub sync: SyncConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_history: 100, autosave_debounce_ms: 500, sync: SyncConfig::default() }
    }
}

impl EngineConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> { serde_json::from_str(raw) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{"max_history": 10, "sync": {"seek_debounce_ms": 40}, "extra": 1}"#).unwrap();
        assert_eq!(cfg.max_history, 10);
        assert_eq!(cfg.autosave_debounce_ms, 500);
        assert_eq!(cfg.sync.seek_debounce_ms, 40);
        assert_eq!(cfg.sync.drift_tolerance_frames, 2);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }
}
