//! `EngineStatus`: the engine's externally observable progress, mutated
//! under a mutex and read concurrently by the HTTP surface.

use serde::Serialize;

/// A snapshot of the engine's connection/sync/height state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Whether the chain adapter has an established connection.
    pub connected: bool,
    /// Sync progress, rendered as `"X%"`.
    pub sync: String,
    /// Height of the most recently applied block, as a decimal string.
    pub current: String,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            connected: false,
            sync: "0%".to_string(),
            current: String::new(),
        }
    }
}
