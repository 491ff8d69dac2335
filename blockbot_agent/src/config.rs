// Agent tunables.
//
// Every timing and movement constant the actions and the scheduler read
// lives in `AgentConfig`, so behaviour can be adjusted from the client's
// JSON config file without recompiling. Missing keys fall back to the
// defaults below (`#[serde(default)]`), so a config file only needs to name
// what it changes.
//
// See also: `bot.rs` which owns the config, `action.rs` which reads it
// through the step context, and the client crate's `config.rs` which nests
// it under `agent`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Scheduler period in milliseconds.
    pub tick_ms: u64,
    /// Dig ticks per second of mining time.
    pub dig_tick_rate: f64,
    /// Furthest distance from the eye at which a block can be dug or placed.
    pub reach: f64,
    /// Distance covered by one `MoveTo` step.
    pub walk_step: f64,
    /// Ticks to wait after a teleport request for the server to move us.
    pub settle_ticks: u32,
    /// Manhattan bound on path search, both for goals and for expanded cells.
    pub max_path_radius: u32,
    /// Moves executed between re-plans while navigating.
    pub replan_interval: usize,
    /// Ticks a dig waits for its chunk before giving up.
    pub max_stuck_ticks: u32,
    /// Re-plans a single navigation may make before giving up.
    pub max_replans: u32,
    /// Whether standing cells need support below.
    pub allow_flight: bool,
    /// Eye height above the feet.
    pub eye_height: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            dig_tick_rate: 12.0,
            reach: 4.5,
            walk_step: 0.25,
            settle_ticks: 20,
            max_path_radius: 64,
            replan_interval: 8,
            max_stuck_ticks: 100,
            max_replans: 32,
            allow_flight: false,
            eye_height: 1.62,
        }
    }
}

impl AgentConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
