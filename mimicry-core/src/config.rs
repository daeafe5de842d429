//! Immutable per-search configuration, threaded by reference.
//!
//! The engine never reads ambient global state: everything tunable arrives
//! here, once, at the start of a call.

use crate::versions::VersionId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Wall-clock budget for one `resolve` call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prefer encounters from this version before generational order.
    #[serde(default)]
    pub prioritize_version: Option<VersionId>,
    /// Restrict the search to the destination version and its pair.
    #[serde(default)]
    pub native_only: bool,
    /// Honor an explicitly forced ball against fixed-ball contexts.
    #[serde(default)]
    pub force_specified_ball: bool,
    /// Pick a color-matching ball when none is forced.
    #[serde(default = "default_true")]
    pub set_matching_balls: bool,
    /// Apply IV-derived markings during post-processing.
    #[serde(default = "default_true")]
    pub use_markings: bool,
    /// Apply every legal ribbon during post-processing.
    #[serde(default = "default_true")]
    pub set_all_legal_ribbons: bool,
    /// Attempt the speculative battle-ready toggle.
    #[serde(default)]
    pub set_battle_flag: bool,
    /// Allow `OT:`/`TID:`-style trainer overrides from instructions.
    #[serde(default)]
    pub allow_trainer_override: bool,
    /// Expected encounter-data revision; mismatch short-circuits the call.
    #[serde(default)]
    pub expected_data_version: Option<String>,
    /// Skip the freshness gate entirely.
    #[serde(default)]
    pub dev_mode: bool,
}

const fn default_timeout_secs() -> u64 {
    15
}

const fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            prioritize_version: None,
            native_only: false,
            force_specified_ball: false,
            set_matching_balls: true,
            use_markings: true,
            set_all_legal_ribbons: true,
            set_battle_flag: false,
            allow_trainer_override: false,
            expected_data_version: None,
            dev_mode: false,
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
