//! Runtime configuration for a [`crate::engine::VirtualMachine`] run.
//!
//! A plain `serde`-derived struct with `#[serde(default)]` field-level
//! fallbacks, in the same shape as this codebase's other configuration
//! structs, repurposed from "which files make up a workspace" to "how
//! permissive should this run be."

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tunables the embedding host can set before calling
/// [`crate::engine::VirtualMachine::execute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Ordered list of directories searched for workspace-relative
    /// (`/`-prefixed) `@path` directives (§4.3).
    pub search_paths: Vec<PathBuf>,
    /// If `true`, a `@path` directive that cannot be resolved to an
    /// existing file aborts loading with an error. Default `false`: the
    /// directive's placeholder (an empty classifier set) is retained and
    /// loading continues (§4.1, §4.3).
    pub unresolved_path_is_error: bool,
    /// If `true`, a `do { ... }` rule body is rejected as an unsupported
    /// construct at parse time rather than silently discarded (§4.2,
    /// Non-goals: imperative statement execution is out of scope either
    /// way — this only controls whether the parser complains).
    pub reject_do_bodies: bool,
    /// Defensive bound on how many FIFO passes the lazy-binding drain
    /// makes over the queue. The documented model is a single pass;
    /// this exists so a host can opt into iterating for as long as a
    /// pass still resolves the queue (see
    /// [`crate::engine::VirtualMachine`]'s drain loop), without risking
    /// an unbounded loop.
    pub max_lazy_binding_drain_passes: u32,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            unresolved_path_is_error: false,
            reject_do_bodies: false,
            max_lazy_binding_drain_passes: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_behaviour() {
        let cfg = VmConfig::default();
        assert!(!cfg.unresolved_path_is_error);
        assert!(!cfg.reject_do_bodies);
        assert_eq!(cfg.max_lazy_binding_drain_passes, 1);
        assert!(cfg.search_paths.is_empty());
    }

    #[test]
    fn deserializes_with_partial_overrides() {
        let json = r#"{"unresolved_path_is_error": true}"#;
        let cfg: VmConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.unresolved_path_is_error);
        assert_eq!(cfg.max_lazy_binding_drain_passes, 1);
    }
}
