//! Command handler modules for gcare-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod payment;
pub mod status;

use anyhow::Result;
use gcare_config::LoadedConfig;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config from `--config` paths in merge order.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    gcare_config::load_layered_yaml(&path_refs)
}

pub fn opt_str(v: Option<&str>) -> &str {
    v.unwrap_or("none")
}
