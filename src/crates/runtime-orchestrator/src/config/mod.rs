//! Runtime configuration: environment knobs, storage paths, and webhook
//! routing, loaded from YAML via [`loader`].

pub mod loader;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;
use runtime_core::LoopConfig;

/// Top-level runtime config file shape. Every numeric knob mirrors a
/// `LoopConfig` field; `storage_root` roots every registered graph's
/// `FileSessionStore`/`FileCheckpointStore` unless overridden per graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub storage_root: PathBuf,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_tool_calls_per_turn")]
    pub max_tool_calls_per_turn: u32,
    #[serde(default)]
    pub max_history_tokens: Option<u32>,
    #[serde(default = "default_max_stall_retries")]
    pub max_stall_retries: u32,
    #[serde(default)]
    pub bind_addr: Option<String>,
}

fn default_max_iterations() -> u32 {
    50
}

fn default_max_tool_calls_per_turn() -> u32 {
    16
}

fn default_max_stall_retries() -> u32 {
    10
}

impl RuntimeConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, RuntimeError> {
        loader::load_yaml_config(path)
    }

    pub fn loop_config(&self) -> LoopConfig {
        let mut cfg = LoopConfig::default();
        cfg.max_iterations = self.max_iterations;
        cfg.max_tool_calls_per_turn = self.max_tool_calls_per_turn;
        cfg.max_history_tokens = self.max_history_tokens;
        cfg.max_stall_retries = self.max_stall_retries;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_defaults_when_knobs_are_omitted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "storageRoot: /tmp/agent-runtime").unwrap();
        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.max_tool_calls_per_turn, 16);
        assert!(config.max_history_tokens.is_none());
    }

    #[test]
    fn env_expansion_resolves_storage_root() {
        std::env::set_var("RUNTIME_STORAGE_ROOT_TEST", "/data/agents");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "storageRoot: \"${{RUNTIME_STORAGE_ROOT_TEST}}\"").unwrap();
        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/data/agents"));
        std::env::remove_var("RUNTIME_STORAGE_ROOT_TEST");
    }
}
