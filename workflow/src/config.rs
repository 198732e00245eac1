use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STEP_LATENCY_MS: u64 = 300;
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30;

/// Engine settings read from `config.toml` in the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulated round trip of every automated step.
    pub step_latency_ms: u64,
    /// Deadline for a single executor call; exceeding it fails the step.
    pub step_timeout_secs: u64,
    /// Extra workflow definitions (YAML or TOML) registered on seed.
    pub definitions_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_latency_ms: DEFAULT_STEP_LATENCY_MS,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            definitions_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&contents)
            .with_context(|| format!("parse engine config {}", path.display()))?;
        if config.step_timeout_secs == 0 {
            anyhow::bail!("step_timeout_secs must be greater than zero");
        }
        Ok(config)
    }

    /// Like [`EngineConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn step_latency(&self) -> Duration {
        Duration::from_millis(self.step_latency_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}
