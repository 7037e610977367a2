//! Polling and watch-run configuration.

use std::path::Path;
use std::time::Duration;

use fullgrad_core::Mode;
use fullgrad_explain::TensorNames;
use fullgrad_render::RenderConfig;
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Configuration of the polling loop.
///
/// Durations are written as milliseconds (`interval_ms`, `timeout_ms`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Fixed sleep between polls.
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,
    /// Give up after this long; `None` polls until the job ends.
    #[serde(rename = "timeout_ms", with = "opt_millis")]
    pub timeout: Option<Duration>,
    /// Mode whose steps are watched.
    pub mode: Mode,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: None,
            mode: Mode::Eval,
        }
    }
}

impl PollConfig {
    /// Set the poll interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the watched mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// Everything a watch run needs, loadable from one JSON file.
///
/// Missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Tensor naming in the store.
    pub tensors: TensorNames,
    /// Figure rendering.
    pub render: RenderConfig,
    /// Polling loop.
    pub poll: PollConfig,
    /// Class names, indexed by class.
    pub labels: Vec<String>,
}

impl WatchConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MonitorError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
