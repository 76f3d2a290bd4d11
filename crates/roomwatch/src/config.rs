//! Process-level configuration.

use std::path::Path;
use std::time::Duration;

use roomwatch_api::ApiConfig;
use roomwatch_controller::{ControllerConfig, RaffleConfig};
use roomwatch_protocol::RoomId;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Everything a [`Supervisor`](crate::Supervisor) needs, loadable from JSON.
///
/// Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Feed address, dispatch rate and channel sizes, shared by all tiers.
    pub controller: ControllerConfig,

    pub raffle: RaffleConfig,

    pub api: ApiConfig,

    /// Rooms handed to the fixed tier on start.
    pub fixed_rooms: Vec<RoomId>,

    /// Seconds between dynamic room refreshes.
    pub dynamic_refresh_secs: u64,

    /// Route rooms discovered by raffle monitors into the dynamic tier.
    pub promote_raffle_rooms: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            raffle: RaffleConfig::default(),
            api: ApiConfig::default(),
            fixed_rooms: Vec::new(),
            dynamic_refresh_secs: 300,
            promote_raffle_rooms: false,
        }
    }
}

impl WatchConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn dynamic_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.dynamic_refresh_secs)
    }

    pub fn validated(mut self) -> Self {
        self.controller = self.controller.validated();
        self.raffle = self.raffle.validated();
        self.api = self.api.validated();
        if self.dynamic_refresh_secs == 0 {
            tracing::warn!("dynamic_refresh_secs of 0, using 1");
            self.dynamic_refresh_secs = 1;
        }
        self.fixed_rooms.sort_unstable();
        self.fixed_rooms.dedup();
        self
    }
}
