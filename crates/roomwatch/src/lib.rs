//! # Roomwatch
//!
//! Keeps one feed connection per interesting live-chat room and re-emits
//! what those feeds report.
//!
//! Three controller tiers share the work: a fixed tier for assigned rooms,
//! a dynamic tier for churning ones and a raffle tier that keeps one room
//! per content area under watch. A [`Supervisor`] owns all three and routes
//! promotions between them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use roomwatch::prelude::*;
//!
//! roomwatch::telemetry::init("info");
//! let config = WatchConfig::load("roomwatch.json")?;
//! let client = Arc::new(BilibiliClient::new(config.api.clone())?);
//! let mut supervisor = Supervisor::spawn(config, Arc::new(MyMonitors), client, Arc::new(MyRooms));
//! supervisor.start().await?;
//! ```

mod config;
mod error;
mod supervisor;
pub mod telemetry;

pub use config::WatchConfig;
pub use error::{ConfigError, RoomwatchError};
pub use supervisor::{DynamicRoomSource, MonitoringCounts, Supervisor};

pub use roomwatch_api as api;
pub use roomwatch_controller as controller;
pub use roomwatch_dispatch as dispatch;
pub use roomwatch_protocol as protocol;

pub mod prelude {
    pub use std::sync::Arc;

    pub use roomwatch_api::{ApiConfig, ApiError, BilibiliClient};
    pub use roomwatch_controller::{
        ControllerConfig, ControllerError, GuardHandle, GuardTier, LiveStatus, Monitor,
        MonitorEvent, MonitorFactory, MonitorKind, MonitorSink, MonitorSpec, RaffleConfig,
        RaffleHandle, RoomDiscovery, ServiceError, TokenSource,
    };
    pub use roomwatch_dispatch::{DispatchConfig, DispatchQueue};
    pub use roomwatch_protocol::{Area, ControllerEvent, Raffle, RaffleCategory, RoomId, RoomInfo};

    pub use crate::{
        ConfigError, DynamicRoomSource, MonitoringCounts, RoomwatchError, Supervisor, WatchConfig,
    };
}
