//! Room controllers for Roomwatch.
//!
//! A controller owns a set of connection slots, one live monitor per key,
//! and keeps that set healthy under churn: it fetches credentials, starts
//! monitors through a rate-limited dispatch queue, reconnects them on error
//! and forgets them on close. Each controller runs as an isolated Tokio task
//! (actor model); owners talk to it through a cloneable handle and listen
//! to its broadcast hub.
//!
//! # Key types
//!
//! - [`GuardController`] / [`GuardHandle`]: one slot per room; the
//!   [`GuardTier`] value picks fixed or dynamic behaviour
//! - [`RaffleController`] / [`RaffleHandle`]: one slot per [`Area`],
//!   discovering a live room to watch in each
//! - [`Monitor`] / [`MonitorFactory`]: the feed connection contract
//! - [`TokenSource`], [`LiveStatus`], [`RoomDiscovery`]: platform
//!   collaborators consulted during setup
//! - [`RoomidHandler`]: dedup of rooms discovered through raffle feeds
//!
//! [`Area`]: roomwatch_protocol::Area

mod config;
mod slots;
mod error;
mod guard;
mod monitor;
mod raffle;
mod roomid;
mod service;

pub use config::{ControllerConfig, RaffleConfig};
pub use error::{ControllerError, ServiceError};
pub use guard::{GuardController, GuardHandle, GuardTier};
pub use monitor::{Monitor, MonitorEvent, MonitorFactory, MonitorKind, MonitorSink, MonitorSpec};
pub use raffle::{RaffleController, RaffleHandle};
pub use roomid::RoomidHandler;
pub use service::{LiveStatus, RoomDiscovery, TokenSource};
