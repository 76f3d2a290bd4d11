//! Platform API collaborators for Roomwatch.
//!
//! [`BilibiliClient`] talks to the live platform's public HTTP API and
//! implements the controller collaborator traits:
//!
//! - [`TokenSource`](roomwatch_controller::TokenSource) via `getDanmuInfo`
//! - [`LiveStatus`](roomwatch_controller::LiveStatus) via `Room/get_info`
//! - [`RoomDiscovery`](roomwatch_controller::RoomDiscovery) via
//!   `area/getRoomList`, most watched rooms first

mod client;
mod config;
mod error;
mod response;

pub use client::BilibiliClient;
pub use config::ApiConfig;
pub use error::ApiError;
