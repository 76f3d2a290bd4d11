//! Shared vocabulary for Roomwatch.
//!
//! This crate defines the types every other layer talks in:
//!
//! - **Identity** ([`RoomId`], [`Area`]): which room or content area a
//!   connection slot belongs to.
//! - **Payloads** ([`Raffle`], [`RaffleCategory`], [`AnchorDetails`]): the
//!   structured events re-emitted to downstream consumers.
//! - **Hub events** ([`ControllerEvent`]): what a controller publishes to
//!   its owner.
//! - **Errors** ([`ProtocolError`]): parsing failures for ids and names.
//!
//! It knows nothing about connections, timers or HTTP.

mod error;
mod types;

pub use error::ProtocolError;
pub use types::{
    AnchorDetails, Area, ControllerEvent, FeedAddress, Raffle,
    RaffleCategory, RoomId, RoomInfo,
};
