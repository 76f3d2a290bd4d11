//! Platform collaborators consulted while setting up monitors.
//!
//! Roomwatch doesn't talk to the platform API itself. Each controller is
//! handed implementations of the traits below: the HTTP client in
//! `roomwatch-api` in production, scripted fakes in tests.
//!
//! All three are asynchronous and may fail with a [`ServiceError`]. A
//! failure never reaches the controller's owner; it is logged and the
//! attempt is abandoned (or, for the raffle tier, widened).

use std::future::Future;

use roomwatch_protocol::{Area, RoomId};

use crate::ServiceError;

/// Fetches the per-room credential a monitor needs to join a feed.
///
/// Called once per guard-tier setup, right before the monitor is built.
/// Reconnects after a monitor error reuse the token already handed over.
pub trait TokenSource: Send + Sync + 'static {
    /// Returns an opaque token for `room_id`.
    fn live_danmu_token(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;
}

/// Answers whether a room is broadcasting right now.
pub trait LiveStatus: Send + Sync + 'static {
    fn is_live(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<bool, ServiceError>> + Send;
}

/// Supplies candidate rooms for an area.
///
/// Implementations may be plain platform listings or a distributor that
/// splits areas between cooperating processes; controllers only see the
/// returned ids.
pub trait RoomDiscovery: Send + Sync + 'static {
    /// Returns at most `count` room ids, best candidates first.
    fn raffle_rooms_in_area(
        &self,
        area: Area,
        count: usize,
    ) -> impl Future<Output = Result<Vec<RoomId>, ServiceError>> + Send;
}
