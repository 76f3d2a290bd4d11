//! The `Monitor` contract: what a controller needs from a feed connection.
//!
//! A monitor is a long-lived network object decoding one room's chat feed.
//! Controllers own its lifecycle (start, destroy) and its slot membership,
//! never its protocol state. Monitors report back through a [`MonitorSink`]
//! handed to them at construction; the sink routes every event into the
//! owning controller's task, so reactions run one at a time.

use std::fmt;
use std::sync::Arc;

use roomwatch_protocol::{FeedAddress, Raffle, RoomId, RoomInfo};

use crate::ControllerError;

/// Which monitor variant a controller asks its factory for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorKind {
    /// Permanent guard monitoring of an assigned room.
    FixedGuard,
    /// Provisional guard monitoring; may flag the room for promotion.
    DynamicGuard,
    /// Area-wide raffle monitoring of one discovered room.
    Raffle,
}

impl MonitorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::FixedGuard => "fixed",
            Self::DynamicGuard => "dynamic",
            Self::Raffle => "raffle",
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a factory needs to build one monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSpec {
    pub kind: MonitorKind,
    pub addr: FeedAddress,
    pub info: RoomInfo,
    /// Feed credential. Raffle monitors connect anonymously.
    pub token: Option<String>,
}

/// An event reported by a monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A raffle of any category was seen in the feed.
    Raffle(Raffle),
    /// The feed is gone for good; the slot should be released.
    Close,
    /// The connection dropped but the monitor can be restarted in place.
    Error(String),
    /// The room produced something worth persisting.
    AddToDb(RoomId),
    /// Raffle monitors only: another room announced through the feed.
    DiscoveredRoom(RoomId),
}

/// Where a monitor sends its events.
///
/// Cheap to clone. Emitting never blocks and never fails; events from a
/// monitor whose slot has already been released are dropped by the
/// controller.
#[derive(Clone)]
pub struct MonitorSink {
    emit: Arc<dyn Fn(MonitorEvent) + Send + Sync>,
}

impl MonitorSink {
    pub fn new(emit: impl Fn(MonitorEvent) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn emit(&self, event: MonitorEvent) {
        (self.emit)(event);
    }
}

impl fmt::Debug for MonitorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorSink").finish_non_exhaustive()
    }
}

/// A persistent feed connection for one room.
///
/// # Trait bounds
///
/// Monitors are shared between the controller's slot map and the start
/// tasks sitting in its dispatch queue, so they live behind an `Arc` and
/// must be `Send + Sync`. Both methods take `&self`: implementations keep
/// their connection state behind their own synchronization.
pub trait Monitor: Send + Sync + 'static {
    /// (Re)establishes the feed connection.
    ///
    /// Called through the dispatch queue on first start and on guard-tier
    /// reconnects, directly on raffle-tier reconnects. Returning `Err`
    /// means the attempt could not even begin; the failure is logged.
    fn start(&self) -> Result<(), ControllerError>;

    /// Tears the connection down irrecoverably.
    fn destroy(&self);

    /// Whether a dynamic-tier room has proven durable enough to be moved to
    /// the fixed tier. Read once, when the monitor closes. Default: never.
    fn to_fixed(&self) -> bool {
        false
    }
}

/// Builds monitors on behalf of controllers.
///
/// One factory is usually shared by every controller of a process.
pub trait MonitorFactory: Send + Sync + 'static {
    type Monitor: Monitor;

    /// Creates a monitor that is not yet connected.
    ///
    /// The monitor must report through `sink` and must not connect before
    /// [`Monitor::start`] is called.
    fn create(&self, spec: MonitorSpec, sink: MonitorSink) -> Self::Monitor;
}
