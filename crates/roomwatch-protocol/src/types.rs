//! Core types for rooms, areas and the events re-emitted by controllers.
//!
//! Everything here is plain data: cheap to clone, serializable, and free of
//! any reference to the connection that produced it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A platform-assigned live room identifier.
///
/// Newtype over `u64` so a room id can never be confused with an area id
/// or a raffle id. `#[serde(transparent)]` keeps the JSON form a plain
/// number, which is what the platform API and downstream consumers use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl RoomId {
    /// Builds a room id, rejecting 0 (the platform never assigns it).
    pub fn new(id: u64) -> Result<Self, ProtocolError> {
        if id == 0 {
            return Err(ProtocolError::InvalidRoomId(id));
        }
        Ok(Self(id))
    }

    /// Returns the raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content area: a category grouping many rooms.
///
/// The raffle tier keeps exactly one monitor per area, so an `Area` is
/// also a connection-slot key. The numeric ids match the platform's
/// parent area ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum Area {
    Entertainment,
    OnlineGames,
    MobileGames,
    Painting,
    Radio,
    SingleGames,
}

impl Area {
    /// Every area, in platform id order.
    pub const ALL: [Area; 6] = [
        Area::Entertainment,
        Area::OnlineGames,
        Area::MobileGames,
        Area::Painting,
        Area::Radio,
        Area::SingleGames,
    ];

    /// The platform's numeric parent area id.
    pub fn id(self) -> u32 {
        match self {
            Self::Entertainment => 1,
            Self::OnlineGames => 2,
            Self::MobileGames => 3,
            Self::Painting => 4,
            Self::Radio => 5,
            Self::SingleGames => 6,
        }
    }

    /// The name shown to users of the platform.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Entertainment => "娱乐",
            Self::OnlineGames => "网游",
            Self::MobileGames => "手游",
            Self::Painting => "绘画",
            Self::Radio => "电台",
            Self::SingleGames => "单机",
        }
    }
}

impl TryFrom<u32> for Area {
    type Error = ProtocolError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Area::ALL
            .into_iter()
            .find(|area| area.id() == id)
            .ok_or(ProtocolError::UnknownArea(id))
    }
}

impl From<Area> for u32 {
    fn from(area: Area) -> u32 {
        area.id()
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}区", self.display_name())
    }
}

// ---------------------------------------------------------------------------
// Connection metadata
// ---------------------------------------------------------------------------

/// Address of the chat feed server every monitor connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedAddress {
    pub host: String,
    pub port: u16,
}

impl Default for FeedAddress {
    fn default() -> Self {
        Self {
            host: "broadcastlv.chat.bilibili.com".to_string(),
            port: 2243,
        }
    }
}

impl fmt::Display for FeedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Room metadata handed to a monitor at construction.
///
/// Guard monitors only know their room; raffle monitors also know the
/// area they were chosen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
}

impl RoomInfo {
    pub fn room(room_id: RoomId) -> Self {
        Self { room_id, area: None }
    }

    pub fn in_area(room_id: RoomId, area: Area) -> Self {
        Self {
            room_id,
            area: Some(area),
        }
    }
}

// ---------------------------------------------------------------------------
// Raffle payloads
// ---------------------------------------------------------------------------

/// The closed set of raffle categories a monitor can report.
///
/// Controllers forward every category under its own name; the set is
/// fixed so forwarding is a plain `match`, not a lookup by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaffleCategory {
    Gift,
    Guard,
    Pk,
    Storm,
    Anchor,
}

impl RaffleCategory {
    pub const ALL: [RaffleCategory; 5] = [
        RaffleCategory::Gift,
        RaffleCategory::Guard,
        RaffleCategory::Pk,
        RaffleCategory::Storm,
        RaffleCategory::Anchor,
    ];

    /// The event name this category is published under.
    pub fn name(self) -> &'static str {
        match self {
            Self::Gift => "gift",
            Self::Guard => "guard",
            Self::Pk => "pk",
            Self::Storm => "storm",
            Self::Anchor => "anchor",
        }
    }
}

impl fmt::Display for RaffleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RaffleCategory {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RaffleCategory::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| ProtocolError::UnknownCategory(s.to_string()))
    }
}

/// Extra fields carried only by anchor lotteries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorDetails {
    pub award_num: u32,
    pub gift_num: u32,
    pub gift_name: String,
    pub gift_price: u64,
    pub requirement: String,
    pub danmu: String,
}

/// A gift, guard, pk, storm or anchor raffle observed in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raffle {
    /// Platform raffle id. Unique per category, not globally.
    pub id: u64,
    #[serde(rename = "roomid")]
    pub room_id: RoomId,
    pub category: RaffleCategory,
    /// Platform-specific raffle type string (e.g. `"GIFT_30035"`).
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    /// Seconds to wait before the raffle may be joined.
    #[serde(default)]
    pub wait: u64,
    /// Unix timestamp (seconds) after which the raffle is gone.
    #[serde(default)]
    pub expire_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorDetails>,
}

// ---------------------------------------------------------------------------
// ControllerEvent: what controllers publish to their owner
// ---------------------------------------------------------------------------

/// An event published on a controller's hub.
///
/// Raffle events keep their category name as topic; the remaining variants
/// carry the room id the owner needs to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "data", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A raffle of any category, forwarded unchanged.
    Raffle(Raffle),
    /// The room produced something worth persisting.
    AddToDb(RoomId),
    /// A dynamic-tier room proved durable; the owner should move it to the
    /// fixed tier.
    ToFixed(RoomId),
    /// A room discovered through a raffle feed; candidate for dynamic
    /// monitoring.
    ToDynamic(RoomId),
}

impl ControllerEvent {
    /// The name this event is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Raffle(raffle) => raffle.category.name(),
            Self::AddToDb(_) => "add_to_db",
            Self::ToFixed(_) => "to_fixed",
            Self::ToDynamic(_) => "to_dynamic",
        }
    }

    /// The room id carried by non-raffle events.
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::Raffle(raffle) => raffle.room_id,
            Self::AddToDb(id) | Self::ToFixed(id) | Self::ToDynamic(id) => *id,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
