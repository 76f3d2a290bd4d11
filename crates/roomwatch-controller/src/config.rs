//! Controller configuration.

use roomwatch_dispatch::DispatchConfig;
use roomwatch_protocol::{Area, FeedAddress};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Settings shared by every controller tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Feed server every monitor connects to.
    pub feed: FeedAddress,

    /// Rate limit for monitor starts. One queue per controller instance.
    pub dispatch: DispatchConfig,

    /// Capacity of the event hub. Subscribers that fall further behind
    /// than this skip events.
    pub event_capacity: usize,

    /// Capacity of the command channel between handles and the actor.
    pub command_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            feed: FeedAddress::default(),
            dispatch: DispatchConfig::default(),
            event_capacity: 1024,
            command_capacity: 64,
        }
    }
}

impl ControllerConfig {
    /// Replace zero capacities, which tokio channels reject.
    pub fn validated(mut self) -> Self {
        if self.event_capacity == 0 {
            warn!("event_capacity of 0, using 1");
            self.event_capacity = 1;
        }
        if self.command_capacity == 0 {
            warn!("command_capacity of 0, using 1");
            self.command_capacity = 1;
        }
        self.dispatch = self.dispatch.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// RaffleConfig
// ---------------------------------------------------------------------------

/// Settings specific to the raffle tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaffleConfig {
    /// Areas to keep covered, one monitor each.
    pub areas: Vec<Area>,

    /// Candidate rooms requested on the first discovery of an area.
    pub initial_query: usize,

    /// How many more candidates to request after an all-offline scan.
    pub query_step: usize,

    /// Once a scan of this many candidates finds nothing live, give up on
    /// the area until the next trigger.
    pub max_query: usize,

    /// How long a room discovered through a raffle feed is remembered
    /// before it may be offered for dynamic monitoring again.
    pub roomid_ttl_secs: u64,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            areas: Area::ALL.to_vec(),
            initial_query: 10,
            query_step: 10,
            max_query: 1000,
            roomid_ttl_secs: 600,
        }
    }
}

impl RaffleConfig {
    /// Clamp values that would stall or loop the area scan.
    pub fn validated(mut self) -> Self {
        if self.initial_query == 0 {
            warn!("initial_query of 0, using 1");
            self.initial_query = 1;
        }
        if self.query_step == 0 {
            warn!("query_step of 0, using 1");
            self.query_step = 1;
        }
        let mut seen = Vec::with_capacity(self.areas.len());
        self.areas.retain(|area| {
            let fresh = !seen.contains(area);
            seen.push(*area);
            fresh
        });
        self
    }
}
