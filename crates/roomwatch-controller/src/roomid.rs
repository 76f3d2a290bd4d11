//! Dedup of room ids announced through raffle feeds.

use std::collections::HashMap;
use std::time::Duration;

use roomwatch_protocol::RoomId;
use tokio::time::Instant;

/// Remembers recently discovered rooms so each one is offered for dynamic
/// monitoring at most once per `ttl`.
///
/// Owned by the raffle controller and started and stopped with it. A stopped
/// handler forgets everything and accepts nothing.
#[derive(Debug)]
pub struct RoomidHandler {
    ttl: Duration,
    seen: HashMap<RoomId, Instant>,
    running: bool,
}

impl RoomidHandler {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: HashMap::new(),
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.seen.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Records `room_id`. Returns `true` only if it was not seen within the
    /// last `ttl` and the handler is running.
    pub fn add(&mut self, room_id: RoomId) -> bool {
        if !self.running {
            return false;
        }
        let now = Instant::now();
        self.seen
            .retain(|_, seen_at| now.duration_since(*seen_at) < self.ttl);
        if self.seen.contains_key(&room_id) {
            return false;
        }
        self.seen.insert(room_id, now);
        true
    }

    /// Rooms currently remembered, including ones past their ttl that have
    /// not been purged yet.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
