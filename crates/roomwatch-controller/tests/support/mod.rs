//! Scripted collaborators shared by the controller integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roomwatch_controller::{
    ControllerError, LiveStatus, Monitor, MonitorEvent, MonitorFactory, MonitorSink, MonitorSpec,
    RoomDiscovery, ServiceError, TokenSource,
};
use roomwatch_protocol::{Area, ControllerEvent, Raffle, RaffleCategory, RoomId};
use tokio::sync::broadcast;

/// Lets every spawned task and actor run until the runtime is idle.
///
/// With paused time the clock only jumps once nothing is runnable, so a
/// short sleep drains all pending work without crossing a dispatch window.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Next event on `rx`, failing the test if none arrives.
pub async fn next_event(rx: &mut broadcast::Receiver<ControllerEvent>) -> ControllerEvent {
    tokio::time::timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("no event published")
        .expect("hub closed")
}

pub fn gift(room: u64) -> Raffle {
    Raffle {
        id: 42,
        room_id: RoomId(room),
        category: RaffleCategory::Gift,
        kind: "GIFT_30035".into(),
        name: "任意门".into(),
        wait: 0,
        expire_at: 0,
        anchor: None,
    }
}

// =========================================================================
// Monitors
// =========================================================================

/// Observable state of one mock monitor.
pub struct MonitorState {
    pub spec: MonitorSpec,
    pub sink: MonitorSink,
    pub starts: AtomicUsize,
    pub destroyed: AtomicBool,
    pub to_fixed: AtomicBool,
    /// `start()` panics after counting the attempt.
    pub panics: AtomicBool,
}

impl MonitorState {
    pub fn emit(&self, event: MonitorEvent) {
        self.sink.emit(event);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

pub struct MockMonitor(Arc<MonitorState>);

impl Monitor for MockMonitor {
    fn start(&self) -> Result<(), ControllerError> {
        self.0.starts.fetch_add(1, Ordering::SeqCst);
        if self.0.panics.load(Ordering::SeqCst) {
            panic!("feed handshake crashed");
        }
        Ok(())
    }

    fn destroy(&self) {
        self.0.destroyed.store(true, Ordering::SeqCst);
    }

    fn to_fixed(&self) -> bool {
        self.0.to_fixed.load(Ordering::SeqCst)
    }
}

/// Records every monitor it builds.
#[derive(Default)]
pub struct MockFactory {
    created: Mutex<Vec<Arc<MonitorState>>>,
    to_fixed: AtomicBool,
    panics: AtomicBool,
}

impl MockFactory {
    /// Monitors built from now on report `to_fixed() == flag`.
    pub fn set_to_fixed(&self, flag: bool) {
        self.to_fixed.store(flag, Ordering::SeqCst);
    }

    /// Monitors built from now on panic in `start()`.
    pub fn set_panicking(&self, flag: bool) {
        self.panics.store(flag, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn monitor(&self, index: usize) -> Arc<MonitorState> {
        Arc::clone(&self.created.lock().unwrap()[index])
    }

    pub fn total_starts(&self) -> usize {
        self.created.lock().unwrap().iter().map(|m| m.starts()).sum()
    }
}

impl MonitorFactory for MockFactory {
    type Monitor = MockMonitor;

    fn create(&self, spec: MonitorSpec, sink: MonitorSink) -> MockMonitor {
        let state = Arc::new(MonitorState {
            spec,
            sink,
            starts: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            to_fixed: AtomicBool::new(self.to_fixed.load(Ordering::SeqCst)),
            panics: AtomicBool::new(self.panics.load(Ordering::SeqCst)),
        });
        self.created.lock().unwrap().push(Arc::clone(&state));
        MockMonitor(state)
    }
}

// =========================================================================
// Services
// =========================================================================

/// Hands out `token-<room>`; fails for rooms in `failing`.
#[derive(Default)]
pub struct MockTokens {
    pub failing: HashSet<RoomId>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<RoomId>>,
}

impl MockTokens {
    pub fn calls(&self) -> Vec<RoomId> {
        self.calls.lock().unwrap().clone()
    }
}

impl TokenSource for MockTokens {
    async fn live_danmu_token(&self, room_id: RoomId) -> Result<String, ServiceError> {
        self.calls.lock().unwrap().push(room_id);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&room_id) {
            return Err(ServiceError::Network("connection reset".into()));
        }
        Ok(format!("token-{room_id}"))
    }
}

/// Rooms in `live` are live, rooms in `failing` error, the rest are offline.
#[derive(Default)]
pub struct MockLive {
    pub live: HashSet<RoomId>,
    pub failing: HashSet<RoomId>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<RoomId>>,
}

impl MockLive {
    pub fn with_live(rooms: impl IntoIterator<Item = u64>) -> Self {
        Self {
            live: rooms.into_iter().map(RoomId).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RoomId> {
        self.calls.lock().unwrap().clone()
    }
}

impl LiveStatus for MockLive {
    async fn is_live(&self, room_id: RoomId) -> Result<bool, ServiceError> {
        self.calls.lock().unwrap().push(room_id);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&room_id) {
            return Err(ServiceError::Api {
                code: -400,
                message: "bad request".into(),
            });
        }
        Ok(self.live.contains(&room_id))
    }
}

/// Returns the scripted list for an area, truncated to `count`. Areas
/// without a script get `count` generated rooms numbered from 1.
#[derive(Default)]
pub struct MockDiscovery {
    pub rooms: HashMap<Area, Vec<RoomId>>,
    pub failing: bool,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<(Area, usize)>>,
}

impl MockDiscovery {
    pub fn with_rooms(area: Area, rooms: impl IntoIterator<Item = u64>) -> Self {
        Self {
            rooms: HashMap::from([(area, rooms.into_iter().map(RoomId).collect())]),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(Area, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RoomDiscovery for MockDiscovery {
    async fn raffle_rooms_in_area(
        &self,
        area: Area,
        count: usize,
    ) -> Result<Vec<RoomId>, ServiceError> {
        self.calls.lock().unwrap().push((area, count));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(ServiceError::Decode("missing data".into()));
        }
        Ok(match self.rooms.get(&area) {
            Some(rooms) => rooms.iter().copied().take(count).collect(),
            None => (1..=count as u64).map(RoomId).collect(),
        })
    }
}
