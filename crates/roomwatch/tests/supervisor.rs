//! Integration tests for the supervisor's routing and dynamic refresh.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roomwatch::prelude::*;

// =========================================================================
// Mocks
// =========================================================================

struct Recorded {
    spec: MonitorSpec,
    sink: MonitorSink,
    to_fixed: bool,
}

struct StubMonitor {
    to_fixed: bool,
}

impl Monitor for StubMonitor {
    fn start(&self) -> Result<(), ControllerError> {
        Ok(())
    }

    fn destroy(&self) {}

    fn to_fixed(&self) -> bool {
        self.to_fixed
    }
}

/// Dynamic monitors report `to_fixed() == true`.
#[derive(Default)]
struct Monitors {
    created: Mutex<Vec<Arc<Recorded>>>,
}

impl Monitors {
    fn find(&self, kind: MonitorKind, room: u64) -> Arc<Recorded> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.spec.kind == kind && m.spec.info.room_id == RoomId(room))
            .cloned()
            .expect("monitor not created")
    }

    fn raffle_monitor(&self) -> Arc<Recorded> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.spec.kind == MonitorKind::Raffle)
            .cloned()
            .expect("no raffle monitor")
    }
}

impl MonitorFactory for Monitors {
    type Monitor = StubMonitor;

    fn create(&self, spec: MonitorSpec, sink: MonitorSink) -> StubMonitor {
        let to_fixed = spec.kind == MonitorKind::DynamicGuard;
        self.created.lock().unwrap().push(Arc::new(Recorded {
            spec,
            sink,
            to_fixed,
        }));
        StubMonitor { to_fixed }
    }
}

/// Every room is live and has a token; area listings return room 500.
struct Platform;

impl TokenSource for Platform {
    async fn live_danmu_token(&self, room_id: RoomId) -> Result<String, ServiceError> {
        Ok(format!("token-{room_id}"))
    }
}

impl LiveStatus for Platform {
    async fn is_live(&self, _room_id: RoomId) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl RoomDiscovery for Platform {
    async fn raffle_rooms_in_area(
        &self,
        _area: Area,
        _count: usize,
    ) -> Result<Vec<RoomId>, ServiceError> {
        Ok(vec![RoomId(500)])
    }
}

/// Returns `rooms` on every call, or fails while `failing` is set.
#[derive(Default)]
struct Source {
    rooms: Mutex<Vec<RoomId>>,
    failing: Mutex<bool>,
    calls: AtomicUsize,
}

impl DynamicRoomSource for Source {
    async fn dynamic_rooms(&self) -> Result<Vec<RoomId>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(ServiceError::Network("unreachable".into()));
        }
        Ok(self.rooms.lock().unwrap().clone())
    }
}

// =========================================================================
// Helpers
// =========================================================================

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn config() -> WatchConfig {
    WatchConfig {
        raffle: RaffleConfig {
            areas: vec![Area::Radio],
            ..RaffleConfig::default()
        },
        fixed_rooms: vec![RoomId(1), RoomId(2)],
        dynamic_refresh_secs: 60,
        ..WatchConfig::default()
    }
}

async fn started(config: WatchConfig, source: Source) -> (Supervisor, Arc<Monitors>, Arc<Source>) {
    let monitors = Arc::new(Monitors::default());
    let source = Arc::new(source);
    let mut supervisor = Supervisor::spawn(
        config,
        Arc::clone(&monitors),
        Arc::new(Platform),
        Arc::clone(&source),
    );
    supervisor.start().await.unwrap();
    settle().await;
    (supervisor, monitors, source)
}

fn source_with(rooms: impl IntoIterator<Item = u64>) -> Source {
    Source {
        rooms: Mutex::new(rooms.into_iter().map(RoomId).collect()),
        ..Source::default()
    }
}

// =========================================================================
// Start and refresh
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_populates_every_tier() {
    let (supervisor, _, _) = started(config(), source_with([10, 11])).await;

    let counts = supervisor.monitoring_counts().await.unwrap();
    assert_eq!(
        counts,
        MonitoringCounts {
            fixed: 2,
            dynamic: 2,
            raffle: 1,
        }
    );
    assert_eq!(counts.to_string(), "Monitoring (fixed) 2 + (dynamic) 2");
}

#[tokio::test(start_paused = true)]
async fn test_refresh_skips_fixed_rooms() {
    let (supervisor, _, _) = started(config(), source_with([1, 10])).await;

    let dynamic = supervisor.dynamic().connections().await.unwrap();
    assert_eq!(dynamic, HashSet::from([RoomId(10)]));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_runs_periodically() {
    let (supervisor, _, source) = started(config(), source_with([10])).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    source.rooms.lock().unwrap().push(RoomId(11));
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert!(supervisor.dynamic().contains(RoomId(11)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_keeps_schedule() {
    let source = Source {
        failing: Mutex::new(true),
        ..source_with([10])
    };
    let (supervisor, _, source) = started(config(), source).await;
    assert!(supervisor.dynamic().connections().await.unwrap().is_empty());

    *source.failing.lock().unwrap() = false;
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;

    assert!(supervisor.dynamic().contains(RoomId(10)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_manual_refresh_reports_offered_rooms() {
    let (supervisor, _, _) = started(config(), source_with([1, 2, 10, 11])).await;
    assert_eq!(supervisor.refresh_dynamic().await.unwrap(), 2);
}

// =========================================================================
// Routing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_to_fixed_moves_room_into_fixed_tier() {
    let (supervisor, monitors, _) = started(config(), source_with([10])).await;

    monitors
        .find(MonitorKind::DynamicGuard, 10)
        .sink
        .emit(MonitorEvent::Close);
    settle().await;

    assert!(supervisor.fixed().contains(RoomId(10)).await.unwrap());
    assert!(!supervisor.dynamic().contains(RoomId(10)).await.unwrap());
    assert!(!monitors.find(MonitorKind::FixedGuard, 10).to_fixed);
}

#[tokio::test(start_paused = true)]
async fn test_raffles_and_add_to_db_reach_outbound() {
    let (supervisor, monitors, _) = started(config(), source_with([])).await;
    let mut outbound = supervisor.subscribe();

    let raffle = Raffle {
        id: 1,
        room_id: RoomId(500),
        category: RaffleCategory::Storm,
        kind: "SPECIAL_GIFT".into(),
        name: "节奏风暴".into(),
        wait: 0,
        expire_at: 0,
        anchor: None,
    };
    let raffle_monitor = monitors.raffle_monitor();
    let sink = &raffle_monitor.sink;
    sink.emit(MonitorEvent::Raffle(raffle.clone()));
    sink.emit(MonitorEvent::AddToDb(RoomId(500)));
    monitors
        .find(MonitorKind::FixedGuard, 1)
        .sink
        .emit(MonitorEvent::AddToDb(RoomId(1)));
    settle().await;

    let mut seen = Vec::new();
    while let Ok(event) = outbound.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.len(), 3);
    assert!(seen.contains(&ControllerEvent::Raffle(raffle)));
    assert!(seen.contains(&ControllerEvent::AddToDb(RoomId(500))));
    assert!(seen.contains(&ControllerEvent::AddToDb(RoomId(1))));
}

#[tokio::test(start_paused = true)]
async fn test_discovered_rooms_stay_out_of_dynamic_by_default() {
    let (supervisor, monitors, _) = started(config(), source_with([])).await;

    monitors
        .raffle_monitor()
        .sink
        .emit(MonitorEvent::DiscoveredRoom(RoomId(77)));
    settle().await;

    assert!(supervisor.dynamic().connections().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_discovered_rooms_promoted_when_enabled() {
    let config = WatchConfig {
        promote_raffle_rooms: true,
        ..config()
    };
    let (supervisor, monitors, _) = started(config, source_with([])).await;

    let raffle_monitor = monitors.raffle_monitor();
    let sink = &raffle_monitor.sink;
    sink.emit(MonitorEvent::DiscoveredRoom(RoomId(77)));
    // Already guarded by the fixed tier.
    sink.emit(MonitorEvent::DiscoveredRoom(RoomId(1)));
    settle().await;

    assert_eq!(
        supervisor.dynamic().connections().await.unwrap(),
        HashSet::from([RoomId(77)])
    );
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_clears_every_tier() {
    let (mut supervisor, _, source) = started(config(), source_with([10])).await;

    supervisor.stop().await.unwrap();
    settle().await;
    assert_eq!(supervisor.monitoring_counts().await.unwrap(), MonitoringCounts::default());

    // The refresh task is gone too.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_controllers() {
    let (supervisor, _, _) = started(config(), source_with([])).await;
    let fixed = supervisor.fixed().clone();

    supervisor.shutdown().await.unwrap();
    settle().await;

    assert!(matches!(
        fixed.connections().await,
        Err(ControllerError::Unavailable("fixed"))
    ));
}
