//! Runs the full supervisor against the live platform API without opening
//! any feed connection: monitors only log what they would do.
//!
//! ```text
//! cargo run -p dry-run -- [config.json]
//! RUST_LOG=debug cargo run -p dry-run
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use roomwatch::prelude::*;
use tokio::sync::broadcast::error::RecvError;

// ---------------------------------------------------------------------------
// Monitors
// ---------------------------------------------------------------------------

struct LoggingMonitor {
    spec: MonitorSpec,
    starts: AtomicUsize,
}

impl Monitor for LoggingMonitor {
    fn start(&self) -> Result<(), ControllerError> {
        let attempt = self.starts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            kind = %self.spec.kind,
            room_id = %self.spec.info.room_id,
            addr = %self.spec.addr,
            attempt,
            "would connect"
        );
        Ok(())
    }

    fn destroy(&self) {
        tracing::info!(
            kind = %self.spec.kind,
            room_id = %self.spec.info.room_id,
            "would disconnect"
        );
    }
}

struct LoggingMonitors;

impl MonitorFactory for LoggingMonitors {
    type Monitor = LoggingMonitor;

    fn create(&self, spec: MonitorSpec, _sink: MonitorSink) -> LoggingMonitor {
        LoggingMonitor {
            spec,
            starts: AtomicUsize::new(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Dynamic rooms
// ---------------------------------------------------------------------------

/// The most watched rooms of every area.
struct TopRooms {
    client: Arc<BilibiliClient>,
    per_area: usize,
}

impl DynamicRoomSource for TopRooms {
    async fn dynamic_rooms(&self) -> Result<Vec<RoomId>, ServiceError> {
        let mut rooms = Vec::new();
        for area in Area::ALL {
            rooms.extend(self.client.area_rooms(area, self.per_area).await?);
        }
        Ok(rooms)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), RoomwatchError> {
    roomwatch::telemetry::init("info");

    let config = match std::env::args().nth(1) {
        Some(path) => WatchConfig::load(path)?,
        None => WatchConfig::default(),
    };

    let client = Arc::new(BilibiliClient::new(config.api.clone())?);
    let source = Arc::new(TopRooms {
        client: Arc::clone(&client),
        per_area: 5,
    });
    let mut supervisor = Supervisor::spawn(config, Arc::new(LoggingMonitors), client, source);
    let mut events = supervisor.subscribe();
    supervisor.start().await?;

    let mut report = tokio::time::interval(Duration::from_secs(30));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = report.tick() => {
                let counts = supervisor.monitoring_counts().await?;
                tracing::info!(raffle = counts.raffle, "{counts}");
            }
            event = events.recv() => match event {
                Ok(event) => tracing::info!(topic = event.topic(), room_id = %event.room_id(), "event"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "event log fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("shutting down");
    supervisor.shutdown().await
}
