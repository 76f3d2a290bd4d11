//! The owner of the three controller tiers.
//!
//! Controllers never call each other. The supervisor listens to their hubs
//! and turns promotion events into `add` calls:
//!
//! ```text
//!   dynamic ──to_fixed──▶ fixed.add(room)
//!   raffle ──to_dynamic──▶ dynamic.add(room)   (opt-in, skips guarded rooms)
//!   any ──raffle / add_to_db──▶ outbound hub
//! ```
//!
//! It also refreshes the dynamic tier periodically from a
//! [`DynamicRoomSource`].

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use roomwatch_controller::{
    ControllerError, GuardController, GuardHandle, GuardTier, LiveStatus, MonitorFactory,
    RaffleController, RaffleHandle, RoomDiscovery, ServiceError, TokenSource,
};
use roomwatch_protocol::{ControllerEvent, RoomId};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{RoomwatchError, WatchConfig};

/// Supplies the rooms the dynamic tier should currently cover.
pub trait DynamicRoomSource: Send + Sync + 'static {
    fn dynamic_rooms(&self) -> impl Future<Output = Result<Vec<RoomId>, ServiceError>> + Send;
}

/// Occupied slots per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitoringCounts {
    pub fixed: usize,
    pub dynamic: usize,
    pub raffle: usize,
}

impl fmt::Display for MonitoringCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Monitoring (fixed) {} + (dynamic) {}",
            self.fixed, self.dynamic
        )
    }
}

pub struct Supervisor {
    fixed: GuardHandle,
    dynamic: GuardHandle,
    raffle: RaffleHandle,
    outbound: broadcast::Sender<ControllerEvent>,
    /// Configured fixed rooms, excluded from dynamic refreshes even before
    /// their monitors are up.
    fixed_rooms: Arc<[RoomId]>,
    refresh_interval: Duration,
    refresh: Option<JoinHandle<()>>,
    router: JoinHandle<()>,
    source: Arc<dyn RefreshDynamic>,
}

impl Supervisor {
    /// Spawns all three controllers and the event router.
    ///
    /// Nothing is monitored until [`start`](Self::start).
    pub fn spawn<F, P, S>(
        config: WatchConfig,
        factory: Arc<F>,
        platform: Arc<P>,
        source: Arc<S>,
    ) -> Self
    where
        F: MonitorFactory,
        P: TokenSource + LiveStatus + RoomDiscovery,
        S: DynamicRoomSource,
    {
        let config = config.validated();
        let fixed = GuardController::spawn(
            GuardTier::FIXED,
            config.controller.clone(),
            Arc::clone(&factory),
            Arc::clone(&platform),
        );
        let dynamic = GuardController::spawn(
            GuardTier::DYNAMIC,
            config.controller.clone(),
            Arc::clone(&factory),
            Arc::clone(&platform),
        );
        let raffle = RaffleController::spawn(
            config.controller.clone(),
            config.raffle.clone(),
            factory,
            Arc::clone(&platform),
            platform,
        );

        let (outbound, _) = broadcast::channel(config.controller.event_capacity);
        let router = Router {
            fixed: fixed.clone(),
            dynamic: dynamic.clone(),
            outbound: outbound.clone(),
            promote_raffle_rooms: config.promote_raffle_rooms,
        };
        let hubs = [fixed.subscribe(), dynamic.subscribe(), raffle.subscribe()];
        let router = tokio::spawn(router.run(hubs));

        Self {
            fixed,
            dynamic,
            raffle,
            outbound,
            refresh_interval: config.dynamic_refresh_interval(),
            fixed_rooms: config.fixed_rooms.into(),
            refresh: None,
            router,
            source,
        }
    }

    /// Starts every tier, hands the configured rooms to the fixed tier and
    /// begins refreshing the dynamic tier.
    pub async fn start(&mut self) -> Result<(), RoomwatchError> {
        self.fixed.start().await?;
        self.dynamic.start().await?;
        self.raffle.start().await?;
        self.fixed.add(self.fixed_rooms.iter().copied()).await?;

        if self.refresh.is_none() {
            let task = refresh_loop(
                self.fixed.clone(),
                self.dynamic.clone(),
                Arc::clone(&self.source),
                Arc::clone(&self.fixed_rooms),
                self.refresh_interval,
            );
            self.refresh = Some(tokio::spawn(task));
        }
        tracing::info!(fixed_rooms = self.fixed_rooms.len(), "supervisor started");
        Ok(())
    }

    /// Stops refreshing and destroys every monitor. Controllers stay alive
    /// and can be started again.
    pub async fn stop(&mut self) -> Result<(), RoomwatchError> {
        if let Some(task) = self.refresh.take() {
            task.abort();
        }
        self.fixed.stop().await?;
        self.dynamic.stop().await?;
        self.raffle.stop().await?;
        tracing::info!("supervisor stopped");
        Ok(())
    }

    /// Ends every task. Handles cloned from this supervisor become
    /// unavailable.
    pub async fn shutdown(mut self) -> Result<(), RoomwatchError> {
        if let Some(task) = self.refresh.take() {
            task.abort();
        }
        self.router.abort();
        self.fixed.shutdown().await?;
        self.dynamic.shutdown().await?;
        self.raffle.shutdown().await?;
        Ok(())
    }

    /// Raffle-category and `add_to_db` events from every tier.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.outbound.subscribe()
    }

    pub async fn monitoring_counts(&self) -> Result<MonitoringCounts, ControllerError> {
        Ok(MonitoringCounts {
            fixed: self.fixed.connections().await?.len(),
            dynamic: self.dynamic.connections().await?.len(),
            raffle: self.raffle.connections().await?.len(),
        })
    }

    /// Runs one dynamic refresh now, outside the periodic schedule.
    ///
    /// Returns how many rooms were offered to the dynamic tier.
    pub async fn refresh_dynamic(&self) -> Result<usize, RoomwatchError> {
        refresh_dynamic(
            &self.fixed,
            &self.dynamic,
            self.source.as_ref(),
            &self.fixed_rooms,
        )
        .await
    }

    pub fn fixed(&self) -> &GuardHandle {
        &self.fixed
    }

    pub fn dynamic(&self) -> &GuardHandle {
        &self.dynamic
    }

    pub fn raffle(&self) -> &RaffleHandle {
        &self.raffle
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(task) = self.refresh.take() {
            task.abort();
        }
        self.router.abort();
    }
}

// ---------------------------------------------------------------------------
// Dynamic refresh
// ---------------------------------------------------------------------------

/// Object-safe view of a [`DynamicRoomSource`], so the supervisor does not
/// carry the source's type.
trait RefreshDynamic: Send + Sync {
    fn rooms(
        &self,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<Vec<RoomId>, ServiceError>> + Send + '_>>;
}

impl<S: DynamicRoomSource> RefreshDynamic for S {
    fn rooms(
        &self,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<Vec<RoomId>, ServiceError>> + Send + '_>>
    {
        Box::pin(self.dynamic_rooms())
    }
}

async fn refresh_loop(
    fixed: GuardHandle,
    dynamic: GuardHandle,
    source: Arc<dyn RefreshDynamic>,
    assigned: Arc<[RoomId]>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = refresh_dynamic(&fixed, &dynamic, source.as_ref(), &assigned).await {
            tracing::warn!(error = %e, "dynamic refresh failed");
        }
    }
}

async fn refresh_dynamic(
    fixed: &GuardHandle,
    dynamic: &GuardHandle,
    source: &dyn RefreshDynamic,
    assigned: &[RoomId],
) -> Result<usize, RoomwatchError> {
    let rooms = source.rooms().await?;
    let fixed_rooms = fixed.connections().await?;
    let dynamic_count = dynamic.connections().await?.len();
    tracing::info!(
        "Monitoring (fixed) {} + (dynamic) {}",
        fixed_rooms.len(),
        dynamic_count
    );

    let rooms: Vec<RoomId> = rooms
        .into_iter()
        .filter(|room| !fixed_rooms.contains(room) && !assigned.contains(room))
        .collect();
    let offered = rooms.len();
    dynamic.add(rooms).await?;
    Ok(offered)
}

// ---------------------------------------------------------------------------
// Event routing
// ---------------------------------------------------------------------------

struct Router {
    fixed: GuardHandle,
    dynamic: GuardHandle,
    outbound: broadcast::Sender<ControllerEvent>,
    promote_raffle_rooms: bool,
}

impl Router {
    async fn run(self, hubs: [broadcast::Receiver<ControllerEvent>; 3]) {
        let [mut fixed_rx, mut dynamic_rx, mut raffle_rx] = hubs;
        loop {
            let event = tokio::select! {
                Some(event) = next_event(&mut fixed_rx, "fixed") => event,
                Some(event) = next_event(&mut dynamic_rx, "dynamic") => event,
                Some(event) = next_event(&mut raffle_rx, "raffle") => event,
                else => break,
            };
            if let Err(e) = self.route(event).await {
                tracing::warn!(error = %e, "event routing failed");
            }
        }
    }

    async fn route(&self, event: ControllerEvent) -> Result<(), ControllerError> {
        match event {
            ControllerEvent::ToFixed(room_id) => {
                tracing::info!(%room_id, "promoting room to fixed tier");
                self.fixed.add([room_id]).await?;
            }
            ControllerEvent::ToDynamic(room_id) => {
                if self.promote_raffle_rooms && !self.guarded(room_id).await? {
                    tracing::debug!(%room_id, "offering discovered room to dynamic tier");
                    self.dynamic.add([room_id]).await?;
                }
            }
            event @ (ControllerEvent::Raffle(_) | ControllerEvent::AddToDb(_)) => {
                let _ = self.outbound.send(event);
            }
        }
        Ok(())
    }

    async fn guarded(&self, room_id: RoomId) -> Result<bool, ControllerError> {
        let fixed: HashSet<RoomId> = self.fixed.connections().await?;
        Ok(fixed.contains(&room_id) || self.dynamic.contains(room_id).await?)
    }
}

/// Next event from a hub. `None` once the hub is closed.
async fn next_event(
    rx: &mut broadcast::Receiver<ControllerEvent>,
    tier: &'static str,
) -> Option<ControllerEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(tier, skipped, "event router fell behind");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
