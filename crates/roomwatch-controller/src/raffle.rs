//! Raffle controller: one monitor per content area.
//!
//! For every configured [`Area`] the controller asks a [`RoomDiscovery`]
//! for candidate rooms, checks them one at a time with [`LiveStatus`] and
//! watches the first live one. When that monitor closes, or when no
//! candidate is live, the area is scanned again; an all-offline scan widens
//! the candidate pool by `query_step` up to `max_query`.
//!
//! Rooms announced through a raffle feed are deduplicated by a
//! [`RoomidHandler`] and published as `to_dynamic`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use roomwatch_dispatch::run_task;
use roomwatch_protocol::{Area, ControllerEvent, FeedAddress, RoomId, RoomInfo};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::slots::SlotEngine;
use crate::{
    ControllerConfig, ControllerError, LiveStatus, Monitor, MonitorEvent, MonitorFactory,
    MonitorKind, MonitorSink, MonitorSpec, RaffleConfig, RoomDiscovery, RoomidHandler,
    ServiceError,
};

const NAME: &str = "raffle";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

enum RaffleCommand {
    Start,
    Stop,
    SetupArea(Area),
    Connections {
        reply: oneshot::Sender<HashMap<Area, RoomId>>,
    },
    Shutdown,
}

enum RaffleInbound {
    Candidates {
        area: Area,
        setup: u64,
        query: usize,
        result: Result<Vec<RoomId>, ServiceError>,
    },
    Scanned {
        area: Area,
        setup: u64,
        query: usize,
        found: Option<RoomId>,
    },
    Monitor {
        area: Area,
        generation: u64,
        event: MonitorEvent,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running raffle controller.
#[derive(Clone)]
pub struct RaffleHandle {
    commands: mpsc::Sender<RaffleCommand>,
    hub: broadcast::Sender<ControllerEvent>,
}

impl RaffleHandle {
    /// Starts the controller and begins scanning every configured area.
    pub async fn start(&self) -> Result<(), ControllerError> {
        self.send(RaffleCommand::Start).await
    }

    /// Destroys every area monitor and forgets discovered rooms.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        self.send(RaffleCommand::Stop).await
    }

    /// Re-scans `area` from the initial candidate count. No-op if the area
    /// is covered or a scan is already running.
    pub async fn setup_area(&self, area: Area) -> Result<(), ControllerError> {
        self.send(RaffleCommand::SetupArea(area)).await
    }

    /// Snapshot of covered areas and the room watched in each.
    pub async fn connections(&self) -> Result<HashMap<Area, RoomId>, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(RaffleCommand::Connections { reply }).await?;
        rx.await.map_err(|_| ControllerError::Unavailable(NAME))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.hub.subscribe()
    }

    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        self.send(RaffleCommand::Shutdown).await
    }

    async fn send(&self, cmd: RaffleCommand) -> Result<(), ControllerError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| ControllerError::Unavailable(NAME))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub struct RaffleController<F: MonitorFactory, D: RoomDiscovery, L: LiveStatus> {
    config: RaffleConfig,
    feed: FeedAddress,
    engine: SlotEngine<Area, F::Monitor>,
    roomid: RoomidHandler,
    factory: Arc<F>,
    discovery: Arc<D>,
    live: Arc<L>,
    commands: mpsc::Receiver<RaffleCommand>,
    inbound: mpsc::UnboundedReceiver<RaffleInbound>,
    inbound_tx: mpsc::UnboundedSender<RaffleInbound>,
}

impl<F, D, L> RaffleController<F, D, L>
where
    F: MonitorFactory,
    D: RoomDiscovery,
    L: LiveStatus,
{
    /// Spawns the controller task. Scanning begins on
    /// [`RaffleHandle::start`].
    pub fn spawn(
        config: ControllerConfig,
        raffle: RaffleConfig,
        factory: Arc<F>,
        discovery: Arc<D>,
        live: Arc<L>,
    ) -> RaffleHandle {
        let config = config.validated();
        let raffle = raffle.validated();
        let (commands_tx, commands) = mpsc::channel(config.command_capacity);
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let engine = SlotEngine::stopped(NAME, &config);
        let hub = engine.hub();

        let actor = Self {
            roomid: RoomidHandler::new(Duration::from_secs(raffle.roomid_ttl_secs)),
            config: raffle,
            feed: config.feed,
            engine,
            factory,
            discovery,
            live,
            commands,
            inbound,
            inbound_tx,
        };
        tokio::spawn(actor.run());

        RaffleHandle {
            commands: commands_tx,
            hub,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(RaffleCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                Some(msg) = self.inbound.recv() => self.handle_inbound(msg),
                _ = self.engine.wait_for_refresh() => self.engine.refresh(),
            }
        }

        self.stop();
    }

    fn handle_command(&mut self, cmd: RaffleCommand) {
        match cmd {
            RaffleCommand::Start => self.start(),
            RaffleCommand::Stop => self.stop(),
            RaffleCommand::SetupArea(area) => self.setup_area(area, self.config.initial_query),
            RaffleCommand::Connections { reply } => {
                let rooms = self
                    .engine
                    .slots()
                    .map(|(area, slot)| (*area, slot.info.room_id))
                    .collect();
                let _ = reply.send(rooms);
            }
            RaffleCommand::Shutdown => {}
        }
    }

    fn handle_inbound(&mut self, msg: RaffleInbound) {
        match msg {
            RaffleInbound::Candidates {
                area,
                setup,
                query,
                result,
            } => self.on_candidates(area, setup, query, result),
            RaffleInbound::Scanned {
                area,
                setup,
                query,
                found,
            } => self.on_scanned(area, setup, query, found),
            RaffleInbound::Monitor {
                area,
                generation,
                event,
            } => self.on_monitor_event(area, generation, event),
        }
    }

    fn start(&mut self) {
        self.engine.start();
        self.roomid.start();
        let areas = self.config.areas.clone();
        for area in areas {
            self.setup_area(area, self.config.initial_query);
        }
    }

    fn stop(&mut self) {
        self.engine.stop();
        self.roomid.stop();
    }

    // -- Area setup --

    fn setup_area(&mut self, area: Area, query: usize) {
        if !self.engine.is_running() || self.engine.contains(&area) {
            return;
        }
        let Some(setup) = self.engine.begin_setup(area) else {
            tracing::trace!(%area, "area scan already in flight");
            return;
        };

        tracing::debug!(%area, query, "requesting candidate rooms");
        let discovery = Arc::clone(&self.discovery);
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            let result = discovery.raffle_rooms_in_area(area, query).await;
            let _ = tx.send(RaffleInbound::Candidates {
                area,
                setup,
                query,
                result,
            });
        });
    }

    fn on_candidates(
        &mut self,
        area: Area,
        setup: u64,
        query: usize,
        result: Result<Vec<RoomId>, ServiceError>,
    ) {
        if !self.engine.is_pending(&area, setup) {
            tracing::debug!(%area, "stale candidate list dropped");
            return;
        }
        if self.engine.contains(&area) {
            self.engine.finish_setup(&area, setup);
            return;
        }
        let rooms = result.unwrap_or_else(|e| {
            tracing::warn!(%area, error = %e, "room discovery failed");
            Vec::new()
        });

        let live = Arc::clone(&self.live);
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            let found = find_live_room(live.as_ref(), area, &rooms).await;
            let _ = tx.send(RaffleInbound::Scanned {
                area,
                setup,
                query,
                found,
            });
        });
    }

    fn on_scanned(&mut self, area: Area, setup: u64, query: usize, found: Option<RoomId>) {
        if !self.engine.finish_setup(&area, setup) {
            tracing::debug!(%area, "stale scan result dropped");
            return;
        }
        match found {
            Some(room_id) => self.setup_room_in_area(room_id, area),
            None if query < self.config.max_query => {
                tracing::debug!(%area, query, "no live room, widening search");
                self.setup_area(area, query + self.config.query_step);
            }
            None => tracing::error!(%area, query, "can't find a live room in {area}"),
        }
    }

    fn setup_room_in_area(&mut self, room_id: RoomId, area: Area) {
        if self.engine.contains(&area) {
            return;
        }

        let generation = self.engine.next_generation();
        let info = RoomInfo::in_area(room_id, area);
        let spec = MonitorSpec {
            kind: MonitorKind::Raffle,
            addr: self.feed.clone(),
            info,
            token: None,
        };
        let monitor = self.factory.create(spec, self.sink(area, generation));

        if let Some(monitor) = self.engine.register(area, generation, info, monitor) {
            self.engine.schedule_start(&monitor);
            tracing::info!(%area, %room_id, "watching {area} room {room_id}");
        }
    }

    fn sink(&self, area: Area, generation: u64) -> MonitorSink {
        let tx = self.inbound_tx.clone();
        MonitorSink::new(move |event| {
            let _ = tx.send(RaffleInbound::Monitor {
                area,
                generation,
                event,
            });
        })
    }

    // -- Monitor events --

    fn on_monitor_event(&mut self, area: Area, generation: u64, event: MonitorEvent) {
        let Some((monitor, info)) = self.engine.current(&area, generation) else {
            tracing::trace!(%area, "event from released monitor");
            return;
        };

        match event {
            MonitorEvent::Close => {
                self.engine.release(&area);
                tracing::info!(%area, room_id = %info.room_id, "{area} raffle monitor closed");
                self.setup_area(area, self.config.initial_query);
            }
            MonitorEvent::Error(reason) => {
                tracing::debug!(%area, room_id = %info.room_id, %reason, "monitor error, restarting");
                // One monitor per area: restart in place, outside the queue.
                if let Err(e) = run_task(|| monitor.start()) {
                    tracing::warn!(%area, error = %e, "raffle monitor restart failed");
                }
            }
            MonitorEvent::AddToDb(_) => {
                self.engine.publish(ControllerEvent::AddToDb(info.room_id));
            }
            MonitorEvent::Raffle(raffle) => {
                self.engine.publish(ControllerEvent::Raffle(raffle));
            }
            MonitorEvent::DiscoveredRoom(other) => {
                if self.roomid.add(other) {
                    self.engine.publish(ControllerEvent::ToDynamic(other));
                }
            }
        }
    }
}

/// Checks `rooms` in order and returns the first live one.
///
/// Checks are sequential: nothing is asked after the first live answer. A
/// failed check counts as offline.
async fn find_live_room<L: LiveStatus>(live: &L, area: Area, rooms: &[RoomId]) -> Option<RoomId> {
    for &room_id in rooms {
        match live.is_live(room_id).await {
            Ok(true) => return Some(room_id),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(%area, %room_id, error = %e, "liveness check failed");
            }
        }
    }
    None
}
