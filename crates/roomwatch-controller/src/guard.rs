//! Guard controllers: one monitor per room for fixed and dynamic tiers.
//!
//! Both tiers run the same actor. A [`GuardTier`] value supplies the two
//! things that differ: which monitor variant to build, and whether a closing
//! monitor may ask for promotion to the fixed tier.

use std::collections::HashSet;
use std::sync::Arc;

use roomwatch_protocol::{ControllerEvent, FeedAddress, RoomId, RoomInfo};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::slots::SlotEngine;
use crate::{
    ControllerConfig, ControllerError, Monitor, MonitorEvent, MonitorFactory, MonitorKind,
    MonitorSink, MonitorSpec, ServiceError, TokenSource,
};

// ---------------------------------------------------------------------------
// GuardTier
// ---------------------------------------------------------------------------

/// The per-tier capabilities of a guard controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardTier {
    /// Used in logs and errors.
    pub name: &'static str,
    /// Monitor variant requested from the factory.
    pub kind: MonitorKind,
    /// On close, emit `to_fixed` if the monitor says so.
    pub promote_on_close: bool,
}

impl GuardTier {
    /// Stable, externally assigned rooms, monitored indefinitely.
    pub const FIXED: GuardTier = GuardTier {
        name: "fixed",
        kind: MonitorKind::FixedGuard,
        promote_on_close: false,
    };

    /// Churning rooms; durable ones graduate to [`GuardTier::FIXED`].
    pub const DYNAMIC: GuardTier = GuardTier {
        name: "dynamic",
        kind: MonitorKind::DynamicGuard,
        promote_on_close: true,
    };
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Requests from handles.
enum GuardCommand {
    Add(Vec<RoomId>),
    Start,
    Stop,
    Connections {
        reply: oneshot::Sender<HashSet<RoomId>>,
    },
    Shutdown,
}

/// Results and events produced outside the actor and routed back into it.
enum GuardInbound {
    TokenFetched {
        room_id: RoomId,
        setup: u64,
        result: Result<String, ServiceError>,
    },
    Monitor {
        room_id: RoomId,
        generation: u64,
        event: MonitorEvent,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running guard controller.
///
/// Cheap to clone. The controller task exits once every handle is dropped
/// or [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct GuardHandle {
    tier: GuardTier,
    commands: mpsc::Sender<GuardCommand>,
    hub: broadcast::Sender<ControllerEvent>,
}

impl GuardHandle {
    pub fn tier(&self) -> GuardTier {
        self.tier
    }

    /// Sets up monitors for every room not already monitored.
    ///
    /// Returns once the request is queued; token fetches and monitor starts
    /// proceed independently per room. Accepts a single id
    /// (`add([room])`) or any collection.
    pub async fn add(
        &self,
        rooms: impl IntoIterator<Item = RoomId>,
    ) -> Result<(), ControllerError> {
        let rooms: Vec<RoomId> = rooms.into_iter().collect();
        if rooms.is_empty() {
            return Ok(());
        }
        self.send(GuardCommand::Add(rooms)).await
    }

    /// Re-enables a stopped controller. A new controller is already running.
    pub async fn start(&self) -> Result<(), ControllerError> {
        self.send(GuardCommand::Start).await
    }

    /// Destroys every monitor and ignores further adds until restarted.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        self.send(GuardCommand::Stop).await
    }

    /// Snapshot of the rooms that currently hold a monitor.
    pub async fn connections(&self) -> Result<HashSet<RoomId>, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(GuardCommand::Connections { reply }).await?;
        rx.await.map_err(|_| ControllerError::Unavailable(self.tier.name))
    }

    pub async fn contains(&self, room_id: RoomId) -> Result<bool, ControllerError> {
        Ok(self.connections().await?.contains(&room_id))
    }

    /// Subscribes to the controller's event hub.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.hub.subscribe()
    }

    /// Stops the controller and ends its task.
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        self.send(GuardCommand::Shutdown).await
    }

    async fn send(&self, cmd: GuardCommand) -> Result<(), ControllerError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| ControllerError::Unavailable(self.tier.name))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// A guard-tier controller actor.
pub struct GuardController<F: MonitorFactory, T: TokenSource> {
    tier: GuardTier,
    feed: FeedAddress,
    engine: SlotEngine<RoomId, F::Monitor>,
    factory: Arc<F>,
    tokens: Arc<T>,
    commands: mpsc::Receiver<GuardCommand>,
    inbound: mpsc::UnboundedReceiver<GuardInbound>,
    inbound_tx: mpsc::UnboundedSender<GuardInbound>,
}

impl<F: MonitorFactory, T: TokenSource> GuardController<F, T> {
    /// Spawns a controller task for `tier` and returns its handle.
    pub fn spawn(
        tier: GuardTier,
        config: ControllerConfig,
        factory: Arc<F>,
        tokens: Arc<T>,
    ) -> GuardHandle {
        let config = config.validated();
        let (commands_tx, commands) = mpsc::channel(config.command_capacity);
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let engine = SlotEngine::new(tier.name, &config);
        let hub = engine.hub();

        let actor = Self {
            tier,
            feed: config.feed,
            engine,
            factory,
            tokens,
            commands,
            inbound,
            inbound_tx,
        };
        tokio::spawn(actor.run());

        GuardHandle {
            tier,
            commands: commands_tx,
            hub,
        }
    }

    async fn run(mut self) {
        tracing::info!(tier = self.tier.name, "guard controller started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(GuardCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                Some(msg) = self.inbound.recv() => self.handle_inbound(msg),
                _ = self.engine.wait_for_refresh() => self.engine.refresh(),
            }
        }

        self.engine.stop();
        tracing::info!(tier = self.tier.name, "guard controller stopped");
    }

    fn handle_command(&mut self, cmd: GuardCommand) {
        match cmd {
            GuardCommand::Add(rooms) => self.add(rooms),
            GuardCommand::Start => self.engine.start(),
            GuardCommand::Stop => self.engine.stop(),
            GuardCommand::Connections { reply } => {
                let rooms = self.engine.slots().map(|(room_id, _)| *room_id).collect();
                let _ = reply.send(rooms);
            }
            GuardCommand::Shutdown => {}
        }
    }

    fn handle_inbound(&mut self, msg: GuardInbound) {
        match msg {
            GuardInbound::TokenFetched {
                room_id,
                setup,
                result,
            } => self.on_token(room_id, setup, result),
            GuardInbound::Monitor {
                room_id,
                generation,
                event,
            } => self.on_monitor_event(room_id, generation, event),
        }
    }

    fn add(&mut self, rooms: Vec<RoomId>) {
        if !self.engine.is_running() {
            tracing::debug!(
                tier = self.tier.name,
                rooms = rooms.len(),
                "controller stopped, ignoring add"
            );
            return;
        }
        for room_id in rooms {
            if self.engine.contains(&room_id) {
                continue;
            }
            if let Some(setup) = self.engine.begin_setup(room_id) {
                self.fetch_token(room_id, setup);
            }
        }
    }

    fn fetch_token(&self, room_id: RoomId, setup: u64) {
        let tokens = Arc::clone(&self.tokens);
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            let result = tokens.live_danmu_token(room_id).await;
            let _ = tx.send(GuardInbound::TokenFetched {
                room_id,
                setup,
                result,
            });
        });
    }

    fn on_token(&mut self, room_id: RoomId, setup: u64, result: Result<String, ServiceError>) {
        if !self.engine.finish_setup(&room_id, setup) {
            tracing::debug!(tier = self.tier.name, %room_id, "stale token result dropped");
            return;
        }
        if self.engine.contains(&room_id) {
            return;
        }
        let token = match result {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(
                    tier = self.tier.name,
                    %room_id,
                    error = %e,
                    "token fetch failed, room left unmonitored"
                );
                return;
            }
        };

        let generation = self.engine.next_generation();
        let info = RoomInfo::room(room_id);
        let spec = MonitorSpec {
            kind: self.tier.kind,
            addr: self.feed.clone(),
            info,
            token: Some(token),
        };
        let monitor = self.factory.create(spec, self.sink(room_id, generation));

        // Register before the start task can run.
        if let Some(monitor) = self.engine.register(room_id, generation, info, monitor) {
            self.engine.schedule_start(&monitor);
            tracing::debug!(
                tier = self.tier.name,
                %room_id,
                monitors = self.engine.len(),
                queued = self.engine.queued_starts(),
                "monitor registered"
            );
        }
    }

    fn sink(&self, room_id: RoomId, generation: u64) -> MonitorSink {
        let tx = self.inbound_tx.clone();
        MonitorSink::new(move |event| {
            let _ = tx.send(GuardInbound::Monitor {
                room_id,
                generation,
                event,
            });
        })
    }

    fn on_monitor_event(&mut self, room_id: RoomId, generation: u64, event: MonitorEvent) {
        let Some((monitor, _)) = self.engine.current(&room_id, generation) else {
            tracing::trace!(tier = self.tier.name, %room_id, "event from released monitor");
            return;
        };

        match event {
            MonitorEvent::Close => self.on_close(room_id, &monitor),
            MonitorEvent::Error(reason) => {
                tracing::debug!(
                    tier = self.tier.name,
                    %room_id,
                    %reason,
                    "monitor error, reconnect queued"
                );
                // Same monitor, same token.
                self.engine.schedule_start(&monitor);
            }
            MonitorEvent::AddToDb(_) => {
                self.engine.publish(ControllerEvent::AddToDb(room_id));
            }
            MonitorEvent::Raffle(raffle) => {
                self.engine.publish(ControllerEvent::Raffle(raffle));
            }
            MonitorEvent::DiscoveredRoom(other) => {
                tracing::trace!(tier = self.tier.name, %room_id, %other, "ignoring discovered room");
            }
        }
    }

    fn on_close(&mut self, room_id: RoomId, monitor: &F::Monitor) {
        self.engine.release(&room_id);
        tracing::debug!(tier = self.tier.name, %room_id, "monitor closed");

        if self.tier.promote_on_close && monitor.to_fixed() {
            tracing::info!(tier = self.tier.name, %room_id, "room promoted to fixed");
            self.engine.publish(ControllerEvent::ToFixed(room_id));
        }
    }
}
