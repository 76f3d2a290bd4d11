//! Slot engine shared by every controller tier.
//!
//! Owns the `key → monitor` map, the controller's dispatch queue and its
//! event hub. Lives inside a controller actor, so it is never shared and
//! needs no locking.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use roomwatch_dispatch::DispatchQueue;
use roomwatch_protocol::{ControllerEvent, RoomInfo};
use tokio::sync::broadcast;

use crate::{ControllerConfig, Monitor};

/// One occupied connection slot.
pub(crate) struct Slot<M> {
    pub(crate) monitor: Arc<M>,
    pub(crate) info: RoomInfo,
    /// Distinguishes this monitor from earlier ones under the same key, so
    /// late events from a destroyed monitor can be recognised and dropped.
    pub(crate) generation: u64,
}

pub(crate) struct SlotEngine<K, M> {
    name: &'static str,
    slots: HashMap<K, Slot<M>>,
    /// Keys with a setup in flight (token fetch, discovery, scan), each
    /// tagged with the setup's id. Results carrying any other id are stale.
    pending: HashMap<K, u64>,
    queue: DispatchQueue,
    hub: broadcast::Sender<ControllerEvent>,
    next_generation: u64,
    running: bool,
}

impl<K, M> SlotEngine<K, M>
where
    K: Copy + Eq + Hash + Display,
    M: Monitor,
{
    pub(crate) fn new(name: &'static str, config: &ControllerConfig) -> Self {
        let (hub, _) = broadcast::channel(config.event_capacity);
        Self {
            name,
            slots: HashMap::new(),
            pending: HashMap::new(),
            queue: DispatchQueue::new(config.dispatch),
            hub,
            next_generation: 1,
            running: true,
        }
    }

    /// An engine that ignores work until [`start`](Self::start).
    pub(crate) fn stopped(name: &'static str, config: &ControllerConfig) -> Self {
        let mut engine = Self::new(name, config);
        engine.running = false;
        engine.queue.stop();
        engine
    }

    pub(crate) fn hub(&self) -> broadcast::Sender<ControllerEvent> {
        self.hub.clone()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    // -- Slot membership --

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = (&K, &Slot<M>)> {
        self.slots.iter()
    }

    /// Returns the slot's monitor if `generation` still owns `key`.
    pub(crate) fn current(&self, key: &K, generation: u64) -> Option<(Arc<M>, RoomInfo)> {
        self.slots
            .get(key)
            .filter(|slot| slot.generation == generation)
            .map(|slot| (Arc::clone(&slot.monitor), slot.info))
    }

    /// Reserves a generation for a monitor or setup about to begin.
    pub(crate) fn next_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// Registers a monitor under `key`. Callers check `contains` first; an
    /// occupied key is left untouched and `None` is returned.
    pub(crate) fn register(
        &mut self,
        key: K,
        generation: u64,
        info: RoomInfo,
        monitor: M,
    ) -> Option<Arc<M>> {
        if self.slots.contains_key(&key) {
            return None;
        }
        let monitor = Arc::new(monitor);
        self.slots.insert(
            key,
            Slot {
                monitor: Arc::clone(&monitor),
                info,
                generation,
            },
        );
        Some(monitor)
    }

    /// Destroys the monitor under `key` and frees the slot.
    pub(crate) fn release(&mut self, key: &K) -> Option<Slot<M>> {
        let slot = self.slots.remove(key)?;
        slot.monitor.destroy();
        Some(slot)
    }

    // -- Pending setups --

    /// Whether setup `id` is still the one in flight for `key`.
    pub(crate) fn is_pending(&self, key: &K, id: u64) -> bool {
        self.pending.get(key) == Some(&id)
    }

    /// Marks a setup as in flight and returns its id, or `None` if one
    /// already is.
    pub(crate) fn begin_setup(&mut self, key: K) -> Option<u64> {
        if self.pending.contains_key(&key) {
            return None;
        }
        let id = self.next_generation();
        self.pending.insert(key, id);
        Some(id)
    }

    /// Ends setup `id`. Returns `false` if the result is stale: the key was
    /// released by a stop, or a newer setup replaced it.
    pub(crate) fn finish_setup(&mut self, key: &K, id: u64) -> bool {
        if !self.is_pending(key, id) {
            return false;
        }
        self.pending.remove(key);
        true
    }

    // -- Dispatch --

    /// Queues a rate-limited `start()` of `monitor`.
    ///
    /// The task only holds a weak reference: if the slot is released before
    /// the task runs, the start is skipped.
    pub(crate) fn schedule_start(&mut self, monitor: &Arc<M>) {
        let monitor = Arc::downgrade(monitor);
        self.queue.add(move || match monitor.upgrade() {
            Some(monitor) => monitor.start().map_err(Into::into),
            None => Ok(()),
        });
    }

    pub(crate) fn wait_for_refresh(&self) -> impl Future<Output = ()> + Send + 'static {
        self.queue.wait_for_refresh()
    }

    pub(crate) fn refresh(&mut self) {
        self.queue.refresh();
    }

    // -- Hub --

    /// Publishes to every subscriber. Having none is fine.
    pub(crate) fn publish(&self, event: ControllerEvent) {
        let _ = self.hub.send(event);
    }

    // -- Lifecycle --

    pub(crate) fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.queue.start();
            tracing::info!(controller = self.name, "controller started");
        }
    }

    /// Destroys every monitor and drops all slots and pending setups.
    ///
    /// Queued start tasks stay in the (stopped) queue and turn into no-ops
    /// once their monitor is dropped here.
    pub(crate) fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.queue.stop();
        let destroyed = self.slots.len();
        for slot in self.slots.values() {
            slot.monitor.destroy();
        }
        self.slots.clear();
        self.pending.clear();
        tracing::info!(controller = self.name, destroyed, "controller stopped");
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn queued_starts(&self) -> usize {
        self.queue.len()
    }
}
