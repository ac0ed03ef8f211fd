//! In-process broadcast medium.
//!
//! Every attached agent owns a bounded inbox. A packet is delivered to the
//! inboxes its key is routed to in the [`RoutingTable`]; keys with no route
//! are flooded to every inbox. Delivery is lossy: a full inbox drops the
//! packet and the drop is counted, exactly as a congested router would.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use heatmesh_agent::Broadcaster;
use heatmesh_core::{AgentId, BroadcastKey, McPacket, TransportError};
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

/// Destinations of one key. Interior cells have at most four listeners.
pub type RouteTargets = SmallVec<[AgentId; 4]>;

// ── RoutingTable ──────────────────────────────────────────────────

/// Multicast routes: broadcast key → listening agents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: IndexMap<BroadcastKey, RouteTargets>,
}

impl RoutingTable {
    /// An empty table; every key floods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver packets tagged `key` to `target`. Adding a route twice is a
    /// no-op.
    pub fn add_route(&mut self, key: BroadcastKey, target: AgentId) {
        let targets = self.routes.entry(key).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Listeners for `key`, or `None` if the key is unrouted.
    pub fn targets(&self, key: BroadcastKey) -> Option<&[AgentId]> {
        self.routes.get(&key).map(|t| t.as_slice())
    }

    /// Number of routed keys.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// `true` if no key is routed.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routed keys and their listeners, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (BroadcastKey, &[AgentId])> {
        self.routes.iter().map(|(k, t)| (*k, t.as_slice()))
    }
}

// ── FabricStats ───────────────────────────────────────────────────

/// Cumulative delivery counters of a [`Fabric`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FabricStats {
    /// Packets handed to the fabric.
    pub packets_sent: u64,
    /// Packets that had no route and were flooded.
    pub packets_flooded: u64,
    /// Per-inbox deliveries.
    pub deliveries: u64,
    /// Per-inbox drops because the inbox was full.
    pub dropped_full: u64,
    /// Per-inbox drops because the listener is gone or was never attached.
    pub dropped_disconnected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    packets_sent: AtomicU64,
    packets_flooded: AtomicU64,
    deliveries: AtomicU64,
    dropped_full: AtomicU64,
    dropped_disconnected: AtomicU64,
}

// ── Fabric ────────────────────────────────────────────────────────

/// The shared broadcast medium.
///
/// Built single-threaded with [`attach`](Self::attach), then shared behind
/// an `Arc` and used through [`FabricPort`]s.
#[derive(Debug)]
pub struct Fabric {
    inboxes: IndexMap<AgentId, Sender<McPacket>>,
    routes: RoutingTable,
    counters: Counters,
}

impl Fabric {
    /// A fabric with no inboxes using `routes`.
    pub fn new(routes: RoutingTable) -> Self {
        Self {
            inboxes: IndexMap::new(),
            routes,
            counters: Counters::default(),
        }
    }

    /// Give `agent` an inbox holding up to `capacity` packets.
    ///
    /// Attaching an agent again replaces its inbox; the old receiver stops
    /// getting packets.
    pub fn attach(&mut self, agent: AgentId, capacity: usize) -> Receiver<McPacket> {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        self.inboxes.insert(agent, tx);
        rx
    }

    /// Number of attached inboxes.
    pub fn len(&self) -> usize {
        self.inboxes.len()
    }

    /// `true` if no inbox is attached.
    pub fn is_empty(&self) -> bool {
        self.inboxes.is_empty()
    }

    /// The routing table in use.
    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Deliver `packet` to every listener of its key.
    ///
    /// Returns the number of inboxes that accepted it. Fails only if the
    /// packet had listeners and none accepted it.
    pub fn deliver(&self, packet: McPacket) -> Result<usize, TransportError> {
        self.counters.packets_sent.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut full = 0;
        let mut gone = 0;
        let mut offer = |inbox: Option<&Sender<McPacket>>| match inbox {
            Some(tx) => match tx.try_send(packet) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => full += 1,
                Err(TrySendError::Disconnected(_)) => gone += 1,
            },
            None => gone += 1,
        };

        match self.routes.targets(packet.key) {
            Some(targets) => {
                for agent in targets {
                    offer(self.inboxes.get(agent));
                }
            }
            None => {
                self.counters.packets_flooded.fetch_add(1, Ordering::Relaxed);
                for tx in self.inboxes.values() {
                    offer(Some(tx));
                }
            }
        }

        self.counters
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.counters
            .dropped_full
            .fetch_add(full as u64, Ordering::Relaxed);
        self.counters
            .dropped_disconnected
            .fetch_add(gone as u64, Ordering::Relaxed);

        if delivered == 0 && full > 0 {
            Err(TransportError::QueueFull)
        } else if delivered == 0 && gone > 0 {
            Err(TransportError::Disconnected)
        } else {
            Ok(delivered)
        }
    }

    /// A transmit handle for `origin`.
    pub fn port(self: &Arc<Self>, origin: AgentId) -> FabricPort {
        FabricPort {
            fabric: Arc::clone(self),
            origin,
        }
    }

    /// Snapshot of the delivery counters.
    pub fn stats(&self) -> FabricStats {
        FabricStats {
            packets_sent: self.counters.packets_sent.load(Ordering::Relaxed),
            packets_flooded: self.counters.packets_flooded.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            dropped_full: self.counters.dropped_full.load(Ordering::Relaxed),
            dropped_disconnected: self.counters.dropped_disconnected.load(Ordering::Relaxed),
        }
    }
}

/// One agent's transmitter onto a shared [`Fabric`].
#[derive(Clone, Debug)]
pub struct FabricPort {
    fabric: Arc<Fabric>,
    origin: AgentId,
}

impl FabricPort {
    /// The agent this port transmits for.
    pub fn origin(&self) -> AgentId {
        self.origin
    }
}

impl Broadcaster for FabricPort {
    fn broadcast(&self, packet: McPacket) -> Result<(), TransportError> {
        let delivered = self.fabric.deliver(packet)?;
        trace!(origin = %self.origin, key = %packet.key, delivered, "packet sent");
        Ok(())
    }
}
