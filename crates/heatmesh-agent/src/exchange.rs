//! Neighbour exchange over the broadcast fabric.
//!
//! Agents publish their value tagged with their own key and listen for
//! everyone else's. Freshness is "whatever arrived since the last tick":
//! a dropped packet leaves the slot stale for a step, a duplicate simply
//! overwrites it.

use std::ops::Range;
use std::time::Duration;

use heatmesh_core::{Fix16, McPacket, TransportError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::agent::Agent;

/// Best-effort transmitter onto the shared broadcast medium.
///
/// No acknowledgement and no ordering guarantee relative to other
/// senders. An `Err` means the medium refused the packet outright; a
/// packet accepted here may still be lost downstream.
pub trait Broadcaster {
    /// Transmit one packet.
    fn broadcast(&self, packet: McPacket) -> Result<(), TransportError>;
}

/// Default delay window before an agent's periodic broadcast, in µs.
pub const DEFAULT_JITTER_US: Range<u64> = 128..384;

/// Random pre-broadcast delay that desynchronises agents sharing a medium.
///
/// Seeded per agent so runs are reproducible. Blocks only the calling
/// agent.
#[derive(Debug)]
pub struct BroadcastJitter {
    rng: ChaCha8Rng,
    window_us: Range<u64>,
}

impl BroadcastJitter {
    /// A jitter source drawing delays from `window_us` (microseconds).
    pub fn new(seed: u64, window_us: Range<u64>) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            window_us,
        }
    }

    /// Draw the next delay. An empty window yields zero.
    pub fn next_delay(&mut self) -> Duration {
        if self.window_us.is_empty() {
            return Duration::ZERO;
        }
        Duration::from_micros(self.rng.random_range(self.window_us.clone()))
    }

    /// Sleep for the next delay.
    pub fn pause(&mut self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

impl Agent {
    /// Handle an inbound broadcast.
    ///
    /// Every neighbour slot whose key matches takes the payload; packets
    /// without a payload and packets with no matching slot (including this
    /// agent's own broadcasts) are ignored. Returns `true` if any slot
    /// changed hands.
    pub fn on_receive(&mut self, packet: McPacket) -> bool {
        self.metrics.packets_received += 1;
        let Some(payload) = packet.payload else {
            return false;
        };

        let keys = *self.neighbour_keys();
        let values = self.neighbour_values_mut();
        let mut matched = false;
        for (slot, key) in values.iter_mut().zip(keys) {
            if key == packet.key {
                *slot = Fix16::from_payload(payload);
                matched = true;
            }
        }

        if matched {
            self.metrics.packets_matched += 1;
            trace!(agent = %self.id(), key = %packet.key, payload, "neighbour value updated");
        }
        matched
    }

    /// Broadcast the current value under this agent's key.
    pub fn broadcast_value(&mut self, bus: &dyn Broadcaster) -> bool {
        let packet = McPacket::with_value(self.own_key(), self.value());
        match bus.broadcast(packet) {
            Ok(()) => {
                self.metrics.broadcasts_sent += 1;
                true
            }
            Err(e) => {
                self.metrics.broadcasts_dropped += 1;
                trace!(agent = %self.id(), error = %e, "broadcast refused");
                false
            }
        }
    }
}
