//! Test utilities and mock transports for heatmesh development.
//!
//! Provides recording implementations of the agent's outbound traits
//! ([`Broadcaster`], [`HostLink`]), a [`TrackedCommand`] whose release can
//! be observed, and configuration fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::borrow::Borrow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use heatmesh_agent::{Broadcaster, HostLink};
use heatmesh_core::{HostCommand, HostReport, McPacket, TransportError};

/// [`Broadcaster`] that records every packet it is given.
///
/// Can be switched to refuse packets with [`set_refusing`](Self::set_refusing).
#[derive(Default)]
pub struct RecordingBus {
    packets: Mutex<Vec<McPacket>>,
    refuse: Mutex<bool>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every broadcast fails with `QueueFull` and is not recorded.
    pub fn set_refusing(&self, refuse: bool) {
        *self.refuse.lock().unwrap() = refuse;
    }

    /// Packets accepted so far, in order.
    pub fn packets(&self) -> Vec<McPacket> {
        self.packets.lock().unwrap().clone()
    }

    /// Number of packets accepted so far.
    pub fn len(&self) -> usize {
        self.packets.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.packets.lock().unwrap().clear();
    }
}

impl Broadcaster for RecordingBus {
    fn broadcast(&self, packet: McPacket) -> Result<(), TransportError> {
        if *self.refuse.lock().unwrap() {
            return Err(TransportError::QueueFull);
        }
        self.packets.lock().unwrap().push(packet);
        Ok(())
    }
}

/// [`HostLink`] that records every report and the timeout it was sent with.
///
/// Optionally fails every send, to exercise the drop path.
#[derive(Default)]
pub struct RecordingHostLink {
    reports: Mutex<Vec<(HostReport, Duration)>>,
    fail_with: Mutex<Option<TransportError>>,
    attempts: AtomicUsize,
}

impl RecordingHostLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A link whose every send fails with `err`.
    pub fn failing(err: TransportError) -> Self {
        let link = Self::default();
        *link.fail_with.lock().unwrap() = Some(err);
        link
    }

    /// Reports accepted so far.
    pub fn reports(&self) -> Vec<HostReport> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }

    /// Timeouts the accepted reports were sent with.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.reports.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// Number of `send_report` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl HostLink for RecordingHostLink {
    fn send_report(&self, report: HostReport, timeout: Duration) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        self.reports.lock().unwrap().push((report, timeout));
        Ok(())
    }
}

/// A [`HostCommand`] buffer that counts its own release.
///
/// Every `TrackedCommand` created from a [`ReleaseCounter`] bumps the
/// counter when dropped, so tests can assert the handler let go of it.
pub struct TrackedCommand {
    command: HostCommand,
    released: Arc<AtomicUsize>,
}

impl Borrow<HostCommand> for TrackedCommand {
    fn borrow(&self) -> &HostCommand {
        &self.command
    }
}

impl Drop for TrackedCommand {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Issues [`TrackedCommand`]s and counts how many were released.
#[derive(Clone, Default)]
pub struct ReleaseCounter {
    released: Arc<AtomicUsize>,
}

impl ReleaseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, command: HostCommand) -> TrackedCommand {
        TrackedCommand {
            command,
            released: Arc::clone(&self.released),
        }
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}
