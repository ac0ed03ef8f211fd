//! The host side of the point-to-point channel.
//!
//! Reports and commands cross this boundary as encoded datagrams, the same
//! bytes a network link would carry:
//!
//! ```text
//! agents ──ChannelHostLink──▶ [report datagrams] ──▶ HostEndpoint::recv_report
//! HostEndpoint::send_command ──▶ [command datagrams] ──▶ CommandRouter ──Mailbox──▶ agent
//! ```

use std::time::Duration;

use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use heatmesh_agent::HostLink;
use heatmesh_core::{
    AgentId, BroadcastKey, Fix16, HostCommand, HostReport, TransportError, WireError,
    NUM_NEIGHBOURS,
};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::layout::{Direction, GridLayout};
use crate::mailbox::{Mailbox, MailboxPool};

/// Failure to receive a report on the host.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HostError {
    /// Nothing arrived, or every agent has exited.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A datagram arrived but could not be decoded.
    #[error(transparent)]
    Wire(#[from] WireError),
}

// ── ChannelHostLink ───────────────────────────────────────────────

/// Agent-side [`HostLink`] over a bounded datagram channel.
#[derive(Clone, Debug)]
pub struct ChannelHostLink {
    tx: Sender<Vec<u8>>,
}

impl ChannelHostLink {
    /// A link writing encoded reports into `tx`.
    pub fn new(tx: Sender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

impl HostLink for ChannelHostLink {
    fn send_report(&self, report: HostReport, timeout: Duration) -> Result<(), TransportError> {
        self.tx
            .send_timeout(report.encode(), timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => TransportError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                },
                SendTimeoutError::Disconnected(_) => TransportError::Disconnected,
            })
    }
}

// ── HostEndpoint ──────────────────────────────────────────────────

/// The host's end of a running machine: report intake and command output.
#[derive(Debug)]
pub struct HostEndpoint {
    reports: Receiver<Vec<u8>>,
    commands: Sender<Vec<u8>>,
    injector: AgentId,
    edge_keys: [BroadcastKey; NUM_NEIGHBOURS],
}

impl HostEndpoint {
    /// An endpoint for `layout`, reading reports from `reports` and
    /// writing command datagrams into `commands`.
    pub fn new(reports: Receiver<Vec<u8>>, commands: Sender<Vec<u8>>, layout: &GridLayout) -> Self {
        Self {
            reports,
            commands,
            injector: layout.injector(),
            edge_keys: Direction::ALL.map(|d| layout.edge_key(d)),
        }
    }

    /// Wait up to `timeout` for the next report.
    pub fn recv_report(&self, timeout: Duration) -> Result<HostReport, HostError> {
        let bytes = self.reports.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            },
            RecvTimeoutError::Disconnected => TransportError::Disconnected,
        })?;
        Ok(HostReport::decode(&bytes)?)
    }

    /// The next queued report, if any.
    pub fn try_recv_report(&self) -> Result<Option<HostReport>, HostError> {
        match self.reports.try_recv() {
            Ok(bytes) => Ok(Some(HostReport::decode(&bytes)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected.into()),
        }
    }

    /// Send `command` to `target`. Never blocks.
    pub fn send_command(&self, target: AgentId, command: HostCommand) -> Result<(), TransportError> {
        self.commands
            .try_send(command.encode(target))
            .map_err(|e| match e {
                TrySendError::Full(_) => TransportError::QueueFull,
                TrySendError::Disconnected(_) => TransportError::Disconnected,
            })
    }

    /// Drive the edge net in `direction` to `value`.
    ///
    /// The injector agent broadcasts `value` once under the edge key; cells
    /// on that boundary keep it as their neighbour value until the next
    /// injection.
    pub fn set_edge_temperature(&self, direction: Direction, value: Fix16) -> Result<(), TransportError> {
        let key = self.edge_keys[direction.slot()];
        self.send_command(
            self.injector,
            HostCommand::inject_broadcast(key, value.to_payload()),
        )
    }

    /// Key of the edge net in `direction`.
    pub fn edge_key(&self, direction: Direction) -> BroadcastKey {
        self.edge_keys[direction.slot()]
    }
}

// ── CommandRouter ─────────────────────────────────────────────────

/// Counters of the command router.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Commands handed to their agent.
    pub routed: u64,
    /// Datagrams that failed to decode.
    pub malformed: u64,
    /// Commands addressed to an agent that does not exist.
    pub unknown_target: u64,
    /// Commands refused because every mailbox was in use.
    pub pool_exhausted: u64,
    /// Commands refused because the agent's queue was full or closed.
    pub undeliverable: u64,
}

/// Decodes command datagrams and forwards them to agent mailboxes.
pub(crate) struct CommandRouter {
    inbound: Receiver<Vec<u8>>,
    stop: Receiver<()>,
    targets: IndexMap<AgentId, Sender<Mailbox>>,
    pool: MailboxPool,
    stats: RouterStats,
}

impl CommandRouter {
    pub(crate) fn new(
        inbound: Receiver<Vec<u8>>,
        stop: Receiver<()>,
        targets: IndexMap<AgentId, Sender<Mailbox>>,
        pool: MailboxPool,
    ) -> Self {
        Self {
            inbound,
            stop,
            targets,
            pool,
            stats: RouterStats::default(),
        }
    }

    /// Route until the host hangs up or the machine stops.
    pub(crate) fn run(mut self) -> RouterStats {
        loop {
            crossbeam_channel::select! {
                recv(self.inbound) -> msg => match msg {
                    Ok(bytes) => self.route(&bytes),
                    Err(_) => break,
                },
                recv(self.stop) -> _ => break,
            }
        }
        self.stats
    }

    pub(crate) fn route(&mut self, bytes: &[u8]) {
        let (target, command) = match HostCommand::decode(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.stats.malformed += 1;
                debug!(error = %e, "malformed host command");
                return;
            }
        };
        let Some(tx) = self.targets.get(&target) else {
            self.stats.unknown_target += 1;
            debug!(agent = %target, "host command for unknown agent");
            return;
        };
        let Some(mailbox) = self.pool.checkout(command) else {
            self.stats.pool_exhausted += 1;
            debug!(
                agent = %target,
                capacity = self.pool.capacity(),
                "mailbox pool exhausted, command dropped"
            );
            return;
        };
        match tx.try_send(mailbox) {
            Ok(()) => self.stats.routed += 1,
            Err(_) => {
                self.stats.undeliverable += 1;
                debug!(agent = %target, "agent not accepting commands");
            }
        }
    }
}
