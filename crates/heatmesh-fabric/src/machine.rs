//! Machine lifecycle: build, start, run, and shut down a grid of agents.
//!
//! # Startup
//!
//! [`Machine::start`] builds every agent from its configuration before any
//! thread exists, so a missing or invalid block aborts the start with no
//! side effects. Agent threads then park on a start gate until all of them
//! have been spawned, and begin ticking together.
//!
//! # Shutdown
//!
//! [`Machine::join`] waits for every agent to reach its run length.
//! [`Machine::shutdown`] stops them early. Both stop the command router
//! last and return a [`ShutdownReport`]. Dropping a running machine shuts
//! it down.

use std::ops::Range;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use heatmesh_agent::{
    Agent, AgentMetrics, BroadcastJitter, ConfigError, ConfigSource, ReportBuffer,
    DEFAULT_JITTER_US,
};
use heatmesh_core::{AgentId, ChipCoord};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::fabric::{Fabric, FabricStats};
use crate::host::{ChannelHostLink, CommandRouter, HostEndpoint, RouterStats};
use crate::layout::GridLayout;
use crate::mailbox::MailboxPool;
use crate::runtime::{AgentExit, AgentRuntime};

// ── MachineError ──────────────────────────────────────────────────

/// Errors starting a [`Machine`].
#[derive(Debug, PartialEq, Eq, Error)]
pub enum MachineError {
    /// An agent's startup configuration is missing or invalid.
    #[error("agent configuration: {0}")]
    Config(#[from] ConfigError),
    /// The tick period is zero.
    #[error("tick period must be non-zero")]
    ZeroTickPeriod,
    /// The broadcast jitter window does not fit in one tick period.
    #[error("jitter window {start_us}..{end_us} us does not fit a {period_us} us tick")]
    JitterExceedsPeriod {
        /// Window start in microseconds.
        start_us: u64,
        /// Window end in microseconds.
        end_us: u64,
        /// Tick period in microseconds.
        period_us: u64,
    },
    /// A queue or pool capacity is zero.
    #[error("{what} capacity must be non-zero")]
    ZeroCapacity {
        /// Which capacity.
        what: &'static str,
    },
    /// A thread could not be spawned.
    #[error("failed to spawn thread {name}: {reason}")]
    ThreadSpawnFailed {
        /// Name of the thread.
        name: String,
        /// OS error text.
        reason: String,
    },
}

// ── MachineConfig ─────────────────────────────────────────────────

/// Runtime parameters shared by every agent of a machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    /// Timer period of every agent. Default: 1 ms.
    pub tick_period: Duration,
    /// Pre-broadcast delay window in microseconds; empty disables jitter.
    /// Default: 128..384.
    pub jitter_us: Range<u64>,
    /// Seed from which per-agent jitter streams are derived. Default: 0.
    pub seed: u64,
    /// Packets each agent's fabric inbox holds. Default: 64.
    pub packet_capacity: usize,
    /// Commands queued per agent and at the host. Default: 16.
    pub command_capacity: usize,
    /// Reports queued towards the host. Default: 256.
    pub report_capacity: usize,
    /// Command buffers in flight machine-wide. Default: 32.
    pub mailbox_pool: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(1),
            jitter_us: DEFAULT_JITTER_US,
            seed: 0,
            packet_capacity: 64,
            command_capacity: 16,
            report_capacity: 256,
            mailbox_pool: 32,
        }
    }
}

impl MachineConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), MachineError> {
        if self.tick_period.is_zero() {
            return Err(MachineError::ZeroTickPeriod);
        }
        let period_us = self.tick_period.as_micros() as u64;
        if !self.jitter_us.is_empty() && self.jitter_us.end > period_us {
            return Err(MachineError::JitterExceedsPeriod {
                start_us: self.jitter_us.start,
                end_us: self.jitter_us.end,
                period_us,
            });
        }
        for (what, n) in [
            ("packet", self.packet_capacity),
            ("command", self.command_capacity),
            ("report", self.report_capacity),
            ("mailbox pool", self.mailbox_pool),
        ] {
            if n == 0 {
                return Err(MachineError::ZeroCapacity { what });
            }
        }
        Ok(())
    }

    fn jitter_for(&self, agent: AgentId) -> Option<BroadcastJitter> {
        if self.jitter_us.is_empty() {
            return None;
        }
        let salt = (u64::from(agent.chip.chip_id()) << 8) | u64::from(agent.core.0);
        Some(BroadcastJitter::new(self.seed ^ salt, self.jitter_us.clone()))
    }
}

// ── ShutdownReport ────────────────────────────────────────────────

/// Outcome of a machine run.
#[derive(Clone, Debug)]
pub struct ShutdownReport {
    /// Wall-clock time from start to the last join.
    pub elapsed: Duration,
    /// Agent threads joined cleanly.
    pub agents_joined: usize,
    /// Agents that ran to their full length.
    pub agents_finished: usize,
    /// Per-agent exit state, in placement order.
    pub exits: Vec<AgentExit>,
    /// Counters summed over every agent.
    pub metrics: AgentMetrics,
    /// Fabric delivery counters.
    pub fabric: FabricStats,
    /// Command router counters; default if the router thread panicked.
    pub router: RouterStats,
}

// ── Machine ───────────────────────────────────────────────────────

/// A running grid of agent threads plus the host command router.
pub struct Machine {
    agents: Vec<JoinHandle<AgentExit>>,
    router: Option<JoinHandle<RouterStats>>,
    stop: Option<Sender<()>>,
    fabric: Arc<Fabric>,
    started: Instant,
}

impl Machine {
    /// Build and start one agent per cell of `layout`.
    ///
    /// Configuration for each agent comes from `source`. Returns the
    /// running machine and the host's endpoint.
    pub fn start(
        layout: &GridLayout,
        source: &dyn ConfigSource,
        config: MachineConfig,
    ) -> Result<(Self, HostEndpoint), MachineError> {
        config.validate()?;

        let buffers: IndexMap<ChipCoord, Arc<ReportBuffer>> = layout
            .chips()
            .map(|chip| (chip, ReportBuffer::shared(layout.report_slots(chip))))
            .collect();
        let mut agents = Vec::with_capacity(layout.len());
        for cell in layout.cells() {
            let buffer = Arc::clone(&buffers[&cell.agent.chip]);
            agents.push(Agent::from_source(cell.agent, source, buffer)?);
        }

        let mut fabric = Fabric::new(layout.routes().clone());
        let (report_tx, report_rx) = crossbeam_channel::bounded(config.report_capacity);
        let (host_command_tx, host_command_rx) =
            crossbeam_channel::bounded(config.command_capacity);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (start_tx, start_rx) = crossbeam_channel::bounded::<()>(0);

        let mut inboxes = Vec::with_capacity(agents.len());
        let mut command_targets = IndexMap::with_capacity(agents.len());
        for agent in &agents {
            let packets = fabric.attach(agent.id(), config.packet_capacity);
            let (tx, rx) = crossbeam_channel::bounded(config.command_capacity);
            command_targets.insert(agent.id(), tx);
            inboxes.push((packets, rx));
        }
        let fabric = Arc::new(fabric);
        let host_link = ChannelHostLink::new(report_tx);

        let mut machine = Self {
            agents: Vec::with_capacity(agents.len()),
            router: None,
            stop: Some(stop_tx),
            fabric: Arc::clone(&fabric),
            started: Instant::now(),
        };

        let router = CommandRouter::new(
            host_command_rx,
            stop_rx.clone(),
            command_targets,
            MailboxPool::new(config.mailbox_pool),
        );
        machine.router = Some(spawn("heatmesh-router".into(), move || router.run())?);

        for (agent, (packets, commands)) in agents.into_iter().zip(inboxes) {
            let id = agent.id();
            let runtime = AgentRuntime {
                packets,
                commands,
                stop: stop_rx.clone(),
                start: start_rx.clone(),
                bus: fabric.port(id),
                host: host_link.clone(),
                jitter: config.jitter_for(id),
                period: config.tick_period,
                agent,
            };
            let name = format!("heatmesh-{}-{}-{}", id.chip.x, id.chip.y, id.core);
            match spawn(name, move || runtime.run()) {
                Ok(handle) => machine.agents.push(handle),
                Err(e) => {
                    // Release the gate so already-spawned agents can see the stop.
                    drop(start_tx);
                    return Err(e);
                }
            }
        }

        info!(
            agents = machine.agents.len(),
            chips = buffers.len(),
            tick_us = config.tick_period.as_micros() as u64,
            "machine started"
        );
        drop(start_tx);

        Ok((machine, HostEndpoint::new(report_rx, host_command_tx, layout)))
    }

    /// Number of agent threads.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// `true` if the machine has no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Current fabric delivery counters.
    pub fn fabric_stats(&self) -> FabricStats {
        self.fabric.stats()
    }

    /// `true` once every agent thread has exited.
    pub fn is_finished(&self) -> bool {
        self.agents.iter().all(JoinHandle::is_finished)
    }

    /// Wait for every agent to complete its run, then stop the router.
    ///
    /// Blocks for as long as the longest `sim_length` takes.
    pub fn join(mut self) -> ShutdownReport {
        self.finish(false)
    }

    /// Stop every agent now and wait for the threads to exit.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.finish(true)
    }

    fn finish(&mut self, stop_first: bool) -> ShutdownReport {
        if stop_first {
            self.stop.take();
        }

        let mut exits = Vec::with_capacity(self.agents.len());
        let mut metrics = AgentMetrics::default();
        for handle in self.agents.drain(..) {
            match handle.join() {
                Ok(exit) => {
                    metrics.accumulate(&exit.metrics);
                    exits.push(exit);
                }
                Err(_) => warn!("agent thread panicked"),
            }
        }

        self.stop.take();
        let router = match self.router.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                warn!("command router panicked");
                RouterStats::default()
            }
            None => RouterStats::default(),
        };

        let report = ShutdownReport {
            elapsed: self.started.elapsed(),
            agents_joined: exits.len(),
            agents_finished: exits.iter().filter(|e| e.finished).count(),
            exits,
            metrics,
            fabric: self.fabric.stats(),
            router,
        };
        info!(
            agents = report.agents_joined,
            finished = report.agents_finished,
            ticks = report.metrics.ticks,
            reports = report.metrics.reports_sent,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "machine shut down"
        );
        report
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        if !self.agents.is_empty() || self.router.is_some() {
            self.finish(true);
        }
    }
}

fn spawn<T, F>(name: String, f: F) -> Result<JoinHandle<T>, MachineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|e| MachineError::ThreadSpawnFailed {
            name,
            reason: e.to_string(),
        })
}
