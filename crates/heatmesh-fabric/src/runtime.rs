//! Per-agent event loop.
//!
//! Each agent runs on its own thread, which owns the [`Agent`] outright.
//! One `select!` multiplexes the three event sources onto the agent's
//! handlers, so they never overlap:
//!
//! ```text
//! timer tick ─────┐
//! fabric inbox ───┼──▶ select! ──▶ &mut Agent
//! command inbox ──┤
//! stop signal ────┘
//! ```
//!
//! The loop exits when the agent finishes its run, or when the stop
//! channel fires or disconnects.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvError};
use heatmesh_agent::{Agent, AgentMetrics, BroadcastJitter, TickContext, TickOutcome};
use heatmesh_core::{AgentId, Fix16, McPacket, TickId};
use tracing::{debug, info};

use crate::fabric::FabricPort;
use crate::host::ChannelHostLink;
use crate::mailbox::Mailbox;

/// What an agent thread hands back when its loop exits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentExit {
    /// The agent that exited.
    pub id: AgentId,
    /// Its value at exit.
    pub value: Fix16,
    /// Ticks it completed.
    pub ticks: TickId,
    /// `true` if it ran to `sim_length`, `false` if it was stopped.
    pub finished: bool,
    /// Its counters at exit.
    pub metrics: AgentMetrics,
}

enum Event {
    Tick,
    Packet(Result<McPacket, RecvError>),
    Command(Result<Mailbox, RecvError>),
    Stop,
}

pub(crate) struct AgentRuntime {
    pub(crate) agent: Agent,
    pub(crate) packets: Receiver<McPacket>,
    pub(crate) commands: Receiver<Mailbox>,
    pub(crate) stop: Receiver<()>,
    pub(crate) start: Receiver<()>,
    pub(crate) bus: FabricPort,
    pub(crate) host: ChannelHostLink,
    pub(crate) jitter: Option<BroadcastJitter>,
    pub(crate) period: Duration,
}

impl AgentRuntime {
    pub(crate) fn run(mut self) -> AgentExit {
        // Released together when the machine drops the start sender.
        let _ = self.start.recv();

        let ticker = crossbeam_channel::tick(self.period);
        loop {
            let event = crossbeam_channel::select! {
                recv(ticker) -> _ => Event::Tick,
                recv(self.packets) -> msg => Event::Packet(msg),
                recv(self.commands) -> msg => Event::Command(msg),
                recv(self.stop) -> _ => Event::Stop,
            };

            match event {
                Event::Tick => {
                    let mut ctx = TickContext::new(&self.bus, &self.host);
                    if let Some(jitter) = self.jitter.as_mut() {
                        ctx = ctx.with_jitter(jitter);
                    }
                    if self.agent.on_tick(&mut ctx) == TickOutcome::Finished {
                        break;
                    }
                }
                Event::Packet(Ok(packet)) => {
                    self.agent.on_receive(packet);
                }
                Event::Command(Ok(mailbox)) => {
                    self.agent.on_command(mailbox, &self.bus);
                }
                // A closed inbox would otherwise be ready forever.
                Event::Packet(Err(RecvError)) => self.packets = crossbeam_channel::never(),
                Event::Command(Err(RecvError)) => self.commands = crossbeam_channel::never(),
                Event::Stop => {
                    debug!(agent = %self.agent.id(), tick = %self.agent.tick(), "stopped");
                    break;
                }
            }
        }

        let exit = AgentExit {
            id: self.agent.id(),
            value: self.agent.value(),
            ticks: self.agent.tick(),
            finished: self.agent.is_finished(),
            metrics: self.agent.metrics().clone(),
        };
        if exit.finished {
            info!(agent = %exit.id, value = %exit.value, "agent exited");
        }
        exit
    }
}
