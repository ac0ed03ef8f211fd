//! The per-tick control step.
//!
//! Each timer firing with tick index `t`:
//!
//! 1. if `t >= sim_length`, the agent is finished and nothing changes;
//! 2. otherwise update → (jitter) → broadcast → slot write → report step,
//!    then `t += 1`.
//!
//! Finishing is unilateral. Neighbours keep the last value they heard.

use heatmesh_core::TickId;
use tracing::info;

use crate::agent::Agent;
use crate::exchange::{BroadcastJitter, Broadcaster};
use crate::report::HostLink;

/// Outbound channels and pacing available to one tick.
pub struct TickContext<'a> {
    /// Broadcast medium for the agent's new value.
    pub bus: &'a dyn Broadcaster,
    /// Point-to-point link to the host for reports.
    pub host: &'a dyn HostLink,
    /// Pre-broadcast delay source; `None` broadcasts immediately.
    pub jitter: Option<&'a mut BroadcastJitter>,
}

impl<'a> TickContext<'a> {
    /// A context that broadcasts without jitter.
    pub fn new(bus: &'a dyn Broadcaster, host: &'a dyn HostLink) -> Self {
        Self {
            bus,
            host,
            jitter: None,
        }
    }

    /// Attach a jitter source.
    pub fn with_jitter(mut self, jitter: &'a mut BroadcastJitter) -> Self {
        self.jitter = Some(jitter);
        self
    }
}

/// Result of one timer firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// An update step ran for the given tick.
    Stepped(TickId),
    /// The run length is exhausted; the caller should stop the timer.
    Finished,
}

impl Agent {
    /// Handle one timer firing.
    pub fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> TickOutcome {
        let t = self.tick;
        if self.finished || t.0 >= self.sim_length() {
            if !self.finished {
                self.finished = true;
                info!(agent = %self.id(), ticks = t.0, value = %self.value(), "run complete");
            }
            return TickOutcome::Finished;
        }

        self.update();
        if let Some(jitter) = ctx.jitter.as_deref_mut() {
            jitter.pause();
        }
        self.broadcast_value(ctx.bus);
        self.report_step(t, ctx.host);

        self.metrics.ticks += 1;
        self.tick = TickId(t.0 + 1);
        TickOutcome::Stepped(t)
    }
}
