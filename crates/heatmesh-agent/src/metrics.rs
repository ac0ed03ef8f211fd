//! Per-agent counters.
//!
//! [`AgentMetrics`] is updated in place by the handlers and copied out
//! when an agent's run loop exits. Counters never reset.

/// Cumulative event counts for one agent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentMetrics {
    /// Update steps executed.
    pub ticks: u64,
    /// Broadcast packets received, matched or not.
    pub packets_received: u64,
    /// Received packets whose key matched at least one neighbour slot.
    pub packets_matched: u64,
    /// Own-value broadcasts accepted by the fabric.
    pub broadcasts_sent: u64,
    /// Own-value broadcasts the fabric refused.
    pub broadcasts_dropped: u64,
    /// Host reports accepted by the host link.
    pub reports_sent: u64,
    /// Host reports that failed or timed out.
    pub reports_dropped: u64,
    /// Host commands that injected a broadcast.
    pub commands_injected: u64,
    /// Host commands ignored (unknown opcode or failed injection).
    pub commands_ignored: u64,
}

impl AgentMetrics {
    /// Fold another agent's counters into this one.
    pub fn accumulate(&mut self, other: &AgentMetrics) {
        self.ticks += other.ticks;
        self.packets_received += other.packets_received;
        self.packets_matched += other.packets_matched;
        self.broadcasts_sent += other.broadcasts_sent;
        self.broadcasts_dropped += other.broadcasts_dropped;
        self.reports_sent += other.reports_sent;
        self.reports_dropped += other.reports_dropped;
        self.commands_injected += other.commands_injected;
        self.commands_ignored += other.commands_ignored;
    }
}
