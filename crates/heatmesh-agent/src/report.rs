//! Staggered host reporting.
//!
//! Every agent on a chip deposits its value in its own slot of the chip's
//! [`ReportBuffer`]. One elected agent per chip, the [`Reporter`], copies
//! the buffer into a [`HostReport`] once every [`REPORT_PERIOD`] ticks, at
//! the tick whose index modulo the period equals its chip's phase.
//!
//! Phases come from the chip's position in its 8×8 group, so at most one
//! chip per group reports on any tick and a fully populated group spreads
//! its 64 reports over 64 consecutive ticks.
//!
//! Sends are fire-and-forget: a failed or timed-out send is counted and
//! dropped, and the next opportunity is the next period.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use heatmesh_core::{
    AgentId, ChipCoord, Fix16, HostReport, TickId, TransportError, REPORT_PERIOD,
};
use tracing::debug;

use crate::agent::Agent;

/// Timeout handed to the host link for each report.
pub const REPORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Phase at which `chip` reports: its index within its 8×8 group.
pub fn report_phase(chip: ChipCoord) -> u64 {
    (u64::from(chip.x & 0x7) << 3) | u64::from(chip.y & 0x7)
}

/// Outbound point-to-point channel to the host.
pub trait HostLink {
    /// Hand `report` to the transport, waiting at most `timeout`.
    fn send_report(&self, report: HostReport, timeout: Duration) -> Result<(), TransportError>;
}

// ── ReportBuffer ──────────────────────────────────────────────────

/// Per-chip array of report slots shared by co-located agents.
///
/// Each slot has at most one live writer (its [`ReportSlot`]); the
/// reporter reads every slot without locking. A read may observe a slot
/// its owner has not refreshed yet this period, which is accepted.
#[derive(Debug)]
pub struct ReportBuffer {
    slots: Box<[AtomicI32]>,
    claimed: Box<[AtomicBool]>,
}

impl ReportBuffer {
    /// A buffer of `len` zeroed, unclaimed slots, ready to share.
    pub fn shared(len: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: (0..len).map(|_| AtomicI32::new(0)).collect(),
            claimed: (0..len).map(|_| AtomicBool::new(false)).collect(),
        })
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` if the buffer has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Claim the writer handle for slot `index`.
    ///
    /// Returns `None` if `index` is out of range or another [`ReportSlot`]
    /// for it is still alive. The claim ends when the handle is dropped.
    pub fn slot(this: &Arc<Self>, index: usize) -> Option<ReportSlot> {
        let claimed = this.claimed.get(index)?;
        if claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(ReportSlot {
            buffer: Arc::clone(this),
            index,
        })
    }

    /// Read the first `len` slots.
    pub fn snapshot(&self, len: usize) -> Vec<Fix16> {
        self.slots[..len.min(self.slots.len())]
            .iter()
            .map(|s| Fix16::from_bits(s.load(Ordering::Acquire)))
            .collect()
    }
}

/// Exclusive writer for one slot of a [`ReportBuffer`].
#[derive(Debug)]
pub struct ReportSlot {
    buffer: Arc<ReportBuffer>,
    index: usize,
}

impl ReportSlot {
    /// Publish `value` into the slot.
    pub fn write(&self, value: Fix16) {
        self.buffer.slots[self.index].store(value.to_bits(), Ordering::Release);
    }

}

impl Drop for ReportSlot {
    fn drop(&mut self) {
        self.buffer.claimed[self.index].store(false, Ordering::Release);
    }
}

// ── Reporter ──────────────────────────────────────────────────────

/// Whether the reporter sends on a given tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportState {
    /// Not this chip's phase.
    Idle,
    /// This chip's phase: snapshot the buffer and send.
    Reporting,
}

/// Reporting duties of a node's elected agent.
#[derive(Debug)]
pub struct Reporter {
    buffer: Arc<ReportBuffer>,
    num_reported: usize,
    phase: u64,
    dest: ChipCoord,
}

impl Reporter {
    /// A reporter forwarding the first `num_reported` slots of `buffer`
    /// at `phase`, addressed through `dest`.
    pub fn new(buffer: Arc<ReportBuffer>, num_reported: usize, phase: u64, dest: ChipCoord) -> Self {
        Self {
            buffer,
            num_reported,
            phase: phase % REPORT_PERIOD,
            dest,
        }
    }

    /// Report phase in `[0, REPORT_PERIOD)`.
    pub fn phase(&self) -> u64 {
        self.phase
    }

    /// Slots forwarded per report.
    pub fn num_reported(&self) -> usize {
        self.num_reported
    }

    /// State of the reporting state machine at tick `t`.
    pub fn state_at(&self, t: TickId) -> ReportState {
        if t.0 % REPORT_PERIOD == self.phase {
            ReportState::Reporting
        } else {
            ReportState::Idle
        }
    }

    /// Build the report `source` sends for the current buffer contents.
    pub fn build(&self, source: AgentId) -> HostReport {
        HostReport::new(source, self.dest, self.buffer.snapshot(self.num_reported))
    }
}

impl Agent {
    /// Publish the current value into this agent's slot, then send the
    /// node's report if this agent reports and `t` is its phase.
    ///
    /// Returns `true` if a report was handed to the link successfully.
    pub fn report_step(&mut self, t: TickId, host: &dyn HostLink) -> bool {
        self.slot.write(self.value());

        let Some(reporter) = self.reporter.as_ref() else {
            return false;
        };
        if reporter.state_at(t) == ReportState::Idle {
            return false;
        }

        let report = reporter.build(self.id());
        match host.send_report(report, REPORT_TIMEOUT) {
            Ok(()) => {
                self.metrics.reports_sent += 1;
                true
            }
            Err(e) => {
                self.metrics.reports_dropped += 1;
                debug!(agent = %self.id(), tick = %t, error = %e, "host report dropped");
                false
            }
        }
    }
}
