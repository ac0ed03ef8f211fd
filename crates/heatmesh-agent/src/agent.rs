//! The per-cell agent record.
//!
//! The temperature, the neighbour array, the keys, and the reporting state
//! of one cell all live in an [`Agent`], which is handed explicitly to each
//! handler. There is no process-wide state.

use std::sync::Arc;

use heatmesh_core::{AgentId, BroadcastKey, Fix16, TickId, NUM_NEIGHBOURS};
use tracing::debug;

use crate::config::{AgentConfig, ConfigError, ConfigSource, NodeConfig};
use crate::metrics::AgentMetrics;
use crate::report::{report_phase, ReportBuffer, ReportSlot, Reporter};

/// State of one diffusion cell.
///
/// Created once from validated configuration; `value` changes every tick,
/// `neighbour_values` on every matching broadcast.
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    value: Fix16,
    neighbour_values: [Fix16; NUM_NEIGHBOURS],
    diffusivity: Fix16,
    own_key: BroadcastKey,
    neighbour_keys: [BroadcastKey; NUM_NEIGHBOURS],
    sim_length: u64,
    pub(crate) tick: TickId,
    pub(crate) finished: bool,
    pub(crate) slot: ReportSlot,
    pub(crate) reporter: Option<Reporter>,
    pub(crate) metrics: AgentMetrics,
}

impl Agent {
    /// Build an agent from its configuration and its node's report buffer.
    ///
    /// The agent writes report slot `core - 1`. If `node.num_reported` is
    /// non-zero the agent is also its node's reporter, forwarding the first
    /// `num_reported` slots to the host at its chip's phase.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails validation, the
    /// core cannot host an agent, or the report slot / report length do
    /// not fit `buffer`.
    pub fn new(
        id: AgentId,
        config: &AgentConfig,
        node: &NodeConfig,
        buffer: Arc<ReportBuffer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if !id.core.is_application() {
            return Err(ConfigError::NotApplicationCore { core: id.core });
        }

        let slot_index = usize::from(id.core.0) - 1;
        if slot_index >= buffer.len() {
            return Err(ConfigError::ReportSlotOutOfRange {
                slot: slot_index,
                slots: buffer.len(),
            });
        }
        let slot = ReportBuffer::slot(&buffer, slot_index)
            .ok_or(ConfigError::ReportSlotTaken { slot: slot_index })?;

        let reporter = match node.num_reported {
            0 => None,
            n if n as usize > buffer.len() => {
                return Err(ConfigError::TooManyReported {
                    requested: n,
                    slots: buffer.len(),
                })
            }
            n => Some(Reporter::new(
                Arc::clone(&buffer),
                n as usize,
                report_phase(id.chip),
                node.eth_chip,
            )),
        };

        debug!(
            agent = %id,
            slot = slot_index,
            num_reported = node.num_reported,
            alpha = %config.diffusivity,
            own_key = %config.own_key,
            neighbour_keys = ?config.neighbour_keys,
            sim_length = config.sim_length,
            "agent configured"
        );

        Ok(Self {
            id,
            value: Fix16::ZERO,
            neighbour_values: [Fix16::ZERO; NUM_NEIGHBOURS],
            diffusivity: config.diffusivity,
            own_key: config.own_key,
            neighbour_keys: config.neighbour_keys,
            sim_length: u64::from(config.sim_length),
            tick: TickId(0),
            finished: false,
            slot,
            reporter,
            metrics: AgentMetrics::default(),
        })
    }

    /// Load configuration for `id` from `source` and build the agent.
    pub fn from_source(
        id: AgentId,
        source: &dyn ConfigSource,
        buffer: Arc<ReportBuffer>,
    ) -> Result<Self, ConfigError> {
        let config = source.agent_config(id)?;
        let node = source.node_config(id)?;
        Self::new(id, &config, &node, buffer)
    }

    /// This agent's identity.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Current cell value.
    pub fn value(&self) -> Fix16 {
        self.value
    }

    /// Overwrite the current cell value (initial conditions, tests).
    pub fn set_value(&mut self, value: Fix16) {
        self.value = value;
    }

    /// Last value received from each neighbour slot.
    pub fn neighbour_values(&self) -> &[Fix16; NUM_NEIGHBOURS] {
        &self.neighbour_values
    }

    pub(crate) fn neighbour_values_mut(&mut self) -> &mut [Fix16; NUM_NEIGHBOURS] {
        &mut self.neighbour_values
    }

    /// Diffusivity coefficient, fixed at construction.
    pub fn diffusivity(&self) -> Fix16 {
        self.diffusivity
    }

    /// Key tagging this agent's broadcasts.
    pub fn own_key(&self) -> BroadcastKey {
        self.own_key
    }

    /// Keys matched against inbound broadcasts, one per neighbour slot.
    pub fn neighbour_keys(&self) -> &[BroadcastKey; NUM_NEIGHBOURS] {
        &self.neighbour_keys
    }

    /// Configured run length in ticks.
    pub fn sim_length(&self) -> u64 {
        self.sim_length
    }

    /// Index of the next tick to run.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// `true` once the tick counter has reached `sim_length`.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reporting state, if this agent is its node's reporter.
    pub fn reporter(&self) -> Option<&Reporter> {
        self.reporter.as_ref()
    }

    /// Counters accumulated so far.
    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }
}
