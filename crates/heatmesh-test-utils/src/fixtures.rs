//! Reusable configuration fixtures.
//!
//! - [`agent_id`]: shorthand for an [`AgentId`] from raw coordinates.
//! - [`agent_config`]: a valid config with keys `own` and `neighbours`.
//! - [`keyed_config`]: a config whose neighbour keys are `own + 1 ..= own + 4`.
//! - [`build_agent`]: an agent with its own single-use report buffer.

use std::sync::Arc;

use heatmesh_agent::{Agent, AgentConfig, NodeConfig, ReportBuffer};
use heatmesh_core::{AgentId, BroadcastKey, ChipCoord, CoreId, Fix16};

/// Slots in the report buffer [`build_agent`] allocates.
pub const FIXTURE_SLOTS: usize = 16;

pub fn agent_id(x: u8, y: u8, core: u8) -> AgentId {
    AgentId::new(ChipCoord::new(x, y), CoreId(core))
}

pub fn agent_config(
    sim_length: u32,
    diffusivity: f64,
    own: u32,
    neighbours: [u32; 4],
) -> AgentConfig {
    AgentConfig {
        sim_length,
        diffusivity: Fix16::from_f64(diffusivity),
        own_key: BroadcastKey(own),
        neighbour_keys: neighbours.map(BroadcastKey),
    }
}

pub fn keyed_config(sim_length: u32, diffusivity: f64, own: u32) -> AgentConfig {
    agent_config(
        sim_length,
        diffusivity,
        own,
        [own + 1, own + 2, own + 3, own + 4],
    )
}

/// Build an agent on `id` with a fresh buffer of [`FIXTURE_SLOTS`] slots.
///
/// Returns the buffer too, so tests can inspect slot contents.
pub fn build_agent(
    id: AgentId,
    config: &AgentConfig,
    node: &NodeConfig,
) -> (Agent, Arc<ReportBuffer>) {
    let buffer = ReportBuffer::shared(FIXTURE_SLOTS);
    let agent = Agent::new(id, config, node, Arc::clone(&buffer))
        .expect("fixture config must be valid");
    (agent, buffer)
}

/// A node view that makes the agent its chip's reporter for `n` slots.
pub fn reporting_node(n: u32) -> NodeConfig {
    NodeConfig {
        num_reported: n,
        eth_chip: ChipCoord::ORIGIN,
    }
}
