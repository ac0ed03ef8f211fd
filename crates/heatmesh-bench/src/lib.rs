//! Benchmark profiles for the heatmesh diffusion solver.
//!
//! - [`reference_layout`]: 4x4 chips of 16 cells (256 agents)
//! - [`reference_source`]: startup blocks for the reference layout
//! - [`warm_agent`]: a single agent primed with neighbour values

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use heatmesh_agent::{Agent, AgentConfig, BlockConfigSource, NodeConfig, ReportBuffer};
use heatmesh_core::{AgentId, BroadcastKey, ChipCoord, CoreId, Fix16, McPacket};
use heatmesh_fabric::GridLayout;

/// Run length used by every profile. Long enough never to finish inside
/// a measurement.
pub const PROFILE_SIM_LENGTH: u32 = u32::MAX;

/// Diffusivity used by every profile.
pub const PROFILE_DIFFUSIVITY: f64 = 0.04;

/// Build the reference layout: 4x4 chips, 16 cells per chip.
pub fn reference_layout() -> GridLayout {
    GridLayout::new(4, 4, 16).expect("reference layout dimensions are valid")
}

/// Encode startup blocks for every agent of `layout`.
pub fn reference_source(layout: &GridLayout) -> BlockConfigSource {
    layout.config_source(PROFILE_SIM_LENGTH, Fix16::from_f64(PROFILE_DIFFUSIVITY))
}

/// A silent agent whose four neighbours have been heard at distinct
/// temperatures, ready to tick.
pub fn warm_agent() -> Agent {
    let config = AgentConfig {
        sim_length: PROFILE_SIM_LENGTH,
        diffusivity: Fix16::from_f64(PROFILE_DIFFUSIVITY),
        own_key: BroadcastKey(0),
        neighbour_keys: [
            BroadcastKey(1),
            BroadcastKey(2),
            BroadcastKey(3),
            BroadcastKey(4),
        ],
    };
    let id = AgentId::new(ChipCoord::ORIGIN, CoreId(1));
    let mut agent = Agent::new(id, &config, &NodeConfig::silent(), ReportBuffer::shared(1))
        .expect("profile config is valid");
    for (i, key) in config.neighbour_keys.iter().enumerate() {
        agent.on_receive(McPacket::with_value(*key, Fix16::from_int(10 * i as i32)));
    }
    agent
}
