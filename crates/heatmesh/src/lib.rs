//! Heatmesh: explicit finite-difference heat diffusion computed by one
//! agent per grid cell over a lossy multicast fabric.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the heatmesh sub-crates.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use heatmesh::prelude::*;
//!
//! // One chip of 16 cells, 500 ticks at alpha = 0.1.
//! let layout = GridLayout::new(1, 1, 16).unwrap();
//! let source = layout.config_source(500, Fix16::from_f64(0.1));
//! let (machine, host) = Machine::start(&layout, &source, MachineConfig::default()).unwrap();
//!
//! // Hold the east edge at 100 degrees.
//! host.set_edge_temperature(Direction::East, Fix16::from_int(100)).unwrap();
//!
//! let report = machine.join();
//! assert_eq!(report.agents_finished, 16);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `heatmesh-core` | Q15.16 values, IDs, wire packets |
//! | [`agent`] | `heatmesh-agent` | Per-cell agent, configuration, reporting |
//! | [`fabric`] | `heatmesh-fabric` | In-process fabric, layout, machine lifecycle |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Fixed-point values, identifiers, and wire formats (`heatmesh-core`).
pub use heatmesh_core as types;

/// The per-cell agent and the traits it talks through (`heatmesh-agent`).
///
/// [`agent::Broadcaster`] and [`agent::HostLink`] are the seams a
/// transport implements.
pub use heatmesh_agent as agent;

/// In-process machine: fabric, layout, and lifecycle (`heatmesh-fabric`).
pub use heatmesh_fabric as fabric;

/// Common imports for typical heatmesh usage.
///
/// ```rust
/// use heatmesh::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use heatmesh_core::{
        AgentId, BroadcastKey, ChipCoord, CoreId, Fix16, HostCommand, HostReport, McPacket,
        TickId, REPORT_PERIOD,
    };

    // Errors
    pub use heatmesh_core::{TransportError, WireError};
    pub use heatmesh_agent::ConfigError;
    pub use heatmesh_fabric::{HostError, LayoutError, MachineError};

    // Agent
    pub use heatmesh_agent::{
        Agent, AgentConfig, BlockConfigSource, Broadcaster, ConfigSource, HostLink, NodeConfig,
        TickContext, TickOutcome,
    };

    // Machine
    pub use heatmesh_fabric::{
        Direction, GridLayout, Heatmap, HostEndpoint, Machine, MachineConfig, ShutdownReport,
    };
}
