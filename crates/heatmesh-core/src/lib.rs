//! Core types for the heatmesh diffusion solver.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental vocabulary shared by agents, the fabric, and the host:
//! the Q15.16 [`Fix16`] scalar, hardware-derived identities, broadcast
//! packets, host report/command envelopes with their wire codec, and the
//! transport error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod fixed;
pub mod id;
pub mod packet;

pub use error::{TransportError, WireError};
pub use fixed::Fix16;
pub use id::{AgentId, BroadcastKey, ChipCoord, CoreId, TickId};
pub use packet::{HostCommand, HostReport, McPacket};

/// Number of neighbours each cell exchanges values with (2D grid, N/S/E/W).
pub const NUM_NEIGHBOURS: usize = 4;

/// Number of ticks over which every chip in an 8×8 group reports once.
pub const REPORT_PERIOD: u64 = 64;
