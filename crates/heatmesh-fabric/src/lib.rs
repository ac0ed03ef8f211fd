//! In-process machine for heatmesh agents.
//!
//! Provides the transports the agent crate abstracts over and a runtime
//! that drives one agent per thread:
//!
//! | Concern | Type | Module |
//! |---------|------|--------|
//! | broadcast medium | [`Fabric`], [`FabricPort`] | [`fabric`] |
//! | host report link | [`ChannelHostLink`] | [`host`] |
//! | host side | [`HostEndpoint`], [`Heatmap`] | [`host`], [`heatmap`] |
//! | command buffers | [`MailboxPool`], [`Mailbox`] | [`mailbox`] |
//! | placement and keys | [`GridLayout`] | [`layout`] |
//! | lifecycle | [`Machine`], [`MachineConfig`] | [`machine`] |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod fabric;
pub mod heatmap;
pub mod host;
pub mod layout;
pub mod machine;
pub mod mailbox;
pub mod runtime;

pub use fabric::{Fabric, FabricPort, FabricStats, RouteTargets, RoutingTable};
pub use heatmap::Heatmap;
pub use host::{ChannelHostLink, HostEndpoint, HostError, RouterStats};
pub use layout::{Cell, Direction, GridLayout, LayoutError};
pub use machine::{Machine, MachineConfig, MachineError, ShutdownReport};
pub use mailbox::{Mailbox, MailboxPool};
pub use runtime::AgentExit;
