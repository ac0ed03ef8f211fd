//! Per-cell diffusion agent.
//!
//! An [`Agent`] owns one cell's temperature and the last values heard from
//! its four neighbours. It is driven by three event sources, each mapped to
//! one `&mut self` handler so the borrow checker enforces the
//! non-reentrant execution contract:
//!
//! | Event | Handler | Module |
//! |-------|---------|--------|
//! | timer tick | [`Agent::on_tick`] | [`scheduler`] |
//! | broadcast packet | [`Agent::on_receive`] | [`exchange`] |
//! | host command | [`Agent::on_command`] | [`command`] |
//!
//! The agent never touches a transport directly: outbound traffic goes
//! through the [`Broadcaster`] and [`HostLink`] traits supplied by the
//! caller, so the same state machine runs under the threaded runtime in
//! `heatmesh-fabric` and under recording mocks in tests.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod command;
pub mod config;
pub mod exchange;
pub mod metrics;
pub mod report;
pub mod scheduler;
pub mod update;

pub use agent::Agent;
pub use command::CommandOutcome;
pub use config::{AgentConfig, BlockConfigSource, ConfigError, ConfigSource, NodeConfig};
pub use exchange::{BroadcastJitter, Broadcaster, DEFAULT_JITTER_US};
pub use metrics::AgentMetrics;
pub use report::{
    report_phase, HostLink, ReportBuffer, ReportSlot, ReportState, Reporter, REPORT_TIMEOUT,
};
pub use scheduler::{TickContext, TickOutcome};
pub use update::diffuse;
