//! Startup configuration, its fixed-layout block encoding, and validation.
//!
//! Each agent needs two blocks before its first tick:
//!
//! - a per-agent block of seven little-endian `u32` words:
//!   `sim_length, diffusivity, own_key, neighbour_keys[4]`;
//! - a per-node block of one word: `num_reported`, the number of report
//!   slots the node's elected reporter forwards to the host (0 on every
//!   other agent's view of the node).
//!
//! Blocks are handed over through the [`ConfigSource`] trait. A missing
//! or malformed block is fatal: [`Agent::new`](crate::Agent::new) refuses
//! to build an agent from it.

use std::collections::HashMap;

use heatmesh_core::{AgentId, BroadcastKey, ChipCoord, CoreId, Fix16, NUM_NEIGHBOURS};
use thiserror::Error;

/// Words in a per-agent block.
pub const AGENT_BLOCK_WORDS: usize = 3 + NUM_NEIGHBOURS;

/// Words in a per-node block.
pub const NODE_BLOCK_WORDS: usize = 1;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while loading or validating startup configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No per-agent block was supplied for this agent.
    #[error("no configuration block for agent {agent}")]
    MissingAgentBlock {
        /// The agent whose block is missing.
        agent: AgentId,
    },
    /// No per-node block was supplied for this chip.
    #[error("no node configuration block for chip {chip}")]
    MissingNodeBlock {
        /// The chip whose block is missing.
        chip: ChipCoord,
    },
    /// A block has the wrong length.
    #[error("configuration block is {got} bytes, expected {expected}")]
    BlockLength {
        /// Required length in bytes.
        expected: usize,
        /// Supplied length in bytes.
        got: usize,
    },
    /// Diffusivity outside `[0, 1]`.
    ///
    /// The update rule itself accepts any coefficient. This crate rejects
    /// values outside `[0, 1]` as a stability policy: larger steps
    /// overshoot the neighbour mean and oscillate.
    #[error("diffusivity {value} outside [0, 1]")]
    DiffusivityOutOfRange {
        /// The rejected coefficient.
        value: Fix16,
    },
    /// The agent's own key is also listed as a neighbour key.
    #[error("own key {key} is listed as a neighbour key")]
    SelfNeighbour {
        /// The duplicated key.
        key: BroadcastKey,
    },
    /// The agent is placed on a core that cannot host one.
    #[error("core {core} cannot host an agent")]
    NotApplicationCore {
        /// The rejected core.
        core: CoreId,
    },
    /// The agent's report slot does not exist in the node's report buffer.
    #[error("report slot {slot} out of range for a buffer of {slots} slots")]
    ReportSlotOutOfRange {
        /// The agent's slot index.
        slot: usize,
        /// Slots in the node's buffer.
        slots: usize,
    },
    /// Another live writer already holds the agent's report slot.
    #[error("report slot {slot} is already held by another agent")]
    ReportSlotTaken {
        /// The contended slot index.
        slot: usize,
    },
    /// The node block asks to report more slots than the buffer holds.
    #[error("asked to report {requested} slots from a buffer of {slots}")]
    TooManyReported {
        /// Requested report length.
        requested: u32,
        /// Slots in the node's buffer.
        slots: usize,
    },
}

// ── AgentConfig ────────────────────────────────────────────────────

/// Static per-agent parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// Number of ticks the agent runs before stopping itself.
    pub sim_length: u32,
    /// Thermal diffusivity coefficient α.
    pub diffusivity: Fix16,
    /// Key tagging this agent's broadcasts.
    pub own_key: BroadcastKey,
    /// Keys of the four neighbours, one per neighbour slot.
    pub neighbour_keys: [BroadcastKey; NUM_NEIGHBOURS],
}

impl AgentConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.diffusivity < Fix16::ZERO || self.diffusivity > Fix16::ONE {
            return Err(ConfigError::DiffusivityOutOfRange {
                value: self.diffusivity,
            });
        }
        if self.neighbour_keys.contains(&self.own_key) {
            return Err(ConfigError::SelfNeighbour { key: self.own_key });
        }
        Ok(())
    }

    /// Encode to the fixed per-agent block layout.
    pub fn encode_block(&self) -> Vec<u8> {
        let mut words = Vec::with_capacity(AGENT_BLOCK_WORDS);
        words.push(self.sim_length);
        words.push(self.diffusivity.to_payload());
        words.push(self.own_key.0);
        words.extend(self.neighbour_keys.iter().map(|k| k.0));
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Decode and validate a per-agent block.
    pub fn decode_block(bytes: &[u8]) -> Result<Self, ConfigError> {
        let words = decode_words::<AGENT_BLOCK_WORDS>(bytes)?;
        let config = Self {
            sim_length: words[0],
            diffusivity: Fix16::from_payload(words[1]),
            own_key: BroadcastKey(words[2]),
            neighbour_keys: [
                BroadcastKey(words[3]),
                BroadcastKey(words[4]),
                BroadcastKey(words[5]),
                BroadcastKey(words[6]),
            ],
        };
        config.validate()?;
        Ok(config)
    }
}

// ── NodeConfig ─────────────────────────────────────────────────────

/// The node block as seen by one agent.
///
/// Co-located agents each get their own view: only the elected reporter
/// sees a non-zero `num_reported`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// Report slots forwarded to the host; 0 if this agent does not report.
    pub num_reported: u32,
    /// Ethernet-attached chip reports are addressed through.
    pub eth_chip: ChipCoord,
}

impl NodeConfig {
    /// A node view for an agent that never reports.
    pub const fn silent() -> Self {
        Self {
            num_reported: 0,
            eth_chip: ChipCoord::ORIGIN,
        }
    }

    /// Encode to the fixed per-node block layout.
    pub fn encode_block(&self) -> Vec<u8> {
        self.num_reported.to_le_bytes().to_vec()
    }

    /// Decode a per-node block. The Ethernet chip is not part of the block.
    pub fn decode_block(bytes: &[u8], eth_chip: ChipCoord) -> Result<Self, ConfigError> {
        let [num_reported] = decode_words::<NODE_BLOCK_WORDS>(bytes)?;
        Ok(Self {
            num_reported,
            eth_chip,
        })
    }
}

fn decode_words<const N: usize>(bytes: &[u8]) -> Result<[u32; N], ConfigError> {
    if bytes.len() != N * 4 {
        return Err(ConfigError::BlockLength {
            expected: N * 4,
            got: bytes.len(),
        });
    }
    let mut words = [0u32; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}

// ── ConfigSource ───────────────────────────────────────────────────

/// Supplier of startup configuration.
///
/// Implementations decide where blocks come from (memory written by a
/// loader, a layout computed in-process, a file); agents only see the
/// typed result.
pub trait ConfigSource {
    /// Configuration for one agent.
    fn agent_config(&self, agent: AgentId) -> Result<AgentConfig, ConfigError>;

    /// The node block as seen by `agent`.
    fn node_config(&self, agent: AgentId) -> Result<NodeConfig, ConfigError>;
}

/// A [`ConfigSource`] backed by raw fixed-layout byte blocks.
///
/// Agent blocks are keyed by agent id. Node blocks are keyed by agent id
/// too, since only the elected reporter sees a non-zero `num_reported`.
#[derive(Clone, Debug, Default)]
pub struct BlockConfigSource {
    agent_blocks: HashMap<AgentId, Vec<u8>>,
    node_blocks: HashMap<AgentId, Vec<u8>>,
    eth_chip: ChipCoord,
}

impl BlockConfigSource {
    /// An empty source whose reports go through the chip at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Ethernet chip stamped on every node config.
    pub fn with_eth_chip(mut self, chip: ChipCoord) -> Self {
        self.eth_chip = chip;
        self
    }

    /// Store the per-agent block for `agent`.
    pub fn insert_agent_block(&mut self, agent: AgentId, block: Vec<u8>) {
        self.agent_blocks.insert(agent, block);
    }

    /// Store the node block as seen by `agent`.
    pub fn insert_node_block(&mut self, agent: AgentId, block: Vec<u8>) {
        self.node_blocks.insert(agent, block);
    }
}

impl ConfigSource for BlockConfigSource {
    fn agent_config(&self, agent: AgentId) -> Result<AgentConfig, ConfigError> {
        let block = self
            .agent_blocks
            .get(&agent)
            .ok_or(ConfigError::MissingAgentBlock { agent })?;
        AgentConfig::decode_block(block)
    }

    fn node_config(&self, agent: AgentId) -> Result<NodeConfig, ConfigError> {
        let block = self
            .node_blocks
            .get(&agent)
            .ok_or(ConfigError::MissingNodeBlock { chip: agent.chip })?;
        NodeConfig::decode_block(block, self.eth_chip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AgentConfig {
        AgentConfig {
            sim_length: 1000,
            diffusivity: Fix16::from_f64(0.04),
            own_key: BroadcastKey(7),
            neighbour_keys: [
                BroadcastKey(1),
                BroadcastKey(2),
                BroadcastKey(3),
                BroadcastKey(4),
            ],
        }
    }

    #[test]
    fn agent_block_is_seven_words() {
        assert_eq!(sample().encode_block().len(), 28);
    }

    #[test]
    fn agent_block_decodes_to_same_config() {
        let cfg = sample();
        assert_eq!(AgentConfig::decode_block(&cfg.encode_block()).unwrap(), cfg);
    }

    #[test]
    fn longest_run_survives_the_block() {
        let cfg = AgentConfig {
            sim_length: u32::MAX,
            ..sample()
        };
        let bytes = cfg.encode_block();
        assert_eq!(&bytes[..4], &[0xFF; 4]);
        assert_eq!(AgentConfig::decode_block(&bytes).unwrap().sim_length, u32::MAX);
    }

    #[test]
    fn diffusivity_bounds_are_inclusive() {
        let at_one = AgentConfig {
            diffusivity: Fix16::ONE,
            ..sample()
        };
        assert!(at_one.validate().is_ok());
        let above = AgentConfig {
            diffusivity: Fix16::from_bits(Fix16::ONE.to_bits() + 1),
            ..sample()
        };
        assert!(matches!(
            above.validate(),
            Err(ConfigError::DiffusivityOutOfRange { .. })
        ));
    }

    #[test]
    fn short_block_is_rejected() {
        let bytes = sample().encode_block();
        assert_eq!(
            AgentConfig::decode_block(&bytes[..20]).unwrap_err(),
            ConfigError::BlockLength {
                expected: 28,
                got: 20
            }
        );
    }

    #[test]
    fn negative_diffusivity_is_rejected() {
        let cfg = AgentConfig {
            diffusivity: Fix16::from_f64(-0.1),
            ..sample()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DiffusivityOutOfRange { .. })
        ));
    }

    #[test]
    fn diffusivity_above_one_is_rejected() {
        let cfg = AgentConfig {
            diffusivity: Fix16::from_f64(1.5),
            ..sample()
        };
        assert!(cfg.validate().is_err());
        let edge = AgentConfig {
            diffusivity: Fix16::ONE,
            ..sample()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn own_key_as_neighbour_is_rejected() {
        let mut cfg = sample();
        cfg.neighbour_keys[2] = cfg.own_key;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::SelfNeighbour {
                key: BroadcastKey(7)
            })
        );
    }

    #[test]
    fn node_block_carries_eth_chip_from_source() {
        let agent = AgentId::new(ChipCoord::new(1, 1), CoreId(1));
        let mut source = BlockConfigSource::new().with_eth_chip(ChipCoord::new(4, 8));
        let node = NodeConfig {
            num_reported: 16,
            eth_chip: ChipCoord::ORIGIN,
        };
        source.insert_node_block(agent, node.encode_block());
        let loaded = source.node_config(agent).unwrap();
        assert_eq!(loaded.num_reported, 16);
        assert_eq!(loaded.eth_chip, ChipCoord::new(4, 8));
    }

    #[test]
    fn missing_blocks_are_fatal() {
        let agent = AgentId::new(ChipCoord::ORIGIN, CoreId(1));
        let source = BlockConfigSource::new();
        assert_eq!(
            source.agent_config(agent),
            Err(ConfigError::MissingAgentBlock { agent })
        );
        assert_eq!(
            source.node_config(agent),
            Err(ConfigError::MissingNodeBlock {
                chip: ChipCoord::ORIGIN
            })
        );
    }
}
