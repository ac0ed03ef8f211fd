//! Placement of a rectangular heat map onto chips and cores.
//!
//! Each chip hosts up to a 4×4 block of cells, one per application core:
//! core `c` (from 1) on chip `(cx, cy)` simulates cell
//! `(cx * 4 + (c - 1) % 4, cy * 4 + (c - 1) / 4)`.
//!
//! Every cell broadcasts under its own key. For each direction a cell has
//! no neighbour in, it listens to that direction's *edge net* instead; the
//! host drives edge nets by asking the agent at cell `(0, 0)` to inject
//! packets on them. Keys are assigned sequentially: cells first, in
//! placement order, then the four edge nets in [`Direction::ALL`] order.

use std::fmt;

use heatmesh_agent::{AgentConfig, BlockConfigSource, NodeConfig};
use heatmesh_core::{AgentId, BroadcastKey, ChipCoord, CoreId, Fix16, NUM_NEIGHBOURS};
use indexmap::IndexMap;
use thiserror::Error;

use crate::fabric::RoutingTable;

/// Most cells a single chip can host.
pub const MAX_CELLS_PER_CHIP: u8 = 16;

/// Side length, in cells, of the block one chip covers.
pub const CHIP_SPAN: u16 = 4;

/// Errors building a [`GridLayout`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The machine has no chips.
    #[error("grid of {width}x{height} chips is empty")]
    EmptyGrid {
        /// Width in chips.
        width: u8,
        /// Height in chips.
        height: u8,
    },
    /// Cells per chip outside `1..=16`.
    #[error("{got} cells per chip is outside 1..=16")]
    CellsPerChip {
        /// The rejected count.
        got: u8,
    },
}

// ── Direction ─────────────────────────────────────────────────────

/// A neighbour direction. The discriminant is the neighbour slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// `+x`.
    East,
    /// `-x`.
    West,
    /// `+y`.
    North,
    /// `-y`.
    South,
}

impl Direction {
    /// All directions in neighbour-slot order.
    pub const ALL: [Direction; NUM_NEIGHBOURS] = [
        Direction::East,
        Direction::West,
        Direction::North,
        Direction::South,
    ];

    /// `(dx, dy)` to the neighbour in this direction.
    pub const fn offset(self) -> (i16, i16) {
        match self {
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::North => (0, 1),
            Direction::South => (0, -1),
        }
    }

    /// Neighbour slot this direction occupies.
    pub const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::East => "east",
            Direction::West => "west",
            Direction::North => "north",
            Direction::South => "south",
        };
        f.write_str(name)
    }
}

/// One cell of the heat map and the agent simulating it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Column in the heat map.
    pub x: u16,
    /// Row in the heat map.
    pub y: u16,
    /// Agent simulating this cell.
    pub agent: AgentId,
}

impl Cell {
    fn step(&self, direction: Direction) -> Option<(u16, u16)> {
        let (dx, dy) = direction.offset();
        Some((self.x.checked_add_signed(dx)?, self.y.checked_add_signed(dy)?))
    }
}

// ── GridLayout ────────────────────────────────────────────────────

/// Cells, keys, and routes for a `width × height` chip machine.
#[derive(Clone, Debug)]
pub struct GridLayout {
    width: u16,
    height: u16,
    cells: IndexMap<(u16, u16), Cell>,
    chips: IndexMap<ChipCoord, Vec<Cell>>,
    keys: IndexMap<AgentId, BroadcastKey>,
    neighbour_keys: IndexMap<AgentId, [BroadcastKey; NUM_NEIGHBOURS]>,
    edge_keys: [BroadcastKey; NUM_NEIGHBOURS],
    routes: RoutingTable,
}

impl GridLayout {
    /// Place `cells_per_chip` cells on each chip of a `width × height`
    /// chip machine.
    pub fn new(width: u8, height: u8, cells_per_chip: u8) -> Result<Self, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::EmptyGrid { width, height });
        }
        if cells_per_chip == 0 || cells_per_chip > MAX_CELLS_PER_CHIP {
            return Err(LayoutError::CellsPerChip {
                got: cells_per_chip,
            });
        }

        let mut cells = IndexMap::new();
        let mut chips = IndexMap::new();
        for cx in 0..width {
            for cy in 0..height {
                let chip = ChipCoord::new(cx, cy);
                let on_chip: Vec<Cell> = (0..cells_per_chip)
                    .map(|i| Cell {
                        x: u16::from(cx) * CHIP_SPAN + u16::from(i) % CHIP_SPAN,
                        y: u16::from(cy) * CHIP_SPAN + u16::from(i) / CHIP_SPAN,
                        agent: AgentId::new(chip, CoreId(i + 1)),
                    })
                    .collect();
                for cell in &on_chip {
                    cells.insert((cell.x, cell.y), *cell);
                }
                chips.insert(chip, on_chip);
            }
        }

        let mut next_key = 0u32;
        let mut fresh_key = || {
            let key = BroadcastKey(next_key);
            next_key += 1;
            key
        };
        let keys: IndexMap<AgentId, BroadcastKey> =
            cells.values().map(|c| (c.agent, fresh_key())).collect();
        let edge_keys = Direction::ALL.map(|_| fresh_key());

        let mut routes = RoutingTable::new();
        let mut neighbour_keys = IndexMap::with_capacity(cells.len());
        for cell in cells.values() {
            let listening = Direction::ALL.map(|direction| {
                let source = cell
                    .step(direction)
                    .and_then(|pos| cells.get(&pos))
                    .and_then(|n| keys.get(&n.agent).copied());
                let key = source.unwrap_or(edge_keys[direction.slot()]);
                routes.add_route(key, cell.agent);
                key
            });
            neighbour_keys.insert(cell.agent, listening);
        }

        Ok(Self {
            width: u16::from(width) * CHIP_SPAN,
            height: u16::from(height) * CHIP_SPAN,
            cells,
            chips,
            keys,
            neighbour_keys,
            edge_keys,
            routes,
        })
    }

    /// Heat map width in cells, including columns no core covers.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Heat map height in cells, including rows no core covers.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Number of simulated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` if no cell is simulated. Never the case for a built layout.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All cells in placement order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// The cell at `(x, y)`, if one is simulated.
    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.cells.get(&(x, y))
    }

    /// All chips in placement order.
    pub fn chips(&self) -> impl Iterator<Item = ChipCoord> + '_ {
        self.chips.keys().copied()
    }

    /// Cells on `chip`, indexed by report slot (core 1 first).
    pub fn cells_on(&self, chip: ChipCoord) -> &[Cell] {
        self.chips.get(&chip).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Report buffer slots needed on `chip`.
    pub fn report_slots(&self, chip: ChipCoord) -> usize {
        self.cells_on(chip).len()
    }

    /// Broadcast key of `agent`.
    pub fn key_of(&self, agent: AgentId) -> Option<BroadcastKey> {
        self.keys.get(&agent).copied()
    }

    /// Keys `agent` listens to, in neighbour-slot order.
    pub fn neighbour_keys(&self, agent: AgentId) -> Option<[BroadcastKey; NUM_NEIGHBOURS]> {
        self.neighbour_keys.get(&agent).copied()
    }

    /// Key of the edge net in `direction`.
    pub fn edge_key(&self, direction: Direction) -> BroadcastKey {
        self.edge_keys[direction.slot()]
    }

    /// The agent the host asks to drive edge nets: the one at cell `(0, 0)`.
    pub fn injector(&self) -> AgentId {
        AgentId::new(ChipCoord::ORIGIN, CoreId(1))
    }

    /// Multicast routes for every cell key and edge net.
    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Per-agent configuration for `agent`.
    pub fn agent_config(
        &self,
        agent: AgentId,
        sim_length: u32,
        diffusivity: Fix16,
    ) -> Option<AgentConfig> {
        Some(AgentConfig {
            sim_length,
            diffusivity,
            own_key: self.key_of(agent)?,
            neighbour_keys: self.neighbour_keys(agent)?,
        })
    }

    /// Node block as seen by `agent`: the chip's first cell reports every
    /// cell on the chip, the others report nothing.
    pub fn node_config(&self, agent: AgentId) -> Option<NodeConfig> {
        let on_chip = self.chips.get(&agent.chip)?;
        let first = on_chip.first()?;
        let num_reported = if first.agent == agent {
            on_chip.len() as u32
        } else {
            0
        };
        Some(NodeConfig {
            num_reported,
            eth_chip: ChipCoord::ORIGIN,
        })
    }

    /// Encode every agent's startup blocks.
    pub fn config_source(&self, sim_length: u32, diffusivity: Fix16) -> BlockConfigSource {
        let mut source = BlockConfigSource::new();
        for cell in self.cells() {
            if let Some(config) = self.agent_config(cell.agent, sim_length, diffusivity) {
                source.insert_agent_block(cell.agent, config.encode_block());
            }
            if let Some(node) = self.node_config(cell.agent) {
                source.insert_node_block(cell.agent, node.encode_block());
            }
        }
        source
    }
}
