//! Strongly-typed identifiers derived from the hardware slot an agent
//! occupies, plus the broadcast key and tick counter.

use std::fmt;

/// Tag carried by every broadcast packet, identifying its logical sender.
///
/// Keys are opaque: agents only compare them for equality against their
/// configured neighbour keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BroadcastKey(pub u32);

impl fmt::Display for BroadcastKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for BroadcastKey {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Coordinate of a chip (node) in the machine.
///
/// Packed into a 16-bit chip id as `(x << 8) | y`, the form used for
/// source/destination addresses on the host channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChipCoord {
    /// Column of the chip.
    pub x: u8,
    /// Row of the chip.
    pub y: u8,
}

impl ChipCoord {
    /// The chip at `(0, 0)`.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a chip coordinate.
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Pack into the 16-bit chip id `(x << 8) | y`.
    pub const fn chip_id(self) -> u16 {
        ((self.x as u16) << 8) | self.y as u16
    }

    /// Unpack a 16-bit chip id.
    pub const fn from_chip_id(id: u16) -> Self {
        Self {
            x: (id >> 8) as u8,
            y: (id & 0xFF) as u8,
        }
    }
}

impl fmt::Display for ChipCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Index of a processing core on its chip.
///
/// Core 0 runs the chip's monitor; application agents occupy cores
/// `1..=MAX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreId(pub u8);

impl CoreId {
    /// The monitor core, never hosts an agent.
    pub const MONITOR: Self = Self(0);
    /// Highest application core index.
    pub const MAX: u8 = 17;

    /// `true` if this core may host an agent.
    pub const fn is_application(self) -> bool {
        self.0 >= 1 && self.0 <= Self::MAX
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an agent: the chip and core it runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId {
    /// Chip hosting the agent.
    pub chip: ChipCoord,
    /// Core on that chip.
    pub core: CoreId,
}

impl AgentId {
    /// Create an agent id.
    pub const fn new(chip: ChipCoord, core: CoreId) -> Self {
        Self { chip, core }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.chip.x, self.chip.y, self.core.0)
    }
}

/// Tick counter of a single agent's control loop, starting at 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_id_packs_x_high() {
        let c = ChipCoord::new(3, 5);
        assert_eq!(c.chip_id(), 0x0305);
        assert_eq!(ChipCoord::from_chip_id(0x0305), c);
    }

    #[test]
    fn monitor_core_is_not_application() {
        assert!(!CoreId::MONITOR.is_application());
        assert!(CoreId(1).is_application());
        assert!(CoreId(17).is_application());
        assert!(!CoreId(18).is_application());
    }

    #[test]
    fn display_formats() {
        let id = AgentId::new(ChipCoord::new(1, 2), CoreId(3));
        assert_eq!(id.to_string(), "(1, 2, 3)");
        assert_eq!(BroadcastKey(0x1234).to_string(), "0x00001234");
    }
}
