//! Broadcast packets and host-channel envelopes.
//!
//! Two channels connect an agent to the outside world:
//!
//! - the **broadcast** fabric, carrying fixed-size [`McPacket`]s tagged by a
//!   [`BroadcastKey`];
//! - the **host** point-to-point channel, carrying [`HostReport`]s out and
//!   [`HostCommand`]s in.
//!
//! Host envelopes share one little-endian wire layout: a 10-byte datagram
//! header followed by a 16-byte command header and an optional payload.
//!
//! ```text
//! 0      2      3     4          5          6          8          10
//! [pad:2][flags][tag][dest_port][srce_port][dest_addr][srce_addr]
//! 10       12    14     18     22     26
//! [cmd_rc:2][seq:2][arg1:4][arg2:4][arg3:4][payload ...]
//! ```

use crate::error::WireError;
use crate::fixed::Fix16;
use crate::id::{AgentId, BroadcastKey, ChipCoord, CoreId};

/// Length of the datagram header plus the command header.
pub const HEADER_LEN: usize = 26;

/// Host command opcode: transmit `(arg1, arg2)` as a broadcast `(key, payload)`.
pub const OP_INJECT_BROADCAST: u16 = 0;

/// Result code stamped on outbound reports.
pub const RC_OK: u16 = 0x80;

/// Tag selecting the host route a report leaves through.
pub const REPORT_TAG: u8 = 1;

/// Destination port byte addressing the host through an Ethernet chip.
pub const PORT_ETH: u8 = 0xFF;

/// Header flags for messages that expect no reply.
pub const FLAGS_NO_REPLY: u8 = 0x07;

/// Port number on which agents listen for host commands.
pub const COMMAND_PORT: u8 = 1;

/// A fixed-size broadcast packet: a 32-bit key and an optional 32-bit payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct McPacket {
    /// Sender identity.
    pub key: BroadcastKey,
    /// Payload word, if the packet carries one.
    pub payload: Option<u32>,
}

impl McPacket {
    /// A packet carrying a payload.
    pub const fn with_payload(key: BroadcastKey, payload: u32) -> Self {
        Self {
            key,
            payload: Some(payload),
        }
    }

    /// A packet carrying a Q15.16 value as its payload.
    pub const fn with_value(key: BroadcastKey, value: Fix16) -> Self {
        Self::with_payload(key, value.to_payload())
    }
}

/// Raw header fields shared by reports and commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Header {
    flags: u8,
    tag: u8,
    dest_port: u8,
    srce_port: u8,
    dest_addr: u16,
    srce_addr: u16,
    cmd_rc: u16,
    seq: u16,
    args: [u32; 3],
}

impl Header {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[0, 0]);
        out.push(self.flags);
        out.push(self.tag);
        out.push(self.dest_port);
        out.push(self.srce_port);
        out.extend_from_slice(&self.dest_addr.to_le_bytes());
        out.extend_from_slice(&self.srce_addr.to_le_bytes());
        out.extend_from_slice(&self.cmd_rc.to_le_bytes());
        out.extend_from_slice(&self.seq.to_le_bytes());
        for arg in self.args {
            out.extend_from_slice(&arg.to_le_bytes());
        }
    }

    fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), WireError> {
        if bytes.len() < HEADER_LEN {
            return Err(WireError::Truncated {
                needed: HEADER_LEN,
                got: bytes.len(),
            });
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let header = Self {
            flags: bytes[2],
            tag: bytes[3],
            dest_port: bytes[4],
            srce_port: bytes[5],
            dest_addr: u16_at(6),
            srce_addr: u16_at(8),
            cmd_rc: u16_at(10),
            seq: u16_at(12),
            args: [u32_at(14), u32_at(18), u32_at(22)],
        };
        Ok((header, &bytes[HEADER_LEN..]))
    }
}

/// Pack a port number and core into a header port byte.
const fn port_byte(port: u8, core: CoreId) -> u8 {
    (port << 5) | (core.0 & 0x1F)
}

// ── HostReport ──────────────────────────────────────────────────

/// A batch of co-located agents' values, sent from the reporting agent to
/// the host.
///
/// `values[i]` is the most recent value written to report slot `i` on the
/// source chip, i.e. the agent on core `i + 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostReport {
    /// The reporting agent.
    pub source: AgentId,
    /// Ethernet-attached chip the report leaves the machine through.
    pub dest: ChipCoord,
    /// Host route tag.
    pub tag: u8,
    /// Header flags.
    pub flags: u8,
    /// Snapshot of the chip's shared report buffer.
    pub values: Vec<Fix16>,
}

impl HostReport {
    /// A report with the standard tag and flags.
    pub fn new(source: AgentId, dest: ChipCoord, values: Vec<Fix16>) -> Self {
        Self {
            source,
            dest,
            tag: REPORT_TAG,
            flags: FLAGS_NO_REPLY,
            values,
        }
    }

    /// Length of the encoded datagram in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.values.len() * 4
    }

    /// Encode to the host wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        Header {
            flags: self.flags,
            tag: self.tag,
            dest_port: PORT_ETH,
            // Reports identify their origin with the bare core number.
            srce_port: self.source.core.0,
            dest_addr: self.dest.chip_id(),
            srce_addr: self.source.chip.chip_id(),
            cmd_rc: RC_OK,
            seq: 0,
            args: [0; 3],
        }
        .encode(&mut out);
        for v in &self.values {
            out.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        out
    }

    /// Decode a datagram produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let (header, payload) = Header::decode(bytes)?;
        if payload.len() % 4 != 0 {
            return Err(WireError::MisalignedPayload { len: payload.len() });
        }
        let values = payload
            .chunks_exact(4)
            .map(|c| Fix16::from_bits(i32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect();
        Ok(Self {
            source: AgentId::new(
                ChipCoord::from_chip_id(header.srce_addr),
                CoreId(header.srce_port & 0x1F),
            ),
            dest: ChipCoord::from_chip_id(header.dest_addr),
            tag: header.tag,
            flags: header.flags,
            values,
        })
    }
}

// ── HostCommand ─────────────────────────────────────────────────

/// A command pushed from the host to one agent.
///
/// Only [`OP_INJECT_BROADCAST`] has a meaning; every other opcode is
/// ignored by the receiving agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostCommand {
    /// Operation code.
    pub op: u16,
    /// First argument (broadcast key for injections).
    pub arg1: u32,
    /// Second argument (broadcast payload for injections).
    pub arg2: u32,
    /// Third argument, unused by the solver.
    pub arg3: u32,
}

impl HostCommand {
    /// A command asking the agent to broadcast `payload` under `key`.
    pub const fn inject_broadcast(key: BroadcastKey, payload: u32) -> Self {
        Self {
            op: OP_INJECT_BROADCAST,
            arg1: key.0,
            arg2: payload,
            arg3: 0,
        }
    }

    /// The packet this command asks to inject, if it is an injection.
    pub fn as_injection(&self) -> Option<McPacket> {
        (self.op == OP_INJECT_BROADCAST)
            .then(|| McPacket::with_payload(BroadcastKey(self.arg1), self.arg2))
    }

    /// Encode as a datagram addressed to `dest`.
    pub fn encode(&self, dest: AgentId) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        Header {
            flags: FLAGS_NO_REPLY,
            tag: 0xFF,
            dest_port: port_byte(COMMAND_PORT, dest.core),
            srce_port: PORT_ETH,
            dest_addr: dest.chip.chip_id(),
            srce_addr: 0,
            cmd_rc: self.op,
            seq: 0,
            args: [self.arg1, self.arg2, self.arg3],
        }
        .encode(&mut out);
        out
    }

    /// Decode a command datagram, returning its destination and contents.
    ///
    /// Any trailing payload is ignored.
    pub fn decode(bytes: &[u8]) -> Result<(AgentId, Self), WireError> {
        let (header, _) = Header::decode(bytes)?;
        let dest = AgentId::new(
            ChipCoord::from_chip_id(header.dest_addr),
            CoreId(header.dest_port & 0x1F),
        );
        let [arg1, arg2, arg3] = header.args;
        Ok((
            dest,
            Self {
                op: header.cmd_rc,
                arg1,
                arg2,
                arg3,
            },
        ))
    }
}
