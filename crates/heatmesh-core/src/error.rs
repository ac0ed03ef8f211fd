//! Error types shared across the heatmesh workspace.
//!
//! Transport errors are never fatal to the solver: callers count them and
//! move on. Wire errors surface only on the host side, where reports are
//! decoded.

use thiserror::Error;

/// Failure to hand a message to a point-to-point or broadcast transport.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport did not accept the message within the send timeout.
    #[error("send timed out after {timeout_ms} ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },
    /// The receiving end has gone away.
    #[error("transport disconnected")]
    Disconnected,
    /// The transport's queue was full and the message was dropped.
    #[error("transport queue full")]
    QueueFull,
}

/// Failure to decode a host-channel datagram.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WireError {
    /// The datagram is shorter than its fixed header.
    #[error("datagram truncated: need {needed} bytes, got {got}")]
    Truncated {
        /// Minimum number of bytes required.
        needed: usize,
        /// Number of bytes present.
        got: usize,
    },
    /// The payload length is not a multiple of the 4-byte value size.
    #[error("payload of {len} bytes is not a whole number of 32-bit values")]
    MisalignedPayload {
        /// Payload length in bytes.
        len: usize,
    },
}
