//! Host command handling.
//!
//! The host can ask any agent to put an arbitrary `(key, payload)` packet on
//! the broadcast fabric, which is how boundary temperatures are driven.
//! Commands are handled synchronously on arrival and the message buffer is
//! released on every path, including unknown opcodes.

use std::borrow::Borrow;

use heatmesh_core::HostCommand;
use tracing::debug;

use crate::agent::Agent;
use crate::exchange::Broadcaster;

/// What an agent did with a host command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The requested packet was handed to the fabric.
    Injected,
    /// The opcode is not an injection; nothing was sent.
    Ignored,
    /// The fabric refused the injected packet.
    InjectFailed,
}

impl Agent {
    /// Handle one host command.
    ///
    /// `msg` is any owner of a [`HostCommand`], typically a pooled mailbox
    /// buffer; it is consumed and dropped before this returns.
    pub fn on_command<M: Borrow<HostCommand>>(
        &mut self,
        msg: M,
        bus: &dyn Broadcaster,
    ) -> CommandOutcome {
        let command = *msg.borrow();

        let outcome = match command.as_injection() {
            Some(packet) => match bus.broadcast(packet) {
                Ok(()) => {
                    debug!(
                        agent = %self.id(),
                        key = %packet.key,
                        payload = command.arg2,
                        "host injected broadcast"
                    );
                    self.metrics.commands_injected += 1;
                    CommandOutcome::Injected
                }
                Err(e) => {
                    debug!(agent = %self.id(), error = %e, "host injection refused");
                    self.metrics.commands_ignored += 1;
                    CommandOutcome::InjectFailed
                }
            },
            None => {
                debug!(agent = %self.id(), op = command.op, "ignoring host command");
                self.metrics.commands_ignored += 1;
                CommandOutcome::Ignored
            }
        };

        drop(msg);
        outcome
    }
}
