//! Bounded pool of host-command buffers.
//!
//! Every inbound command is carried to its agent inside a [`Mailbox`]
//! checked out of a [`MailboxPool`]. Dropping the mailbox returns its slot,
//! so a handler that consumes it releases the buffer on every path. When
//! the pool is exhausted new commands are refused until buffers come back.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use heatmesh_core::HostCommand;

/// Fixed-capacity source of [`Mailbox`]es.
#[derive(Clone, Debug)]
pub struct MailboxPool {
    outstanding: Arc<AtomicUsize>,
    capacity: usize,
}

impl MailboxPool {
    /// A pool allowing `capacity` mailboxes to be in flight at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            outstanding: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Wrap `command` in a mailbox, or `None` if every slot is in use.
    pub fn checkout(&self, command: HostCommand) -> Option<Mailbox> {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .ok()
            .map(|_| Mailbox {
                command,
                outstanding: Arc::clone(&self.outstanding),
            })
    }

    /// Mailboxes currently checked out.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Maximum mailboxes in flight.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A checked-out command buffer. Returns its pool slot on drop.
pub struct Mailbox {
    command: HostCommand,
    outstanding: Arc<AtomicUsize>,
}

impl Deref for Mailbox {
    type Target = HostCommand;

    fn deref(&self) -> &HostCommand {
        &self.command
    }
}

impl Borrow<HostCommand> for Mailbox {
    fn borrow(&self) -> &HostCommand {
        &self.command
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Mailbox").field(&self.command).finish()
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
