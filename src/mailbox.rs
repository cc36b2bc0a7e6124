//! Per-session outbound queue
//!
//! Many producers enqueue encoded messages without blocking; exactly one
//! consumer (the session's writer pump) drains the receiving half. Any party
//! may close the mailbox. Messages already queued are still delivered, after
//! which the receiver yields `None`.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::SendError;

/// Default number of messages a mailbox can hold
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Bounded outbound queue of encoded messages
#[derive(Debug)]
pub struct Mailbox {
    sender: Mutex<Option<mpsc::Sender<String>>>,
}

impl Mailbox {
    /// Create a mailbox and the receiver drained by the writer pump
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Enqueue without waiting
    pub fn try_send(&self, msg: String) -> Result<(), SendError> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(SendError::Closed);
        };
        sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Close the mailbox. Returns true only for the call that closed it.
    pub fn close(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    /// Whether the mailbox was closed, or its receiver dropped
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map_or(true, |sender| sender.is_closed())
    }
}
