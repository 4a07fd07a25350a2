//! Cancellable delayed delivery of messages to an actor mailbox.

use std::time::Duration;

use tokio::sync::mpsc::{Sender, WeakSender};
use tokio::task::JoinHandle;

/// Delivers a message to a mailbox after a delay.
///
/// Holds only a weak sender, so pending tasks never keep the mailbox open
/// after every real handle is gone.
pub struct Scheduler<M> {
    mailbox: WeakSender<M>,
}

impl<M> Clone for Scheduler<M> {
    fn clone(&self) -> Self {
        Self {
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<M: Send + 'static> Scheduler<M> {
    /// Create a scheduler that posts into `mailbox`.
    pub fn new(mailbox: &Sender<M>) -> Self {
        Self {
            mailbox: mailbox.downgrade(),
        }
    }

    /// Post `message` after `delay`. Dropping or cancelling the returned
    /// handle before then means the message is never sent.
    pub fn schedule(&self, delay: Duration, message: M) -> ScheduledTask {
        let mailbox = self.mailbox.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(mailbox) = mailbox.upgrade() {
                let _ = mailbox.send(message).await;
            }
        });
        ScheduledTask { handle }
    }
}

/// Handle to a pending scheduled message. Cancels on drop.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Cancel delivery. No effect if the message was already posted.
    pub fn cancel(self) {
        // Drop does the work.
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A single slot for the latest scheduled task.
///
/// Scheduling again cancels whatever was pending, which is what makes the
/// debounce trailing-edge: only the last change within the window survives.
#[derive(Debug, Default)]
pub struct Debounce {
    pending: Option<ScheduledTask>,
    ticket: u64,
}

impl Debounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending task with a new one built from a fresh ticket.
    pub fn reschedule<M: Send + 'static>(
        &mut self,
        scheduler: &Scheduler<M>,
        delay: Duration,
        message: impl FnOnce(u64) -> M,
    ) -> u64 {
        self.ticket += 1;
        let ticket = self.ticket;
        self.pending = Some(scheduler.schedule(delay, message(ticket)));
        ticket
    }

    /// Cancel any pending task. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.ticket += 1;
        self.pending.take().is_some()
    }

    /// Claim `ticket` if it is the latest one.
    ///
    /// A message can already be sitting in the mailbox when a newer task
    /// replaces it; its stale ticket is refused here.
    pub fn take(&mut self, ticket: u64) -> bool {
        if self.pending.is_some() && ticket == self.ticket {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Whether a task is pending.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
