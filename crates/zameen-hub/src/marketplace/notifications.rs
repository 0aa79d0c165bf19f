use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use super::approval::{ApprovalEvent, ApprovalPublisher, ApprovalSubject, NotificationError};

const DEFAULT_CAPACITY: usize = 64;

/// In-process fan-out of approval decisions.
///
/// Subscribers receive every event published after they subscribed. A
/// subscription is detached as soon as it is dropped, so tying it to the
/// lifetime of the consuming request or view is enough to unsubscribe.
#[derive(Debug, Clone)]
pub struct ApprovalNotifier {
    sender: broadcast::Sender<ApprovalEvent>,
}

impl ApprovalNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// `None` follows every decision; `Some(subject)` only that record's.
    pub fn subscribe(&self, subject: Option<ApprovalSubject>) -> ApprovalSubscription {
        ApprovalSubscription {
            receiver: self.sender.subscribe(),
            subject,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ApprovalNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ApprovalPublisher for ApprovalNotifier {
    fn publish(&self, event: ApprovalEvent) -> Result<(), NotificationError> {
        // Sending only fails when nobody is listening.
        if let Err(unheard) = self.sender.send(event) {
            debug!(subject = ?unheard.0.subject, "approval decided with no subscribers");
        }
        Ok(())
    }
}

/// Live feed of approval decisions; unsubscribes on drop.
#[derive(Debug)]
pub struct ApprovalSubscription {
    receiver: broadcast::Receiver<ApprovalEvent>,
    subject: Option<ApprovalSubject>,
}

impl ApprovalSubscription {
    /// Waits for the next matching event. `None` once the notifier is gone.
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<ApprovalEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "approval subscriber lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<ApprovalEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "approval subscriber lagged behind");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}

    fn wants(&self, event: &ApprovalEvent) -> bool {
        self.subject.map_or(true, |subject| subject == event.subject)
    }
}
