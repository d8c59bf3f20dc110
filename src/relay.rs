use tokio::sync::mpsc;
use tracing::debug;

use crate::messages::{Command, QueueItem};
use crate::validate::validate_queue_item;

/// Result of a fire-and-forget send. Callers are allowed to ignore it; a
/// dropped batch is an accepted loss, not an error condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Dropped,
}

/// Forwards extracted items (and panel commands) from their producing
/// context to the dispatcher, tolerant of the receiving side being gone.
#[derive(Clone)]
pub struct Relay {
    tx: mpsc::Sender<Command>,
}

impl Relay {
    pub fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    /// Post a batch of extracted items. Items without an identity key are
    /// filtered out here, at the public seam; the extractor never produces
    /// them.
    pub fn send_batch(&self, items: Vec<QueueItem>) -> DeliveryOutcome {
        let items: Vec<QueueItem> = items
            .into_iter()
            .filter(|item| match validate_queue_item(item) {
                Ok(()) => true,
                Err(issue) => {
                    debug!(%issue, "dropping invalid queue item");
                    false
                }
            })
            .collect();
        if items.is_empty() {
            return DeliveryOutcome::Dropped;
        }
        self.send(Command::BatchAdd { items })
    }

    /// Send any command, best-effort.
    pub fn send(&self, command: Command) -> DeliveryOutcome {
        match self.tx.try_send(command) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(err) => {
                debug!(%err, "relay delivery failed; batch dropped");
                DeliveryOutcome::Dropped
            }
        }
    }
}
