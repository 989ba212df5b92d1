//! Broadcast fan-out of informational events

use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::SlaInfo;

/// Publishes [`SlaInfo`] to every subscribed receiver
///
/// Publishing never blocks, which lets it run from callbacks that hold a
/// dialog lock. Slow receivers lag instead of stalling the publisher.
#[derive(Debug, Clone)]
pub struct SlaInfoHub {
    sender: broadcast::Sender<SlaInfo>,
}

impl SlaInfoHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a new receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SlaInfo> {
        self.sender.subscribe()
    }

    /// Publish an event; returns how many receivers got it
    pub fn publish(&self, info: SlaInfo) -> usize {
        trace!("Publishing SLA info: {:?}", info);
        match self.sender.send(info) {
            Ok(n) => n,
            Err(_) => {
                debug!("No SLA info receivers registered, event dropped");
                0
            }
        }
    }
}
