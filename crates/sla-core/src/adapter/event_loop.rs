//! Channel-driven delivery of engine callbacks
//!
//! Engines that raise subscription events from inside their own request
//! handling can queue them as [`EngineEvent`]s instead of calling the adapter
//! directly. The loop handles events one at a time, in arrival order, so the
//! per-subscription ordering the engine produced is preserved.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SlaAdapter;
use crate::message::{IncomingRequest, ResponseOverride, TransactionInfo};
use crate::types::SubscriptionId;

/// A subscription event raised by the engine
#[derive(Debug)]
pub enum EngineEvent {
    StateChanged {
        subscription: SubscriptionId,
    },
    TransactionState {
        subscription: SubscriptionId,
        transaction: TransactionInfo,
    },
    IncomingRefresh {
        subscription: SubscriptionId,
        request: IncomingRequest,
        /// Receives the response override, if the engine wants it
        reply: Option<oneshot::Sender<ResponseOverride>>,
    },
    IncomingNotify {
        subscription: SubscriptionId,
        request: IncomingRequest,
        reply: Option<oneshot::Sender<ResponseOverride>>,
    },
    ClientRefreshDue {
        subscription: SubscriptionId,
    },
    ServerTimeout {
        subscription: SubscriptionId,
    },
}

impl EngineEvent {
    pub fn subscription(&self) -> SubscriptionId {
        match self {
            EngineEvent::StateChanged { subscription }
            | EngineEvent::TransactionState { subscription, .. }
            | EngineEvent::IncomingRefresh { subscription, .. }
            | EngineEvent::IncomingNotify { subscription, .. }
            | EngineEvent::ClientRefreshDue { subscription }
            | EngineEvent::ServerTimeout { subscription } => *subscription,
        }
    }
}

impl SlaAdapter {
    /// Dispatch one engine event to its handler
    pub async fn handle_event(&self, event: EngineEvent) {
        let subscription = event.subscription();
        let result = match event {
            EngineEvent::StateChanged { subscription } => self.on_state_changed(subscription).await,
            EngineEvent::TransactionState { subscription, transaction } => {
                self.on_transaction_state(subscription, &transaction).await
            }
            EngineEvent::IncomingRefresh { subscription, request, reply } => self
                .on_incoming_refresh(subscription, &request)
                .await
                .map(|response| answer(reply, response)),
            EngineEvent::IncomingNotify { subscription, request, reply } => self
                .on_incoming_notify(subscription, &request)
                .await
                .map(|response| answer(reply, response)),
            EngineEvent::ClientRefreshDue { subscription } => self.on_client_refresh_due(subscription).await,
            EngineEvent::ServerTimeout { subscription } => self.on_server_timeout(subscription).await,
        };

        if let Err(e) = result {
            warn!("Engine event for {} not handled: {}", subscription, e);
        }
    }

    /// Consume engine events until the channel closes
    pub fn spawn_event_loop(self: Arc<Self>, mut events: mpsc::Receiver<EngineEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Starting SLA engine event loop");
            while let Some(event) = events.recv().await {
                self.handle_event(event).await;
            }
            info!("SLA engine event loop ended");
        })
    }
}

fn answer(reply: Option<oneshot::Sender<ResponseOverride>>, response: ResponseOverride) {
    if let Some(reply) = reply {
        if reply.send(response).is_err() {
            debug!("Engine dropped the response channel");
        }
    }
}
