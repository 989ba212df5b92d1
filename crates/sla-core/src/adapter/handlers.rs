//! Engine callback handlers and default policy
//!
//! | Event               | Handler set        | No handler                                   |
//! |---------------------|--------------------|----------------------------------------------|
//! | state changed       | forward            | nothing                                      |
//! | transaction state   | forward            | nothing                                      |
//! | incoming refresh    | forward, use reply | NOTIFY current state, or terminated/timeout  |
//! | incoming NOTIFY     | forward, use reply | engine default response                      |
//! | client refresh due  | forward            | re-SUBSCRIBE with the kind's expiration      |
//! | server timeout      | forward            | NOTIFY terminated/timeout                    |
//!
//! Entering Terminated always releases the body cache and the record, whether
//! or not a state handler is set. Failures of default actions are logged and
//! never retried here.

use tracing::{debug, info, warn};

use super::{NotifyParams, SlaAdapter};
use crate::errors::SlaResult;
use crate::message::{IncomingRequest, OutgoingRequest, ResponseOverride, TransactionInfo};
use crate::types::SubscriptionId;

impl SlaAdapter {
    /// The engine moved the subscription to a new state
    pub async fn on_state_changed(&self, subscription: SubscriptionId) -> SlaResult<()> {
        let _guard = self.lock_subscription(subscription).await.map_err(|e| {
            warn!("State change for unknown subscription {}: {}", subscription, e);
            e
        })?;
        let (callbacks, ctx) = self.snapshot(subscription)?;
        debug!(
            "{} subscription {} (index {}) is {}",
            ctx.kind, subscription, ctx.index, ctx.state_name
        );

        match &callbacks.state_changed {
            Some(handler) => handler(&ctx),
            None => {}
        }

        if ctx.state.is_terminated() {
            let released = self
                .records
                .get_mut(&subscription)
                .map_or(false, |mut record| record.release_on_terminal());
            if released {
                debug!("Released body cache of {}", subscription);
            }
            self.destroy_record(subscription);
            info!("{} subscription {} terminated", ctx.kind, subscription);
        }
        Ok(())
    }

    /// A transaction belonging to the subscription changed state
    pub async fn on_transaction_state(&self, subscription: SubscriptionId, transaction: &TransactionInfo) -> SlaResult<()> {
        let _guard = self.lock_subscription(subscription).await?;
        let (callbacks, ctx) = self.snapshot(subscription)?;
        if let Some(handler) = &callbacks.transaction_state {
            handler(&ctx, transaction);
        }
        Ok(())
    }

    /// The peer refreshed its subscription (server role)
    pub async fn on_incoming_refresh(
        &self,
        subscription: SubscriptionId,
        request: &IncomingRequest,
    ) -> SlaResult<ResponseOverride> {
        let _guard = self.lock_subscription(subscription).await?;
        let (callbacks, ctx) = self.snapshot(subscription)?;

        match &callbacks.incoming_refresh {
            Some(handler) => Ok(handler(&ctx, request)),
            None => {
                let built = if ctx.state.is_terminated() {
                    self.notify_locked(subscription, NotifyParams::terminated("timeout")).await
                } else {
                    self.current_notify_locked(subscription).await
                };
                self.send_default(subscription, "refresh NOTIFY", built).await;
                Ok(ResponseOverride::default())
            }
        }
    }

    /// The peer reported status (client role)
    ///
    /// Without a handler the content is discarded and the engine answers with
    /// its default response.
    pub async fn on_incoming_notify(
        &self,
        subscription: SubscriptionId,
        request: &IncomingRequest,
    ) -> SlaResult<ResponseOverride> {
        let _guard = self.lock_subscription(subscription).await?;
        let (callbacks, ctx) = self.snapshot(subscription)?;

        match &callbacks.incoming_notify {
            Some(handler) => Ok(handler(&ctx, request)),
            None => Ok(ResponseOverride::default()),
        }
    }

    /// Time to refresh a client subscription
    pub async fn on_client_refresh_due(&self, subscription: SubscriptionId) -> SlaResult<()> {
        let _guard = self.lock_subscription(subscription).await?;
        let (callbacks, ctx) = self.snapshot(subscription)?;

        match &callbacks.client_refresh_due {
            Some(handler) => handler(&ctx),
            None => {
                let expires = ctx.kind.refresh_expires();
                debug!("Refreshing {} subscription {} with expires {}", ctx.kind, subscription, expires.as_raw());
                let built = self.initiate_locked(subscription, expires).await;
                self.send_default(subscription, "refresh SUBSCRIBE", built).await;
            }
        }
        Ok(())
    }

    /// No refresh arrived in time (server role)
    pub async fn on_server_timeout(&self, subscription: SubscriptionId) -> SlaResult<()> {
        let _guard = self.lock_subscription(subscription).await?;
        let (callbacks, ctx) = self.snapshot(subscription)?;

        match &callbacks.server_timeout {
            Some(handler) => handler(&ctx),
            None => {
                let built = self.notify_locked(subscription, NotifyParams::terminated("timeout")).await;
                self.send_default(subscription, "timeout NOTIFY", built).await;
            }
        }
        Ok(())
    }

    /// Send a request produced by a default action; failures are only logged
    async fn send_default(&self, subscription: SubscriptionId, what: &str, built: SlaResult<OutgoingRequest>) {
        let request = match built {
            Ok(request) => request,
            Err(e) => {
                warn!("Unable to create {} for {}: {}", what, subscription, e);
                return;
            }
        };
        if let Err(e) = self.send_locked(subscription, request).await {
            warn!("Unable to send {} for {}: {}", what, subscription, e);
        }
    }
}
