//! Per-subscription record
//!
//! One record is attached to every engine subscription created through the
//! adapter. It lives until the engine reports the terminal state.

use tracing::debug;

use super::body_cache::BodyCache;
use super::callbacks::{SubscriptionCallbacks, SubscriptionContext};
use crate::errors::{SlaError, SlaResult};
use crate::message::{MediaType, OutgoingRequest};
use crate::types::{AccountId, DialogId, SubscriptionId, SubscriptionKind, SubscriptionRole, SubscriptionState};

/// State the SLA layer keeps for one subscription
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    subscription: SubscriptionId,
    dialog: DialogId,
    kind: SubscriptionKind,
    index: usize,
    role: SubscriptionRole,
    callbacks: SubscriptionCallbacks,
    /// Allocated on the first notify that carries content
    body_cache: Option<BodyCache>,
    released: bool,
}

impl SubscriptionRecord {
    pub fn new(
        subscription: SubscriptionId,
        dialog: DialogId,
        kind: SubscriptionKind,
        index: usize,
        role: SubscriptionRole,
        callbacks: SubscriptionCallbacks,
    ) -> Self {
        Self {
            subscription,
            dialog,
            kind,
            index,
            role,
            callbacks,
            body_cache: None,
            released: false,
        }
    }

    pub fn dialog(&self) -> DialogId {
        self.dialog
    }

    pub fn callbacks(&self) -> &SubscriptionCallbacks {
        &self.callbacks
    }

    pub fn body_cache(&self) -> Option<&BodyCache> {
        self.body_cache.as_ref()
    }

    /// Whether the body cache has been released by a terminal transition
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Update the cached body; see [`BodyCache::set`]
    ///
    /// Both arguments `None` is a no-op and does not allocate the cache.
    pub fn set_cached_body(&mut self, content_type: Option<&MediaType>, payload: Option<&[u8]>) {
        if content_type.is_none() && payload.is_none() {
            return;
        }
        self.body_cache
            .get_or_insert_with(BodyCache::new)
            .set(content_type, payload);
    }

    /// Copy the cached body into `request`
    pub fn build_outgoing_body(&self, request: &mut OutgoingRequest) -> SlaResult<()> {
        match &self.body_cache {
            Some(cache) => cache.build_outgoing_body(request),
            None => Err(SlaError::invalid_operation(format!(
                "{} subscription {} has no cached body",
                self.kind, self.subscription
            ))),
        }
    }

    /// Free the body cache on entering Terminated
    ///
    /// Returns `true` only for the first call.
    pub fn release_on_terminal(&mut self) -> bool {
        if self.released {
            debug!("Body cache of {} already released", self.subscription);
            return false;
        }
        self.released = true;
        self.body_cache = None;
        true
    }

    /// Snapshot for callbacks
    pub fn context(&self, state: SubscriptionState, state_name: String, account: Option<AccountId>) -> SubscriptionContext {
        SubscriptionContext {
            subscription: self.subscription,
            dialog: self.dialog,
            kind: self.kind,
            index: self.index,
            role: self.role,
            state,
            state_name,
            account,
        }
    }
}
