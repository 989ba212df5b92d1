//! Package callback adapter
//!
//! The adapter owns every [`SubscriptionRecord`] and is the event sink the
//! engine reports to. It exposes two groups of operations:
//!
//! - **Package API**: [`create`](SlaAdapter::create),
//!   [`attach_from_incoming`](SlaAdapter::attach_from_incoming),
//!   [`initiate`](SlaAdapter::initiate), [`accept`](SlaAdapter::accept),
//!   [`notify`](SlaAdapter::notify), [`current_notify`](SlaAdapter::current_notify),
//!   [`send_request`](SlaAdapter::send_request), [`terminate`](SlaAdapter::terminate)
//! - **Engine callbacks** (see [`handlers`]): state change, transaction state,
//!   incoming refresh, incoming NOTIFY, client refresh due, server timeout.
//!   Each forwards to the application handler when one is set and otherwise
//!   applies the package default.
//!
//! Every public operation takes the owning dialog's lock for its whole
//! duration. The `*_locked` variants used by the registry assume the caller
//! already holds it.

pub mod bindings;
#[cfg(feature = "events")]
pub mod event_loop;
pub mod handlers;
pub mod locks;

pub use bindings::AccountBindings;
#[cfg(feature = "events")]
pub use event_loop::EngineEvent;
pub use locks::{DialogGuard, DialogLocks};

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::engine::SubscriptionEngine;
use crate::errors::{SlaError, SlaResult};
use crate::message::{IncomingRequest, MediaType, MessageBody, OutgoingRequest};
use crate::subscription::{EventPackage, SubscriptionCallbacks, SubscriptionContext, SubscriptionRecord};
use crate::types::{DialogId, Expires, SubscriptionId, SubscriptionKind, SubscriptionRole, SubscriptionState};

/// Parameters of an outgoing NOTIFY
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyParams {
    pub state: SubscriptionState,
    /// Custom Subscription-State token, for states the engine cannot name
    pub state_text: Option<String>,
    /// Reason parameter, e.g. `timeout`
    pub reason: Option<String>,
    /// New content type for the body cache
    pub content_type: Option<MediaType>,
    /// New payload for the body cache
    pub body: Option<Vec<u8>>,
}

impl NotifyParams {
    /// NOTIFY in `state` carrying a new body
    pub fn with_body(state: SubscriptionState, content_type: MediaType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            state,
            state_text: None,
            reason: None,
            content_type: Some(content_type),
            body: Some(body.into()),
        }
    }

    /// Terminating NOTIFY with a reason and no new body
    pub fn terminated(reason: impl Into<String>) -> Self {
        Self {
            state: SubscriptionState::Terminated,
            state_text: None,
            reason: Some(reason.into()),
            content_type: None,
            body: None,
        }
    }
}

/// Translates engine callbacks into SLA/BLF semantics
pub struct SlaAdapter {
    engine: Arc<dyn SubscriptionEngine>,
    package: Arc<dyn EventPackage>,
    records: DashMap<SubscriptionId, SubscriptionRecord>,
    locks: DialogLocks,
    bindings: AccountBindings,
}

impl std::fmt::Debug for SlaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlaAdapter")
            .field("engine", &"Arc<dyn SubscriptionEngine>")
            .field("package", &self.package.name())
            .field("records", &self.records.len())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl SlaAdapter {
    pub fn new(engine: Arc<dyn SubscriptionEngine>, package: Arc<dyn EventPackage>) -> Self {
        Self {
            engine,
            package,
            records: DashMap::new(),
            locks: DialogLocks::new(),
            bindings: AccountBindings::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn SubscriptionEngine> {
        &self.engine
    }

    pub fn package(&self) -> &Arc<dyn EventPackage> {
        &self.package
    }

    pub fn locks(&self) -> &DialogLocks {
        &self.locks
    }

    pub fn bindings(&self) -> &AccountBindings {
        &self.bindings
    }

    /// Whether a record is attached to `subscription`
    pub fn has_record(&self, subscription: SubscriptionId) -> bool {
        self.records.contains_key(&subscription)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Copy of the cached body, if both halves are cached
    pub fn cached_body(&self, subscription: SubscriptionId) -> Option<MessageBody> {
        let record = self.records.get(&subscription)?;
        let cache = record.body_cache()?;
        Some(MessageBody::new(cache.content_type()?.clone(), cache.payload()?.to_vec()))
    }

    /// Current engine state of a subscription
    pub fn state(&self, subscription: SubscriptionId) -> SubscriptionState {
        self.engine.state(subscription)
    }

    fn dialog_of(&self, subscription: SubscriptionId) -> SlaResult<DialogId> {
        self.records
            .get(&subscription)
            .map(|r| r.dialog())
            .ok_or_else(|| no_record(subscription))
    }

    fn ensure_record(&self, subscription: SubscriptionId) -> SlaResult<()> {
        if self.records.contains_key(&subscription) {
            Ok(())
        } else {
            Err(no_record(subscription))
        }
    }

    /// Lock the dialog owning `subscription`
    pub async fn lock_subscription(&self, subscription: SubscriptionId) -> SlaResult<DialogGuard> {
        let dialog = self.dialog_of(subscription)?;
        let guard = self.locks.lock(dialog).await;
        // The record may have gone while we waited
        self.ensure_record(subscription)?;
        Ok(guard)
    }

    /// Callbacks and context of a subscription, cloned out of the table so no
    /// map guard is held while application code runs
    fn snapshot(&self, subscription: SubscriptionId) -> SlaResult<(SubscriptionCallbacks, SubscriptionContext)> {
        let record = self
            .records
            .get(&subscription)
            .ok_or_else(|| no_record(subscription))?;
        let state = self.engine.state(subscription);
        let state_name = self.engine.state_name(subscription);
        let context = record.context(state, state_name, self.bindings.get(subscription));
        Ok((record.callbacks().clone(), context))
    }

    // ===== Record creation =====

    /// Create a client subscription in `dialog` and attach a record to it
    pub async fn create(
        &self,
        dialog: Option<DialogId>,
        callbacks: SubscriptionCallbacks,
        kind: SubscriptionKind,
        index: usize,
    ) -> SlaResult<SubscriptionId> {
        let dialog = require_dialog(dialog)?;
        let guard = self.locks.lock(dialog).await;
        let result = self.create_locked(dialog, callbacks, kind, index).await;
        if result.is_err() {
            drop(guard);
            self.locks.remove(dialog);
        }
        result
    }

    /// [`create`](Self::create) for callers already holding the dialog lock
    pub async fn create_locked(
        &self,
        dialog: DialogId,
        callbacks: SubscriptionCallbacks,
        kind: SubscriptionKind,
        index: usize,
    ) -> SlaResult<SubscriptionId> {
        let subscription = self
            .engine
            .create_uac(dialog, self.package.name())
            .await
            .map_err(|e| SlaError::resource_creation(format!("create {} subscription", kind), e))?;

        self.records.insert(
            subscription,
            SubscriptionRecord::new(subscription, dialog, kind, index, SubscriptionRole::Client, callbacks),
        );
        debug!("Created {} subscription {} for index {} in dialog {}", kind, subscription, index, dialog);
        Ok(subscription)
    }

    /// Create a server subscription from an incoming SUBSCRIBE
    pub async fn attach_from_incoming(
        &self,
        dialog: Option<DialogId>,
        callbacks: SubscriptionCallbacks,
        request: &IncomingRequest,
    ) -> SlaResult<SubscriptionId> {
        let dialog = require_dialog(dialog)?;
        let guard = self.locks.lock(dialog).await;

        let subscription = match self.engine.create_uas(dialog, request).await {
            Ok(subscription) => subscription,
            Err(e) => {
                drop(guard);
                self.locks.remove(dialog);
                return Err(SlaError::resource_creation("create server subscription", e));
            }
        };

        self.records.insert(
            subscription,
            SubscriptionRecord::new(
                subscription,
                dialog,
                SubscriptionKind::LineAppearance,
                0,
                SubscriptionRole::Server,
                callbacks,
            ),
        );
        debug!("Attached server subscription {} in dialog {}", subscription, dialog);
        Ok(subscription)
    }

    // ===== Package API =====

    /// Build a SUBSCRIBE; `Expires::Unsubscribe` ends the subscription
    pub async fn initiate(&self, subscription: SubscriptionId, expires: Expires) -> SlaResult<OutgoingRequest> {
        let _guard = self.lock_subscription(subscription).await?;
        self.initiate_locked(subscription, expires).await
    }

    pub async fn initiate_locked(&self, subscription: SubscriptionId, expires: Expires) -> SlaResult<OutgoingRequest> {
        self.ensure_record(subscription)?;
        self.engine
            .initiate(subscription, expires)
            .await
            .map_err(|e| SlaError::resource_creation("create SUBSCRIBE", e))
    }

    /// Answer the SUBSCRIBE that created a server subscription
    pub async fn accept(&self, subscription: SubscriptionId, request: &IncomingRequest, status_code: u16) -> SlaResult<()> {
        let _guard = self.lock_subscription(subscription).await?;
        self.engine
            .accept(subscription, request, status_code)
            .await
            .map_err(|e| SlaError::transmission(format!("{} response to SUBSCRIBE", status_code), e))
    }

    /// Replace the cached body without sending anything
    pub async fn set_cached_body(
        &self,
        subscription: SubscriptionId,
        content_type: Option<&MediaType>,
        payload: Option<&[u8]>,
    ) -> SlaResult<()> {
        let _guard = self.lock_subscription(subscription).await?;
        let mut record = self
            .records
            .get_mut(&subscription)
            .ok_or_else(|| no_record(subscription))?;
        record.set_cached_body(content_type, payload);
        Ok(())
    }

    /// Build a NOTIFY, updating the body cache from `params`
    pub async fn notify(&self, subscription: SubscriptionId, params: NotifyParams) -> SlaResult<OutgoingRequest> {
        let _guard = self.lock_subscription(subscription).await?;
        self.notify_locked(subscription, params).await
    }

    pub async fn notify_locked(&self, subscription: SubscriptionId, params: NotifyParams) -> SlaResult<OutgoingRequest> {
        self.ensure_record(subscription)?;
        let mut request = self
            .engine
            .notify(
                subscription,
                params.state,
                params.state_text.as_deref(),
                params.reason.as_deref(),
            )
            .await
            .map_err(|e| SlaError::resource_creation("create NOTIFY", e))?;

        let mut record = self
            .records
            .get_mut(&subscription)
            .ok_or_else(|| no_record(subscription))?;
        record.set_cached_body(params.content_type.as_ref(), params.body.as_deref());

        match record.build_outgoing_body(&mut request) {
            Ok(()) => Ok(request),
            // A final NOTIFY may go out bare when nothing was ever cached
            Err(_) if params.state.is_terminated() => {
                debug!("Sending terminating NOTIFY for {} without a body", subscription);
                Ok(request)
            }
            Err(e) => Err(e),
        }
    }

    /// Build a NOTIFY reflecting the current state and cached body
    pub async fn current_notify(&self, subscription: SubscriptionId) -> SlaResult<OutgoingRequest> {
        let _guard = self.lock_subscription(subscription).await?;
        self.current_notify_locked(subscription).await
    }

    pub async fn current_notify_locked(&self, subscription: SubscriptionId) -> SlaResult<OutgoingRequest> {
        self.ensure_record(subscription)?;
        let mut request = self
            .engine
            .current_notify(subscription)
            .await
            .map_err(|e| SlaError::resource_creation("create NOTIFY", e))?;

        let record = self
            .records
            .get(&subscription)
            .ok_or_else(|| no_record(subscription))?;
        record.build_outgoing_body(&mut request)?;
        Ok(request)
    }

    /// Hand a built request to the engine for transmission
    pub async fn send_request(&self, subscription: SubscriptionId, request: OutgoingRequest) -> SlaResult<()> {
        let _guard = self.lock_subscription(subscription).await?;
        self.send_locked(subscription, request).await
    }

    pub async fn send_locked(&self, subscription: SubscriptionId, request: OutgoingRequest) -> SlaResult<()> {
        let method = request.method.clone();
        self.engine
            .send_request(subscription, request)
            .await
            .map_err(|e| SlaError::transmission(method.to_string(), e))
    }

    /// Forcefully end a subscription
    ///
    /// The engine reports the resulting Terminated state through the usual
    /// state callback, which releases the record.
    pub async fn terminate(&self, subscription: SubscriptionId, notify: bool) -> SlaResult<()> {
        let _guard = self.lock_subscription(subscription).await?;
        self.terminate_locked(subscription, notify).await
    }

    pub async fn terminate_locked(&self, subscription: SubscriptionId, notify: bool) -> SlaResult<()> {
        self.engine
            .terminate(subscription, notify)
            .await
            .map_err(|e| SlaError::transmission("termination", e))
    }

    /// Drop the record of a subscription whose engine object is gone
    fn destroy_record(&self, subscription: SubscriptionId) {
        if let Some((_, record)) = self.records.remove(&subscription) {
            // A dialog hosts a single SLA subscription
            self.locks.remove(record.dialog());
            if self.bindings.unbind(subscription).is_some() {
                debug!("Dropped account binding of terminated subscription {}", subscription);
            }
        } else {
            warn!("No record to destroy for subscription {}", subscription);
        }
    }
}

fn require_dialog(dialog: Option<DialogId>) -> SlaResult<DialogId> {
    match dialog {
        Some(d) if !d.is_nil() => Ok(d),
        _ => Err(SlaError::invalid_argument("a dialog is required")),
    }
}

fn no_record(subscription: SubscriptionId) -> SlaError {
    SlaError::invalid_operation(format!("subscription {} has no SLA record", subscription))
}
