//! Application callback table
//!
//! Each handler is optional. A handler left `None` makes the adapter apply the
//! package's default behavior for that event.
//!
//! Handlers run while the adapter holds the owning dialog's lock. They must
//! not call back into locking adapter operations for the same dialog; spawn a
//! task for that instead.
//!
//! ```rust
//! use rvoip_sla_core::subscription::SubscriptionCallbacks;
//!
//! let callbacks = SubscriptionCallbacks::new()
//!     .on_state_changed(|ctx| println!("{} {} is {}", ctx.kind, ctx.index, ctx.state_name));
//! assert!(format!("{:?}", callbacks).contains("state_changed: true"));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::message::{IncomingRequest, ResponseOverride, TransactionInfo};
use crate::types::{AccountId, DialogId, SubscriptionId, SubscriptionKind, SubscriptionRole, SubscriptionState};

/// Snapshot of a subscription handed to every callback
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionContext {
    pub subscription: SubscriptionId,
    pub dialog: DialogId,
    pub kind: SubscriptionKind,
    pub index: usize,
    pub role: SubscriptionRole,
    pub state: SubscriptionState,
    pub state_name: String,
    /// Account bound to the subscription, if any
    pub account: Option<AccountId>,
}

pub type StateHandler = Arc<dyn Fn(&SubscriptionContext) + Send + Sync>;
pub type TransactionHandler = Arc<dyn Fn(&SubscriptionContext, &TransactionInfo) + Send + Sync>;
pub type RequestHandler = Arc<dyn Fn(&SubscriptionContext, &IncomingRequest) -> ResponseOverride + Send + Sync>;
pub type TimerHandler = Arc<dyn Fn(&SubscriptionContext) + Send + Sync>;

/// The six optional subscription handlers
#[derive(Clone, Default)]
pub struct SubscriptionCallbacks {
    pub state_changed: Option<StateHandler>,
    pub transaction_state: Option<TransactionHandler>,
    pub incoming_refresh: Option<RequestHandler>,
    pub incoming_notify: Option<RequestHandler>,
    pub client_refresh_due: Option<TimerHandler>,
    pub server_timeout: Option<TimerHandler>,
}

impl SubscriptionCallbacks {
    /// Empty table: every event gets the default behavior
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_state_changed<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubscriptionContext) + Send + Sync + 'static,
    {
        self.state_changed = Some(Arc::new(f));
        self
    }

    pub fn on_transaction_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubscriptionContext, &TransactionInfo) + Send + Sync + 'static,
    {
        self.transaction_state = Some(Arc::new(f));
        self
    }

    /// Handle incoming SUBSCRIBE refreshes; the handler becomes responsible
    /// for sending a NOTIFY
    pub fn on_incoming_refresh<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubscriptionContext, &IncomingRequest) -> ResponseOverride + Send + Sync + 'static,
    {
        self.incoming_refresh = Some(Arc::new(f));
        self
    }

    pub fn on_incoming_notify<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubscriptionContext, &IncomingRequest) -> ResponseOverride + Send + Sync + 'static,
    {
        self.incoming_notify = Some(Arc::new(f));
        self
    }

    /// Handle the client refresh timer; the handler becomes responsible for
    /// sending the refresh
    pub fn on_client_refresh_due<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubscriptionContext) + Send + Sync + 'static,
    {
        self.client_refresh_due = Some(Arc::new(f));
        self
    }

    pub fn on_server_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubscriptionContext) + Send + Sync + 'static,
    {
        self.server_timeout = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for SubscriptionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionCallbacks")
            .field("state_changed", &self.state_changed.is_some())
            .field("transaction_state", &self.transaction_state.is_some())
            .field("incoming_refresh", &self.incoming_refresh.is_some())
            .field("incoming_notify", &self.incoming_notify.is_some())
            .field("client_refresh_due", &self.client_refresh_due.is_some())
            .field("server_timeout", &self.server_timeout.is_some())
            .finish()
    }
}
