//! Collaborator interfaces
//!
//! The SUBSCRIBE/NOTIFY engine, dialog layer and transport live outside this
//! crate. Everything the SLA layer needs from them goes through
//! [`SubscriptionEngine`]; account lookup for out-of-dialog requests goes
//! through [`AccountResolver`].
//!
//! ## Callback delivery
//!
//! The engine reports subscription events back by calling the
//! [`SlaAdapter`](crate::adapter::SlaAdapter) handlers, or by sending
//! [`EngineEvent`](crate::adapter::EngineEvent)s into the adapter's event loop.
//! Handlers take the owning dialog's lock, so an engine must not invoke them
//! synchronously from inside one of the methods below; use the event loop when
//! in doubt.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AuthPreferences, Credential};
use crate::message::{IncomingRequest, MediaType, OutgoingRequest};
use crate::types::{AccountId, DialogId, Expires, SubscriptionId, SubscriptionState};

/// Failure status reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (status {code})")]
pub struct EngineError {
    /// Engine status code
    pub code: i32,
    /// Human-readable description
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result type for engine calls
pub type EngineResult<T> = Result<T, EngineError>;

/// Event package description handed to the engine at registration
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRegistration {
    /// Event header token, e.g. `dialog`
    pub event_name: String,
    /// Expiration used when a SUBSCRIBE is initiated with the default
    pub default_expires: u32,
    /// Content types placed in the Accept header
    pub accept: Vec<MediaType>,
}

/// Parameters for creating a client dialog
#[derive(Debug, Clone, PartialEq)]
pub struct UacDialogRequest {
    /// Local identity (From)
    pub local_uri: String,
    /// Contact to advertise
    pub contact: String,
    /// Remote target (To and Request-URI)
    pub target: String,
}

/// Transport the dialog must stick to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSelector {
    pub transport_id: u32,
}

/// The SUBSCRIBE/NOTIFY engine plus the slice of the dialog layer the SLA
/// package drives
#[async_trait]
pub trait SubscriptionEngine: Send + Sync {
    /// Register an event package; called once by module initialization
    async fn register_package(&self, package: &PackageRegistration) -> EngineResult<()>;

    /// Remove a previously registered package
    async fn unregister_package(&self, event_name: &str) -> EngineResult<()>;

    /// Synthesize a Contact for an account that has none configured
    async fn create_uac_contact(&self, account: AccountId, local_uri: &str) -> EngineResult<String>;

    /// Create a client dialog
    async fn create_uac_dialog(&self, request: &UacDialogRequest) -> EngineResult<DialogId>;

    /// Pin the dialog to a transport
    async fn set_transport(&self, dialog: DialogId, selector: TransportSelector) -> EngineResult<()>;

    /// Install a route set on the dialog
    async fn set_route_set(&self, dialog: DialogId, route_set: &[String]) -> EngineResult<()>;

    /// Install client credentials on the dialog's auth session
    async fn set_credentials(&self, dialog: DialogId, credentials: &[Credential]) -> EngineResult<()>;

    /// Set authentication preferences on the dialog's auth session
    async fn set_auth_prefs(&self, dialog: DialogId, prefs: &AuthPreferences) -> EngineResult<()>;

    /// Create a client subscription inside `dialog`
    async fn create_uac(&self, dialog: DialogId, event_name: &str) -> EngineResult<SubscriptionId>;

    /// Create a server subscription from an incoming SUBSCRIBE
    async fn create_uas(&self, dialog: DialogId, request: &IncomingRequest) -> EngineResult<SubscriptionId>;

    /// Respond to the SUBSCRIBE that created a server subscription
    async fn accept(&self, subscription: SubscriptionId, request: &IncomingRequest, status_code: u16) -> EngineResult<()>;

    /// Build a SUBSCRIBE (initial, refresh or unsubscribe)
    async fn initiate(&self, subscription: SubscriptionId, expires: Expires) -> EngineResult<OutgoingRequest>;

    /// Build a NOTIFY carrying `state`
    async fn notify(
        &self,
        subscription: SubscriptionId,
        state: SubscriptionState,
        state_text: Option<&str>,
        reason: Option<&str>,
    ) -> EngineResult<OutgoingRequest>;

    /// Build a NOTIFY reflecting the subscription's current state
    async fn current_notify(&self, subscription: SubscriptionId) -> EngineResult<OutgoingRequest>;

    /// Send a request built by one of the methods above
    async fn send_request(&self, subscription: SubscriptionId, request: OutgoingRequest) -> EngineResult<()>;

    /// Tear the subscription down locally, optionally sending a final NOTIFY
    async fn terminate(&self, subscription: SubscriptionId, notify: bool) -> EngineResult<()>;

    /// Current state of the subscription
    fn state(&self, subscription: SubscriptionId) -> SubscriptionState;

    /// Human-readable state name, for logging
    fn state_name(&self, subscription: SubscriptionId) -> String {
        self.state(subscription).name().to_string()
    }

    /// Send a stateless response to a request outside any dialog
    async fn respond(&self, request: &IncomingRequest, status_code: u16) -> EngineResult<()>;
}

/// Finds the account an out-of-dialog request was addressed to
pub trait AccountResolver: Send + Sync {
    /// Best effort; `None` when nothing matches
    fn find_for_incoming(&self, request: &IncomingRequest) -> Option<AccountId>;
}
