//! # SLA-Core - Shared Line Appearance and Busy Lamp Field for RVoIP
//!
//! This crate manages `dialog` event package subscriptions (RFC 6665,
//! RFC 4235) for two kinds of monitored endpoints:
//!
//! - **Shared line appearances**: one subscription per shared line of an
//!   account, refreshed with the package default expiration
//! - **Busy lamp fields**: one subscription per monitored device, refreshed
//!   every 360 seconds
//!
//! It sits on top of a SUBSCRIBE/NOTIFY engine reached through
//! [`engine::SubscriptionEngine`] and never touches the wire itself.
//!
//! ## Architecture
//!
//! - `subscription`: subscription records, body cache, callback table and
//!   the event package definition
//! - `adapter`: turns engine callbacks into package behavior and exposes the
//!   package request API, serialized per dialog
//! - `registry`: per-account line and device slots, reconciled against the
//!   account configuration
//! - `interceptor`: answers `dialog` NOTIFY requests that arrive without a
//!   subscription
//! - `events`: informational events published to the application
//! - `module`: one-time registration and teardown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rvoip_sla_core::prelude::*;
//!
//! let module = SlaModule::init(engine, SlaConfig::default()).await?;
//! let account = AccountConfig::new("sip:alice@pbx.example.com")
//!     .with_line(1, MonitoredEndpoint::enabled("sip:line1@pbx.example.com"))
//!     .with_device(0, MonitoredEndpoint::enabled("sip:bob@pbx.example.com"));
//!
//! module.registry().add_account(AccountId(0), account)?;
//! module.registry().reconcile(AccountId(0)).await?;
//! ```

pub mod adapter;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod interceptor;
pub mod message;
pub mod module;
pub mod registry;
pub mod subscription;
pub mod types;

// Re-export key types
pub use adapter::{NotifyParams, SlaAdapter};
pub use config::{AccountConfig, MonitoredEndpoint, SlaConfig};
pub use engine::{AccountResolver, EngineError, SubscriptionEngine};
pub use errors::{SlaError, SlaResult};
pub use events::{SlaInfo, SlaInfoReason};
pub use interceptor::UnsolicitedNotifyInterceptor;
pub use module::SlaModule;
pub use registry::{SlaRegistry, StartOutcome};
pub use types::{AccountId, DialogId, Expires, SubscriptionId, SubscriptionKind, SubscriptionState};

/// Common imports
pub mod prelude {
    pub use crate::adapter::{NotifyParams, SlaAdapter};
    pub use crate::config::{AccountConfig, AuthPreferences, Credential, MonitoredEndpoint, SlaConfig};
    pub use crate::engine::{AccountResolver, EngineError, EngineResult, SubscriptionEngine};
    pub use crate::errors::{SlaError, SlaResult};
    pub use crate::events::{SlaInfo, SlaInfoReason};
    pub use crate::message::{IncomingRequest, MediaType, Method, OutgoingRequest, ResponseOverride};
    pub use crate::module::SlaModule;
    pub use crate::registry::{ActiveSlot, SlaRegistry, StartOutcome};
    pub use crate::subscription::{SubscriptionCallbacks, SubscriptionContext};
    pub use crate::types::*;
}
