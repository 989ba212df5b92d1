//! Subscription object model
//!
//! - [`SubscriptionRecord`]: kind, index, owning dialog, callback table and
//!   body cache of one subscription
//! - [`BodyCache`]: last notified content type and payload
//! - [`SubscriptionCallbacks`]: optional application handlers
//! - [`EventPackage`] / [`DialogInfoPackage`]: the package registered with
//!   the engine

pub mod body_cache;
pub mod callbacks;
pub mod event_package;
pub mod record;

pub use body_cache::BodyCache;
pub use callbacks::{SubscriptionCallbacks, SubscriptionContext};
pub use event_package::{DialogInfoPackage, EventPackage};
pub use record::SubscriptionRecord;
