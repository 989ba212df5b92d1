//! Informational events for the application
//!
//! [`SlaInfo`] is published on terminal transitions of registry
//! subscriptions, on NOTIFY received for them, and on unsolicited NOTIFY.
//! [`SlaInfoHub`] fans the events out over a broadcast channel.

pub mod info_hub;
pub mod sla_info;

pub use info_hub::SlaInfoHub;
pub use sla_info::{SlaInfo, SlaInfoReason};
