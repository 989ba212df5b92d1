//! Core identifiers and enums shared across the crate
//!
//! - [`DialogId`], [`SubscriptionId`]: UUID handles issued by the engine
//! - [`AccountId`]: index of the owning account
//! - [`SubscriptionKind`]: shared line vs. busy lamp field, with the per-kind
//!   defaults used by the registry and the default refresh policy
//! - [`SubscriptionState`]: the engine's subscription state, mirrored for logging
//!   and default-policy decisions
//! - [`Expires`]: expiration requested when initiating a SUBSCRIBE

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Package default expiration in seconds, used for line appearances
pub const SLA_DEFAULT_EXPIRES: u32 = 3600;

/// Fixed expiration in seconds used for busy lamp field subscriptions
pub const BLF_DEFAULT_EXPIRES: u32 = 360;

/// Unique identifier of a dialog owned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId(pub Uuid);

impl DialogId {
    /// Create a new random dialog ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil ID stands for "no dialog"
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for DialogId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of an engine subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Create a new random subscription ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of an account in the application's account table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub usize);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acc#{}", self.0)
    }
}

/// What a subscription monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionKind {
    /// Shared line appearance, slots `1..max_shared_lines`
    LineAppearance,
    /// Busy lamp field target, slots `0..max_blf_devices`
    DeviceMonitor,
}

impl SubscriptionKind {
    /// Valid slot indexes for this kind given the configured table size
    ///
    /// Line slot 0 is reserved and never used.
    pub fn slot_range(&self, capacity: usize) -> Range<usize> {
        match self {
            SubscriptionKind::LineAppearance => 1..capacity.max(1),
            SubscriptionKind::DeviceMonitor => 0..capacity,
        }
    }

    /// Expiration of the initial SUBSCRIBE
    pub fn initial_expires(&self) -> Expires {
        match self {
            SubscriptionKind::LineAppearance => Expires::EngineDefault,
            SubscriptionKind::DeviceMonitor => Expires::Seconds(BLF_DEFAULT_EXPIRES),
        }
    }

    /// Expiration used by the default client refresh
    pub fn refresh_expires(&self) -> Expires {
        self.initial_expires()
    }

    /// Short label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionKind::LineAppearance => "SLA",
            SubscriptionKind::DeviceMonitor => "BLF",
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which side of the subscription this endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionRole {
    /// We sent the SUBSCRIBE
    Client,
    /// We received the SUBSCRIBE
    Server,
}

/// Subscription state as reported by the engine (RFC 6665)
///
/// ```text
/// Null → Sent/Accepted → Pending ⇄ Active → Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionState {
    /// Created, nothing sent yet
    Null,
    /// SUBSCRIBE sent, no final response
    Sent,
    /// 2xx received or sent
    Accepted,
    /// Subscription-State: pending
    Pending,
    /// Subscription-State: active
    Active,
    /// Subscription ended; no further transitions
    Terminated,
    /// State the engine could not classify
    Unknown,
}

impl SubscriptionState {
    /// Whether this is the terminal state
    pub fn is_terminated(&self) -> bool {
        matches!(self, SubscriptionState::Terminated)
    }

    /// Upper-case state name, as shown in logs
    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionState::Null => "NULL",
            SubscriptionState::Sent => "SENT",
            SubscriptionState::Accepted => "ACCEPTED",
            SubscriptionState::Pending => "PENDING",
            SubscriptionState::Active => "ACTIVE",
            SubscriptionState::Terminated => "TERMINATED",
            SubscriptionState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expiration requested when initiating a SUBSCRIBE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expires {
    /// Let the engine use the package default (wire value `-1`)
    EngineDefault,
    /// Unsubscribe (wire value `0`)
    Unsubscribe,
    /// Explicit expiration in seconds
    Seconds(u32),
}

impl Expires {
    /// The signed value used by the engine: `-1` default, `0` unsubscribe
    pub fn as_raw(&self) -> i64 {
        match self {
            Expires::EngineDefault => -1,
            Expires::Unsubscribe => 0,
            Expires::Seconds(secs) => i64::from(*secs),
        }
    }

    /// Build from the engine's signed representation
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            r if r < 0 => Expires::EngineDefault,
            0 => Expires::Unsubscribe,
            r => Expires::Seconds(u32::try_from(r).unwrap_or(u32::MAX)),
        }
    }
}
