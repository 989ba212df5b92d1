//! Informational event payload

use serde::{Deserialize, Serialize};

use crate::message::IncomingRequest;
use crate::types::{AccountId, SubscriptionId, SubscriptionKind};

/// Why an [`SlaInfo`] was published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlaInfoReason {
    /// A registry subscription reached Terminated
    Terminated,
    /// NOTIFY received on a registry subscription
    Notify,
    /// NOTIFY received outside any subscription
    Unsolicited,
}

/// Event delivered to the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaInfo {
    pub reason: SlaInfoReason,
    /// Owning account; `None` when an unsolicited NOTIFY matched no account
    pub account: Option<AccountId>,
    /// Subscription the event belongs to; `None` for unsolicited NOTIFY
    pub subscription: Option<SubscriptionId>,
    /// The raw request, for NOTIFY events
    pub request: Option<IncomingRequest>,
    pub kind: Option<SubscriptionKind>,
    pub index: Option<usize>,
}

impl SlaInfo {
    /// Terminal transition of a registry subscription
    pub fn terminated(account: AccountId, subscription: SubscriptionId, kind: SubscriptionKind, index: usize) -> Self {
        Self {
            reason: SlaInfoReason::Terminated,
            account: Some(account),
            subscription: Some(subscription),
            request: None,
            kind: Some(kind),
            index: Some(index),
        }
    }

    /// NOTIFY on a registry subscription
    pub fn notify(
        account: AccountId,
        subscription: SubscriptionId,
        kind: SubscriptionKind,
        index: usize,
        request: IncomingRequest,
    ) -> Self {
        Self {
            reason: SlaInfoReason::Notify,
            account: Some(account),
            subscription: Some(subscription),
            request: Some(request),
            kind: Some(kind),
            index: Some(index),
        }
    }

    /// NOTIFY with no matching subscription
    pub fn unsolicited(account: Option<AccountId>, request: IncomingRequest) -> Self {
        Self {
            reason: SlaInfoReason::Unsolicited,
            account,
            subscription: None,
            request: Some(request),
            kind: None,
            index: None,
        }
    }
}
