//! Subscription to account association
//!
//! Lets the registry's callbacks find the owning account of a subscription
//! without going through the dialog.

use std::sync::Arc;

use dashmap::DashMap;

use crate::types::{AccountId, SubscriptionId};

/// Typed `SubscriptionId → AccountId` table
#[derive(Debug, Clone, Default)]
pub struct AccountBindings {
    bindings: Arc<DashMap<SubscriptionId, AccountId>>,
}

impl AccountBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, subscription: SubscriptionId, account: AccountId) {
        self.bindings.insert(subscription, account);
    }

    /// Detach; returns the account that was bound
    pub fn unbind(&self, subscription: SubscriptionId) -> Option<AccountId> {
        self.bindings.remove(&subscription).map(|(_, account)| account)
    }

    pub fn get(&self, subscription: SubscriptionId) -> Option<AccountId> {
        self.bindings.get(&subscription).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}
