//! Account lookup for out-of-dialog requests

use tracing::trace;

use super::SlaRegistry;
use crate::engine::AccountResolver;
use crate::message::{address_of_record, IncomingRequest};
use crate::types::AccountId;

impl SlaRegistry {
    /// Lowest-numbered account whose identity matches `aor`
    fn account_for_aor(&self, aor: &str) -> Option<AccountId> {
        self.accounts
            .iter()
            .filter(|entry| address_of_record(&entry.value().config.read().id).as_deref() == Some(aor))
            .map(|entry| *entry.key())
            .min()
    }
}

impl AccountResolver for SlaRegistry {
    /// Request-URI first, then the To header, then the configured default
    fn find_for_incoming(&self, request: &IncomingRequest) -> Option<AccountId> {
        let matched = request
            .target_aor()
            .and_then(|aor| self.account_for_aor(&aor))
            .or_else(|| request.to_aor().and_then(|aor| self.account_for_aor(&aor)));
        if matched.is_some() {
            trace!("Incoming {} matched account {:?}", request.method, matched);
            return matched;
        }

        self.config
            .default_account
            .map(AccountId)
            .filter(|account| self.accounts.contains_key(account))
    }
}

