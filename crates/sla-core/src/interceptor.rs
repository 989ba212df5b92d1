//! Unsolicited NOTIFY interception
//!
//! Some PBXs push `dialog` NOTIFY requests without any prior SUBSCRIBE. The
//! interceptor sits in front of the engine's out-of-dialog request handling,
//! answers those requests with 200 and hands them to the application as
//! [`SlaInfo`] events.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{AccountResolver, SubscriptionEngine};
use crate::events::{SlaInfo, SlaInfoHub};
use crate::message::{IncomingRequest, Method};

/// Accepts `dialog` NOTIFY requests that match no subscription
pub struct UnsolicitedNotifyInterceptor {
    engine: Arc<dyn SubscriptionEngine>,
    resolver: Arc<dyn AccountResolver>,
    info: SlaInfoHub,
    event_name: String,
}

impl std::fmt::Debug for UnsolicitedNotifyInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsolicitedNotifyInterceptor")
            .field("event_name", &self.event_name)
            .finish()
    }
}

impl UnsolicitedNotifyInterceptor {
    pub fn new(
        engine: Arc<dyn SubscriptionEngine>,
        resolver: Arc<dyn AccountResolver>,
        info: SlaInfoHub,
        event_name: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            resolver,
            info,
            event_name: event_name.into(),
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Whether this interceptor would claim `request`
    pub fn matches(&self, request: &IncomingRequest) -> bool {
        request.method == Method::Notify
            && request
                .event_type()
                .map_or(false, |event| event.eq_ignore_ascii_case(&self.event_name))
    }

    /// Offer an incoming request; returns `true` if it was handled
    ///
    /// The request is answered with 200 even though no subscription exists.
    /// A failed response is logged and the request still counts as handled.
    pub async fn on_rx_request(&self, request: &IncomingRequest) -> bool {
        if !self.matches(request) {
            return false;
        }

        if let Err(e) = self.engine.respond(request, 200).await {
            warn!("Unable to answer unsolicited NOTIFY to {}: {}", request.uri, e);
        }

        let account = self.resolver.find_for_incoming(request);
        debug!(
            "Unsolicited {} NOTIFY to {} for account {:?}",
            self.event_name, request.uri, account
        );
        self.info.publish(SlaInfo::unsolicited(account, request.clone()));
        true
    }
}
