//! Shared test fixtures: a recording SubscriptionEngine and setup helpers

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use rvoip_sla_core::adapter::SlaAdapter;
use rvoip_sla_core::config::{AccountConfig, AuthPreferences, Credential, MonitoredEndpoint, SlaConfig};
use rvoip_sla_core::engine::{
    EngineError, EngineResult, PackageRegistration, SubscriptionEngine, TransportSelector, UacDialogRequest,
};
use rvoip_sla_core::events::SlaInfoHub;
use rvoip_sla_core::message::{IncomingRequest, Method, OutgoingRequest};
use rvoip_sla_core::registry::SlaRegistry;
use rvoip_sla_core::subscription::DialogInfoPackage;
use rvoip_sla_core::types::{AccountId, DialogId, Expires, SubscriptionId, SubscriptionState};

/// One call made into the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RegisterPackage(String),
    UnregisterPackage(String),
    CreateContact(AccountId),
    CreateDialog(UacDialogRequest),
    SetTransport(DialogId, u32),
    SetRouteSet(DialogId, Vec<String>),
    SetCredentials(DialogId, usize),
    SetAuthPrefs(DialogId),
    CreateUac(DialogId),
    CreateUas(DialogId),
    Accept(SubscriptionId, u16),
    Initiate(SubscriptionId, Expires),
    Notify(SubscriptionId, SubscriptionState, Option<String>),
    CurrentNotify(SubscriptionId),
    Send(SubscriptionId, OutgoingRequest),
    Terminate(SubscriptionId, bool),
    Respond(String, u16),
}

type SendProbe = Box<dyn Fn(SubscriptionId, &OutgoingRequest) + Send + Sync>;

/// Engine double that records every call
///
/// Operations named with [`fail`](MockEngine::fail) return an error until
/// [`recover`](MockEngine::recover) is called.
pub struct MockEngine {
    calls: Mutex<Vec<Call>>,
    states: DashMap<SubscriptionId, SubscriptionState>,
    failing: Mutex<HashSet<&'static str>>,
    packages: Mutex<HashSet<String>>,
    send_probe: Mutex<Option<SendProbe>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            states: DashMap::new(),
            failing: Mutex::new(HashSet::new()),
            packages: Mutex::new(HashSet::new()),
            send_probe: Mutex::new(None),
        })
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing.lock().remove(operation);
    }

    /// Run `probe` inside every `send_request`, before it is recorded
    pub fn on_send(&self, probe: impl Fn(SubscriptionId, &OutgoingRequest) + Send + Sync + 'static) {
        *self.send_probe.lock() = Some(Box::new(probe));
    }

    pub fn set_state(&self, subscription: SubscriptionId, state: SubscriptionState) {
        self.states.insert(subscription, state);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Requests handed to `send_request`, in order
    pub fn sent(&self) -> Vec<(SubscriptionId, OutgoingRequest)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Send(sub, req) => Some((*sub, req.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn check(&self, operation: &'static str) -> EngineResult<()> {
        if self.failing.lock().contains(operation) {
            Err(EngineError::new(503, format!("{} unavailable", operation)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubscriptionEngine for MockEngine {
    async fn register_package(&self, package: &PackageRegistration) -> EngineResult<()> {
        self.check("register_package")?;
        if !self.packages.lock().insert(package.event_name.clone()) {
            return Err(EngineError::new(409, "package already registered"));
        }
        self.record(Call::RegisterPackage(package.event_name.clone()));
        Ok(())
    }

    async fn unregister_package(&self, event_name: &str) -> EngineResult<()> {
        self.check("unregister_package")?;
        self.packages.lock().remove(event_name);
        self.record(Call::UnregisterPackage(event_name.to_string()));
        Ok(())
    }

    async fn create_uac_contact(&self, account: AccountId, local_uri: &str) -> EngineResult<String> {
        self.check("create_uac_contact")?;
        self.record(Call::CreateContact(account));
        Ok(format!("<{};ob>", local_uri))
    }

    async fn create_uac_dialog(&self, request: &UacDialogRequest) -> EngineResult<DialogId> {
        self.check("create_uac_dialog")?;
        self.record(Call::CreateDialog(request.clone()));
        Ok(DialogId::new())
    }

    async fn set_transport(&self, dialog: DialogId, selector: TransportSelector) -> EngineResult<()> {
        self.check("set_transport")?;
        self.record(Call::SetTransport(dialog, selector.transport_id));
        Ok(())
    }

    async fn set_route_set(&self, dialog: DialogId, route_set: &[String]) -> EngineResult<()> {
        self.check("set_route_set")?;
        self.record(Call::SetRouteSet(dialog, route_set.to_vec()));
        Ok(())
    }

    async fn set_credentials(&self, dialog: DialogId, credentials: &[Credential]) -> EngineResult<()> {
        self.check("set_credentials")?;
        self.record(Call::SetCredentials(dialog, credentials.len()));
        Ok(())
    }

    async fn set_auth_prefs(&self, dialog: DialogId, _prefs: &AuthPreferences) -> EngineResult<()> {
        self.check("set_auth_prefs")?;
        self.record(Call::SetAuthPrefs(dialog));
        Ok(())
    }

    async fn create_uac(&self, dialog: DialogId, _event_name: &str) -> EngineResult<SubscriptionId> {
        self.check("create_uac")?;
        let subscription = SubscriptionId::new();
        self.states.insert(subscription, SubscriptionState::Null);
        self.record(Call::CreateUac(dialog));
        Ok(subscription)
    }

    async fn create_uas(&self, dialog: DialogId, _request: &IncomingRequest) -> EngineResult<SubscriptionId> {
        self.check("create_uas")?;
        let subscription = SubscriptionId::new();
        self.states.insert(subscription, SubscriptionState::Null);
        self.record(Call::CreateUas(dialog));
        Ok(subscription)
    }

    async fn accept(&self, subscription: SubscriptionId, _request: &IncomingRequest, status_code: u16) -> EngineResult<()> {
        self.check("accept")?;
        self.states.insert(subscription, SubscriptionState::Accepted);
        self.record(Call::Accept(subscription, status_code));
        Ok(())
    }

    async fn initiate(&self, subscription: SubscriptionId, expires: Expires) -> EngineResult<OutgoingRequest> {
        self.check("initiate")?;
        self.record(Call::Initiate(subscription, expires));
        let mut request = OutgoingRequest::new(Method::Subscribe);
        request.expires = Some(expires.as_raw());
        Ok(request)
    }

    async fn notify(
        &self,
        subscription: SubscriptionId,
        state: SubscriptionState,
        state_text: Option<&str>,
        reason: Option<&str>,
    ) -> EngineResult<OutgoingRequest> {
        self.check("notify")?;
        self.record(Call::Notify(subscription, state, reason.map(str::to_string)));
        let mut request = OutgoingRequest::new(Method::Notify);
        request.subscription_state = Some(state_text.unwrap_or(state.name()).to_ascii_lowercase());
        request.reason = reason.map(str::to_string);
        Ok(request)
    }

    async fn current_notify(&self, subscription: SubscriptionId) -> EngineResult<OutgoingRequest> {
        self.check("current_notify")?;
        self.record(Call::CurrentNotify(subscription));
        let mut request = OutgoingRequest::new(Method::Notify);
        request.subscription_state = Some(self.state(subscription).name().to_ascii_lowercase());
        Ok(request)
    }

    async fn send_request(&self, subscription: SubscriptionId, request: OutgoingRequest) -> EngineResult<()> {
        self.check("send_request")?;
        if let Some(probe) = self.send_probe.lock().as_ref() {
            probe(subscription, &request);
        }
        if request.method == Method::Subscribe && self.state(subscription) == SubscriptionState::Null {
            self.states.insert(subscription, SubscriptionState::Sent);
        }
        self.record(Call::Send(subscription, request));
        Ok(())
    }

    async fn terminate(&self, subscription: SubscriptionId, notify: bool) -> EngineResult<()> {
        self.check("terminate")?;
        self.states.insert(subscription, SubscriptionState::Terminated);
        self.record(Call::Terminate(subscription, notify));
        Ok(())
    }

    fn state(&self, subscription: SubscriptionId) -> SubscriptionState {
        self.states
            .get(&subscription)
            .map(|s| *s)
            .unwrap_or(SubscriptionState::Unknown)
    }

    async fn respond(&self, request: &IncomingRequest, status_code: u16) -> EngineResult<()> {
        self.check("respond")?;
        self.record(Call::Respond(request.uri.clone(), status_code));
        Ok(())
    }
}

/// Install a test subscriber; repeated calls are harmless
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn adapter(engine: &Arc<MockEngine>) -> Arc<SlaAdapter> {
    Arc::new(SlaAdapter::new(engine.clone(), Arc::new(DialogInfoPackage::default())))
}

pub fn registry(engine: &Arc<MockEngine>, config: SlaConfig) -> Arc<SlaRegistry> {
    let info = SlaInfoHub::new(config.info_channel_capacity);
    Arc::new(SlaRegistry::new(adapter(engine), config, info))
}

/// `sip:alice@pbx.example.com` with line 1 and device 3 configured
pub fn alice(line_enabled: bool, device_enabled: bool) -> AccountConfig {
    let line = if line_enabled {
        MonitoredEndpoint::enabled("sip:line1@pbx.example.com")
    } else {
        MonitoredEndpoint::disabled("sip:line1@pbx.example.com")
    };
    let device = if device_enabled {
        MonitoredEndpoint::enabled("sip:bob@pbx.example.com")
    } else {
        MonitoredEndpoint::disabled("sip:bob@pbx.example.com")
    };
    AccountConfig::new("sip:alice@pbx.example.com")
        .with_contact("<sip:alice@192.0.2.10:5060>")
        .with_line(1, line)
        .with_device(3, device)
}

pub fn is_send(call: &Call) -> bool {
    matches!(call, Call::Send(..))
}
