//! Per-account configuration
//!
//! The account store owns these values; the registry only reads them. Line
//! and device entries are keyed by their slot index.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::SlaConfig;
use crate::errors::{SlaError, SlaResult};
use crate::types::SubscriptionKind;

/// One monitored line or device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredEndpoint {
    /// Slot index; filled in by [`AccountConfig::with_line`] / `with_device`
    #[serde(default)]
    pub index: usize,
    /// Whether a subscription should exist for this slot
    pub enabled: bool,
    /// URI to subscribe to
    pub target: String,
}

impl MonitoredEndpoint {
    /// An enabled endpoint for `target`
    pub fn enabled(target: impl Into<String>) -> Self {
        Self {
            index: 0,
            enabled: true,
            target: target.into(),
        }
    }

    /// A disabled endpoint for `target`
    pub fn disabled(target: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::enabled(target)
        }
    }
}

/// How the secret in a [`Credential`] is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialDataType {
    PlainPassword,
    DigestHash,
}

/// Client credential handed to the dialog's auth session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub realm: String,
    pub scheme: String,
    pub username: String,
    pub data_type: CredentialDataType,
    pub data: String,
}

impl Credential {
    /// Digest credential with a plain password
    pub fn digest(realm: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            scheme: "digest".to_string(),
            username: username.into(),
            data_type: CredentialDataType::PlainPassword,
            data: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("realm", &self.realm)
            .field("scheme", &self.scheme)
            .field("username", &self.username)
            .field("data_type", &self.data_type)
            .field("data", &"<redacted>")
            .finish()
    }
}

/// Authentication preferences for the dialog's auth session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPreferences {
    /// Send credentials in the initial request instead of waiting for a challenge
    pub initial_auth: bool,
    /// Preferred digest algorithm
    pub algorithm: Option<String>,
}

/// Account identity, dialog preferences and monitored endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Local identity URI (From)
    pub id: String,
    /// Contact to advertise; synthesized by the engine when absent
    #[serde(default)]
    pub contact: Option<String>,
    /// Transport the account is locked to
    #[serde(default)]
    pub transport_id: Option<u32>,
    /// Route set applied to every dialog
    #[serde(default)]
    pub route_set: Vec<String>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub auth_prefs: Option<AuthPreferences>,
    /// Shared line appearances
    #[serde(default)]
    pub lines: Vec<MonitoredEndpoint>,
    /// Busy lamp field targets
    #[serde(default)]
    pub devices: Vec<MonitoredEndpoint>,
}

impl AccountConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            contact: None,
            transport_id: None,
            route_set: Vec::new(),
            credentials: Vec::new(),
            auth_prefs: None,
            lines: Vec::new(),
            devices: Vec::new(),
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> SlaResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_transport(mut self, transport_id: u32) -> Self {
        self.transport_id = Some(transport_id);
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route_set.push(route.into());
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials.push(credential);
        self
    }

    pub fn with_auth_prefs(mut self, prefs: AuthPreferences) -> Self {
        self.auth_prefs = Some(prefs);
        self
    }

    /// Configure line `index`, replacing any previous entry
    pub fn with_line(mut self, index: usize, endpoint: MonitoredEndpoint) -> Self {
        self.set_endpoint(SubscriptionKind::LineAppearance, index, endpoint);
        self
    }

    /// Configure device `index`, replacing any previous entry
    pub fn with_device(mut self, index: usize, endpoint: MonitoredEndpoint) -> Self {
        self.set_endpoint(SubscriptionKind::DeviceMonitor, index, endpoint);
        self
    }

    fn entries(&self, kind: SubscriptionKind) -> &Vec<MonitoredEndpoint> {
        match kind {
            SubscriptionKind::LineAppearance => &self.lines,
            SubscriptionKind::DeviceMonitor => &self.devices,
        }
    }

    fn entries_mut(&mut self, kind: SubscriptionKind) -> &mut Vec<MonitoredEndpoint> {
        match kind {
            SubscriptionKind::LineAppearance => &mut self.lines,
            SubscriptionKind::DeviceMonitor => &mut self.devices,
        }
    }

    /// Endpoint configured for a slot
    pub fn endpoint(&self, kind: SubscriptionKind, index: usize) -> Option<&MonitoredEndpoint> {
        self.entries(kind).iter().find(|e| e.index == index)
    }

    /// Insert or replace the endpoint for a slot
    pub fn set_endpoint(&mut self, kind: SubscriptionKind, index: usize, mut endpoint: MonitoredEndpoint) {
        endpoint.index = index;
        let entries = self.entries_mut(kind);
        match entries.iter_mut().find(|e| e.index == index) {
            Some(existing) => *existing = endpoint,
            None => entries.push(endpoint),
        }
    }

    /// Flip the enable flag of a configured slot; returns false if the slot
    /// has no endpoint
    pub fn set_enabled(&mut self, kind: SubscriptionKind, index: usize, enabled: bool) -> bool {
        match self.entries_mut(kind).iter_mut().find(|e| e.index == index) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Disable every line and device
    pub fn disable_all(&mut self) {
        for entry in self.lines.iter_mut().chain(self.devices.iter_mut()) {
            entry.enabled = false;
        }
    }

    /// Check the account against the module's table sizes
    pub fn validate(&self, config: &SlaConfig) -> SlaResult<()> {
        if self.id.trim().is_empty() {
            return Err(SlaError::configuration("account id must not be empty"));
        }
        for kind in [SubscriptionKind::LineAppearance, SubscriptionKind::DeviceMonitor] {
            let range = kind.slot_range(config.capacity(kind));
            for entry in self.entries(kind) {
                if !range.contains(&entry.index) {
                    return Err(SlaError::configuration(format!(
                        "{} index {} outside {:?}",
                        kind, entry.index, range
                    )));
                }
                if entry.enabled && entry.target.trim().is_empty() {
                    return Err(SlaError::configuration(format!(
                        "{} index {} is enabled without a target",
                        kind, entry.index
                    )));
                }
            }
        }
        Ok(())
    }
}
