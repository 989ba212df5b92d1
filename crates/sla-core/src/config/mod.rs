//! Configuration module for sla-core
//!
//! This module provides the configuration consumed by the SLA layer:
//!
//! - [`SlaConfig`]: module-wide settings (table sizes, package name, event
//!   channel capacity)
//! - [`AccountConfig`]: per-account identity, dialog preferences and the
//!   monitored lines and devices
//!
//! Both load from TOML and follow the `with_*` builder pattern.
//!
//! ## Example
//!
//! ```rust
//! use rvoip_sla_core::config::{SlaConfig, AccountConfig, MonitoredEndpoint};
//!
//! let config = SlaConfig::default().with_max_shared_lines(4);
//! assert!(config.validate().is_ok());
//!
//! let account = AccountConfig::new("sip:alice@pbx.example.com")
//!     .with_line(1, MonitoredEndpoint::enabled("sip:line1@pbx.example.com"))
//!     .with_device(0, MonitoredEndpoint::enabled("sip:bob@pbx.example.com"));
//! assert!(account.validate(&config).is_ok());
//! ```

pub mod account;

pub use account::{AccountConfig, AuthPreferences, Credential, MonitoredEndpoint};

use serde::{Deserialize, Serialize};

use crate::errors::{SlaError, SlaResult};
use crate::types::{SubscriptionKind, SLA_DEFAULT_EXPIRES};

/// Module-wide SLA/BLF settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    /// Event package token registered with the engine
    pub event_name: String,

    /// Default expiration registered for the package, in seconds
    ///
    /// Used by line appearances, which always initiate with the engine default.
    pub default_expires: u32,

    /// Size of each account's line table; slot 0 is reserved so
    /// `max_shared_lines - 1` lines are usable
    pub max_shared_lines: usize,

    /// Size of each account's device table
    pub max_blf_devices: usize,

    /// Capacity of the informational event broadcast channel
    pub info_channel_capacity: usize,

    /// Whether to install the unsolicited NOTIFY interceptor
    pub intercept_unsolicited: bool,

    /// Account used when an unsolicited NOTIFY matches no account identity
    pub default_account: Option<usize>,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            event_name: "dialog".to_string(),
            default_expires: SLA_DEFAULT_EXPIRES,
            max_shared_lines: 16,
            max_blf_devices: 64,
            info_channel_capacity: 256,
            intercept_unsolicited: true,
            default_account: None,
        }
    }
}

impl SlaConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> SlaResult<Self> {
        let config: SlaConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the number of line slots (including reserved slot 0)
    pub fn with_max_shared_lines(mut self, max: usize) -> Self {
        self.max_shared_lines = max;
        self
    }

    /// Set the number of device slots
    pub fn with_max_blf_devices(mut self, max: usize) -> Self {
        self.max_blf_devices = max;
        self
    }

    /// Set the fallback account for unsolicited NOTIFY
    pub fn with_default_account(mut self, account: usize) -> Self {
        self.default_account = Some(account);
        self
    }

    /// Do not install the unsolicited NOTIFY interceptor
    pub fn without_unsolicited_interceptor(mut self) -> Self {
        self.intercept_unsolicited = false;
        self
    }

    /// Table size for a kind
    pub fn capacity(&self, kind: SubscriptionKind) -> usize {
        match kind {
            SubscriptionKind::LineAppearance => self.max_shared_lines,
            SubscriptionKind::DeviceMonitor => self.max_blf_devices,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> SlaResult<()> {
        if self.event_name.trim().is_empty() {
            return Err(SlaError::configuration("event_name must not be empty"));
        }
        if self.default_expires == 0 {
            return Err(SlaError::configuration("default_expires must be greater than zero"));
        }
        if self.info_channel_capacity == 0 {
            return Err(SlaError::configuration("info_channel_capacity must be greater than zero"));
        }
        Ok(())
    }
}
