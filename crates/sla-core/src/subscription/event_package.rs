//! Event package definition for SLA/BLF (RFC 4235 `dialog` package)
//!
//! This module defines the EventPackage trait the module registers with the
//! engine, along with the dialog-info package used for both shared line
//! appearances and busy lamp fields.

use std::time::Duration;

use crate::engine::PackageRegistration;
use crate::message::MediaType;
use crate::types::SLA_DEFAULT_EXPIRES;

/// Trait for SIP event packages
///
/// Event packages define the name, body formats and expiry policy of a
/// subscription type.
pub trait EventPackage: Send + Sync {
    /// Get the name of this event package
    fn name(&self) -> &str;

    /// Get the accepted content types for this package
    fn accept_types(&self) -> Vec<MediaType>;

    /// Get the default subscription duration
    fn default_expires(&self) -> Duration;

    /// Whether a body of this type belongs to the package
    fn accepts(&self, content_type: &MediaType) -> bool {
        self.accept_types().iter().any(|t| t.matches(content_type))
    }

    /// Registration record handed to the engine
    fn registration(&self) -> PackageRegistration {
        PackageRegistration {
            event_name: self.name().to_string(),
            default_expires: u32::try_from(self.default_expires().as_secs()).unwrap_or(u32::MAX),
            accept: self.accept_types(),
        }
    }
}

/// Dialog event package carrying `application/dialog-info+xml`
///
/// The body is treated as opaque; the SLA layer only caches and replays it.
#[derive(Debug, Clone)]
pub struct DialogInfoPackage {
    name: String,
    default_expires: Duration,
}

impl DialogInfoPackage {
    /// Package with a custom event token and default expiry
    pub fn new(name: impl Into<String>, default_expires: Duration) -> Self {
        Self {
            name: name.into(),
            default_expires,
        }
    }
}

impl Default for DialogInfoPackage {
    fn default() -> Self {
        Self::new("dialog", Duration::from_secs(u64::from(SLA_DEFAULT_EXPIRES)))
    }
}

impl EventPackage for DialogInfoPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept_types(&self) -> Vec<MediaType> {
        vec![MediaType::dialog_info()]
    }

    fn default_expires(&self) -> Duration {
        self.default_expires // 1 hour unless configured
    }
}
