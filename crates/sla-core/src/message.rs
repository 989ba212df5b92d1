//! Message model consumed by the SLA layer
//!
//! Parsing and serialization belong to the engine. These types carry only what
//! this crate reads or writes: the method, the request target, the `Event`
//! header and an opaque typed body.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::SlaError;

/// SIP request methods this crate cares about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Subscribe,
    Notify,
    Other(String),
}

impl Method {
    /// Canonical upper-case token
    pub fn as_str(&self) -> &str {
        match self {
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Other(name) => name,
        }
    }
}

impl FromStr for Method {
    type Err = SlaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() {
            return Err(SlaError::invalid_argument("empty method token"));
        }
        // Methods are case-sensitive on the wire
        Ok(match token {
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            other => Method::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIME media type of a message body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaType {
    /// Top-level type, e.g. `application`
    pub media_type: String,
    /// Subtype, e.g. `dialog-info+xml`
    pub subtype: String,
    /// Parameters in order of appearance
    pub params: Vec<(String, String)>,
}

impl MediaType {
    pub fn new(media_type: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            subtype: subtype.into(),
            params: Vec::new(),
        }
    }

    /// `application/dialog-info+xml`, the body type of the dialog package
    pub fn dialog_info() -> Self {
        Self::new("application", "dialog-info+xml")
    }

    /// Case-insensitive comparison of type and subtype, ignoring parameters
    pub fn matches(&self, other: &MediaType) -> bool {
        self.media_type.eq_ignore_ascii_case(&other.media_type)
            && self.subtype.eq_ignore_ascii_case(&other.subtype)
    }
}

impl FromStr for MediaType {
    type Err = SlaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (media_type, subtype) = essence
            .split_once('/')
            .filter(|(t, st)| !t.trim().is_empty() && !st.trim().is_empty())
            .ok_or_else(|| SlaError::invalid_argument(format!("invalid media type '{}'", s)))?;

        let params = parts
            .filter_map(|p| {
                let (k, v) = p.split_once('=')?;
                Some((k.trim().to_string(), v.trim().trim_matches('"').to_string()))
            })
            .collect();

        Ok(Self {
            media_type: media_type.trim().to_string(),
            subtype: subtype.trim().to_string(),
            params,
        })
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_type, self.subtype)?;
        for (k, v) in &self.params {
            write!(f, ";{}={}", k, v)?;
        }
        Ok(())
    }
}

/// A typed, opaque message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub content_type: MediaType,
    pub data: Bytes,
}

impl MessageBody {
    pub fn new(content_type: MediaType, data: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            data: data.into(),
        }
    }
}

/// A request received from the network, already parsed by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingRequest {
    pub method: Method,
    /// Request-URI
    pub uri: String,
    /// Raw headers as `(name, value)` pairs
    pub headers: Vec<(String, String)>,
    pub body: Option<MessageBody>,
}

impl IncomingRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a body
    pub fn with_body(mut self, body: MessageBody) -> Self {
        self.body = Some(body);
        self
    }

    /// First header with this name, case-insensitive; compact forms are
    /// honoured for the headers this crate reads
    pub fn header(&self, name: &str) -> Option<&str> {
        let compact = compact_form(name);
        self.headers
            .iter()
            .find(|(n, _)| {
                n.eq_ignore_ascii_case(name)
                    || compact.map_or(false, |c| n.eq_ignore_ascii_case(c))
            })
            .map(|(_, v)| v.as_str())
    }

    /// Event type token from the `Event` header, without parameters
    pub fn event_type(&self) -> Option<&str> {
        let value = self.header("Event")?;
        let token = value.split(';').next().unwrap_or_default().trim();
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }

    /// `user@host` of the Request-URI
    pub fn target_aor(&self) -> Option<String> {
        address_of_record(&self.uri)
    }

    /// `user@host` of the To header
    pub fn to_aor(&self) -> Option<String> {
        self.header("To").and_then(address_of_record)
    }
}

fn compact_form(name: &str) -> Option<&'static str> {
    if name.eq_ignore_ascii_case("Event") {
        Some("o")
    } else if name.eq_ignore_ascii_case("To") {
        Some("t")
    } else {
        None
    }
}

/// Extract `user@host` (or `host`) from a URI or name-addr, lower-cased
///
/// Accepts `sip:alice@example.com;transport=tcp`,
/// `"Alice" <sip:alice@example.com>;tag=1` and bare `alice@example.com`.
pub fn address_of_record(value: &str) -> Option<String> {
    let value = value.trim();
    let uri = match (value.find('<'), value.find('>')) {
        (Some(start), Some(end)) if start < end => &value[start + 1..end],
        _ => value.split(';').next().unwrap_or_default(),
    };
    let uri = uri.trim();
    let without_scheme = uri
        .strip_prefix("sips:")
        .or_else(|| uri.strip_prefix("sip:"))
        .unwrap_or(uri);
    let aor = without_scheme
        .split(|c| c == ';' || c == '?')
        .next()
        .unwrap_or_default();
    // Drop the port so sip:alice@host:5060 matches sip:alice@host
    let aor = match aor.rsplit_once(':') {
        Some((head, port)) if port.chars().all(|c| c.is_ascii_digit()) => head,
        _ => aor,
    };
    if aor.is_empty() {
        None
    } else {
        Some(aor.to_ascii_lowercase())
    }
}

/// A request built by the engine and not yet sent
///
/// The engine fills in headers; the SLA layer only ever sets the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingRequest {
    pub method: Method,
    /// Expiration carried by a SUBSCRIBE, as the engine's signed value
    pub expires: Option<i64>,
    /// Subscription-State carried by a NOTIFY
    pub subscription_state: Option<String>,
    /// Reason parameter of the Subscription-State header
    pub reason: Option<String>,
    pub body: Option<MessageBody>,
}

impl OutgoingRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            expires: None,
            subscription_state: None,
            reason: None,
            body: None,
        }
    }

    pub fn set_body(&mut self, body: MessageBody) {
        self.body = Some(body);
    }
}

/// Transaction state change forwarded to the application untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub method: Method,
    pub state: String,
    pub status_code: Option<u16>,
}

/// Application's answer to an incoming SUBSCRIBE refresh or NOTIFY
///
/// Every field left `None` keeps the engine's default response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseOverride {
    pub status_code: Option<u16>,
    pub reason_phrase: Option<String>,
    pub body: Option<MessageBody>,
}
