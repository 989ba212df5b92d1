//! Cache of the last notified body
//!
//! Holds the content type and payload of the most recent NOTIFY so a refresh
//! can replay it verbatim. Content is copied in and out; nothing borrowed from
//! the caller survives a call.

use bytes::Bytes;

use crate::errors::{SlaError, SlaResult};
use crate::message::{MediaType, MessageBody, OutgoingRequest};

/// Last notified content type and payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyCache {
    content_type: Option<MediaType>,
    payload: Option<Bytes>,
}

impl BodyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached content
    ///
    /// When either argument is present the cache is reset first, so an
    /// argument left `None` clears that half. Both `None` leaves the cache
    /// untouched. Returns whether the cache was reset.
    pub fn set(&mut self, content_type: Option<&MediaType>, payload: Option<&[u8]>) -> bool {
        if content_type.is_none() && payload.is_none() {
            return false;
        }
        self.reset();
        self.content_type = content_type.cloned();
        self.payload = payload.map(Bytes::copy_from_slice);
        true
    }

    /// Drop all cached content
    pub fn reset(&mut self) {
        self.content_type = None;
        self.payload = None;
    }

    pub fn content_type(&self) -> Option<&MediaType> {
        self.content_type.as_ref()
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Whether both a content type and a non-empty payload are cached
    pub fn is_complete(&self) -> bool {
        self.content_type.is_some() && self.payload.as_ref().map_or(false, |p| !p.is_empty())
    }

    /// Copy the cached body into `request`
    ///
    /// Fails with `InvalidOperation` unless both halves are cached.
    pub fn build_outgoing_body(&self, request: &mut OutgoingRequest) -> SlaResult<()> {
        match (&self.content_type, &self.payload) {
            (Some(content_type), Some(payload)) if !payload.is_empty() => {
                // Deep copy so the request never shares storage with the cache
                let data = Bytes::copy_from_slice(payload);
                request.set_body(MessageBody::new(content_type.clone(), data));
                Ok(())
            }
            _ => Err(SlaError::invalid_operation("no message body has been cached")),
        }
    }
}
