//! Response model with consumed-once body semantics.
//!
//! A [`FetchResponse`] is deliberately not `Clone`: its body is handed to
//! exactly one consumer. Mirroring a response into the cache goes through
//! [`FetchResponse::duplicate`], which buffers the body into a second,
//! independent response.

use serde::Serialize;

use crate::cache::ResponseSnapshot;

/// Origin classification of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response, fully inspectable
    Basic,
    /// Cross-origin response; proxied but never inspected or cached
    Opaque,
    /// Synthesized locally (cache hit, fallback, queued write)
    Synthetic,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub response_type: ResponseType,
    pub url: String,
    pub headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(
        status: u16,
        response_type: ResponseType,
        url: impl Into<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            status,
            response_type,
            url: url.into(),
            headers,
            body,
        }
    }

    /// Rebuilds a response from a cached snapshot.
    pub fn from_snapshot(snapshot: ResponseSnapshot) -> Self {
        Self::new(
            snapshot.status,
            ResponseType::Basic,
            snapshot.url,
            snapshot.headers,
            snapshot.body,
        )
    }

    /// Second, independent copy of this response with its own buffered body.
    pub fn duplicate(&self) -> Self {
        Self {
            status: self.status,
            response_type: self.response_type,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    /// Consumes the response into a cacheable snapshot.
    pub fn into_snapshot(self) -> ResponseSnapshot {
        ResponseSnapshot::new(self.status, self.url, self.headers, self.body)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
