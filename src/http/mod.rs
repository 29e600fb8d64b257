//! Request plumbing between resource methods and the network
//!
//! This module contains the request descriptor and classification types the
//! dispatcher consumes, the transport that performs network calls, and a thin
//! API client that builds descriptors against a configured base URL.

pub mod client;
pub mod dispatcher;
pub mod transport;

pub use client::{ApiClient, ClientError};
pub use dispatcher::Dispatcher;
pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use url::Url;

/// A fully described HTTP request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Target URL, possibly already carrying a query string
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Query parameters appended to `url` when the request is resolved
    pub params: Vec<(String, String)>,
    /// JSON request body
    pub body: Option<Value>,
}

impl RequestDescriptor {
    /// Creates a descriptor with no headers, parameters or body
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            params: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET descriptor
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Adds a header, replacing any previous value with the same name
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merges a set of headers into the descriptor
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Appends a query parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Sets the JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The URL the request is actually sent to, query parameters included
    pub fn resolved_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        url
    }

    /// Whether the response to this request may be served from cache
    pub fn is_idempotent_read(&self) -> bool {
        self.method == Method::GET
    }
}

/// Per-call caching instructions
///
/// `group` and `action` tag the stored entry for bulk invalidation. `id`,
/// when present, replaces the URL-derived cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub group: Option<String>,
    pub action: Option<String>,
    pub id: Option<String>,
    /// How long a stored response stays fresh, `None` for indefinitely
    pub cache_lifetime: Option<Duration>,
    /// Skip the cache lookup and always call the network
    pub bypass_cache: bool,
}

impl Classification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.cache_lifetime = Some(lifetime);
        self
    }

    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}
