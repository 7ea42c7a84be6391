use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum inline headers before heap allocation.
/// Most requests carry no more than 16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the request hot path.
///
/// Header names use `Arc<str>` because they repeat heavily across requests
/// (Content-Type, Host, ...) and `Arc::clone()` is an O(1) atomic increment;
/// values stay `String` as per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// The value threaded through a compiled pipeline for one request.
///
/// Exclusively owned by its handling task for the duration of the request:
/// plugs take it by value and return it, so nothing here needs locking.
/// A plug stops the rest of the chain by calling [`RequestContext::halt`]
/// (usually via [`RequestContext::respond`]).
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method
    pub method: Method,
    /// Request path, script-name prefix not yet stripped
    pub path: String,
    /// URL scheme the request arrived on ("http" or "https")
    pub scheme: String,
    /// Host header / authority
    pub host: String,
    /// Request headers
    pub headers: HeaderVec,
    /// Path-prefix segments accumulated when the endpoint is mounted below
    /// the root; empty for root-mounted endpoints
    pub script_name: Vec<String>,
    /// Per-request assigns set by plugs for later steps
    pub assigns: HashMap<String, Value>,
    /// Identity of the endpoint handling this request, stamped at dispatch
    pub endpoint: Option<Arc<str>>,
    /// Secret material injected from the config cache at dispatch
    pub secret_key_base: Option<String>,
    /// Response status; 0 until a plug responds
    pub status: u16,
    /// Response headers
    pub resp_headers: HeaderVec,
    /// Response body
    pub resp_body: Value,
    halted: bool,
}

impl RequestContext {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            headers: HeaderVec::new(),
            script_name: Vec::new(),
            assigns: HashMap::new(),
            endpoint: None,
            secret_key_base: None,
            status: 0,
            resp_headers: HeaderVec::new(),
            resp_body: Value::Null,
            halted: false,
        }
    }

    /// Get a request header by name (case-insensitive per RFC 7230).
    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a response header.
    pub fn set_resp_header(&mut self, name: &str, value: String) {
        self.resp_headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.resp_headers.push((Arc::from(name), value));
    }

    /// Stash a value for later pipeline steps.
    pub fn assign(&mut self, key: &str, value: Value) {
        self.assigns.insert(key.to_string(), value);
    }

    pub fn get_assign(&self, key: &str) -> Option<&Value> {
        self.assigns.get(key)
    }

    /// Signal that no further pipeline steps should run.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Set the response and halt the pipeline.
    pub fn respond(mut self, status: u16, body: Value) -> Self {
        self.status = status;
        self.resp_body = body;
        self.halt();
        self
    }
}
