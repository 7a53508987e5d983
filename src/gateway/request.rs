//! Request configuration and the response envelope

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A plain JSON object, used for query parameters and action parameters
pub type Params = serde_json::Map<String, Value>;

/// Standard wire wrapper around every response payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T = Value> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: T,
}

/// Base configuration every request is merged over
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "/api".to_string(),
            timeout: Duration::from_millis(10_000),
            headers: BTreeMap::new(),
        }
    }
}

/// Per-request configuration. Every field is optional so that partial
/// configs can be layered with [`RequestConfig::merge`].
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub method: Option<Method>,
    pub url: Option<String>,
    pub base_url: Option<String>,
    pub query: Option<Params>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub signal: Option<CancellationToken>,
}

impl RequestConfig {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn query(mut self, query: Params) -> Self {
        self.query = Some(query);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Layer `over` on top of `self`. Fields set in `over` win; headers are
    /// merged per name.
    pub fn merge(mut self, over: RequestConfig) -> Self {
        if over.method.is_some() {
            self.method = over.method;
        }
        if over.url.is_some() {
            self.url = over.url;
        }
        if over.base_url.is_some() {
            self.base_url = over.base_url;
        }
        if over.query.is_some() {
            self.query = over.query;
        }
        if over.body.is_some() {
            self.body = over.body;
        }
        if over.timeout.is_some() {
            self.timeout = over.timeout;
        }
        if over.signal.is_some() {
            self.signal = over.signal;
        }
        self.headers.extend(over.headers);
        self
    }

    /// Fill in whatever the caller left unset from the gateway defaults
    pub fn with_defaults(self, base: &GatewayConfig) -> Self {
        let defaults = RequestConfig {
            base_url: Some(base.base_url.clone()),
            timeout: Some(base.timeout),
            headers: base.headers.clone(),
            ..Default::default()
        };
        defaults.merge(self)
    }
}

/// Join a request URL onto a base URL. Absolute request URLs are used as is.
pub fn join_url(base: Option<&str>, url: &str) -> String {
    if url::Url::parse(url).is_ok() {
        return url.to_string();
    }
    match base {
        Some(base) if !base.is_empty() => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        _ => url.to_string(),
    }
}

/// Flatten a JSON object into query pairs. Arrays repeat their key and
/// nulls are dropped.
pub fn flatten_query(query: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(query.len());
    for (key, value) in query {
        match value {
            Value::Null => {}
            Value::Array(values) => {
                for v in values {
                    if let Some(s) = scalar_to_string(v) {
                        pairs.push((key.clone(), s));
                    }
                }
            }
            other => {
                if let Some(s) = scalar_to_string(other) {
                    pairs.push((key.clone(), s));
                }
            }
        }
    }
    pairs
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
