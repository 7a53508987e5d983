//! # Mock Transport
//!
//! A scripted [`Transport`] for testing resources without a server.
//!
//! Replies are consumed in the order they were queued. A reply can carry a
//! delay, during which the transport honors the request's abort signal, so
//! tests can arrange for an older request to settle after a newer one.
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.reply_json_after(Duration::from_millis(50), 200, json!({"code": 0, "data": 1}));
//! transport.reply_json(200, json!({"code": 0, "data": 2}));
//!
//! let gateway = RequestGateway::new(transport.clone());
//! // ... drive resources ...
//! assert_eq!(transport.calls().len(), 2);
//! ```

use super::error::TransportError;
use super::http::{RawResponse, Transport, TransportRequest};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A request the mock has seen
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl RecordedCall {
    /// First value of a query parameter
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

struct Scripted {
    outcome: Result<RawResponse, TransportError>,
    delay: Duration,
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<Scripted>,
    calls: Vec<RecordedCall>,
}

/// Scripted transport. Clones share the same script and call log.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, response: RawResponse) {
        self.push(Ok(response), Duration::ZERO);
    }

    pub fn reply_after(&self, delay: Duration, response: RawResponse) {
        self.push(Ok(response), delay);
    }

    pub fn reply_json(&self, status: u16, body: Value) {
        self.reply(RawResponse::new(status, body.to_string()));
    }

    pub fn reply_json_after(&self, delay: Duration, status: u16, body: Value) {
        self.reply_after(delay, RawResponse::new(status, body.to_string()));
    }

    /// Reply with `{code: 0, message: "", data}`
    pub fn reply_data(&self, data: Value) {
        self.reply_data_after(Duration::ZERO, data);
    }

    pub fn reply_data_after(&self, delay: Duration, data: Value) {
        let envelope = serde_json::json!({"code": 0, "message": "", "data": data});
        self.reply_json_after(delay, 200, envelope);
    }

    pub fn fail(&self, error: TransportError) {
        self.push(Err(error), Duration::ZERO);
    }

    pub fn fail_after(&self, delay: Duration, error: TransportError) {
        self.push(Err(error), delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn push(&self, outcome: Result<RawResponse, TransportError>, delay: Duration) {
        self.lock().replies.push_back(Scripted { outcome, delay });
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let scripted = {
            let mut state = self.lock();
            state.calls.push(RecordedCall {
                method: request.method.clone(),
                url: request.url.clone(),
                query: request.query.clone(),
                body: request.body.clone(),
                headers: request.headers.clone(),
            });
            state.replies.pop_front()
        };

        let Some(scripted) = scripted else {
            return Err(TransportError::NoResponse(format!(
                "no scripted reply for {} {}",
                request.method, request.url
            )));
        };

        tokio::select! {
            biased;
            _ = request.signal.cancelled() => Err(TransportError::Aborted),
            _ = tokio::time::sleep(scripted.delay) => scripted.outcome,
        }
    }
}
