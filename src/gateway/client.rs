//! Request Gateway
//!
//! Merges request configs over the base configuration, hands them to a
//! [`Transport`], unwraps the response envelope and classifies failures.

use super::error::RequestError;
use super::http::{sanitize_for_log, RawResponse, ReqwestTransport, Transport, TransportRequest};
use super::request::{
    flatten_query, join_url, GatewayConfig, Params, RequestConfig, ResponseEnvelope,
};
use crate::notification::{NotificationCenter, Notifier, NotifyLevel};
use anyhow::Result;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Overridable gateway behavior
pub trait GatewayHooks: Send + Sync {
    /// Turn a nonstandard response body into a `{code, message, data}`
    /// envelope. Identity by default.
    fn normalize_response(&self, body: Value) -> Value {
        body
    }

    /// Called once per 401 response
    fn on_auth_failed(&self, error: &RequestError) {
        tracing::warn!("Authentication failed: {}", error);
    }
}

/// Hooks with the default behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl GatewayHooks for DefaultHooks {}

/// Issues requests and returns the unwrapped `data` of the envelope
#[derive(Clone)]
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    hooks: Arc<dyn GatewayHooks>,
    notifier: Arc<dyn Notifier>,
    base: GatewayConfig,
}

impl RequestGateway {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            hooks: Arc::new(DefaultHooks),
            notifier: Arc::new(NotificationCenter::new()),
            base: GatewayConfig::default(),
        }
    }

    /// Gateway over a reqwest transport
    pub fn http(base: GatewayConfig) -> Result<Self> {
        Ok(Self::new(ReqwestTransport::new()?).with_base(base))
    }

    pub fn with_base(mut self, base: GatewayConfig) -> Self {
        self.base = base;
        self
    }

    pub fn with_hooks(mut self, hooks: impl GatewayHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn base(&self) -> &GatewayConfig {
        &self.base
    }

    /// Send a request and return the envelope's `data`.
    ///
    /// Failures other than cancellation and 401 are reported to the notifier
    /// exactly once before being returned.
    pub async fn send(&self, config: RequestConfig) -> Result<Value, RequestError> {
        let config = config.with_defaults(&self.base);
        tracing::debug!(
            "Request config: {} {:?}",
            config.method.as_ref().unwrap_or(&Method::GET),
            config.url
        );

        match self.dispatch(config).await {
            Ok(data) => Ok(data),
            Err(error) => Err(self.report(error)),
        }
    }

    pub async fn get(&self, url: &str, query: Option<Params>) -> Result<Value, RequestError> {
        let mut config = RequestConfig::get(url);
        config.query = query;
        self.send(config).await
    }

    pub async fn post(&self, url: &str, body: Option<Value>) -> Result<Value, RequestError> {
        let mut config = RequestConfig::post(url);
        config.body = body;
        self.send(config).await
    }

    pub async fn put(&self, url: &str, body: Option<Value>) -> Result<Value, RequestError> {
        let mut config = RequestConfig::put(url);
        config.body = body;
        self.send(config).await
    }

    pub async fn delete(&self, url: &str, query: Option<Params>) -> Result<Value, RequestError> {
        let mut config = RequestConfig::delete(url);
        config.query = query;
        self.send(config).await
    }

    async fn dispatch(&self, config: RequestConfig) -> Result<Value, RequestError> {
        let request = build_request(config)?;
        let signal = request.signal.clone();
        if signal.is_cancelled() {
            return Err(RequestError::Cancelled);
        }

        let response = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(RequestError::Cancelled),
            response = self.transport.send(request) => response?,
        };

        self.unwrap_response(response)
    }

    fn unwrap_response(&self, response: RawResponse) -> Result<Value, RequestError> {
        if response.status == 401 {
            return Err(RequestError::AuthFailure);
        }

        if !response.is_success() {
            return Err(RequestError::ServerError {
                status: response.status,
                message: server_message(&response.body),
            });
        }

        // Handle empty response
        let body = if response.body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&response.body).map_err(|e| {
                tracing::error!(
                    "Failed to parse response JSON: {} - {}",
                    e,
                    sanitize_for_log(&response.body)
                );
                RequestError::ServerError {
                    status: response.status,
                    message: None,
                }
            })?
        };

        if body.is_null() {
            return Ok(Value::Null);
        }

        let envelope: ResponseEnvelope =
            serde_json::from_value(self.hooks.normalize_response(body)).map_err(|e| {
                tracing::error!("Malformed response envelope: {}", e);
                RequestError::ServerError {
                    status: response.status,
                    message: None,
                }
            })?;

        Ok(envelope.data)
    }

    /// Report a failure raised by a resource before its request could be
    /// dispatched, exactly as if the gateway had raised it
    pub(crate) fn report_local(&self, error: RequestError) -> RequestError {
        self.report(error)
    }

    fn report(&self, error: RequestError) -> RequestError {
        if !error.is_handled() {
            tracing::error!("Request failed: {:?}", error);
            self.notifier.notify(NotifyLevel::Error, &error.to_string());
        } else if error.is_cancelled() {
            tracing::debug!("Request cancelled");
        } else {
            self.hooks.on_auth_failed(&error);
        }
        error
    }
}

fn build_request(config: RequestConfig) -> Result<TransportRequest, RequestError> {
    let Some(url) = config.url.as_deref() else {
        return Err(RequestError::ClientError("Request URL is missing".to_string()));
    };

    Ok(TransportRequest {
        method: config.method.clone().unwrap_or(Method::GET),
        url: join_url(config.base_url.as_deref(), url),
        query: config.query.as_ref().map(flatten_query).unwrap_or_default(),
        body: config.body,
        headers: config.headers,
        timeout: config.timeout,
        signal: config.signal.unwrap_or_else(CancellationToken::new),
    })
}

/// `message` of an error body shaped like the envelope, if it carries one
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
