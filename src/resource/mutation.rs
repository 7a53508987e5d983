//! One-shot mutation requests
//!
//! [`MutationResource`] wraps a single request with the same last-call-wins
//! discipline as the list and edit stores. [`RemoveResource`] is the
//! `DELETE` flavor.

use super::cell::StateCell;
use super::token::{RequestToken, Settled, TokenSlot};
use super::value::Valuable;
use crate::gateway::{RequestConfig, RequestError, RequestGateway};
use crate::registry::{Injectable, InjectionKey, REMOVE_STORE_KEY};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Send `config` with `token`'s abort signal attached. The signal is set
/// last so caller-provided overrides can never detach it.
pub(crate) async fn send_tracked(
    gateway: &RequestGateway,
    config: RequestConfig,
    token: &RequestToken,
) -> Result<Value, RequestError> {
    gateway.send(config.signal(token.signal())).await
}

type ParamsHook<P> = Arc<dyn Fn(&P) + Send + Sync>;
type ResponseHook = Arc<dyn Fn(&Value) + Send + Sync>;

pub struct MutationOptions<P> {
    url: Valuable<String, P>,
    method: Method,
    request_config: Option<Valuable<RequestConfig, P>>,
    pre_request: Option<ParamsHook<P>>,
    post_request: Option<ResponseHook>,
}

impl<P> MutationOptions<P> {
    /// `POST` to `url` unless the request config says otherwise
    pub fn new(url: impl Into<Valuable<String, P>>) -> Self {
        Self {
            url: url.into(),
            method: Method::POST,
            request_config: None,
            pre_request: None,
            post_request: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Extra request configuration, e.g. a body built from the params
    pub fn request_config(mut self, config: impl Into<Valuable<RequestConfig, P>>) -> Self {
        self.request_config = Some(config.into());
        self
    }

    pub fn pre_request(mut self, hook: impl Fn(&P) + Send + Sync + 'static) -> Self {
        self.pre_request = Some(Arc::new(hook));
        self
    }

    /// Called with the response of every request that completes and is
    /// still current
    pub fn post_request(mut self, hook: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.post_request = Some(Arc::new(hook));
        self
    }
}

impl<P> From<RequestConfig> for Valuable<RequestConfig, P> {
    fn from(config: RequestConfig) -> Self {
        Valuable::Value(config)
    }
}

#[derive(Debug, Default)]
pub struct MutationState {
    pub loading: StateCell<bool>,
    /// Set once a request completed successfully
    pub finished: StateCell<bool>,
    pub response: StateCell<Option<Value>>,
    pub error: StateCell<Option<RequestError>>,
}

struct MutationInner<P> {
    gateway: RequestGateway,
    options: MutationOptions<P>,
    state: MutationState,
    token: TokenSlot,
}

impl<P> Drop for MutationInner<P> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct MutationResource<P> {
    inner: Arc<MutationInner<P>>,
}

impl<P> Clone for MutationResource<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Send + Sync + 'static> MutationResource<P> {
    pub fn new(gateway: RequestGateway, options: MutationOptions<P>) -> Self {
        Self {
            inner: Arc::new(MutationInner {
                gateway,
                options,
                state: MutationState::default(),
                token: TokenSlot::new(),
            }),
        }
    }

    pub fn state(&self) -> &MutationState {
        &self.inner.state
    }

    pub fn loading(&self) -> bool {
        self.inner.state.loading.get()
    }

    pub fn error(&self) -> Option<RequestError> {
        self.inner.state.error.get()
    }

    pub fn response(&self) -> Option<Value> {
        self.inner.state.response.get()
    }

    /// Issue the request for `params`, superseding any in-flight one
    pub async fn send(&self, params: P) -> Settled {
        let inner = &self.inner;
        let options = &inner.options;
        let state = &inner.state;

        let token = inner.token.issue();
        if let Some(hook) = &options.pre_request {
            hook(&params);
        }
        state.loading.set(true);
        state.finished.set(false);
        state.error.set(None);

        let url = options.url.resolve(&params);
        let mut config = RequestConfig::new(options.method.clone(), url);
        if let Some(extra) = &options.request_config {
            config = config.merge(extra.resolve(&params));
        }

        let result = send_tracked(&inner.gateway, config, &token).await;

        if !inner.token.is_current(&token) {
            tracing::debug!("Discarding superseded mutation #{}", token.generation());
            return Settled::Superseded;
        }

        let settled = match result {
            Ok(response) => {
                state.response.set(Some(response.clone()));
                state.finished.set(true);
                if let Some(hook) = &options.post_request {
                    hook(&response);
                }
                Settled::Applied
            }
            Err(RequestError::Cancelled) => Settled::Superseded,
            Err(error) => {
                tracing::warn!("Mutation failed: {}", error);
                state.error.set(Some(error));
                Settled::Failed
            }
        };
        state.loading.set(false);
        settled
    }
}

impl<P> Injectable for MutationResource<P> {}

/// A [`MutationResource`] that sends `DELETE` by default
pub struct RemoveResource<P> {
    request: MutationResource<P>,
}

impl<P> Clone for RemoveResource<P> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
        }
    }
}

impl<P: Send + Sync + 'static> RemoveResource<P> {
    /// The request config may still override the method
    pub fn new(gateway: RequestGateway, options: MutationOptions<P>) -> Self {
        Self {
            request: MutationResource::new(gateway, options.method(Method::DELETE)),
        }
    }

    pub async fn remove(&self, params: P) -> Settled {
        self.request.send(params).await
    }

    pub fn loading(&self) -> bool {
        self.request.loading()
    }

    pub fn state(&self) -> &MutationState {
        self.request.state()
    }
}

impl<P> Injectable for RemoveResource<P> {
    fn injection_key(&self) -> Option<InjectionKey> {
        Some(REMOVE_STORE_KEY)
    }
}
