//! Edit Store
//!
//! Single-record create/update state and the load/submit protocol.
//!
//! `Idle -> Loading -> Ready -> Submitting -> {Ready | Errored}`
//!
//! Loads (`begin_add`, `begin_edit`, `reset`) and submits each have their
//! own token slot: a new load supersedes an older load, a new submit
//! supersedes an older submit, and neither cancels the other.

use super::cell::StateCell;
use super::mutation::send_tracked;
use super::token::{RequestToken, Settled, TokenSlot};
use super::value::{AsyncValuable, Valuable};
use crate::gateway::{Params, RequestConfig, RequestError, RequestGateway};
use crate::registry::{Injectable, InjectionKey, EDIT_STORE_KEY};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Context for the default draft factory
pub struct FormContext<I> {
    pub initial_params: I,
    pub action_params: Params,
}

/// Context for resolving the submit URL
pub struct SubmitContext<F> {
    pub action_params: Params,
    pub data: F,
    pub is_edit: bool,
}

type ConfigHook = Arc<dyn Fn() -> RequestConfig + Send + Sync>;
type FetchTransform<F> = Arc<dyn Fn(Value) -> F + Send + Sync>;
type RequestDataTransform<F, I> = Arc<dyn Fn(&F, &I) -> Value + Send + Sync>;
type SubmitHook = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

pub struct EditOptions<F, I = Params> {
    initial_params: Option<Valuable<I>>,
    default_form_data: Option<AsyncValuable<F, FormContext<I>>>,
    fetch_url: Option<Valuable<String, Params>>,
    fetch_config: Option<ConfigHook>,
    transform_fetch_response: Option<FetchTransform<F>>,
    submit_url: Option<Valuable<String, SubmitContext<F>>>,
    submit_config: Option<ConfigHook>,
    transform_form_data_to_request_data: Option<RequestDataTransform<F, I>>,
    pre_action: Option<Arc<dyn Fn() + Send + Sync>>,
    post_submit: Option<SubmitHook>,
}

impl<F, I> Default for EditOptions<F, I> {
    fn default() -> Self {
        Self {
            initial_params: None,
            default_form_data: None,
            fetch_url: None,
            fetch_config: None,
            transform_fetch_response: None,
            submit_url: None,
            submit_config: None,
            transform_form_data_to_request_data: None,
            pre_action: None,
            post_submit: None,
        }
    }
}

impl<F, I> EditOptions<F, I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_params(mut self, params: impl Into<Valuable<I>>) -> Self {
        self.initial_params = Some(params.into());
        self
    }

    /// Draft used by `begin_add`. Defaults to `F::default()`.
    pub fn default_form_data(
        mut self,
        factory: impl Into<AsyncValuable<F, FormContext<I>>>,
    ) -> Self {
        self.default_form_data = Some(factory.into());
        self
    }

    /// Where `begin_edit` loads the record from, given the action params.
    /// Without it the action params themselves become the draft.
    pub fn fetch_url(mut self, url: impl Into<Valuable<String, Params>>) -> Self {
        self.fetch_url = Some(url.into());
        self
    }

    pub fn fetch_config(mut self, hook: impl Fn() -> RequestConfig + Send + Sync + 'static) -> Self {
        self.fetch_config = Some(Arc::new(hook));
        self
    }

    pub fn transform_fetch_response(
        mut self,
        transform: impl Fn(Value) -> F + Send + Sync + 'static,
    ) -> Self {
        self.transform_fetch_response = Some(Arc::new(transform));
        self
    }

    pub fn submit_url(mut self, url: impl Into<Valuable<String, SubmitContext<F>>>) -> Self {
        self.submit_url = Some(url.into());
        self
    }

    /// Overrides for the submit request, e.g. a different method
    pub fn submit_config(
        mut self,
        hook: impl Fn() -> RequestConfig + Send + Sync + 'static,
    ) -> Self {
        self.submit_config = Some(Arc::new(hook));
        self
    }

    pub fn transform_form_data_to_request_data(
        mut self,
        transform: impl Fn(&F, &I) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.transform_form_data_to_request_data = Some(Arc::new(transform));
        self
    }

    pub fn pre_action(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.pre_action = Some(Arc::new(hook));
        self
    }

    /// Called exactly once per settled submit, with the response if any
    pub fn post_submit(mut self, hook: impl Fn(Option<&Value>) + Send + Sync + 'static) -> Self {
        self.post_submit = Some(Arc::new(hook));
        self
    }

    /// Run `hook` before the configured pre-action
    pub(crate) fn wrap_pre_action(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        let inner = self.pre_action.take();
        self.pre_action = Some(Arc::new(move || {
            hook();
            if let Some(inner) = &inner {
                inner();
            }
        }));
        self
    }

    /// Run `hook` before the configured post-submit callback
    pub(crate) fn wrap_post_submit(
        mut self,
        hook: impl Fn(Option<&Value>) + Send + Sync + 'static,
    ) -> Self {
        let inner = self.post_submit.take();
        self.post_submit = Some(Arc::new(move |response: Option<&Value>| {
            hook(response);
            if let Some(inner) = &inner {
                inner(response);
            }
        }));
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Submitting,
    Errored,
}

#[derive(Debug)]
pub struct EditState<F, I> {
    pub initial_params: StateCell<I>,
    pub action_params: StateCell<Params>,
    pub data: StateCell<F>,
    pub is_edit: StateCell<bool>,
    pub loading: StateCell<bool>,
    pub saving: StateCell<bool>,
    pub error: StateCell<Option<RequestError>>,
    pub submit_response: StateCell<Option<Value>>,
    pub status: StateCell<EditStatus>,
}

struct EditInner<F, I> {
    gateway: RequestGateway,
    options: EditOptions<F, I>,
    state: EditState<F, I>,
    load_token: TokenSlot,
    submit_token: TokenSlot,
}

impl<F, I> Drop for EditInner<F, I> {
    fn drop(&mut self) {
        self.load_token.cancel();
        self.submit_token.cancel();
    }
}

/// Store for one record being created or edited. Clones share state.
pub struct EditResource<F, I = Params> {
    inner: Arc<EditInner<F, I>>,
}

impl<F, I> Clone for EditResource<F, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F, I> EditResource<F, I>
where
    F: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static,
    I: Clone + Default + Send + Sync + 'static,
{
    pub fn new(gateway: RequestGateway, options: EditOptions<F, I>) -> Self {
        let initial_params = options
            .initial_params
            .as_ref()
            .map(|params| params.get())
            .unwrap_or_default();

        let state = EditState {
            initial_params: StateCell::new(initial_params),
            action_params: StateCell::new(Params::new()),
            data: StateCell::new(F::default()),
            is_edit: StateCell::new(false),
            loading: StateCell::new(false),
            saving: StateCell::new(false),
            error: StateCell::new(None),
            submit_response: StateCell::new(None),
            status: StateCell::new(EditStatus::Idle),
        };

        Self {
            inner: Arc::new(EditInner {
                gateway,
                options,
                state,
                load_token: TokenSlot::new(),
                submit_token: TokenSlot::new(),
            }),
        }
    }

    pub fn state(&self) -> &EditState<F, I> {
        &self.inner.state
    }

    /// Current draft
    pub fn data(&self) -> F {
        self.inner.state.data.get()
    }

    pub fn is_edit(&self) -> bool {
        self.inner.state.is_edit.get()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.loading.get()
    }

    pub fn saving(&self) -> bool {
        self.inner.state.saving.get()
    }

    pub fn error(&self) -> Option<RequestError> {
        self.inner.state.error.get()
    }

    pub fn status(&self) -> EditStatus {
        self.inner.state.status.get()
    }

    pub fn action_params(&self) -> Params {
        self.inner.state.action_params.get()
    }

    pub fn submit_response(&self) -> Option<Value> {
        self.inner.state.submit_response.get()
    }

    pub fn set_initial_params(&self, initial_params: I) {
        self.inner.state.initial_params.set(initial_params);
    }

    /// Edit the draft in place, as a bound form would
    pub fn update_data(&self, f: impl FnOnce(&mut F)) {
        self.inner.state.data.update(f);
    }

    pub fn set_data(&self, data: F) {
        self.inner.state.data.set(data);
    }

    /// Start creating a record. The draft comes from the default form data.
    pub async fn begin_add(&self, action_params: Option<Params>) -> Settled {
        self.pre_action();
        let state = &self.inner.state;
        state.is_edit.set(false);
        state.action_params.set(action_params.unwrap_or_default());
        self.load().await
    }

    /// Start editing a record. The draft is fetched from `fetch_url`, or
    /// deep-copied from `action_params` when no fetch URL is configured.
    pub async fn begin_edit(&self, action_params: Params) -> Settled {
        self.pre_action();
        let state = &self.inner.state;
        state.is_edit.set(true);
        state.action_params.set(action_params);
        self.load().await
    }

    /// Reload the draft for the current mode, discarding unsaved edits
    pub async fn reset(&self) -> Settled {
        self.load().await
    }

    /// Submit the draft: `PUT` when editing, `POST` when creating.
    ///
    /// Returns `Err` only for a missing `submit_url`, before any request is
    /// made. Request failures are recorded in `error`.
    pub async fn submit(&self) -> Result<Settled, RequestError> {
        let inner = &self.inner;
        let options = &inner.options;
        let state = &inner.state;

        let Some(submit_url) = &options.submit_url else {
            return Err(RequestError::Configuration("submit_url is required".to_string()));
        };

        let token = inner.submit_token.issue();
        state.status.set(EditStatus::Submitting);
        state.submit_response.set(None);
        state.error.set(None);
        state.saving.set(true);

        let result = self.send_submit(submit_url, &token).await;

        if !inner.submit_token.is_current(&token) {
            tracing::debug!("[edit] discarding superseded submit #{}", token.generation());
            return Ok(Settled::Superseded);
        }

        let (settled, status) = match result {
            Ok(response) => {
                state.submit_response.set(Some(response));
                (Settled::Applied, EditStatus::Ready)
            }
            Err(RequestError::Cancelled) => (Settled::Superseded, EditStatus::Ready),
            Err(error) => {
                tracing::warn!("[edit] submit #{} failed: {}", token.generation(), error);
                state.error.set(Some(error));
                (Settled::Failed, EditStatus::Errored)
            }
        };
        state.saving.set(false);

        // The hook observes the store still Submitting
        if settled != Settled::Superseded {
            if let Some(hook) = &options.post_submit {
                let response = state.submit_response.get();
                hook(response.as_ref());
            }
        }
        state.status.set(status);
        Ok(settled)
    }

    fn pre_action(&self) {
        let state = &self.inner.state;
        state.saving.set(false);
        state.data.set(F::default());
        if let Some(hook) = &self.inner.options.pre_action {
            hook();
        }
    }

    async fn load(&self) -> Settled {
        let inner = &self.inner;
        let state = &inner.state;

        let token = inner.load_token.issue();
        state.status.set(EditStatus::Loading);
        state.error.set(None);
        state.loading.set(true);

        let result = if state.is_edit.get() {
            self.fetch_form_data(&token).await
        } else {
            Ok(self.default_form_data().await)
        };

        if !inner.load_token.is_current(&token) {
            tracing::debug!("[edit] discarding superseded load #{}", token.generation());
            return Settled::Superseded;
        }

        let settled = match result {
            Ok(data) => {
                state.data.set(data);
                state.status.set(EditStatus::Ready);
                Settled::Applied
            }
            Err(RequestError::Cancelled) => {
                state.status.set(EditStatus::Ready);
                Settled::Superseded
            }
            Err(error) => {
                tracing::warn!("[edit] load #{} failed: {}", token.generation(), error);
                state.error.set(Some(error));
                state.status.set(EditStatus::Errored);
                Settled::Failed
            }
        };
        state.loading.set(false);
        settled
    }

    async fn default_form_data(&self) -> F {
        match &self.inner.options.default_form_data {
            Some(factory) => {
                let context = FormContext {
                    initial_params: self.inner.state.initial_params.get(),
                    action_params: self.inner.state.action_params.get(),
                };
                factory.resolve(&context).await
            }
            None => F::default(),
        }
    }

    async fn fetch_form_data(&self, token: &RequestToken) -> Result<F, RequestError> {
        let options = &self.inner.options;
        let action_params = self.inner.state.action_params.get();

        let Some(fetch_url) = &options.fetch_url else {
            // action_params is an owned copy; the draft shares nothing with it
            return serde_json::from_value(Value::Object(action_params)).map_err(|e| {
                RequestError::ClientError(format!("Action params do not fit the form: {}", e))
            });
        };

        let mut config = RequestConfig::get(fetch_url.resolve(&action_params));
        if let Some(hook) = &options.fetch_config {
            config = config.merge(hook());
        }

        let response = send_tracked(&self.inner.gateway, config, token).await?;
        match &options.transform_fetch_response {
            Some(transform) => Ok(transform(response)),
            None => serde_json::from_value(response).map_err(|e| {
                RequestError::ClientError(format!("Unexpected record shape: {}", e))
            }),
        }
    }

    async fn send_submit(
        &self,
        submit_url: &Valuable<String, SubmitContext<F>>,
        token: &RequestToken,
    ) -> Result<Value, RequestError> {
        let options = &self.inner.options;
        let state = &self.inner.state;
        let data = state.data.get();
        let is_edit = state.is_edit.get();

        let body = match &options.transform_form_data_to_request_data {
            Some(transform) => transform(&data, &state.initial_params.get()),
            None => serde_json::to_value(&data).map_err(|e| {
                self.inner.gateway.report_local(RequestError::ClientError(format!(
                    "Failed to serialize form data: {}",
                    e
                )))
            })?,
        };

        let url = submit_url.resolve(&SubmitContext {
            action_params: state.action_params.get(),
            data,
            is_edit,
        });
        let method = if is_edit { Method::PUT } else { Method::POST };

        let mut config = RequestConfig::new(method, url).body(body);
        if let Some(hook) = &options.submit_config {
            config = config.merge(hook());
        }

        send_tracked(&self.inner.gateway, config, token).await
    }
}

impl<F, I> Injectable for EditResource<F, I> {
    fn injection_key(&self) -> Option<InjectionKey> {
        Some(EDIT_STORE_KEY)
    }
}
