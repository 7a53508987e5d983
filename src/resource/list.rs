//! List Store
//!
//! Paginated collection state and the cancellation-safe fetch protocol.
//!
//! `Idle -> Fetching -> {Ready | Errored} -> Fetching -> ...`
//!
//! Every fetch mints a new token and cancels the previous one before the
//! request starts. When a fetch settles it commits only if its token is
//! still current, so overlapping `set_search`/`set_pagination` calls resolve
//! last-call-wins regardless of response order.

use super::cell::StateCell;
use super::mutation::send_tracked;
use super::page::{shallow_merge, to_object, PageData, PaginationPatch, PaginationQuery};
use super::token::{RequestToken, Settled, TokenSlot};
use super::value::{AsyncValuable, Valuable};
use crate::gateway::{Params, RequestConfig, RequestError, RequestGateway};
use crate::registry::{Injectable, InjectionKey, LIST_STORE_KEY};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Borrowed view of the state a fetch query is built from
pub struct FetchState<'a, S, I> {
    pub initial_params: &'a I,
    pub search: &'a S,
    pub pagination: &'a PaginationQuery,
}

type QueryBuilder<S, I> = Arc<dyn Fn(FetchState<'_, S, I>) -> Params + Send + Sync>;
type ConfigHook = Arc<dyn Fn() -> RequestConfig + Send + Sync>;
type ResponseTransform = Arc<dyn Fn(Value) -> PageData<Value> + Send + Sync>;
type ItemsTransform<T> = Arc<dyn Fn(Vec<Value>) -> Vec<T> + Send + Sync>;

pub struct ListOptions<T, S = Params, I = Params> {
    url: Valuable<String, I>,
    initial_params: Option<AsyncValuable<I>>,
    default_search: Option<AsyncValuable<S, I>>,
    pagination: PaginationQuery,
    create_fetch_query: Option<QueryBuilder<S, I>>,
    fetch_config: Option<ConfigHook>,
    transform_response: Option<ResponseTransform>,
    transform_items: Option<ItemsTransform<T>>,
    post_fetch: Option<Arc<dyn Fn() + Send + Sync>>,
    immediate: bool,
}

impl<T, S, I> ListOptions<T, S, I> {
    /// `url` may be a literal or a function of the initial params
    pub fn new(url: impl Into<Valuable<String, I>>) -> Self {
        Self {
            url: url.into(),
            initial_params: None,
            default_search: None,
            pagination: PaginationQuery::default(),
            create_fetch_query: None,
            fetch_config: None,
            transform_response: None,
            transform_items: None,
            post_fetch: None,
            immediate: true,
        }
    }

    pub fn initial_params(mut self, params: impl Into<AsyncValuable<I>>) -> Self {
        self.initial_params = Some(params.into());
        self
    }

    /// Search applied before the first fetch; may depend on the initial params
    pub fn default_search(mut self, search: impl Into<AsyncValuable<S, I>>) -> Self {
        self.default_search = Some(search.into());
        self
    }

    pub fn pagination(mut self, pagination: PaginationQuery) -> Self {
        self.pagination = pagination;
        self
    }

    /// Replace the default `initial_params + search + pagination` merge
    pub fn create_fetch_query(
        mut self,
        builder: impl Fn(FetchState<'_, S, I>) -> Params + Send + Sync + 'static,
    ) -> Self {
        self.create_fetch_query = Some(Arc::new(builder));
        self
    }

    pub fn fetch_config(
        mut self,
        hook: impl Fn() -> RequestConfig + Send + Sync + 'static,
    ) -> Self {
        self.fetch_config = Some(Arc::new(hook));
        self
    }

    /// Map a nonstandard payload onto `{items, page, size, total}`
    pub fn transform_response(
        mut self,
        transform: impl Fn(Value) -> PageData<Value> + Send + Sync + 'static,
    ) -> Self {
        self.transform_response = Some(Arc::new(transform));
        self
    }

    pub fn transform_items(
        mut self,
        transform: impl Fn(Vec<Value>) -> Vec<T> + Send + Sync + 'static,
    ) -> Self {
        self.transform_items = Some(Arc::new(transform));
        self
    }

    pub fn post_fetch(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.post_fetch = Some(Arc::new(hook));
        self
    }

    /// Whether `initialize` fetches right away. Defaults to `true`.
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListStatus {
    #[default]
    Idle,
    Fetching,
    Ready,
    Errored,
}

#[derive(Debug)]
pub struct ListState<T, S, I> {
    pub initial_params: StateCell<I>,
    pub search: StateCell<S>,
    pub pagination: StateCell<PaginationQuery>,
    pub data: StateCell<PageData<T>>,
    pub loading: StateCell<bool>,
    pub error: StateCell<Option<RequestError>>,
    pub status: StateCell<ListStatus>,
}

struct ListInner<T, S, I> {
    gateway: RequestGateway,
    options: ListOptions<T, S, I>,
    state: ListState<T, S, I>,
    token: TokenSlot,
}

impl<T, S, I> Drop for ListInner<T, S, I> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Store for one paginated collection. Clones share state.
pub struct ListResource<T, S = Params, I = Params> {
    inner: Arc<ListInner<T, S, I>>,
}

impl<T, S, I> Clone for ListResource<T, S, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S, I> ListResource<T, S, I>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    S: Serialize + Clone + Default + Send + Sync + 'static,
    I: Serialize + Clone + Default + Send + Sync + 'static,
{
    /// Build the store without touching the network
    pub fn new(gateway: RequestGateway, options: ListOptions<T, S, I>) -> Self {
        let state = ListState {
            initial_params: StateCell::new(I::default()),
            search: StateCell::new(S::default()),
            pagination: StateCell::new(options.pagination),
            data: StateCell::new(PageData::default()),
            loading: StateCell::new(false),
            error: StateCell::new(None),
            status: StateCell::new(ListStatus::Idle),
        };

        Self {
            inner: Arc::new(ListInner {
                gateway,
                options,
                state,
                token: TokenSlot::new(),
            }),
        }
    }

    /// Build and [`initialize`](Self::initialize) in one go
    pub async fn create(gateway: RequestGateway, options: ListOptions<T, S, I>) -> Self {
        let list = Self::new(gateway, options);
        list.initialize().await;
        list
    }

    /// Resolve initial params and default search, then fetch unless
    /// `immediate(false)` was set. Returns the fetch outcome if one ran.
    pub async fn initialize(&self) -> Option<Settled> {
        let options = &self.inner.options;
        let state = &self.inner.state;

        if let Some(initial) = &options.initial_params {
            state.initial_params.set(initial.get().await);
        }

        if let Some(search) = &options.default_search {
            let initial_params = state.initial_params.get();
            state.search.set(search.resolve(&initial_params).await);
        }

        if options.immediate {
            Some(self.fetch().await)
        } else {
            None
        }
    }

    pub fn state(&self) -> &ListState<T, S, I> {
        &self.inner.state
    }

    pub fn data(&self) -> PageData<T> {
        self.inner.state.data.get()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.loading.get()
    }

    pub fn error(&self) -> Option<RequestError> {
        self.inner.state.error.get()
    }

    pub fn status(&self) -> ListStatus {
        self.inner.state.status.get()
    }

    pub fn search(&self) -> S {
        self.inner.state.search.get()
    }

    pub fn pagination(&self) -> PaginationQuery {
        self.inner.state.pagination.get()
    }

    pub fn initial_params(&self) -> I {
        self.inner.state.initial_params.get()
    }

    /// Fetch the current page, superseding any fetch in flight
    pub async fn fetch(&self) -> Settled {
        let inner = &self.inner;
        let state = &inner.state;

        let token = inner.token.issue();
        state.status.set(ListStatus::Fetching);
        state.error.set(None);
        state.loading.set(true);

        let result = self.request_page(&token).await;

        if !inner.token.is_current(&token) {
            tracing::debug!("[list] discarding superseded fetch #{}", token.generation());
            return Settled::Superseded;
        }

        let settled = match result {
            Ok(page) => {
                tracing::debug!(
                    "[list] fetch #{} committed {} of {} items",
                    token.generation(),
                    page.items.len(),
                    page.total
                );
                state.data.set(page);
                state.status.set(ListStatus::Ready);
                Settled::Applied
            }
            Err(RequestError::Cancelled) => {
                state.status.set(ListStatus::Idle);
                Settled::Superseded
            }
            Err(error) => {
                tracing::warn!("[list] fetch #{} failed: {}", token.generation(), error);
                state.error.set(Some(error));
                state.status.set(ListStatus::Errored);
                Settled::Failed
            }
        };
        state.loading.set(false);

        if settled.is_applied() {
            if let Some(hook) = &inner.options.post_fetch {
                hook();
            }
        }
        settled
    }

    /// Replace the search wholesale, go back to the first page and fetch
    pub async fn set_search(&self, search: S) -> Settled {
        let state = &self.inner.state;
        state.search.set(search);
        state.pagination.update(|p| p.page = 0);
        self.fetch().await
    }

    /// Merge a patch (or a function of the current pagination) and fetch
    pub async fn set_pagination(
        &self,
        value: impl Into<Valuable<PaginationPatch, PaginationQuery>>,
    ) -> Settled {
        let state = &self.inner.state;
        let current = state.pagination.get();
        let patch = value.into().resolve(&current);
        state.pagination.set(current.apply(patch));
        self.fetch().await
    }

    /// Replace the initial params. Does not fetch.
    pub fn set_initial_params(&self, initial_params: I) {
        self.inner.state.initial_params.set(initial_params);
    }

    /// Query for the current state: the caller's builder if given, otherwise
    /// `initial_params`, `search` and `pagination` merged in that order.
    pub fn fetch_query(&self) -> Result<Params, RequestError> {
        let state = &self.inner.state;
        let initial_params = state.initial_params.get();
        let search = state.search.get();
        let pagination = state.pagination.get();

        if let Some(builder) = &self.inner.options.create_fetch_query {
            return Ok(builder(FetchState {
                initial_params: &initial_params,
                search: &search,
                pagination: &pagination,
            }));
        }

        Ok(shallow_merge([
            to_object(&initial_params)?,
            to_object(&search)?,
            to_object(&pagination)?,
        ]))
    }

    async fn request_page(&self, token: &RequestToken) -> Result<PageData<T>, RequestError> {
        let options = &self.inner.options;
        let url = options.url.resolve(&self.inner.state.initial_params.get());
        let query = self
            .fetch_query()
            .map_err(|e| self.inner.gateway.report_local(e))?;

        let mut config = RequestConfig::get(url).query(query);
        if let Some(hook) = &options.fetch_config {
            config = config.merge(hook());
        }

        let data = send_tracked(&self.inner.gateway, config, token).await?;
        self.decode_page(data)
    }

    fn decode_page(&self, data: Value) -> Result<PageData<T>, RequestError> {
        let options = &self.inner.options;

        let page = match &options.transform_response {
            Some(transform) => transform(data),
            None => serde_json::from_value::<PageData<Value>>(data).map_err(|e| {
                RequestError::ClientError(format!("Unexpected page shape: {}", e))
            })?,
        };

        let items = match &options.transform_items {
            Some(transform) => transform(page.items),
            None => page
                .items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<T>, _>>()
                .map_err(|e| RequestError::ClientError(format!("Unexpected item shape: {}", e)))?,
        };

        Ok(PageData {
            items,
            page: page.page,
            size: page.size,
            total: page.total,
        })
    }
}

impl<T, S, I> Injectable for ListResource<T, S, I> {
    fn injection_key(&self) -> Option<InjectionKey> {
        Some(LIST_STORE_KEY)
    }
}
