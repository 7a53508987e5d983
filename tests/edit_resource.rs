//! Edit, remove and modal stores against a scripted transport

use reqwest::Method;
use resource_store::gateway::mock::MockTransport;
use resource_store::gateway::{Params, RequestGateway};
use resource_store::notification::NotificationCenter;
use resource_store::registry::{
    with_injection, Registry, RegistryError, EDIT_STORE_KEY, LIST_STORE_KEY, REMOVE_STORE_KEY,
};
use resource_store::resource::{
    EditModalResource, EditOptions, EditResource, EditStatus, ListOptions, ListResource,
    MutationOptions, RemoveResource, Settled, SubmitContext, Valuable,
};
use resource_store::RequestError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::watch;

/// Form whose draft can never be turned into a request body
#[derive(Debug, Clone, Default, Deserialize)]
struct Unsendable {
    #[allow(dead_code)]
    name: String,
}

impl Serialize for Unsendable {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("form holds an unsendable value"))
    }
}

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap_or_default()
}

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (count.clone(), count)
}

fn user_form(transport: &MockTransport, post_submit: Arc<AtomicUsize>) -> EditResource<Params> {
    EditResource::new(
        RequestGateway::new(transport.clone()),
        EditOptions::new()
            .submit_url(Valuable::from_fn(|ctx: &SubmitContext<Params>| {
                match ctx.action_params.get("id") {
                    Some(id) if ctx.is_edit => format!("/users/{}", id),
                    _ => "/users".to_string(),
                }
            }))
            .post_submit(move |_| {
                post_submit.fetch_add(1, Ordering::SeqCst);
            }),
    )
}

#[tokio::test]
async fn test_begin_edit_without_fetch_url_deep_copies() {
    let transport = MockTransport::new();
    let edit: EditResource<Params> =
        EditResource::new(RequestGateway::new(transport.clone()), EditOptions::new());
    let original = params(json!({"id": 5}));

    assert_eq!(edit.begin_edit(original.clone()).await, Settled::Applied);
    assert_eq!(edit.data(), original);

    edit.update_data(|draft| {
        draft.insert("id".into(), json!(6));
        draft.insert("name".into(), json!("x"));
    });

    assert_eq!(edit.action_params(), params(json!({"id": 5})));
    assert_eq!(original, params(json!({"id": 5})));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_submit_without_submit_url_is_configuration_error() {
    let transport = MockTransport::new();
    let edit: EditResource<Params> =
        EditResource::new(RequestGateway::new(transport.clone()), EditOptions::new());

    edit.begin_add(None).await;
    let err = edit.submit().await.unwrap_err();

    assert!(matches!(err, RequestError::Configuration(_)));
    assert_eq!(transport.call_count(), 0);
    assert!(!edit.saving());
}

#[tokio::test]
async fn test_add_posts_and_edit_puts() {
    let transport = MockTransport::new();
    transport.reply_data(json!({"id": 1}));
    transport.reply_data(json!({"id": 5}));
    let (post_submit, seen) = counter();
    let edit = user_form(&transport, post_submit);

    edit.begin_add(None).await;
    edit.set_data(params(json!({"name": "new"})));
    assert_eq!(edit.submit().await, Ok(Settled::Applied));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    edit.begin_edit(params(json!({"id": 5, "name": "old"}))).await;
    assert_eq!(edit.submit().await, Ok(Settled::Applied));
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    let calls = transport.calls();
    assert_eq!(calls[0].method, Method::POST);
    assert_eq!(calls[0].url, "/api/users");
    assert_eq!(calls[0].body, Some(json!({"name": "new"})));
    assert_eq!(calls[1].method, Method::PUT);
    assert_eq!(calls[1].url, "/api/users/5");
    assert_eq!(calls[1].body, Some(json!({"id": 5, "name": "old"})));
    assert_eq!(edit.submit_response(), Some(json!({"id": 5})));
}

#[tokio::test]
async fn test_failed_submit_keeps_draft_and_calls_post_submit_once() {
    let transport = MockTransport::new();
    transport.reply_json(400, json!({"code": 1, "message": "name taken"}));
    let (post_submit, seen) = counter();
    let notifications = Arc::new(NotificationCenter::new());
    let edit: EditResource<Params> = EditResource::new(
        RequestGateway::new(transport.clone()).with_notifier(notifications.clone()),
        EditOptions::new()
            .submit_url("/users")
            .post_submit(move |response| {
                assert!(response.is_none());
                post_submit.fetch_add(1, Ordering::SeqCst);
            }),
    );

    edit.begin_edit(params(json!({"id": 5, "name": "dup"}))).await;
    let settled = edit.submit().await.unwrap();

    assert_eq!(settled, Settled::Failed);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(edit.data(), params(json!({"id": 5, "name": "dup"})));
    assert!(edit.is_edit());
    assert!(!edit.saving());
    assert_eq!(edit.status(), EditStatus::Errored);
    assert_eq!(edit.error().map(|e| e.to_string()), Some("name taken".to_string()));
    assert_eq!(notifications.len(), 1);
}

#[tokio::test]
async fn test_unserializable_draft_fails_before_dispatch_and_is_notified() {
    let transport = MockTransport::new();
    let (post_submit, seen) = counter();
    let notifications = Arc::new(NotificationCenter::new());
    let edit: EditResource<Unsendable> = EditResource::new(
        RequestGateway::new(transport.clone()).with_notifier(notifications.clone()),
        EditOptions::new().submit_url("/users").post_submit(move |_| {
            post_submit.fetch_add(1, Ordering::SeqCst);
        }),
    );

    edit.begin_add(None).await;
    let settled = edit.submit().await;

    assert_eq!(settled, Ok(Settled::Failed));
    assert!(matches!(edit.error(), Some(RequestError::ClientError(_))));
    assert_eq!(notifications.len(), 1);
    assert_eq!(transport.call_count(), 0);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(edit.status(), EditStatus::Errored);
    assert!(!edit.saving());
}

#[tokio::test]
async fn test_post_submit_runs_before_status_settles() {
    let transport = MockTransport::new();
    transport.reply_data(json!({"id": 1}));
    transport.reply_json(500, json!({"code": 500, "message": "db down"}));
    let status: Arc<OnceLock<watch::Receiver<EditStatus>>> = Arc::new(OnceLock::new());
    let seen_by_hook = Arc::new(Mutex::new(Vec::new()));

    let hook_status = status.clone();
    let hook_seen = seen_by_hook.clone();
    let edit: EditResource<Params> = EditResource::new(
        RequestGateway::new(transport),
        EditOptions::new().submit_url("/users").post_submit(move |_| {
            if let Some(status) = hook_status.get() {
                hook_seen.lock().unwrap().push(*status.borrow());
            }
        }),
    );
    status.set(edit.state().status.subscribe()).unwrap();

    edit.begin_add(None).await;
    assert_eq!(edit.submit().await, Ok(Settled::Applied));
    assert_eq!(edit.status(), EditStatus::Ready);
    assert_eq!(edit.submit().await, Ok(Settled::Failed));
    assert_eq!(edit.status(), EditStatus::Errored);

    assert_eq!(
        *seen_by_hook.lock().unwrap(),
        vec![EditStatus::Submitting, EditStatus::Submitting]
    );
}

#[tokio::test]
async fn test_superseded_submit_is_discarded() {
    let transport = MockTransport::new();
    transport.reply_data_after(Duration::from_millis(200), json!({"id": "slow"}));
    transport.reply_data_after(Duration::from_millis(10), json!({"id": "fast"}));
    let (post_submit, seen) = counter();
    let edit = user_form(&transport, post_submit);
    edit.begin_add(None).await;

    let (first, second) = tokio::join!(edit.submit(), edit.submit());

    assert_eq!(first, Ok(Settled::Superseded));
    assert_eq!(second, Ok(Settled::Applied));
    assert_eq!(edit.submit_response(), Some(json!({"id": "fast"})));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_submit_does_not_cancel_load() {
    let transport = MockTransport::new();
    transport.reply_data_after(Duration::from_millis(100), json!({"id": 5, "name": "Jim"}));
    transport.reply_data(json!({"ok": true}));
    let edit: EditResource<Params> = EditResource::new(
        RequestGateway::new(transport.clone()),
        EditOptions::new().fetch_url("/users/5").submit_url("/users/5"),
    );

    let (loaded, submitted) = tokio::join!(edit.begin_edit(params(json!({"id": 5}))), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        edit.submit().await
    });

    assert_eq!(loaded, Settled::Applied);
    assert_eq!(submitted, Ok(Settled::Applied));
    assert_eq!(edit.data(), params(json!({"id": 5, "name": "Jim"})));
}

#[tokio::test]
async fn test_remove_sends_delete() {
    let transport = MockTransport::new();
    transport.reply_data(Value::Null);
    let remove: RemoveResource<u64> = RemoveResource::new(
        RequestGateway::new(transport.clone()),
        MutationOptions::new(Valuable::from_fn(|id: &u64| format!("/users/{}", id))),
    );

    assert_eq!(remove.remove(5).await, Settled::Applied);

    let call = &transport.calls()[0];
    assert_eq!(call.method, Method::DELETE);
    assert_eq!(call.url, "/api/users/5");
    assert!(!remove.loading());
}

#[tokio::test]
async fn test_modal_closes_after_submit() {
    let transport = MockTransport::new();
    transport.reply_data(json!({"id": 1}));
    let modal: EditModalResource<Params> = EditModalResource::new(
        RequestGateway::new(transport),
        EditOptions::new().submit_url("/users"),
    );

    modal.begin_add(None).await;
    assert!(modal.visible());
    modal.cancel();
    assert!(!modal.visible());

    modal.begin_edit(params(json!({"id": 1}))).await;
    assert!(modal.visible());
    modal.submit().await.unwrap();
    assert!(!modal.visible());
}

#[tokio::test]
async fn test_stores_are_published_to_descendants() {
    let transport = MockTransport::new();
    let gateway = RequestGateway::new(transport);
    let page = Registry::root();

    let list: ListResource<Value> =
        ListResource::new(gateway.clone(), ListOptions::new("/users").immediate(false));
    let edit: EditResource<Params> = EditResource::new(gateway.clone(), EditOptions::new());
    with_injection(&page, list.clone(), None).unwrap();
    with_injection(&page, edit, None).unwrap();

    let row = page.child();
    let found: ListResource<Value> = row.lookup(&LIST_STORE_KEY).unwrap();
    found.set_initial_params(params(json!({"org": 1})));
    assert_eq!(list.initial_params(), params(json!({"org": 1})));
    assert!(row.lookup::<EditResource<Params>>(&EDIT_STORE_KEY).is_ok());

    assert!(matches!(
        row.lookup::<RemoveResource<u64>>(&REMOVE_STORE_KEY),
        Err(RegistryError::NotFound(key)) if key == REMOVE_STORE_KEY
    ));
}
