// =============================================================================
// session_tests.rs - credential store and gateway tests for am-leptos-ui
//
// Exercises the localStorage-backed credential slot and the 401
// refresh-and-replay pipeline against a scripted HTTP transport. Runs via
// wasm-bindgen-test in a headless browser.
//
// Run with:
//   cd app/leptos-ui && wasm-pack test --headless --chrome
// =============================================================================

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use async_trait::async_trait;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

use am_api_types::{LoginResponse, UserInfo};
use am_leptos_ui::auth::SessionStore;
use am_leptos_ui::gateway::{bearer_header, Gateway, GatewayError, HttpReply, HttpTransport};

// =============================================================================
// Test helpers
// =============================================================================

#[derive(Debug, Clone)]
struct RecordedCall {
    method: String,
    url: String,
    bearer: Option<String>,
}

/// Transport that serves canned replies keyed by URL path, in order, and
/// records every call. Yields to the scheduler once per call so concurrent
/// requests interleave the way real fetches do.
struct ScriptedTransport {
    replies: RefCell<HashMap<String, VecDeque<HttpReply>>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            replies: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
        })
    }

    fn script(&self, path: &str, replies: Vec<HttpReply>) {
        self.replies
            .borrow_mut()
            .insert(path.to_string(), replies.into_iter().collect());
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    fn calls_to(&self, path: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.url.ends_with(path))
            .count()
    }
}

#[async_trait(?Send)]
impl HttpTransport for ScriptedTransport {
    async fn execute(
        &self,
        method: &str,
        url: &str,
        bearer: Option<&str>,
        _body: Option<String>,
    ) -> Result<HttpReply, GatewayError> {
        self.calls.borrow_mut().push(RecordedCall {
            method: method.to_string(),
            url: url.to_string(),
            bearer: bearer.map(|b| b.to_string()),
        });

        // Yield once so concurrent callers interleave.
        gloo_timers::future::TimeoutFuture::new(0).await;

        let mut replies = self.replies.borrow_mut();
        let queue = replies
            .iter_mut()
            .find(|(path, _)| url.ends_with(path.as_str()))
            .map(|(_, q)| q);
        match queue.and_then(|q| q.pop_front()) {
            Some(reply) => Ok(reply),
            None => Err(GatewayError::Network(format!("unscripted call to {url}"))),
        }
    }
}

fn reply(status: u16, body: &str) -> HttpReply {
    HttpReply {
        status,
        body: body.to_string(),
    }
}

fn test_user() -> UserInfo {
    UserInfo {
        id: 42,
        display_name: "Kim".into(),
        role: "USER".into(),
    }
}

fn seed_login(store: &SessionStore, access: &str, refresh: &str) {
    store
        .store_login(&LoginResponse {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            user: test_user(),
        })
        .unwrap();
}

fn raw_storage_item(key: &str) -> Option<String> {
    web_sys::window()
        .unwrap()
        .local_storage()
        .unwrap()
        .unwrap()
        .get_item(key)
        .unwrap()
}

/// Gateway wired to the scripted transport; the expiry hook sets a flag
/// instead of navigating away from the test page.
fn test_gateway(transport: Rc<ScriptedTransport>) -> (Gateway, Rc<Cell<bool>>) {
    let store = SessionStore::new();
    let expired = Rc::new(Cell::new(false));
    let expired_flag = expired.clone();
    let gateway = Gateway::new("http://test.local", store, transport)
        .with_expiry_hook(move || expired_flag.set(true));
    (gateway, expired)
}

// =============================================================================
// Credential store tests
// =============================================================================

mod credential_store {
    use super::*;

    #[wasm_bindgen_test]
    fn refresh_swaps_the_token_pair_atomically() {
        let store = SessionStore::new();
        store.clear();
        seed_login(&store, "old-a", "old-r");

        store.store_tokens("new-a1", "new-r1").unwrap();

        // Both reads observe the new pair together; the identity survives.
        assert_eq!(store.access_token().as_deref(), Some("new-a1"));
        assert_eq!(store.refresh_token().as_deref(), Some("new-r1"));
        assert_eq!(store.user().unwrap().id, 42);
    }

    #[wasm_bindgen_test]
    fn clear_removes_all_three_keys() {
        let store = SessionStore::new();
        seed_login(&store, "a", "r");

        store.clear();

        assert!(raw_storage_item("accessToken").is_none());
        assert!(raw_storage_item("refreshToken").is_none());
        assert!(raw_storage_item("userInfo").is_none());
        // And again: clearing an empty store is fine.
        store.clear();
    }

    #[wasm_bindgen_test]
    fn load_requires_a_complete_credential() {
        let store = SessionStore::new();
        store.clear();
        web_sys::window()
            .unwrap()
            .local_storage()
            .unwrap()
            .unwrap()
            .set_item("accessToken", "orphan")
            .unwrap();

        assert!(store.load().is_none());

        let store2 = SessionStore::new();
        store2.clear();
        seed_login(&store2, "a", "r");
        let credential = store2.load().unwrap();
        assert_eq!(credential.access_token, "a");
        assert_eq!(credential.refresh_token, "r");
        assert_eq!(credential.user.display_name, "Kim");
    }
}

// =============================================================================
// Gateway pipeline tests
// =============================================================================

mod gateway_pipeline {
    use super::*;

    #[wasm_bindgen_test]
    async fn attaches_the_same_bearer_on_repeated_sends() {
        let transport = ScriptedTransport::new();
        transport.script("/api/products", vec![reply(200, "[]"), reply(200, "[]")]);
        let (gateway, _) = test_gateway(transport.clone());
        gateway.store().clear();
        seed_login(gateway.store(), "a1", "r1");

        gateway.send("GET", "/api/products", None).await.unwrap();
        gateway.send("GET", "/api/products", None).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].bearer.as_deref(), Some("a1"));
        assert_eq!(calls[1].bearer.as_deref(), Some("a1"));
        assert_eq!(bearer_header("a1"), bearer_header("a1"));
    }

    #[wasm_bindgen_test]
    async fn anonymous_send_attaches_nothing() {
        let transport = ScriptedTransport::new();
        transport.script("/api/products", vec![reply(200, "[]")]);
        let (gateway, _) = test_gateway(transport.clone());
        gateway.store().clear();

        gateway.send("GET", "/api/products", None).await.unwrap();

        assert_eq!(transport.calls()[0].bearer, None);
    }

    #[wasm_bindgen_test]
    async fn refresh_and_replay_once_on_401() {
        // Scenario: expired access token, valid refresh token.
        let transport = ScriptedTransport::new();
        transport.script(
            "/api/user/info",
            vec![
                reply(401, ""),
                reply(200, r#"{"id":42,"displayName":"Kim","role":"USER"}"#),
            ],
        );
        transport.script(
            "/api/user/refresh",
            vec![reply(200, r#"{"accessToken":"new-a1","refreshToken":"new-r1"}"#)],
        );
        let (gateway, expired) = test_gateway(transport.clone());
        gateway.store().clear();
        seed_login(gateway.store(), "expired", "valid-r1");

        let user: UserInfo = gateway.get_json("/api/user/info").await.unwrap();

        assert_eq!(user.id, 42);
        assert_eq!(gateway.store().access_token().as_deref(), Some("new-a1"));
        assert_eq!(gateway.store().refresh_token().as_deref(), Some("new-r1"));
        assert!(!expired.get());

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].bearer.as_deref(), Some("expired"));
        assert_eq!(calls[1].url, "http://test.local/api/user/refresh");
        assert_eq!(calls[1].bearer.as_deref(), Some("valid-r1"));
        // Replay carries the new access token, attached explicitly.
        assert_eq!(calls[2].bearer.as_deref(), Some("new-a1"));
    }

    #[wasm_bindgen_test]
    async fn second_401_after_refresh_is_surfaced_not_looped() {
        let transport = ScriptedTransport::new();
        transport.script("/api/user/info", vec![reply(401, ""), reply(401, "")]);
        transport.script(
            "/api/user/refresh",
            vec![reply(200, r#"{"accessToken":"new-a1","refreshToken":"new-r1"}"#)],
        );
        let (gateway, expired) = test_gateway(transport.clone());
        gateway.store().clear();
        seed_login(gateway.store(), "a1", "r1");

        let err = gateway.send("GET", "/api/user/info", None).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        // Exactly one refresh, exactly one replay, then stop.
        assert_eq!(transport.calls_to("/api/user/refresh"), 1);
        assert_eq!(transport.calls_to("/api/user/info"), 2);
        assert!(!expired.get());
    }

    #[wasm_bindgen_test]
    async fn missing_refresh_token_fails_without_calling_backend() {
        let transport = ScriptedTransport::new();
        transport.script("/api/user/info", vec![reply(401, "")]);
        let (gateway, expired) = test_gateway(transport.clone());
        gateway.store().clear();
        // Access token only: the refresh half is gone.
        web_sys::window()
            .unwrap()
            .local_storage()
            .unwrap()
            .unwrap()
            .set_item("accessToken", "expired")
            .unwrap();

        let err = gateway.send("GET", "/api/user/info", None).await.unwrap_err();

        assert!(matches!(err, GatewayError::SessionExpired));
        assert_eq!(transport.calls_to("/api/user/refresh"), 0);
        assert!(raw_storage_item("accessToken").is_none());
        assert!(expired.get());
    }

    #[wasm_bindgen_test]
    async fn rejected_refresh_clears_store_and_fires_expiry() {
        let transport = ScriptedTransport::new();
        transport.script("/api/user/info", vec![reply(401, "")]);
        transport.script("/api/user/refresh", vec![reply(401, "invalid refresh token")]);
        let (gateway, expired) = test_gateway(transport.clone());
        gateway.store().clear();
        seed_login(gateway.store(), "a1", "stale-r1");

        let err = gateway.send("GET", "/api/user/info", None).await.unwrap_err();

        // Caller sees the refresh error AND the session is torn down.
        assert_eq!(err.status(), Some(401));
        assert!(expired.get());
        assert!(raw_storage_item("accessToken").is_none());
        assert!(raw_storage_item("refreshToken").is_none());
        assert!(raw_storage_item("userInfo").is_none());
    }

    #[wasm_bindgen_test]
    async fn non_401_errors_pass_through_unchanged() {
        let transport = ScriptedTransport::new();
        transport.script("/api/user/info", vec![reply(500, "boom")]);
        let (gateway, expired) = test_gateway(transport.clone());
        gateway.store().clear();
        seed_login(gateway.store(), "a1", "r1");

        let err = gateway.send("GET", "/api/user/info", None).await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.calls_to("/api/user/refresh"), 0);
        assert_eq!(gateway.store().access_token().as_deref(), Some("a1"));
        assert!(!expired.get());
    }

    #[wasm_bindgen_test]
    async fn concurrent_401s_share_a_single_refresh() {
        let transport = ScriptedTransport::new();
        transport.script(
            "/api/user/info",
            vec![
                reply(401, ""),
                reply(200, r#"{"id":42,"displayName":"Kim","role":"USER"}"#),
            ],
        );
        transport.script("/api/orders", vec![reply(401, ""), reply(200, "[]")]);
        // One scripted refresh: a second refresh attempt would find the
        // queue empty and fail the test.
        transport.script(
            "/api/user/refresh",
            vec![reply(200, r#"{"accessToken":"new-a1","refreshToken":"new-r1"}"#)],
        );
        let (gateway, expired) = test_gateway(transport.clone());
        gateway.store().clear();
        seed_login(gateway.store(), "expired", "valid-r1");

        let (info, orders) = futures::join!(
            gateway.send("GET", "/api/user/info", None),
            gateway.send("GET", "/api/orders", None),
        );

        assert!(info.is_ok());
        assert!(orders.is_ok());
        assert_eq!(transport.calls_to("/api/user/refresh"), 1);
        assert!(!expired.get());
        assert_eq!(gateway.store().access_token().as_deref(), Some("new-a1"));
    }

    #[wasm_bindgen_test]
    async fn login_populates_the_store_anonymously() {
        let transport = ScriptedTransport::new();
        transport.script(
            "/api/user/login",
            vec![reply(
                200,
                r#"{"accessToken":"a1","refreshToken":"r1","user":{"id":42,"displayName":"Kim","role":"USER"}}"#,
            )],
        );
        let (gateway, _) = test_gateway(transport.clone());
        gateway.store().clear();

        let user = gateway.login("kim@example.com", "hunter2").await.unwrap();

        assert_eq!(user.id, 42);
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].bearer, None);
        let credential = gateway.store().load().unwrap();
        assert_eq!(credential.access_token, "a1");
        assert_eq!(credential.refresh_token, "r1");
    }
}
