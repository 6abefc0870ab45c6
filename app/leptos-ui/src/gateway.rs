//! Request gateway: attaches the bearer credential to every outbound call
//! and makes access-token expiry invisible to callers via a single
//! refresh-and-replay cycle.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

use am_api_types::{LoginRequest, LoginResponse, RefreshResponse, UserInfo};

use crate::auth::SessionStore;

pub const API_BASE: &str = "http://localhost:8080";

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("session expired")]
    SessionExpired,
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One raw HTTP exchange: status plus body text, regardless of outcome.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam between the gateway and the browser's fetch machinery, so the
/// refresh-and-replay pipeline can be driven by a scripted transport in
/// tests.
#[async_trait(?Send)]
pub trait HttpTransport {
    async fn execute(
        &self,
        method: &str,
        url: &str,
        bearer: Option<&str>,
        body: Option<String>,
    ) -> Result<HttpReply, GatewayError>;
}

/// Production transport over `window.fetch`.
pub struct FetchTransport;

#[async_trait(?Send)]
impl HttpTransport for FetchTransport {
    async fn execute(
        &self,
        method: &str,
        url: &str,
        bearer: Option<&str>,
        body: Option<String>,
    ) -> Result<HttpReply, GatewayError> {
        let opts = RequestInit::new();
        opts.set_method(method);
        if let Some(b) = &body {
            opts.set_body(&JsValue::from_str(b));
        }

        let request = Request::new_with_str_and_init(url, &opts).map_err(js_err)?;
        let headers = request.headers();
        headers.set("Accept", "application/json").map_err(js_err)?;
        if body.is_some() {
            headers
                .set("Content-Type", "application/json")
                .map_err(js_err)?;
        }
        if let Some(token) = bearer {
            headers
                .set("Authorization", &bearer_header(token))
                .map_err(js_err)?;
        }

        let window = web_sys::window().ok_or_else(|| GatewayError::Network("no global window".into()))?;
        let resp_value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_err)?;
        let resp: Response = resp_value.dyn_into().map_err(js_err)?;
        let text = JsFuture::from(resp.text().map_err(js_err)?)
            .await
            .map_err(js_err)?;

        Ok(HttpReply {
            status: resp.status(),
            body: text.as_string().unwrap_or_default(),
        })
    }
}

fn js_err(e: JsValue) -> GatewayError {
    GatewayError::Network(format!("{e:?}"))
}

/// Header value for a bearer token. Pure so attachment is trivially
/// repeatable: the same token always yields the same header.
pub fn bearer_header(token: &str) -> String {
    format!("Bearer {token}")
}

/// How many times the original call has been sent. Replay is only reachable
/// from the first attempt, so at-most-one-retry holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt(u8);

impl Attempt {
    pub const FIRST: Attempt = Attempt(0);

    pub fn replay(self) -> Attempt {
        Attempt(self.0 + 1)
    }

    pub fn can_replay(self) -> bool {
        self.0 == 0
    }
}

type RefreshFuture = Shared<LocalBoxFuture<'static, Result<String, GatewayError>>>;

/// The credential gateway. Cheap to clone; all clones share the credential
/// store and the in-flight refresh slot.
#[derive(Clone)]
pub struct Gateway {
    base_url: String,
    store: SessionStore,
    transport: Rc<dyn HttpTransport>,
    // Single-flight guard: concurrent 401s await the same refresh instead of
    // racing the rotating refresh token.
    refresh_in_flight: Rc<RefCell<Option<RefreshFuture>>>,
    on_session_expired: Rc<dyn Fn()>,
}

impl Gateway {
    pub fn new(base_url: &str, store: SessionStore, transport: Rc<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.to_string(),
            store,
            transport,
            refresh_in_flight: Rc::new(RefCell::new(None)),
            on_session_expired: Rc::new(redirect_to_login),
        }
    }

    /// Replace the session-expiry side effect (default: full-page navigation
    /// to `/login`). The app layer also tears down its reactive session
    /// state here; tests observe the hook instead of navigating.
    pub fn with_expiry_hook(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_session_expired = Rc::new(hook);
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Send a request through the credential pipeline.
    ///
    /// The current access token is attached when present (anonymous calls
    /// are valid). A 401 on the first attempt triggers one refresh and one
    /// replay with the new token attached explicitly; a 401 on the replay is
    /// surfaced unchanged. Every non-401 error status passes through to the
    /// caller untouched.
    pub async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
    ) -> Result<HttpReply, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = Attempt::FIRST;
        let mut bearer = self.store.access_token();

        loop {
            let reply = self
                .transport
                .execute(method, &url, bearer.as_deref(), body.clone())
                .await?;

            if reply.status == 401 && attempt.can_replay() {
                let token = self.refresh().await?;
                bearer = Some(token);
                attempt = attempt.replay();
                continue;
            }

            return into_result(reply);
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let reply = self.send("GET", path, None).await?;
        decode(&reply.body)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let body = serde_json::to_string(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let reply = self.send("POST", path, Some(body)).await?;
        decode(&reply.body)
    }

    /// Obtain a new token pair, deduplicating concurrent callers onto one
    /// in-flight refresh. Resolves to the new access token.
    async fn refresh(&self) -> Result<String, GatewayError> {
        let fut = {
            let mut slot = self.refresh_in_flight.borrow_mut();
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fut = run_refresh(
                        self.store.clone(),
                        self.transport.clone(),
                        self.base_url.clone(),
                        self.refresh_in_flight.clone(),
                        self.on_session_expired.clone(),
                    )
                    .boxed_local()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    /// Authenticate and populate the credential store. Issued directly on
    /// the transport: a login rejection is terminal, never a refresh
    /// trigger.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserInfo, GatewayError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let body =
            serde_json::to_string(&request).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let url = format!("{}/api/user/login", self.base_url);
        let reply = self.transport.execute("POST", &url, None, Some(body)).await?;
        let reply = into_result(reply)?;
        let login: LoginResponse = decode(&reply.body)?;
        self.store
            .store_login(&login)
            .map_err(GatewayError::Storage)?;
        Ok(login.user)
    }

    /// Drop the local credential. No backend call is involved.
    pub fn logout(&self) {
        self.store.clear();
    }
}

/// The actual refresh exchange. Runs at most once per in-flight cycle; the
/// slot is emptied before the result is handed to waiters, so the next 401
/// after settlement starts a fresh cycle.
async fn run_refresh(
    store: SessionStore,
    transport: Rc<dyn HttpTransport>,
    base_url: String,
    slot: Rc<RefCell<Option<RefreshFuture>>>,
    on_session_expired: Rc<dyn Fn()>,
) -> Result<String, GatewayError> {
    let result = exchange_refresh_token(&store, transport, &base_url).await;
    slot.borrow_mut().take();

    if let Err(e) = &result {
        web_sys::console::warn_1(&format!("[session] refresh failed, ending session: {e}").into());
        // Both effects, not one or the other: the store is wiped and the
        // caller still sees the refresh error.
        store.clear();
        on_session_expired();
    }
    result
}

async fn exchange_refresh_token(
    store: &SessionStore,
    transport: Rc<dyn HttpTransport>,
    base_url: &str,
) -> Result<String, GatewayError> {
    // No refresh token means the session cannot be recovered; do not call
    // the backend at all.
    let refresh_token = store.refresh_token().ok_or(GatewayError::SessionExpired)?;

    let url = format!("{base_url}/api/user/refresh");
    let reply = transport
        .execute("POST", &url, Some(&refresh_token), None)
        .await?;
    let reply = into_result(reply)?;

    let tokens: RefreshResponse = decode(&reply.body)?;
    store
        .store_tokens(&tokens.access_token, &tokens.refresh_token)
        .map_err(GatewayError::Storage)?;
    web_sys::console::log_1(&"[session] access token refreshed".into());
    Ok(tokens.access_token)
}

fn into_result(reply: HttpReply) -> Result<HttpReply, GatewayError> {
    if reply.is_success() {
        Ok(reply)
    } else {
        Err(GatewayError::Http {
            status: reply.status,
            message: reply.body,
        })
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Full-page navigation to the login surface.
pub fn redirect_to_login() {
    if let Some(window) = web_sys::window() {
        window.location().set_href("/login").ok();
    }
}
