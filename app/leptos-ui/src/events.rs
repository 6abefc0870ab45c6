//! Realtime notification channel: one WebSocket subscription per
//! authenticated identity, with automatic reconnect and OS-level
//! deduplication of re-delivered messages.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    CloseEvent, ErrorEvent, MessageEvent, Notification, NotificationOptions,
    NotificationPermission, WebSocket,
};

use am_api_types::NotificationPayload;

/// Lifecycle of the channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// Everything that can happen to a channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    ConnectRequested,
    HandshakeOk,
    TransportClosed,
    RetryDue,
    DisconnectRequested,
}

/// State transition function. Events that make no sense in the current
/// state leave it unchanged.
pub fn transition(state: ChannelState, event: ChannelEvent) -> ChannelState {
    use ChannelEvent::*;
    use ChannelState::*;
    match (state, event) {
        (_, DisconnectRequested) => Closed,
        (Disconnected | Closed, ConnectRequested) => Connecting,
        (Connecting, HandshakeOk) => Connected,
        (Connecting | Connected, TransportClosed) => Reconnecting,
        (Reconnecting, RetryDue) => Connecting,
        (other, _) => other,
    }
}

/// Reconnect delay policy: capped exponential backoff, 1s doubling up to a
/// 16s ceiling. Attempts are unbounded; only an explicit disconnect stops
/// the channel, so it recovers from arbitrarily long outages.
pub fn backoff_delay_ms(attempt: u32) -> u32 {
    1000u32 << attempt.saturating_sub(1).min(4)
}

/// The per-identity broker destination the channel subscribes to.
pub fn queue_destination(user_id: i64) -> String {
    format!("/user/{user_id}/queue/notifications")
}

/// Tag for the native OS notification. Re-delivery of the same underlying
/// event (e.g. after a reconnect-triggered resend) collapses at the OS
/// instead of stacking pop-ups.
pub fn notification_tag(correlated_entity_id: i64) -> String {
    format!("notification-{correlated_entity_id}")
}

/// One notification as held by the UI, newest first. Never mutated after
/// creation.
#[derive(Debug, Clone)]
pub struct NotificationEntry {
    pub id: String,
    pub payload: NotificationPayload,
    pub received_at: DateTime<Utc>,
}

struct ChannelInner {
    ws_url: String,
    backoff: Cell<fn(u32) -> u32>,
    state: RwSignal<ChannelState>,
    notifications: RwSignal<Vec<NotificationEntry>>,
    unread_count: RwSignal<u64>,
    user_id: Cell<Option<i64>>,
    reconnect_attempt: Cell<u32>,
    // Cleared by disconnect(); the reconnect loop checks it after every
    // suspension point.
    active: Cell<bool>,
    // Bumped on every connect() and disconnect(). Socket callbacks and
    // pending reconnect timers capture the generation they were armed
    // under and bail out when it no longer matches, so leftovers from an
    // earlier session can never touch the current one.
    generation: Cell<u64>,
    socket: RefCell<Option<WebSocket>>,
}

/// Owns the live transport + subscription for one identity. Cheap to clone;
/// all clones drive the same session.
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Rc<ChannelInner>,
}

impl NotificationChannel {
    pub fn new(
        ws_url: &str,
        state: RwSignal<ChannelState>,
        notifications: RwSignal<Vec<NotificationEntry>>,
        unread_count: RwSignal<u64>,
    ) -> Self {
        Self {
            inner: Rc::new(ChannelInner {
                ws_url: ws_url.to_string(),
                backoff: Cell::new(backoff_delay_ms),
                state,
                notifications,
                unread_count,
                user_id: Cell::new(None),
                reconnect_attempt: Cell::new(0),
                active: Cell::new(false),
                generation: Cell::new(0),
                socket: RefCell::new(None),
            }),
        }
    }

    /// Swap in a different delay policy. Takes effect for every reconnect
    /// scheduled afterwards, on this handle and all clones.
    pub fn with_backoff(self, backoff: fn(u32) -> u32) -> Self {
        self.inner.backoff.set(backoff);
        self
    }

    pub fn state(&self) -> ChannelState {
        self.inner.state.get_untracked()
    }

    /// How many reconnects have been scheduled since the last successful
    /// handshake (or since `connect`).
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.reconnect_attempt.get()
    }

    /// Identifier of the current session. Changes on every `connect` and
    /// `disconnect`.
    pub fn session_generation(&self) -> u64 {
        self.inner.generation.get()
    }

    /// Open the channel for `user_id`. No-op when a live session for the
    /// same identity already exists; a session for another identity is torn
    /// down first.
    pub fn connect(&self, user_id: i64) {
        if self.inner.active.get() {
            if self.inner.user_id.get() == Some(user_id) {
                return;
            }
            self.disconnect();
        }

        self.inner.user_id.set(Some(user_id));
        self.inner.reconnect_attempt.set(0);
        self.inner.active.set(true);
        self.inner.generation.set(self.inner.generation.get() + 1);
        self.dispatch(ChannelEvent::ConnectRequested);
        request_native_permission();
        self.open_socket();
    }

    /// Tear down the session. Idempotent; the only way the channel stops
    /// retrying.
    pub fn disconnect(&self) {
        self.inner.active.set(false);
        self.inner.generation.set(self.inner.generation.get() + 1);
        if let Some(ws) = self.inner.socket.borrow_mut().take() {
            ws.close().ok();
        }
        self.dispatch(ChannelEvent::DisconnectRequested);
        web_sys::console::log_1(&"[channel] disconnected".into());
    }

    fn dispatch(&self, event: ChannelEvent) {
        self.inner.state.update(|s| *s = transition(*s, event));
    }

    fn open_socket(&self) {
        if !self.inner.active.get() {
            return;
        }
        let generation = self.inner.generation.get();

        let ws = match WebSocket::new(&self.inner.ws_url) {
            Ok(ws) => ws,
            Err(_) => {
                self.dispatch(ChannelEvent::TransportClosed);
                self.schedule_reconnect();
                return;
            }
        };
        *self.inner.socket.borrow_mut() = Some(ws.clone());

        // On open: subscribe to the per-identity queue.
        {
            let channel = self.clone();
            let onopen = Closure::wrap(Box::new(move |_: JsValue| {
                if channel.inner.generation.get() != generation {
                    return;
                }
                channel.inner.reconnect_attempt.set(0);
                channel.dispatch(ChannelEvent::HandshakeOk);
                channel.send_subscribe();
                web_sys::console::log_1(&"[channel] connected".into());
            }) as Box<dyn FnMut(JsValue)>);
            ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
            onopen.forget();
        }

        // On message
        {
            let channel = self.clone();
            let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| {
                if channel.inner.generation.get() != generation {
                    return;
                }
                if let Some(text) = e.data().as_string() {
                    channel.on_message(&text);
                }
            }) as Box<dyn FnMut(MessageEvent)>);
            ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
            onmessage.forget();
        }

        // On error -- the close event that follows drives the reconnect.
        {
            let onerror = Closure::wrap(Box::new(move |_: ErrorEvent| {
                web_sys::console::warn_1(&"[channel] transport error".into());
            }) as Box<dyn FnMut(ErrorEvent)>);
            ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            onerror.forget();
        }

        // On close -- reconnect unless the session this socket belonged to
        // is gone (disconnect, or a later connect).
        {
            let channel = self.clone();
            let onclose = Closure::wrap(Box::new(move |_: CloseEvent| {
                if !channel.inner.active.get() || channel.inner.generation.get() != generation {
                    return;
                }
                web_sys::console::log_1(&"[channel] transport closed, will reconnect".into());
                channel.dispatch(ChannelEvent::TransportClosed);
                channel.schedule_reconnect();
            }) as Box<dyn FnMut(CloseEvent)>);
            ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
            onclose.forget();
        }
    }

    fn send_subscribe(&self) {
        let Some(user_id) = self.inner.user_id.get() else {
            return;
        };
        let frame = format!(
            r#"{{"type":"subscribe","destination":"{}"}}"#,
            queue_destination(user_id)
        );
        if let Some(ws) = self.inner.socket.borrow().as_ref() {
            ws.send_with_str(&frame).ok();
        }
    }

    fn schedule_reconnect(&self) {
        let attempt = self.inner.reconnect_attempt.get() + 1;
        self.inner.reconnect_attempt.set(attempt);
        let delay_ms = (self.inner.backoff.get())(attempt);
        web_sys::console::log_1(
            &format!("[channel] reconnect attempt {attempt} in {delay_ms}ms").into(),
        );

        let generation = self.inner.generation.get();
        let channel = self.clone();
        spawn_local(async move {
            gloo_timers::future::TimeoutFuture::new(delay_ms).await;
            channel.resume_reconnect(generation);
        });
    }

    /// Continuation of a scheduled reconnect delay. A timer armed for an
    /// earlier session must not touch the current one: `active` alone is
    /// not enough, since a later `connect` sets it again.
    pub fn resume_reconnect(&self, generation: u64) {
        if !self.inner.active.get() || self.inner.generation.get() != generation {
            return;
        }
        self.dispatch(ChannelEvent::RetryDue);
        self.open_socket();
    }

    /// Deliver one inbound frame. A malformed frame is logged and dropped;
    /// the channel keeps running.
    pub fn on_message(&self, text: &str) {
        let payload = match serde_json::from_str::<NotificationPayload>(text) {
            Ok(payload) => payload,
            Err(e) => {
                web_sys::console::warn_1(&format!("[channel] dropping malformed frame: {e}").into());
                return;
            }
        };

        let entry = NotificationEntry {
            id: uuid::Uuid::new_v4().to_string(),
            payload: payload.clone(),
            received_at: Utc::now(),
        };
        self.inner.notifications.update(|list| list.insert(0, entry));
        self.inner.unread_count.update(|n| *n += 1);

        show_native_notification(&payload);
    }
}

/// Ask for OS notification permission if the user has not decided yet.
/// Denial is non-fatal: the in-app list keeps working either way.
fn request_native_permission() {
    if Notification::permission() == NotificationPermission::Default {
        if let Ok(promise) = Notification::request_permission() {
            spawn_local(async move {
                let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
            });
        }
    }
}

fn show_native_notification(payload: &NotificationPayload) {
    if Notification::permission() != NotificationPermission::Granted {
        return;
    }
    let opts = NotificationOptions::new();
    opts.set_body(&payload.body);
    opts.set_tag(&notification_tag(payload.correlated_entity_id));
    Notification::new_with_options(&payload.title, &opts).ok();
}
