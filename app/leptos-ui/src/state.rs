use leptos::prelude::*;
use send_wrapper::SendWrapper;

use am_api_types::UserInfo;

use crate::auth::SessionStore;
use crate::events::{ChannelState, NotificationEntry};
use crate::gateway::Gateway;

#[derive(Clone)]
pub struct AppState {
    /// The authenticated identity, rehydrated from the credential store at
    /// startup. `None` means anonymous.
    pub session: RwSignal<Option<UserInfo>>,
    /// In-app notification list, newest first.
    pub notifications: RwSignal<Vec<NotificationEntry>>,
    pub unread_count: RwSignal<u64>,
    pub channel_state: RwSignal<ChannelState>,
}

pub fn provide_app_state(store: &SessionStore) {
    let session = RwSignal::new(store.load().map(|c| c.user));
    let notifications = RwSignal::new(Vec::<NotificationEntry>::new());
    let unread_count = RwSignal::new(0u64);
    let channel_state = RwSignal::new(ChannelState::Disconnected);

    provide_context(AppState {
        session,
        notifications,
        unread_count,
        channel_state,
    });
}

pub fn use_app_state() -> AppState {
    expect_context::<AppState>()
}

// The gateway holds Rc internals; SendWrapper makes it context-safe in the
// single-threaded wasm runtime.
pub fn provide_gateway(gateway: Gateway) {
    provide_context(SendWrapper::new(gateway));
}

pub fn use_gateway() -> Gateway {
    expect_context::<SendWrapper<Gateway>>().take()
}
