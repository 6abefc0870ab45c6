use leptos::prelude::*;

pub mod api;
pub mod auth;
pub mod components;
pub mod events;
pub mod gateway;
pub mod pages;
pub mod state;

use std::rc::Rc;

use send_wrapper::SendWrapper;
use wasm_bindgen::prelude::*;

use auth::SessionStore;
use events::NotificationChannel;
use gateway::{redirect_to_login, FetchTransport, Gateway, API_BASE};
use state::{provide_app_state, provide_gateway, use_app_state, use_gateway};

#[component]
pub fn App() -> impl IntoView {
    let store = SessionStore::new();
    provide_app_state(&store);
    let app_state = use_app_state();
    let session = app_state.session;

    let gateway = Gateway::new(API_BASE, store, Rc::new(FetchTransport)).with_expiry_hook(move || {
        session.set(None);
        redirect_to_login();
    });
    provide_gateway(gateway);

    let channel = NotificationChannel::new(
        &api::notifications_ws_url(),
        app_state.channel_state,
        app_state.notifications,
        app_state.unread_count,
    );

    // The channel session follows the identity: one live session while
    // logged in, torn down on logout.
    let channel_effect = SendWrapper::new(channel.clone());
    Effect::new(move |_| match session.get() {
        Some(user) => channel_effect.connect(user.id),
        None => channel_effect.disconnect(),
    });

    let channel_cleanup = SendWrapper::new(channel);
    on_cleanup(move || {
        channel_cleanup.disconnect();
    });

    view! {
        {move || match session.get() {
            None => view! { <pages::login::LoginPage /> }.into_any(),
            Some(user) => view! {
                <HeaderBar display_name=user.display_name.clone() />
                <div class="content">
                    <pages::catalog::CatalogPage />
                </div>
            }.into_any(),
        }}
    }
}

#[component]
fn HeaderBar(display_name: String) -> impl IntoView {
    let app_state = use_app_state();
    let gateway = SendWrapper::new(use_gateway());

    let on_logout = move |_| {
        gateway.logout();
        app_state.session.set(None);
    };

    view! {
        <header class="shop-header">
            <span class="shop-title">"ampermart"</span>
            <span class="shop-user">{display_name}</span>
            <components::notification_bell::NotificationBell />
            <button class="logout-btn" on:click=on_logout>"Log out"</button>
        </header>
    }
}

#[wasm_bindgen(start)]
pub fn mount() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
