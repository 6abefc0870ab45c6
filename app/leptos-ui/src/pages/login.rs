use leptos::prelude::*;
use leptos::task::spawn_local;
use send_wrapper::SendWrapper;

use crate::api;
use crate::state::{use_app_state, use_gateway};

#[component]
pub fn LoginPage() -> impl IntoView {
    let app_state = use_app_state();
    let gateway = SendWrapper::new(use_gateway());

    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (error_msg, set_error_msg) = signal(Option::<String>::None);
    let (busy, set_busy) = signal(false);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if busy.get_untracked() {
            return;
        }
        set_busy.set(true);
        set_error_msg.set(None);

        let gateway = gateway.clone();
        spawn_local(async move {
            let result = api::login(
                &gateway,
                &email.get_untracked(),
                &password.get_untracked(),
            )
            .await;
            match result {
                Ok(user) => app_state.session.set(Some(user)),
                Err(e) => set_error_msg.set(Some(format!("Login failed: {e}"))),
            }
            set_busy.set(false);
        });
    };

    view! {
        <div class="login-page">
            <h2>"Sign in to ampermart"</h2>
            <form class="login-form" on:submit=on_submit>
                <input
                    type="email"
                    placeholder="Email"
                    prop:value=email
                    on:input=move |ev| set_email.set(event_target_value(&ev))
                />
                <input
                    type="password"
                    placeholder="Password"
                    prop:value=password
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                />
                <button type="submit" disabled=move || busy.get()>
                    {move || if busy.get() { "Signing in..." } else { "Sign in" }}
                </button>
            </form>
            {move || error_msg.get().map(|msg| view! {
                <div class="login-error">{msg}</div>
            })}
        </div>
    }
}
