use leptos::prelude::*;

use crate::state::use_app_state;

/// Notification bell icon with unread count badge and dropdown panel. The
/// list is fed live by the notification channel, newest first.
#[component]
pub fn NotificationBell() -> impl IntoView {
    let app_state = use_app_state();
    let notifications = app_state.notifications;
    let unread_count = app_state.unread_count;

    let (open, set_open) = signal(false);

    let toggle_panel = move |_| {
        let will_open = !open.get();
        set_open.set(will_open);
        if will_open {
            unread_count.set(0);
        }
    };

    view! {
        <div class="notification-bell-container">
            <button
                class="notification-bell-btn"
                on:click=toggle_panel
                title="Notifications"
            >
                <span
                    class=(move || if unread_count.get() > 0 { "bell-icon bell-icon-ringing" } else { "bell-icon" })
                    inner_html=r#"<svg xmlns="http://www.w3.org/2000/svg" width="18" height="18" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M18 8A6 6 0 006 8c0 7-3 9-3 9h18s-3-2-3-9"/><path d="M13.73 21a2 2 0 01-3.46 0"/></svg>"#
                ></span>
                {move || {
                    let count = unread_count.get();
                    if count > 0 {
                        Some(view! {
                            <span class="notification-badge">{
                                if count > 99 { "99+".to_string() } else { count.to_string() }
                            }</span>
                        })
                    } else {
                        None
                    }
                }}
            </button>

            {move || open.get().then(|| view! {
                <div class="notification-panel">
                    <div class="notification-panel-header">
                        <span class="notification-panel-title">"Notifications"</span>
                    </div>
                    <div class="notification-panel-body">
                        {move || {
                            let list = notifications.get();
                            if list.is_empty() {
                                view! { <div class="notification-empty">"No notifications"</div> }.into_any()
                            } else {
                                view! {
                                    <div class="notification-list">
                                        {list.into_iter().map(|entry| {
                                            let kind_class = format!("notif-kind-{}", entry.payload.kind.to_lowercase());
                                            view! {
                                                <div class="notification-item">
                                                    <span class={format!("notif-kind-badge {kind_class}")}>
                                                        {entry.payload.kind.clone()}
                                                    </span>
                                                    <div class="notif-content">
                                                        <div class="notif-title">{entry.payload.title.clone()}</div>
                                                        <div class="notif-message">{entry.payload.body.clone()}</div>
                                                        <div class="notif-meta">
                                                            <span class="notif-time">{format_time_ago(entry.received_at)}</span>
                                                        </div>
                                                    </div>
                                                </div>
                                            }
                                        }).collect::<Vec<_>>()}
                                    </div>
                                }.into_any()
                            }
                        }}
                    </div>
                </div>
            })}
        </div>
    }
}

/// Simple time-ago formatter.
fn format_time_ago(received_at: chrono::DateTime<chrono::Utc>) -> String {
    let secs = chrono::Utc::now()
        .signed_duration_since(received_at)
        .num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}
