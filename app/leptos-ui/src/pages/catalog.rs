use leptos::prelude::*;
use leptos::task::spawn_local;
use send_wrapper::SendWrapper;

use am_api_types::ProductSummary;

use crate::api;
use crate::state::use_gateway;

#[component]
pub fn CatalogPage() -> impl IntoView {
    let gateway = SendWrapper::new(use_gateway());

    let (products, set_products) = signal(Vec::<ProductSummary>::new());
    let (loading, set_loading) = signal(true);
    let (error_msg, set_error_msg) = signal(Option::<String>::None);

    let gateway_refresh = gateway.clone();
    let do_refresh = move || {
        set_loading.set(true);
        set_error_msg.set(None);
        let gateway = gateway_refresh.clone();
        spawn_local(async move {
            match api::fetch_products(&gateway).await {
                Ok(data) => set_products.set(data),
                Err(e) => set_error_msg.set(Some(format!("Failed to fetch products: {e}"))),
            }
            set_loading.set(false);
        });
    };

    do_refresh();

    view! {
        <div class="page-header">
            <h2>"Products"</h2>
            <button class="refresh-btn" on:click=move |_| do_refresh()>
                "\u{21BB} Refresh"
            </button>
        </div>

        {move || error_msg.get().map(|msg| view! {
            <div class="catalog-error">{msg}</div>
        })}

        {move || loading.get().then(|| view! {
            <div class="catalog-loading">"Loading..."</div>
        })}

        <div class="product-grid">
            {move || products.get().into_iter().map(|p| {
                let gateway = gateway.clone();
                let product_id = p.id;
                let add_to_cart = move |_| {
                    let gateway = gateway.clone();
                    spawn_local(async move {
                        if let Err(e) = api::add_cart_item(&gateway, product_id, 1).await {
                            web_sys::console::warn_1(&format!("add to cart failed: {e}").into());
                        }
                    });
                };
                view! {
                    <div class="product-card">
                        {p.thumbnail_url.clone().map(|url| view! {
                            <img class="product-thumb" src=url alt=p.name.clone() />
                        })}
                        <div class="product-name">{p.name.clone()}</div>
                        <div class="product-price">{format!("{}원", p.price)}</div>
                        <button class="add-cart-btn" on:click=add_to_cart>"Add to cart"</button>
                    </div>
                }
            }).collect::<Vec<_>>()}
        </div>
    }
}
