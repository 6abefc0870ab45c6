//! Feature API surface. Every call here goes through the credential
//! gateway; the payload shapes are external backend contracts mirrored in
//! `am-api-types`.

use am_api_types::{OrderSummary, ProductSummary, UserInfo};

use crate::gateway::{Gateway, GatewayError, API_BASE};

pub async fn login(gateway: &Gateway, email: &str, password: &str) -> Result<UserInfo, GatewayError> {
    gateway.login(email, password).await
}

pub async fn fetch_profile(gateway: &Gateway) -> Result<UserInfo, GatewayError> {
    gateway.get_json("/api/user/info").await
}

pub async fn fetch_products(gateway: &Gateway) -> Result<Vec<ProductSummary>, GatewayError> {
    gateway.get_json("/api/products").await
}

pub async fn fetch_orders(gateway: &Gateway) -> Result<Vec<OrderSummary>, GatewayError> {
    gateway.get_json("/api/orders").await
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct AddCartItemRequest {
    product_id: i64,
    quantity: u32,
}

pub async fn add_cart_item(
    gateway: &Gateway,
    product_id: i64,
    quantity: u32,
) -> Result<serde_json::Value, GatewayError> {
    let body = AddCartItemRequest {
        product_id,
        quantity,
    };
    gateway.post_json("/api/cart/items", &body).await
}

/// Return the WebSocket URL for the notification broker.
pub fn notifications_ws_url() -> String {
    let ws_base = API_BASE.replace("http://", "ws://").replace("https://", "wss://");
    format!("{ws_base}/ws/notifications")
}
