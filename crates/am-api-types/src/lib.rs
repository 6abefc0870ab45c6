//! Shared API contract types for the ampermart storefront client.
//!
//! These mirror the backend's JSON payloads. Soft fields carry
//! `#[serde(default)]` so a partial payload never fails deserialization;
//! the backend contract is external and fixed.

use serde::{Deserialize, Serialize};

// ── Identity / credential types ──

/// The authenticated user, as returned by login and persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserInfo,
}

/// Token pair returned by `POST /api/user/refresh`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

// ── Notification wire payload ──

/// Body of one inbound frame on the per-user notification queue.
///
/// `kind` is the discriminator (`"QNA_REPLY"`, `"ORDER_SHIPPED"`, ...);
/// `correlated_entity_id` identifies the backend entity the notification is
/// about and keys OS-level deduplication on redelivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub kind: String,
    pub correlated_entity_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

// ── Opaque feature DTOs (catalog / orders, consumed through the gateway) ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total_price: i64,
    #[serde(default)]
    pub ordered_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_deserialize() {
        let json = r#"{
            "accessToken": "a1",
            "refreshToken": "r1",
            "user": { "id": 42, "displayName": "Kim", "role": "USER" }
        }"#;
        let resp: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.access_token, "a1");
        assert_eq!(resp.refresh_token, "r1");
        assert_eq!(resp.user.id, 42);
        assert_eq!(resp.user.display_name, "Kim");
        assert_eq!(resp.user.role, "USER");
    }

    #[test]
    fn refresh_response_deserialize() {
        let json = r#"{ "accessToken": "new-a1", "refreshToken": "new-r1" }"#;
        let resp: RefreshResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.access_token, "new-a1");
        assert_eq!(resp.refresh_token, "new-r1");
    }

    #[test]
    fn notification_payload_deserialize() {
        let json = r#"{ "kind": "QNA_REPLY", "correlatedEntityId": 7, "title": "답변 등록" }"#;
        let p: NotificationPayload = serde_json::from_str(json).unwrap();
        assert_eq!(p.kind, "QNA_REPLY");
        assert_eq!(p.correlated_entity_id, 7);
        assert_eq!(p.title, "답변 등록");
        assert_eq!(p.body, ""); // default
    }

    #[test]
    fn notification_payload_requires_discriminator() {
        // A frame without the discriminator field must not parse.
        let json = r#"{ "correlatedEntityId": 7, "title": "x" }"#;
        assert!(serde_json::from_str::<NotificationPayload>(json).is_err());
    }

    #[test]
    fn user_info_roundtrip_for_storage() {
        let user = UserInfo {
            id: 9,
            display_name: "Lee".into(),
            role: "ADMIN".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        let back: UserInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn product_summary_tolerates_partial_payload() {
        let p: ProductSummary = serde_json::from_str(r#"{ "id": 3, "name": "Kettle" }"#).unwrap();
        assert_eq!(p.id, 3);
        assert_eq!(p.price, 0);
        assert!(p.thumbnail_url.is_none());
    }
}
