use am_api_types::{LoginResponse, UserInfo};
use web_sys::Storage;

const ACCESS_TOKEN_KEY: &str = "accessToken";
const REFRESH_TOKEN_KEY: &str = "refreshToken";
const USER_INFO_KEY: &str = "userInfo";

/// A fully populated local credential: token pair plus the identity they
/// belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserInfo,
}

/// Handle to the persisted credential slot, backed by browser localStorage.
///
/// Constructed once and cloned into everything that reads or writes the
/// session (the request gateway and the notification channel), so tests can
/// stand one up without global wiring. Writes always replace the whole token
/// pair; the runtime is single-threaded, so no reader can observe a mix of
/// old and new tokens.
#[derive(Debug, Clone, Default)]
pub struct SessionStore;

impl SessionStore {
    pub fn new() -> Self {
        Self
    }

    fn storage(&self) -> Option<Storage> {
        web_sys::window()?.local_storage().ok()?
    }

    /// Rehydrate the credential at startup without a network round trip.
    /// Returns `None` unless both tokens and the identity are present.
    pub fn load(&self) -> Option<Credential> {
        let storage = self.storage()?;
        let access_token = storage.get_item(ACCESS_TOKEN_KEY).ok()??;
        let refresh_token = storage.get_item(REFRESH_TOKEN_KEY).ok()??;
        let user_json = storage.get_item(USER_INFO_KEY).ok()??;
        let user: UserInfo = serde_json::from_str(&user_json).ok()?;
        Some(Credential {
            access_token,
            refresh_token,
            user,
        })
    }

    pub fn access_token(&self) -> Option<String> {
        self.storage()?.get_item(ACCESS_TOKEN_KEY).ok()?
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage()?.get_item(REFRESH_TOKEN_KEY).ok()?
    }

    pub fn user(&self) -> Option<UserInfo> {
        let json = self.storage()?.get_item(USER_INFO_KEY).ok()??;
        serde_json::from_str(&json).ok()
    }

    /// Persist a successful login: both tokens and the identity.
    pub fn store_login(&self, login: &LoginResponse) -> Result<(), String> {
        let storage = self
            .storage()
            .ok_or_else(|| "localStorage unavailable".to_string())?;
        let user_json =
            serde_json::to_string(&login.user).map_err(|e| format!("serialize user: {e}"))?;
        storage
            .set_item(ACCESS_TOKEN_KEY, &login.access_token)
            .map_err(|_| "failed to write access token".to_string())?;
        storage
            .set_item(REFRESH_TOKEN_KEY, &login.refresh_token)
            .map_err(|_| "failed to write refresh token".to_string())?;
        storage
            .set_item(USER_INFO_KEY, &user_json)
            .map_err(|_| "failed to write user info".to_string())?;
        Ok(())
    }

    /// Replace the token pair after a refresh. Both keys are written in the
    /// same synchronous call, so the pair is swapped as a unit.
    pub fn store_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), String> {
        let storage = self
            .storage()
            .ok_or_else(|| "localStorage unavailable".to_string())?;
        storage
            .set_item(ACCESS_TOKEN_KEY, access_token)
            .map_err(|_| "failed to write access token".to_string())?;
        storage
            .set_item(REFRESH_TOKEN_KEY, refresh_token)
            .map_err(|_| "failed to write refresh token".to_string())?;
        Ok(())
    }

    /// Remove all three keys. Used on logout and on irrecoverable refresh
    /// failure; safe to call when already empty.
    pub fn clear(&self) {
        if let Some(storage) = self.storage() {
            storage.remove_item(ACCESS_TOKEN_KEY).ok();
            storage.remove_item(REFRESH_TOKEN_KEY).ok();
            storage.remove_item(USER_INFO_KEY).ok();
        }
    }
}
