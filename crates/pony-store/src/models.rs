//! Persisted session state. Key names are fixed so a session written by one
//! run is found by the next.

use anyhow::Result;

use crate::KeyValueStore;

pub const TOKEN_KEY: &str = "pony_express_token";
pub const USERNAME_KEY: &str = "username";
pub const EMAIL_KEY: &str = "email";
pub const ACCOUNT_ID_KEY: &str = "id";

pub const SESSION_KEYS: [&str; 4] = [TOKEN_KEY, USERNAME_KEY, EMAIL_KEY, ACCOUNT_ID_KEY];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub username: String,
    pub email: String,
    pub account_id: i64,
}

impl StoredSession {
    /// Read the stored session. A missing token means logged out; a token
    /// with a missing or corrupt account id is treated the same, since no
    /// command could be issued on its behalf.
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>> {
        let Some(token) = store.get(TOKEN_KEY)? else {
            return Ok(None);
        };
        let Some(account_id) = store.get(ACCOUNT_ID_KEY)?.and_then(|raw| raw.parse().ok()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            token,
            username: store.get(USERNAME_KEY)?.unwrap_or_default(),
            email: store.get(EMAIL_KEY)?.unwrap_or_default(),
            account_id,
        }))
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(TOKEN_KEY, &self.token)?;
        store.set(USERNAME_KEY, &self.username)?;
        store.set(EMAIL_KEY, &self.email)?;
        store.set(ACCOUNT_ID_KEY, &self.account_id.to_string())?;
        Ok(())
    }

    pub fn clear(store: &dyn KeyValueStore) -> Result<()> {
        store.remove_all(&SESSION_KEYS)
    }
}
