use serde::{Deserialize, Serialize};

use crate::models::AccountId;

/// Session lifecycle changes, published to whoever holds a session handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// A token was obtained and the identity resolved.
    LoggedIn { account_id: AccountId, username: String },

    /// Username and/or email changed after a successful account update.
    IdentityUpdated {
        username: Option<String>,
        email: Option<String>,
    },

    /// Token and identity were discarded.
    LoggedOut,
}
