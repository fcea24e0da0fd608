use serde::{Deserialize, Serialize};

use crate::models::{Account, AccountId, Chat, Message};

// -- Envelopes --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatsResponse {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub chats: Vec<Chat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsResponse {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub accounts: Vec<Account>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

// -- Auth --

/// Form fields for `POST /auth/token`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Form fields for `POST /auth/registration`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// `GET /accounts/me`. The email is required here, unlike the public view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAccount {
    pub id: AccountId,
    pub username: String,
    pub email: String,
}

// -- Chats --

#[derive(Debug, Clone, Serialize)]
pub struct CreateChatRequest {
    pub name: String,
    pub owner_id: AccountId,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinChatRequest {
    pub account_id: AccountId,
}

// -- Messages --

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub text: String,
    pub account_id: AccountId,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditMessageRequest {
    pub text: String,
}

// -- Account settings --

/// `PUT /accounts/me`. Absent fields are left unchanged by the server and are
/// never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateAccountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UpdateAccountRequest {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

/// Form fields for `PUT /accounts/me/password`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePasswordForm {
    pub old_password: String,
    pub new_password: String,
}
