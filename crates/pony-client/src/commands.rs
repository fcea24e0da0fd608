use serde_json::Value;
use tracing::{info, warn};

use pony_api::{ApiError, ApiRequest, Transport, accounts, auth, chats, decode, messages};
use pony_store::StoredSession;
use pony_types::api::{
    CreateChatRequest, CurrentAccount, EditMessageRequest, JoinChatRequest, LoginForm, SendMessageRequest,
    TokenResponse, UpdateAccountRequest,
};
use pony_types::models::{ChatId, MessageId};

use crate::PonyClient;
use crate::forms::{PasswordChange, Registration};
use crate::queries::QueryKey;

/// `None` if `value` is blank or equal to `current`; the server is only told
/// about real changes.
fn changed_field(value: &str, current: Option<&str>) -> Option<String> {
    if value.trim().is_empty() || Some(value) == current {
        None
    } else {
        Some(value.to_string())
    }
}

impl<T: Transport> PonyClient<T> {
    /// Send `request` with the session token. Fails without sending when
    /// logged out.
    async fn send_authed(&self, command: &str, request: ApiRequest) -> Result<Value, ApiError> {
        let (token, _) = self.session.credentials()?;
        self.transport
            .send(request.bearer(Some(&token)))
            .await
            .inspect_err(|e| warn!("{} failed: {}", command, e))
    }

    pub async fn create_chat(&self, name: &str) -> Result<(), ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("Chat name is required".into()));
        }
        let (_, owner_id) = self.session.credentials()?;

        let request = chats::create(&CreateChatRequest {
            name: name.to_string(),
            owner_id,
        })?;
        self.send_authed("create chat", request).await?;

        self.cache.invalidate(&QueryKey::Chats);
        info!("Created chat {:?}", name);
        Ok(())
    }

    /// Join `chat_id` as the logged-in account. On success `is_member` is set.
    /// Messages of the chat are not refetched: joining does not change them.
    pub async fn join_chat(&self, chat_id: ChatId, is_member: &mut bool) -> Result<(), ApiError> {
        let (_, account_id) = self.session.credentials()?;

        let request = chats::join(chat_id, &JoinChatRequest { account_id })?;
        self.send_authed("join chat", request).await?;

        *is_member = true;
        self.cache.invalidate(&QueryKey::ChatMembers(chat_id));
        info!("Joined chat {}", chat_id);
        Ok(())
    }

    /// Post the compose draft to `chat_id`, clearing it on success. An empty
    /// draft is rejected without a request.
    pub async fn send_message(&self, chat_id: ChatId, draft: &mut String) -> Result<(), ApiError> {
        if draft.trim().is_empty() {
            return Err(ApiError::Validation("Message is empty".into()));
        }
        let (_, account_id) = self.session.credentials()?;

        let request = messages::send(
            chat_id,
            &SendMessageRequest {
                text: draft.clone(),
                account_id,
            },
        )?;
        self.send_authed("send message", request).await?;

        draft.clear();
        self.cache.invalidate(&QueryKey::Messages(chat_id));
        Ok(())
    }

    pub async fn edit_message(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::Validation("Message is empty".into()));
        }

        let request = messages::edit(chat_id, message_id, &EditMessageRequest { text: text.to_string() })?;
        self.send_authed("edit message", request).await?;

        self.cache.invalidate(&QueryKey::Messages(chat_id));
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), ApiError> {
        self.send_authed("delete message", messages::delete(chat_id, message_id)).await?;

        self.cache.invalidate(&QueryKey::Messages(chat_id));
        info!("Deleted message {} in chat {}", message_id, chat_id);
        Ok(())
    }

    /// Change username and/or email. Blank fields and fields equal to the
    /// current value are left out; with nothing left, no request is made.
    /// Returns what was sent.
    pub async fn update_account(&self, username: &str, email: &str) -> Result<UpdateAccountRequest, ApiError> {
        if !self.session.is_logged_in() {
            return Err(ApiError::Unauthenticated);
        }

        let update = UpdateAccountRequest {
            username: changed_field(username, self.session.username().as_deref()),
            email: changed_field(email, self.session.email().as_deref()),
        };
        if update.is_empty() {
            return Ok(update);
        }

        self.send_authed("update account", accounts::update_me(&update)?).await?;

        if let Err(e) = self
            .session
            .update_identity(update.username.clone(), update.email.clone())
        {
            warn!("Failed to persist updated identity: {:#}", e);
        }
        info!("Account updated");
        Ok(update)
    }

    pub async fn update_password(&self, change: &PasswordChange) -> Result<(), ApiError> {
        self.send_authed("update password", accounts::update_password(&change.to_form())?)
            .await?;
        info!("Password changed");
        Ok(())
    }

    /// Delete the logged-in account and log out. If the server refuses (for
    /// instance because the account still owns chats) the session is kept.
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.send_authed("delete account", accounts::delete_me()).await?;
        info!("Account deleted");
        self.logout();
        Ok(())
    }

    /// Exchange credentials for a token, resolve the account behind it and
    /// start a session. Anything cached under a previous identity is dropped.
    pub async fn login(&self, username: &str, password: &str) -> Result<CurrentAccount, ApiError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ApiError::Validation("Username and password are required".into()));
        }

        let form = LoginForm {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let body = self
            .transport
            .send(auth::token(&form)?)
            .await
            .inspect_err(|e| warn!("login failed for {}: {}", form.username, e))?;
        let token = decode::<TokenResponse>(body)?.access_token;

        let body = self.transport.send(accounts::me().bearer(Some(&token))).await?;
        let account: CurrentAccount = decode(body)?;

        let stored = StoredSession {
            token,
            username: account.username.clone(),
            email: account.email.clone(),
            account_id: account.id,
        };
        if let Err(e) = self.session.login(stored) {
            warn!("Failed to persist session: {:#}", e);
        }
        self.cache.clear();
        Ok(account)
    }

    /// Create an account, then log in with it.
    pub async fn register(&self, registration: &Registration) -> Result<CurrentAccount, ApiError> {
        self.transport
            .send(auth::register(&registration.to_form())?)
            .await
            .inspect_err(|e| warn!("registration failed for {}: {}", registration.username(), e))?;
        info!("Registered {}", registration.username());

        self.login(registration.username(), registration.password()).await
    }

    /// End the session and drop every cached entry.
    pub fn logout(&self) {
        if let Err(e) = self.session.logout() {
            warn!("Failed to clear stored session: {:#}", e);
        }
        self.cache.clear();
    }
}
