use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use pony_api::{ApiError, Transport, accounts, chats, decode, messages};
use pony_cache::{CacheEntry, Subscription};
use pony_types::api::{AccountsResponse, ChatsResponse, CurrentAccount, MessagesResponse};
use pony_types::models::{Account, AccountId, Chat, ChatId, Message};

use crate::{PonyClient, QueryCache};

/// Shown in place of an author whose account can no longer be loaded.
pub const REMOVED_AUTHOR: &str = "removed";

/// Identity of one cached server result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Chats,
    Messages(ChatId),
    Account(AccountId),
    ChatMembers(ChatId),
}

/// What a [`QueryKey`] resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Chats(Vec<Chat>),
    Messages(Vec<Message>),
    Account(Account),
    /// Usernames of the chat's members.
    ChatMembers(Vec<String>),
}

/// Whether the cached chat list contains `chat_id`. A stale list still
/// counts: chats are never deleted.
fn cached_chat_exists(cache: &QueryCache, chat_id: ChatId) -> bool {
    match cache.peek(&QueryKey::Chats).as_deref() {
        Some(QueryData::Chats(chats)) => chats.iter().any(|chat| chat.id == chat_id),
        _ => false,
    }
}

/// The backend answers 404 both for an unknown chat and for a chat with no
/// messages yet. Tell them apart by the chat list, asking the server for the
/// chat itself when the cached list does not know it.
async fn chat_exists<T: Transport>(
    cache: &QueryCache,
    transport: &T,
    chat_id: ChatId,
    token: Option<&str>,
) -> Result<bool, ApiError> {
    if cached_chat_exists(cache, chat_id) {
        return Ok(true);
    }
    match transport.send(chats::get(chat_id).bearer(token)).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

fn wrong_shape(key: QueryKey) -> ApiError {
    ApiError::Serialization(format!("cached data for {:?} has the wrong shape", key))
}

impl<T: Transport> PonyClient<T> {
    /// Read `key` through the cache. `load` gets the transport and the token
    /// current at the time it runs, so a refetch after re-login uses the new
    /// token.
    async fn query<F, Fut>(&self, key: QueryKey, load: F) -> Result<Arc<QueryData>, ApiError>
    where
        F: Fn(Arc<T>, Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<QueryData, ApiError>> + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        let session = self.session.clone();
        self.cache
            .fetch(key, move || load(Arc::clone(&transport), session.token()))
            .await
    }

    /// Every chat, sorted by name. Chats sharing a name keep server order.
    pub async fn list_chats(&self) -> Result<Vec<Chat>, ApiError> {
        let data = self
            .query(QueryKey::Chats, |transport, token| async move {
                let body = transport.send(chats::list().bearer(token.as_deref())).await?;
                let mut chats = decode::<ChatsResponse>(body)?.chats;
                chats.sort_by(|a, b| a.name.cmp(&b.name));
                Ok::<_, ApiError>(QueryData::Chats(chats))
            })
            .await?;

        match &*data {
            QueryData::Chats(chats) => Ok(chats.clone()),
            _ => Err(wrong_shape(QueryKey::Chats)),
        }
    }

    /// Messages of a chat in server order. `None` when no chat is selected;
    /// nothing is fetched then. A chat without messages yields an empty list.
    pub async fn list_messages(&self, chat_id: Option<ChatId>) -> Option<Result<Vec<Message>, ApiError>> {
        let chat_id = chat_id?;
        let key = QueryKey::Messages(chat_id);
        let cache = self.cache.clone();
        let result = self
            .query(key, move |transport, token| {
                let cache = cache.clone();
                async move {
                    match transport.send(messages::list(chat_id).bearer(token.as_deref())).await {
                        Ok(body) => Ok::<_, ApiError>(QueryData::Messages(decode::<MessagesResponse>(body)?.messages)),
                        Err(e) if e.is_not_found() => {
                            if chat_exists(&cache, transport.as_ref(), chat_id, token.as_deref()).await? {
                                debug!("chat {} has no messages yet", chat_id);
                                Ok(QueryData::Messages(Vec::new()))
                            } else {
                                Err(e)
                            }
                        }
                        Err(e) => Err(e),
                    }
                }
            })
            .await
            .and_then(|data| match &*data {
                QueryData::Messages(messages) => Ok(messages.clone()),
                _ => Err(wrong_shape(key)),
            });
        Some(result)
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account, ApiError> {
        let key = QueryKey::Account(account_id);
        let data = self
            .query(key, move |transport, token| async move {
                let body = transport.send(accounts::get(account_id).bearer(token.as_deref())).await?;
                Ok::<_, ApiError>(QueryData::Account(decode(body)?))
            })
            .await?;

        match &*data {
            QueryData::Account(account) => Ok(account.clone()),
            _ => Err(wrong_shape(key)),
        }
    }

    /// Display name for a message author. Never fails: an account that
    /// cannot be loaded shows as [`REMOVED_AUTHOR`].
    pub async fn author_name(&self, account_id: AccountId) -> String {
        match self.account(account_id).await {
            Ok(account) => account.username,
            Err(e) => {
                debug!("author {} unavailable: {}", account_id, e);
                REMOVED_AUTHOR.to_string()
            }
        }
    }

    /// Usernames of a chat's members. `None` when no chat is selected.
    pub async fn chat_member_usernames(&self, chat_id: Option<ChatId>) -> Option<Result<Vec<String>, ApiError>> {
        let chat_id = chat_id?;
        let key = QueryKey::ChatMembers(chat_id);
        let result = self
            .query(key, move |transport, token| async move {
                let body = transport.send(chats::members(chat_id).bearer(token.as_deref())).await?;
                let usernames = decode::<AccountsResponse>(body)?
                    .accounts
                    .into_iter()
                    .map(|account| account.username)
                    .collect();
                Ok::<_, ApiError>(QueryData::ChatMembers(usernames))
            })
            .await
            .and_then(|data| match &*data {
                QueryData::ChatMembers(usernames) => Ok(usernames.clone()),
                _ => Err(wrong_shape(key)),
            });
        Some(result)
    }

    /// Whether the logged-in account is a member of `chat_id`. Always false
    /// when logged out.
    pub async fn is_member(&self, chat_id: ChatId) -> Result<bool, ApiError> {
        let Some(username) = self.session.username() else {
            return Ok(false);
        };
        match self.chat_member_usernames(Some(chat_id)).await {
            Some(result) => Ok(result?.contains(&username)),
            None => Ok(false),
        }
    }

    /// `GET /accounts/me`, uncached.
    pub async fn current_account(&self) -> Result<CurrentAccount, ApiError> {
        let (token, _) = self.session.credentials()?;
        let body = self.transport.send(accounts::me().bearer(Some(&token))).await?;
        decode(body)
    }

    /// Only a message's author may edit or delete it.
    pub fn can_edit(&self, message: &Message) -> bool {
        self.session.account_id() == Some(message.account_id)
    }

    /// Follow `key`: while the subscription lives, invalidating the key
    /// refetches it at once.
    pub fn watch(&self, key: QueryKey) -> Subscription<QueryKey, QueryData, ApiError> {
        self.cache.subscribe(key)
    }

    /// Current cache entry for `key`, without fetching.
    pub fn entry(&self, key: QueryKey) -> CacheEntry<QueryData, ApiError> {
        self.cache.get(&key)
    }

    /// Refetch `key` now with the loader of its last read. `None` if it has
    /// never been read.
    pub async fn refetch(&self, key: QueryKey) -> Option<Result<Arc<QueryData>, ApiError>> {
        self.cache.refetch(&key).await
    }
}
