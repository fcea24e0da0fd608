//! In-process stand-in for the Pony Express backend.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pony_api::{ApiError, ApiRequest, Body, Method, Transport};
use pony_client::{PonyClient, Session};
use pony_store::MemoryStore;
use pony_types::models::{AccountId, ChatId, MessageId};
use serde_json::{Value, json};

#[derive(Clone)]
struct AccountRow {
    id: AccountId,
    username: String,
    email: String,
    password: String,
}

#[derive(Clone)]
struct ChatRow {
    id: ChatId,
    name: String,
    owner_id: AccountId,
}

#[derive(Clone)]
struct MessageRow {
    id: MessageId,
    chat_id: ChatId,
    account_id: AccountId,
    text: String,
    created_at: Option<&'static str>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    accounts: Vec<AccountRow>,
    chats: Vec<ChatRow>,
    messages: Vec<MessageRow>,
    members: Vec<(ChatId, AccountId)>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Keeps chats, messages and memberships in memory and answers the same
/// routes, status codes and error envelopes as the real service. Every
/// request is recorded.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    requests: Mutex<Vec<ApiRequest>>,
    latency: Mutex<Duration>,
}

fn api_error(status: u16, code: &str, message: &str) -> ApiError {
    ApiError::Api {
        status,
        code: code.into(),
        message: message.into(),
    }
}

fn field(body: &Body, name: &str) -> Option<String> {
    match body {
        Body::Json(value) => value.get(name).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }),
        Body::Form(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()),
        Body::Empty => None,
    }
}

fn id_at(segments: &[&str], index: usize) -> Result<i64, ApiError> {
    segments
        .get(index)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| api_error(404, "entity_not_found", "not found"))
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn add_account(&self, username: &str, password: &str) -> AccountId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.accounts.push(AccountRow {
            id,
            username: username.into(),
            email: format!("{}@example.com", username),
            password: password.into(),
        });
        id
    }

    /// A chat the owner is already a member of.
    pub fn add_chat(&self, name: &str, owner_id: AccountId) -> ChatId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.chats.push(ChatRow {
            id,
            name: name.into(),
            owner_id,
        });
        state.members.push((id, owner_id));
        id
    }

    pub fn add_member(&self, chat_id: ChatId, account_id: AccountId) {
        self.state.lock().unwrap().members.push((chat_id, account_id));
    }

    /// A message imported without a timestamp, as older rows are.
    pub fn add_message(&self, chat_id: ChatId, account_id: AccountId, text: &str) -> MessageId {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.messages.push(MessageRow {
            id,
            chat_id,
            account_id,
            text: text.into(),
            created_at: None,
        });
        id
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// How many `method path` requests were received.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn caller(&self, state: &State, request: &ApiRequest) -> Result<AccountId, ApiError> {
        let token = request
            .bearer
            .as_deref()
            .ok_or_else(|| api_error(401, "invalid_credentials", "missing token"))?;
        let id = token
            .strip_prefix("token-")
            .and_then(|id| id.parse().ok())
            .filter(|id| state.accounts.iter().any(|a| a.id == *id))
            .ok_or_else(|| api_error(401, "invalid_credentials", "invalid token"))?;
        Ok(id)
    }

    fn handle(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        let body = &request.body;

        match (request.method, segments.as_slice()) {
            (Method::Post, ["auth", "token"]) => {
                let username = field(body, "username").unwrap_or_default();
                let password = field(body, "password").unwrap_or_default();
                let account = state
                    .accounts
                    .iter()
                    .find(|a| a.username == username && a.password == password)
                    .ok_or_else(|| api_error(401, "invalid_credentials", "Invalid username or password"))?;
                Ok(json!({ "access_token": format!("token-{}", account.id), "token_type": "bearer" }))
            }
            (Method::Post, ["auth", "registration"]) => {
                let username = field(body, "username").unwrap_or_default();
                if state.accounts.iter().any(|a| a.username == username) {
                    return Err(api_error(422, "duplicate_entity_value", "username already taken"));
                }
                let id = state.next_id();
                state.accounts.push(AccountRow {
                    id,
                    username: username.clone(),
                    email: field(body, "email").unwrap_or_default(),
                    password: field(body, "password").unwrap_or_default(),
                });
                Ok(json!({ "id": id, "username": username }))
            }
            _ => self.handle_authed(&mut state, request, &segments),
        }
    }

    fn handle_authed(&self, state: &mut State, request: &ApiRequest, segments: &[&str]) -> Result<Value, ApiError> {
        let caller = self.caller(state, request)?;
        let body = &request.body;

        match (request.method, segments) {
            (Method::Get, ["accounts", "me"]) => {
                let me = state.accounts.iter().find(|a| a.id == caller).cloned();
                let me = me.ok_or_else(|| api_error(404, "entity_not_found", "no account"))?;
                Ok(json!({ "id": me.id, "username": me.username, "email": me.email }))
            }
            (Method::Put, ["accounts", "me"]) => {
                let me = state
                    .accounts
                    .iter_mut()
                    .find(|a| a.id == caller)
                    .ok_or_else(|| api_error(404, "entity_not_found", "no account"))?;
                if let Some(username) = field(body, "username") {
                    me.username = username;
                }
                if let Some(email) = field(body, "email") {
                    me.email = email;
                }
                Ok(json!({ "id": me.id, "username": me.username, "email": me.email }))
            }
            (Method::Put, ["accounts", "me", "password"]) => {
                let me = state
                    .accounts
                    .iter_mut()
                    .find(|a| a.id == caller)
                    .ok_or_else(|| api_error(404, "entity_not_found", "no account"))?;
                if field(body, "old_password").as_deref() != Some(me.password.as_str()) {
                    return Err(api_error(401, "invalid_credentials", "Current password is incorrect"));
                }
                me.password = field(body, "new_password").unwrap_or_default();
                Ok(json!({}))
            }
            (Method::Delete, ["accounts", "me"]) => {
                if state.chats.iter().any(|c| c.owner_id == caller) {
                    return Err(api_error(422, "chat_owner_removal", "Cannot delete an account that owns chats"));
                }
                state.accounts.retain(|a| a.id != caller);
                state.members.retain(|(_, a)| *a != caller);
                Ok(json!({}))
            }
            (Method::Get, ["accounts", _]) => {
                let id = id_at(segments, 1)?;
                let account = state
                    .accounts
                    .iter()
                    .find(|a| a.id == id)
                    .ok_or_else(|| api_error(404, "entity_not_found", "Unable to find account"))?;
                Ok(json!({ "id": account.id, "username": account.username }))
            }
            (Method::Get, ["chats"]) => {
                let chats: Vec<Value> = state
                    .chats
                    .iter()
                    .map(|c| json!({ "id": c.id, "name": c.name, "owner_id": c.owner_id }))
                    .collect();
                Ok(json!({ "metadata": { "count": chats.len() }, "chats": chats }))
            }
            (Method::Post, ["chats"]) => {
                let name = field(body, "name").unwrap_or_default();
                let owner_id: AccountId = field(body, "owner_id")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| api_error(422, "validation_error", "owner_id is required"))?;
                if state.chats.iter().any(|c| c.name == name) {
                    return Err(api_error(422, "duplicate_entity_value", "chat name already exists"));
                }
                let id = state.next_id();
                state.chats.push(ChatRow { id, name: name.clone(), owner_id });
                state.members.push((id, owner_id));
                Ok(json!({ "id": id, "name": name, "owner_id": owner_id }))
            }
            (Method::Get, ["chats", _]) => {
                let chat_id = self.existing_chat(state, segments)?;
                let chat = state.chats.iter().find(|c| c.id == chat_id).cloned();
                let chat = chat.ok_or_else(|| api_error(404, "entity_not_found", "no chat"))?;
                Ok(json!({ "id": chat.id, "name": chat.name, "owner_id": chat.owner_id }))
            }
            (Method::Get, ["chats", _, "messages"]) => {
                // The real service does not distinguish an empty thread from
                // a missing chat.
                let chat_id = id_at(segments, 1)?;
                let messages: Vec<Value> = state
                    .messages
                    .iter()
                    .filter(|m| m.chat_id == chat_id)
                    .map(|m| {
                        json!({
                            "id": m.id,
                            "chat_id": m.chat_id,
                            "account_id": m.account_id,
                            "text": m.text,
                            "created_at": m.created_at,
                        })
                    })
                    .collect();
                if messages.is_empty() {
                    return Err(api_error(
                        404,
                        "entity_not_found",
                        &format!("Unable to find chat with id={}", chat_id),
                    ));
                }
                Ok(json!({ "metadata": { "count": messages.len() }, "messages": messages }))
            }
            (Method::Post, ["chats", _, "messages"]) => {
                let chat_id = self.existing_chat(state, segments)?;
                let author: Option<AccountId> = field(body, "account_id").and_then(|v| v.parse().ok());
                if author != Some(caller) || !state.members.contains(&(chat_id, caller)) {
                    return Err(api_error(403, "forbidden", "not a member"));
                }
                let id = state.next_id();
                let text = field(body, "text").unwrap_or_default();
                state.messages.push(MessageRow {
                    id,
                    chat_id,
                    account_id: caller,
                    text: text.clone(),
                    created_at: Some("2024-05-01T12:31:00"),
                });
                Ok(json!({
                    "id": id,
                    "chat_id": chat_id,
                    "account_id": caller,
                    "text": text,
                    "created_at": "2024-05-01T12:31:00",
                }))
            }
            (Method::Put | Method::Delete, ["chats", _, "messages", _]) => {
                let chat_id = self.existing_chat(state, segments)?;
                let message_id = id_at(segments, 3)?;
                let index = state
                    .messages
                    .iter()
                    .position(|m| m.id == message_id && m.chat_id == chat_id)
                    .ok_or_else(|| api_error(404, "entity_not_found", "Unable to find message"))?;
                if state.messages[index].account_id != caller {
                    return Err(api_error(403, "forbidden", "only the author may change a message"));
                }
                if request.method == Method::Delete {
                    state.messages.remove(index);
                } else {
                    state.messages[index].text = field(body, "text").unwrap_or_default();
                }
                Ok(json!({}))
            }
            (Method::Get, ["chats", _, "accounts"]) => {
                let chat_id = self.existing_chat(state, segments)?;
                let accounts: Vec<Value> = state
                    .members
                    .iter()
                    .filter(|(c, _)| *c == chat_id)
                    .filter_map(|(_, a)| state.accounts.iter().find(|row| row.id == *a))
                    .map(|a| json!({ "id": a.id, "username": a.username }))
                    .collect();
                Ok(json!({ "metadata": { "count": accounts.len() }, "accounts": accounts }))
            }
            (Method::Post, ["chats", _, "accounts"]) => {
                let chat_id = self.existing_chat(state, segments)?;
                let account_id: Option<AccountId> = field(body, "account_id").and_then(|v| v.parse().ok());
                if account_id != Some(caller) {
                    return Err(api_error(403, "forbidden", "cannot add another account"));
                }
                if !state.members.contains(&(chat_id, caller)) {
                    state.members.push((chat_id, caller));
                }
                Ok(json!({}))
            }
            _ => Err(api_error(404, "not_found", "no such route")),
        }
    }

    fn existing_chat(&self, state: &State, segments: &[&str]) -> Result<ChatId, ApiError> {
        let chat_id = id_at(segments, 1)?;
        if state.chats.iter().any(|c| c.id == chat_id) {
            Ok(chat_id)
        } else {
            Err(api_error(404, "entity_not_found", "Unable to find chat"))
        }
    }
}

impl Transport for FakeBackend {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.requests.lock().unwrap().push(request.clone());
        self.handle(&request)
    }
}

pub type TestClient = PonyClient<Arc<FakeBackend>>;

/// A logged-out client over a fresh in-memory store.
pub fn client(backend: &Arc<FakeBackend>) -> TestClient {
    PonyClient::new(Arc::clone(backend), Session::new(Arc::new(MemoryStore::new())))
}

pub async fn logged_in(backend: &Arc<FakeBackend>, username: &str, password: &str) -> TestClient {
    let client = client(backend);
    client.login(username, password).await.unwrap();
    client
}
