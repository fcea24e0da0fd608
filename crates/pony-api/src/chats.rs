use pony_types::api::{CreateChatRequest, JoinChatRequest};
use pony_types::models::ChatId;

use crate::error::ApiError;
use crate::request::ApiRequest;

pub fn list() -> ApiRequest {
    ApiRequest::get("/chats")
}

/// A single chat; 404 if it does not exist.
pub fn get(chat_id: ChatId) -> ApiRequest {
    ApiRequest::get(format!("/chats/{}", chat_id))
}

pub fn create(req: &CreateChatRequest) -> Result<ApiRequest, ApiError> {
    ApiRequest::post("/chats").json(req)
}

/// Accounts holding membership in the chat.
pub fn members(chat_id: ChatId) -> ApiRequest {
    ApiRequest::get(format!("/chats/{}/accounts", chat_id))
}

pub fn join(chat_id: ChatId, req: &JoinChatRequest) -> Result<ApiRequest, ApiError> {
    ApiRequest::post(format!("/chats/{}/accounts", chat_id)).json(req)
}
