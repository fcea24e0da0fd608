use pony_types::api::{EditMessageRequest, SendMessageRequest};
use pony_types::models::{ChatId, MessageId};

use crate::error::ApiError;
use crate::request::ApiRequest;

/// Messages come back in server order (oldest first).
pub fn list(chat_id: ChatId) -> ApiRequest {
    ApiRequest::get(format!("/chats/{}/messages", chat_id))
}

pub fn send(chat_id: ChatId, req: &SendMessageRequest) -> Result<ApiRequest, ApiError> {
    ApiRequest::post(format!("/chats/{}/messages", chat_id)).json(req)
}

pub fn edit(chat_id: ChatId, message_id: MessageId, req: &EditMessageRequest) -> Result<ApiRequest, ApiError> {
    ApiRequest::put(format!("/chats/{}/messages/{}", chat_id, message_id)).json(req)
}

pub fn delete(chat_id: ChatId, message_id: MessageId) -> ApiRequest {
    ApiRequest::delete(format!("/chats/{}/messages/{}", chat_id, message_id))
}
