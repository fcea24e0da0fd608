use pony_types::api::{UpdateAccountRequest, UpdatePasswordForm};
use pony_types::models::AccountId;

use crate::error::ApiError;
use crate::request::ApiRequest;

pub fn get(account_id: AccountId) -> ApiRequest {
    ApiRequest::get(format!("/accounts/{}", account_id))
}

pub fn me() -> ApiRequest {
    ApiRequest::get("/accounts/me")
}

pub fn update_me(req: &UpdateAccountRequest) -> Result<ApiRequest, ApiError> {
    ApiRequest::put("/accounts/me").json(req)
}

/// The password endpoint takes form fields, not JSON.
pub fn update_password(form: &UpdatePasswordForm) -> Result<ApiRequest, ApiError> {
    ApiRequest::put("/accounts/me/password").form(form)
}

pub fn delete_me() -> ApiRequest {
    ApiRequest::delete("/accounts/me")
}
