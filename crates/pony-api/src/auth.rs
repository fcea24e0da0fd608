use pony_types::api::{LoginForm, RegistrationForm};

use crate::error::ApiError;
use crate::request::ApiRequest;

/// `POST /auth/token`, form-encoded. Answers `{access_token}`.
pub fn token(form: &LoginForm) -> Result<ApiRequest, ApiError> {
    ApiRequest::post("/auth/token").form(form)
}

/// `POST /auth/registration`, form-encoded.
pub fn register(form: &RegistrationForm) -> Result<ApiRequest, ApiError> {
    ApiRequest::post("/auth/registration").form(form)
}
