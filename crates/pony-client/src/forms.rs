//! Inputs that are checked on the client before anything is sent.

use pony_api::ApiError;
use pony_types::api::{RegistrationForm, UpdatePasswordForm};

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// A registration whose password has been confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    username: String,
    email: String,
    password: String,
}

impl Registration {
    pub fn new(username: &str, email: &str, password: &str, confirm_password: &str) -> Result<Self, ApiError> {
        require(username, "username")?;
        require(email, "email")?;
        require(password, "password")?;
        if password != confirm_password {
            return Err(ApiError::Validation("Passwords do not match".into()));
        }

        Ok(Self {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn to_form(&self) -> RegistrationForm {
        RegistrationForm {
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// A password change whose new password has been confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChange {
    old_password: String,
    new_password: String,
}

impl PasswordChange {
    pub fn new(old_password: &str, new_password: &str, confirm_password: &str) -> Result<Self, ApiError> {
        require(old_password, "current password")?;
        require(new_password, "new password")?;
        require(confirm_password, "password confirmation")?;
        if new_password != confirm_password {
            return Err(ApiError::Validation("Passwords do not match".into()));
        }

        Ok(Self {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        })
    }

    pub fn to_form(&self) -> UpdatePasswordForm {
        UpdatePasswordForm {
            old_password: self.old_password.clone(),
            new_password: self.new_password.clone(),
        }
    }
}
