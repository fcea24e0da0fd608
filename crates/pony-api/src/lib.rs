//! Transport layer for the Pony Express REST backend.
//!
//! Endpoint modules (`auth`, `accounts`, `chats`, `messages`) only build
//! [`ApiRequest`] values; a [`Transport`] carries them. [`HttpTransport`] is
//! the real one, tests substitute their own.

pub mod accounts;
pub mod auth;
pub mod chats;
pub mod error;
pub mod messages;
pub mod request;
pub mod transport;

pub use error::ApiError;
pub use request::{ApiRequest, Body, Method};
pub use transport::{HttpTransport, Transport, decode};
