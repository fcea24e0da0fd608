use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::request::{ApiRequest, Body, Method};

/// Anything that can carry an [`ApiRequest`] to the backend and hand back the
/// parsed JSON body. Success with no body (204) yields an empty object.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value, ApiError>> + Send {
        (**self).send(request)
    }
}

/// Decode a success body against an endpoint schema.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Serialization(format!("unexpected response shape: {e}")))
}

/// reqwest-backed transport rooted at the backend's base URL.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.url(&request.path);
        debug!("API {} {}", request.method, url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };

        if let Some(token) = &request.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Form(fields) => builder.form(fields),
        };

        let resp = builder.send().await.map_err(|e| {
            warn!("API {} {} failed: {}", request.method, url, e);
            ApiError::from(e)
        })?;

        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            debug!("API {} {} -> {}", request.method, url, status);
            return Err(ApiError::from_response(status.as_u16(), &bytes));
        }

        if status == StatusCode::NO_CONTENT || bytes.is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}
