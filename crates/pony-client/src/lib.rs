//! Pony Express client core: session, cached read queries and write
//! commands that keep the cache consistent with the server.
//!
//! [`PonyClient`] ties a [`Transport`] to a [`Session`] and a query cache.
//! Reads go through the cache keyed by [`QueryKey`]; every successful write
//! invalidates the keys it affects.

pub mod commands;
pub mod config;
pub mod forms;
pub mod mutation;
pub mod queries;
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use pony_api::{ApiError, HttpTransport, Transport};
use pony_cache::{CacheConfig, EntityCache};
use pony_store::Database;

pub use config::ClientConfig;
pub use forms::{PasswordChange, Registration};
pub use mutation::{CommandStatus, Mutation};
pub use queries::{QueryData, QueryKey, REMOVED_AUTHOR};
pub use session::Session;

pub type QueryCache = EntityCache<QueryKey, QueryData, ApiError>;

pub struct PonyClient<T> {
    transport: Arc<T>,
    session: Session,
    cache: QueryCache,
}

impl<T> Clone for PonyClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            session: self.session.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<T: Transport> PonyClient<T> {
    pub fn new(transport: T, session: Session) -> Self {
        Self::with_cache_config(transport, session, CacheConfig::default())
    }

    pub fn with_cache_config(transport: T, session: Session, config: CacheConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            session,
            cache: EntityCache::with_config(config),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl PonyClient<HttpTransport> {
    /// Open the session store, restore any saved session and point an HTTP
    /// transport at the configured backend.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let store = Database::open(&config.store_path)?;
        let session = Session::restore(Arc::new(store))?;
        let transport = HttpTransport::new(config.api_url.as_str(), config.request_timeout)?;
        info!("Using backend at {}", transport.base_url());

        Ok(Self::with_cache_config(
            transport,
            session,
            CacheConfig {
                stale_after: config.stale_after,
                ..CacheConfig::default()
            },
        ))
    }
}
