use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::info;

use pony_api::ApiError;
use pony_store::{KeyValueStore, StoredSession};
use pony_types::events::SessionEvent;
use pony_types::models::AccountId;

/// Token and identity of the logged-in account, shared by handle. Every
/// change is written through to the backing store.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn KeyValueStore>,
    state: RwLock<Option<StoredSession>>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// A logged-out session over `store`. Nothing is read from it.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_state(store, None)
    }

    /// Pick up whatever session `store` holds from a previous run.
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let state = StoredSession::load(store.as_ref())?;
        match &state {
            Some(s) => info!("Restored session for {} ({})", s.username, s.account_id),
            None => info!("No stored session"),
        }
        Ok(Self::with_state(store, state))
    }

    fn with_state(store: Arc<dyn KeyValueStore>, state: Option<StoredSession>) -> Self {
        let (events_tx, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SessionInner {
                store,
                state: RwLock::new(state),
                events_tx,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<StoredSession>> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Become `session`. The in-memory state changes even if persisting fails.
    pub fn login(&self, session: StoredSession) -> Result<()> {
        let event = SessionEvent::LoggedIn {
            account_id: session.account_id,
            username: session.username.clone(),
        };
        let persisted = session.save(self.inner.store.as_ref());
        info!("Logged in as {} ({})", session.username, session.account_id);

        *self.inner.state.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        let _ = self.inner.events_tx.send(event);
        persisted
    }

    /// Forget the token and identity, in memory and in the store.
    pub fn logout(&self) -> Result<()> {
        let cleared = StoredSession::clear(self.inner.store.as_ref());
        let was = self.inner.state.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(s) = was {
            info!("Logged out {}", s.username);
        }
        let _ = self.inner.events_tx.send(SessionEvent::LoggedOut);
        cleared
    }

    /// Apply an accepted account update. `None` fields keep their value.
    pub fn update_identity(&self, username: Option<String>, email: Option<String>) -> Result<()> {
        let updated = {
            let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            let Some(current) = state.as_mut() else {
                return Ok(());
            };
            if let Some(name) = &username {
                current.username = name.clone();
            }
            if let Some(mail) = &email {
                current.email = mail.clone();
            }
            current.clone()
        };

        let _ = self.inner.events_tx.send(SessionEvent::IdentityUpdated { username, email });
        updated.save(self.inner.store.as_ref())
    }

    pub fn is_logged_in(&self) -> bool {
        self.read().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.read().as_ref().map(|s| s.account_id)
    }

    pub fn username(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.username.clone())
    }

    pub fn email(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.email.clone())
    }

    pub fn snapshot(&self) -> Option<StoredSession> {
        self.read().clone()
    }

    /// Token and account id for a call that needs both.
    pub fn credentials(&self) -> Result<(String, AccountId), ApiError> {
        self.read()
            .as_ref()
            .map(|s| (s.token.clone(), s.account_id))
            .ok_or(ApiError::Unauthenticated)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events_tx.subscribe()
    }
}
