//! API state management for the REST server.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::drafts::DraftKey;
use crate::rest::error::ApiError;
use crate::session::{DynSession, SessionContext};
use crate::wizards::{open_session, WizardKind};

/// A mounted session; its mutex orders that session's requests
pub type SharedSession = Arc<Mutex<Box<dyn DynSession>>>;

/// Map entry: the wizard kind is readable without locking the session
#[derive(Clone)]
struct Mounted {
    kind: WizardKind,
    session: SharedSession,
}

impl Mounted {
    fn for_kind(self, kind: WizardKind, key: &DraftKey) -> Result<SharedSession, ApiError> {
        if self.kind != kind {
            return Err(ApiError::Conflict(format!(
                "session '{key}' is open in the {} wizard",
                self.kind
            )));
        }
        Ok(self.session)
    }
}

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub context: SessionContext,
    sessions: Arc<RwLock<HashMap<DraftKey, Mounted>>>,
}

impl ApiState {
    pub fn new(config: Config, context: SessionContext) -> Self {
        Self {
            config: Arc::new(config),
            context,
            sessions: Arc::default(),
        }
    }

    /// Build stores, sink and hooks from config
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let context = SessionContext::from_config(&config)?;
        Ok(Self::new(config, context))
    }

    /// Mount a session for `key`, or return the one already mounted.
    ///
    /// The draft is loaded without holding the session map, so a slow store
    /// only delays this key. When two opens race, the first insert wins.
    pub async fn open(&self, kind: WizardKind, key: DraftKey) -> Result<SharedSession, ApiError> {
        let existing = self.sessions.read().await.get(&key).cloned();
        if let Some(mounted) = existing {
            return mounted.for_kind(kind, &key);
        }

        let session = open_session(kind, key.clone(), self.context.clone()).await?;
        let mounted = self
            .sessions
            .write()
            .await
            .entry(key.clone())
            .or_insert_with(|| Mounted {
                kind,
                session: Arc::new(Mutex::new(session)),
            })
            .clone();
        mounted.for_kind(kind, &key)
    }

    pub async fn session(&self, key: &DraftKey) -> Result<SharedSession, ApiError> {
        self.sessions
            .read()
            .await
            .get(key)
            .map(|m| m.session.clone())
            .ok_or_else(|| ApiError::NotFound(format!("session '{key}' is not open")))
    }

    pub async fn remove(&self, key: &DraftKey) -> Option<SharedSession> {
        self.sessions.write().await.remove(key).map(|m| m.session)
    }

    /// Close `session` and unmount it if it is still the one mounted under `key`
    pub async fn unmount(&self, key: &DraftKey, session: &SharedSession) {
        {
            let mut sessions = self.sessions.write().await;
            if sessions
                .get(key)
                .is_some_and(|m| Arc::ptr_eq(&m.session, session))
            {
                sessions.remove(key);
            }
        }
        if let Err(e) = session.lock().await.close().await {
            tracing::warn!(%key, error = %e, "failed to close session");
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Flush and unmount every session (server shutdown)
    pub async fn close_all(&self) {
        let sessions: Vec<SharedSession> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, m)| m.session)
            .collect();
        for session in sessions {
            let mut session = session.lock().await;
            if let Err(e) = session.close().await {
                tracing::warn!(key = %session.key(), error = %e, "failed to flush session on shutdown");
            }
        }
    }
}

/// Parse a path segment into a draft key
pub fn parse_key(raw: &str) -> Result<DraftKey, ApiError> {
    DraftKey::new(raw).map_err(ApiError::from)
}

/// Parse a path segment into a wizard kind
pub fn parse_kind(raw: &str) -> Result<WizardKind, ApiError> {
    raw.parse::<WizardKind>().map_err(ApiError::from)
}
