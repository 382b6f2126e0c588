/*
[INPUT]:  Validated TrackerConfig
[OUTPUT]: Shared backend client, auth manager and coordinator factory
[POS]:    CLI layer - wiring between configuration and the engine
[UPDATE]: When commands need new shared resources
*/

pub mod commands;
pub mod init;
pub mod interactive;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mmr_backend::{AuthManager, BackendClient, PersistentSessionStore, Session};
use tracing::{info, warn};

use mmr_tracker::{FileSlot, StageCoordinator, SystemClock, TimerPersistence, TrackerConfig};

pub struct AppContext {
    pub config: TrackerConfig,
    pub client: BackendClient,
    pub auth: AuthManager,
    sessions: PersistentSessionStore,
}

impl AppContext {
    /// Build the client and restore a saved session if it is still valid.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let client = BackendClient::with_config(
            &config.backend.url,
            config.backend.api_key.clone(),
            config.client_config(),
        )
        .context("create backend client")?;
        let auth = AuthManager::new(client.clone());
        let sessions = PersistentSessionStore::new(config.data_dir());

        match sessions.load() {
            Some(session) if !session.is_expired() => {
                info!(user_id = %session.user.id, "session restored");
                client.session_manager().set_session(session);
            }
            Some(_) => {
                info!("saved session expired");
                if let Err(err) = sessions.clear() {
                    warn!(error = %err, "failed to remove expired session");
                }
            }
            None => {}
        }

        Ok(Self {
            config,
            client,
            auth,
            sessions,
        })
    }

    pub fn session(&self) -> Option<Session> {
        self.auth.get_session()
    }

    pub fn require_session(&self) -> Result<Session> {
        match self.session() {
            Some(session) => Ok(session),
            None => bail!("not signed in; run `mmr-tracker login` first"),
        }
    }

    pub fn remember_session(&self, session: &Session) -> Result<()> {
        self.sessions
            .save(session)
            .with_context(|| format!("save session to {}", self.sessions.file_path().display()))
    }

    pub fn forget_session(&self) {
        if let Err(err) = self.sessions.clear() {
            warn!(error = %err, "failed to remove saved session");
        }
    }

    /// Coordinator backed by the file snapshot in the data directory.
    pub fn coordinator(&self) -> StageCoordinator {
        let slot = Arc::new(FileSlot::new(self.config.data_dir()));
        let persistence = TimerPersistence::new(slot, self.config.storage.snapshot_key.clone());
        let client = Arc::new(self.client.clone());
        StageCoordinator::new(
            client.clone(),
            client,
            persistence,
            Arc::new(SystemClock),
            self.config.coordinator_options(),
        )
    }
}
