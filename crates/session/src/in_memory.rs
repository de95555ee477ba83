//! In-memory session backend — the default store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use tabletalk_core::error::{Error, Result};
use tabletalk_core::turn::{LockState, Session, SessionId, Turn};

use crate::SessionStore;

/// Sessions held in a map behind a RwLock. Lock state lives on the session
/// itself so a snapshot reflects whether a loop is in flight.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create(&self, user_id: &str) -> Result<SessionId> {
        let session = Session::new(user_id);
        let id = session.id.clone();
        self.sessions.write().await.insert(id.clone(), session);
        Ok(id)
    }

    async fn get(&self, id: &SessionId) -> Result<Session> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    async fn append(&self, id: &SessionId, turn: Turn) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        session.append(turn);
        Ok(())
    }

    async fn set_pending_clarification(
        &self,
        id: &SessionId,
        question: Option<String>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        session.pending_clarification = question;
        Ok(())
    }

    async fn try_acquire(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        match session.lock_state {
            LockState::InProgress => Err(Error::SessionBusy(id.to_string())),
            LockState::Free => {
                session.lock_state = LockState::InProgress;
                Ok(())
            }
        }
    }

    async fn release(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(id) {
            session.lock_state = LockState::Free;
        }
        Ok(())
    }
}
