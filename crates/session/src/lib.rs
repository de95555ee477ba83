//! Session persistence for tabletalk.
//!
//! The `SessionStore` trait is the persistence boundary: create/read/append
//! by session id plus the exclusive-access lock that serializes reasoning
//! loops per session. A second concurrent request for a locked session is
//! rejected immediately with `SessionBusy`, never queued, so tool-call
//! histories cannot interleave.

pub mod in_memory;

pub use in_memory::InMemorySessionStore;

use async_trait::async_trait;
use std::sync::Arc;

use tabletalk_core::error::Result;
use tabletalk_core::turn::{Session, SessionId, Turn};

/// The session persistence boundary. Backing store is an implementation
/// choice; the in-memory backend is the default.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A human-readable name for this backend (for logs).
    fn name(&self) -> &str;

    /// Create a new session for a user and return its id.
    async fn create(&self, user_id: &str) -> Result<SessionId>;

    /// Fetch a session snapshot. Fails with `SessionNotFound` if the id is
    /// absent or expired.
    async fn get(&self, id: &SessionId) -> Result<Session>;

    /// Append a turn to the session's history. Order of appends is the
    /// order of history.
    async fn append(&self, id: &SessionId, turn: Turn) -> Result<()>;

    /// Record or clear the clarifying question awaiting the user.
    async fn set_pending_clarification(
        &self,
        id: &SessionId,
        question: Option<String>,
    ) -> Result<()>;

    /// Claim the session's exclusive lock. Fails with `SessionBusy` if a
    /// reasoning loop is already in flight.
    async fn try_acquire(&self, id: &SessionId) -> Result<()>;

    /// Release the exclusive lock. Releasing an absent session is a no-op.
    async fn release(&self, id: &SessionId) -> Result<()>;
}

/// RAII wrapper for the session lock.
///
/// Release happens on every exit path: explicitly via [`release`], or from
/// `Drop` when the owning future is cancelled or errors out — the drop
/// handler hands the release to the runtime since `Drop` cannot await.
pub struct SessionLockGuard {
    store: Arc<dyn SessionStore>,
    id: SessionId,
    released: bool,
}

impl SessionLockGuard {
    /// Acquire the lock for a session, failing fast with `SessionBusy`.
    pub async fn acquire(store: Arc<dyn SessionStore>, id: &SessionId) -> Result<Self> {
        store.try_acquire(id).await?;
        Ok(Self {
            store,
            id: id.clone(),
            released: false,
        })
    }

    /// Release the lock explicitly.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.store.release(&self.id).await
    }
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        if !self.released {
            let store = self.store.clone();
            let id = self.id.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = store.release(&id).await {
                        tracing::warn!(session_id = %id, error = %e, "Lock release on drop failed");
                    }
                });
            }
        }
    }
}
