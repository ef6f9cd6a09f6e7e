//! Active-conversation state machine.
//!
//! One coordinator owns the session list, the active session id, the
//! message buffer, the loading flag, and the cancellation handle of the
//! most recent message fetch. Only coordinator command methods mutate that
//! state; readers take snapshots through the accessors.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use confab_client::chat::{ChatApi, Message, MessageQuery, Session};
use confab_client::http::{AbortHandle, TransportResult};

/// Page size used when loading the active conversation's history.
const MESSAGE_PAGE_LIMIT: u32 = 100;

/// Lifecycle of the active conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No active session id.
    Idle,
    /// A message fetch is in flight.
    Loading,
    /// Messages are populated for the active session.
    Loaded,
}

#[derive(Default)]
struct SessionState {
    sessions: Vec<Session>,
    active_id: String,
    messages: Vec<Message>,
    loading: bool,
    /// Cancellation handle of the most recently issued message fetch.
    abort: Option<AbortHandle>,
    enable_suggestions: bool,
}

/// Cloneable handle over the single-writer conversation state.
///
/// Cancellation is invoked only when the active session is deleted, not on
/// every session switch; a stale fetch issued before a switch can therefore
/// still overwrite the buffer when it resolves late. Callers switching
/// sessions clear the buffer, set the new active id, and reload.
#[derive(Clone)]
pub struct SessionCoordinator {
    api: Arc<ChatApi>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionCoordinator {
    pub fn new(api: ChatApi) -> Self {
        Self {
            api: Arc::new(api),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    // ========================================================================
    // Read accessors (snapshots)
    // ========================================================================

    pub fn sessions(&self) -> Vec<Session> {
        self.lock().sessions.clone()
    }

    pub fn active_session_id(&self) -> String {
        self.lock().active_id.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn enable_suggestions(&self) -> bool {
        self.lock().enable_suggestions
    }

    pub fn user(&self) -> String {
        self.api.transport().user().to_string()
    }

    pub fn phase(&self) -> SessionPhase {
        let state = self.lock();
        if state.active_id.is_empty() {
            SessionPhase::Idle
        } else if state.loading {
            SessionPhase::Loading
        } else {
            SessionPhase::Loaded
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub fn set_enable_suggestions(&self, enabled: bool) {
        self.lock().enable_suggestions = enabled;
    }

    /// Replaces the bearer credential; an empty key clears it.
    pub fn set_api_key(&self, key: &str) {
        self.api.transport().set_api_key(key);
    }

    /// Marks a session as active. Callers switching sessions are expected
    /// to call [`Self::clear_messages`] first and [`Self::load_messages`]
    /// after.
    pub fn set_active_session(&self, id: &str) {
        self.lock().active_id = id.to_string();
    }

    /// Synchronously resets the active id and the message buffer.
    pub fn clear_messages(&self) {
        let mut state = self.lock();
        state.active_id.clear();
        state.messages.clear();
    }

    /// Replaces the session list with the latest snapshot; stale entries
    /// are dropped, never merged. No-op without a configured credential.
    ///
    /// # Errors
    /// Propagates the classified transport failure.
    pub async fn refresh_sessions(&self) -> TransportResult<()> {
        if !self.api.transport().has_api_key() {
            return Ok(());
        }

        let page = self.api.conversations.call(None, None).await?;
        self.lock().sessions = page.data;
        Ok(())
    }

    /// Deletes a session. No-op for an empty id.
    ///
    /// Deleting the active session aborts the stored fetch handle and
    /// resets to idle before the list refresh is triggered. With
    /// `wait_refresh` the refresh is awaited; otherwise it runs
    /// fire-and-forget on the runtime.
    ///
    /// # Errors
    /// Propagates the classified transport failure.
    pub async fn delete_session(&self, id: &str, wait_refresh: bool) -> TransportResult<()> {
        if id.is_empty() {
            return Ok(());
        }

        self.api.delete_conversation(id).await?;

        if self.active_session_id() == id {
            if let Some(handle) = self.lock().abort.take() {
                handle.abort("active session deleted");
            }
            self.clear_messages();
        }

        if wait_refresh {
            self.refresh_sessions().await
        } else {
            let coordinator = self.clone();
            tokio::spawn(async move {
                if let Err(err) = coordinator.refresh_sessions().await {
                    tracing::warn!(
                        target: "confab::session",
                        "session list refresh after delete failed: {err}"
                    );
                }
            });
            Ok(())
        }
    }

    /// Loads the active session's history, stored ascending by creation
    /// time. Unless `silent`, the loading flag is raised for the duration;
    /// it is reset regardless of the outcome. No-op without a configured
    /// credential.
    ///
    /// A late response still lands in the buffer even if the active id
    /// changed in the meantime; only deletion aborts the in-flight fetch.
    ///
    /// # Errors
    /// Propagates the classified transport failure.
    pub async fn load_messages(&self, silent: bool) -> TransportResult<()> {
        if !self.api.transport().has_api_key() {
            return Ok(());
        }

        let conversation_id = {
            let mut state = self.lock();
            if !silent {
                state.loading = true;
            }
            state.abort = Some(self.api.messages.abort_handle());
            state.active_id.clone()
        };

        let query = MessageQuery {
            conversation_id,
            first_id: None,
            limit: Some(MESSAGE_PAGE_LIMIT),
        };
        let result = self.api.messages.call(Some(&query), None).await;

        let mut state = self.lock();
        state.loading = false;
        match result {
            Ok(page) => {
                let mut batch = page.data;
                batch.sort_by_key(|message| message.created_at);
                state.messages = batch;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
