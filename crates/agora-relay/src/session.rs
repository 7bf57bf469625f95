use std::collections::HashMap;
use std::sync::Arc;

use agora_config::{AgentCatalog, AgentConfig};
use agora_core::UpstreamModel;
use agora_model::turn::{NewTurn, Turn};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, instrument};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::entitlement::EntitlementChecker;
use crate::error::RelayError;
use crate::event::RelayEvent;
use crate::generation::{Generation, GenerationHandle, GenerationState, wait_terminal};
use crate::store::MessageStore;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, TypedBuilder)]
pub struct RelayConfig {
    /// Number of stored turns replayed to the model, including the new user turn.
    #[builder(default = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub(crate) struct RelayContext {
    pub(crate) store: Arc<dyn MessageStore>,
    pub(crate) upstream: Arc<dyn UpstreamModel>,
    pub(crate) entitlements: Arc<dyn EntitlementChecker>,
    pub(crate) catalog: Arc<AgentCatalog>,
    pub(crate) config: RelayConfig,
}

struct Registration {
    session_id: Uuid,
    session_token: CancellationToken,
    superseded: CancellationToken,
    tracker: TaskTracker,
}

type Registry = Arc<Mutex<HashMap<Uuid, Registration>>>;

fn deregister(sessions: &mut HashMap<Uuid, Registration>, user_id: Uuid, session_id: Uuid) {
    if sessions
        .get(&user_id)
        .is_some_and(|registration| registration.session_id == session_id)
    {
        sessions.remove(&user_id);
    }
}

/// Hands out sessions. Each user has at most one live session; opening a new one
/// supersedes the previous session of that user.
#[derive(Clone)]
pub struct SessionManager {
    context: Arc<RelayContext>,
    sessions: Registry,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn MessageStore>,
        upstream: Arc<dyn UpstreamModel>,
        entitlements: Arc<dyn EntitlementChecker>,
        catalog: Arc<AgentCatalog>,
        config: RelayConfig,
    ) -> Self {
        Self {
            context: Arc::new(RelayContext {
                store,
                upstream,
                entitlements,
                catalog,
                config,
            }),
            sessions: Arc::default(),
        }
    }

    /// Opens a session for the user. A previous session of the same user is cancelled
    /// and every one of its generations is flushed before the new session is returned.
    #[instrument(skip(self, outbound))]
    pub async fn open(&self, user_id: Uuid, outbound: mpsc::Sender<RelayEvent>) -> Session {
        let session_id = Uuid::new_v4();
        let token = CancellationToken::new();
        let superseded = CancellationToken::new();
        let tracker = TaskTracker::new();

        let previous = self.sessions.lock().await.insert(
            user_id,
            Registration {
                session_id,
                session_token: token.clone(),
                superseded: superseded.clone(),
                tracker: tracker.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::info!(previous = %previous.session_id, "superseding session");
            previous.superseded.cancel();
            previous.session_token.cancel();
            // Partial turns of the old session have to be stored before new turns.
            previous.tracker.close();
            previous.tracker.wait().await;
            tracing::debug!(previous = %previous.session_id, "previous session flushed");
        }
        tracing::debug!(%session_id, "opened session");

        Session {
            shared: Arc::new(SessionShared {
                session_id,
                user_id,
                outbound,
                token,
                tracker,
                in_flight: Mutex::default(),
                context: Arc::clone(&self.context),
            }),
            superseded,
            sessions: Arc::clone(&self.sessions),
        }
    }

    /// Number of users with a live session.
    pub async fn live_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

struct InFlight {
    generation_id: Uuid,
    token: CancellationToken,
    state: watch::Receiver<GenerationState>,
}

struct SessionShared {
    session_id: Uuid,
    user_id: Uuid,
    outbound: mpsc::Sender<RelayEvent>,
    token: CancellationToken,
    tracker: TaskTracker,
    in_flight: Mutex<HashMap<Uuid, InFlight>>,
    context: Arc<RelayContext>,
}

impl SessionShared {
    async fn release(&self, conversation_id: Uuid, generation_id: Uuid) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .get(&conversation_id)
            .is_some_and(|entry| entry.generation_id == generation_id)
        {
            in_flight.remove(&conversation_id);
        }
    }
}

/// Server side state of one connected client.
///
/// Dropping a session cancels its generations without waiting for them; use
/// [`Session::close`] to wait until every partial turn has been stored.
pub struct Session {
    shared: Arc<SessionShared>,
    superseded: CancellationToken,
    sessions: Registry,
}

impl Session {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.shared.user_id
    }

    /// Resolves when another session of the same user replaced this one.
    pub fn superseded(&self) -> WaitForCancellationFuture<'_> {
        self.superseded.cancelled()
    }

    /// Conversations with a live generation.
    pub async fn in_flight(&self) -> Vec<Uuid> {
        self.shared.in_flight.lock().await.keys().copied().collect()
    }

    /// Stores the user turn and starts a generation for it.
    #[instrument(skip(self, text), fields(session_id = %self.shared.session_id, user_id = %self.shared.user_id))]
    pub async fn submit(&self, conversation_id: Uuid, text: String) -> Result<GenerationHandle, RelayError> {
        if text.trim().is_empty() {
            return Err(RelayError::EmptyMessage);
        }
        let shared = &self.shared;
        // Held until the generation is spawned, so that waiting on the tracker also covers
        // submits that are still being prepared.
        let _submitting = shared.tracker.token();
        if shared.token.is_cancelled() {
            return Err(RelayError::SessionClosed);
        }

        let generation_id = Uuid::new_v4();
        let token = shared.token.child_token();
        let (state_tx, state_rx) = watch::channel(GenerationState::Pending);
        {
            let mut in_flight = shared.in_flight.lock().await;
            if in_flight.contains_key(&conversation_id) {
                tracing::debug!("rejecting overlapping generation");
                return Err(RelayError::Conflict(conversation_id));
            }
            in_flight.insert(
                conversation_id,
                InFlight {
                    generation_id,
                    token: token.clone(),
                    state: state_rx.clone(),
                },
            );
        }

        let (agent, history) = match self.prepare(conversation_id, text).await {
            Ok(prepared) => prepared,
            Err(error) => {
                shared.release(conversation_id, generation_id).await;
                return Err(error);
            }
        };

        let generation = Generation::new(conversation_id, generation_id, token, state_tx, shared.outbound.clone());
        let span = tracing::info_span!("generation", %conversation_id, %generation_id, agent_id = %agent.id);
        let task_shared = Arc::clone(shared);
        shared.tracker.spawn(
            async move {
                let (generation, state) = generation
                    .run(Arc::clone(&task_shared.context), agent, history)
                    .await;
                task_shared
                    .release(generation.conversation_id, generation.generation_id)
                    .await;
                generation.state.send_replace(state);
            }
            .instrument(span),
        );

        Ok(GenerationHandle::new(conversation_id, generation_id, state_rx))
    }

    async fn prepare(&self, conversation_id: Uuid, text: String) -> Result<(Arc<AgentConfig>, Vec<Turn>), RelayError> {
        let shared = &self.shared;
        let context = &shared.context;

        let conversation = context
            .store
            .conversation(conversation_id)
            .await
            .map_err(RelayError::Store)?
            .ok_or(RelayError::ConversationNotFound(conversation_id))?;
        if conversation.user_id != shared.user_id {
            tracing::warn!(owner = %conversation.user_id, "conversation belongs to another user");
            return Err(RelayError::Forbidden(conversation_id));
        }

        let Some(agent) = context.catalog.get(&conversation.agent_id) else {
            tracing::warn!(agent_id = %conversation.agent_id, "agent is no longer offered");
            return Err(RelayError::Forbidden(conversation_id));
        };
        let entitled = context
            .entitlements
            .is_entitled(shared.user_id, &agent)
            .await
            .map_err(RelayError::Entitlement)?;
        if !entitled {
            tracing::info!(agent_id = %agent.id, "user is not entitled to agent");
            return Err(RelayError::Forbidden(conversation_id));
        }

        let turn_id = context
            .store
            .append(conversation_id, NewTurn::user(text))
            .await
            .map_err(RelayError::Store)?;
        tracing::debug!(turn_id, "stored user turn");

        let history = context
            .store
            .recent_turns(conversation_id, context.config.history_limit)
            .await
            .map_err(RelayError::Store)?;
        Ok((agent, history))
    }

    /// Cancels the generation of a conversation and waits until its partial turn is stored.
    ///
    /// Returns `false` if nothing was running.
    #[instrument(skip(self), fields(session_id = %self.shared.session_id))]
    pub async fn cancel(&self, conversation_id: Uuid) -> bool {
        let entry = {
            let in_flight = self.shared.in_flight.lock().await;
            in_flight
                .get(&conversation_id)
                .map(|entry| (entry.token.clone(), entry.state.clone()))
        };
        let Some((token, state)) = entry else {
            return false;
        };
        token.cancel();
        let state = wait_terminal(state).await;
        tracing::debug!(?state, "generation cancelled");
        true
    }

    /// Cancels every generation and waits until all of them are flushed.
    #[instrument(skip(self), fields(session_id = %self.shared.session_id))]
    pub async fn close(self) {
        self.shared.token.cancel();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;

        deregister(
            &mut *self.sessions.lock().await,
            self.shared.user_id,
            self.shared.session_id,
        );
        tracing::debug!("closed session");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.token.cancel();
        let user_id = self.shared.user_id;
        let session_id = self.shared.session_id;
        if let Ok(mut sessions) = self.sessions.try_lock() {
            deregister(&mut sessions, user_id, session_id);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sessions = Arc::clone(&self.sessions);
                handle.spawn(async move {
                    deregister(&mut *sessions.lock().await, user_id, session_id);
                });
            }
            Err(_) => tracing::warn!(%session_id, "no runtime to deregister dropped session"),
        }
    }
}
