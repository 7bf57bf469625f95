#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use agora_config::{AgentCatalog, AgentConfig};
use agora_core::{ChunkStream, TextChunk, UpstreamError, UpstreamModel};
use agora_model::turn::{NewTurn, Turn, TurnId, TurnRole};
use agora_relay::{BoxError, ConversationInfo, EntitlementChecker, MessageStore, RelayConfig, RelayEvent, SessionManager};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

pub const FREE_AGENT: &str = "code-helper";
pub const PREMIUM_AGENT: &str = "business-advisor";

#[derive(Default)]
pub struct MemoryStore {
    conversations: Mutex<HashMap<Uuid, (ConversationInfo, Vec<Turn>)>>,
    reject_agent_turns: AtomicBool,
}

impl MemoryStore {
    pub async fn add_conversation(&self, user_id: Uuid, agent_id: &str) -> Uuid {
        let conversation_id = Uuid::new_v4();
        let info = ConversationInfo {
            conversation_id,
            user_id,
            agent_id: agent_id.to_owned(),
        };
        self.conversations
            .lock()
            .await
            .insert(conversation_id, (info, Vec::new()));
        conversation_id
    }

    /// Makes every following append of an agent turn fail.
    pub fn reject_agent_turns(&self) {
        self.reject_agent_turns.store(true, Ordering::SeqCst);
    }

    pub async fn turns(&self, conversation_id: Uuid) -> Vec<Turn> {
        self.list_turns(conversation_id).await.unwrap()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn conversation(&self, conversation_id: Uuid) -> Result<Option<ConversationInfo>, BoxError> {
        Ok(self
            .conversations
            .lock()
            .await
            .get(&conversation_id)
            .map(|(info, _)| info.clone()))
    }

    async fn append(&self, conversation_id: Uuid, turn: NewTurn) -> Result<TurnId, BoxError> {
        if turn.role == TurnRole::Agent && self.reject_agent_turns.load(Ordering::SeqCst) {
            return Err("store unavailable".into());
        }
        let mut conversations = self.conversations.lock().await;
        let (_, turns) = conversations
            .get_mut(&conversation_id)
            .ok_or("unknown conversation")?;
        let turn_order = TurnId::try_from(turns.len())?;
        turns.push(Turn {
            conversation_id,
            turn_order,
            role: turn.role,
            content: turn.content,
            status: turn.status,
            created_at: Utc::now().naive_utc(),
        });
        Ok(turn_order)
    }

    async fn list_turns(&self, conversation_id: Uuid) -> Result<Vec<Turn>, BoxError> {
        Ok(self
            .conversations
            .lock()
            .await
            .get(&conversation_id)
            .map(|(_, turns)| turns.clone())
            .unwrap_or_default())
    }
}

pub type ChunkSender = mpsc::Sender<Result<TextChunk, UpstreamError>>;

/// A started upstream call. Dropping `chunks` ends the stream.
pub struct UpstreamCall {
    pub agent_id: String,
    pub history: Vec<Turn>,
    pub chunks: ChunkSender,
}

impl UpstreamCall {
    pub async fn chunk(&self, text: &str) {
        self.chunks.send(Ok(TextChunk::new(text))).await.unwrap();
    }

    pub async fn fail(self, error: UpstreamError) {
        self.chunks.send(Err(error)).await.unwrap();
    }
}

/// Upstream whose streams are fed by the test.
pub struct ScriptedUpstream {
    calls: mpsc::UnboundedSender<UpstreamCall>,
    fail_open: Mutex<Option<UpstreamError>>,
}

impl ScriptedUpstream {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UpstreamCall>) {
        let (calls, receiver) = mpsc::unbounded_channel();
        (
            Self {
                calls,
                fail_open: Mutex::default(),
            },
            receiver,
        )
    }

    pub async fn fail_next_open(&self, error: UpstreamError) {
        *self.fail_open.lock().await = Some(error);
    }
}

#[async_trait]
impl UpstreamModel for ScriptedUpstream {
    async fn stream(&self, history: Vec<Turn>, agent: &AgentConfig) -> Result<ChunkStream, UpstreamError> {
        if let Some(error) = self.fail_open.lock().await.take() {
            return Err(error);
        }
        let (chunks, receiver) = mpsc::channel(8);
        let _ = self.calls.send(UpstreamCall {
            agent_id: agent.id.clone(),
            history,
            chunks,
        });
        Ok(Box::pin(ReceiverStream::new(receiver)))
    }
}

/// Free agents for everyone, premium agents for listed users.
#[derive(Default)]
pub struct StaticEntitlements {
    granted: Mutex<HashSet<(Uuid, String)>>,
}

impl StaticEntitlements {
    pub async fn grant(&self, user_id: Uuid, agent_id: &str) {
        self.granted.lock().await.insert((user_id, agent_id.to_owned()));
    }
}

#[async_trait]
impl EntitlementChecker for StaticEntitlements {
    async fn is_entitled(&self, user_id: Uuid, agent: &AgentConfig) -> Result<bool, BoxError> {
        Ok(agent.is_free() || self.granted.lock().await.contains(&(user_id, agent.id.clone())))
    }
}

pub struct Harness {
    pub manager: SessionManager,
    pub store: Arc<MemoryStore>,
    pub upstream: Arc<ScriptedUpstream>,
    pub calls: mpsc::UnboundedReceiver<UpstreamCall>,
    pub entitlements: Arc<StaticEntitlements>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    pub fn with_config(config: RelayConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        let (upstream, calls) = ScriptedUpstream::new();
        let upstream = Arc::new(upstream);
        let entitlements = Arc::new(StaticEntitlements::default());
        let catalog = Arc::new(AgentCatalog::builtin().unwrap());
        let manager = SessionManager::new(
            store.clone(),
            upstream.clone(),
            entitlements.clone(),
            catalog,
            config,
        );
        Self {
            manager,
            store,
            upstream,
            calls,
            entitlements,
        }
    }

    pub async fn next_call(&mut self) -> UpstreamCall {
        tokio::time::timeout(Duration::from_secs(5), self.calls.recv())
            .await
            .expect("upstream was not called")
            .expect("upstream dropped")
    }
}

pub async fn next_event(events: &mut mpsc::Receiver<RelayEvent>) -> RelayEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no event received")
        .expect("event channel closed")
}
