use std::sync::Arc;

use agora_config::AgentConfig;
use agora_model::error_kind::ErrorKind;
use agora_model::turn::{NewTurn, Turn, TurnStatus};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::event::RelayEvent;
use crate::session::RelayContext;

/// Lifecycle of a single generation.
///
/// `Pending` and `Streaming` are live. The other states are terminal and only become
/// visible once the agent turn has been written and the client notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Pending,
    Streaming,
    Completed,
    Aborted,
    Failed(ErrorKind),
}

impl GenerationState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationState::Pending | GenerationState::Streaming)
    }
}

/// Observer for a running generation.
#[derive(Debug, Clone)]
pub struct GenerationHandle {
    conversation_id: Uuid,
    generation_id: Uuid,
    state: watch::Receiver<GenerationState>,
}

impl GenerationHandle {
    pub(crate) fn new(conversation_id: Uuid, generation_id: Uuid, state: watch::Receiver<GenerationState>) -> Self {
        Self {
            conversation_id,
            generation_id,
            state,
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    #[must_use]
    pub fn generation_id(&self) -> Uuid {
        self.generation_id
    }

    #[must_use]
    pub fn state(&self) -> GenerationState {
        *self.state.borrow()
    }

    /// Resolves once the generation reached a terminal state and its turn was flushed.
    pub async fn finished(&self) -> GenerationState {
        wait_terminal(self.state.clone()).await
    }
}

pub(crate) async fn wait_terminal(mut state: watch::Receiver<GenerationState>) -> GenerationState {
    let terminal = state.wait_for(GenerationState::is_terminal).await.map(|state| *state);
    // Sender went away before the generation started.
    terminal.unwrap_or_else(|_| *state.borrow())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Aborted,
    Failed(ErrorKind),
}

impl From<Outcome> for GenerationState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => GenerationState::Completed,
            Outcome::Aborted => GenerationState::Aborted,
            Outcome::Failed(kind) => GenerationState::Failed(kind),
        }
    }
}

pub(crate) struct Generation {
    pub(crate) conversation_id: Uuid,
    pub(crate) generation_id: Uuid,
    pub(crate) token: CancellationToken,
    pub(crate) state: watch::Sender<GenerationState>,
    pub(crate) outbound: mpsc::Sender<RelayEvent>,
    accumulated: String,
}

impl Generation {
    pub(crate) fn new(
        conversation_id: Uuid,
        generation_id: Uuid,
        token: CancellationToken,
        state: watch::Sender<GenerationState>,
        outbound: mpsc::Sender<RelayEvent>,
    ) -> Self {
        Self {
            conversation_id,
            generation_id,
            token,
            state,
            outbound,
            accumulated: String::new(),
        }
    }

    /// Drives the generation to a terminal state and flushes it. Returns the final state.
    pub(crate) async fn run(
        mut self,
        context: Arc<RelayContext>,
        agent: Arc<AgentConfig>,
        history: Vec<Turn>,
    ) -> (Self, GenerationState) {
        let outcome = self.drive(&context, &agent, history).await;
        tracing::debug!(?outcome, chars = self.accumulated.len(), "generation finished");
        self.flush(&context, outcome).await;
        (self, outcome.into())
    }

    async fn drive(&mut self, context: &RelayContext, agent: &AgentConfig, history: Vec<Turn>) -> Outcome {
        let opened = tokio::select! {
            biased;
            () = self.token.cancelled() => return Outcome::Aborted,
            opened = context.upstream.stream(history, agent) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(error) => return Outcome::Failed(error.report()),
        };
        self.state.send_replace(GenerationState::Streaming);

        loop {
            let item = tokio::select! {
                biased;
                () = self.token.cancelled() => return Outcome::Aborted,
                item = stream.next() => item,
            };
            let chunk = match item {
                None => return Outcome::Completed,
                Some(Err(error)) => return Outcome::Failed(error.report()),
                Some(Ok(chunk)) => chunk,
            };

            let event = RelayEvent::Chunk {
                conversation_id: self.conversation_id,
                content: chunk.text.clone(),
            };
            let sent = tokio::select! {
                biased;
                () = self.token.cancelled() => return Outcome::Aborted,
                sent = self.outbound.send(event) => sent,
            };
            if sent.is_err() {
                tracing::debug!("client went away while streaming");
                return Outcome::Aborted;
            }
            // Only forwarded text ends up in the stored turn.
            self.accumulated.push_str(&chunk.text);
        }
    }

    async fn flush(&mut self, context: &RelayContext, outcome: Outcome) {
        let status = match outcome {
            Outcome::Completed => TurnStatus::Complete,
            Outcome::Aborted => TurnStatus::Partial,
            Outcome::Failed(_) => TurnStatus::Failed,
        };
        let content = std::mem::take(&mut self.accumulated);
        let stored = context
            .store
            .append(self.conversation_id, NewTurn::agent(content, status))
            .await
            .inspect_err(|error| {
                tracing::error!(error = error.as_ref() as &dyn std::error::Error, %status, "failed to store agent turn");
            });

        let event = match outcome {
            Outcome::Completed if stored.is_ok() => RelayEvent::TurnComplete {
                conversation_id: self.conversation_id,
            },
            Outcome::Completed => RelayEvent::TurnError {
                conversation_id: self.conversation_id,
                kind: ErrorKind::Unknown,
            },
            Outcome::Failed(kind) => RelayEvent::TurnError {
                conversation_id: self.conversation_id,
                kind,
            },
            Outcome::Aborted => return,
        };

        tokio::select! {
            biased;
            sent = self.outbound.send(event) => {
                if sent.is_err() {
                    tracing::debug!("client went away before the end of turn");
                }
            }
            () = self.token.cancelled() => {
                tracing::debug!("session closing, dropping end of turn event");
            }
        }
    }
}
