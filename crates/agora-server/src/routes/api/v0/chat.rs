mod error;

use crate::AppConfig;
use crate::user::ExtractUser;
use agora_relay::{RelayError, RelayEvent, Session};
use axum::body::Bytes;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use error::WsError;
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use utoipa::ToSchema;
use uuid::Uuid;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) fn create_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/ws", get(setup_ws)).with_state(())
}

/// Frames sent by the client.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub(crate) enum ClientFrame {
    Message { conversation_id: Uuid, text: String },
    Cancel { conversation_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RejectReason {
    Conflict,
    Forbidden,
    NotFound,
    Invalid,
    Unavailable,
}

/// Frames the server sends besides the relay events.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub(crate) enum ControlFrame {
    Rejected {
        conversation_id: Uuid,
        reason: RejectReason,
    },
}

impl RejectReason {
    fn from_error(error: &RelayError) -> Option<Self> {
        let reason = match error {
            RelayError::Conflict(_) => Self::Conflict,
            RelayError::Forbidden(_) => Self::Forbidden,
            RelayError::ConversationNotFound(_) => Self::NotFound,
            RelayError::EmptyMessage => Self::Invalid,
            RelayError::Store(_) | RelayError::Entitlement(_) => Self::Unavailable,
            RelayError::SessionClosed => return None,
        };
        Some(reason)
    }
}

#[utoipa::path(
    get,
    path = "/api/v0/chat/ws",
    responses(
        (status = SWITCHING_PROTOCOLS, description = "Streams agent answers. The client sends `ClientFrame`s and receives `RelayEvent`s and `ControlFrame`s"),
        (status = UNAUTHORIZED, description = "Missing or invalid token"),
    ),
    params(
        ("access_token" = Option<String>, Query, description = "token for clients that can't set headers"),
    ),
    tag = "v0/chat",
    security(
        ("token" = [])
    )
)]
pub(crate) async fn setup_ws(
    ws: WebSocketUpgrade,
    ExtractUser(user): ExtractUser,
    Extension(app_config): Extension<AppConfig>,
) -> impl IntoResponse {
    tracing::debug!(user.id = %user.id, "setting up websocket");
    ws.on_upgrade(move |socket| handle_socket(socket, app_config, user.id).boxed())
}

struct ErrorSignal<E> {
    signal: CancellationToken,
    error: Arc<Mutex<Option<E>>>,
}

impl<E> ErrorSignal<E> {
    fn new() -> Self {
        Self {
            signal: CancellationToken::new(),
            error: Arc::new(Mutex::new(None)),
        }
    }

    async fn set(&self, error: E) {
        let mut error_guard = self.error.lock().await;
        *error_guard = Some(error);
        self.notify();
    }

    fn notify(&self) {
        self.signal.cancel();
    }

    fn cancelled(&self) -> Pin<Box<WaitForCancellationFutureOwned>> {
        Box::pin(self.signal.clone().cancelled_owned())
    }

    async fn take(&self) -> Option<E> {
        let mut error_guard = self.error.lock().await;
        error_guard.take()
    }
}

impl<E> Clone for ErrorSignal<E> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            error: Arc::clone(&self.error),
        }
    }
}

fn encode<T: Serialize>(frame: &T) -> Result<Message, serde_json::Error> {
    Ok(Message::Text(serde_json::to_string(frame)?.into()))
}

#[tracing::instrument(skip(socket, app_config))]
async fn handle_socket(socket: WebSocket, app_config: AppConfig, user_id: Uuid) {
    // By splitting socket we can send and receive at the same time.
    let (mut sender, mut receiver) = socket.split();
    let (send_channel_sender, mut send_channel_receiver) = mpsc::channel::<Message>(16);
    let (event_sender, mut event_receiver) = mpsc::channel::<RelayEvent>(64);
    let error_signal: ErrorSignal<WsError> = ErrorSignal::new();

    let session = app_config.sessions().open(user_id, event_sender).await;

    let send_processor_error_signal = error_signal.clone();
    let send_processor = tokio::task::spawn(async move {
        let mut signal = send_processor_error_signal.cancelled();
        let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + PING_INTERVAL, PING_INTERVAL);
        let mut messages_open = true;
        let mut events_open = true;
        // Runs until both channels are drained and closed.
        while messages_open || events_open {
            let message = tokio::select! {
                biased;
                () = &mut signal => {
                    tracing::debug!("error signal received: closing send processor");
                    break
                },
                message = send_channel_receiver.recv(), if messages_open => {
                    let Some(message) = message else {
                        messages_open = false;
                        continue
                    };
                    message
                },
                event = event_receiver.recv(), if events_open => {
                    let Some(event) = event else {
                        events_open = false;
                        continue
                    };
                    match encode(&event) {
                        Ok(message) => message,
                        Err(error) => {
                            tracing::error!(error = &error as &dyn Error, "failed to encode relay event");
                            continue
                        }
                    }
                },
                _ = ping.tick() => Message::Ping(Bytes::new()),
            };
            if let Err(error) = sender.send(message).await {
                tracing::error!(error = %error, "error sending message");
                send_processor_error_signal.notify();
                break
            }
        }
        sender
    });

    let mut error_signal_future = error_signal.cancelled();
    loop {
        let message = tokio::select! {
            biased;
            () = &mut error_signal_future => {
                tracing::debug!("error signal received: closing receiver");
                break
            },
            () = session.superseded() => {
                tracing::info!("session superseded by a newer connection");
                error_signal.set(WsError::Superseded).await;
                break
            },
            message = receiver.next() => {
                let Some(message) = message else {
                    break
                };
                message
            },
        };
        if let Err(error) = handle_message(&session, &send_channel_sender, message).await {
            if let WsError::Send(_) = &error {
                tracing::info!("aborting request handling because the sender is closed");
                break;
            }
            tracing::error!(error = &error as &dyn Error, "error handling request");
            error_signal.set(error).await;
            break;
        }
    }
    // Partial answers are stored before the socket goes away.
    session.close().await;
    drop(send_channel_sender);

    let sender = send_processor.await;
    match sender {
        Ok(mut sender) => {
            if let Some(error) = error_signal.take().await {
                tracing::debug!(error = &error as &dyn Error, "closing connection because of error");
                sender
                    .send(Message::Close(Some(error.into_close_frame())))
                    .await
                    .unwrap_or_else(|error| tracing::error!(error = &error as &dyn Error, "error closing connection"));
            }
        }
        Err(error) => {
            tracing::error!(error = %error, "error processing request");
            if let Some(error) = error_signal.take().await {
                // We can't send the close frame,
                //  because the sender is owned by the task that errored
                tracing::warn!(
                    error = &error as &dyn Error,
                    "closing connection because of error without sending close frame"
                );
            }
        }
    }
    tracing::debug!("websocket connection closed");
}

async fn handle_message(
    session: &Session,
    sender: &Sender<Message>,
    message: Result<Message, axum::Error>,
) -> Result<(), WsError> {
    let message = message.inspect_err(|error| {
        tracing::error!(error = error as &dyn Error, "error receiving message");
    })?;
    let message = match message {
        Message::Text(message) => message,
        Message::Binary(_) => {
            // We don't expect any binary messages
            return Err(WsError::RequestError("unexpected binary message".to_string()));
        }
        Message::Close(_) | Message::Ping(_) | Message::Pong(_) => {
            // The library handles control messages
            return Ok(());
        }
    };
    let frame: ClientFrame = serde_json::from_str(message.as_str())?;
    tracing::debug!(frame = ?frame, "handling frame");

    match frame {
        ClientFrame::Message { conversation_id, text } => match session.submit(conversation_id, text).await {
            Ok(handle) => {
                tracing::debug!(%conversation_id, generation_id = %handle.generation_id(), "generation started");
            }
            Err(error) => {
                tracing::info!(error = &error as &dyn Error, %conversation_id, "rejected message");
                if let Some(reason) = RejectReason::from_error(&error) {
                    sender
                        .send(encode(&ControlFrame::Rejected { conversation_id, reason })?)
                        .await?;
                }
            }
        },
        ClientFrame::Cancel { conversation_id } => {
            let cancelled = session.cancel(conversation_id).await;
            tracing::debug!(%conversation_id, cancelled, "handled cancel");
        }
    }
    Ok(())
}
