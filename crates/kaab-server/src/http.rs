//! HTTP handlers: chatbot, store hooks, health, metrics, WebSocket upgrade.

use std::time::Instant;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kaab_assistant::EngineError;
use kaab_core::messages::ChatTurn;
use kaab_core::topics::ThreadRef;
use kaab_core::traits::{NewNotification, Notification};
use kaab_core::{ChannelId, CollaboratorError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::health::{self, HealthResponse};
use crate::realtime::run_ws_session;
use crate::server::AppState;

/// Error body: `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub enum ApiError {
    /// Request body did not parse.
    BadRequest(String),
    /// Response engine failure.
    Engine(EngineError),
    /// Notification store failure.
    Store(CollaboratorError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Engine(EngineError::Input(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::Upstream { .. }) | Self::Store(_) => StatusCode::BAD_GATEWAY,
            Self::Engine(EngineError::Configuration(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "invalid_input",
            Self::Engine(e) => e.code(),
            Self::Store(_) => "upstream_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Upstream causes stay in the logs.
        let message = match &self {
            Self::BadRequest(msg) => msg.clone(),
            Self::Engine(EngineError::Input(msg) | EngineError::Configuration(msg)) => msg.clone(),
            Self::Engine(EngineError::Upstream { .. }) => {
                "the assistant could not reach an upstream service".to_string()
            }
            Self::Store(_) => "the notification store is unavailable".to_string(),
        };
        let body = Json(json!({
            "error": { "code": self.code(), "message": message }
        }));
        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<CollaboratorError> for ApiError {
    fn from(err: CollaboratorError) -> Self {
        Self::Store(err)
    }
}

/// `POST /api/chatbot` body.
#[derive(Debug, Deserialize)]
pub struct ChatbotRequest {
    /// Conversation so far, oldest first.
    pub messages: Vec<ChatTurn>,
}

/// `POST /api/chatbot` reply.
#[derive(Debug, Serialize)]
pub struct ChatbotResponse {
    /// Assistant reply text.
    pub response: String,
}

/// POST /api/chatbot
pub async fn chatbot(
    State(state): State<AppState>,
    body: Result<Json<ChatbotRequest>, JsonRejection>,
) -> Result<Json<ChatbotResponse>, ApiError> {
    let Json(request) = body?;
    let started = Instant::now();
    let result = state.engine.respond(&request.messages).await;
    metrics::histogram!("chatbot_request_duration_seconds")
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(response) => {
            metrics::counter!("chatbot_requests_total", "outcome" => "ok").increment(1);
            Ok(Json(ChatbotResponse { response }))
        }
        Err(e) => {
            metrics::counter!("chatbot_requests_total", "outcome" => e.code()).increment(1);
            match &e {
                EngineError::Input(_) => debug!(error = %e, "rejected chatbot request"),
                EngineError::Upstream { .. } => error!(error = %e, "chatbot upstream failure"),
                EngineError::Configuration(_) => warn!(error = %e, "chatbot unavailable"),
            }
            Err(e.into())
        }
    }
}

/// `POST /internal/messages` body.
#[derive(Debug, Deserialize)]
pub struct MessageSaved {
    /// Thread the message was stored in.
    pub thread: ThreadRef,
    /// Stored message document.
    pub message: Value,
}

/// How many live connections a publish reached.
#[derive(Debug, Serialize)]
pub struct Delivered {
    /// Connections the event was enqueued for.
    pub delivered: usize,
}

/// POST /internal/messages
pub async fn message_saved(
    State(state): State<AppState>,
    body: Result<Json<MessageSaved>, JsonRejection>,
) -> Result<Json<Delivered>, ApiError> {
    let Json(saved) = body?;
    let delivered = state
        .dispatcher
        .message_saved(&saved.thread, saved.message)
        .await;
    Ok(Json(Delivered { delivered }))
}

/// `POST /internal/questions` body.
#[derive(Debug, Deserialize)]
pub struct QuestionPosted {
    /// Stored question document.
    pub question: Value,
}

/// POST /internal/questions
pub async fn question_posted(
    State(state): State<AppState>,
    body: Result<Json<QuestionPosted>, JsonRejection>,
) -> Result<Json<Delivered>, ApiError> {
    let Json(posted) = body?;
    let delivered = state.dispatcher.question_posted(posted.question).await;
    Ok(Json(Delivered { delivered }))
}

/// `POST /internal/notifications` reply.
#[derive(Debug, Serialize)]
pub struct NotificationCreated {
    /// The persisted notification.
    pub notification: Notification,
    /// Whether the recipient was online to receive it.
    pub delivered: bool,
}

/// POST /internal/notifications
pub async fn create_notification(
    State(state): State<AppState>,
    body: Result<Json<NewNotification>, JsonRejection>,
) -> Result<(StatusCode, Json<NotificationCreated>), ApiError> {
    let Json(request) = body?;
    let notification = state
        .notifications
        .create_notification(request)
        .await
        .inspect_err(|e| error!(error = %e, "notification store failed"))?;
    let delivered = state.dispatcher.notification_created(&notification).await;
    Ok((
        StatusCode::CREATED,
        Json(NotificationCreated {
            notification,
            delivered,
        }),
    ))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.dispatcher.broker().connection_count().await;
    Json(health::health_check(
        state.start_time,
        connections,
        state.dispatcher.registry().online_count(),
        state.engine.cache().len(),
    ))
}

/// GET /metrics
pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /ws
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let channel_id = ChannelId::new();
    debug!(channel_id = %channel_id, "websocket upgrade");
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                channel_id,
                state.dispatcher,
                state.limits,
                state.shutdown,
            )
        })
}
