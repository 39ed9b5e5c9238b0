use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use tracing::{error, info};
use uuid::Uuid;

use super::types::{ChatRequest, ChatResponse, HistoryResponse, TurnResponse};
use crate::{AppState, chat::SharedGenerator};

type ApiError = (StatusCode, String);

pub fn chat_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(ask))
        .route("/chat/{session_id}", delete(end_session))
        .route("/chat/{session_id}/reset", post(reset_session))
        .route("/chat/{session_id}/history", get(history))
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid session id '{raw}': {err}"),
        )
    })
}

async fn find_session(state: &AppState, raw: &str) -> Result<(Uuid, SharedGenerator), ApiError> {
    let id = parse_session_id(raw)?;
    let generator = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown session {id}")))?;
    Ok((id, generator))
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question must not be empty".into()));
    }

    let (session_id, generator) = match request.session_id.as_deref() {
        Some(raw) => find_session(&state, raw).await?,
        None => state.sessions.create().await,
    };

    let mut generator = generator.lock().await;
    let answer = generator.respond(question).await.map_err(|err| {
        error!(session_id = %session_id, error = %format!("{err:#}"), "generation failed");
        (
            StatusCode::BAD_GATEWAY,
            format!("failed to generate answer: {err:#}"),
        )
    })?;

    Ok(Json(ChatResponse {
        session_id: session_id.to_string(),
        answer: answer.answer,
        context: answer.context,
    }))
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let (id, generator) = find_session(&state, &session_id).await?;
    let generator = generator.lock().await;
    Ok(Json(HistoryResponse {
        session_id: id.to_string(),
        turns: generator.history().iter().map(TurnResponse::from).collect(),
    }))
}

async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let (id, generator) = find_session(&state, &session_id).await?;
    generator.lock().await.reset();
    info!(session_id = %id, "session history cleared");
    Ok(StatusCode::NO_CONTENT)
}

async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&session_id)?;
    if state.sessions.remove(&id).await {
        info!(session_id = %id, "session ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("unknown session {id}")))
    }
}
