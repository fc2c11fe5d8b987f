use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use vibesync_types::api::{MessageResponse, SendMessageRequest, UserSummary};

use crate::auth::AppState;
use crate::convert::{parse_created_at, parse_uuid};
use crate::error::ApiError;
use crate::middleware::Claims;

pub async fn send_message(
    State(state): State<AppState>,
    Path(recipient_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::InvalidArgument("message cannot be empty".into()));
    }

    let message_id = Uuid::new_v4();
    let inserted = state.db.insert_message(
        &message_id.to_string(),
        &claims.sub.to_string(),
        &recipient_id.to_string(),
        text,
    )?;
    if !inserted {
        return Err(ApiError::NotFound("recipient not found"));
    }

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            sender_id: claims.sub,
            recipient_id,
            text: text.to_string(),
            created_at: chrono::Utc::now(),
        }),
    ))
}

/// The thread as the caller's own box records it, in append order.
pub async fn thread(
    State(state): State<AppState>,
    Path(counterpart_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || {
        db.db
            .thread(&claims.sub.to_string(), &counterpart_id.to_string())
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| MessageResponse {
            id: parse_uuid(&row.id, "message id"),
            sender_id: parse_uuid(&row.sender_id, "message sender id"),
            recipient_id: parse_uuid(&row.recipient_id, "message recipient id"),
            text: row.text,
            created_at: parse_created_at(&row.created_at, "message"),
        })
        .collect();

    Ok(Json(messages))
}

pub async fn chat_partners(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let partners = state.db.chat_partners(&claims.sub.to_string())?;

    let summaries: Vec<UserSummary> = partners
        .into_iter()
        .map(|u| UserSummary {
            id: parse_uuid(&u.id, "user id"),
            name: u.name,
        })
        .collect();

    Ok(Json(summaries))
}
