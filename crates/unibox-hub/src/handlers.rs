// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the hub REST API.
//!
//! The ingest route is the push entry point for external sync collaborators;
//! the conversation routes are the authoritative pull surface clients use
//! after (re)connecting; the retry routes are the operator surface over the
//! durable retry queue.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use unibox_core::events::HubEvent;
use unibox_core::types::{Conversation, IngestOutcome, Message, Platform, RetryJob, RetryJobState};
use unibox_core::{HubNotifier, UniboxError};
use unibox_storage::queries::{conversations, messages, retry};

use crate::server::HubState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn internal(e: UniboxError) -> HandlerError {
    tracing::error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn not_found(what: &str) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{what} not found"),
        }),
    )
}

/// Request body for POST /v1/ingest.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub platform: Platform,
    pub account_id: String,
    /// The raw platform payload, passed through to the normalizer.
    pub payload: serde_json::Value,
}

/// POST /v1/ingest
///
/// Pushes one raw platform payload through the ingestion gateway. Transient
/// failures are deferred to the retry queue and reported as such.
pub async fn post_ingest(
    State(state): State<HubState>,
    Json(body): Json<IngestRequest>,
) -> Result<Json<IngestOutcome>, HandlerError> {
    let outcome = state
        .gateway
        .ingest_or_defer(body.platform, &body.account_id, &body.payload)
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

/// GET /v1/conversations
pub async fn get_conversations(
    State(state): State<HubState>,
    Query(query): Query<ConversationsQuery>,
) -> Result<Json<ConversationListResponse>, HandlerError> {
    let conversations = conversations::list(&state.db, query.account_id.as_deref())
        .await
        .map_err(internal)?;
    Ok(Json(ConversationListResponse { conversations }))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    /// Exclusive sent_at cursor for paging backwards through history.
    #[serde(default)]
    pub before: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

/// GET /v1/conversations/{id}/messages
///
/// Newest first; page backwards with `before` set to the oldest `sent_at`
/// of the previous page.
pub async fn get_conversation_messages(
    State(state): State<HubState>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessageListResponse>, HandlerError> {
    if conversations::get(&state.db, &id)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err(not_found("conversation"));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let messages = messages::list(&state.db, &id, limit, query.before)
        .await
        .map_err(internal)?;
    Ok(Json(MessageListResponse { messages }))
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub conversation_id: String,
    pub messages_marked: usize,
}

/// POST /v1/conversations/{id}/read
///
/// Marks the whole conversation read and fans out the resulting
/// `message_status_update` and `unread_count_update` events.
pub async fn post_conversation_read(
    State(state): State<HubState>,
    Path(id): Path<String>,
) -> Result<Json<MarkReadResponse>, HandlerError> {
    let Some(conversation) = conversations::get(&state.db, &id).await.map_err(internal)? else {
        return Err(not_found("conversation"));
    };

    let unread = messages::list_unread(&state.db, &id).await.map_err(internal)?;
    conversations::mark_read(&state.db, &id).await.map_err(internal)?;

    let user_id = state.gateway.owner_of(&conversation.account_id);
    for message in &unread {
        state
            .registry
            .notify(
                &user_id,
                HubEvent::MessageStatusUpdate {
                    conversation_id: id.clone(),
                    message_id: message.id.clone(),
                    is_read: true,
                    delivered_at: message.delivered_at,
                },
            )
            .await;
    }
    state
        .registry
        .notify(
            &user_id,
            HubEvent::UnreadCountUpdate {
                conversation_id: id.clone(),
                platform: conversation.platform,
                unread_count: 0,
            },
        )
        .await;

    Ok(Json(MarkReadResponse {
        conversation_id: id,
        messages_marked: unread.len(),
    }))
}

/// GET /v1/retry/counts
pub async fn get_retry_counts(
    State(state): State<HubState>,
) -> Result<Json<unibox_core::types::RetryJobCounts>, HandlerError> {
    let counts = retry::counts(&state.db).await.map_err(internal)?;
    Ok(Json(counts))
}

#[derive(Debug, Deserialize)]
pub struct RetryFailedQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RetryJobListResponse {
    pub jobs: Vec<RetryJob>,
}

/// GET /v1/retry/failed
pub async fn get_retry_failed(
    State(state): State<HubState>,
    Query(query): Query<RetryFailedQuery>,
) -> Result<Json<RetryJobListResponse>, HandlerError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let jobs = retry::list_by_state(&state.db, RetryJobState::Failed, limit)
        .await
        .map_err(internal)?;
    Ok(Json(RetryJobListResponse { jobs }))
}

#[derive(Debug, Serialize)]
pub struct PlatformFailureCount {
    pub platform: Platform,
    pub failed: i64,
}

#[derive(Debug, Serialize)]
pub struct RetryStatsResponse {
    pub by_platform: Vec<PlatformFailureCount>,
}

/// GET /v1/retry/stats
pub async fn get_retry_stats(
    State(state): State<HubState>,
) -> Result<Json<RetryStatsResponse>, HandlerError> {
    let by_platform = retry::failed_by_platform(&state.db)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|(platform, failed)| PlatformFailureCount { platform, failed })
        .collect();
    Ok(Json(RetryStatsResponse { by_platform }))
}

#[derive(Debug, Serialize)]
pub struct RetryJobResponse {
    pub job: RetryJob,
}

/// POST /v1/retry/{id}/retry
///
/// Manually revives a failed job with a fresh attempt budget.
pub async fn post_retry_job(
    State(state): State<HubState>,
    Path(id): Path<i64>,
) -> Result<Json<RetryJobResponse>, HandlerError> {
    if !retry::rearm(&state.db, id).await.map_err(internal)? {
        return Err(not_found("failed retry job"));
    }
    let Some(job) = retry::get(&state.db, id).await.map_err(internal)? else {
        return Err(not_found("retry job"));
    };
    Ok(Json(RetryJobResponse { job }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryCleanRequest {
    /// Override for the configured retention window.
    #[serde(default)]
    pub retention_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RetryCleanResponse {
    pub removed: usize,
}

/// POST /v1/retry/clean
pub async fn post_retry_clean(
    State(state): State<HubState>,
    body: Option<Json<RetryCleanRequest>>,
) -> Result<Json<RetryCleanResponse>, HandlerError> {
    let retention = body
        .and_then(|Json(b)| b.retention_hours)
        .unwrap_or(state.retention_hours);
    let removed = retry::purge_finished(&state.db, retention)
        .await
        .map_err(internal)?;
    Ok(Json(RetryCleanResponse { removed }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health (public, for process supervisors)
pub async fn get_health(State(state): State<HubState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
