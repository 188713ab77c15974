use axum::{
    debug_handler,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    response::IntoResponse,
    Extension, Json,
};
use hyper::StatusCode;
use tracing::debug;

use crate::{
    app_state::AppState,
    error::{ChatError, ValidationError},
    models::message::{
        AiReplyRequest, ListMessagesQuery, MessagePage, MessageResponse, SendMessageRequest,
    },
};

/// Unreadable bodies and query strings are caller errors like any other, so
/// they leave through `ChatError` with the extractor's text as details.
fn body_or_reject<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ValidationError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ValidationError::MalformedBody(rejection.body_text()))
}

/// `GET /messages?conversationId=..&cursor=..&pageSize=..`
#[debug_handler]
pub async fn list_messages(
    Extension(state): Extension<AppState>,
    query: Result<Query<ListMessagesQuery>, QueryRejection>,
) -> Result<Json<MessagePage>, ChatError> {
    let Query(query) =
        query.map_err(|rejection| ValidationError::MalformedQuery(rejection.body_text()))?;
    debug!("Listing messages: {:?}", query);

    let page = state.messages.list_messages(query).await?;
    Ok(Json(page))
}

/// `POST /messages/send`
#[debug_handler]
pub async fn send_message(
    Extension(state): Extension<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ChatError> {
    let request = body_or_reject(payload)?;
    let message = state.messages.send_human_message(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            message,
        }),
    ))
}

/// `POST /messages/ai-reply`
#[debug_handler]
pub async fn ai_reply(
    Extension(state): Extension<AppState>,
    payload: Result<Json<AiReplyRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ChatError> {
    let request = body_or_reject(payload)?;
    let message = state.messages.request_ai_reply(request).await?;

    Ok(Json(MessageResponse {
        success: true,
        message,
    }))
}
