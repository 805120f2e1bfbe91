use crate::api::AppState;
use crate::api::dto::chat::{
    ApiResponse, BulkMessageRequest, BulkResultDto, DeleteResultDto, MessageDto, MessagePageDto, PageQuery,
    SearchQuery, SendMessageRequest,
};
use crate::api::middleware::AuthUser;
use crate::domain::conversation::ConversationId;
use crate::error::Result;
use crate::services::chat_service::ChatService;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Returns one page of a conversation, page 1 being the newest messages.
///
/// # Errors
/// Returns `AppError::NotParticipant` if the caller is not part of the conversation.
/// Returns `AppError::BadRequest` if `page` is zero.
pub async fn list_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<ConversationId>, PathRejection>,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Path(conversation_id) = path?;
    let Query(query) = query?;

    let page = state
        .chat_service
        .get_conversation_messages(conversation_id, auth_user.user_id, query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::ok(MessagePageDto::from(page))))
}

/// # Errors
/// Returns `AppError::NotParticipant` if the caller is not part of the conversation.
pub async fn list_all_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<ConversationId>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(conversation_id) = path?;

    let messages = state.chat_service.get_all_messages(conversation_id, auth_user.user_id).await?;
    let data: Vec<MessageDto> = messages.into_iter().map(Into::into).collect();

    Ok(Json(ApiResponse::ok(data)))
}

/// # Errors
/// Returns `AppError::NotParticipant` if the caller is not part of the conversation.
/// Returns `AppError::BadRequest` if `q` is missing or blank.
pub async fn search_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<ConversationId>, PathRejection>,
    query: std::result::Result<Query<SearchQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Path(conversation_id) = path?;
    let Query(query) = query?;

    let messages = state.chat_service.search_messages(conversation_id, auth_user.user_id, &query.q).await?;
    let data: Vec<MessageDto> = messages.into_iter().map(Into::into).collect();

    Ok(Json(ApiResponse::ok(data)))
}

/// Sends a message into a conversation.
///
/// # Errors
/// Returns `AppError::NotParticipant` if the caller is not part of the conversation.
/// Returns `AppError::BadRequest` if the content is blank or the type is unknown.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<ConversationId>, PathRejection>,
    payload: std::result::Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Path(conversation_id) = path?;
    let Json(request) = payload?;
    let message_type = ChatService::parse_message_type(request.message_type.as_deref())?;

    let message =
        state.chat_service.send_message(conversation_id, auth_user.user_id, &request.content, message_type).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(MessageDto::from(message)))))
}

/// Deletes a message. Deleting an id that is already gone reports `deleted: false`.
///
/// # Errors
/// Returns `AppError::NotParticipant` if the caller is not part of the conversation.
pub async fn delete_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<(ConversationId, Uuid)>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path((conversation_id, message_id)) = path?;

    let deleted = state.chat_service.delete_message(conversation_id, auth_user.user_id, message_id).await?;

    Ok(Json(ApiResponse::ok(DeleteResultDto { deleted })))
}

/// Sends one message to each listed recipient. Per-recipient failures are
/// reported in the result list and do not fail the request.
///
/// # Errors
/// Returns `AppError::Forbidden` if the caller's role may not broadcast.
/// Returns `AppError::BadRequest` if the recipient list is empty or too large.
pub async fn send_bulk_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<BulkMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload?;
    let message_type = ChatService::parse_message_type(request.message_type.as_deref())?;

    let outcomes = state
        .chat_service
        .send_bulk_message(auth_user.user_id, auth_user.role, request.recipient_ids, &request.content, message_type)
        .await?;
    let data: Vec<BulkResultDto> = outcomes.into_iter().map(Into::into).collect();

    Ok(Json(ApiResponse::ok(data)))
}

/// Messages every student enrolled in a course.
///
/// # Errors
/// Returns `AppError::NotFound` if the course does not exist.
/// Returns `AppError::Forbidden` unless the caller teaches the course or is an admin.
pub async fn send_course_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Path(course_id) = path?;
    let Json(request) = payload?;
    let message_type = ChatService::parse_message_type(request.message_type.as_deref())?;

    let outcomes = state
        .chat_service
        .send_course_message(auth_user.user_id, auth_user.role, course_id, &request.content, message_type)
        .await?;
    let data: Vec<BulkResultDto> = outcomes.into_iter().map(Into::into).collect();

    Ok(Json(ApiResponse::ok(data)))
}
