use crate::api::AppState;
use crate::api::dto::chat::{ApiResponse, ConversationDetailsDto, ConversationDto, StartConversationRequest};
use crate::api::middleware::AuthUser;
use crate::domain::conversation::ConversationId;
use crate::error::Result;
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

/// Lists the caller's conversations, most recently active first.
///
/// # Errors
/// Returns `AppError::Database` if the store fails.
pub async fn list_conversations(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let conversations = state.chat_service.get_user_conversations(auth_user.user_id).await?;
    let data: Vec<ConversationDto> = conversations.into_iter().map(Into::into).collect();

    Ok(Json(ApiResponse::ok(data)))
}

/// Opens the conversation with another user, creating it on first contact.
///
/// # Errors
/// Returns `AppError::BadRequest` if the caller targets themselves.
/// Returns `AppError::NotFound` if the other user does not exist.
pub async fn start_conversation(
    auth_user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<StartConversationRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload?;

    let view = state.chat_service.start_conversation(auth_user.user_id, request.participant_id).await?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(ConversationDto::from(view)))))
}

/// # Errors
/// Returns `AppError::NotFound` if the conversation does not exist.
/// Returns `AppError::NotParticipant` if the caller is not part of it.
pub async fn get_conversation(
    auth_user: AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<ConversationId>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(conversation_id) = path?;

    let details = state.chat_service.get_conversation_details(conversation_id, auth_user.user_id).await?;

    Ok(Json(ApiResponse::ok(ConversationDetailsDto::from(details))))
}
