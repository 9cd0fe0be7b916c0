// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        purchase::{AttemptBlockBalance, GrantAttemptBlockRequest},
        question::CreateQuestionRequest,
    },
    store::SharedStore,
    utils::html::clean_html,
};

/// Creates a new quiz question in a level's pool.
/// Admin only.
pub async fn create_question(
    State(store): State<SharedStore>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Sanitize first so the answer is compared against what gets stored.
    let question = CreateQuestionRequest {
        level: payload.level,
        content: clean_html(&payload.content),
        options: payload.options.iter().map(|o| clean_html(o)).collect(),
        answer: clean_html(&payload.answer),
        analysis: payload.analysis.as_deref().map(clean_html),
    };
    question
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if !question.options.contains(&question.answer) {
        return Err(AppError::BadRequest(
            "Answer must match one of the options".to_string(),
        ));
    }

    let id = store.create_question(&question).await.map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(question_id = id, level = %question.level, "Question created");
    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Deletes a quiz question by ID.
/// Admin only.
pub async fn delete_question(
    State(store): State<SharedStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Grants one extra attempt block for a level.
/// Called once a payment is confirmed. Admin only.
pub async fn grant_attempt_block(
    State(store): State<SharedStore>,
    Path(user_id): Path<i64>,
    Json(payload): Json<GrantAttemptBlockRequest>,
) -> Result<impl IntoResponse, AppError> {
    store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let purchased_blocks = store.add_purchased_block(user_id, payload.level).await?;

    tracing::info!(user_id, level = %payload.level, purchased_blocks, "Attempt block granted");
    Ok(Json(AttemptBlockBalance {
        user_id,
        level: payload.level,
        purchased_blocks,
    }))
}
