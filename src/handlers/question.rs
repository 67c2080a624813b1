// src/handlers/question.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateAlternativeRequest, CreateQuestionRequest, QuestionType},
    state::AppState,
};

/// Adds a question, with optional alternatives, to a questionnaire.
/// Admin only.
pub async fn create_question(
    State(state): State<AppState>,
    Path(questionnaire_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.question_type == QuestionType::Open && !payload.alternatives.is_empty() {
        return Err(AppError::BadRequest(
            "Open questions cannot have alternatives".to_string(),
        ));
    }

    let question = state
        .store
        .create_question(questionnaire_id, payload.into_new(), state.clock.now())
        .await?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Deletes a question that has not been answered yet.
/// Admin only.
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Adds an alternative to a closed question.
/// Admin only.
pub async fn create_alternative(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    Json(payload): Json<CreateAlternativeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = state
        .store
        .get_question(question_id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if question.question_type == QuestionType::Open {
        return Err(AppError::BadRequest(
            "Open questions cannot have alternatives".to_string(),
        ));
    }

    let alternative = state
        .store
        .create_alternative(question_id, payload.into_new())
        .await?;

    Ok((StatusCode::CREATED, Json(alternative)))
}

/// Deletes an alternative that has not been chosen yet.
/// Admin only.
pub async fn delete_alternative(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.delete_alternative(id).await? {
        return Err(AppError::NotFound("Alternative not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
