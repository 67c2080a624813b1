// src/handlers/questionnaire.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::questionnaire::{QuestionnaireDetail, QuestionnaireRequest},
    state::AppState,
};

/// Lists active questionnaires.
pub async fn list_active_questionnaires(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let questionnaires = state.store.list_questionnaires(true).await?;
    Ok(Json(questionnaires))
}

/// Lists every questionnaire.
/// Admin only.
pub async fn list_questionnaires(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let questionnaires = state.store.list_questionnaires(false).await?;
    Ok(Json(questionnaires))
}

/// Retrieves a questionnaire with all of its questions and alternatives.
/// Admin only.
pub async fn get_questionnaire(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questionnaire = state
        .store
        .get_questionnaire(id)
        .await?
        .ok_or(AppError::NotFound("Questionnaire not found".to_string()))?;
    let questions = state.store.list_questions(id, false).await?;

    Ok(Json(QuestionnaireDetail {
        questionnaire,
        questions,
    }))
}

/// Creates a questionnaire.
/// Admin only.
pub async fn create_questionnaire(
    State(state): State<AppState>,
    Json(payload): Json<QuestionnaireRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let questionnaire = state
        .store
        .create_questionnaire(payload.into_new(), state.clock.now())
        .await?;

    tracing::info!(questionnaire_id = questionnaire.id, "Questionnaire created");

    Ok((StatusCode::CREATED, Json(questionnaire)))
}

/// Replaces a questionnaire's fields.
/// Admin only.
pub async fn update_questionnaire(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<QuestionnaireRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let questionnaire = state
        .store
        .update_questionnaire(id, payload.into_new())
        .await?
        .ok_or(AppError::NotFound("Questionnaire not found".to_string()))?;

    Ok(Json(questionnaire))
}

/// Deletes a questionnaire with its questions and executions.
/// Admin only.
pub async fn delete_questionnaire(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.delete_questionnaire(id).await? {
        return Err(AppError::NotFound("Questionnaire not found".to_string()));
    }

    tracing::info!(questionnaire_id = id, "Questionnaire deleted");

    Ok(StatusCode::NO_CONTENT)
}
