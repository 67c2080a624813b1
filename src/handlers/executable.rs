// src/handlers/executable.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use crate::{
    error::AppError,
    models::{
        executable::{
            Attemptor, AttemptForm, ExecutableFilter, ExecutableListParams, NewExecutable,
            PublicQuestionnaire, SubmitAnswersRequest,
        },
        pagination::PaginatedResponse,
        question::{PublicQuestion, QuestionWithAlternatives},
        questionnaire::Questionnaire,
    },
    services::{
        eligibility::{self, Admission},
        scoring,
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Loads the questionnaire and runs the eligibility gate for `attemptor`.
async fn admit(
    state: &AppState,
    questionnaire_id: i64,
    attemptor: &Attemptor,
) -> Result<(Questionnaire, Admission), AppError> {
    let questionnaire = state
        .store
        .get_questionnaire(questionnaire_id)
        .await?
        .ok_or(AppError::NotFound("Questionnaire not found".to_string()))?;

    let prior = state
        .store
        .list_attemptor_executables(questionnaire_id, attemptor)
        .await?;

    let admission = eligibility::check(&questionnaire, &prior, state.clock.now()).map_err(|rejection| {
        tracing::warn!(
            questionnaire_id,
            attemptor_id = attemptor.id,
            reason = rejection.code(),
            "Execution rejected"
        );
        AppError::from(rejection)
    })?;

    Ok((questionnaire, admission))
}

/// Builds the attempt form, hiding alternative values and correctness and
/// shuffling according to the questionnaire's randomization flags.
fn build_form(
    questionnaire: Questionnaire,
    questions: Vec<QuestionWithAlternatives>,
    deadline: Option<DateTime<Utc>>,
) -> AttemptForm {
    let mut rng = rand::rng();

    let mut public: Vec<PublicQuestion> = questions.into_iter().map(PublicQuestion::from).collect();
    if questionnaire.rand_alternatives {
        for question in &mut public {
            question.alternatives.shuffle(&mut rng);
        }
    }
    if questionnaire.rand_questions {
        public.shuffle(&mut rng);
    }

    AttemptForm {
        questionnaire: PublicQuestionnaire::new(questionnaire, public),
        deadline,
    }
}

/// Lists executions, newest first.
///
/// Administrators see every execution; everyone else only their own.
pub async fn list_executables(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ExecutableListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.pagination();
    page.validate().map_err(AppError::BadRequest)?;

    let attemptor = if claims.is_admin() {
        None
    } else {
        Some(claims.attemptor(&state.config.executable_type)?)
    };
    let filter = ExecutableFilter {
        questionnaire_id: params.questionnaire_id,
        attemptor,
    };

    let (data, total) = state.store.list_executables(&filter, &page).await?;

    Ok(Json(PaginatedResponse::new(data, &page, total)))
}

/// Serves the form for a new execution.
///
/// Fails with 404 when the questionnaire does not exist and 403 when the
/// attemptor is still cooling down or has used up its executions.
pub async fn attempt_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(questionnaire_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attemptor = claims.attemptor(&state.config.executable_type)?;
    let (questionnaire, admission) = admit(&state, questionnaire_id, &attemptor).await?;

    let questions = state.store.list_questions(questionnaire_id, true).await?;

    Ok(Json(build_form(questionnaire, questions, admission.deadline)))
}

/// Grades and stores a submission.
///
/// The eligibility gate runs again here; the deadline handed out with the
/// form is not enforced.
pub async fn submit_answers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(questionnaire_id): Path<i64>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attemptor = claims.attemptor(&state.config.executable_type)?;
    admit(&state, questionnaire_id, &attemptor).await?;

    let questions: HashMap<i64, QuestionWithAlternatives> = state
        .store
        .list_questions(questionnaire_id, true)
        .await?
        .into_iter()
        .map(|q| (q.question.id, q))
        .collect();

    let grade = scoring::grade(&questions, req.answers)?;
    let answers_count = grade.answers.len();

    let executable = state
        .store
        .create_executable(NewExecutable {
            questionnaire_id,
            attemptor,
            score: grade.score,
            created_at: state.clock.now(),
            answers: grade.answers,
        })
        .await?;

    tracing::info!(
        executable_id = executable.id,
        questionnaire_id,
        score = executable.score,
        "Questionnaire answered"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": executable.id,
            "score": executable.score,
            "answers_count": answers_count,
            "message": "Questionnaire answered successfully!"
        })),
    ))
}

/// Shows one execution with its answers.
pub async fn get_executable(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state
        .store
        .get_executable(id)
        .await?
        .ok_or(AppError::NotFound("Execution not found".to_string()))?;

    // Other attemptors' executions are reported as missing.
    if !claims.is_admin() && detail.executable.attemptor != claims.attemptor(&state.config.executable_type)? {
        return Err(AppError::NotFound("Execution not found".to_string()));
    }

    Ok(Json(detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Alternative, Question, QuestionType};
    use chrono::TimeZone;

    fn questionnaire(rand_questions: bool, rand_alternatives: bool) -> Questionnaire {
        Questionnaire {
            id: 3,
            name: "Fire drill".to_string(),
            description: Some("<p>Annual refresher</p>".to_string()),
            instructions: None,
            is_active: true,
            answer_once: false,
            rand_questions,
            rand_alternatives,
            waiting_time: None,
            execution_time: None,
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    fn question(id: i64) -> QuestionWithAlternatives {
        QuestionWithAlternatives {
            question: Question {
                id,
                questionnaire_id: 3,
                description: format!("Question {}", id),
                hint: None,
                weight: 1.0,
                is_required: false,
                is_active: true,
                question_type: QuestionType::Closed,
                created_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            },
            alternatives: (1..=4)
                .map(|n| Alternative {
                    id: id * 10 + n,
                    question_id: id,
                    description: format!("Option {}", n),
                    value: n as f64,
                    is_correct: n == 1,
                })
                .collect(),
        }
    }

    #[test]
    fn test_build_form_keeps_order_without_randomization() {
        let questions = (1..=5).map(question).collect();
        let form = build_form(questionnaire(false, false), questions, None);

        let ids: Vec<i64> = form.questionnaire.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        let alt_ids: Vec<i64> = form.questionnaire.questions[0].alternatives.iter().map(|a| a.id).collect();
        assert_eq!(alt_ids, vec![11, 12, 13, 14]);
    }

    #[test]
    fn test_build_form_shuffles_but_keeps_members() {
        let questions = (1..=5).map(question).collect();
        let form = build_form(questionnaire(true, true), questions, None);

        let mut ids: Vec<i64> = form.questionnaire.questions.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        for q in &form.questionnaire.questions {
            let mut alt_ids: Vec<i64> = q.alternatives.iter().map(|a| a.id).collect();
            alt_ids.sort_unstable();
            assert_eq!(alt_ids, (1..=4).map(|n| q.id * 10 + n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_build_form_hides_correctness() {
        let form = build_form(questionnaire(false, false), vec![question(1)], None);
        let json = serde_json::to_value(&form).unwrap();

        let alternative = &json["questionnaire"]["questions"][0]["alternatives"][0];
        assert!(alternative.get("is_correct").is_none());
        assert!(alternative.get("value").is_none());
        assert_eq!(json["deadline"], serde_json::Value::Null);
    }
}
