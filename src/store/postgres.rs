// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        executable::{
            Answer, AnswerDetail, Attemptor, Executable, ExecutableDetail, ExecutableFilter,
            NewExecutable,
        },
        pagination::PaginationParams,
        question::{Alternative, NewAlternative, NewQuestion, Question, QuestionWithAlternatives},
        questionnaire::{NewQuestionnaire, Questionnaire, TimeSpan},
    },
    store::QuizStore,
};

const QUESTIONNAIRE_COLUMNS: &str = "id, name, description, instructions, is_active, answer_once, \
     rand_questions, rand_alternatives, waiting_time, type_waiting_time, execution_time, \
     type_execution_time, created_at";

const QUESTION_COLUMNS: &str =
    "id, questionnaire_id, description, hint, weight, is_required, is_active, question_type, created_at";

const ALTERNATIVE_COLUMNS: &str = "id, question_id, description, value, is_correct";

const EXECUTABLE_COLUMNS: &str =
    "id, questionnaire_id, executable_type, executable_id, score, created_at";

#[derive(FromRow)]
struct QuestionnaireRow {
    id: i64,
    name: String,
    description: Option<String>,
    instructions: Option<String>,
    is_active: bool,
    answer_once: bool,
    rand_questions: bool,
    rand_alternatives: bool,
    waiting_time: Option<i32>,
    type_waiting_time: Option<String>,
    execution_time: Option<i32>,
    type_execution_time: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuestionnaireRow> for Questionnaire {
    type Error = AppError;

    fn try_from(row: QuestionnaireRow) -> Result<Self, Self::Error> {
        Ok(Questionnaire {
            id: row.id,
            name: row.name,
            description: row.description,
            instructions: row.instructions,
            is_active: row.is_active,
            answer_once: row.answer_once,
            rand_questions: row.rand_questions,
            rand_alternatives: row.rand_alternatives,
            waiting_time: span_from_columns(row.waiting_time, row.type_waiting_time)?,
            execution_time: span_from_columns(row.execution_time, row.type_execution_time)?,
            created_at: row.created_at,
        })
    }
}

fn span_from_columns(amount: Option<i32>, unit: Option<String>) -> Result<Option<TimeSpan>, AppError> {
    match (amount, unit) {
        (Some(amount), Some(unit)) => {
            let amount = u32::try_from(amount).map_err(|e| AppError::InternalServerError(e.to_string()))?;
            let unit = unit.parse().map_err(AppError::InternalServerError)?;
            Ok(Some(TimeSpan::new(amount, unit)))
        }
        _ => Ok(None),
    }
}

fn span_to_columns(span: Option<TimeSpan>) -> Result<(Option<i32>, Option<&'static str>), AppError> {
    match span {
        Some(span) => {
            let amount = i32::try_from(span.amount)
                .map_err(|_| AppError::BadRequest(format!("Time amount too large: {}", span.amount)))?;
            Ok((Some(amount), Some(span.unit.as_str())))
        }
        None => Ok((None, None)),
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    questionnaire_id: i64,
    description: String,
    hint: Option<String>,
    weight: f64,
    is_required: bool,
    is_active: bool,
    question_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            questionnaire_id: row.questionnaire_id,
            description: row.description,
            hint: row.hint,
            weight: row.weight,
            is_required: row.is_required,
            is_active: row.is_active,
            question_type: row.question_type.parse().map_err(AppError::InternalServerError)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AlternativeRow {
    id: i64,
    question_id: i64,
    description: String,
    value: f64,
    is_correct: bool,
}

impl From<AlternativeRow> for Alternative {
    fn from(row: AlternativeRow) -> Self {
        Alternative {
            id: row.id,
            question_id: row.question_id,
            description: row.description,
            value: row.value,
            is_correct: row.is_correct,
        }
    }
}

#[derive(FromRow)]
struct ExecutableRow {
    id: i64,
    questionnaire_id: i64,
    executable_type: String,
    executable_id: i64,
    score: f64,
    created_at: DateTime<Utc>,
}

impl From<ExecutableRow> for Executable {
    fn from(row: ExecutableRow) -> Self {
        Executable {
            id: row.id,
            questionnaire_id: row.questionnaire_id,
            attemptor: Attemptor::new(row.executable_type, row.executable_id),
            score: row.score,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct AnswerDetailRow {
    id: i64,
    executable_id: i64,
    question_id: i64,
    alternative_id: Option<i64>,
    description: Option<String>,
    score: Option<f64>,
    question_description: String,
    question_type: String,
    alternative_description: Option<String>,
}

impl TryFrom<AnswerDetailRow> for AnswerDetail {
    type Error = AppError;

    fn try_from(row: AnswerDetailRow) -> Result<Self, Self::Error> {
        Ok(AnswerDetail {
            answer: Answer {
                id: row.id,
                executable_id: row.executable_id,
                question_id: row.question_id,
                alternative_id: row.alternative_id,
                description: row.description,
                score: row.score,
            },
            question_description: row.question_description,
            question_type: row.question_type.parse().map_err(AppError::InternalServerError)?,
            alternative_description: row.alternative_description,
        })
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.code().as_deref() == Some("23503"))
}

/// Maps a foreign key violation to `on_violation`, anything else to a server error.
fn map_fk_error(err: sqlx::Error, on_violation: AppError) -> AppError {
    if is_foreign_key_violation(&err) {
        on_violation
    } else {
        tracing::error!("Database error: {:?}", err);
        AppError::from(err)
    }
}

fn push_executable_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ExecutableFilter) {
    builder.push(" WHERE TRUE");
    if let Some(questionnaire_id) = filter.questionnaire_id {
        builder.push(" AND questionnaire_id = ").push_bind(questionnaire_id);
    }
    if let Some(attemptor) = &filter.attemptor {
        builder
            .push(" AND executable_type = ")
            .push_bind(attemptor.kind.clone())
            .push(" AND executable_id = ")
            .push_bind(attemptor.id);
    }
}

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn alternatives_for(&self, question_ids: &[i64]) -> Result<Vec<Alternative>, AppError> {
        let sql = format!(
            "SELECT {} FROM alternatives WHERE question_id = ANY($1) ORDER BY id",
            ALTERNATIVE_COLUMNS
        );
        let rows: Vec<AlternativeRow> = sqlx::query_as(&sql)
            .bind(question_ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Alternative::from).collect())
    }
}

#[async_trait]
impl QuizStore for PgStore {
    async fn list_questionnaires(&self, only_active: bool) -> Result<Vec<Questionnaire>, AppError> {
        let sql = format!(
            "SELECT {} FROM questionnaires WHERE ($1 = FALSE OR is_active) ORDER BY id",
            QUESTIONNAIRE_COLUMNS
        );
        let rows: Vec<QuestionnaireRow> = sqlx::query_as(&sql)
            .bind(only_active)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list questionnaires: {:?}", e);
                AppError::from(e)
            })?;

        rows.into_iter().map(Questionnaire::try_from).collect()
    }

    async fn get_questionnaire(&self, id: i64) -> Result<Option<Questionnaire>, AppError> {
        let sql = format!("SELECT {} FROM questionnaires WHERE id = $1", QUESTIONNAIRE_COLUMNS);
        let row: Option<QuestionnaireRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Questionnaire::try_from).transpose()
    }

    async fn create_questionnaire(
        &self,
        new: NewQuestionnaire,
        created_at: DateTime<Utc>,
    ) -> Result<Questionnaire, AppError> {
        let (waiting_time, type_waiting_time) = span_to_columns(new.waiting_time)?;
        let (execution_time, type_execution_time) = span_to_columns(new.execution_time)?;

        let sql = format!(
            r#"
            INSERT INTO questionnaires
            (name, description, instructions, is_active, answer_once, rand_questions,
             rand_alternatives, waiting_time, type_waiting_time, execution_time,
             type_execution_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            QUESTIONNAIRE_COLUMNS
        );
        let row: QuestionnaireRow = sqlx::query_as(&sql)
            .bind(new.name)
            .bind(new.description)
            .bind(new.instructions)
            .bind(new.is_active)
            .bind(new.answer_once)
            .bind(new.rand_questions)
            .bind(new.rand_alternatives)
            .bind(waiting_time)
            .bind(type_waiting_time)
            .bind(execution_time)
            .bind(type_execution_time)
            .bind(created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create questionnaire: {:?}", e);
                AppError::from(e)
            })?;

        Questionnaire::try_from(row)
    }

    async fn update_questionnaire(
        &self,
        id: i64,
        new: NewQuestionnaire,
    ) -> Result<Option<Questionnaire>, AppError> {
        let (waiting_time, type_waiting_time) = span_to_columns(new.waiting_time)?;
        let (execution_time, type_execution_time) = span_to_columns(new.execution_time)?;

        let sql = format!(
            r#"
            UPDATE questionnaires SET
                name = $2, description = $3, instructions = $4, is_active = $5,
                answer_once = $6, rand_questions = $7, rand_alternatives = $8,
                waiting_time = $9, type_waiting_time = $10,
                execution_time = $11, type_execution_time = $12
            WHERE id = $1
            RETURNING {}
            "#,
            QUESTIONNAIRE_COLUMNS
        );
        let row: Option<QuestionnaireRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(new.name)
            .bind(new.description)
            .bind(new.instructions)
            .bind(new.is_active)
            .bind(new.answer_once)
            .bind(new.rand_questions)
            .bind(new.rand_alternatives)
            .bind(waiting_time)
            .bind(type_waiting_time)
            .bind(execution_time)
            .bind(type_execution_time)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update questionnaire: {:?}", e);
                AppError::from(e)
            })?;

        row.map(Questionnaire::try_from).transpose()
    }

    async fn delete_questionnaire(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM questionnaires WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete questionnaire: {:?}", e);
                AppError::from(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_questions(
        &self,
        questionnaire_id: i64,
        only_active: bool,
    ) -> Result<Vec<QuestionWithAlternatives>, AppError> {
        let sql = format!(
            "SELECT {} FROM questions WHERE questionnaire_id = $1 AND ($2 = FALSE OR is_active) ORDER BY id",
            QUESTION_COLUMNS
        );
        let rows: Vec<QuestionRow> = sqlx::query_as(&sql)
            .bind(questionnaire_id)
            .bind(only_active)
            .fetch_all(&self.pool)
            .await?;

        let questions = rows
            .into_iter()
            .map(Question::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let mut alternatives = self.alternatives_for(&ids).await?;

        Ok(questions
            .into_iter()
            .map(|question| {
                let (own, rest): (Vec<_>, Vec<_>) = alternatives
                    .drain(..)
                    .partition(|a| a.question_id == question.id);
                alternatives = rest;
                QuestionWithAlternatives {
                    question,
                    alternatives: own,
                }
            })
            .collect())
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let sql = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        let row: Option<QuestionRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Question::try_from).transpose()
    }

    async fn create_question(
        &self,
        questionnaire_id: i64,
        new: NewQuestion,
        created_at: DateTime<Utc>,
    ) -> Result<QuestionWithAlternatives, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO questions
            (questionnaire_id, description, hint, weight, is_required, is_active, question_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );
        let row: QuestionRow = sqlx::query_as(&sql)
            .bind(questionnaire_id)
            .bind(new.description)
            .bind(new.hint)
            .bind(new.weight)
            .bind(new.is_required)
            .bind(new.is_active)
            .bind(new.question_type.as_str())
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_fk_error(e, AppError::NotFound("Questionnaire not found".to_string())))?;
        let question = Question::try_from(row)?;

        let alt_sql = format!(
            "INSERT INTO alternatives (question_id, description, value, is_correct) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ALTERNATIVE_COLUMNS
        );
        let mut alternatives = Vec::with_capacity(new.alternatives.len());
        for alt in new.alternatives {
            let row: AlternativeRow = sqlx::query_as(&alt_sql)
                .bind(question.id)
                .bind(alt.description)
                .bind(alt.value)
                .bind(alt.is_correct)
                .fetch_one(&mut *tx)
                .await?;
            alternatives.push(Alternative::from(row));
        }

        tx.commit().await?;

        Ok(QuestionWithAlternatives {
            question,
            alternatives,
        })
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_fk_error(
                    e,
                    AppError::Conflict("Question has answers and cannot be deleted".to_string()),
                )
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_alternative(
        &self,
        question_id: i64,
        new: NewAlternative,
    ) -> Result<Alternative, AppError> {
        let sql = format!(
            "INSERT INTO alternatives (question_id, description, value, is_correct) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ALTERNATIVE_COLUMNS
        );
        let row: AlternativeRow = sqlx::query_as(&sql)
            .bind(question_id)
            .bind(new.description)
            .bind(new.value)
            .bind(new.is_correct)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_fk_error(e, AppError::NotFound("Question not found".to_string())))?;

        Ok(Alternative::from(row))
    }

    async fn delete_alternative(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM alternatives WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_fk_error(
                    e,
                    AppError::Conflict(
                        "Alternative has been chosen and cannot be deleted".to_string(),
                    ),
                )
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_attemptor_executables(
        &self,
        questionnaire_id: i64,
        attemptor: &Attemptor,
    ) -> Result<Vec<Executable>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM executables
            WHERE questionnaire_id = $1 AND executable_type = $2 AND executable_id = $3
            ORDER BY created_at DESC, id DESC
            "#,
            EXECUTABLE_COLUMNS
        );
        let rows: Vec<ExecutableRow> = sqlx::query_as(&sql)
            .bind(questionnaire_id)
            .bind(&attemptor.kind)
            .bind(attemptor.id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Executable::from).collect())
    }

    async fn create_executable(&self, new: NewExecutable) -> Result<Executable, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO executables (questionnaire_id, executable_type, executable_id, score, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            EXECUTABLE_COLUMNS
        );
        let row: ExecutableRow = sqlx::query_as(&sql)
            .bind(new.questionnaire_id)
            .bind(&new.attemptor.kind)
            .bind(new.attemptor.id)
            .bind(new.score)
            .bind(new.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_fk_error(e, AppError::NotFound("Questionnaire not found".to_string())))?;
        let executable = Executable::from(row);

        for answer in new.answers {
            sqlx::query(
                r#"
                INSERT INTO answers (executable_id, question_id, alternative_id, description, score)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(executable.id)
            .bind(answer.question_id)
            .bind(answer.alternative_id)
            .bind(answer.description)
            .bind(answer.score)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                map_fk_error(
                    e,
                    AppError::BadRequest(format!(
                        "Answer to question {} references a missing record",
                        answer.question_id
                    )),
                )
            })?;
        }

        tx.commit().await?;

        Ok(executable)
    }

    async fn get_executable(&self, id: i64) -> Result<Option<ExecutableDetail>, AppError> {
        let sql = format!("SELECT {} FROM executables WHERE id = $1", EXECUTABLE_COLUMNS);
        let row: Option<ExecutableRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let answers: Vec<AnswerDetailRow> = sqlx::query_as(
            r#"
            SELECT
                a.id, a.executable_id, a.question_id, a.alternative_id, a.description, a.score,
                q.description AS question_description,
                q.question_type,
                alt.description AS alternative_description
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            LEFT JOIN alternatives alt ON alt.id = a.alternative_id
            WHERE a.executable_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(ExecutableDetail {
            executable: Executable::from(row),
            answers: answers
                .into_iter()
                .map(AnswerDetail::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        }))
    }

    async fn list_executables(
        &self,
        filter: &ExecutableFilter,
        page: &PaginationParams,
    ) -> Result<(Vec<Executable>, i64), AppError> {
        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM executables");
        push_executable_filter(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM executables", EXECUTABLE_COLUMNS));
        push_executable_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.limit()))
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<ExecutableRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list executables: {:?}", e);
                AppError::from(e)
            })?;

        Ok((rows.into_iter().map(Executable::from).collect(), total))
    }
}
