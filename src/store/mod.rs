// src/store/mod.rs

//! Persistence for questionnaires and their executions.
//!
//! Handlers talk to a `QuizStore` trait object; `PgStore` backs it with
//! PostgreSQL and `MemoryStore` keeps everything in process memory.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        executable::{Attemptor, Executable, ExecutableDetail, ExecutableFilter, NewExecutable},
        pagination::PaginationParams,
        question::{Alternative, NewAlternative, NewQuestion, Question, QuestionWithAlternatives},
        questionnaire::{NewQuestionnaire, Questionnaire},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn list_questionnaires(&self, only_active: bool) -> Result<Vec<Questionnaire>, AppError>;

    async fn get_questionnaire(&self, id: i64) -> Result<Option<Questionnaire>, AppError>;

    async fn create_questionnaire(
        &self,
        new: NewQuestionnaire,
        created_at: DateTime<Utc>,
    ) -> Result<Questionnaire, AppError>;

    /// Replaces every editable field. Returns `None` if the questionnaire does not exist.
    async fn update_questionnaire(
        &self,
        id: i64,
        new: NewQuestionnaire,
    ) -> Result<Option<Questionnaire>, AppError>;

    /// Deletes the questionnaire together with its questions and executions.
    async fn delete_questionnaire(&self, id: i64) -> Result<bool, AppError>;

    /// Questions of a questionnaire in creation order, each with its alternatives.
    async fn list_questions(
        &self,
        questionnaire_id: i64,
        only_active: bool,
    ) -> Result<Vec<QuestionWithAlternatives>, AppError>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    /// Inserts a question and its alternatives in one transaction.
    async fn create_question(
        &self,
        questionnaire_id: i64,
        new: NewQuestion,
        created_at: DateTime<Utc>,
    ) -> Result<QuestionWithAlternatives, AppError>;

    /// Fails with `Conflict` if the question has already been answered.
    async fn delete_question(&self, id: i64) -> Result<bool, AppError>;

    async fn create_alternative(
        &self,
        question_id: i64,
        new: NewAlternative,
    ) -> Result<Alternative, AppError>;

    /// Fails with `Conflict` if the alternative has already been chosen.
    async fn delete_alternative(&self, id: i64) -> Result<bool, AppError>;

    /// Executions of one questionnaire by one attemptor, newest first.
    async fn list_attemptor_executables(
        &self,
        questionnaire_id: i64,
        attemptor: &Attemptor,
    ) -> Result<Vec<Executable>, AppError>;

    /// Inserts an execution and all of its answers atomically.
    async fn create_executable(&self, new: NewExecutable) -> Result<Executable, AppError>;

    async fn get_executable(&self, id: i64) -> Result<Option<ExecutableDetail>, AppError>;

    /// One page of executions matching `filter`, newest first, plus the total count.
    async fn list_executables(
        &self,
        filter: &ExecutableFilter,
        page: &PaginationParams,
    ) -> Result<(Vec<Executable>, i64), AppError>;
}
