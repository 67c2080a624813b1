// src/store/memory.rs

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        executable::{
            Answer, AnswerDetail, Attemptor, Executable, ExecutableDetail, ExecutableFilter,
            NewExecutable,
        },
        pagination::PaginationParams,
        question::{Alternative, NewAlternative, NewQuestion, Question, QuestionWithAlternatives},
        questionnaire::{NewQuestionnaire, Questionnaire},
    },
    store::QuizStore,
};

#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i64, T>,
    last_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Debug, Default)]
struct Tables {
    questionnaires: Table<Questionnaire>,
    questions: Table<Question>,
    alternatives: Table<Alternative>,
    executables: Table<Executable>,
    answers: Table<Answer>,
}

impl Tables {
    fn questions_with_alternatives(
        &self,
        questionnaire_id: i64,
        only_active: bool,
    ) -> Vec<QuestionWithAlternatives> {
        self.questions
            .rows
            .values()
            .filter(|q| q.questionnaire_id == questionnaire_id && (!only_active || q.is_active))
            .map(|q| QuestionWithAlternatives {
                question: q.clone(),
                alternatives: self
                    .alternatives
                    .rows
                    .values()
                    .filter(|a| a.question_id == q.id)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    fn remove_executable(&mut self, id: i64) {
        self.executables.rows.remove(&id);
        self.answers.rows.retain(|_, a| a.executable_id != id);
    }

    fn remove_question(&mut self, id: i64) {
        self.questions.rows.remove(&id);
        self.alternatives.rows.retain(|_, a| a.question_id != id);
    }
}

/// Process-local store with the same semantics as the PostgreSQL schema,
/// including cascading deletes and answer references blocking deletion.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn matches_filter(executable: &Executable, filter: &ExecutableFilter) -> bool {
    filter
        .questionnaire_id
        .is_none_or(|id| executable.questionnaire_id == id)
        && filter
            .attemptor
            .as_ref()
            .is_none_or(|attemptor| &executable.attemptor == attemptor)
}

/// Newest first; ties broken by id so equal timestamps keep insertion order reversed.
fn newest_first(a: &Executable, b: &Executable) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn list_questionnaires(&self, only_active: bool) -> Result<Vec<Questionnaire>, AppError> {
        let tables = self.lock();
        Ok(tables
            .questionnaires
            .rows
            .values()
            .filter(|q| !only_active || q.is_active)
            .cloned()
            .collect())
    }

    async fn get_questionnaire(&self, id: i64) -> Result<Option<Questionnaire>, AppError> {
        Ok(self.lock().questionnaires.rows.get(&id).cloned())
    }

    async fn create_questionnaire(
        &self,
        new: NewQuestionnaire,
        created_at: DateTime<Utc>,
    ) -> Result<Questionnaire, AppError> {
        let mut tables = self.lock();
        let id = tables.questionnaires.next_id();
        let questionnaire = Questionnaire {
            id,
            name: new.name,
            description: new.description,
            instructions: new.instructions,
            is_active: new.is_active,
            answer_once: new.answer_once,
            rand_questions: new.rand_questions,
            rand_alternatives: new.rand_alternatives,
            waiting_time: new.waiting_time,
            execution_time: new.execution_time,
            created_at,
        };
        tables.questionnaires.rows.insert(id, questionnaire.clone());
        Ok(questionnaire)
    }

    async fn update_questionnaire(
        &self,
        id: i64,
        new: NewQuestionnaire,
    ) -> Result<Option<Questionnaire>, AppError> {
        let mut tables = self.lock();
        let Some(questionnaire) = tables.questionnaires.rows.get_mut(&id) else {
            return Ok(None);
        };

        questionnaire.name = new.name;
        questionnaire.description = new.description;
        questionnaire.instructions = new.instructions;
        questionnaire.is_active = new.is_active;
        questionnaire.answer_once = new.answer_once;
        questionnaire.rand_questions = new.rand_questions;
        questionnaire.rand_alternatives = new.rand_alternatives;
        questionnaire.waiting_time = new.waiting_time;
        questionnaire.execution_time = new.execution_time;

        Ok(Some(questionnaire.clone()))
    }

    async fn delete_questionnaire(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock();
        if tables.questionnaires.rows.remove(&id).is_none() {
            return Ok(false);
        }

        let executable_ids: Vec<i64> = tables
            .executables
            .rows
            .values()
            .filter(|e| e.questionnaire_id == id)
            .map(|e| e.id)
            .collect();
        for executable_id in executable_ids {
            tables.remove_executable(executable_id);
        }

        let question_ids: Vec<i64> = tables
            .questions
            .rows
            .values()
            .filter(|q| q.questionnaire_id == id)
            .map(|q| q.id)
            .collect();
        for question_id in question_ids {
            tables.remove_question(question_id);
        }

        Ok(true)
    }

    async fn list_questions(
        &self,
        questionnaire_id: i64,
        only_active: bool,
    ) -> Result<Vec<QuestionWithAlternatives>, AppError> {
        Ok(self.lock().questions_with_alternatives(questionnaire_id, only_active))
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.lock().questions.rows.get(&id).cloned())
    }

    async fn create_question(
        &self,
        questionnaire_id: i64,
        new: NewQuestion,
        created_at: DateTime<Utc>,
    ) -> Result<QuestionWithAlternatives, AppError> {
        let mut tables = self.lock();
        if !tables.questionnaires.rows.contains_key(&questionnaire_id) {
            return Err(AppError::NotFound("Questionnaire not found".to_string()));
        }

        let id = tables.questions.next_id();
        let question = Question {
            id,
            questionnaire_id,
            description: new.description,
            hint: new.hint,
            weight: new.weight,
            is_required: new.is_required,
            is_active: new.is_active,
            question_type: new.question_type,
            created_at,
        };
        tables.questions.rows.insert(id, question.clone());

        let mut alternatives = Vec::with_capacity(new.alternatives.len());
        for alt in new.alternatives {
            let alt_id = tables.alternatives.next_id();
            let alternative = Alternative {
                id: alt_id,
                question_id: id,
                description: alt.description,
                value: alt.value,
                is_correct: alt.is_correct,
            };
            tables.alternatives.rows.insert(alt_id, alternative.clone());
            alternatives.push(alternative);
        }

        Ok(QuestionWithAlternatives {
            question,
            alternatives,
        })
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock();
        if !tables.questions.rows.contains_key(&id) {
            return Ok(false);
        }
        if tables.answers.rows.values().any(|a| a.question_id == id) {
            return Err(AppError::Conflict(
                "Question has answers and cannot be deleted".to_string(),
            ));
        }

        tables.remove_question(id);
        Ok(true)
    }

    async fn create_alternative(
        &self,
        question_id: i64,
        new: NewAlternative,
    ) -> Result<Alternative, AppError> {
        let mut tables = self.lock();
        if !tables.questions.rows.contains_key(&question_id) {
            return Err(AppError::NotFound("Question not found".to_string()));
        }

        let id = tables.alternatives.next_id();
        let alternative = Alternative {
            id,
            question_id,
            description: new.description,
            value: new.value,
            is_correct: new.is_correct,
        };
        tables.alternatives.rows.insert(id, alternative.clone());
        Ok(alternative)
    }

    async fn delete_alternative(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock();
        if !tables.alternatives.rows.contains_key(&id) {
            return Ok(false);
        }
        if tables
            .answers
            .rows
            .values()
            .any(|a| a.alternative_id == Some(id))
        {
            return Err(AppError::Conflict(
                "Alternative has been chosen and cannot be deleted".to_string(),
            ));
        }

        tables.alternatives.rows.remove(&id);
        Ok(true)
    }

    async fn list_attemptor_executables(
        &self,
        questionnaire_id: i64,
        attemptor: &Attemptor,
    ) -> Result<Vec<Executable>, AppError> {
        let tables = self.lock();
        let mut executables: Vec<Executable> = tables
            .executables
            .rows
            .values()
            .filter(|e| e.questionnaire_id == questionnaire_id && &e.attemptor == attemptor)
            .cloned()
            .collect();
        executables.sort_by(newest_first);
        Ok(executables)
    }

    async fn create_executable(&self, new: NewExecutable) -> Result<Executable, AppError> {
        let mut tables = self.lock();
        if !tables.questionnaires.rows.contains_key(&new.questionnaire_id) {
            return Err(AppError::NotFound("Questionnaire not found".to_string()));
        }

        // Validate every reference before writing anything.
        for answer in &new.answers {
            if !tables.questions.rows.contains_key(&answer.question_id) {
                return Err(AppError::BadRequest(format!(
                    "Question {} not found",
                    answer.question_id
                )));
            }
            if let Some(alternative_id) = answer.alternative_id {
                if !tables.alternatives.rows.contains_key(&alternative_id) {
                    return Err(AppError::BadRequest(format!(
                        "Alternative {} not found",
                        alternative_id
                    )));
                }
            }
        }

        let id = tables.executables.next_id();
        let executable = Executable {
            id,
            questionnaire_id: new.questionnaire_id,
            attemptor: new.attemptor,
            score: new.score,
            created_at: new.created_at,
        };
        tables.executables.rows.insert(id, executable.clone());

        for answer in new.answers {
            let answer_id = tables.answers.next_id();
            tables.answers.rows.insert(
                answer_id,
                Answer {
                    id: answer_id,
                    executable_id: id,
                    question_id: answer.question_id,
                    alternative_id: answer.alternative_id,
                    description: answer.description,
                    score: answer.score,
                },
            );
        }

        Ok(executable)
    }

    async fn get_executable(&self, id: i64) -> Result<Option<ExecutableDetail>, AppError> {
        let tables = self.lock();
        let Some(executable) = tables.executables.rows.get(&id).cloned() else {
            return Ok(None);
        };

        let mut answers = Vec::new();
        for answer in tables.answers.rows.values().filter(|a| a.executable_id == id) {
            let question = tables.questions.rows.get(&answer.question_id).ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Answer {} references missing question {}",
                    answer.id, answer.question_id
                ))
            })?;
            let alternative_description = answer
                .alternative_id
                .and_then(|alt_id| tables.alternatives.rows.get(&alt_id))
                .map(|alt| alt.description.clone());

            answers.push(AnswerDetail {
                answer: answer.clone(),
                question_description: question.description.clone(),
                question_type: question.question_type,
                alternative_description,
            });
        }

        Ok(Some(ExecutableDetail {
            executable,
            answers,
        }))
    }

    async fn list_executables(
        &self,
        filter: &ExecutableFilter,
        page: &PaginationParams,
    ) -> Result<(Vec<Executable>, i64), AppError> {
        let tables = self.lock();
        let mut matching: Vec<Executable> = tables
            .executables
            .rows
            .values()
            .filter(|e| matches_filter(e, filter))
            .cloned()
            .collect();
        matching.sort_by(newest_first);

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit() as usize)
            .collect();

        Ok((data, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        executable::NewAnswer,
        question::QuestionType,
    };
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap()
    }

    fn new_questionnaire(name: &str) -> NewQuestionnaire {
        NewQuestionnaire {
            name: name.to_string(),
            description: None,
            instructions: None,
            is_active: true,
            answer_once: false,
            rand_questions: false,
            rand_alternatives: true,
            waiting_time: None,
            execution_time: None,
        }
    }

    fn new_closed_question() -> NewQuestion {
        NewQuestion {
            description: "Pick one".to_string(),
            hint: None,
            weight: 1.0,
            is_required: false,
            is_active: true,
            question_type: QuestionType::Closed,
            alternatives: vec![
                NewAlternative {
                    description: "Right".to_string(),
                    value: 10.0,
                    is_correct: true,
                },
                NewAlternative {
                    description: "Wrong".to_string(),
                    value: 0.0,
                    is_correct: false,
                },
            ],
        }
    }

    async fn seeded() -> (MemoryStore, Questionnaire, QuestionWithAlternatives) {
        let store = MemoryStore::new();
        let questionnaire = store
            .create_questionnaire(new_questionnaire("Onboarding"), t0())
            .await
            .unwrap();
        let question = store
            .create_question(questionnaire.id, new_closed_question(), t0())
            .await
            .unwrap();
        (store, questionnaire, question)
    }

    fn submission(
        questionnaire_id: i64,
        question: &QuestionWithAlternatives,
        attemptor: &Attemptor,
        created_at: DateTime<Utc>,
    ) -> NewExecutable {
        NewExecutable {
            questionnaire_id,
            attemptor: attemptor.clone(),
            score: 10.0,
            created_at,
            answers: vec![NewAnswer {
                question_id: question.question.id,
                alternative_id: Some(question.alternatives[0].id),
                description: None,
                score: Some(10.0),
            }],
        }
    }

    #[tokio::test]
    async fn test_new_store_starts_empty() {
        let store = MemoryStore::new();
        assert!(store.list_questionnaires(false).await.unwrap().is_empty());

        let first = store
            .create_questionnaire(new_questionnaire("First"), t0())
            .await
            .unwrap();
        assert_eq!(first.id, 1);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let (store, questionnaire, question) = seeded().await;
        let alice = Attemptor::new("users", 1);
        store
            .create_executable(submission(questionnaire.id, &question, &alice, t0()))
            .await
            .unwrap();

        let page = PaginationParams { page: u32::MAX, page_size: 100 };
        let (data, total) = store
            .list_executables(&ExecutableFilter::default(), &page)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_question_with_alternatives_roundtrip() {
        let (store, questionnaire, question) = seeded().await;

        let listed = store.list_questions(questionnaire.id, true).await.unwrap();
        assert_eq!(listed, vec![question.clone()]);
        assert_eq!(listed[0].alternatives.len(), 2);
    }

    #[tokio::test]
    async fn test_inactive_questions_filtered() {
        let (store, questionnaire, _) = seeded().await;
        let mut hidden = new_closed_question();
        hidden.is_active = false;
        store.create_question(questionnaire.id, hidden, t0()).await.unwrap();

        assert_eq!(store.list_questions(questionnaire.id, true).await.unwrap().len(), 1);
        assert_eq!(store.list_questions(questionnaire.id, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_attemptor_executions_newest_first() {
        let (store, questionnaire, question) = seeded().await;
        let alice = Attemptor::new("users", 1);
        let bob = Attemptor::new("users", 2);

        store
            .create_executable(submission(questionnaire.id, &question, &alice, t0()))
            .await
            .unwrap();
        let latest = store
            .create_executable(submission(questionnaire.id, &question, &alice, t0() + TimeDelta::hours(1)))
            .await
            .unwrap();
        store
            .create_executable(submission(questionnaire.id, &question, &bob, t0()))
            .await
            .unwrap();

        let history = store
            .list_attemptor_executables(questionnaire.id, &alice)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, latest.id);
    }

    #[tokio::test]
    async fn test_executable_detail_joins_answers() {
        let (store, questionnaire, question) = seeded().await;
        let alice = Attemptor::new("users", 1);
        let executable = store
            .create_executable(submission(questionnaire.id, &question, &alice, t0()))
            .await
            .unwrap();

        let detail = store.get_executable(executable.id).await.unwrap().unwrap();
        assert_eq!(detail.answers.len(), 1);
        assert_eq!(detail.answers[0].question_description, "Pick one");
        assert_eq!(detail.answers[0].alternative_description.as_deref(), Some("Right"));
        assert!(store.get_executable(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_answered_question_cannot_be_deleted() {
        let (store, questionnaire, question) = seeded().await;
        let alice = Attemptor::new("users", 1);
        store
            .create_executable(submission(questionnaire.id, &question, &alice, t0()))
            .await
            .unwrap();

        let result = store.delete_question(question.question.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        let result = store.delete_alternative(question.alternatives[0].id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(store.delete_alternative(question.alternatives[1].id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_questionnaire_cascades() {
        let (store, questionnaire, question) = seeded().await;
        let alice = Attemptor::new("users", 1);
        let executable = store
            .create_executable(submission(questionnaire.id, &question, &alice, t0()))
            .await
            .unwrap();

        assert!(store.delete_questionnaire(questionnaire.id).await.unwrap());
        assert!(store.get_question(question.question.id).await.unwrap().is_none());
        assert!(store.get_executable(executable.id).await.unwrap().is_none());
        assert!(!store.delete_questionnaire(questionnaire.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_executables_paginates_and_filters() {
        let (store, questionnaire, question) = seeded().await;
        let alice = Attemptor::new("users", 1);
        let bob = Attemptor::new("users", 2);
        for hour in 0..3 {
            store
                .create_executable(submission(
                    questionnaire.id,
                    &question,
                    &alice,
                    t0() + TimeDelta::hours(hour),
                ))
                .await
                .unwrap();
        }
        store
            .create_executable(submission(questionnaire.id, &question, &bob, t0()))
            .await
            .unwrap();

        let filter = ExecutableFilter {
            questionnaire_id: Some(questionnaire.id),
            attemptor: Some(alice.clone()),
        };
        let page = PaginationParams { page: 2, page_size: 2 };
        let (data, total) = store.list_executables(&filter, &page).await.unwrap();

        assert_eq!(total, 3);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].created_at, t0());

        let (all, total) = store
            .list_executables(&ExecutableFilter::default(), &PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(all.len(), 4);
    }
}
