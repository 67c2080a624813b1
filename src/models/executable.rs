// src/models/executable.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    pagination::{PaginationParams, default_page, default_page_size},
    question::{PublicQuestion, QuestionType},
    questionnaire::Questionnaire,
};

/// The entity executing a questionnaire, stored polymorphically as type + id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attemptor {
    #[serde(rename = "executable_type")]
    pub kind: String,
    #[serde(rename = "executable_id")]
    pub id: i64,
}

impl Attemptor {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

/// Represents the 'executables' table: one attempt at a questionnaire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Executable {
    pub id: i64,
    pub questionnaire_id: i64,
    #[serde(flatten)]
    pub attemptor: Attemptor,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'answers' table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub id: i64,
    pub executable_id: i64,
    pub question_id: i64,
    /// Null for open questions.
    pub alternative_id: Option<i64>,
    pub description: Option<String>,
    /// Null for open questions.
    pub score: Option<f64>,
}

/// An answer joined with its question (and alternative, if any) for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerDetail {
    #[serde(flatten)]
    pub answer: Answer,
    pub question_description: String,
    pub question_type: QuestionType,
    pub alternative_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutableDetail {
    #[serde(flatten)]
    pub executable: Executable,
    pub answers: Vec<AnswerDetail>,
}

/// A graded answer ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnswer {
    pub question_id: i64,
    pub alternative_id: Option<i64>,
    pub description: Option<String>,
    pub score: Option<f64>,
}

/// An execution and its answers, inserted together.
#[derive(Debug, Clone)]
pub struct NewExecutable {
    pub questionnaire_id: i64,
    pub attemptor: Attemptor,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub answers: Vec<NewAnswer>,
}

/// A submitted answer value: an alternative id or free text.
/// Form posts send ids as strings, so both shapes are accepted for either question type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(i64),
    Text(String),
}

impl AnswerValue {
    pub fn as_alternative_id(&self) -> Option<i64> {
        match self {
            AnswerValue::Number(id) => Some(*id),
            AnswerValue::Text(text) => text.trim().parse().ok(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            AnswerValue::Number(n) => n.to_string(),
            AnswerValue::Text(text) => text,
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(text: &str) -> Self {
        AnswerValue::Text(text.to_string())
    }
}

impl From<i64> for AnswerValue {
    fn from(id: i64) -> Self {
        AnswerValue::Number(id)
    }
}

/// DTO for submitting answers.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    /// User's answers map.
    /// Key: Question ID
    /// Value: alternative id for closed questions, free text for open ones
    pub answers: BTreeMap<i64, AnswerValue>,
}

/// Questionnaire as served to an attemptor.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicQuestionnaire {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub questions: Vec<PublicQuestion>,
}

impl PublicQuestionnaire {
    pub fn new(questionnaire: Questionnaire, questions: Vec<PublicQuestion>) -> Self {
        Self {
            id: questionnaire.id,
            name: questionnaire.name,
            description: questionnaire.description,
            instructions: questionnaire.instructions,
            questions,
        }
    }
}

/// DTO for the attempt form.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptForm {
    pub questionnaire: PublicQuestionnaire,
    /// Client-side deadline, present when the questionnaire has an execution time.
    pub deadline: Option<DateTime<Utc>>,
}

/// Query parameters for listing executions.
#[derive(Debug, Deserialize)]
pub struct ExecutableListParams {
    pub questionnaire_id: Option<i64>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl ExecutableListParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Store-level filter for listing executions.
#[derive(Debug, Clone, Default)]
pub struct ExecutableFilter {
    pub questionnaire_id: Option<i64>,
    pub attemptor: Option<Attemptor>,
}
