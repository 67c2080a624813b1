// src/models/question.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Closed questions are answered by picking an alternative; open ones with free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Closed,
    Open,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Closed => "closed",
            QuestionType::Open => "open",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(QuestionType::Closed),
            "open" => Ok(QuestionType::Open),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// Represents the 'questions' table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub questionnaire_id: i64,
    pub description: String,
    pub hint: Option<String>,

    /// Multiplier applied to the chosen alternative's value.
    pub weight: f64,
    pub is_required: bool,
    pub is_active: bool,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'alternatives' table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alternative {
    pub id: i64,
    pub question_id: i64,
    pub description: String,
    pub value: f64,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestionWithAlternatives {
    #[serde(flatten)]
    pub question: Question,
    pub alternatives: Vec<Alternative>,
}

impl QuestionWithAlternatives {
    pub fn alternative(&self, id: i64) -> Option<&Alternative> {
        self.alternatives.iter().find(|a| a.id == id)
    }
}

/// DTO for sending an alternative to an attemptor (hides value and correctness).
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicAlternative {
    pub id: i64,
    pub description: String,
}

/// DTO for sending a question to an attemptor.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub description: String,
    pub hint: Option<String>,
    pub weight: f64,
    pub is_required: bool,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub alternatives: Vec<PublicAlternative>,
}

impl From<QuestionWithAlternatives> for PublicQuestion {
    fn from(q: QuestionWithAlternatives) -> Self {
        Self {
            id: q.question.id,
            description: q.question.description,
            hint: q.question.hint,
            weight: q.question.weight,
            is_required: q.question.is_required,
            question_type: q.question.question_type,
            alternatives: q
                .alternatives
                .into_iter()
                .map(|a| PublicAlternative {
                    id: a.id,
                    description: a.description,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAlternative {
    pub description: String,
    pub value: f64,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub description: String,
    pub hint: Option<String>,
    pub weight: f64,
    pub is_required: bool,
    pub is_active: bool,
    pub question_type: QuestionType,
    pub alternatives: Vec<NewAlternative>,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

/// DTO for creating an alternative.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAlternativeRequest {
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub is_correct: bool,
}

impl CreateAlternativeRequest {
    pub fn into_new(self) -> NewAlternative {
        NewAlternative {
            description: crate::utils::html::clean_html(&self.description),
            value: self.value,
            is_correct: self.is_correct,
        }
    }
}

/// DTO for creating a question, optionally with its alternatives.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(length(max = 1000))]
    pub hint: Option<String>,
    #[serde(default = "default_weight")]
    #[validate(range(min = 0.0))]
    pub weight: f64,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    #[validate(nested)]
    pub alternatives: Vec<CreateAlternativeRequest>,
}

impl CreateQuestionRequest {
    pub fn into_new(self) -> NewQuestion {
        use crate::utils::html::clean_html;

        NewQuestion {
            description: clean_html(&self.description),
            hint: self.hint.as_deref().map(clean_html),
            weight: self.weight,
            is_required: self.is_required,
            is_active: self.is_active,
            question_type: self.question_type,
            alternatives: self.alternatives.into_iter().map(|a| a.into_new()).collect(),
        }
    }
}
