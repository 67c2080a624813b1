// src/services/scoring.rs

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use crate::models::{
    executable::{AnswerValue, NewAnswer},
    question::{QuestionType, QuestionWithAlternatives},
};

/// Why a submission could not be graded.
#[derive(Debug, Clone, PartialEq)]
pub enum GradingError {
    NoAnswers,
    UnknownQuestion(i64),
    InvalidAlternative { question_id: i64, value: String },
    UnknownAlternative { question_id: i64, alternative_id: i64 },
    MissingRequired(Vec<i64>),
}

impl fmt::Display for GradingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradingError::NoAnswers => write!(f, "No answers submitted"),
            GradingError::UnknownQuestion(id) => {
                write!(f, "Question {} does not belong to this questionnaire", id)
            }
            GradingError::InvalidAlternative { question_id, value } => write!(
                f,
                "Question {} expects an alternative id, got '{}'",
                question_id, value
            ),
            GradingError::UnknownAlternative {
                question_id,
                alternative_id,
            } => write!(
                f,
                "Alternative {} does not belong to question {}",
                alternative_id, question_id
            ),
            GradingError::MissingRequired(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "Required questions not answered: {}", ids.join(", "))
            }
        }
    }
}

impl std::error::Error for GradingError {}

/// Result of grading one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    /// Weighted average over correct closed answers; 0 when nothing counts.
    pub score: f64,
    pub answers: Vec<NewAnswer>,
}

/// Running sums for the weighted average.
#[derive(Debug, Default)]
struct WeightedAverage {
    sum_values: f64,
    sum_weight: f64,
    suppressed: bool,
}

impl WeightedAverage {
    fn add(&mut self, weight: f64, value: f64) {
        self.sum_values += weight * value;
        self.sum_weight += weight;
    }

    fn finish(&self) -> f64 {
        if self.suppressed || self.sum_values == 0.0 || self.sum_weight == 0.0 {
            return 0.0;
        }
        self.sum_values / self.sum_weight
    }
}

/// Grades the answers of one execution.
///
/// `questions` holds the active questions of the questionnaire keyed by id.
/// A correct closed answer scores `weight * value`, a wrong one 0. Open answers
/// carry no score and, when present, keep the aggregate at 0 for the whole execution.
pub fn grade(
    questions: &HashMap<i64, QuestionWithAlternatives>,
    answers: BTreeMap<i64, AnswerValue>,
) -> Result<Grade, GradingError> {
    if answers.is_empty() {
        return Err(GradingError::NoAnswers);
    }

    if let Some(&unknown) = answers.keys().find(|id| !questions.contains_key(*id)) {
        return Err(GradingError::UnknownQuestion(unknown));
    }

    let mut missing: Vec<i64> = questions
        .values()
        .filter(|q| q.question.is_required && !answers.contains_key(&q.question.id))
        .map(|q| q.question.id)
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(GradingError::MissingRequired(missing));
    }

    let mut average = WeightedAverage::default();
    let mut graded = Vec::with_capacity(answers.len());

    for (question_id, value) in answers {
        let question = questions
            .get(&question_id)
            .ok_or(GradingError::UnknownQuestion(question_id))?;

        match question.question.question_type {
            QuestionType::Closed => {
                let alternative_id =
                    value
                        .as_alternative_id()
                        .ok_or_else(|| GradingError::InvalidAlternative {
                            question_id,
                            value: value.clone().into_text(),
                        })?;
                let alternative = question.alternative(alternative_id).ok_or(
                    GradingError::UnknownAlternative {
                        question_id,
                        alternative_id,
                    },
                )?;

                let score = if alternative.is_correct {
                    average.add(question.question.weight, alternative.value);
                    question.question.weight * alternative.value
                } else {
                    0.0
                };

                graded.push(NewAnswer {
                    question_id,
                    alternative_id: Some(alternative_id),
                    description: None,
                    score: Some(score),
                });
            }
            QuestionType::Open => {
                average.suppressed = true;
                graded.push(NewAnswer {
                    question_id,
                    alternative_id: None,
                    description: Some(value.into_text()),
                    score: None,
                });
            }
        }
    }

    Ok(Grade {
        score: average.finish(),
        answers: graded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Alternative, Question};
    use chrono::Utc;

    fn closed(id: i64, weight: f64, alternatives: &[(i64, f64, bool)]) -> QuestionWithAlternatives {
        QuestionWithAlternatives {
            question: Question {
                id,
                questionnaire_id: 1,
                description: format!("Question {}", id),
                hint: None,
                weight,
                is_required: false,
                is_active: true,
                question_type: QuestionType::Closed,
                created_at: Utc::now(),
            },
            alternatives: alternatives
                .iter()
                .map(|&(alt_id, value, is_correct)| Alternative {
                    id: alt_id,
                    question_id: id,
                    description: format!("Alternative {}", alt_id),
                    value,
                    is_correct,
                })
                .collect(),
        }
    }

    fn open(id: i64) -> QuestionWithAlternatives {
        let mut q = closed(id, 1.0, &[]);
        q.question.question_type = QuestionType::Open;
        q
    }

    fn bank(questions: Vec<QuestionWithAlternatives>) -> HashMap<i64, QuestionWithAlternatives> {
        questions.into_iter().map(|q| (q.question.id, q)).collect()
    }

    #[test]
    fn test_grade_all_correct_is_weighted_average() {
        let questions = bank(vec![
            closed(1, 2.0, &[(10, 10.0, true), (11, 0.0, false)]),
            closed(2, 1.0, &[(20, 4.0, true), (21, 0.0, false)]),
        ]);
        let answers = BTreeMap::from([(1, AnswerValue::Number(10)), (2, AnswerValue::from("20"))]);

        let grade = grade(&questions, answers).unwrap();

        // (2*10 + 1*4) / (2 + 1)
        assert_eq!(grade.score, 8.0);
        assert_eq!(grade.answers[0].score, Some(20.0));
        assert_eq!(grade.answers[1].score, Some(4.0));
        assert_eq!(grade.answers[1].alternative_id, Some(20));
    }

    #[test]
    fn test_grade_wrong_answers_do_not_count_weight() {
        let questions = bank(vec![
            closed(1, 3.0, &[(10, 5.0, true), (11, 9.0, false)]),
            closed(2, 1.0, &[(20, 7.0, true), (21, 9.0, false)]),
        ]);
        let answers = BTreeMap::from([(1, AnswerValue::Number(11)), (2, AnswerValue::Number(20))]);

        let grade = grade(&questions, answers).unwrap();

        assert_eq!(grade.score, 7.0);
        assert_eq!(grade.answers[0].score, Some(0.0));
    }

    #[test]
    fn test_grade_no_correct_answers_keeps_zero() {
        let questions = bank(vec![closed(1, 2.0, &[(10, 5.0, true), (11, 1.0, false)])]);
        let answers = BTreeMap::from([(1, AnswerValue::Number(11))]);

        let grade = grade(&questions, answers).unwrap();

        assert_eq!(grade.score, 0.0);
        assert_eq!(grade.answers[0].score, Some(0.0));
    }

    #[test]
    fn test_grade_open_answer_suppresses_aggregate() {
        let questions = bank(vec![
            open(1),
            closed(2, 1.0, &[(20, 10.0, true)]),
        ]);
        let answers = BTreeMap::from([
            (1, AnswerValue::from("Because of the weather")),
            (2, AnswerValue::Number(20)),
        ]);

        let grade = grade(&questions, answers).unwrap();

        assert_eq!(grade.score, 0.0);
        assert_eq!(grade.answers[0].alternative_id, None);
        assert_eq!(grade.answers[0].score, None);
        assert_eq!(grade.answers[0].description.as_deref(), Some("Because of the weather"));
        // The closed answer is still scored individually.
        assert_eq!(grade.answers[1].score, Some(10.0));
    }

    #[test]
    fn test_grade_rejects_unknown_question() {
        let questions = bank(vec![closed(1, 1.0, &[(10, 1.0, true)])]);
        let answers = BTreeMap::from([(99, AnswerValue::Number(10))]);

        assert_eq!(grade(&questions, answers), Err(GradingError::UnknownQuestion(99)));
    }

    #[test]
    fn test_grade_rejects_foreign_alternative() {
        let questions = bank(vec![
            closed(1, 1.0, &[(10, 1.0, true)]),
            closed(2, 1.0, &[(20, 1.0, true)]),
        ]);
        let answers = BTreeMap::from([(1, AnswerValue::Number(20))]);

        assert_eq!(
            grade(&questions, answers),
            Err(GradingError::UnknownAlternative {
                question_id: 1,
                alternative_id: 20
            })
        );
    }

    #[test]
    fn test_grade_rejects_non_numeric_alternative() {
        let questions = bank(vec![closed(1, 1.0, &[(10, 1.0, true)])]);
        let answers = BTreeMap::from([(1, AnswerValue::from("ten"))]);

        assert!(matches!(
            grade(&questions, answers),
            Err(GradingError::InvalidAlternative { question_id: 1, .. })
        ));
    }

    #[test]
    fn test_grade_requires_required_questions() {
        let mut required = closed(2, 1.0, &[(20, 1.0, true)]);
        required.question.is_required = true;
        let questions = bank(vec![closed(1, 1.0, &[(10, 1.0, true)]), required]);
        let answers = BTreeMap::from([(1, AnswerValue::Number(10))]);

        assert_eq!(grade(&questions, answers), Err(GradingError::MissingRequired(vec![2])));
    }

    #[test]
    fn test_grade_reports_unknown_question_before_missing_required() {
        let mut required = closed(2, 1.0, &[(20, 1.0, true)]);
        required.question.is_required = true;
        let questions = bank(vec![closed(1, 1.0, &[(10, 1.0, true)]), required]);
        let answers = BTreeMap::from([(1, AnswerValue::Number(10)), (99, AnswerValue::Number(10))]);

        assert_eq!(grade(&questions, answers), Err(GradingError::UnknownQuestion(99)));
    }

    #[test]
    fn test_grade_empty_submission() {
        let questions = bank(vec![closed(1, 1.0, &[(10, 1.0, true)])]);
        assert_eq!(grade(&questions, BTreeMap::new()), Err(GradingError::NoAnswers));
    }
}
