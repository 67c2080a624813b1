// src/services/eligibility.rs

use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::{executable::Executable, questionnaire::Questionnaire};

/// Why a new execution is not allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Inactive,
    /// The waiting time since the last execution has not elapsed yet.
    Cooldown { available_at: DateTime<Utc> },
    AnsweredOnce,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Inactive => "inactive",
            Rejection::Cooldown { .. } => "cooldown",
            Rejection::AnsweredOnce => "answered_once",
        }
    }

    pub fn available_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Rejection::Cooldown { available_at } => Some(*available_at),
            _ => None,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Inactive => write!(f, "This questionnaire is not active"),
            Rejection::Cooldown { available_at } => write!(
                f,
                "You cannot answer this questionnaire again yet. Come back on {}!",
                available_at.format("%d/%m/%Y")
            ),
            Rejection::AnsweredOnce => write!(f, "This questionnaire can only be answered once!"),
        }
    }
}

/// A permitted execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Instant the attemptor should finish by. Advisory only, submissions are not cut off.
    pub deadline: Option<DateTime<Utc>>,
}

/// Decides whether an attemptor may execute `questionnaire` at `now`.
///
/// `prior` holds the attemptor's earlier executions of this questionnaire.
pub fn check(
    questionnaire: &Questionnaire,
    prior: &[Executable],
    now: DateTime<Utc>,
) -> Result<Admission, Rejection> {
    if !questionnaire.is_active {
        return Err(Rejection::Inactive);
    }

    if let (Some(waiting_time), Some(last)) = (
        questionnaire.waiting_time,
        prior.iter().map(|e| e.created_at).max(),
    ) {
        let available_at = waiting_time.after(last);
        if available_at > now {
            return Err(Rejection::Cooldown { available_at });
        }
    }

    // One execution is tolerated before answer-once locks the questionnaire.
    if questionnaire.answer_once && prior.len() > 1 {
        return Err(Rejection::AnsweredOnce);
    }

    Ok(Admission {
        deadline: questionnaire.execution_time.map(|span| span.after(now)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        executable::Attemptor,
        questionnaire::{TimeSpan, TimeUnit},
    };
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    fn questionnaire() -> Questionnaire {
        Questionnaire {
            id: 1,
            name: "Safety induction".to_string(),
            description: None,
            instructions: None,
            is_active: true,
            answer_once: false,
            rand_questions: false,
            rand_alternatives: true,
            waiting_time: None,
            execution_time: None,
            created_at: t0(),
        }
    }

    fn execution(id: i64, created_at: DateTime<Utc>) -> Executable {
        Executable {
            id,
            questionnaire_id: 1,
            attemptor: Attemptor::new("users", 7),
            score: 0.0,
            created_at,
        }
    }

    #[test]
    fn test_first_attempt_allowed() {
        let admission = check(&questionnaire(), &[], t0()).unwrap();
        assert_eq!(admission.deadline, None);
    }

    #[test]
    fn test_cooldown_one_day() {
        let mut q = questionnaire();
        q.waiting_time = Some(TimeSpan::new(1, TimeUnit::Days));
        let prior = [execution(1, t0())];

        let rejected = check(&q, &prior, t0() + TimeDelta::hours(23));
        assert_eq!(
            rejected,
            Err(Rejection::Cooldown {
                available_at: t0() + TimeDelta::days(1)
            })
        );

        assert!(check(&q, &prior, t0() + TimeDelta::hours(25)).is_ok());
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let mut q = questionnaire();
        q.waiting_time = Some(TimeSpan::new(30, TimeUnit::Minutes));
        let prior = [execution(1, t0())];

        assert!(check(&q, &prior, t0() + TimeDelta::minutes(30)).is_ok());
    }

    #[test]
    fn test_cooldown_uses_latest_execution() {
        let mut q = questionnaire();
        q.waiting_time = Some(TimeSpan::new(2, TimeUnit::Hours));
        let prior = [
            execution(1, t0() - TimeDelta::days(3)),
            execution(2, t0()),
        ];

        assert!(check(&q, &prior, t0() + TimeDelta::hours(1)).is_err());
    }

    #[test]
    fn test_answer_once_rejects_after_two_executions() {
        let mut q = questionnaire();
        q.answer_once = true;

        assert!(check(&q, &[execution(1, t0())], t0()).is_ok());

        let prior = [execution(1, t0()), execution(2, t0())];
        assert_eq!(check(&q, &prior, t0()), Err(Rejection::AnsweredOnce));
    }

    #[test]
    fn test_inactive_questionnaire_rejected() {
        let mut q = questionnaire();
        q.is_active = false;
        assert_eq!(check(&q, &[], t0()), Err(Rejection::Inactive));
    }

    #[test]
    fn test_deadline_from_execution_time() {
        let mut q = questionnaire();
        q.execution_time = Some(TimeSpan::new(45, TimeUnit::Minutes));

        let admission = check(&q, &[], t0()).unwrap();
        assert_eq!(admission.deadline, Some(t0() + TimeDelta::minutes(45)));
    }

    #[test]
    fn test_rejection_message_formats_date() {
        let rejection = Rejection::Cooldown {
            available_at: t0(),
        };
        assert_eq!(
            rejection.to_string(),
            "You cannot answer this questionnaire again yet. Come back on 01/06/2024!"
        );
        assert_eq!(rejection.code(), "cooldown");
    }
}
