// src/models/questionnaire.rs

use std::{fmt, str::FromStr};

use chrono::{Datelike, DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::QuestionWithAlternatives;

/// Unit of a waiting or execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Months,
    Years,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Months => "months",
            TimeUnit::Years => "years",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            "days" => Ok(TimeUnit::Days),
            "months" => Ok(TimeUnit::Months),
            "years" => Ok(TimeUnit::Years),
            other => Err(format!("unknown time unit '{}'", other)),
        }
    }
}

/// An amount of time expressed in calendar units, e.g. "2 days".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub amount: u32,
    pub unit: TimeUnit,
}

impl TimeSpan {
    pub fn new(amount: u32, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// Returns `start` shifted forward by this span.
    ///
    /// Month and year steps keep the day of month and let it overflow into the
    /// following month when the target month is shorter (Jan 31 + 1 month = Mar 3
    /// in a common year). Results past the representable range saturate at the
    /// maximum instant.
    pub fn after(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        let amount = i64::from(self.amount);
        let shifted = match self.unit {
            TimeUnit::Minutes => TimeDelta::try_minutes(amount).and_then(|d| start.checked_add_signed(d)),
            TimeUnit::Hours => TimeDelta::try_hours(amount).and_then(|d| start.checked_add_signed(d)),
            TimeUnit::Days => TimeDelta::try_days(amount).and_then(|d| start.checked_add_signed(d)),
            TimeUnit::Months => add_months_overflowing(start, self.amount),
            TimeUnit::Years => self
                .amount
                .checked_mul(12)
                .and_then(|months| add_months_overflowing(start, months)),
        };

        shifted.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Adds whole months from the first of the month, then the remaining days.
fn add_months_overflowing(start: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let leftover_days = TimeDelta::try_days(i64::from(start.day() - 1))?;
    start
        .with_day(1)?
        .checked_add_months(Months::new(months))?
        .checked_add_signed(leftover_days)
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

/// A questionnaire and its policy flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Questionnaire {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub is_active: bool,

    /// Limits how many times one attemptor may execute the questionnaire.
    pub answer_once: bool,

    /// Shuffle question order when serving the attempt form.
    pub rand_questions: bool,

    /// Shuffle alternatives of each question when serving the attempt form.
    pub rand_alternatives: bool,

    /// Minimum time between two executions by the same attemptor.
    pub waiting_time: Option<TimeSpan>,

    /// Time the attemptor has to finish once the form is served.
    pub execution_time: Option<TimeSpan>,

    pub created_at: DateTime<Utc>,
}

/// Questionnaire with its questions, as shown to administrators.
#[derive(Debug, Serialize)]
pub struct QuestionnaireDetail {
    #[serde(flatten)]
    pub questionnaire: Questionnaire,
    pub questions: Vec<QuestionWithAlternatives>,
}

/// Field values for inserting or replacing a questionnaire.
#[derive(Debug, Clone)]
pub struct NewQuestionnaire {
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub is_active: bool,
    pub answer_once: bool,
    pub rand_questions: bool,
    pub rand_alternatives: bool,
    pub waiting_time: Option<TimeSpan>,
    pub execution_time: Option<TimeSpan>,
}

fn default_true() -> bool {
    true
}

/// DTO for creating or updating a questionnaire.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionnaireRequest {
    #[validate(length(min = 1, max = 255, message = "Name length must be between 1 and 255 chars"))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub answer_once: bool,
    #[serde(default)]
    pub rand_questions: bool,
    #[serde(default = "default_true")]
    pub rand_alternatives: bool,
    pub waiting_time: Option<TimeSpan>,
    pub execution_time: Option<TimeSpan>,
}

impl QuestionnaireRequest {
    pub fn into_new(self) -> NewQuestionnaire {
        use crate::utils::html::clean_html;

        NewQuestionnaire {
            name: self.name,
            description: self.description.as_deref().map(clean_html),
            instructions: self.instructions.as_deref().map(clean_html),
            is_active: self.is_active,
            answer_once: self.answer_once,
            rand_questions: self.rand_questions,
            rand_alternatives: self.rand_alternatives,
            waiting_time: self.waiting_time,
            execution_time: self.execution_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_span_after_fixed_units() {
        let start = at(2024, 3, 10, 12);
        assert_eq!(TimeSpan::new(30, TimeUnit::Minutes).after(start), start + TimeDelta::minutes(30));
        assert_eq!(TimeSpan::new(5, TimeUnit::Hours).after(start), at(2024, 3, 10, 17));
        assert_eq!(TimeSpan::new(1, TimeUnit::Days).after(start), at(2024, 3, 11, 12));
    }

    #[test]
    fn test_span_after_calendar_units_overflow() {
        assert_eq!(TimeSpan::new(1, TimeUnit::Months).after(at(2023, 1, 31, 8)), at(2023, 3, 3, 8));
        assert_eq!(TimeSpan::new(1, TimeUnit::Months).after(at(2024, 1, 31, 8)), at(2024, 3, 2, 8));
        assert_eq!(TimeSpan::new(1, TimeUnit::Years).after(at(2024, 2, 29, 8)), at(2025, 3, 1, 8));
    }

    #[test]
    fn test_span_after_calendar_units_keep_day() {
        assert_eq!(TimeSpan::new(2, TimeUnit::Months).after(at(2023, 11, 15, 8)), at(2024, 1, 15, 8));
        assert_eq!(TimeSpan::new(3, TimeUnit::Years).after(at(2021, 6, 30, 23)), at(2024, 6, 30, 23));
    }

    #[test]
    fn test_span_after_saturates() {
        let span = TimeSpan::new(u32::MAX, TimeUnit::Years);
        assert_eq!(span.after(at(2024, 1, 1, 0)), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_time_unit_parse() {
        assert_eq!("days".parse::<TimeUnit>(), Ok(TimeUnit::Days));
        assert!("weeks".parse::<TimeUnit>().is_err());
        assert_eq!(TimeUnit::Months.to_string(), "months");
    }
}
