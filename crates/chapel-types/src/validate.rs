use thiserror::Error;

use crate::models::{
    AboutConfig, Announcement, BibleQuiz, ContactMessage, DailyVerse, Department,
    DepartmentInterest, Donation, DonationProject, HomeConfig, Leader, Member, NewsItem,
    QuizResult, VerseReflection,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Field-level checks applied before any record is written.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

fn email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') => Ok(()),
        _ => Err(ValidationError::new(field, format!("'{}' is not an email address", value))),
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(field, "must be a non-negative number"));
    }
    Ok(())
}

/// Lower-case and trim an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Validate for Member {
    fn validate(&self) -> Result<(), ValidationError> {
        required("fullName", &self.full_name)?;
        email("email", &self.email)
    }
}

impl Validate for NewsItem {
    fn validate(&self) -> Result<(), ValidationError> {
        required("title", &self.title)?;
        required("content", &self.content)
    }
}

impl Validate for Leader {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        required("position", &self.position)
    }
}

impl Validate for Announcement {
    fn validate(&self) -> Result<(), ValidationError> {
        required("title", &self.title)?;
        required("content", &self.content)
    }
}

impl Validate for Department {
    fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        required("description", &self.description)
    }
}

impl Validate for DepartmentInterest {
    fn validate(&self) -> Result<(), ValidationError> {
        required("fullName", &self.full_name)?;
        email("email", &self.email)?;
        required("departmentId", &self.department_id)?;
        required("motivation", &self.motivation)
    }
}

impl Validate for Donation {
    fn validate(&self) -> Result<(), ValidationError> {
        required("donorName", &self.donor_name)?;
        email("email", &self.email)?;
        non_negative("amount", self.amount)?;
        if self.amount == 0.0 {
            return Err(ValidationError::new("amount", "must be greater than zero"));
        }
        required("currency", &self.currency)
    }
}

impl Validate for DonationProject {
    fn validate(&self) -> Result<(), ValidationError> {
        required("title", &self.title)?;
        non_negative("goal", self.goal)?;
        non_negative("raised", self.raised)
    }
}

impl Validate for ContactMessage {
    fn validate(&self) -> Result<(), ValidationError> {
        required("fullName", &self.full_name)?;
        email("email", &self.email)?;
        required("subject", &self.subject)?;
        required("message", &self.message)
    }
}

impl Validate for HomeConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        required("heroTitle", &self.hero_title)
    }
}

impl Validate for AboutConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        required("title", &self.title)
    }
}

impl Validate for DailyVerse {
    fn validate(&self) -> Result<(), ValidationError> {
        required("reference", &self.reference)?;
        required("text", &self.text)
    }
}

impl Validate for BibleQuiz {
    fn validate(&self) -> Result<(), ValidationError> {
        required("title", &self.title)?;
        if self.questions.is_empty() {
            return Err(ValidationError::new("questions", "a quiz needs at least one question"));
        }
        for q in &self.questions {
            required("question", &q.question)?;
            required("correctAnswer", &q.correct_answer)?;
        }
        Ok(())
    }
}

impl Validate for VerseReflection {
    fn validate(&self) -> Result<(), ValidationError> {
        required("verseId", &self.verse_id)?;
        required("fullName", &self.full_name)?;
        required("content", &self.content)
    }
}

impl Validate for QuizResult {
    fn validate(&self) -> Result<(), ValidationError> {
        required("quizId", &self.quiz_id)?;
        required("fullName", &self.full_name)?;
        if self.score > self.total {
            return Err(ValidationError::new("score", "cannot exceed total"));
        }
        Ok(())
    }
}
