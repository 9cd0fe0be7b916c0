// src/models/question.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::level::CertificationLevel;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Pools are partitioned by level.
    pub level: CertificationLevel,

    /// The text content of the question.
    pub content: String,

    /// List of options in their stored order.
    pub options: Vec<String>,

    /// The correct option, stored as its full text.
    pub answer: String,

    /// Explanation or analysis of the correct answer.
    pub analysis: Option<String>,
}

impl Question {
    /// Index of the correct option in stored order.
    pub fn answer_index(&self) -> Option<usize> {
        self.options.iter().position(|o| o == &self.answer)
    }
}

/// DTO for sending a question to the client (no answer, options in session order).
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    /// Options as presented, each prefixed by its letter.
    pub options: Vec<PresentedOption>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresentedOption {
    pub letter: String,
    pub text: String,
}

/// DTO for creating a new question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub level: CertificationLevel,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(length(min = 2, max = 10), custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
    #[validate(length(max = 2000))]
    pub analysis: Option<String>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
        // Grading matches the answer by text, so options must be distinct.
        if !seen.insert(opt.trim()) {
            return Err(validator::ValidationError::new("duplicate_option"));
        }
    }
    Ok(())
}
