// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::level::CertificationLevel;

/// Represents the 'quiz_attempts' table.
/// Append-only: one row per submitted quiz session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub level: CertificationLevel,
    pub attempted_at: DateTime<Utc>,
    pub passed: bool,
    pub score: f64,
    /// Monotonically increasing per (user_id, level), starting at 1.
    pub attempt_number: i32,
}

/// Data for appending a new attempt. The store assigns `id` and `attempt_number`.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: i64,
    pub level: CertificationLevel,
    pub attempted_at: DateTime<Utc>,
    pub passed: bool,
    pub score: f64,
}

/// DTO for submitting a quiz session.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    /// The session id received from the start endpoint.
    pub session_id: Uuid,

    /// Key: Question ID
    /// Value: Presented option letter ("A", "B", ...)
    pub answers: HashMap<i64, String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub level: CertificationLevel,
    pub score: f64,
    pub correct_count: usize,
    pub total_questions: usize,
    pub passed: bool,
    pub attempt_number: i32,
    pub certificate_awarded: Vec<String>,
    pub certificate_revoked: Option<String>,
    pub message: String,
}
