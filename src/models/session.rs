// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::level::CertificationLevel;

/// A drawn quiz, alive from start until submission or expiry.
/// Holds the presentation order so answers can be graded server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: Uuid,
    pub user_id: i64,
    pub level: CertificationLevel,
    pub questions: Vec<SessionQuestion>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QuizSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionQuestion {
    pub question_id: i64,
    /// `option_order[presented] = stored index`.
    pub option_order: Vec<usize>,
}

/// Response of the start endpoint.
#[derive(Debug, Serialize)]
pub struct StartQuizResponse {
    pub session_id: Uuid,
    pub level: CertificationLevel,
    pub questions: Vec<crate::models::question::PublicQuestion>,
    pub expires_in: u64, // seconds
    pub eligibility: crate::engine::eligibility::Eligibility,
}
