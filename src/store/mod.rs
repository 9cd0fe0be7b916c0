// src/store/mod.rs

//! Persistence for users, questions, attempts, certificates and sessions.
//!
//! The engine never calls into this module; handlers read snapshots from a
//! store, hand them to the engine, and write back the results.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    attempt::{NewAttempt, QuizAttempt},
    certificate::UserCertificate,
    level::CertificationLevel,
    question::{CreateQuestionRequest, Question},
    session::QuizSession,
    user::User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Conflict(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type SharedStore = Arc<dyn CertificationStore>;

/// Everything a graded submission writes. Applied all-or-nothing.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub attempt: NewAttempt,
    /// Certificates to insert or replace.
    pub award: Vec<UserCertificate>,
    /// Certificate slug to delete.
    pub revoke: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordedOutcome {
    pub attempt: QuizAttempt,
    /// Whether `revoke` actually removed a certificate.
    pub revoked: bool,
}

#[async_trait]
pub trait CertificationStore: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn list_certificates(&self, user_id: i64) -> Result<Vec<UserCertificate>, StoreError>;

    /// Attempts ordered by `attempted_at` ascending.
    async fn list_attempts(
        &self,
        user_id: i64,
        level: Option<CertificationLevel>,
    ) -> Result<Vec<QuizAttempt>, StoreError>;

    async fn purchased_blocks(
        &self,
        user_id: i64,
        level: CertificationLevel,
    ) -> Result<u32, StoreError>;

    /// Adds one purchased block and returns the new total.
    async fn add_purchased_block(
        &self,
        user_id: i64,
        level: CertificationLevel,
    ) -> Result<u32, StoreError>;

    async fn question_pool(&self, level: CertificationLevel) -> Result<Vec<Question>, StoreError>;

    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, StoreError>;

    async fn create_question(&self, question: &CreateQuestionRequest) -> Result<i64, StoreError>;

    async fn delete_question(&self, id: i64) -> Result<bool, StoreError>;

    /// Appends the attempt (numbered next for its user and level) and applies
    /// the certificate changes in one unit.
    async fn record_outcome(
        &self,
        outcome: &AttemptOutcome,
    ) -> Result<RecordedOutcome, StoreError>;

    /// Inserts or replaces the (user_id, certificate_slug) row.
    async fn upsert_certificate(&self, certificate: &UserCertificate) -> Result<(), StoreError>;

    async fn revoke_certificate(&self, user_id: i64, slug: &str) -> Result<bool, StoreError>;

    /// Stores a new session and drops every session expired by its `created_at`.
    /// `Conflict` when the user already has a live session at that level.
    async fn save_session(&self, session: &QuizSession) -> Result<(), StoreError>;

    /// Removes and returns the session; a session can be taken only once.
    async fn take_session(
        &self,
        id: Uuid,
        user_id: i64,
    ) -> Result<Option<QuizSession>, StoreError>;
}
