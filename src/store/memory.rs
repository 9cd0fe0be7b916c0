// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AttemptOutcome, CertificationStore, RecordedOutcome, StoreError};
use crate::models::{
    attempt::QuizAttempt,
    certificate::UserCertificate,
    level::CertificationLevel,
    question::{CreateQuestionRequest, Question},
    session::QuizSession,
    user::User,
};

/// In-process store used by tests and local runs without Postgres.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    questions: Vec<Question>,
    attempts: Vec<QuizAttempt>,
    certificates: Vec<UserCertificate>,
    purchases: HashMap<(i64, CertificationLevel), u32>,
    sessions: HashMap<Uuid, QuizSession>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn upsert(&mut self, certificate: &UserCertificate) {
        self.certificates.retain(|c| {
            !(c.user_id == certificate.user_id
                && c.certificate_slug == certificate.certificate_slug)
        });
        self.certificates.push(certificate.clone());
    }

    fn revoke(&mut self, user_id: i64, slug: &str) -> bool {
        let before = self.certificates.len();
        self.certificates
            .retain(|c| !(c.user_id == user_id && c.certificate_slug == slug));
        self.certificates.len() != before
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an attempt verbatim, keeping its timestamp and number.
    /// Lets tests build histories in the past.
    pub async fn insert_attempt(&self, attempt: QuizAttempt) {
        self.inner.lock().await.attempts.push(attempt);
    }
}

#[async_trait]
impl CertificationStore for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, StoreError> {
        let mut t = self.inner.lock().await;
        if t.users.iter().any(|u| u.username == username) {
            return Err(StoreError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }

        let user = User {
            id: t.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.to_string(),
            created_at: Some(Utc::now()),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let t = self.inner.lock().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let t = self.inner.lock().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_certificates(&self, user_id: i64) -> Result<Vec<UserCertificate>, StoreError> {
        let t = self.inner.lock().await;
        Ok(t.certificates
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_attempts(
        &self,
        user_id: i64,
        level: Option<CertificationLevel>,
    ) -> Result<Vec<QuizAttempt>, StoreError> {
        let t = self.inner.lock().await;
        let mut attempts: Vec<QuizAttempt> = t
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && level.is_none_or(|l| a.level == l))
            .cloned()
            .collect();
        attempts.sort_by_key(|a| (a.attempted_at, a.attempt_number));
        Ok(attempts)
    }

    async fn purchased_blocks(
        &self,
        user_id: i64,
        level: CertificationLevel,
    ) -> Result<u32, StoreError> {
        let t = self.inner.lock().await;
        Ok(t.purchases.get(&(user_id, level)).copied().unwrap_or(0))
    }

    async fn add_purchased_block(
        &self,
        user_id: i64,
        level: CertificationLevel,
    ) -> Result<u32, StoreError> {
        let mut t = self.inner.lock().await;
        let blocks = t.purchases.entry((user_id, level)).or_insert(0);
        *blocks += 1;
        Ok(*blocks)
    }

    async fn question_pool(&self, level: CertificationLevel) -> Result<Vec<Question>, StoreError> {
        let t = self.inner.lock().await;
        Ok(t.questions
            .iter()
            .filter(|q| q.level == level)
            .cloned()
            .collect())
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, StoreError> {
        let t = self.inner.lock().await;
        Ok(t.questions
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn create_question(&self, question: &CreateQuestionRequest) -> Result<i64, StoreError> {
        let mut t = self.inner.lock().await;
        let id = t.next_id();
        t.questions.push(Question {
            id,
            level: question.level,
            content: question.content.clone(),
            options: question.options.clone(),
            answer: question.answer.clone(),
            analysis: question.analysis.clone(),
        });
        Ok(id)
    }

    async fn delete_question(&self, id: i64) -> Result<bool, StoreError> {
        let mut t = self.inner.lock().await;
        let before = t.questions.len();
        t.questions.retain(|q| q.id != id);
        Ok(t.questions.len() != before)
    }

    async fn record_outcome(
        &self,
        outcome: &AttemptOutcome,
    ) -> Result<RecordedOutcome, StoreError> {
        let mut t = self.inner.lock().await;
        let attempt = &outcome.attempt;
        let attempt_number = t
            .attempts
            .iter()
            .filter(|a| a.user_id == attempt.user_id && a.level == attempt.level)
            .map(|a| a.attempt_number)
            .max()
            .unwrap_or(0)
            + 1;

        let recorded = QuizAttempt {
            id: t.next_id(),
            user_id: attempt.user_id,
            level: attempt.level,
            attempted_at: attempt.attempted_at,
            passed: attempt.passed,
            score: attempt.score,
            attempt_number,
        };
        t.attempts.push(recorded.clone());

        for certificate in &outcome.award {
            t.upsert(certificate);
        }
        let revoked = match &outcome.revoke {
            Some(slug) => t.revoke(attempt.user_id, slug),
            None => false,
        };

        Ok(RecordedOutcome {
            attempt: recorded,
            revoked,
        })
    }

    async fn upsert_certificate(&self, certificate: &UserCertificate) -> Result<(), StoreError> {
        self.inner.lock().await.upsert(certificate);
        Ok(())
    }

    async fn revoke_certificate(&self, user_id: i64, slug: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.revoke(user_id, slug))
    }

    async fn save_session(&self, session: &QuizSession) -> Result<(), StoreError> {
        let mut t = self.inner.lock().await;
        t.sessions.retain(|_, s| !s.is_expired_at(session.created_at));

        if t
            .sessions
            .values()
            .any(|s| s.user_id == session.user_id && s.level == session.level)
        {
            return Err(StoreError::Conflict(format!(
                "A {} quiz is already in progress",
                session.level
            )));
        }

        t.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn take_session(
        &self,
        id: Uuid,
        user_id: i64,
    ) -> Result<Option<QuizSession>, StoreError> {
        let mut t = self.inner.lock().await;
        let owned = t.sessions.get(&id).is_some_and(|s| s.user_id == user_id);
        if !owned {
            return Ok(None);
        }
        Ok(t.sessions.remove(&id))
    }
}
