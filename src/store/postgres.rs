// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{AttemptOutcome, CertificationStore, RecordedOutcome, StoreError};
use crate::models::{
    attempt::QuizAttempt,
    certificate::UserCertificate,
    level::CertificationLevel,
    question::{CreateQuestionRequest, Question},
    session::{QuizSession, SessionQuestion},
    user::User,
};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_level(raw: &str) -> Result<CertificationLevel, StoreError> {
    raw.parse()
        .map_err(|e: crate::models::level::UnknownLevel| StoreError::Corrupt(e.to_string()))
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    user_id: i64,
    level: String,
    attempted_at: DateTime<Utc>,
    passed: bool,
    score: f64,
    attempt_number: i32,
}

impl TryFrom<AttemptRow> for QuizAttempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(QuizAttempt {
            id: row.id,
            user_id: row.user_id,
            level: parse_level(&row.level)?,
            attempted_at: row.attempted_at,
            passed: row.passed,
            score: row.score,
            attempt_number: row.attempt_number,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    level: String,
    content: String,
    options: Json<Vec<String>>,
    answer: String,
    analysis: Option<String>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            level: parse_level(&row.level)?,
            content: row.content,
            options: row.options.0,
            answer: row.answer,
            analysis: row.analysis,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: i64,
    level: String,
    questions: Json<Vec<SessionQuestion>>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for QuizSession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(QuizSession {
            id: row.id,
            user_id: row.user_id,
            level: parse_level(&row.level)?,
            questions: row.questions.0,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

const UPSERT_CERTIFICATE: &str = r#"
    INSERT INTO user_certificates (user_id, certificate_slug, earned_at, expires_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (user_id, certificate_slug) DO UPDATE SET
        earned_at = EXCLUDED.earned_at,
        expires_at = EXCLUDED.expires_at
"#;

const REVOKE_CERTIFICATE: &str =
    "DELETE FROM user_certificates WHERE user_id = $1 AND certificate_slug = $2";

fn block_count(raw: i32) -> u32 {
    u32::try_from(raw).unwrap_or(0)
}

#[async_trait]
impl CertificationStore for PgStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict(format!("Username '{}' already exists", username))
            }
            other => StoreError::from(other),
        })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_certificates(&self, user_id: i64) -> Result<Vec<UserCertificate>, StoreError> {
        let certificates = sqlx::query_as::<_, UserCertificate>(
            r#"
            SELECT user_id, certificate_slug, earned_at, expires_at
            FROM user_certificates
            WHERE user_id = $1
            ORDER BY earned_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(certificates)
    }

    async fn list_attempts(
        &self,
        user_id: i64,
        level: Option<CertificationLevel>,
    ) -> Result<Vec<QuizAttempt>, StoreError> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT id, user_id, level, attempted_at, passed, score, attempt_number
            FROM quiz_attempts
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR level = $2)
            ORDER BY attempted_at ASC, attempt_number ASC
            "#,
        )
        .bind(user_id)
        .bind(level.map(|l| l.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(QuizAttempt::try_from).collect()
    }

    async fn purchased_blocks(
        &self,
        user_id: i64,
        level: CertificationLevel,
    ) -> Result<u32, StoreError> {
        let blocks: Option<i32> = sqlx::query_scalar(
            "SELECT blocks FROM attempt_purchases WHERE user_id = $1 AND level = $2",
        )
        .bind(user_id)
        .bind(level.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(blocks.map(block_count).unwrap_or(0))
    }

    async fn add_purchased_block(
        &self,
        user_id: i64,
        level: CertificationLevel,
    ) -> Result<u32, StoreError> {
        let blocks: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO attempt_purchases (user_id, level, blocks)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, level) DO UPDATE SET
                blocks = attempt_purchases.blocks + 1,
                updated_at = NOW()
            RETURNING blocks
            "#,
        )
        .bind(user_id)
        .bind(level.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(block_count(blocks))
    }

    async fn question_pool(&self, level: CertificationLevel) -> Result<Vec<Question>, StoreError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, level, content, options, answer, analysis
            FROM questions
            WHERE level = $1
            "#,
        )
        .bind(level.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, StoreError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, level, content, options, answer, analysis
            FROM questions
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn create_question(&self, question: &CreateQuestionRequest) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO questions (level, content, options, answer, analysis)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(question.level.as_str())
        .bind(&question.content)
        .bind(Json(&question.options))
        .bind(&question.answer)
        .bind(&question.analysis)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn delete_question(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_outcome(
        &self,
        outcome: &AttemptOutcome,
    ) -> Result<RecordedOutcome, StoreError> {
        let attempt = &outcome.attempt;
        let mut tx = self.pool.begin().await?;

        // Racing submissions collide on the (user_id, level, attempt_number) key.
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            INSERT INTO quiz_attempts (user_id, level, attempted_at, passed, score, attempt_number)
            SELECT $1, $2, $3, $4, $5, COALESCE(MAX(attempt_number), 0) + 1
            FROM quiz_attempts
            WHERE user_id = $1 AND level = $2
            RETURNING id, user_id, level, attempted_at, passed, score, attempt_number
            "#,
        )
        .bind(attempt.user_id)
        .bind(attempt.level.as_str())
        .bind(attempt.attempted_at)
        .bind(attempt.passed)
        .bind(attempt.score)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict(
                "Another submission for this level is being recorded".to_string(),
            ),
            other => StoreError::from(other),
        })?;

        for certificate in &outcome.award {
            sqlx::query(UPSERT_CERTIFICATE)
                .bind(certificate.user_id)
                .bind(&certificate.certificate_slug)
                .bind(certificate.earned_at)
                .bind(certificate.expires_at)
                .execute(&mut *tx)
                .await?;
        }

        let revoked = match &outcome.revoke {
            Some(slug) => {
                sqlx::query(REVOKE_CERTIFICATE)
                    .bind(attempt.user_id)
                    .bind(slug)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                    > 0
            }
            None => false,
        };

        tx.commit().await?;

        Ok(RecordedOutcome {
            attempt: QuizAttempt::try_from(row)?,
            revoked,
        })
    }

    async fn upsert_certificate(&self, certificate: &UserCertificate) -> Result<(), StoreError> {
        sqlx::query(UPSERT_CERTIFICATE)
            .bind(certificate.user_id)
            .bind(&certificate.certificate_slug)
            .bind(certificate.earned_at)
            .bind(certificate.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_certificate(&self, user_id: i64, slug: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(REVOKE_CERTIFICATE)
            .bind(user_id)
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_session(&self, session: &QuizSession) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM quiz_sessions WHERE expires_at <= $1")
            .bind(session.created_at)
            .execute(&mut *tx)
            .await?;

        // One live session per (user_id, level), enforced by a unique index.
        sqlx::query(
            r#"
            INSERT INTO quiz_sessions (id, user_id, level, questions, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.level.as_str())
        .bind(Json(&session.questions))
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict(
                format!("A {} quiz is already in progress", session.level),
            ),
            other => StoreError::from(other),
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn take_session(
        &self,
        id: Uuid,
        user_id: i64,
    ) -> Result<Option<QuizSession>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            DELETE FROM quiz_sessions
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, level, questions, created_at, expires_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QuizSession::try_from).transpose()
    }
}
