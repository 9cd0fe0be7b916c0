// src/handlers/certification.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::Config,
    engine::{
        Eligibility, EligibilityInput, QuizPolicy, SelectionError, can_start_quiz,
        scoring::{self, certificate_outcome, grade},
        select_quiz_questions,
        selector::{option_letter, shuffle_option_order},
    },
    error::AppError,
    models::{
        attempt::{NewAttempt, SubmitQuizRequest, SubmitQuizResponse},
        certificate::{CertificateView, UserCertificate},
        level::CertificationLevel,
        question::{PresentedOption, PublicQuestion, Question},
        session::{QuizSession, SessionQuestion, StartQuizResponse},
    },
    store::{AttemptOutcome, SharedStore, StoreError},
    utils::jwt::Claims,
};

fn history_failure(err: StoreError) -> AppError {
    AppError::HistoryFetchFailure(err.to_string())
}

/// Reads the caller's history and runs the eligibility rules.
/// A failed read aborts the decision instead of treating history as empty.
async fn load_eligibility(
    store: &SharedStore,
    policy: &QuizPolicy,
    user_id: i64,
    level: CertificationLevel,
    now: DateTime<Utc>,
) -> Result<Eligibility, AppError> {
    let certificates = store
        .list_certificates(user_id)
        .await
        .map_err(history_failure)?;
    let attempts = store
        .list_attempts(user_id, Some(level))
        .await
        .map_err(history_failure)?;
    let purchased_blocks = store
        .purchased_blocks(user_id, level)
        .await
        .map_err(history_failure)?;

    Ok(can_start_quiz(
        policy,
        EligibilityInput {
            level,
            certificates: &certificates,
            attempts: &attempts,
            purchased_blocks,
            now,
        },
    ))
}

/// Draws the session's questions and option orders.
/// Kept synchronous so the thread-local RNG never lives across an await.
fn draw_session(
    pool: Vec<Question>,
    user_id: i64,
    level: CertificationLevel,
    policy: &QuizPolicy,
    now: DateTime<Utc>,
) -> Result<(QuizSession, Vec<PublicQuestion>), SelectionError> {
    let mut rng = rand::thread_rng();
    let drawn = select_quiz_questions(pool, policy.sample_size, &mut rng)?;

    let mut session_questions = Vec::with_capacity(drawn.len());
    let mut public_questions = Vec::with_capacity(drawn.len());

    for question in drawn {
        let option_order = shuffle_option_order(question.options.len(), &mut rng);
        let options = option_order
            .iter()
            .enumerate()
            .map(|(presented, &stored)| PresentedOption {
                letter: option_letter(presented),
                text: question.options[stored].clone(),
            })
            .collect();

        public_questions.push(PublicQuestion {
            id: question.id,
            content: question.content,
            options,
        });
        session_questions.push(SessionQuestion {
            question_id: question.id,
            option_order,
        });
    }

    let session = QuizSession {
        id: Uuid::new_v4(),
        user_id,
        level,
        questions: session_questions,
        created_at: now,
        expires_at: now + policy.session_ttl(),
    };
    Ok((session, public_questions))
}

/// Lists the caller's certificates, including expired ones.
pub async fn my_certificates(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let now = Utc::now();

    let certificates: Vec<CertificateView> = store
        .list_certificates(user_id)
        .await?
        .into_iter()
        .map(|c| CertificateView::new(c, now))
        .collect();

    Ok(Json(certificates))
}

/// Reports whether the caller may start a quiz at `level` right now.
pub async fn get_eligibility(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(level): Path<CertificationLevel>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let eligibility = load_eligibility(&store, &config.policy, user_id, level, Utc::now()).await?;
    Ok(Json(eligibility))
}

/// The caller's attempts at `level`, newest first.
pub async fn attempt_history(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(level): Path<CertificationLevel>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let mut attempts = store
        .list_attempts(user_id, Some(level))
        .await
        .map_err(history_failure)?;
    attempts.reverse();
    Ok(Json(attempts))
}

/// Starts a quiz session.
///
/// * Denied: 403 with the eligibility details (cooldown, recommendation, ...).
/// * Admitted: draws the questions, shuffles option order and stores the
///   session so the submission can be graded against it.
/// * 409 while another session at the same level is still open.
pub async fn start_quiz(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(level): Path<CertificationLevel>,
) -> Result<Response, AppError> {
    let user_id = claims.user_id()?;
    let now = Utc::now();
    let policy = &config.policy;

    let eligibility = load_eligibility(&store, policy, user_id, level, now).await?;
    if !eligibility.is_admitted() {
        tracing::info!(user_id, %level, "Quiz start denied");
        return Ok((StatusCode::FORBIDDEN, Json(eligibility)).into_response());
    }

    let pool = store.question_pool(level).await?;
    let (session, questions) = draw_session(pool, user_id, level, policy, now)?;
    store.save_session(&session).await?;

    tracing::info!(user_id, %level, session_id = %session.id, "Quiz session started");

    Ok(Json(StartQuizResponse {
        session_id: session.id,
        level,
        questions,
        expires_in: policy.session_ttl_seconds,
        eligibility,
    })
    .into_response())
}

/// Submits a quiz session.
///
/// * Consumes the session; a second submission gets 404.
/// * Grades against the session's option order.
/// * Appends the attempt and awards or revokes certificates in one store call.
pub async fn submit_quiz(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let now = Utc::now();
    let policy = &config.policy;

    let session = store
        .take_session(req.session_id, user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Quiz session not found or already submitted".to_string())
        })?;

    if session.is_expired_at(now) {
        return Err(AppError::BadRequest("Quiz session has expired".to_string()));
    }

    let ids: Vec<i64> = session.questions.iter().map(|q| q.question_id).collect();
    let questions: HashMap<i64, Question> = store
        .questions_by_ids(&ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();

    let report = grade(&session.questions, &questions, &req.answers);
    let passed = scoring::passed(report.score, policy);

    let change = certificate_outcome(session.level, passed);
    let expires_at = policy.certificate_expiry(now);
    let recorded = store
        .record_outcome(&AttemptOutcome {
            attempt: NewAttempt {
                user_id,
                level: session.level,
                attempted_at: now,
                passed,
                score: report.score,
            },
            award: change
                .award
                .iter()
                .map(|slug| UserCertificate {
                    user_id,
                    certificate_slug: slug.to_string(),
                    earned_at: now,
                    expires_at,
                })
                .collect(),
            revoke: change.revoke.map(str::to_string),
        })
        .await?;
    let attempt = recorded.attempt;
    let certificate_revoked = change.revoke.filter(|_| recorded.revoked).map(str::to_string);

    tracing::info!(
        user_id,
        level = %session.level,
        attempt_number = attempt.attempt_number,
        score = report.score,
        passed,
        "Quiz submitted"
    );

    let message = if passed {
        format!("Congratulations! You passed the {} certification.", session.level)
    } else {
        "Score too low. Review the material and try again.".to_string()
    };

    Ok(Json(SubmitQuizResponse {
        level: session.level,
        score: report.score,
        correct_count: report.correct_count,
        total_questions: report.total_questions,
        passed,
        attempt_number: attempt.attempt_number,
        certificate_awarded: change.award.iter().map(|s| s.to_string()).collect(),
        certificate_revoked,
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: i64) -> Vec<Question> {
        (1..=n)
            .map(|id| Question {
                id,
                level: CertificationLevel::Beginner,
                content: format!("Question {}", id),
                options: vec!["w".into(), "x".into(), "y".into(), "z".into()],
                answer: "y".into(),
                analysis: None,
            })
            .collect()
    }

    #[test]
    fn test_draw_session_matches_presented_options() {
        let policy = QuizPolicy::default();
        let now = Utc::now();
        let (session, public) =
            draw_session(pool(30), 9, CertificationLevel::Beginner, &policy, now).unwrap();

        assert_eq!(session.questions.len(), 25);
        assert_eq!(public.len(), 25);
        assert_eq!(session.expires_at - session.created_at, policy.session_ttl());

        for (sq, pq) in session.questions.iter().zip(&public) {
            assert_eq!(sq.question_id, pq.id);
            let correct_letter = pq.options.iter().find(|o| o.text == "y").unwrap();
            let stored = crate::engine::selector::resolve_choice(
                &sq.option_order,
                &correct_letter.letter,
            );
            assert_eq!(stored, Some(2));
        }
    }

    #[test]
    fn test_draw_session_small_pool() {
        let err = draw_session(
            pool(3),
            9,
            CertificationLevel::Beginner,
            &QuizPolicy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SelectionError::InsufficientPool {
                available: 3,
                required: 25
            }
        );
    }
}
