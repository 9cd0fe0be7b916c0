// src/engine/scoring.rs

use std::collections::HashMap;

use crate::engine::policy::QuizPolicy;
use crate::engine::selector::resolve_choice;
use crate::models::{level::CertificationLevel, question::Question, session::SessionQuestion};

#[derive(Debug, Clone, PartialEq)]
pub struct GradeReport {
    pub correct_count: usize,
    pub total_questions: usize,
    /// Percentage over every question in the session.
    pub score: f64,
}

/// Grades submitted letters against the session's presentation order.
///
/// Unanswered questions, unknown letters and answers for questions outside
/// the session all count as wrong.
pub fn grade(
    session_questions: &[SessionQuestion],
    questions: &HashMap<i64, Question>,
    answers: &HashMap<i64, String>,
) -> GradeReport {
    let total_questions = session_questions.len();
    if total_questions == 0 {
        return GradeReport {
            correct_count: 0,
            total_questions,
            score: 0.0,
        };
    }

    let correct_count = session_questions
        .iter()
        .filter(|sq| {
            let Some(question) = questions.get(&sq.question_id) else {
                return false;
            };
            let Some(letter) = answers.get(&sq.question_id) else {
                return false;
            };
            let chosen = resolve_choice(&sq.option_order, letter);
            chosen.is_some() && chosen == question.answer_index()
        })
        .count();

    let score = (correct_count as f64 / total_questions as f64) * 100.0;
    GradeReport {
        correct_count,
        total_questions,
        score,
    }
}

pub fn passed(score: f64, policy: &QuizPolicy) -> bool {
    score >= policy.passing_score_percentage
}

/// Certificate mutations that follow a graded attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChange {
    pub award: Vec<&'static str>,
    pub revoke: Option<&'static str>,
}

/// A pass awards the level certificate and its meta credential.
/// A fail revokes only the meta credential.
pub fn certificate_outcome(level: CertificationLevel, passed: bool) -> CertificateChange {
    if passed {
        let mut award = vec![level.slug()];
        award.extend(level.meta_slug());
        CertificateChange {
            award,
            revoke: None,
        }
    } else {
        CertificateChange {
            award: Vec::new(),
            revoke: level.meta_slug(),
        }
    }
}
