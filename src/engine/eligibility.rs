// src/engine/eligibility.rs

//! Admission decisions for starting a certification quiz.
//!
//! Rules are evaluated in a fixed order and the first one that denies wins:
//! prerequisite gate, already-certified lockout, failure cascade, then
//! attempt-block / cooldown accounting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::policy::{CooldownExpiry, QuizPolicy};
use crate::models::{
    attempt::QuizAttempt, certificate::UserCertificate, level::CertificationLevel,
};

/// Snapshot of everything the engine needs for one decision.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityInput<'a> {
    pub level: CertificationLevel,
    pub certificates: &'a [UserCertificate],
    /// Attempts in any order; attempts at other levels are ignored.
    pub attempts: &'a [QuizAttempt],
    /// Purchased blocks for `level`.
    pub purchased_blocks: u32,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eligibility {
    #[serde(flatten)]
    pub decision: Decision,
    pub consecutive_failures: u32,
    pub holds_valid_certificate: bool,
}

impl Eligibility {
    pub fn is_admitted(&self) -> bool {
        matches!(self.decision, Decision::Admitted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Decision {
    Admitted(Admission),
    Denied(Denial),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptType {
    Free,
    Purchased,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub attempts_used_in_current_block: u32,
    pub total_allowed_in_block: u32,
    pub attempt_type: AttemptType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    PrerequisiteMissing,
    AlreadyCertified,
    CascadeRecommendation,
    CooldownActive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub reason: DenialReason,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_level: Option<CertificationLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerequisite_missing: Option<CertificationLevel>,
    pub needs_payment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_count: Option<u32>,
}

impl Denial {
    fn new(reason: DenialReason, message: String) -> Self {
        Self {
            reason,
            message,
            cooldown_until: None,
            recommended_level: None,
            prerequisite_missing: None,
            needs_payment: false,
            purchase_count: None,
        }
    }
}

/// Returns the currently valid certificate for `level`, if any.
pub fn valid_certificate<'a>(
    certificates: &'a [UserCertificate],
    level: CertificationLevel,
    now: DateTime<Utc>,
) -> Option<&'a UserCertificate> {
    certificates
        .iter()
        .filter(|c| c.certificate_slug == level.slug() && c.is_valid_at(now))
        .max_by_key(|c| c.expires_at)
}

/// Number of most recent attempts at `level` that failed in a row.
pub fn consecutive_failures(attempts: &[QuizAttempt], level: CertificationLevel) -> u32 {
    let mut at_level: Vec<&QuizAttempt> = attempts.iter().filter(|a| a.level == level).collect();
    // Newest first; attempt_number breaks ties between identical timestamps.
    at_level.sort_by(|a, b| {
        b.attempted_at
            .cmp(&a.attempted_at)
            .then(b.attempt_number.cmp(&a.attempt_number))
    });

    at_level.iter().take_while(|a| !a.passed).count() as u32
}

/// Level to fall back to after repeated failures at `level`.
///
/// One level down, unless the user already holds a valid certificate there
/// (or there is no level down), in which case `level` itself is returned.
pub fn recommend_level(
    level: CertificationLevel,
    certificates: &[UserCertificate],
    now: DateTime<Utc>,
) -> CertificationLevel {
    match level.previous() {
        Some(lower) if valid_certificate(certificates, lower, now).is_none() => lower,
        _ => level,
    }
}

/// Decides whether a new quiz attempt at `input.level` may begin.
pub fn can_start_quiz(policy: &QuizPolicy, input: EligibilityInput<'_>) -> Eligibility {
    let consecutive_failures = consecutive_failures(input.attempts, input.level);
    let holds_valid_certificate = CertificationLevel::ALL
        .iter()
        .any(|&l| valid_certificate(input.certificates, l, input.now).is_some());

    Eligibility {
        decision: decide(policy, &input, consecutive_failures),
        consecutive_failures,
        holds_valid_certificate,
    }
}

fn decide(policy: &QuizPolicy, input: &EligibilityInput<'_>, failures: u32) -> Decision {
    let level = input.level;
    let now = input.now;

    // 1. Prerequisite gate
    if policy.require_prerequisites {
        if let Some(required) = level.prerequisite() {
            if valid_certificate(input.certificates, required, now).is_none() {
                let mut denial = Denial::new(
                    DenialReason::PrerequisiteMissing,
                    format!(
                        "A valid {} certificate is required before attempting {}.",
                        required, level
                    ),
                );
                denial.prerequisite_missing = Some(required);
                denial.recommended_level = Some(required);
                return Decision::Denied(denial);
            }
        }
    }

    // 2. Already certified
    if let Some(cert) = valid_certificate(input.certificates, level, now) {
        let mut denial = Denial::new(
            DenialReason::AlreadyCertified,
            format!(
                "You already passed {}. You can retake it after your certificate expires.",
                level
            ),
        );
        denial.cooldown_until = Some(cert.expires_at);
        return Decision::Denied(denial);
    }

    // 3. Failure cascade
    if failures >= policy.cascade_threshold {
        let recommended = recommend_level(level, input.certificates, now);
        if recommended != level {
            let mut denial = Denial::new(
                DenialReason::CascadeRecommendation,
                format!(
                    "{} failed attempts in a row at {}. Try {} first.",
                    failures, level, recommended
                ),
            );
            denial.recommended_level = Some(recommended);
            return Decision::Denied(denial);
        }
    }

    // 4. Blocks and cooldown
    block_decision(policy, input)
}

/// Attempts at one level that were charged to a block.
///
/// Under `GrantAttempt`, an attempt taken once the free blocks are used up,
/// with the last block exactly exhausted and the cooldown since the previous
/// attempt elapsed, is the granted one and is not charged.
pub fn block_attempts(
    policy: &QuizPolicy,
    attempts: &[QuizAttempt],
    level: CertificationLevel,
) -> u32 {
    let per_block = policy.attempts_per_block.max(1);
    let free_attempts = policy.free_blocks.saturating_mul(per_block);

    let mut at_level: Vec<&QuizAttempt> = attempts.iter().filter(|a| a.level == level).collect();
    at_level.sort_by_key(|a| (a.attempted_at, a.attempt_number));

    let mut charged = 0u32;
    let mut previous: Option<&QuizAttempt> = None;
    for attempt in at_level {
        let granted = policy.cooldown_expiry == CooldownExpiry::GrantAttempt
            && charged >= free_attempts
            && charged % per_block == 0
            && previous
                .is_some_and(|p| attempt.attempted_at >= p.attempted_at + policy.cooldown());
        if !granted {
            charged += 1;
        }
        previous = Some(attempt);
    }
    charged
}

fn block_decision(policy: &QuizPolicy, input: &EligibilityInput<'_>) -> Decision {
    let per_block = policy.attempts_per_block.max(1);
    let level_attempts = input.attempts.iter().filter(|a| a.level == input.level);

    let charged = block_attempts(policy, input.attempts, input.level);
    let completed_blocks = charged / per_block;
    let entitled_blocks = policy.free_blocks.saturating_add(input.purchased_blocks);

    let admission = |attempt_type: AttemptType| {
        Decision::Admitted(Admission {
            attempts_used_in_current_block: charged % per_block,
            total_allowed_in_block: per_block,
            attempt_type,
        })
    };

    if completed_blocks < entitled_blocks {
        let attempt_type = if completed_blocks < policy.free_blocks {
            AttemptType::Free
        } else {
            AttemptType::Purchased
        };
        return admission(attempt_type);
    }

    let exhausted = |cooldown_until: Option<DateTime<Utc>>| {
        let mut denial = Denial::new(
            DenialReason::CooldownActive,
            "All attempts used. Purchase more attempts or wait for the cooldown to end."
                .to_string(),
        );
        denial.cooldown_until = cooldown_until;
        denial.needs_payment = true;
        denial.purchase_count = Some(input.purchased_blocks);
        Decision::Denied(denial)
    };

    // completed_blocks >= 1 here, so at least one attempt exists.
    let Some(last_attempt) = level_attempts.map(|a| a.attempted_at).max() else {
        return admission(AttemptType::Free);
    };
    let cooldown_until = last_attempt + policy.cooldown();

    if input.now < cooldown_until {
        return exhausted(Some(cooldown_until));
    }

    match policy.cooldown_expiry {
        CooldownExpiry::GrantAttempt => admission(AttemptType::Free),
        CooldownExpiry::RequirePayment => exhausted(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn attempt(level: CertificationLevel, n: i32, days_ago: i64, passed: bool) -> QuizAttempt {
        QuizAttempt {
            id: n as i64,
            user_id: 1,
            level,
            attempted_at: now() - Duration::days(days_ago),
            passed,
            score: if passed { 90.0 } else { 40.0 },
            attempt_number: n,
        }
    }

    fn cert(level: CertificationLevel, expires_in_days: i64) -> UserCertificate {
        UserCertificate {
            user_id: 1,
            certificate_slug: level.slug().to_string(),
            earned_at: now() - Duration::days(30),
            expires_at: now() + Duration::days(expires_in_days),
        }
    }

    fn decide_for(
        level: CertificationLevel,
        certificates: &[UserCertificate],
        attempts: &[QuizAttempt],
        purchased_blocks: u32,
    ) -> Eligibility {
        can_start_quiz(
            &QuizPolicy::default(),
            EligibilityInput {
                level,
                certificates,
                attempts,
                purchased_blocks,
                now: now(),
            },
        )
    }

    fn denial(e: &Eligibility) -> &Denial {
        match &e.decision {
            Decision::Denied(d) => d,
            Decision::Admitted(a) => panic!("expected denial, got {:?}", a),
        }
    }

    fn admission(e: &Eligibility) -> &Admission {
        match &e.decision {
            Decision::Admitted(a) => a,
            Decision::Denied(d) => panic!("expected admission, got {:?}", d),
        }
    }

    #[test]
    fn test_consecutive_failures_stops_at_pass() {
        use CertificationLevel::Beginner;
        let attempts = vec![
            attempt(Beginner, 1, 40, false),
            attempt(Beginner, 2, 30, true),
            attempt(Beginner, 3, 20, false),
            attempt(Beginner, 4, 10, false),
        ];
        assert_eq!(consecutive_failures(&attempts, Beginner), 2);
        assert_eq!(consecutive_failures(&attempts, CertificationLevel::Master), 0);
    }

    #[test]
    fn test_consecutive_failures_ignores_input_order() {
        use CertificationLevel::Beginner;
        let attempts = vec![
            attempt(Beginner, 3, 1, false),
            attempt(Beginner, 1, 5, true),
            attempt(Beginner, 2, 3, false),
        ];
        assert_eq!(consecutive_failures(&attempts, Beginner), 2);
    }

    #[test]
    fn test_block_boundaries() {
        use CertificationLevel::Beginner;
        for made in 0..3 {
            let attempts: Vec<_> = (1..=made).map(|n| attempt(Beginner, n, 1, false)).collect();
            let e = decide_for(Beginner, &[], &attempts, 0);
            let a = admission(&e);
            assert_eq!(a.attempts_used_in_current_block, made as u32);
            assert_eq!(a.total_allowed_in_block, 3);
            assert_eq!(a.attempt_type, AttemptType::Free);
        }
    }

    #[test]
    fn test_purchased_block_admits_as_purchased() {
        use CertificationLevel::Beginner;
        let attempts: Vec<_> = (1..=4).map(|n| attempt(Beginner, n, 1, n % 2 == 0)).collect();
        let e = decide_for(Beginner, &[], &attempts, 1);
        let a = admission(&e);
        assert_eq!(a.attempts_used_in_current_block, 1);
        assert_eq!(a.attempt_type, AttemptType::Purchased);
    }

    #[test]
    fn test_exhausted_block_reports_cooldown_and_purchases() {
        use CertificationLevel::Beginner;
        let attempts = vec![
            attempt(Beginner, 1, 5, true),
            attempt(Beginner, 2, 3, false),
            attempt(Beginner, 3, 2, true),
        ];
        let e = decide_for(Beginner, &[], &attempts, 0);
        let d = denial(&e);
        assert_eq!(d.reason, DenialReason::CooldownActive);
        assert!(d.needs_payment);
        assert_eq!(d.purchase_count, Some(0));
        assert_eq!(d.cooldown_until, Some(now() - Duration::days(2) + Duration::days(9)));
    }

    #[test]
    fn test_require_payment_after_cooldown() {
        use CertificationLevel::Beginner;
        let attempts = vec![
            attempt(Beginner, 1, 14, true),
            attempt(Beginner, 2, 12, false),
            attempt(Beginner, 3, 10, true),
        ];
        let policy = QuizPolicy {
            cooldown_expiry: CooldownExpiry::RequirePayment,
            ..QuizPolicy::default()
        };
        let e = can_start_quiz(
            &policy,
            EligibilityInput {
                level: Beginner,
                certificates: &[],
                attempts: &attempts,
                purchased_blocks: 0,
                now: now(),
            },
        );
        let d = denial(&e);
        assert!(d.needs_payment);
        assert_eq!(d.cooldown_until, None);
    }

    #[test]
    fn test_granted_attempt_does_not_eat_purchased_block() {
        use CertificationLevel::Beginner;
        // Three free attempts, then one granted after the cooldown.
        let attempts = vec![
            attempt(Beginner, 1, 13, false),
            attempt(Beginner, 2, 13, false),
            attempt(Beginner, 3, 12, false),
            attempt(Beginner, 4, 2, false),
        ];
        assert_eq!(block_attempts(&QuizPolicy::default(), &attempts, Beginner), 3);

        let e = decide_for(Beginner, &[], &attempts, 1);
        let a = admission(&e);
        assert_eq!(a.attempts_used_in_current_block, 0);
        assert_eq!(a.attempt_type, AttemptType::Purchased);
    }

    #[test]
    fn test_granted_attempt_restarts_cooldown() {
        use CertificationLevel::Beginner;
        let attempts = vec![
            attempt(Beginner, 1, 30, false),
            attempt(Beginner, 2, 30, false),
            attempt(Beginner, 3, 30, false),
            attempt(Beginner, 4, 20, false),
            attempt(Beginner, 5, 3, false),
        ];
        assert_eq!(block_attempts(&QuizPolicy::default(), &attempts, Beginner), 3);

        let e = decide_for(Beginner, &[], &attempts, 0);
        let d = denial(&e);
        assert_eq!(d.reason, DenialReason::CooldownActive);
        assert_eq!(d.cooldown_until, Some(now() - Duration::days(3) + Duration::days(9)));
    }

    #[test]
    fn test_every_attempt_charged_when_payment_required() {
        use CertificationLevel::Beginner;
        let policy = QuizPolicy {
            cooldown_expiry: CooldownExpiry::RequirePayment,
            ..QuizPolicy::default()
        };
        let attempts = vec![
            attempt(Beginner, 1, 30, false),
            attempt(Beginner, 2, 30, false),
            attempt(Beginner, 3, 30, false),
            attempt(Beginner, 4, 2, false),
        ];
        assert_eq!(block_attempts(&policy, &attempts, Beginner), 4);
    }

    #[test]
    fn test_prerequisite_gate_runs_first() {
        // Even a user locked out by blocks sees the prerequisite reason first.
        use CertificationLevel::{Intermediate, Master};
        let attempts: Vec<_> = (1..=3).map(|n| attempt(Master, n, 1, false)).collect();
        let e = decide_for(Master, &[cert(CertificationLevel::Beginner, 10)], &attempts, 0);
        let d = denial(&e);
        assert_eq!(d.reason, DenialReason::PrerequisiteMissing);
        assert_eq!(d.prerequisite_missing, Some(Intermediate));
        assert_eq!(e.consecutive_failures, 3);
        assert!(e.holds_valid_certificate);
    }

    #[test]
    fn test_cascade_without_prerequisites() {
        use CertificationLevel::{Beginner, Intermediate};
        let policy = QuizPolicy {
            require_prerequisites: false,
            ..QuizPolicy::default()
        };
        let attempts: Vec<_> = (1..=3).map(|n| attempt(Intermediate, n, 1, false)).collect();
        let e = can_start_quiz(
            &policy,
            EligibilityInput {
                level: Intermediate,
                certificates: &[],
                attempts: &attempts,
                purchased_blocks: 5,
                now: now(),
            },
        );
        let d = denial(&e);
        assert_eq!(d.reason, DenialReason::CascadeRecommendation);
        assert_eq!(d.recommended_level, Some(Beginner));
    }

    #[test]
    fn test_cascade_skipped_when_lower_level_held() {
        use CertificationLevel::{Beginner, Intermediate};
        let attempts: Vec<_> = (1..=3).map(|n| attempt(Intermediate, n, 1, false)).collect();
        let e = decide_for(Intermediate, &[cert(Beginner, 30)], &attempts, 1);
        let a = admission(&e);
        assert_eq!(a.attempt_type, AttemptType::Purchased);
        assert_eq!(e.consecutive_failures, 3);
    }

    #[test]
    fn test_beginner_cascade_has_no_lower_level() {
        use CertificationLevel::Beginner;
        let attempts: Vec<_> = (1..=3).map(|n| attempt(Beginner, n, 1, false)).collect();
        assert_eq!(recommend_level(Beginner, &[], now()), Beginner);
        let e = decide_for(Beginner, &[], &attempts, 1);
        assert!(e.is_admitted());
    }

    #[test]
    fn test_expired_certificate_is_not_held() {
        use CertificationLevel::Beginner;
        let expired = cert(Beginner, -1);
        assert!(valid_certificate(&[expired.clone()], Beginner, now()).is_none());
        let e = decide_for(Beginner, &[expired], &[], 0);
        assert!(e.is_admitted());
        assert!(!e.holds_valid_certificate);
    }

    #[test]
    fn test_meta_certificates_do_not_count_as_levels() {
        let meta = UserCertificate {
            certificate_slug: "promptosaur".to_string(),
            ..cert(CertificationLevel::Intermediate, 30)
        };
        let e = decide_for(CertificationLevel::Master, &[meta], &[], 0);
        assert_eq!(denial(&e).reason, DenialReason::PrerequisiteMissing);
        assert!(!e.holds_valid_certificate);
    }

    #[test]
    fn test_denial_serializes_with_status_tag() {
        let e = decide_for(CertificationLevel::Intermediate, &[], &[], 0);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["status"], "denied");
        assert_eq!(json["reason"], "prerequisite_missing");
        assert_eq!(json["prerequisite_missing"], "beginner");
        assert_eq!(json["consecutive_failures"], 0);
        assert!(json.get("cooldown_until").is_none());
    }
}
