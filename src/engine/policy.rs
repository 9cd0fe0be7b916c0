// src/engine/policy.rs

use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ATTEMPTS_PER_BLOCK: u32 = 3;
pub const DEFAULT_FREE_BLOCKS: u32 = 1;
pub const DEFAULT_COOLDOWN_DAYS: i64 = 9;
pub const DEFAULT_CERTIFICATE_VALIDITY_MONTHS: u32 = 6;
pub const DEFAULT_CASCADE_THRESHOLD: u32 = 3;
pub const DEFAULT_SAMPLE_SIZE: usize = 25;
pub const DEFAULT_PASSING_SCORE_PERCENTAGE: f64 = 75.0;
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 3600;

/// What happens once the cooldown after an exhausted block has run out
/// and no further block was purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownExpiry {
    /// One more free attempt; the next one starts a new cooldown.
    GrantAttempt,
    /// Only a purchase unlocks further attempts.
    RequirePayment,
}

impl FromStr for CooldownExpiry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grant_attempt" => Ok(Self::GrantAttempt),
            "require_payment" => Ok(Self::RequirePayment),
            other => Err(format!("unknown cooldown expiry '{}'", other)),
        }
    }
}

/// Tunable rules for quiz admission, selection and grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizPolicy {
    pub attempts_per_block: u32,
    pub free_blocks: u32,
    pub cooldown_days: i64,
    pub certificate_validity_months: u32,
    pub cascade_threshold: u32,
    pub sample_size: usize,
    pub passing_score_percentage: f64,
    pub session_ttl_seconds: u64,
    pub require_prerequisites: bool,
    pub cooldown_expiry: CooldownExpiry,
}

impl Default for QuizPolicy {
    fn default() -> Self {
        Self {
            attempts_per_block: DEFAULT_ATTEMPTS_PER_BLOCK,
            free_blocks: DEFAULT_FREE_BLOCKS,
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
            certificate_validity_months: DEFAULT_CERTIFICATE_VALIDITY_MONTHS,
            cascade_threshold: DEFAULT_CASCADE_THRESHOLD,
            sample_size: DEFAULT_SAMPLE_SIZE,
            passing_score_percentage: DEFAULT_PASSING_SCORE_PERCENTAGE,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            require_prerequisites: true,
            cooldown_expiry: CooldownExpiry::GrantAttempt,
        }
    }
}

impl QuizPolicy {
    pub fn cooldown(&self) -> Duration {
        Duration::days(self.cooldown_days)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_seconds as i64)
    }

    /// Expiry of a certificate earned at `earned_at`.
    /// Month arithmetic clamps to the last day (Aug 31 + 6 months = Feb 28/29).
    pub fn certificate_expiry(&self, earned_at: DateTime<Utc>) -> DateTime<Utc> {
        earned_at
            .checked_add_months(Months::new(self.certificate_validity_months))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
