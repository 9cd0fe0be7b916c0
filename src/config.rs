// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::engine::policy::QuizPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub policy: QuizPolicy,
}

/// Parses `raw`, falling back to `default` when absent or malformed.
fn parse_or<T: FromStr>(key: &str, raw: Option<&str>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(key, env::var(key).ok().as_deref(), default)
}

fn policy_from_env() -> QuizPolicy {
    let defaults = QuizPolicy::default();

    QuizPolicy {
        attempts_per_block: env_or("QUIZ_ATTEMPTS_PER_BLOCK", defaults.attempts_per_block).max(1),
        free_blocks: env_or("QUIZ_FREE_BLOCKS", defaults.free_blocks),
        cooldown_days: env_or("QUIZ_COOLDOWN_DAYS", defaults.cooldown_days),
        certificate_validity_months: env_or(
            "QUIZ_CERTIFICATE_VALIDITY_MONTHS",
            defaults.certificate_validity_months,
        ),
        cascade_threshold: env_or("QUIZ_CASCADE_THRESHOLD", defaults.cascade_threshold),
        sample_size: env_or("QUIZ_SAMPLE_SIZE", defaults.sample_size),
        passing_score_percentage: env_or(
            "QUIZ_PASSING_SCORE_PERCENTAGE",
            defaults.passing_score_percentage,
        ),
        session_ttl_seconds: env_or("QUIZ_SESSION_TTL_SECONDS", defaults.session_ttl_seconds),
        require_prerequisites: env_or("QUIZ_REQUIRE_PREREQUISITES", defaults.require_prerequisites),
        cooldown_expiry: env_or("QUIZ_COOLDOWN_EXPIRY", defaults.cooldown_expiry),
    }
}

impl Config {
    /// Install the tracing subscriber first so malformed values are logged.
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env_or("JWT_EXPIRATION", 86_400);

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            bind_addr,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            policy: policy_from_env(),
        }
    }
}
