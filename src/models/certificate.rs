// src/models/certificate.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'user_certificates' table.
/// At most one live row per (user_id, certificate_slug); re-earning replaces it.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserCertificate {
    pub user_id: i64,
    pub certificate_slug: String,
    pub earned_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserCertificate {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Certificate as shown to its owner.
#[derive(Debug, Serialize)]
pub struct CertificateView {
    pub certificate_slug: String,
    pub earned_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_valid: bool,
}

impl CertificateView {
    pub fn new(cert: UserCertificate, now: DateTime<Utc>) -> Self {
        let is_valid = cert.is_valid_at(now);
        Self {
            certificate_slug: cert.certificate_slug,
            earned_at: cert.earned_at,
            expires_at: cert.expires_at,
            is_valid,
        }
    }
}
