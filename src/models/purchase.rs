// src/models/purchase.rs

use serde::{Deserialize, Serialize};

use crate::models::level::CertificationLevel;

/// DTO for granting one extra attempt block after a confirmed payment.
#[derive(Debug, Deserialize)]
pub struct GrantAttemptBlockRequest {
    pub level: CertificationLevel,
}

#[derive(Debug, Serialize)]
pub struct AttemptBlockBalance {
    pub user_id: i64,
    pub level: CertificationLevel,
    pub purchased_blocks: u32,
}
