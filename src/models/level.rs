// src/models/level.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Certification levels, strictly ordered from `Beginner` to `Master`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificationLevel {
    Beginner,
    Intermediate,
    Master,
}

impl CertificationLevel {
    pub const ALL: [CertificationLevel; 3] = [
        CertificationLevel::Beginner,
        CertificationLevel::Intermediate,
        CertificationLevel::Master,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CertificationLevel::Beginner => "beginner",
            CertificationLevel::Intermediate => "intermediate",
            CertificationLevel::Master => "master",
        }
    }

    /// Public certificate identifier for this level.
    pub fn slug(self) -> &'static str {
        match self {
            CertificationLevel::Beginner => "prompt-apprentice",
            CertificationLevel::Intermediate => "prompt-practitioner",
            CertificationLevel::Master => "prompt-master",
        }
    }

    /// Bonus credential layered on top of the level certificate.
    /// Awarded on a pass, revoked when the level is failed again.
    pub fn meta_slug(self) -> Option<&'static str> {
        match self {
            CertificationLevel::Beginner => None,
            CertificationLevel::Intermediate => Some("promptosaur"),
            CertificationLevel::Master => Some("promptopotamus"),
        }
    }

    /// The level whose certificate must be held before attempting this one.
    pub fn prerequisite(self) -> Option<CertificationLevel> {
        self.previous()
    }

    pub fn previous(self) -> Option<CertificationLevel> {
        match self {
            CertificationLevel::Beginner => None,
            CertificationLevel::Intermediate => Some(CertificationLevel::Beginner),
            CertificationLevel::Master => Some(CertificationLevel::Intermediate),
        }
    }

    pub fn next(self) -> Option<CertificationLevel> {
        match self {
            CertificationLevel::Beginner => Some(CertificationLevel::Intermediate),
            CertificationLevel::Intermediate => Some(CertificationLevel::Master),
            CertificationLevel::Master => None,
        }
    }
}

impl fmt::Display for CertificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown certification level '{0}'")]
pub struct UnknownLevel(pub String);

impl FromStr for CertificationLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(CertificationLevel::Beginner),
            "intermediate" => Ok(CertificationLevel::Intermediate),
            "master" => Ok(CertificationLevel::Master),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}
