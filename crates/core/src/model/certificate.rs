use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CertificateId, PathId, UserId};

/// Number of random bytes in a certificate code suffix (two hex chars each).
pub const CODE_SUFFIX_BYTES: usize = 4;

const DEFAULT_PREFIX: &str = "AIOT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CertificateError {
    #[error("certificate prefix must be 1-16 ASCII letters or digits: {0:?}")]
    InvalidPrefix(String),

    #[error("malformed certificate code: {0:?}")]
    MalformedCode(String),
}

//
// ─── CODE PREFIX ───────────────────────────────────────────────────────────────
//

/// Leading segment of every certificate code, e.g. `AIOT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePrefix(String);

impl CodePrefix {
    /// # Errors
    ///
    /// Returns `CertificateError::InvalidPrefix` unless the prefix is 1-16
    /// ASCII alphanumerics.
    pub fn new(raw: impl Into<String>) -> Result<Self, CertificateError> {
        let raw = raw.into();
        let valid = (1..=16).contains(&raw.len()) && raw.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(CertificateError::InvalidPrefix(raw));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CodePrefix {
    fn default() -> Self {
        Self(DEFAULT_PREFIX.to_owned())
    }
}

//
// ─── CERTIFICATE CODE ──────────────────────────────────────────────────────────
//

/// Human-readable certificate identifier: `<PREFIX>-<pathId>-<8 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateCode(String);

impl CertificateCode {
    #[must_use]
    pub fn compose(
        prefix: &CodePrefix,
        path_id: PathId,
        suffix: [u8; CODE_SUFFIX_BYTES],
    ) -> Self {
        Self(format!(
            "{}-{}-{}",
            prefix.as_str(),
            path_id,
            hex::encode_upper(suffix)
        ))
    }

    /// Parse a code presented for verification.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::MalformedCode` if the string does not have
    /// the `<PREFIX>-<pathId>-<HEX8>` shape.
    pub fn parse(raw: &str) -> Result<Self, CertificateError> {
        let malformed = || CertificateError::MalformedCode(raw.to_owned());
        let trimmed = raw.trim();

        let mut parts = trimmed.rsplitn(3, '-');
        let suffix = parts.next().ok_or_else(malformed)?;
        let path = parts.next().ok_or_else(malformed)?;
        let prefix = parts.next().ok_or_else(malformed)?;

        CodePrefix::new(prefix).map_err(|_| malformed())?;
        path.parse::<PathId>().map_err(|_| malformed())?;
        let bytes = hex::decode(suffix).map_err(|_| malformed())?;
        if bytes.len() != CODE_SUFFIX_BYTES {
            return Err(malformed());
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Rehydrate a code read back from storage without re-validating it.
    #[must_use]
    pub fn from_persisted(raw: String) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── CERTIFICATE ───────────────────────────────────────────────────────────────
//

/// Certificate about to be inserted; the store assigns the row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub user_id: UserId,
    pub path_id: PathId,
    pub code: CertificateCode,
    pub issued_at: DateTime<Utc>,
}

impl NewCertificate {
    #[must_use]
    pub fn assign_id(self, id: CertificateId) -> Certificate {
        Certificate {
            id,
            user_id: self.user_id,
            path_id: self.path_id,
            code: self.code,
            issued_at: self.issued_at,
        }
    }
}

/// Proof of completion, at most one per (user, path). Never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: CertificateId,
    pub user_id: UserId,
    #[serde(rename = "learningPathId")]
    pub path_id: PathId,
    #[serde(rename = "certificateId")]
    pub code: CertificateCode,
    pub issued_at: DateTime<Utc>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
