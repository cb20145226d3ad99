use std::sync::Arc;

use pathway_core::model::{
    CODE_SUFFIX_BYTES, Certificate, CertificateCode, CertificateId, CodePrefix, NewCertificate,
    PathId, UserId,
};
use rand::Rng;
use serde::Serialize;
use storage::repository::{
    CertificateRepository, CurriculumRepository, ProgressRepository, StorageError,
};

use crate::Clock;
use crate::error::{CertificateServiceError, ProgressServiceError};

/// Attempts at a fresh code before a collision is reported as a store failure.
const MAX_CODE_ATTEMPTS: u32 = 3;

/// Issuance settings.
#[derive(Debug, Clone, Default)]
pub struct IssuerConfig {
    pub code_prefix: CodePrefix,
}

/// Decision reached by one issuance attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum IssueOutcome {
    Issued { certificate: Certificate },
    AlreadyIssued,
    EmptyPath,
    Incomplete { completed: u64, total: u64 },
    PendingProjects { pending: u64 },
}

impl IssueOutcome {
    #[must_use]
    pub fn issued(&self) -> bool {
        matches!(self, IssueOutcome::Issued { .. })
    }

    /// Whether every lesson of the path was completed when the gates were read.
    #[must_use]
    pub fn is_path_complete(&self) -> bool {
        matches!(
            self,
            IssueOutcome::Issued { .. }
                | IssueOutcome::AlreadyIssued
                | IssueOutcome::PendingProjects { .. }
        )
    }

    #[must_use]
    pub fn into_certificate(self) -> Option<Certificate> {
        match self {
            IssueOutcome::Issued { certificate } => Some(certificate),
            _ => None,
        }
    }
}

fn fresh_suffix() -> [u8; CODE_SUFFIX_BYTES] {
    rand::rng().random()
}

/// Evaluates the issuance gates for a (user, path) and inserts at most one
/// certificate.
///
/// Every call re-reads every gate, so it can be triggered from lesson
/// completion and from project approval alike.
#[derive(Clone)]
pub struct CertificateIssuer {
    clock: Clock,
    config: IssuerConfig,
    curriculum: Arc<dyn CurriculumRepository>,
    progress: Arc<dyn ProgressRepository>,
    certificates: Arc<dyn CertificateRepository>,
}

impl CertificateIssuer {
    #[must_use]
    pub fn new(
        clock: Clock,
        config: IssuerConfig,
        curriculum: Arc<dyn CurriculumRepository>,
        progress: Arc<dyn ProgressRepository>,
        certificates: Arc<dyn CertificateRepository>,
    ) -> Self {
        Self {
            clock,
            config,
            curriculum,
            progress,
            certificates,
        }
    }

    /// Issue a certificate for `user_id` on `path_id` if every gate passes.
    ///
    /// Gates, in order: the path has lessons, all of them are completed, no
    /// project lesson is awaiting approval, and no certificate exists yet.
    /// Concurrent calls for the same pair yield a single certificate; the
    /// losers report `AlreadyIssued`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidInput` for an unset id.
    /// Returns `ProgressServiceError::Storage` if the store fails, including
    /// when every generated code collides with an existing one.
    pub async fn try_issue_certificate(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<IssueOutcome, ProgressServiceError> {
        if user_id.is_unset() || path_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput(
                "user id and path id are required",
            ));
        }

        let total = self.curriculum.count_lessons(path_id).await?;
        if total == 0 {
            tracing::debug!(%user_id, %path_id, "path has no lessons");
            return Ok(IssueOutcome::EmptyPath);
        }

        let completed = self.progress.count_completed(user_id, path_id).await?;
        if completed < total {
            tracing::debug!(%user_id, %path_id, completed, total, "path not complete");
            return Ok(IssueOutcome::Incomplete { completed, total });
        }

        let pending = self
            .progress
            .count_unapproved_projects(user_id, path_id)
            .await?;
        if pending > 0 {
            tracing::debug!(%user_id, %path_id, pending, "projects awaiting approval");
            return Ok(IssueOutcome::PendingProjects { pending });
        }

        if self
            .certificates
            .find_certificate(user_id, path_id)
            .await?
            .is_some()
        {
            return Ok(IssueOutcome::AlreadyIssued);
        }

        self.insert_with_fresh_code(user_id, path_id).await
    }

    async fn insert_with_fresh_code(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<IssueOutcome, ProgressServiceError> {
        let mut attempt = 1;
        loop {
            let candidate = NewCertificate {
                user_id,
                path_id,
                code: CertificateCode::compose(&self.config.code_prefix, path_id, fresh_suffix()),
                issued_at: self.clock.now(),
            };

            match self.certificates.insert_certificate_if_absent(candidate).await {
                Ok(Some(certificate)) => {
                    tracing::info!(
                        %user_id,
                        %path_id,
                        code = %certificate.code,
                        "certificate issued"
                    );
                    return Ok(IssueOutcome::Issued { certificate });
                }
                Ok(None) => return Ok(IssueOutcome::AlreadyIssued),
                Err(StorageError::Conflict) if attempt < MAX_CODE_ATTEMPTS => {
                    tracing::warn!(%user_id, %path_id, attempt, "certificate code collision, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Read and revoke access to issued certificates.
#[derive(Clone)]
pub struct CertificateRegistry {
    certificates: Arc<dyn CertificateRepository>,
}

impl CertificateRegistry {
    #[must_use]
    pub fn new(certificates: Arc<dyn CertificateRepository>) -> Self {
        Self { certificates }
    }

    /// # Errors
    ///
    /// Returns `CertificateServiceError::InvalidInput` for an unset user id,
    /// or `Storage` if repository access fails.
    pub async fn user_certificates(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Certificate>, CertificateServiceError> {
        if user_id.is_unset() {
            return Err(CertificateServiceError::InvalidInput("user id is required"));
        }
        Ok(self.certificates.list_user_certificates(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `CertificateServiceError::Storage` if repository access fails.
    pub async fn all_certificates(
        &self,
        limit: u32,
    ) -> Result<Vec<Certificate>, CertificateServiceError> {
        Ok(self.certificates.list_certificates(limit).await?)
    }

    /// Look up a certificate by the code printed on it.
    ///
    /// Codes are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `CertificateServiceError::NotFound` for a malformed or unknown
    /// code, or `Storage` if repository access fails.
    pub async fn verify(&self, raw_code: &str) -> Result<Certificate, CertificateServiceError> {
        let Ok(code) = CertificateCode::parse(raw_code) else {
            return Err(CertificateServiceError::NotFound);
        };
        self.certificates
            .get_certificate_by_code(&code)
            .await?
            .ok_or(CertificateServiceError::NotFound)
    }

    /// Delete a certificate. A later completion event may issue a new one.
    ///
    /// # Errors
    ///
    /// Returns `CertificateServiceError::NotFound` if no such certificate
    /// exists, or `Storage` if repository access fails.
    pub async fn revoke(&self, id: CertificateId) -> Result<(), CertificateServiceError> {
        if id.is_unset() {
            return Err(CertificateServiceError::InvalidInput("certificate id is required"));
        }
        if !self.certificates.delete_certificate(id).await? {
            return Err(CertificateServiceError::NotFound);
        }
        tracing::info!(certificate_id = %id, "certificate revoked");
        Ok(())
    }
}
