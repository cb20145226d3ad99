use std::sync::Arc;

use pathway_core::model::{
    Certificate, LessonId, ProgressChange, ProgressRecord, Submission, UserId,
};
use serde::Serialize;
use storage::repository::{CurriculumRepository, ProgressRepository};

use crate::Clock;
use crate::certificate_service::CertificateIssuer;
use crate::error::ProgressServiceError;

/// Outcome of a lesson completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub progress: ProgressRecord,
    pub is_path_complete: bool,
    /// Set only when this completion issued the certificate.
    pub certificate: Option<Certificate>,
}

/// Records lesson completions and project submissions.
#[derive(Clone)]
pub struct SubmissionRecorder {
    clock: Clock,
    curriculum: Arc<dyn CurriculumRepository>,
    progress: Arc<dyn ProgressRepository>,
    issuer: Arc<CertificateIssuer>,
}

impl SubmissionRecorder {
    #[must_use]
    pub fn new(
        clock: Clock,
        curriculum: Arc<dyn CurriculumRepository>,
        progress: Arc<dyn ProgressRepository>,
        issuer: Arc<CertificateIssuer>,
    ) -> Self {
        Self {
            clock,
            curriculum,
            progress,
            issuer,
        }
    }

    /// Mark `lesson_id` completed for `user_id`, attaching any submission.
    ///
    /// Completing again is allowed; blank artifacts keep the stored ones and
    /// an approved project stays approved. The certificate gates for the
    /// lesson's path are re-evaluated afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidInput` for unset ids,
    /// `LessonNotFound` if the lesson is missing, or `Storage` if repository
    /// access fails.
    pub async fn complete_lesson(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        submission_file_url: Option<String>,
        submission_drive_link: Option<String>,
    ) -> Result<CompletionResult, ProgressServiceError> {
        if user_id.is_unset() || lesson_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput(
                "user id and lesson id are required",
            ));
        }
        let submission = Submission::new(submission_file_url, submission_drive_link);

        let lesson = self
            .curriculum
            .get_lesson(lesson_id)
            .await?
            .ok_or(ProgressServiceError::LessonNotFound)?;

        let now = self.clock.now();
        let record = self
            .progress
            .find_or_create_progress(user_id, lesson_id, now)
            .await?;
        let progress = self
            .progress
            .update_progress(
                record.id,
                &ProgressChange::completion(lesson.kind, submission),
                now,
            )
            .await?;
        tracing::debug!(
            %user_id,
            %lesson_id,
            status = %progress.approval_status,
            "lesson completed"
        );

        let outcome = self
            .issuer
            .try_issue_certificate(user_id, lesson.path_id)
            .await?;

        Ok(CompletionResult {
            progress,
            is_path_complete: outcome.is_path_complete(),
            certificate: outcome.into_certificate(),
        })
    }
}
