use std::sync::Arc;

use pathway_core::model::{ProgressChange, ProgressId, ProgressRecord};
use serde::Serialize;
use storage::repository::{CurriculumRepository, ProgressRepository, StorageError, SubmissionRow};

use crate::Clock;
use crate::certificate_service::{CertificateIssuer, IssueOutcome};
use crate::error::ProgressServiceError;

/// Outcome of an approval: the stored record and what the issuer decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub progress: ProgressRecord,
    pub issue: IssueOutcome,
}

/// Admin-side approve/reject of project submissions.
///
/// Either action is accepted from any prior status.
#[derive(Clone)]
pub struct SubmissionReview {
    clock: Clock,
    curriculum: Arc<dyn CurriculumRepository>,
    progress: Arc<dyn ProgressRepository>,
    issuer: Arc<CertificateIssuer>,
}

impl SubmissionReview {
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

    async fn load(&self, progress_id: ProgressId) -> Result<ProgressRecord, ProgressServiceError> {
        if progress_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput("progress id is required"));
        }
        self.progress
            .get_progress(progress_id)
            .await?
            .ok_or(ProgressServiceError::ProgressNotFound)
    }

    async fn record_decision(
        &self,
        progress_id: ProgressId,
        change: ProgressChange,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        match self
            .progress
            .update_progress(progress_id, &change, self.clock.now())
            .await
        {
            Err(StorageError::NotFound) => Err(ProgressServiceError::ProgressNotFound),
            other => Ok(other?),
        }
    }

    /// Approve a submission and re-run certificate issuance for its path.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::ProgressNotFound` if the record is
    /// missing, `LessonNotFound` if its lesson is gone, or `Storage` if
    /// repository access fails.
    pub async fn approve_submission(
        &self,
        progress_id: ProgressId,
    ) -> Result<ReviewResult, ProgressServiceError> {
        let record = self.load(progress_id).await?;
        let lesson = self
            .curriculum
            .get_lesson(record.lesson_id)
            .await?
            .ok_or(ProgressServiceError::LessonNotFound)?;

        let progress = self
            .record_decision(progress_id, ProgressChange::Approved)
            .await?;
        tracing::info!(%progress_id, user_id = %progress.user_id, "submission approved");

        let issue = self
            .issuer
            .try_issue_certificate(progress.user_id, lesson.path_id)
            .await?;
        Ok(ReviewResult { progress, issue })
    }

    /// Reject a submission with a note for the learner.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::ProgressNotFound` if the record is
    /// missing, or `Storage` if repository access fails.
    pub async fn reject_submission(
        &self,
        progress_id: ProgressId,
        admin_note: String,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        if progress_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput("progress id is required"));
        }
        let progress = self
            .record_decision(progress_id, ProgressChange::Rejected { admin_note })
            .await?;
        tracing::info!(%progress_id, user_id = %progress.user_id, "submission rejected");
        Ok(progress)
    }

    /// Project submissions for the review queue, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn list_submissions(
        &self,
        limit: u32,
    ) -> Result<Vec<SubmissionRow>, ProgressServiceError> {
        Ok(self.progress.list_project_submissions(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pathway_core::model::{
        ApprovalStatus, ChapterDraft, LessonDraft, LessonKind, PathDraft, Submission, UserId,
    };
    use pathway_core::time::fixed_now;
    use storage::repository::Storage;

    use crate::certificate_service::IssuerConfig;

    fn review(storage: &Storage) -> SubmissionReview {
        let clock = Clock::fixed(fixed_now());
        let issuer = Arc::new(CertificateIssuer::new(
            clock,
            IssuerConfig::default(),
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.certificates),
        ));
        SubmissionReview::new(
            clock,
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
            issuer,
        )
    }

    async fn submitted_project(storage: &Storage, user: UserId) -> ProgressRecord {
        let path = storage
            .curriculum
            .insert_path(
                PathDraft {
                    title: "Review path".into(),
                    description: String::new(),
                }
                .validate(fixed_now())
                .unwrap(),
            )
            .await
            .unwrap();
        let chapter = storage
            .curriculum
            .insert_chapter(
                ChapterDraft {
                    path_id: path.id,
                    title: "Final".into(),
                    order: 0,
                }
                .validate(fixed_now())
                .unwrap(),
            )
            .await
            .unwrap();
        let lesson = storage
            .curriculum
            .insert_lesson(
                LessonDraft {
                    path_id: path.id,
                    chapter_id: chapter.id,
                    title: "Gateway".into(),
                    kind: LessonKind::Project,
                    order: 0,
                }
                .validate(&chapter, fixed_now())
                .unwrap(),
            )
            .await
            .unwrap();

        let record = storage
            .progress
            .find_or_create_progress(user, lesson.id, fixed_now())
            .await
            .unwrap();
        let submission = Submission::new(None, Some("https://drive.example/gw".into()));
        storage
            .progress
            .update_progress(
                record.id,
                &ProgressChange::completion(LessonKind::Project, submission),
                fixed_now(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reject_then_approve_issues_certificate() {
        let storage = Storage::in_memory();
        let user = UserId::new(6);
        let record = submitted_project(&storage, user).await;
        let review = review(&storage);

        let rejected = review
            .reject_submission(record.id, "needs a schematic".into())
            .await
            .unwrap();
        assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);
        assert_eq!(rejected.admin_note, "needs a schematic");

        let approved = review.approve_submission(record.id).await.unwrap();
        assert_eq!(approved.progress.approval_status, ApprovalStatus::Approved);
        assert!(approved.progress.admin_note.is_empty());
        assert!(approved.issue.issued());

        let again = review.approve_submission(record.id).await.unwrap();
        assert_eq!(again.issue, IssueOutcome::AlreadyIssued);
    }

    #[tokio::test]
    async fn queue_lists_project_records() {
        let storage = Storage::in_memory();
        let record = submitted_project(&storage, UserId::new(1)).await;

        let queue = review(&storage).list_submissions(50).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].progress.id, record.id);
        assert_eq!(queue[0].lesson_title, "Gateway");
        assert_eq!(queue[0].path_title, "Review path");
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let storage = Storage::in_memory();
        let err = review(&storage)
            .reject_submission(ProgressId::new(12), String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::ProgressNotFound));
    }
}
