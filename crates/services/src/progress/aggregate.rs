use std::sync::Arc;

use pathway_core::model::{
    LessonId, LessonStatus, PathCompletion, PathId, ProgressRecord, UserId, UserSummary,
};
use storage::repository::{CurriculumRepository, ProgressRepository};

use crate::error::ProgressServiceError;

/// Read-only views over a learner's progress.
#[derive(Clone)]
pub struct ProgressAggregator {
    curriculum: Arc<dyn CurriculumRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new(
        curriculum: Arc<dyn CurriculumRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            curriculum,
            progress,
        }
    }

    /// Completed lessons over total lessons of a path, floored to a percentage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidInput` for unset ids, or
    /// `Storage` if repository access fails.
    pub async fn compute_path_completion(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<PathCompletion, ProgressServiceError> {
        if user_id.is_unset() || path_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput(
                "user id and path id are required",
            ));
        }
        let total = self.curriculum.count_lessons(path_id).await?;
        let completed = self.progress.count_completed(user_id, path_id).await?;
        Ok(PathCompletion::new(completed, total))
    }

    /// Per-lesson state for every record the user holds in a path.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidInput` for unset ids, or
    /// `Storage` if repository access fails.
    pub async fn lesson_statuses(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<Vec<LessonStatus>, ProgressServiceError> {
        if user_id.is_unset() || path_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput(
                "user id and path id are required",
            ));
        }
        let records = self.progress.list_path_progress(user_id, path_id).await?;
        Ok(records.iter().map(LessonStatus::from).collect())
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::ProgressNotFound` when the user has no
    /// record for the lesson, or `Storage` if repository access fails.
    pub async fn lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        if user_id.is_unset() || lesson_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput(
                "user id and lesson id are required",
            ));
        }
        self.progress
            .find_progress(user_id, lesson_id)
            .await?
            .ok_or(ProgressServiceError::ProgressNotFound)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::InvalidInput` for an unset id, or
    /// `Storage` if repository access fails.
    pub async fn user_summary(&self, user_id: UserId) -> Result<UserSummary, ProgressServiceError> {
        if user_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput("user id is required"));
        }
        let completed = self.progress.count_completed_for_user(user_id).await?;
        Ok(UserSummary::from_completed(completed))
    }
}
