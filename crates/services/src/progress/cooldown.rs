use std::sync::Arc;

use chrono::{DateTime, Utc};
use pathway_core::model::{
    CooldownStatus, LessonId, ProgressChange, ProgressRecord, UserId, quiz_cooldown,
};
use serde::Serialize;
use storage::repository::{CurriculumRepository, ProgressRepository};

use crate::error::ProgressServiceError;

/// A recorded quiz failure and the moment a retry becomes possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub progress: ProgressRecord,
    pub cooldown_end: DateTime<Utc>,
}

/// Tracks failed quiz attempts and the retry delay that follows them.
///
/// Both operations take `now` from the caller.
#[derive(Clone)]
pub struct CooldownService {
    curriculum: Arc<dyn CurriculumRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl CooldownService {
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

    /// Record a failed attempt, creating the progress record if needed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::LessonNotFound` if the lesson is missing.
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn record_failure(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Result<FailureRecord, ProgressServiceError> {
        if user_id.is_unset() || lesson_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput(
                "user id and lesson id are required",
            ));
        }
        self.curriculum
            .get_lesson(lesson_id)
            .await?
            .ok_or(ProgressServiceError::LessonNotFound)?;

        let record = self
            .progress
            .find_or_create_progress(user_id, lesson_id, now)
            .await?;
        let progress = self
            .progress
            .update_progress(record.id, &ProgressChange::QuizFailed, now)
            .await?;

        let cooldown_end = now + quiz_cooldown();
        tracing::info!(%user_id, %lesson_id, %cooldown_end, "quiz failure recorded");
        Ok(FailureRecord {
            progress,
            cooldown_end,
        })
    }

    /// Whether `user_id` must still wait before retrying `lesson_id`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn check_cooldown(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Result<CooldownStatus, ProgressServiceError> {
        if user_id.is_unset() || lesson_id.is_unset() {
            return Err(ProgressServiceError::InvalidInput(
                "user id and lesson id are required",
            ));
        }
        Ok(self
            .progress
            .find_progress(user_id, lesson_id)
            .await?
            .map_or_else(CooldownStatus::clear, |record| record.cooldown_status(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use pathway_core::model::{ChapterDraft, LessonDraft, LessonKind, PathDraft};
    use pathway_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    async fn quiz_lesson(repo: &InMemoryRepository) -> LessonId {
        let path = repo
            .insert_path(
                PathDraft {
                    title: "Quiz path".into(),
                    description: String::new(),
                }
                .validate(fixed_now())
                .unwrap(),
            )
            .await
            .unwrap();
        let chapter = repo
            .insert_chapter(
                ChapterDraft {
                    path_id: path.id,
                    title: "One".into(),
                    order: 0,
                }
                .validate(fixed_now())
                .unwrap(),
            )
            .await
            .unwrap();
        repo.insert_lesson(
            LessonDraft {
                path_id: path.id,
                chapter_id: chapter.id,
                title: "Check".into(),
                kind: LessonKind::Quiz,
                order: 0,
            }
            .validate(&chapter, fixed_now())
            .unwrap(),
        )
        .await
        .unwrap()
        .id
    }

    fn service(repo: &InMemoryRepository) -> CooldownService {
        CooldownService::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn cooldown_lasts_three_minutes() {
        let repo = InMemoryRepository::new();
        let lesson = quiz_lesson(&repo).await;
        let service = service(&repo);
        let user = UserId::new(1);
        let t0 = fixed_now();

        let failure = service.record_failure(user, lesson, t0).await.unwrap();
        assert_eq!(failure.cooldown_end, t0 + Duration::minutes(3));
        assert!(!failure.progress.completed);

        let during = service
            .check_cooldown(user, lesson, t0 + Duration::seconds(179))
            .await
            .unwrap();
        assert!(during.on_cooldown);
        assert_eq!(during.remaining_seconds, 1);

        let after = service
            .check_cooldown(user, lesson, t0 + Duration::seconds(180))
            .await
            .unwrap();
        assert_eq!(after, CooldownStatus::clear());
    }

    #[tokio::test]
    async fn no_record_means_no_cooldown() {
        let repo = InMemoryRepository::new();
        let lesson = quiz_lesson(&repo).await;
        let status = service(&repo)
            .check_cooldown(UserId::new(3), lesson, fixed_now())
            .await
            .unwrap();
        assert_eq!(status, CooldownStatus::clear());
    }

    #[tokio::test]
    async fn repeated_failure_restarts_the_clock() {
        let repo = InMemoryRepository::new();
        let lesson = quiz_lesson(&repo).await;
        let service = service(&repo);
        let user = UserId::new(2);
        let t0 = fixed_now();

        service.record_failure(user, lesson, t0).await.unwrap();
        let later = t0 + Duration::seconds(150);
        let again = service.record_failure(user, lesson, later).await.unwrap();
        assert_eq!(again.cooldown_end, later + Duration::minutes(3));

        let status = service
            .check_cooldown(user, lesson, t0 + Duration::seconds(200))
            .await
            .unwrap();
        assert!(status.on_cooldown);
        assert_eq!(status.remaining_seconds, 130);
    }

    #[tokio::test]
    async fn unknown_lesson_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .record_failure(UserId::new(1), LessonId::new(77), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::LessonNotFound));
    }
}
