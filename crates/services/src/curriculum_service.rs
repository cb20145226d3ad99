use std::sync::Arc;

use pathway_core::model::{
    Chapter, ChapterDraft, ChapterId, LearningPath, Lesson, LessonDraft, LessonId, LessonKind,
    PathDraft, PathId, PathOutline,
};
use storage::repository::CurriculumRepository;

use crate::Clock;
use crate::error::CurriculumServiceError;

/// Authoring and lookup of paths, chapters and lessons.
#[derive(Clone)]
pub struct CurriculumService {
    clock: Clock,
    curriculum: Arc<dyn CurriculumRepository>,
}

impl CurriculumService {
    #[must_use]
    pub fn new(clock: Clock, curriculum: Arc<dyn CurriculumRepository>) -> Self {
        Self { clock, curriculum }
    }

    /// Create a learning path.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumServiceError::Curriculum` for validation failures.
    /// Returns `CurriculumServiceError::Storage` if persistence fails.
    pub async fn create_path(
        &self,
        title: String,
        description: String,
    ) -> Result<LearningPath, CurriculumServiceError> {
        let validated = PathDraft { title, description }.validate(self.clock.now())?;
        let path = self.curriculum.insert_path(validated).await?;
        tracing::info!(path_id = %path.id, "learning path created");
        Ok(path)
    }

    /// Append a chapter to an existing path.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumServiceError::PathNotFound` if the path is missing,
    /// `Curriculum` for validation failures, or `Storage` if persistence fails.
    pub async fn add_chapter(
        &self,
        path_id: PathId,
        title: String,
        order: i32,
    ) -> Result<Chapter, CurriculumServiceError> {
        if path_id.is_unset() {
            return Err(CurriculumServiceError::InvalidInput("path id is required"));
        }
        self.curriculum
            .get_path(path_id)
            .await?
            .ok_or(CurriculumServiceError::PathNotFound)?;

        let validated = ChapterDraft {
            path_id,
            title,
            order,
        }
        .validate(self.clock.now())?;
        Ok(self.curriculum.insert_chapter(validated).await?)
    }

    /// Add a lesson to a chapter of `path_id`.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumServiceError::ChapterNotFound` if the chapter is
    /// missing, `Curriculum` when it belongs to another path or the title is
    /// invalid, or `Storage` if persistence fails.
    pub async fn add_lesson(
        &self,
        path_id: PathId,
        chapter_id: ChapterId,
        title: String,
        kind: LessonKind,
        order: i32,
    ) -> Result<Lesson, CurriculumServiceError> {
        if path_id.is_unset() || chapter_id.is_unset() {
            return Err(CurriculumServiceError::InvalidInput(
                "path id and chapter id are required",
            ));
        }
        let chapter = self
            .curriculum
            .get_chapter(chapter_id)
            .await?
            .ok_or(CurriculumServiceError::ChapterNotFound)?;

        let validated = LessonDraft {
            path_id,
            chapter_id,
            title,
            kind,
            order,
        }
        .validate(&chapter, self.clock.now())?;
        let lesson = self.curriculum.insert_lesson(validated).await?;
        tracing::debug!(lesson_id = %lesson.id, kind = %lesson.kind, "lesson added");
        Ok(lesson)
    }

    /// # Errors
    ///
    /// Returns `CurriculumServiceError::LessonNotFound` if the lesson is
    /// missing, or `Storage` if repository access fails.
    pub async fn lesson(&self, lesson_id: LessonId) -> Result<Lesson, CurriculumServiceError> {
        if lesson_id.is_unset() {
            return Err(CurriculumServiceError::InvalidInput("lesson id is required"));
        }
        self.curriculum
            .get_lesson(lesson_id)
            .await?
            .ok_or(CurriculumServiceError::LessonNotFound)
    }

    /// A path with its chapters and lessons in display order.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumServiceError::PathNotFound` if the path is missing,
    /// or `Storage` if repository access fails.
    pub async fn path_outline(
        &self,
        path_id: PathId,
    ) -> Result<PathOutline, CurriculumServiceError> {
        if path_id.is_unset() {
            return Err(CurriculumServiceError::InvalidInput("path id is required"));
        }
        let path = self
            .curriculum
            .get_path(path_id)
            .await?
            .ok_or(CurriculumServiceError::PathNotFound)?;
        let chapters = self.curriculum.list_chapters(path_id).await?;
        let lessons = self.curriculum.list_lessons(path_id).await?;
        Ok(PathOutline::assemble(path, chapters, lessons))
    }
}
