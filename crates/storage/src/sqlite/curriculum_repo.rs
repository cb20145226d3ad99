use pathway_core::model::{
    Chapter, ChapterId, LearningPath, Lesson, LessonId, PathId, ValidatedChapter,
    ValidatedLesson, ValidatedPath,
};

use super::SqliteRepository;
use super::mapping::{
    count_from_i64, id_i64, map_chapter_row, map_lesson_row, map_path_row, write_err,
};
use crate::repository::{CurriculumRepository, StorageError};

#[async_trait::async_trait]
impl CurriculumRepository for SqliteRepository {
    async fn insert_path(&self, path: ValidatedPath) -> Result<LearningPath, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO learning_paths (title, description, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(&path.title)
        .bind(&path.description)
        .bind(path.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("path id sign overflow".into()))?;
        Ok(path.assign_id(PathId::new(id)))
    }

    async fn get_path(&self, id: PathId) -> Result<Option<LearningPath>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, created_at
            FROM learning_paths WHERE id = ?1
            ",
        )
        .bind(id_i64("path_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_path_row).transpose()
    }

    async fn insert_chapter(&self, chapter: ValidatedChapter) -> Result<Chapter, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO chapters (path_id, title, position, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("path_id", chapter.path_id.value())?)
        .bind(&chapter.title)
        .bind(i64::from(chapter.order))
        .bind(chapter.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("chapter id sign overflow".into()))?;
        Ok(chapter.assign_id(ChapterId::new(id)))
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, path_id, title, position, created_at
            FROM chapters WHERE id = ?1
            ",
        )
        .bind(id_i64("chapter_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_chapter_row).transpose()
    }

    async fn list_chapters(&self, path_id: PathId) -> Result<Vec<Chapter>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, path_id, title, position, created_at
            FROM chapters
            WHERE path_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("path_id", path_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_chapter_row).collect()
    }

    async fn insert_lesson(&self, lesson: ValidatedLesson) -> Result<Lesson, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO lessons (path_id, chapter_id, title, kind, position, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_i64("path_id", lesson.path_id.value())?)
        .bind(id_i64("chapter_id", lesson.chapter_id.value())?)
        .bind(&lesson.title)
        .bind(lesson.kind.as_str())
        .bind(i64::from(lesson.order))
        .bind(lesson.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("lesson id sign overflow".into()))?;
        Ok(lesson.assign_id(LessonId::new(id)))
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, path_id, chapter_id, title, kind, position, created_at
            FROM lessons WHERE id = ?1
            ",
        )
        .bind(id_i64("lesson_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn list_lessons(&self, path_id: PathId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, path_id, chapter_id, title, kind, position, created_at
            FROM lessons
            WHERE path_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("path_id", path_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_lesson_row).collect()
    }

    async fn count_lessons(&self, path_id: PathId) -> Result<u64, StorageError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE path_id = ?1")
            .bind(id_i64("path_id", path_id.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        count_from_i64(total)
    }
}
