use chrono::{DateTime, Utc};
use pathway_core::model::{
    ApprovalStatus, LessonId, PathId, ProgressChange, ProgressId, ProgressRecord, UserId,
};

use super::SqliteRepository;
use super::mapping::{count_from_i64, id_i64, map_progress_row, map_submission_row, write_err};
use crate::repository::{ProgressRepository, StorageError, SubmissionRow};

const PROGRESS_COLUMNS: &str = r"
    p.id, p.user_id, p.lesson_id, p.completed, p.submission_file_url,
    p.submission_drive_link, p.approval_status, p.admin_note, p.quiz_failed_at,
    p.created_at, p.updated_at
";

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn find_or_create_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let user = id_i64("user_id", user_id.value())?;
        let lesson = id_i64("lesson_id", lesson_id.value())?;

        sqlx::query(
            r"
            INSERT INTO user_progress (user_id, lesson_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(user_id, lesson_id) DO NOTHING
            ",
        )
        .bind(user)
        .bind(lesson)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        self.find_progress(user_id, lesson_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn find_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress p WHERE p.user_id = ?1 AND p.lesson_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .bind(id_i64("lesson_id", lesson_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn get_progress(&self, id: ProgressId) -> Result<Option<ProgressRecord>, StorageError> {
        let sql = format!("SELECT {PROGRESS_COLUMNS} FROM user_progress p WHERE p.id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("progress_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn update_progress(
        &self,
        id: ProgressId,
        change: &ProgressChange,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let row_id = id_i64("progress_id", id.value())?;

        // Each arm writes only its own columns, evaluated against the stored row.
        let query = match change {
            ProgressChange::Completed {
                submission,
                submitted_project,
            } => sqlx::query(
                r"
                UPDATE user_progress SET
                    completed = 1,
                    submission_file_url = COALESCE(?1, submission_file_url),
                    submission_drive_link = COALESCE(?2, submission_drive_link),
                    approval_status = CASE
                        WHEN ?3 = 1 AND approval_status <> 'approved' THEN 'pending'
                        ELSE approval_status
                    END,
                    updated_at = ?4
                WHERE id = ?5
                ",
            )
            .bind(submission.file_url())
            .bind(submission.drive_link())
            .bind(i64::from(*submitted_project))
            .bind(now)
            .bind(row_id),
            ProgressChange::QuizFailed => sqlx::query(
                r"
                UPDATE user_progress SET
                    completed = 0,
                    quiz_failed_at = ?1,
                    updated_at = ?1
                WHERE id = ?2
                ",
            )
            .bind(now)
            .bind(row_id),
            ProgressChange::Approved => sqlx::query(
                r"
                UPDATE user_progress SET
                    approval_status = ?1,
                    admin_note = '',
                    updated_at = ?2
                WHERE id = ?3
                ",
            )
            .bind(ApprovalStatus::Approved.as_str())
            .bind(now)
            .bind(row_id),
            ProgressChange::Rejected { admin_note } => sqlx::query(
                r"
                UPDATE user_progress SET
                    approval_status = ?1,
                    admin_note = ?2,
                    updated_at = ?3
                WHERE id = ?4
                ",
            )
            .bind(ApprovalStatus::Rejected.as_str())
            .bind(admin_note.as_str())
            .bind(now)
            .bind(row_id),
        };

        let res = query.execute(&self.pool).await.map_err(write_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        self.get_progress(id).await?.ok_or(StorageError::NotFound)
    }

    async fn count_completed(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<u64, StorageError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM user_progress p
            JOIN lessons l ON l.id = p.lesson_id
            WHERE p.user_id = ?1 AND l.path_id = ?2 AND p.completed = 1
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("path_id", path_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        count_from_i64(total)
    }

    async fn count_unapproved_projects(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<u64, StorageError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM user_progress p
            JOIN lessons l ON l.id = p.lesson_id
            WHERE p.user_id = ?1
              AND l.path_id = ?2
              AND l.kind = 'project'
              AND p.approval_status <> 'approved'
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("path_id", path_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        count_from_i64(total)
    }

    async fn list_path_progress(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let sql = format!(
            r"
            SELECT {PROGRESS_COLUMNS}
            FROM user_progress p
            JOIN lessons l ON l.id = p.lesson_id
            WHERE p.user_id = ?1 AND l.path_id = ?2
            ORDER BY p.lesson_id ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .bind(id_i64("path_id", path_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn list_project_submissions(
        &self,
        limit: u32,
    ) -> Result<Vec<SubmissionRow>, StorageError> {
        let sql = format!(
            r"
            SELECT {PROGRESS_COLUMNS},
                   l.path_id AS path_id,
                   l.title AS lesson_title,
                   lp.title AS path_title
            FROM user_progress p
            JOIN lessons l ON l.id = p.lesson_id
            JOIN learning_paths lp ON lp.id = l.path_id
            WHERE l.kind = 'project'
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ?1
            "
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_submission_row).collect()
    }

    async fn count_completed_for_user(&self, user_id: UserId) -> Result<u64, StorageError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_progress WHERE user_id = ?1 AND completed = 1",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        count_from_i64(total)
    }
}
