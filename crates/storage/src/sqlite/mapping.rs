use chrono::{DateTime, Utc};
use pathway_core::model::{
    ApprovalStatus, Certificate, CertificateCode, CertificateId, Chapter, ChapterId,
    LearningPath, Lesson, LessonId, LessonKind, PathId, ProgressId, ProgressRecord, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{StorageError, SubmissionRow};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

/// Maps constraint failures on write: a dangling parent reference is
/// `NotFound`, a duplicate key is `Conflict`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn count_from_i64(v: i64) -> Result<u64, StorageError> {
    i64_to_u64("count", v)
}

fn id_col(row: &SqliteRow, column: &'static str) -> Result<u64, StorageError> {
    i64_to_u64(column, row.try_get::<i64, _>(column).map_err(ser)?)
}

fn i32_col(row: &SqliteRow, column: &'static str) -> Result<i32, StorageError> {
    let raw: i64 = row.try_get(column).map_err(ser)?;
    i32::try_from(raw).map_err(|_| StorageError::Serialization(format!("invalid {column}: {raw}")))
}

pub(crate) fn map_path_row(row: &SqliteRow) -> Result<LearningPath, StorageError> {
    Ok(LearningPath {
        id: PathId::new(id_col(row, "id")?),
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_chapter_row(row: &SqliteRow) -> Result<Chapter, StorageError> {
    Ok(Chapter {
        id: ChapterId::new(id_col(row, "id")?),
        path_id: PathId::new(id_col(row, "path_id")?),
        title: row.try_get("title").map_err(ser)?,
        order: i32_col(row, "position")?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let kind: String = row.try_get("kind").map_err(ser)?;
    Ok(Lesson {
        id: LessonId::new(id_col(row, "id")?),
        path_id: PathId::new(id_col(row, "path_id")?),
        chapter_id: ChapterId::new(id_col(row, "chapter_id")?),
        title: row.try_get("title").map_err(ser)?,
        kind: kind.parse::<LessonKind>().map_err(ser)?,
        order: i32_col(row, "position")?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let status: String = row.try_get("approval_status").map_err(ser)?;
    let completed: i64 = row.try_get("completed").map_err(ser)?;
    let quiz_failed_at: Option<DateTime<Utc>> = row.try_get("quiz_failed_at").map_err(ser)?;

    Ok(ProgressRecord {
        id: ProgressId::new(id_col(row, "id")?),
        user_id: UserId::new(id_col(row, "user_id")?),
        lesson_id: LessonId::new(id_col(row, "lesson_id")?),
        completed: completed != 0,
        submission_file_url: row.try_get("submission_file_url").map_err(ser)?,
        submission_drive_link: row.try_get("submission_drive_link").map_err(ser)?,
        approval_status: status.parse::<ApprovalStatus>().map_err(ser)?,
        admin_note: row.try_get("admin_note").map_err(ser)?,
        quiz_failed_at,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_submission_row(row: &SqliteRow) -> Result<SubmissionRow, StorageError> {
    Ok(SubmissionRow {
        progress: map_progress_row(row)?,
        path_id: PathId::new(id_col(row, "path_id")?),
        lesson_title: row.try_get("lesson_title").map_err(ser)?,
        path_title: row.try_get("path_title").map_err(ser)?,
    })
}

pub(crate) fn map_certificate_row(row: &SqliteRow) -> Result<Certificate, StorageError> {
    Ok(Certificate {
        id: CertificateId::new(id_col(row, "id")?),
        user_id: UserId::new(id_col(row, "user_id")?),
        path_id: PathId::new(id_col(row, "path_id")?),
        code: CertificateCode::from_persisted(row.try_get("code").map_err(ser)?),
        issued_at: row.try_get("issued_at").map_err(ser)?,
    })
}
