use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pathway_core::model::{
    Certificate, CertificateCode, CertificateId, Chapter, ChapterId, LearningPath, Lesson,
    LessonId, NewCertificate, PathId, ProgressChange, ProgressId, ProgressRecord, UserId,
    ValidatedChapter,
    ValidatedLesson, ValidatedPath,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A project submission joined with the titles an admin reviews it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRow {
    #[serde(flatten)]
    pub progress: ProgressRecord,
    pub path_id: PathId,
    pub lesson_title: String,
    pub path_title: String,
}

/// Paths, chapters and lessons.
#[async_trait]
pub trait CurriculumRepository: Send + Sync {
    /// Insert a path and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the path cannot be stored.
    async fn insert_path(&self, path: ValidatedPath) -> Result<LearningPath, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_path(&self, id: PathId) -> Result<Option<LearningPath>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the chapter cannot be stored.
    async fn insert_chapter(&self, chapter: ValidatedChapter) -> Result<Chapter, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn list_chapters(&self, path_id: PathId) -> Result<Vec<Chapter>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn insert_lesson(&self, lesson: ValidatedLesson) -> Result<Lesson, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Lessons of a path ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn list_lessons(&self, path_id: PathId) -> Result<Vec<Lesson>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn count_lessons(&self, path_id: PathId) -> Result<u64, StorageError>;
}

/// Per-(user, lesson) progress records and the aggregates over them.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Return the record for (user, lesson), creating a fresh one if absent.
    ///
    /// Concurrent callers for the same pair observe the same record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn find_or_create_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn find_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_progress(&self, id: ProgressId) -> Result<Option<ProgressRecord>, StorageError>;

    /// Apply `change` to the stored record and return the result.
    ///
    /// Only the fields the change touches are written, against the stored
    /// row rather than a caller's copy, so concurrent changes compose. A
    /// resubmission never downgrades an approval.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn update_progress(
        &self,
        id: ProgressId,
        change: &ProgressChange,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError>;

    /// Completed records of `user_id` whose lesson belongs to `path_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn count_completed(&self, user_id: UserId, path_id: PathId)
    -> Result<u64, StorageError>;

    /// Records of `user_id` on project lessons of `path_id` that are not approved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn count_unapproved_projects(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<u64, StorageError>;

    /// Every record `user_id` holds on lessons of `path_id`, ordered by lesson id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn list_path_progress(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Records attached to project lessons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn list_project_submissions(&self, limit: u32)
    -> Result<Vec<SubmissionRow>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn count_completed_for_user(&self, user_id: UserId) -> Result<u64, StorageError>;
}

/// Issued certificates, unique per (user, path) and per code.
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Insert unless a certificate already exists for (user, path).
    ///
    /// Returns `Ok(None)` when one already exists; the check and the insert
    /// are a single atomic step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the code is already taken by
    /// another certificate, or other storage errors.
    async fn insert_certificate_if_absent(
        &self,
        certificate: NewCertificate,
    ) -> Result<Option<Certificate>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn find_certificate(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<Option<Certificate>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn get_certificate_by_code(
        &self,
        code: &CertificateCode,
    ) -> Result<Option<Certificate>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn list_user_certificates(&self, user_id: UserId)
    -> Result<Vec<Certificate>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn list_certificates(&self, limit: u32) -> Result<Vec<Certificate>, StorageError>;

    /// Delete by row id. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failure.
    async fn delete_certificate(&self, id: CertificateId) -> Result<bool, StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Tables {
    next_id: u64,
    paths: HashMap<PathId, LearningPath>,
    chapters: HashMap<ChapterId, Chapter>,
    lessons: HashMap<LessonId, Lesson>,
    progress: HashMap<ProgressId, ProgressRecord>,
    certificates: HashMap<CertificateId, Certificate>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn lesson_in_path(&self, lesson_id: LessonId, path_id: PathId) -> Option<&Lesson> {
        self.lessons
            .get(&lesson_id)
            .filter(|lesson| lesson.path_id == path_id)
    }

    fn user_path_progress(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> impl Iterator<Item = (&ProgressRecord, &Lesson)> {
        self.progress.values().filter_map(move |record| {
            if record.user_id != user_id {
                return None;
            }
            self.lesson_in_path(record.lesson_id, path_id)
                .map(|lesson| (record, lesson))
        })
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Every table sits behind one mutex, so each trait call is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[async_trait]
impl CurriculumRepository for InMemoryRepository {
    async fn insert_path(&self, path: ValidatedPath) -> Result<LearningPath, StorageError> {
        let mut guard = self.lock()?;
        let path = path.assign_id(PathId::new(guard.allocate_id()));
        guard.paths.insert(path.id, path.clone());
        Ok(path)
    }

    async fn get_path(&self, id: PathId) -> Result<Option<LearningPath>, StorageError> {
        Ok(self.lock()?.paths.get(&id).cloned())
    }

    async fn insert_chapter(&self, chapter: ValidatedChapter) -> Result<Chapter, StorageError> {
        let mut guard = self.lock()?;
        if !guard.paths.contains_key(&chapter.path_id) {
            return Err(StorageError::NotFound);
        }
        let chapter = chapter.assign_id(ChapterId::new(guard.allocate_id()));
        guard.chapters.insert(chapter.id, chapter.clone());
        Ok(chapter)
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError> {
        Ok(self.lock()?.chapters.get(&id).cloned())
    }

    async fn list_chapters(&self, path_id: PathId) -> Result<Vec<Chapter>, StorageError> {
        let guard = self.lock()?;
        let mut chapters: Vec<Chapter> = guard
            .chapters
            .values()
            .filter(|c| c.path_id == path_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.id);
        Ok(chapters)
    }

    async fn insert_lesson(&self, lesson: ValidatedLesson) -> Result<Lesson, StorageError> {
        let mut guard = self.lock()?;
        if !guard.chapters.contains_key(&lesson.chapter_id) {
            return Err(StorageError::NotFound);
        }
        let lesson = lesson.assign_id(LessonId::new(guard.allocate_id()));
        guard.lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, path_id: PathId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lock()?;
        let mut lessons: Vec<Lesson> = guard
            .lessons
            .values()
            .filter(|l| l.path_id == path_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.id);
        Ok(lessons)
    }

    async fn count_lessons(&self, path_id: PathId) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(count(
            guard.lessons.values().filter(|l| l.path_id == path_id).count(),
        ))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn find_or_create_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard
            .progress
            .values()
            .find(|r| r.user_id == user_id && r.lesson_id == lesson_id)
        {
            return Ok(existing.clone());
        }
        let record = ProgressRecord::new(
            ProgressId::new(guard.allocate_id()),
            user_id,
            lesson_id,
            now,
        );
        guard.progress.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .values()
            .find(|r| r.user_id == user_id && r.lesson_id == lesson_id)
            .cloned())
    }

    async fn get_progress(&self, id: ProgressId) -> Result<Option<ProgressRecord>, StorageError> {
        Ok(self.lock()?.progress.get(&id).cloned())
    }

    async fn update_progress(
        &self,
        id: ProgressId,
        change: &ProgressChange,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let mut guard = self.lock()?;
        let stored = guard.progress.get_mut(&id).ok_or(StorageError::NotFound)?;
        stored.apply(change, now);
        Ok(stored.clone())
    }

    async fn count_completed(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(count(
            guard
                .user_path_progress(user_id, path_id)
                .filter(|(record, _)| record.completed)
                .count(),
        ))
    }

    async fn count_unapproved_projects(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(count(
            guard
                .user_path_progress(user_id, path_id)
                .filter(|(record, lesson)| {
                    lesson.kind.is_project() && !record.approval_status.is_approved()
                })
                .count(),
        ))
    }

    async fn list_path_progress(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self.lock()?;
        let mut records: Vec<ProgressRecord> = guard
            .user_path_progress(user_id, path_id)
            .map(|(record, _)| record.clone())
            .collect();
        records.sort_by_key(|r| r.lesson_id);
        Ok(records)
    }

    async fn list_project_submissions(
        &self,
        limit: u32,
    ) -> Result<Vec<SubmissionRow>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<SubmissionRow> = guard
            .progress
            .values()
            .filter_map(|record| {
                let lesson = guard.lessons.get(&record.lesson_id)?;
                if !lesson.kind.is_project() {
                    return None;
                }
                let path_title = guard
                    .paths
                    .get(&lesson.path_id)
                    .map(|p| p.title.clone())
                    .unwrap_or_default();
                Some(SubmissionRow {
                    progress: record.clone(),
                    path_id: lesson.path_id,
                    lesson_title: lesson.title.clone(),
                    path_title,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.progress
                .created_at
                .cmp(&a.progress.created_at)
                .then(b.progress.id.cmp(&a.progress.id))
        });
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn count_completed_for_user(&self, user_id: UserId) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(count(
            guard
                .progress
                .values()
                .filter(|r| r.user_id == user_id && r.completed)
                .count(),
        ))
    }
}

#[async_trait]
impl CertificateRepository for InMemoryRepository {
    async fn insert_certificate_if_absent(
        &self,
        certificate: NewCertificate,
    ) -> Result<Option<Certificate>, StorageError> {
        let mut guard = self.lock()?;
        let existing = guard
            .certificates
            .values()
            .any(|c| c.user_id == certificate.user_id && c.path_id == certificate.path_id);
        if existing {
            return Ok(None);
        }
        if guard.certificates.values().any(|c| c.code == certificate.code) {
            return Err(StorageError::Conflict);
        }
        let certificate = certificate.assign_id(CertificateId::new(guard.allocate_id()));
        guard
            .certificates
            .insert(certificate.id, certificate.clone());
        Ok(Some(certificate))
    }

    async fn find_certificate(
        &self,
        user_id: UserId,
        path_id: PathId,
    ) -> Result<Option<Certificate>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .certificates
            .values()
            .find(|c| c.user_id == user_id && c.path_id == path_id)
            .cloned())
    }

    async fn get_certificate_by_code(
        &self,
        code: &CertificateCode,
    ) -> Result<Option<Certificate>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .certificates
            .values()
            .find(|c| &c.code == code)
            .cloned())
    }

    async fn list_user_certificates(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Certificate>, StorageError> {
        let guard = self.lock()?;
        let mut certs: Vec<Certificate> = guard
            .certificates
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        certs.sort_by_key(|c| c.id);
        Ok(certs)
    }

    async fn list_certificates(&self, limit: u32) -> Result<Vec<Certificate>, StorageError> {
        let guard = self.lock()?;
        let mut certs: Vec<Certificate> = guard.certificates.values().cloned().collect();
        certs.sort_by_key(|c| c.id);
        certs.truncate(limit as usize);
        Ok(certs)
    }

    async fn delete_certificate(&self, id: CertificateId) -> Result<bool, StorageError> {
        Ok(self.lock()?.certificates.remove(&id).is_some())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub curriculum: Arc<dyn CurriculumRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let curriculum: Arc<dyn CurriculumRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let certificates: Arc<dyn CertificateRepository> = Arc::new(repo);
        Self {
            curriculum,
            progress,
            certificates,
        }
    }
}
