//! Shared error types for the services crate.

use thiserror::Error;

use pathway_core::model::CurriculumError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the progress services and the certificate issuer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("lesson not found")]
    LessonNotFound,
    #[error("progress record not found")]
    ProgressNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CurriculumService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CurriculumServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("learning path not found")]
    PathNotFound,
    #[error("chapter not found")]
    ChapterNotFound,
    #[error("lesson not found")]
    LessonNotFound,
    #[error(transparent)]
    Curriculum(#[from] CurriculumError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CertificateRegistry`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificateServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("certificate not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
