#![forbid(unsafe_code)]

pub mod app_services;
pub mod certificate_service;
pub mod curriculum_service;
pub mod error;
pub mod progress;

pub use pathway_core::Clock;

pub use app_services::AppServices;
pub use certificate_service::{CertificateIssuer, CertificateRegistry, IssueOutcome, IssuerConfig};
pub use curriculum_service::CurriculumService;
pub use error::{
    AppServicesError, CertificateServiceError, CurriculumServiceError, ProgressServiceError,
};
pub use progress::{
    CompletionResult, CooldownService, FailureRecord, ProgressAggregator, ReviewResult,
    SubmissionRecorder, SubmissionReview,
};
