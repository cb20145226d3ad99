use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::certificate_service::{CertificateIssuer, CertificateRegistry, IssuerConfig};
use crate::curriculum_service::CurriculumService;
use crate::error::AppServicesError;
use crate::progress::{CooldownService, ProgressAggregator, SubmissionRecorder, SubmissionReview};

/// Assembles every service over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    curriculum: Arc<CurriculumService>,
    cooldown: Arc<CooldownService>,
    recorder: Arc<SubmissionRecorder>,
    aggregator: Arc<ProgressAggregator>,
    review: Arc<SubmissionReview>,
    issuer: Arc<CertificateIssuer>,
    registry: Arc<CertificateRegistry>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock, config: IssuerConfig) -> Self {
        let issuer = Arc::new(CertificateIssuer::new(
            clock,
            config,
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.certificates),
        ));
        let curriculum = Arc::new(CurriculumService::new(
            clock,
            Arc::clone(&storage.curriculum),
        ));
        let cooldown = Arc::new(CooldownService::new(
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
        ));
        let recorder = Arc::new(SubmissionRecorder::new(
            clock,
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
            Arc::clone(&issuer),
        ));
        let aggregator = Arc::new(ProgressAggregator::new(
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
        ));
        let review = Arc::new(SubmissionReview::new(
            clock,
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
            Arc::clone(&issuer),
        ));
        let registry = Arc::new(CertificateRegistry::new(Arc::clone(&storage.certificates)));

        Self {
            curriculum,
            cooldown,
            recorder,
            aggregator,
            review,
            issuer,
            registry,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: IssuerConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, config))
    }

    #[must_use]
    pub fn curriculum(&self) -> Arc<CurriculumService> {
        Arc::clone(&self.curriculum)
    }

    #[must_use]
    pub fn cooldown(&self) -> Arc<CooldownService> {
        Arc::clone(&self.cooldown)
    }

    #[must_use]
    pub fn recorder(&self) -> Arc<SubmissionRecorder> {
        Arc::clone(&self.recorder)
    }

    #[must_use]
    pub fn aggregator(&self) -> Arc<ProgressAggregator> {
        Arc::clone(&self.aggregator)
    }

    #[must_use]
    pub fn review(&self) -> Arc<SubmissionReview> {
        Arc::clone(&self.review)
    }

    #[must_use]
    pub fn issuer(&self) -> Arc<CertificateIssuer> {
        Arc::clone(&self.issuer)
    }

    #[must_use]
    pub fn registry(&self) -> Arc<CertificateRegistry> {
        Arc::clone(&self.registry)
    }
}
