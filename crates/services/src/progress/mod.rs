//! Learner progress: completion, quiz cooldown, aggregation and admin review.

mod aggregate;
mod cooldown;
mod review;
mod submission;

pub use crate::error::ProgressServiceError;
pub use aggregate::ProgressAggregator;
pub use cooldown::{CooldownService, FailureRecord};
pub use review::{ReviewResult, SubmissionReview};
pub use submission::{CompletionResult, SubmissionRecorder};
