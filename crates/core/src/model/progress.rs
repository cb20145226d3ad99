use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::curriculum::LessonKind;
use crate::model::ids::{LessonId, ProgressId, UserId};

/// Seconds a learner must wait after failing a quiz before retrying.
pub const QUIZ_COOLDOWN_SECS: i64 = 180;

/// Points awarded per completed lesson on the profile summary.
pub const POINTS_PER_LESSON: u64 = 50;

#[must_use]
pub fn quiz_cooldown() -> Duration {
    Duration::seconds(QUIZ_COOLDOWN_SECS)
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("invalid approval status: {0}")]
    InvalidApprovalStatus(String),
}

//
// ─── APPROVAL STATUS ───────────────────────────────────────────────────────────
//

/// Review state of a project submission.
///
/// `Unset` is the state of every record that never carried a project
/// submission. It serializes as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    #[serde(rename = "")]
    Unset,
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Unset => "",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn is_approved(self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }

    /// Resolve the status to persist when `incoming` is written over `self`.
    ///
    /// A resubmission (`Pending`) never downgrades an approved record. Admin
    /// decisions always win.
    #[must_use]
    pub fn settle(self, incoming: ApprovalStatus) -> ApprovalStatus {
        if self.is_approved() && incoming == ApprovalStatus::Pending {
            ApprovalStatus::Approved
        } else {
            incoming
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(ApprovalStatus::Unset),
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(ProgressError::InvalidApprovalStatus(other.to_owned())),
        }
    }
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// Artifacts attached to a lesson completion.
///
/// Values are kept verbatim apart from trimming. Blank values are normalized
/// to `None` so they never overwrite a stored submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    file_url: Option<String>,
    drive_link: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl Submission {
    #[must_use]
    pub fn new(file_url: Option<String>, drive_link: Option<String>) -> Self {
        Self {
            file_url: non_blank(file_url),
            drive_link: non_blank(drive_link),
        }
    }

    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn file_url(&self) -> Option<&str> {
        self.file_url.as_deref()
    }

    #[must_use]
    pub fn drive_link(&self) -> Option<&str> {
        self.drive_link.as_deref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file_url.is_none() && self.drive_link.is_none()
    }
}

/// A state transition of a progress record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressChange {
    /// Lesson completed. `submitted_project` marks a project lesson that
    /// carried artifacts, which puts the record up for review.
    Completed {
        submission: Submission,
        submitted_project: bool,
    },
    /// Quiz failed; starts the retry cooldown.
    QuizFailed,
    Approved,
    Rejected { admin_note: String },
}

impl ProgressChange {
    #[must_use]
    pub fn completion(kind: LessonKind, submission: Submission) -> Self {
        let submitted_project = kind.is_project() && !submission.is_empty();
        ProgressChange::Completed {
            submission,
            submitted_project,
        }
    }
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// Per-(user, lesson) completion, submission and cooldown state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: ProgressId,
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub completed: bool,
    pub submission_file_url: Option<String>,
    pub submission_drive_link: Option<String>,
    pub approval_status: ApprovalStatus,
    pub admin_note: String,
    pub quiz_failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// A fresh record: not completed, no submission, no review.
    #[must_use]
    pub fn new(id: ProgressId, user_id: UserId, lesson_id: LessonId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            lesson_id,
            completed: false,
            submission_file_url: None,
            submission_drive_link: None,
            approval_status: ApprovalStatus::Unset,
            admin_note: String::new(),
            quiz_failed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply one state transition in place.
    ///
    /// Each change touches only its own fields; stores write exactly those
    /// columns.
    pub fn apply(&mut self, change: &ProgressChange, now: DateTime<Utc>) {
        match change {
            ProgressChange::Completed {
                submission,
                submitted_project,
            } => {
                self.completed = true;
                if let Some(url) = submission.file_url() {
                    self.submission_file_url = Some(url.to_owned());
                }
                if let Some(link) = submission.drive_link() {
                    self.submission_drive_link = Some(link.to_owned());
                }
                if *submitted_project {
                    self.approval_status = self.approval_status.settle(ApprovalStatus::Pending);
                }
            }
            ProgressChange::QuizFailed => {
                self.quiz_failed_at = Some(now);
                self.completed = false;
            }
            ProgressChange::Approved => {
                self.approval_status = ApprovalStatus::Approved;
                self.admin_note.clear();
            }
            ProgressChange::Rejected { admin_note } => {
                self.approval_status = ApprovalStatus::Rejected;
                self.admin_note.clone_from(admin_note);
            }
        }
        self.updated_at = now;
    }

    /// End of the retry cooldown, if one was ever started.
    #[must_use]
    pub fn cooldown_end(&self) -> Option<DateTime<Utc>> {
        self.quiz_failed_at.map(|at| at + quiz_cooldown())
    }

    /// Cooldown state at `now`. A completed lesson is never on cooldown.
    #[must_use]
    pub fn cooldown_status(&self, now: DateTime<Utc>) -> CooldownStatus {
        if self.completed {
            return CooldownStatus::clear();
        }
        match self.cooldown_end() {
            Some(end) if now < end => CooldownStatus {
                on_cooldown: true,
                // positive span, so truncation is floor
                remaining_seconds: (end - now).num_seconds(),
            },
            _ => CooldownStatus::clear(),
        }
    }
}

//
// ─── DERIVED VIEWS ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatus {
    pub on_cooldown: bool,
    pub remaining_seconds: i64,
}

impl CooldownStatus {
    #[must_use]
    pub fn clear() -> Self {
        Self {
            on_cooldown: false,
            remaining_seconds: 0,
        }
    }
}

/// Completion ratio of a user over one learning path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathCompletion {
    pub completed: u64,
    pub total: u64,
    pub percentage: u64,
}

impl PathCompletion {
    /// `percentage` is floored and is 0 for an empty path.
    #[must_use]
    pub fn new(completed: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            (completed.saturating_mul(100) / total).min(100)
        };
        Self {
            completed,
            total,
            percentage,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

/// Compact per-lesson state for a path sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonStatus {
    pub lesson_id: LessonId,
    pub completed: bool,
    pub approval_status: ApprovalStatus,
}

impl From<&ProgressRecord> for LessonStatus {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            lesson_id: record.lesson_id,
            completed: record.completed,
            approval_status: record.approval_status,
        }
    }
}

/// Aggregate figures for a learner profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub lessons_completed: u64,
    pub points: u64,
}

impl UserSummary {
    #[must_use]
    pub fn from_completed(lessons_completed: u64) -> Self {
        Self {
            lessons_completed,
            points: lessons_completed.saturating_mul(POINTS_PER_LESSON),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
