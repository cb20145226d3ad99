use clap::{Parser, Subcommand};
use pathway_core::model::{CertificateId, LessonId, LessonKind, PathId, ProgressId, UserId};

#[derive(Debug, Parser)]
#[command(name = "pathway")]
#[command(about = "Learning-path progress tracking and certificate issuance")]
pub struct Cli {
    /// SQLite connection URL
    #[arg(
        long,
        env = "PATHWAY_DB_URL",
        default_value = "sqlite:pathway.sqlite3?mode=rwc"
    )]
    pub database_url: String,

    /// Prefix of issued certificate codes
    #[arg(long, env = "PATHWAY_CERT_PREFIX", default_value = "AIOT")]
    pub certificate_prefix: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "PATHWAY_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a path with one chapter holding lessons of the given kinds
    SeedPath {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "Chapter 1")]
        chapter: String,
        /// Comma-separated lesson kinds, e.g. `quiz,material,project`
        #[arg(long, value_delimiter = ',', required = true)]
        lessons: Vec<LessonKind>,
    },
    /// Print a path with its chapters and lessons
    Outline {
        #[arg(long)]
        path: PathId,
    },
    /// Mark a lesson completed, optionally attaching a submission
    Complete {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        lesson: LessonId,
        #[arg(long)]
        file_url: Option<String>,
        #[arg(long)]
        drive_link: Option<String>,
    },
    /// Record a failed quiz attempt
    Fail {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        lesson: LessonId,
    },
    /// Show the retry cooldown of a quiz
    Cooldown {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        lesson: LessonId,
    },
    /// Completion percentage of a path
    Progress {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        path: PathId,
    },
    /// Per-lesson status of a path
    Statuses {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        path: PathId,
    },
    /// Full progress record of one lesson
    LessonProgress {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        lesson: LessonId,
    },
    /// Lessons completed and points earned
    Summary {
        #[arg(long)]
        user: UserId,
    },
    /// Re-evaluate certificate issuance for a path
    Issue {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        path: PathId,
    },
    /// Approve a project submission
    Approve {
        #[arg(long)]
        progress: ProgressId,
    },
    /// Reject a project submission with a note
    Reject {
        #[arg(long)]
        progress: ProgressId,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Project submissions awaiting review, newest first
    Submissions {
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
    /// Certificates of one user, or all of them
    Certificates {
        #[arg(long)]
        user: Option<UserId>,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
    /// Look up a certificate by its code
    Verify { code: String },
    /// Delete a certificate
    Revoke {
        #[arg(long)]
        certificate: CertificateId,
    },
}
