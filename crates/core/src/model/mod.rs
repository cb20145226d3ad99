mod certificate;
mod curriculum;
mod ids;
mod progress;

pub use ids::{CertificateId, ChapterId, LessonId, ParseIdError, PathId, ProgressId, UserId};

pub use certificate::{
    CODE_SUFFIX_BYTES, Certificate, CertificateCode, CertificateError, CodePrefix, NewCertificate,
};
pub use curriculum::{
    Chapter, ChapterDraft, ChapterOutline, CurriculumError, LearningPath, Lesson, LessonDraft,
    LessonKind, PathDraft, PathOutline, ValidatedChapter, ValidatedLesson, ValidatedPath,
};
pub use progress::{
    ApprovalStatus, CooldownStatus, LessonStatus, POINTS_PER_LESSON, PathCompletion,
    ProgressChange, ProgressError, ProgressRecord, QUIZ_COOLDOWN_SECS, Submission, UserSummary,
    quiz_cooldown,
};
