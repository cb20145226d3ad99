use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ChapterId, LessonId, PathId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("{field} must be between {min} and {max} characters (got {len})")]
    TitleLength {
        field: &'static str,
        min: usize,
        max: usize,
        len: usize,
    },

    #[error("unknown lesson type: {0}")]
    UnknownLessonKind(String),

    #[error("chapter {chapter} belongs to path {actual}, not {expected}")]
    ChapterPathMismatch {
        chapter: ChapterId,
        expected: PathId,
        actual: PathId,
    },
}

const PATH_TITLE_MIN: usize = 5;
const SECTION_TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 255;

fn checked_title(
    field: &'static str,
    raw: impl Into<String>,
    min: usize,
) -> Result<String, CurriculumError> {
    let title = raw.into().trim().to_owned();
    let len = title.chars().count();
    if !(min..=TITLE_MAX).contains(&len) {
        return Err(CurriculumError::TitleLength {
            field,
            min,
            max: TITLE_MAX,
            len,
        });
    }
    Ok(title)
}

//
// ─── LESSON KIND ───────────────────────────────────────────────────────────────
//

/// What a lesson asks of the learner.
///
/// Only `Project` lessons go through admin review; a path with an unreviewed
/// project never yields a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    Material,
    Quiz,
    Project,
}

impl LessonKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonKind::Material => "material",
            LessonKind::Quiz => "quiz",
            LessonKind::Project => "project",
        }
    }

    #[must_use]
    pub fn is_project(self) -> bool {
        matches!(self, LessonKind::Project)
    }
}

impl fmt::Display for LessonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonKind {
    type Err = CurriculumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "material" => Ok(LessonKind::Material),
            "quiz" => Ok(LessonKind::Quiz),
            "project" => Ok(LessonKind::Project),
            other => Err(CurriculumError::UnknownLessonKind(other.to_owned())),
        }
    }
}

//
// ─── LEARNING PATH ─────────────────────────────────────────────────────────────
//

/// Unvalidated input for a new learning path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDraft {
    pub title: String,
    pub description: String,
}

impl PathDraft {
    /// # Errors
    ///
    /// Returns `CurriculumError::TitleLength` if the title is outside 5..=255 characters.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedPath, CurriculumError> {
        Ok(ValidatedPath {
            title: checked_title("path title", self.title, PATH_TITLE_MIN)?,
            description: self.description.trim().to_owned(),
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath {
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl ValidatedPath {
    #[must_use]
    pub fn assign_id(self, id: PathId) -> LearningPath {
        LearningPath {
            id,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

/// An ordered curriculum of chapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub id: PathId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

//
// ─── CHAPTER ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDraft {
    pub path_id: PathId,
    pub title: String,
    pub order: i32,
}

impl ChapterDraft {
    /// # Errors
    ///
    /// Returns `CurriculumError::TitleLength` if the title is outside 3..=255 characters.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedChapter, CurriculumError> {
        Ok(ValidatedChapter {
            path_id: self.path_id,
            title: checked_title("chapter title", self.title, SECTION_TITLE_MIN)?,
            order: self.order,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedChapter {
    pub path_id: PathId,
    pub title: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

impl ValidatedChapter {
    #[must_use]
    pub fn assign_id(self, id: ChapterId) -> Chapter {
        Chapter {
            id,
            path_id: self.path_id,
            title: self.title,
            order: self.order,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: ChapterId,
    pub path_id: PathId,
    pub title: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub path_id: PathId,
    pub chapter_id: ChapterId,
    pub title: String,
    pub kind: LessonKind,
    pub order: i32,
}

impl LessonDraft {
    /// Validate the draft against the chapter it is being filed under.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError::TitleLength` for a title outside 3..=255 characters.
    /// Returns `CurriculumError::ChapterPathMismatch` if `chapter` belongs to another path.
    pub fn validate(
        self,
        chapter: &Chapter,
        now: DateTime<Utc>,
    ) -> Result<ValidatedLesson, CurriculumError> {
        if chapter.id != self.chapter_id || chapter.path_id != self.path_id {
            return Err(CurriculumError::ChapterPathMismatch {
                chapter: self.chapter_id,
                expected: self.path_id,
                actual: chapter.path_id,
            });
        }

        Ok(ValidatedLesson {
            path_id: self.path_id,
            chapter_id: self.chapter_id,
            title: checked_title("lesson title", self.title, SECTION_TITLE_MIN)?,
            kind: self.kind,
            order: self.order,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLesson {
    pub path_id: PathId,
    pub chapter_id: ChapterId,
    pub title: String,
    pub kind: LessonKind,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

impl ValidatedLesson {
    #[must_use]
    pub fn assign_id(self, id: LessonId) -> Lesson {
        Lesson {
            id,
            path_id: self.path_id,
            chapter_id: self.chapter_id,
            title: self.title,
            kind: self.kind,
            order: self.order,
            created_at: self.created_at,
        }
    }
}

/// A unit of content, quiz or project within a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    pub path_id: PathId,
    pub chapter_id: ChapterId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: LessonKind,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

//
// ─── OUTLINE ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterOutline {
    pub chapter: Chapter,
    pub lessons: Vec<Lesson>,
}

/// A path with its chapters and lessons in curriculum order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathOutline {
    pub path: LearningPath,
    pub chapters: Vec<ChapterOutline>,
}

impl PathOutline {
    /// Group lessons under their chapters, ordering both by `order` then id.
    ///
    /// Lessons whose chapter is not in `chapters` are dropped.
    #[must_use]
    pub fn assemble(path: LearningPath, mut chapters: Vec<Chapter>, lessons: Vec<Lesson>) -> Self {
        chapters.sort_by_key(|c| (c.order, c.id));

        let mut outline: Vec<ChapterOutline> = chapters
            .into_iter()
            .map(|chapter| ChapterOutline {
                chapter,
                lessons: Vec::new(),
            })
            .collect();

        for lesson in lessons {
            if let Some(slot) = outline
                .iter_mut()
                .find(|c| c.chapter.id == lesson.chapter_id)
            {
                slot.lessons.push(lesson);
            }
        }
        for slot in &mut outline {
            slot.lessons.sort_by_key(|l| (l.order, l.id));
        }

        Self {
            path,
            chapters: outline,
        }
    }

    /// Sum of every chapter's lesson count.
    #[must_use]
    pub fn total_lessons(&self) -> usize {
        self.chapters.iter().map(|c| c.lessons.len()).sum()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
