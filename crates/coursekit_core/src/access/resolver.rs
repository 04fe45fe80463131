//! Pure access resolver.

use serde::{Deserialize, Serialize};

use crate::model::content::Lesson;
use crate::model::course::{Course, LearnerId};

/// Role supplied by the auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Student,
    /// Event organiser; carries no extra rights over course content.
    Organiser,
    Admin,
}

impl ViewerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Organiser => "organiser",
            Self::Admin => "admin",
        }
    }

    /// Parses the auth collaborator's role string; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "organiser" | "organizer" => Some(Self::Organiser),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Identity of whoever is asking. Trusted as supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    /// `None` for anonymous visitors.
    pub learner_id: Option<LearnerId>,
    pub role: ViewerRole,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self {
            learner_id: None,
            role: ViewerRole::Student,
        }
    }

    pub fn student(learner_id: impl Into<LearnerId>) -> Self {
        Self::with_role(learner_id, ViewerRole::Student)
    }

    pub fn admin(learner_id: impl Into<LearnerId>) -> Self {
        Self::with_role(learner_id, ViewerRole::Admin)
    }

    pub fn with_role(learner_id: impl Into<LearnerId>, role: ViewerRole) -> Self {
        Self {
            learner_id: Some(learner_id.into()),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ViewerRole::Admin
    }

    pub fn learner_id(&self) -> Option<&str> {
        self.learner_id.as_deref()
    }
}

/// Visibility level for one viewer and one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    None,
    /// Only preview-flagged lessons are readable.
    Preview,
    Full,
}

impl AccessDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Preview => "preview",
            Self::Full => "full",
        }
    }

    /// Whether `lesson` may be read under this decision.
    pub fn can_read(self, lesson: &Lesson) -> bool {
        match self {
            Self::Full => true,
            Self::Preview => lesson.is_preview,
            Self::None => false,
        }
    }
}

/// Inputs of one access decision, gathered fresh per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessFacts {
    pub is_admin: bool,
    /// Viewer authored the course.
    pub is_author: bool,
    pub enrollment_exists: bool,
    pub course_published: bool,
    pub course_disabled: bool,
    pub has_preview_lessons: bool,
}

impl AccessFacts {
    /// Facts for the three core inputs; everything else defaults to `false`.
    pub fn new(role: ViewerRole, enrollment_exists: bool, course_published: bool) -> Self {
        Self {
            is_admin: role == ViewerRole::Admin,
            enrollment_exists,
            course_published,
            ..Self::default()
        }
    }

    /// Facts for one viewer against one course record.
    pub fn for_viewer(
        viewer: &Viewer,
        course: &Course,
        enrollment_exists: bool,
        has_preview_lessons: bool,
    ) -> Self {
        Self::new(viewer.role, enrollment_exists, course.published)
            .authored(course.is_authored_by(viewer.learner_id()))
            .disabled(course.disabled)
            .with_preview_lessons(has_preview_lessons)
    }

    pub fn authored(mut self, is_author: bool) -> Self {
        self.is_author = is_author;
        self
    }

    pub fn disabled(mut self, course_disabled: bool) -> Self {
        self.course_disabled = course_disabled;
        self
    }

    pub fn with_preview_lessons(mut self, has_preview_lessons: bool) -> Self {
        self.has_preview_lessons = has_preview_lessons;
        self
    }

    /// Whether the viewer may see everything regardless of enrollment.
    pub fn is_privileged(&self) -> bool {
        self.is_admin || self.is_author
    }
}

/// Resolves the access decision.
///
/// # Rules (first match wins)
/// 1. Admin or author: `Full`.
/// 2. Disabled course: `None`.
/// 3. Enrolled: `Full`.
/// 4. Published with at least one preview lesson: `Preview`.
/// 5. Otherwise `None`.
pub fn resolve(facts: &AccessFacts) -> AccessDecision {
    if facts.is_privileged() {
        return AccessDecision::Full;
    }
    if facts.course_disabled {
        return AccessDecision::None;
    }
    if facts.enrollment_exists {
        return AccessDecision::Full;
    }
    if facts.course_published && facts.has_preview_lessons {
        return AccessDecision::Preview;
    }
    AccessDecision::None
}
