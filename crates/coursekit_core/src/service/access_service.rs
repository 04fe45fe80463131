//! Content read path guarded by the access resolver.
//!
//! # Responsibility
//! - Gather access facts fresh on every call and resolve a decision.
//! - Serve the course outline and individual lessons under that decision.
//!
//! # Invariants
//! - Nothing is cached between calls; a new enrollment or role change is
//!   visible on the very next request.
//! - Course, tree and enrollment of one decision come from one committed
//!   snapshot.
//! - Lesson bodies are only returned when the decision allows reading them.
//! - Drafts and disabled courses are hidden from viewers with no access.

use crate::access::resolver::{resolve, AccessDecision, AccessFacts, Viewer};
use crate::model::content::{ContentTree, Lesson, LessonId, LessonKind, ModuleId};
use crate::model::course::{Course, CourseId};
use crate::model::enrollment::{compute_progress, Enrollment};
use crate::player::embed::{resolve_player_source, PlayerSource};
use crate::repo::content_repo::ContentRepository;
use crate::repo::course_repo::CourseRepository;
use crate::repo::enrollment_repo::EnrollmentRepository;
use crate::repo::{EntityKey, RepoError};
use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from the guarded read path.
#[derive(Debug)]
pub enum AccessError {
    /// Course is missing or hidden from this viewer.
    CourseNotFound(CourseId),
    LessonNotFound(LessonId),
    /// Lesson exists but the decision does not allow reading it.
    AccessDenied {
        course_id: CourseId,
        lesson_id: LessonId,
        decision: AccessDecision,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::LessonNotFound(id) => write!(f, "lesson not found: {id}"),
            Self::AccessDenied {
                course_id,
                lesson_id,
                decision,
            } => write!(
                f,
                "access denied to lesson {lesson_id} of course {course_id} (decision={})",
                decision.as_str()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AccessError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityKey::Course(id)) => Self::CourseNotFound(id),
            RepoError::NotFound(EntityKey::Lesson(id)) => Self::LessonNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Lesson row as shown in the course outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineLesson {
    pub lesson_id: LessonId,
    pub title: String,
    pub kind: LessonKind,
    pub duration_min: u32,
    pub is_preview: bool,
    /// Viewer may open this lesson.
    pub readable: bool,
    /// Viewer's enrollment lists this lesson as completed.
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineModule {
    pub module_id: ModuleId,
    pub title: String,
    pub lessons: Vec<OutlineLesson>,
}

/// Course page model: curriculum titles plus per-lesson readability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseOutline {
    pub course_id: CourseId,
    pub title: String,
    pub decision: AccessDecision,
    /// Present only when the viewer is enrolled.
    pub progress: Option<u8>,
    pub lesson_count: usize,
    pub total_duration_min: u64,
    pub modules: Vec<OutlineModule>,
}

/// One opened lesson with its player payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonView {
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub lesson: Lesson,
    pub source: PlayerSource,
    pub completed: bool,
}

/// Everything one decision was made from, read in one pass.
struct AccessSnapshot {
    course: Course,
    tree: ContentTree,
    enrollment: Option<Enrollment>,
    decision: AccessDecision,
}

/// Guarded content read facade.
pub struct AccessService<C, T, E>
where
    C: CourseRepository,
    T: ContentRepository,
    E: EnrollmentRepository,
{
    courses: C,
    contents: T,
    enrollments: E,
}

impl<C, T, E> AccessService<C, T, E>
where
    C: CourseRepository,
    T: ContentRepository,
    E: EnrollmentRepository,
{
    pub fn new(courses: C, contents: T, enrollments: E) -> Self {
        Self {
            courses,
            contents,
            enrollments,
        }
    }

    /// Resolves the decision for `viewer` on `course_id` from fresh reads.
    pub fn decide(&self, viewer: &Viewer, course_id: CourseId) -> Result<AccessDecision, AccessError> {
        Ok(self.snapshot(viewer, course_id)?.decision)
    }

    /// Builds the course page for `viewer`.
    ///
    /// Titles stay visible under `preview` and for published courses under
    /// `none`; only bodies are gated.
    pub fn course_outline(
        &self,
        viewer: &Viewer,
        course_id: CourseId,
    ) -> Result<CourseOutline, AccessError> {
        let snapshot = self.snapshot(viewer, course_id)?;
        let AccessSnapshot {
            course,
            tree,
            enrollment,
            decision,
        } = snapshot;
        if decision == AccessDecision::None && (!course.published || course.disabled) {
            return Err(AccessError::CourseNotFound(course_id));
        }

        let completed: HashSet<LessonId> = enrollment
            .as_ref()
            .map(|enrollment| enrollment.completed_lesson_ids.iter().copied().collect())
            .unwrap_or_default();
        let progress = enrollment.as_ref().map(|_| {
            let current: HashSet<LessonId> = tree.lesson_ids().into_iter().collect();
            compute_progress(&completed, &current)
        });

        let modules = tree
            .modules
            .iter()
            .map(|module| OutlineModule {
                module_id: module.id(),
                title: module.title.clone(),
                lessons: module
                    .lessons
                    .iter()
                    .map(|lesson| OutlineLesson {
                        lesson_id: lesson.id(),
                        title: lesson.title.clone(),
                        kind: lesson.kind(),
                        duration_min: lesson.duration_min,
                        is_preview: lesson.is_preview,
                        readable: decision.can_read(lesson),
                        completed: completed.contains(&lesson.id()),
                    })
                    .collect(),
            })
            .collect();

        Ok(CourseOutline {
            course_id,
            title: course.title,
            decision,
            progress,
            lesson_count: tree.lesson_count(),
            total_duration_min: tree.total_duration_min(),
            modules,
        })
    }

    /// Opens one lesson for `viewer`.
    ///
    /// # Contract
    /// - `LessonNotFound` when the lesson is not in the current tree.
    /// - `AccessDenied` when the decision does not cover the lesson.
    pub fn open_lesson(
        &self,
        viewer: &Viewer,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<LessonView, AccessError> {
        let snapshot = self.snapshot(viewer, course_id)?;
        let (module_id, lesson) = snapshot
            .tree
            .modules
            .iter()
            .find_map(|module| {
                module
                    .lessons
                    .iter()
                    .find(|lesson| lesson.id() == lesson_id)
                    .map(|lesson| (module.id(), lesson))
            })
            .ok_or(AccessError::LessonNotFound(lesson_id))?;

        if !snapshot.decision.can_read(lesson) {
            return Err(AccessError::AccessDenied {
                course_id,
                lesson_id,
                decision: snapshot.decision,
            });
        }

        let completed = snapshot
            .enrollment
            .as_ref()
            .is_some_and(|enrollment| enrollment.has_completed(lesson_id));
        Ok(LessonView {
            course_id,
            module_id,
            source: resolve_player_source(&lesson.body),
            lesson: lesson.clone(),
            completed,
        })
    }

    fn snapshot(&self, viewer: &Viewer, course_id: CourseId) -> Result<AccessSnapshot, AccessError> {
        self.contents
            .consistent_read(|| self.read_snapshot(viewer, course_id))
    }

    fn read_snapshot(
        &self,
        viewer: &Viewer,
        course_id: CourseId,
    ) -> Result<AccessSnapshot, AccessError> {
        let course = self
            .courses
            .get_course(course_id)?
            .ok_or(AccessError::CourseNotFound(course_id))?;
        let tree = self
            .contents
            .get_tree(course_id)?
            .ok_or(AccessError::CourseNotFound(course_id))?;
        let enrollment = match viewer.learner_id() {
            Some(learner_id) => self.enrollments.get_enrollment(learner_id, course_id)?,
            None => None,
        };

        let facts = AccessFacts::for_viewer(
            viewer,
            &course,
            enrollment.is_some(),
            tree.has_preview_lessons(),
        );
        let decision = resolve(&facts);
        debug!(
            "event=access_resolve module=access status=ok course_id={} decision={} role={}",
            course_id,
            decision.as_str(),
            viewer.role.as_str()
        );

        Ok(AccessSnapshot {
            course,
            tree,
            enrollment,
            decision,
        })
    }
}
