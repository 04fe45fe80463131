//! Lesson completion and progress use-case service.
//!
//! # Responsibility
//! - Record lesson completions idempotently.
//! - Compute progress against the current tree shape, not a snapshot.
//!
//! # Invariants
//! - Completing a lesson requires full access through an enrollment;
//!   admins and authors without one are served but not tracked.
//! - A lesson absent from the current tree cannot be completed.
//! - Progress stays within `0..=100` and never counts deleted lessons.
//! - Stale completed ids are pruned on the next successful write.

use crate::access::resolver::{resolve, AccessDecision, AccessFacts, Viewer};
use crate::model::content::{Lesson, LessonId};
use crate::model::course::CourseId;
use crate::model::enrollment::{compute_progress, partition_completed, Enrollment};
use crate::repo::content_repo::ContentRepository;
use crate::repo::course_repo::CourseRepository;
use crate::repo::enrollment_repo::EnrollmentRepository;
use crate::repo::{EntityKey, RepoError};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from progress operations.
#[derive(Debug)]
pub enum ProgressError {
    CourseNotFound(CourseId),
    /// Viewer has no enrollment granting access. Authorization failure.
    NotEnrolled { course_id: CourseId },
    /// Lesson is not part of the current tree; callers should refresh it.
    UnknownLesson(LessonId),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for ProgressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::NotEnrolled { course_id } => write!(f, "not enrolled in course {course_id}"),
            Self::UnknownLesson(id) => write!(f, "lesson not in current course content: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProgressError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProgressError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityKey::Course(id)) => Self::CourseNotFound(id),
            RepoError::NotFound(EntityKey::Enrollment { course_id, .. }) => {
                Self::NotEnrolled { course_id }
            }
            other => Self::Repo(other),
        }
    }
}

/// Result of `complete_lesson`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Lesson newly added to the completed set; progress recomputed.
    Recorded(Enrollment),
    /// Lesson was already completed; the stored record is unchanged.
    AlreadyCompleted(Enrollment),
    /// Admin or author without enrollment; nothing is tracked.
    Untracked,
}

impl CompletionOutcome {
    pub fn enrollment(&self) -> Option<&Enrollment> {
        match self {
            Self::Recorded(enrollment) | Self::AlreadyCompleted(enrollment) => Some(enrollment),
            Self::Untracked => None,
        }
    }
}

/// Progress recomputed against the current tree, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub course_id: CourseId,
    pub progress: u8,
    /// Completed lessons that still exist.
    pub completed_lessons: usize,
    pub total_lessons: usize,
    /// Completed ids whose lessons were deleted.
    pub stale_references: usize,
    /// First lesson in display order not yet completed.
    pub next_lesson_id: Option<LessonId>,
    pub is_complete: bool,
}

/// Progress tracking facade.
pub struct ProgressService<C, T, E>
where
    C: CourseRepository,
    T: ContentRepository,
    E: EnrollmentRepository,
{
    courses: C,
    contents: T,
    enrollments: E,
}

impl<C, T, E> ProgressService<C, T, E>
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

    /// Marks one lesson completed for the viewer.
    ///
    /// # Contract
    /// - `NotEnrolled` when the viewer lacks enrollment-backed access.
    /// - `UnknownLesson` when `lesson_id` is not in the current tree.
    /// - Idempotent: repeating a completion returns `AlreadyCompleted` with
    ///   the unchanged record.
    /// - On success the completed set and progress are written atomically.
    pub fn complete_lesson(
        &self,
        viewer: &Viewer,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<CompletionOutcome, ProgressError> {
        let course = self
            .courses
            .get_course(course_id)?
            .ok_or(ProgressError::CourseNotFound(course_id))?;

        let enrollment_exists = match viewer.learner_id() {
            Some(learner_id) => self
                .enrollments
                .get_enrollment(learner_id, course_id)?
                .is_some(),
            None => false,
        };
        let facts = AccessFacts::for_viewer(viewer, &course, enrollment_exists, false);
        if resolve(&facts) != AccessDecision::Full {
            debug!(
                "event=lesson_complete module=progress status=denied course_id={course_id} lesson_id={lesson_id}"
            );
            return Err(ProgressError::NotEnrolled { course_id });
        }

        let learner_id = match viewer.learner_id() {
            Some(learner_id) if enrollment_exists => learner_id,
            _ => {
                if !self.contents.lesson_ids(course_id)?.contains(&lesson_id) {
                    return Err(ProgressError::UnknownLesson(lesson_id));
                }
                return Ok(CompletionOutcome::Untracked);
            }
        };

        let (recorded, enrollment) =
            self.enrollments
                .update_enrollment(learner_id, course_id, |enrollment, current| {
                    if !current.contains(&lesson_id) {
                        return Err(ProgressError::UnknownLesson(lesson_id));
                    }
                    if enrollment.has_completed(lesson_id) {
                        return Ok(false);
                    }
                    enrollment.completed_lesson_ids.insert(lesson_id);
                    enrollment
                        .completed_lesson_ids
                        .retain(|id| current.contains(id));
                    enrollment.progress =
                        compute_progress(&enrollment.completed_lesson_ids, current);
                    Ok(true)
                })?;

        if !recorded {
            return Ok(CompletionOutcome::AlreadyCompleted(enrollment));
        }
        info!(
            "event=lesson_complete module=progress status=ok course_id={} lesson_id={} progress={}",
            course_id, lesson_id, enrollment.progress
        );
        Ok(CompletionOutcome::Recorded(enrollment))
    }

    /// Recomputes progress for display without writing anything.
    pub fn progress_view(
        &self,
        learner_id: &str,
        course_id: CourseId,
    ) -> Result<ProgressView, ProgressError> {
        self.contents
            .consistent_read(|| self.read_progress_view(learner_id, course_id))
    }

    fn read_progress_view(
        &self,
        learner_id: &str,
        course_id: CourseId,
    ) -> Result<ProgressView, ProgressError> {
        let tree = self
            .contents
            .get_tree(course_id)?
            .ok_or(ProgressError::CourseNotFound(course_id))?;
        let enrollment = self
            .enrollments
            .get_enrollment(learner_id, course_id)?
            .ok_or(ProgressError::NotEnrolled { course_id })?;

        let current: HashSet<LessonId> = tree.lesson_ids().into_iter().collect();
        let (live, stale) = partition_completed(&enrollment.completed_lesson_ids, &current);
        let progress = compute_progress(&live, &current);
        let next_lesson_id = tree
            .lessons()
            .map(Lesson::id)
            .find(|id| !live.contains(id));

        Ok(ProgressView {
            course_id,
            progress,
            completed_lessons: live.len(),
            total_lessons: current.len(),
            stale_references: stale.len(),
            next_lesson_id,
            is_complete: !current.is_empty() && live.len() == current.len(),
        })
    }
}
