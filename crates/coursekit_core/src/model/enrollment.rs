//! Enrollment record and progress arithmetic.
//!
//! # Invariants
//! - One enrollment per `(learner_id, course_id)`.
//! - `progress` is always within `0..=100`.
//! - Progress counts only completed ids that still exist in the current tree.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::model::content::LessonId;
use crate::model::course::{CourseId, LearnerId};

/// Percentage at which an enrollment counts as finished.
pub const COMPLETE_PROGRESS: u8 = 100;

/// Per-learner access grant and progress record for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    /// Derived percentage against the current lessons, recomputed on every read.
    pub progress: u8,
    /// Completed lesson ids. May contain stale ids of deleted lessons.
    pub completed_lesson_ids: BTreeSet<LessonId>,
    /// Epoch ms when access was granted.
    pub enrolled_at: i64,
    /// Epoch ms of the last progress write.
    pub updated_at: i64,
    /// Epoch ms when progress first reached 100. Never cleared.
    pub completed_at: Option<i64>,
}

impl Enrollment {
    pub fn has_completed(&self, lesson_id: LessonId) -> bool {
        self.completed_lesson_ids.contains(&lesson_id)
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= COMPLETE_PROGRESS
    }
}

/// Computes `round(100 * |completed ∩ current| / |current|)`.
///
/// An empty course reports `0`. Ids outside `current_lesson_ids` are ignored,
/// so deleted lessons can neither inflate the numerator nor the denominator.
pub fn compute_progress<'a>(
    completed: impl IntoIterator<Item = &'a LessonId>,
    current_lesson_ids: &HashSet<LessonId>,
) -> u8 {
    let total = current_lesson_ids.len();
    if total == 0 {
        return 0;
    }

    let done = completed
        .into_iter()
        .filter(|id| current_lesson_ids.contains(id))
        .collect::<HashSet<_>>()
        .len();

    // Integer round-half-up of done * 100 / total.
    let percent = (done * 200 + total) / (total * 2);
    u8::try_from(percent.min(usize::from(COMPLETE_PROGRESS))).unwrap_or(COMPLETE_PROGRESS)
}

/// Splits completed ids into `(current, stale)` against the live tree.
pub fn partition_completed(
    completed: &BTreeSet<LessonId>,
    current_lesson_ids: &HashSet<LessonId>,
) -> (BTreeSet<LessonId>, BTreeSet<LessonId>) {
    completed
        .iter()
        .copied()
        .partition(|id| current_lesson_ids.contains(id))
}
