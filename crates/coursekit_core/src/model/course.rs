//! Course catalog record.
//!
//! The catalog collaborator owns pricing and marketing metadata; the engine
//! only keeps the fields access decisions depend on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable course identifier.
pub type CourseId = Uuid;

/// Opaque learner/author identity supplied by the auth collaborator.
pub type LearnerId = String;

/// Course record as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    /// Identity of the authoring user; authors always get full access.
    pub author_id: LearnerId,
    /// `false` means draft.
    pub published: bool,
    /// Soft-disable marker. Disabled courses keep enrollments but lose access.
    pub disabled: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Course {
    /// Returns whether `viewer_id` authored this course.
    pub fn is_authored_by(&self, viewer_id: Option<&str>) -> bool {
        viewer_id.is_some_and(|id| id == self.author_id)
    }
}
