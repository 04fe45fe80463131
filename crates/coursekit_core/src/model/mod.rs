//! Domain model for courses, their content trees, and learner enrollments.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Hold the pure validation and progress rules shared by every service.
//!
//! # Invariants
//! - Lesson and module ids are minted once and never change or get reused.
//! - Enrollments reference lessons weakly; stale ids are data, not corruption.

pub mod content;
pub mod course;
pub mod enrollment;
