//! Use-case services over the repositories.
//!
//! # Responsibility
//! - Turn repository calls into the operations callers see: course
//!   registry, content editing, enrollment, progress and guarded reads.
//! - Map repository failures into per-area error enums.
//!
//! # Invariants
//! - Services never open transactions themselves; every write goes through
//!   one repository read-modify-write call.

pub mod access_service;
pub mod course_service;
pub mod editor_service;
pub mod enrollment_service;
pub mod progress_service;
