//! Curriculum and enrollment progress engine.
//! This crate owns course content trees, enrollments, lesson progress and
//! access decisions.

pub mod access;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod player;
pub mod repo;
pub mod service;

pub use access::resolver::{resolve, AccessDecision, AccessFacts, Viewer, ViewerRole};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::content::{
    validate, ContentTree, ContentValidationError, Lesson, LessonBody, LessonId, LessonKind,
    Module, ModuleId, ValidationReason,
};
pub use model::course::{Course, CourseId, LearnerId};
pub use model::enrollment::{compute_progress, Enrollment};
pub use player::embed::{resolve_player_source, PlayerSource};
pub use repo::content_repo::{ContentRepository, SqliteContentRepository};
pub use repo::course_repo::{CourseRepository, SqliteCourseRepository};
pub use repo::enrollment_repo::{EnrollOutcome, EnrollmentRepository, SqliteEnrollmentRepository};
pub use repo::{EntityKey, RepoError, RepoResult};
pub use service::access_service::{AccessError, AccessService, CourseOutline, LessonView};
pub use service::course_service::{CourseService, CourseServiceError};
pub use service::editor_service::{ContentEdit, EditorError, EditorService, LessonUpdate};
pub use service::enrollment_service::{EnrollmentError, EnrollmentService};
pub use service::progress_service::{
    CompletionOutcome, ProgressError, ProgressService, ProgressView,
};

/// Minimal health-check API for embedding hosts.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
