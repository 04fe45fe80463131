//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//! - Own transaction boundaries for read-modify-write operations.
//!
//! # Invariants
//! - Content writes run `content::validate()` before any SQL mutation.
//! - Read-modify-write paths run inside one IMMEDIATE transaction, which
//!   takes the database write lock up front and serializes writers.
//! - Multi-statement reads run inside one deferred transaction so they
//!   observe a single committed snapshot.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::content::{ContentValidationError, LessonId, ModuleId};
use crate::model::course::{CourseId, LearnerId};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod content_repo;
pub mod course_repo;
pub mod enrollment_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity key carried by `NotFound` errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKey {
    Course(CourseId),
    Module(ModuleId),
    Lesson(LessonId),
    Enrollment {
        learner_id: LearnerId,
        course_id: CourseId,
    },
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Course(id) => write!(f, "course {id}"),
            Self::Module(id) => write!(f, "module {id}"),
            Self::Lesson(id) => write!(f, "lesson {id}"),
            Self::Enrollment {
                learner_id,
                course_id,
            } => write!(f, "enrollment of learner {learner_id} in course {course_id}"),
        }
    }
}

/// Repository error shared by course, content and enrollment storage.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Write rejected by content tree validation; nothing was persisted.
    Validation(ContentValidationError),
    /// Target entity does not exist.
    NotFound(EntityKey),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "{key} not found"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ContentValidationError> for RepoError {
    fn from(value: ContentValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Runs `read` against one committed snapshot.
///
/// Opens a deferred transaction when the connection is in autocommit mode
/// and joins the caller's transaction otherwise.
pub(crate) fn with_read_snapshot<T, E>(
    conn: &Connection,
    read: impl FnOnce(&Connection) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<RepoError>,
{
    if !conn.is_autocommit() {
        return read(conn);
    }
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)
        .map_err(RepoError::from)?;
    let value = read(&tx)?;
    tx.commit().map_err(RepoError::from)?;
    Ok(value)
}

/// Rejects connections that have not been migrated to this binary's schema.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    required_tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in required_tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
