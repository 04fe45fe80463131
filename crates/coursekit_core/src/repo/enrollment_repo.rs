//! Enrollment ledger repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist one enrollment per `(learner_id, course_id)` with its completed
//!   lesson set.
//! - Run progress updates as one transactional read-modify-write that sees
//!   the current lesson ids of the course.
//!
//! # Invariants
//! - Completed lesson ids are weak references; no foreign key to lessons.
//! - `completed_at` is stamped the first time progress reaches 100 and is
//!   never cleared afterwards.
//! - Revocation deletes the record and its completed set together.

use crate::model::content::LessonId;
use crate::model::course::CourseId;
use crate::model::enrollment::{compute_progress, Enrollment, COMPLETE_PROGRESS};
use crate::repo::content_repo::load_lesson_ids;
use crate::repo::{
    ensure_connection_ready, parse_uuid, with_read_snapshot, EntityKey, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeSet, HashSet};

/// Result of an idempotent enrollment create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollOutcome {
    /// A new record was written.
    Created(Enrollment),
    /// The pair was already enrolled; the stored record is returned untouched.
    Existing(Enrollment),
}

impl EnrollOutcome {
    pub fn enrollment(&self) -> &Enrollment {
        match self {
            Self::Created(enrollment) | Self::Existing(enrollment) => enrollment,
        }
    }

    pub fn into_enrollment(self) -> Enrollment {
        match self {
            Self::Created(enrollment) | Self::Existing(enrollment) => enrollment,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Repository interface for the enrollment ledger.
pub trait EnrollmentRepository {
    /// Creates the enrollment unless one exists for the pair.
    fn create_enrollment(&self, learner_id: &str, course_id: CourseId)
        -> RepoResult<EnrollOutcome>;
    /// Loads one enrollment.
    fn get_enrollment(&self, learner_id: &str, course_id: CourseId)
        -> RepoResult<Option<Enrollment>>;
    /// Lists all enrollments of one learner, most recent first.
    fn list_for_learner(&self, learner_id: &str) -> RepoResult<Vec<Enrollment>>;
    /// Deletes one enrollment and its completed set.
    fn revoke_enrollment(&self, learner_id: &str, course_id: CourseId) -> RepoResult<()>;
    /// Applies `update` to the stored enrollment under the write lock.
    ///
    /// # Contract
    /// - `update` receives the enrollment and the current lesson ids of the
    ///   course, read in the same transaction.
    /// - Nothing is written when `update` leaves the record unchanged.
    /// - Returns the update output plus the committed record.
    fn update_enrollment<T, E>(
        &self,
        learner_id: &str,
        course_id: CourseId,
        update: impl FnOnce(&mut Enrollment, &HashSet<LessonId>) -> Result<T, E>,
    ) -> Result<(T, Enrollment), E>
    where
        E: From<RepoError>;
}

/// SQLite-backed enrollment repository.
pub struct SqliteEnrollmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEnrollmentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["enrollments", "enrollment_completed_lessons"])?;
        Ok(Self { conn })
    }
}

impl EnrollmentRepository for SqliteEnrollmentRepository<'_> {
    fn create_enrollment(
        &self,
        learner_id: &str,
        course_id: CourseId,
    ) -> RepoResult<EnrollOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let course_exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM courses WHERE course_id = ?1);",
            [course_id.to_string()],
            |row| row.get(0),
        )?;
        if course_exists != 1 {
            return Err(RepoError::NotFound(EntityKey::Course(course_id)));
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO enrollments (learner_id, course_id, progress)
             VALUES (?1, ?2, 0);",
            params![learner_id, course_id.to_string()],
        )?;
        let enrollment = load_required_enrollment(&tx, learner_id, course_id)?;
        tx.commit()?;

        if inserted == 1 {
            Ok(EnrollOutcome::Created(enrollment))
        } else {
            Ok(EnrollOutcome::Existing(enrollment))
        }
    }

    fn get_enrollment(
        &self,
        learner_id: &str,
        course_id: CourseId,
    ) -> RepoResult<Option<Enrollment>> {
        with_read_snapshot(self.conn, |conn| {
            load_enrollment(conn, learner_id, course_id)
        })
    }

    fn list_for_learner(&self, learner_id: &str) -> RepoResult<Vec<Enrollment>> {
        with_read_snapshot(self.conn, |conn| list_enrollments(conn, learner_id))
    }

    fn revoke_enrollment(&self, learner_id: &str, course_id: CourseId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM enrollment_completed_lessons
             WHERE learner_id = ?1
               AND course_id = ?2;",
            params![learner_id, course_id.to_string()],
        )?;
        let changed = tx.execute(
            "DELETE FROM enrollments
             WHERE learner_id = ?1
               AND course_id = ?2;",
            params![learner_id, course_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKey::Enrollment {
                learner_id: learner_id.to_string(),
                course_id,
            }));
        }
        tx.commit()?;
        Ok(())
    }

    fn update_enrollment<T, E>(
        &self,
        learner_id: &str,
        course_id: CourseId,
        update: impl FnOnce(&mut Enrollment, &HashSet<LessonId>) -> Result<T, E>,
    ) -> Result<(T, Enrollment), E>
    where
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let original = load_enrollment(&tx, learner_id, course_id)?.ok_or_else(|| {
            RepoError::NotFound(EntityKey::Enrollment {
                learner_id: learner_id.to_string(),
                course_id,
            })
        })?;
        let current_lesson_ids = load_lesson_ids(&tx, course_id)?;

        let mut updated = original.clone();
        let output = update(&mut updated, &current_lesson_ids)?;
        if updated == original {
            return Ok((output, original));
        }

        write_enrollment(&tx, &original, &updated)?;
        let committed = load_required_enrollment(&tx, learner_id, course_id)?;
        tx.commit().map_err(RepoError::from)?;
        Ok((output, committed))
    }
}

fn write_enrollment(
    conn: &Connection,
    original: &Enrollment,
    updated: &Enrollment,
) -> RepoResult<()> {
    let course_id = updated.course_id.to_string();

    for removed in original
        .completed_lesson_ids
        .difference(&updated.completed_lesson_ids)
    {
        conn.execute(
            "DELETE FROM enrollment_completed_lessons
             WHERE learner_id = ?1
               AND course_id = ?2
               AND lesson_id = ?3;",
            params![updated.learner_id, course_id, removed.to_string()],
        )?;
    }
    for added in updated
        .completed_lesson_ids
        .difference(&original.completed_lesson_ids)
    {
        conn.execute(
            "INSERT OR IGNORE INTO enrollment_completed_lessons (learner_id, course_id, lesson_id)
             VALUES (?1, ?2, ?3);",
            params![updated.learner_id, course_id, added.to_string()],
        )?;
    }

    let progress = updated.progress.min(COMPLETE_PROGRESS);
    conn.execute(
        "UPDATE enrollments
         SET progress = ?3,
             completed_at = CASE
                 WHEN ?3 >= ?4 THEN COALESCE(completed_at, (strftime('%s', 'now') * 1000))
                 ELSE completed_at
             END,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE learner_id = ?1
           AND course_id = ?2;",
        params![
            updated.learner_id,
            course_id,
            i64::from(progress),
            i64::from(COMPLETE_PROGRESS)
        ],
    )?;
    Ok(())
}

fn load_required_enrollment(
    conn: &Connection,
    learner_id: &str,
    course_id: CourseId,
) -> RepoResult<Enrollment> {
    load_enrollment(conn, learner_id, course_id)?.ok_or_else(|| {
        RepoError::NotFound(EntityKey::Enrollment {
            learner_id: learner_id.to_string(),
            course_id,
        })
    })
}

fn list_enrollments(conn: &Connection, learner_id: &str) -> RepoResult<Vec<Enrollment>> {
    let mut stmt = conn.prepare(
        "SELECT course_id
         FROM enrollments
         WHERE learner_id = ?1
         ORDER BY enrolled_at DESC, course_id ASC;",
    )?;
    let mut rows = stmt.query([learner_id])?;
    let mut course_ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        course_ids.push(parse_uuid(&value, "enrollments.course_id")?);
    }

    course_ids
        .into_iter()
        .map(|course_id| load_required_enrollment(conn, learner_id, course_id))
        .collect()
}

/// Loads one enrollment with `progress` derived from the current lessons.
///
/// The stored progress column is only a write-time cache; lesson deletions
/// never touch enrollments, so reads recompute it.
fn load_enrollment(
    conn: &Connection,
    learner_id: &str,
    course_id: CourseId,
) -> RepoResult<Option<Enrollment>> {
    let mut stmt = conn.prepare(
        "SELECT
            learner_id,
            course_id,
            progress,
            enrolled_at,
            updated_at,
            completed_at
         FROM enrollments
         WHERE learner_id = ?1
           AND course_id = ?2;",
    )?;
    let mut rows = stmt.query(params![learner_id, course_id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut enrollment = parse_enrollment_row(row)?;
    enrollment.completed_lesson_ids = load_completed_ids(conn, learner_id, course_id)?;
    enrollment.progress = compute_progress(
        &enrollment.completed_lesson_ids,
        &load_lesson_ids(conn, course_id)?,
    );
    Ok(Some(enrollment))
}

fn load_completed_ids(
    conn: &Connection,
    learner_id: &str,
    course_id: CourseId,
) -> RepoResult<BTreeSet<LessonId>> {
    let mut stmt = conn.prepare(
        "SELECT lesson_id
         FROM enrollment_completed_lessons
         WHERE learner_id = ?1
           AND course_id = ?2;",
    )?;
    let mut rows = stmt.query(params![learner_id, course_id.to_string()])?;
    let mut ids = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.insert(parse_uuid(
            &value,
            "enrollment_completed_lessons.lesson_id",
        )?);
    }
    Ok(ids)
}

fn parse_enrollment_row(row: &Row<'_>) -> RepoResult<Enrollment> {
    let course_text: String = row.get("course_id")?;
    let raw_progress: i64 = row.get("progress")?;
    let progress = u8::try_from(raw_progress)
        .ok()
        .filter(|value| *value <= COMPLETE_PROGRESS)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid progress `{raw_progress}` in enrollments.progress"
            ))
        })?;

    Ok(Enrollment {
        learner_id: row.get("learner_id")?,
        course_id: parse_uuid(&course_text, "enrollments.course_id")?,
        progress,
        completed_lesson_ids: BTreeSet::new(),
        enrolled_at: row.get("enrolled_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
    })
}
