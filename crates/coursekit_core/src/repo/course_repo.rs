//! Course registry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the catalog fields access decisions depend on.
//! - Create the empty content tree row together with its course.
//!
//! # Invariants
//! - Courses are never hard-deleted; `is_disabled` is the soft switch.

use crate::model::course::{Course, CourseId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, EntityKey, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const COURSE_SELECT_SQL: &str = "SELECT
    course_id,
    title,
    author_id,
    is_published,
    is_disabled,
    created_at,
    updated_at
FROM courses";

/// Repository interface for the course registry.
pub trait CourseRepository {
    /// Creates one draft course with an empty content tree.
    fn create_course(&self, title: &str, author_id: &str) -> RepoResult<Course>;
    /// Loads one course by id.
    fn get_course(&self, course_id: CourseId) -> RepoResult<Option<Course>>;
    /// Lists courses authored by one user, newest first.
    fn list_by_author(&self, author_id: &str) -> RepoResult<Vec<Course>>;
    /// Flips publication status.
    fn set_published(&self, course_id: CourseId, published: bool) -> RepoResult<()>;
    /// Flips the soft-disable marker.
    fn set_disabled(&self, course_id: CourseId, disabled: bool) -> RepoResult<()>;
}

/// SQLite-backed course repository.
pub struct SqliteCourseRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCourseRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["courses", "content_trees"])?;
        Ok(Self { conn })
    }
}

impl CourseRepository for SqliteCourseRepository<'_> {
    fn create_course(&self, title: &str, author_id: &str) -> RepoResult<Course> {
        let course_id = Uuid::new_v4();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO courses (course_id, title, author_id, is_published, is_disabled)
             VALUES (?1, ?2, ?3, 0, 0);",
            params![course_id.to_string(), title, author_id],
        )?;
        tx.execute(
            "INSERT INTO content_trees (course_id, revision) VALUES (?1, 0);",
            [course_id.to_string()],
        )?;
        tx.commit()?;

        self.get_course(course_id)?
            .ok_or(RepoError::NotFound(EntityKey::Course(course_id)))
    }

    fn get_course(&self, course_id: CourseId) -> RepoResult<Option<Course>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COURSE_SELECT_SQL} WHERE course_id = ?1;"))?;
        let mut rows = stmt.query([course_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_course_row(row)?));
        }
        Ok(None)
    }

    fn list_by_author(&self, author_id: &str) -> RepoResult<Vec<Course>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COURSE_SELECT_SQL}
             WHERE author_id = ?1
             ORDER BY created_at DESC, course_id ASC;"
        ))?;
        let mut rows = stmt.query([author_id])?;
        let mut courses = Vec::new();
        while let Some(row) = rows.next()? {
            courses.push(parse_course_row(row)?);
        }
        Ok(courses)
    }

    fn set_published(&self, course_id: CourseId, published: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE courses
             SET is_published = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE course_id = ?1;",
            params![course_id.to_string(), bool_to_int(published)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKey::Course(course_id)));
        }
        Ok(())
    }

    fn set_disabled(&self, course_id: CourseId, disabled: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE courses
             SET is_disabled = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE course_id = ?1;",
            params![course_id.to_string(), bool_to_int(disabled)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKey::Course(course_id)));
        }
        Ok(())
    }
}

fn parse_course_row(row: &Row<'_>) -> RepoResult<Course> {
    let id_text: String = row.get("course_id")?;
    Ok(Course {
        id: parse_uuid(&id_text, "courses.course_id")?,
        title: row.get("title")?,
        author_id: row.get("author_id")?,
        published: parse_flag(row.get("is_published")?, "courses.is_published")?,
        disabled: parse_flag(row.get("is_disabled")?, "courses.is_disabled")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
