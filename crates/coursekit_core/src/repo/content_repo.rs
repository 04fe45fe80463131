//! Course content tree repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Load and persist the full module/lesson tree of one course.
//! - Run edits as one transactional read-modify-write.
//!
//! # Invariants
//! - Child listing is deterministic: `sort_order ASC`.
//! - A tree is persisted only after `validate()` accepts it; partial trees are
//!   never written.
//! - Lesson ids survive every save unchanged; only removal drops them.

use crate::model::content::{
    validate, ContentTree, Lesson, LessonBody, LessonId, LessonKind, Module, ModuleId,
};
use crate::model::course::CourseId;
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, with_read_snapshot, EntityKey,
    RepoError, RepoResult,
};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;

/// Repository interface for course content trees.
pub trait ContentRepository {
    /// Loads the current tree; `None` when the course does not exist.
    fn get_tree(&self, course_id: CourseId) -> RepoResult<Option<ContentTree>>;

    /// Current lesson ids of one course, without loading bodies.
    fn lesson_ids(&self, course_id: CourseId) -> RepoResult<HashSet<LessonId>>;

    /// Finds the course that currently owns `module_id`.
    fn course_of_module(&self, module_id: ModuleId) -> RepoResult<Option<CourseId>>;

    /// Finds the course that currently owns `lesson_id`.
    fn course_of_lesson(&self, lesson_id: LessonId) -> RepoResult<Option<CourseId>>;

    /// Runs `read` so that every repository read on this connection inside
    /// it observes the same committed state.
    fn consistent_read<T, E>(&self, read: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>;

    /// Applies `edit` to the latest committed tree and saves the result.
    ///
    /// # Contract
    /// - Read, edit, validate and write happen in one write transaction.
    /// - Any error from `edit`, validation or SQL discards the whole edit.
    /// - Returns the edit output plus the committed tree.
    fn edit_tree<T, E>(
        &self,
        course_id: CourseId,
        edit: impl FnOnce(&mut ContentTree) -> Result<T, E>,
    ) -> Result<(T, ContentTree), E>
    where
        E: From<RepoError>;
}

/// SQLite-backed content tree repository.
pub struct SqliteContentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["content_trees", "course_modules", "course_lessons"])?;
        Ok(Self { conn })
    }
}

impl ContentRepository for SqliteContentRepository<'_> {
    fn get_tree(&self, course_id: CourseId) -> RepoResult<Option<ContentTree>> {
        with_read_snapshot(self.conn, |conn| load_tree(conn, course_id))
    }

    fn consistent_read<T, E>(&self, read: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        with_read_snapshot(self.conn, |_| read())
    }

    fn lesson_ids(&self, course_id: CourseId) -> RepoResult<HashSet<LessonId>> {
        load_lesson_ids(self.conn, course_id)
    }

    fn course_of_module(&self, module_id: ModuleId) -> RepoResult<Option<CourseId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT course_id FROM course_modules WHERE module_id = ?1;",
                [module_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|text| parse_uuid(&text, "course_modules.course_id"))
            .transpose()
    }

    fn course_of_lesson(&self, lesson_id: LessonId) -> RepoResult<Option<CourseId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT course_id FROM course_lessons WHERE lesson_id = ?1;",
                [lesson_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|text| parse_uuid(&text, "course_lessons.course_id"))
            .transpose()
    }

    fn edit_tree<T, E>(
        &self,
        course_id: CourseId,
        edit: impl FnOnce(&mut ContentTree) -> Result<T, E>,
    ) -> Result<(T, ContentTree), E>
    where
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let mut tree = load_tree(&tx, course_id)?
            .ok_or(RepoError::NotFound(EntityKey::Course(course_id)))?;

        let output = edit(&mut tree)?;
        if let Err(err) = validate(&tree) {
            warn!(
                "event=content_save module=repo status=rejected course_id={} field={}",
                course_id, err.field
            );
            return Err(RepoError::from(err).into());
        }

        tree.revision += 1;
        replace_tree(&tx, &tree)?;
        tx.commit().map_err(RepoError::from)?;
        debug!(
            "event=content_save module=repo status=ok course_id={} revision={} lessons={}",
            course_id,
            tree.revision,
            tree.lesson_count()
        );
        Ok((output, tree))
    }
}

fn load_tree(conn: &Connection, course_id: CourseId) -> RepoResult<Option<ContentTree>> {
    let revision: Option<i64> = conn
        .query_row(
            "SELECT revision FROM content_trees WHERE course_id = ?1;",
            [course_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(revision) = revision else {
        return Ok(None);
    };

    let mut modules = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT module_id, title
             FROM course_modules
             WHERE course_id = ?1
             ORDER BY sort_order ASC;",
        )?;
        let mut rows = stmt.query([course_id.to_string()])?;
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("module_id")?;
            let id = parse_uuid(&id_text, "course_modules.module_id")?;
            let title: String = row.get("title")?;
            modules.push(Module::restore(id, title, Vec::new()));
        }
    }

    let mut stmt = conn.prepare(
        "SELECT
            l.lesson_id AS lesson_id,
            l.module_id AS module_id,
            l.title AS title,
            l.kind AS kind,
            l.body AS body,
            l.duration_min AS duration_min,
            l.is_preview AS is_preview
         FROM course_lessons l
         INNER JOIN course_modules m ON m.module_id = l.module_id
         WHERE m.course_id = ?1
         ORDER BY m.sort_order ASC, l.sort_order ASC;",
    )?;
    let mut rows = stmt.query([course_id.to_string()])?;
    while let Some(row) = rows.next()? {
        let module_text: String = row.get("module_id")?;
        let module_id = parse_uuid(&module_text, "course_lessons.module_id")?;
        let lesson = parse_lesson_row(row)?;
        let module = modules
            .iter_mut()
            .find(|module| module.id() == module_id)
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "lesson {} references module {module_id} outside course {course_id}",
                    lesson.id()
                ))
            })?;
        module.lessons.push(lesson);
    }

    Ok(Some(ContentTree {
        course_id,
        modules,
        revision,
    }))
}

/// Lesson ids of one course; also used inside enrollment transactions.
pub(crate) fn load_lesson_ids(
    conn: &Connection,
    course_id: CourseId,
) -> RepoResult<HashSet<LessonId>> {
    let mut stmt = conn.prepare("SELECT lesson_id FROM course_lessons WHERE course_id = ?1;")?;
    let mut rows = stmt.query([course_id.to_string()])?;
    let mut ids = HashSet::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.insert(parse_uuid(&value, "course_lessons.lesson_id")?);
    }
    Ok(ids)
}

fn replace_tree(conn: &Connection, tree: &ContentTree) -> RepoResult<()> {
    let course_id = tree.course_id.to_string();
    conn.execute("DELETE FROM course_lessons WHERE course_id = ?1;", [&course_id])?;
    conn.execute("DELETE FROM course_modules WHERE course_id = ?1;", [&course_id])?;

    for (module_order, module) in tree.modules.iter().enumerate() {
        conn.execute(
            "INSERT INTO course_modules (module_id, course_id, title, sort_order)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                module.id().to_string(),
                course_id,
                module.title,
                module_order as i64
            ],
        )?;

        for (lesson_order, lesson) in module.lessons.iter().enumerate() {
            conn.execute(
                "INSERT INTO course_lessons (
                    lesson_id,
                    module_id,
                    course_id,
                    title,
                    kind,
                    body,
                    duration_min,
                    is_preview,
                    sort_order
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    lesson.id().to_string(),
                    module.id().to_string(),
                    course_id,
                    lesson.title,
                    lesson.kind().as_str(),
                    lesson.body.payload(),
                    i64::from(lesson.duration_min),
                    bool_to_int(lesson.is_preview),
                    lesson_order as i64,
                ],
            )?;
        }
    }

    conn.execute(
        "UPDATE content_trees
         SET revision = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE course_id = ?1;",
        params![course_id, tree.revision],
    )?;
    conn.execute(
        "UPDATE courses
         SET updated_at = (strftime('%s', 'now') * 1000)
         WHERE course_id = ?1;",
        [&course_id],
    )?;
    Ok(())
}

fn parse_lesson_row(row: &Row<'_>) -> RepoResult<Lesson> {
    let id_text: String = row.get("lesson_id")?;
    let id = parse_uuid(&id_text, "course_lessons.lesson_id")?;

    let kind_text: String = row.get("kind")?;
    let kind = LessonKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid lesson kind `{kind_text}` in course_lessons.kind"
        ))
    })?;

    let duration: i64 = row.get("duration_min")?;
    let duration_min = u32::try_from(duration).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid duration `{duration}` in course_lessons.duration_min"
        ))
    })?;

    Ok(Lesson::restore(
        id,
        row.get::<_, String>("title")?,
        LessonBody::from_parts(kind, row.get("body")?),
        duration_min,
        parse_flag(row.get("is_preview")?, "course_lessons.is_preview")?,
    ))
}
