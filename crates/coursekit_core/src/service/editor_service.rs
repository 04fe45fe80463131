//! Content authoring use-case service.
//!
//! # Responsibility
//! - Add, rename, remove and reorder modules and lessons of a course.
//! - Apply single edits and batches as one all-or-nothing tree write.
//!
//! # Invariants
//! - New modules and lessons get freshly minted ids; existing ids never change.
//! - Edits never touch enrollments. Completed ids of removed lessons become
//!   stale references that progress computation ignores.
//! - A rejected edit leaves the persisted tree byte-for-byte unchanged.

use crate::model::content::{
    normalize_duration, ContentTree, ContentValidationError, Lesson, LessonId, LessonKind,
    Module, ModuleId, DEFAULT_MODULE_TITLE,
};
use crate::model::course::CourseId;
use crate::repo::content_repo::ContentRepository;
use crate::repo::{EntityKey, RepoError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// One field edit applied by `update_lesson`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonUpdate {
    Title(String),
    /// Video URL or text body, depending on the lesson kind.
    Body(String),
    /// Minutes; negative values are rejected.
    DurationMin(i64),
    /// Retags the existing payload under the new kind.
    Kind(LessonKind),
    Preview(bool),
}

impl LessonUpdate {
    fn field_name(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Body(_) => "body",
            Self::DurationMin(_) => "duration_min",
            Self::Kind(_) => "kind",
            Self::Preview(_) => "is_preview",
        }
    }
}

/// One authoring edit; batches of these commit or fail together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEdit {
    AddModule {
        title: Option<String>,
    },
    RenameModule {
        module_id: ModuleId,
        title: String,
    },
    RemoveModule {
        module_id: ModuleId,
    },
    ReorderModules {
        ordering: Vec<ModuleId>,
    },
    AddLesson {
        module_id: ModuleId,
        kind: LessonKind,
        title: Option<String>,
    },
    UpdateLesson {
        lesson_id: LessonId,
        update: LessonUpdate,
    },
    RemoveLesson {
        lesson_id: LessonId,
    },
    ReorderLessons {
        module_id: ModuleId,
        ordering: Vec<LessonId>,
    },
}

impl ContentEdit {
    fn op_name(&self) -> &'static str {
        match self {
            Self::AddModule { .. } => "add_module",
            Self::RenameModule { .. } => "rename_module",
            Self::RemoveModule { .. } => "remove_module",
            Self::ReorderModules { .. } => "reorder_modules",
            Self::AddLesson { .. } => "add_lesson",
            Self::UpdateLesson { .. } => "update_lesson",
            Self::RemoveLesson { .. } => "remove_lesson",
            Self::ReorderLessons { .. } => "reorder_lessons",
        }
    }
}

/// Errors from authoring operations.
#[derive(Debug)]
pub enum EditorError {
    CourseNotFound(CourseId),
    ModuleNotFound(ModuleId),
    LessonNotFound(LessonId),
    /// Resulting tree would be invalid; nothing was saved.
    Validation(ContentValidationError),
    /// Repository-level failure.
    Repo(RepoError),
}

impl EditorError {
    /// Whether this maps to a 404-equivalent for callers.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CourseNotFound(_) | Self::ModuleNotFound(_) | Self::LessonNotFound(_)
        )
    }
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::ModuleNotFound(id) => write!(f, "module not found: {id}"),
            Self::LessonNotFound(id) => write!(f, "lesson not found: {id}"),
            Self::Validation(err) => write!(f, "invalid content: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EditorError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityKey::Course(id)) => Self::CourseNotFound(id),
            RepoError::NotFound(EntityKey::Module(id)) => Self::ModuleNotFound(id),
            RepoError::NotFound(EntityKey::Lesson(id)) => Self::LessonNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ContentValidationError> for EditorError {
    fn from(value: ContentValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Content authoring facade.
pub struct EditorService<R: ContentRepository> {
    repo: R,
}

impl<R: ContentRepository> EditorService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Loads the latest committed tree of one course.
    pub fn get_tree(&self, course_id: CourseId) -> Result<ContentTree, EditorError> {
        self.repo
            .get_tree(course_id)?
            .ok_or(EditorError::CourseNotFound(course_id))
    }

    /// Appends an empty module. `None` title uses the default label.
    pub fn add_module(
        &self,
        course_id: CourseId,
        title: Option<String>,
    ) -> Result<ModuleId, EditorError> {
        let id = self.run(course_id, ContentEdit::AddModule { title })?;
        id.ok_or(EditorError::CourseNotFound(course_id))
    }

    pub fn rename_module(
        &self,
        module_id: ModuleId,
        title: impl Into<String>,
    ) -> Result<(), EditorError> {
        let course_id = self.course_of_module(module_id)?;
        self.run(
            course_id,
            ContentEdit::RenameModule {
                module_id,
                title: title.into(),
            },
        )?;
        Ok(())
    }

    /// Removes a module with all its lessons. Enrollments are untouched.
    pub fn remove_module(&self, course_id: CourseId, module_id: ModuleId) -> Result<(), EditorError> {
        self.run(course_id, ContentEdit::RemoveModule { module_id })?;
        Ok(())
    }

    /// Reorders modules; `ordering` must be a permutation of current ids.
    pub fn reorder_modules(
        &self,
        course_id: CourseId,
        ordering: Vec<ModuleId>,
    ) -> Result<(), EditorError> {
        self.run(course_id, ContentEdit::ReorderModules { ordering })?;
        Ok(())
    }

    /// Appends a lesson with a fresh id and empty body.
    pub fn add_lesson(
        &self,
        module_id: ModuleId,
        kind: LessonKind,
        title: Option<String>,
    ) -> Result<LessonId, EditorError> {
        let course_id = self.course_of_module(module_id)?;
        let id = self.run(
            course_id,
            ContentEdit::AddLesson {
                module_id,
                kind,
                title,
            },
        )?;
        id.ok_or(EditorError::ModuleNotFound(module_id))
    }

    /// Edits one lesson field in place; the lesson id never changes.
    pub fn update_lesson(
        &self,
        lesson_id: LessonId,
        update: LessonUpdate,
    ) -> Result<Lesson, EditorError> {
        let course_id = self.course_of_lesson(lesson_id)?;
        let (_, tree) = self.commit(
            course_id,
            vec![ContentEdit::UpdateLesson { lesson_id, update }],
        )?;
        tree.lesson(lesson_id)
            .cloned()
            .ok_or(EditorError::LessonNotFound(lesson_id))
    }

    pub fn remove_lesson(&self, lesson_id: LessonId) -> Result<(), EditorError> {
        let course_id = self.course_of_lesson(lesson_id)?;
        self.run(course_id, ContentEdit::RemoveLesson { lesson_id })?;
        Ok(())
    }

    /// Reorders lessons of one module; `ordering` must be a permutation.
    pub fn reorder_lessons(
        &self,
        module_id: ModuleId,
        ordering: Vec<LessonId>,
    ) -> Result<(), EditorError> {
        let course_id = self.course_of_module(module_id)?;
        self.run(
            course_id,
            ContentEdit::ReorderLessons {
                module_id,
                ordering,
            },
        )?;
        Ok(())
    }

    /// Applies a batch of edits as one write.
    ///
    /// # Contract
    /// - Edits apply in order against the same in-memory tree.
    /// - Any failing edit, or an invalid final tree, discards the whole batch.
    pub fn apply_edits(
        &self,
        course_id: CourseId,
        edits: Vec<ContentEdit>,
    ) -> Result<ContentTree, EditorError> {
        let (_, tree) = self.commit(course_id, edits)?;
        Ok(tree)
    }

    fn run(&self, course_id: CourseId, edit: ContentEdit) -> Result<Option<Uuid>, EditorError> {
        let (minted, _) = self.commit(course_id, vec![edit])?;
        Ok(minted.into_iter().next())
    }

    fn commit(
        &self,
        course_id: CourseId,
        edits: Vec<ContentEdit>,
    ) -> Result<(Vec<Uuid>, ContentTree), EditorError> {
        let ops = edits
            .iter()
            .map(ContentEdit::op_name)
            .collect::<Vec<_>>()
            .join(",");

        let result = self.repo.edit_tree(course_id, |tree| {
            let mut minted = Vec::new();
            for edit in edits {
                if let Some(id) = apply_edit(tree, edit)? {
                    minted.push(id);
                }
            }
            Ok::<_, EditorError>(minted)
        });

        match &result {
            Ok((_, tree)) => info!(
                "event=content_edit module=editor status=ok course_id={} ops={} revision={}",
                course_id, ops, tree.revision
            ),
            Err(err) => warn!(
                "event=content_edit module=editor status=error course_id={} ops={} error={}",
                course_id, ops, err
            ),
        }
        result
    }

    fn course_of_module(&self, module_id: ModuleId) -> Result<CourseId, EditorError> {
        self.repo
            .course_of_module(module_id)?
            .ok_or(EditorError::ModuleNotFound(module_id))
    }

    fn course_of_lesson(&self, lesson_id: LessonId) -> Result<CourseId, EditorError> {
        self.repo
            .course_of_lesson(lesson_id)?
            .ok_or(EditorError::LessonNotFound(lesson_id))
    }
}

/// Applies one edit to an in-memory tree, returning any minted id.
///
/// Title blankness is left to tree validation so the error carries the
/// full field path of the offending node.
pub fn apply_edit(tree: &mut ContentTree, edit: ContentEdit) -> Result<Option<Uuid>, EditorError> {
    match edit {
        ContentEdit::AddModule { title } => {
            let module = Module::new(
                title
                    .map(|value| value.trim().to_string())
                    .unwrap_or_else(|| DEFAULT_MODULE_TITLE.to_string()),
            );
            let id = module.id();
            tree.modules.push(module);
            Ok(Some(id))
        }
        ContentEdit::RenameModule { module_id, title } => {
            let module = tree
                .module_mut(module_id)
                .ok_or(EditorError::ModuleNotFound(module_id))?;
            module.title = title.trim().to_string();
            Ok(None)
        }
        ContentEdit::RemoveModule { module_id } => {
            tree.remove_module(module_id)
                .ok_or(EditorError::ModuleNotFound(module_id))?;
            Ok(None)
        }
        ContentEdit::ReorderModules { ordering } => {
            tree.reorder_modules(&ordering)?;
            Ok(None)
        }
        ContentEdit::AddLesson {
            module_id,
            kind,
            title,
        } => {
            let module = tree
                .module_mut(module_id)
                .ok_or(EditorError::ModuleNotFound(module_id))?;
            let lesson = Lesson::new(
                kind,
                title
                    .map(|value| value.trim().to_string())
                    .unwrap_or_else(|| kind.default_title().to_string()),
            );
            let id = lesson.id();
            module.lessons.push(lesson);
            Ok(Some(id))
        }
        ContentEdit::UpdateLesson { lesson_id, update } => {
            let field = update.field_name();
            let lesson = tree
                .lesson_mut(lesson_id)
                .ok_or(EditorError::LessonNotFound(lesson_id))?;
            match update {
                LessonUpdate::Title(title) => lesson.title = title.trim().to_string(),
                LessonUpdate::Body(payload) => lesson.body.set_payload(payload),
                LessonUpdate::DurationMin(minutes) => {
                    lesson.duration_min = normalize_duration(field, minutes)?;
                }
                LessonUpdate::Kind(kind) => lesson.body.retag(kind),
                LessonUpdate::Preview(is_preview) => lesson.is_preview = is_preview,
            }
            Ok(None)
        }
        ContentEdit::RemoveLesson { lesson_id } => {
            tree.remove_lesson(lesson_id)
                .ok_or(EditorError::LessonNotFound(lesson_id))?;
            Ok(None)
        }
        ContentEdit::ReorderLessons {
            module_id,
            ordering,
        } => {
            if !tree.reorder_lessons(module_id, &ordering)? {
                return Err(EditorError::ModuleNotFound(module_id));
            }
            Ok(None)
        }
    }
}
