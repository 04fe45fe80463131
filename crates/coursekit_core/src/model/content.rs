//! Course content tree model: ordered modules holding ordered lessons.
//!
//! # Responsibility
//! - Define the module/lesson hierarchy owned 1:1 by a course.
//! - Provide shape validation and in-memory edit primitives.
//!
//! # Invariants
//! - Module order and lesson order are significant and only change through
//!   an explicit reorder.
//! - Ids are private and minted by constructors, so no edit path can change
//!   the id of an existing module or lesson.
//! - Titles are labels, not identifiers; siblings may share a title.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::model::course::CourseId;

/// Stable module identifier.
pub type ModuleId = Uuid;

/// Stable lesson identifier, the join key used by enrollment progress.
pub type LessonId = Uuid;

pub const DEFAULT_MODULE_TITLE: &str = "New Module";
pub const DEFAULT_VIDEO_LESSON_TITLE: &str = "New Video Lecture";
pub const DEFAULT_TEXT_LESSON_TITLE: &str = "New Note";

/// Lesson presentation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonKind {
    Video,
    Text,
}

impl LessonKind {
    /// Stable storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Text => "text",
        }
    }

    /// Parses storage value; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(Self::Video),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Title used when an author adds a lesson without naming it.
    pub fn default_title(self) -> &'static str {
        match self {
            Self::Video => DEFAULT_VIDEO_LESSON_TITLE,
            Self::Text => DEFAULT_TEXT_LESSON_TITLE,
        }
    }
}

/// Lesson payload, tagged by kind.
///
/// The stored string is never rewritten by the engine: video URLs are kept
/// verbatim even when the player cannot embed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LessonBody {
    Video { url: String },
    Text { body: String },
}

impl LessonBody {
    /// Empty payload for a freshly added lesson.
    pub fn empty(kind: LessonKind) -> Self {
        Self::from_parts(kind, String::new())
    }

    /// Builds a payload from kind + raw string (storage shape).
    pub fn from_parts(kind: LessonKind, payload: String) -> Self {
        match kind {
            LessonKind::Video => Self::Video { url: payload },
            LessonKind::Text => Self::Text { body: payload },
        }
    }

    pub fn kind(&self) -> LessonKind {
        match self {
            Self::Video { .. } => LessonKind::Video,
            Self::Text { .. } => LessonKind::Text,
        }
    }

    /// Raw payload string (URL or text body).
    pub fn payload(&self) -> &str {
        match self {
            Self::Video { url } => url,
            Self::Text { body } => body,
        }
    }

    /// Replaces the payload while keeping the kind.
    pub fn set_payload(&mut self, payload: impl Into<String>) {
        *self = Self::from_parts(self.kind(), payload.into());
    }

    /// Retags the payload under another kind, keeping the string unchanged.
    pub fn retag(&mut self, kind: LessonKind) {
        if self.kind() == kind {
            return;
        }
        let payload = std::mem::take(match self {
            Self::Video { url } => url,
            Self::Text { body } => body,
        });
        *self = Self::from_parts(kind, payload);
    }
}

/// One lesson inside a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    id: LessonId,
    pub title: String,
    pub body: LessonBody,
    /// Duration estimate in minutes.
    pub duration_min: u32,
    /// Readable without enrollment when the course is published.
    pub is_preview: bool,
}

impl Lesson {
    /// Creates a lesson with a freshly minted id and empty payload.
    pub fn new(kind: LessonKind, title: impl Into<String>) -> Self {
        Self::restore(Uuid::new_v4(), title, LessonBody::empty(kind), 0, false)
    }

    /// Rebuilds a lesson with a known id (storage read path).
    pub(crate) fn restore(
        id: LessonId,
        title: impl Into<String>,
        body: LessonBody,
        duration_min: u32,
        is_preview: bool,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            body,
            duration_min,
            is_preview,
        }
    }

    pub fn id(&self) -> LessonId {
        self.id
    }

    pub fn kind(&self) -> LessonKind {
        self.body.kind()
    }
}

/// One titled group of lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    id: ModuleId,
    pub title: String,
    pub lessons: Vec<Lesson>,
}

impl Module {
    /// Creates an empty module with a freshly minted id.
    pub fn new(title: impl Into<String>) -> Self {
        Self::restore(Uuid::new_v4(), title, Vec::new())
    }

    pub(crate) fn restore(id: ModuleId, title: impl Into<String>, lessons: Vec<Lesson>) -> Self {
        Self {
            id,
            title: title.into(),
            lessons,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }
}

/// Full content hierarchy of one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTree {
    pub course_id: CourseId,
    pub modules: Vec<Module>,
    /// Incremented on every committed save.
    pub revision: i64,
}

impl ContentTree {
    /// Empty tree for a new course.
    pub fn new(course_id: CourseId) -> Self {
        Self {
            course_id,
            modules: Vec::new(),
            revision: 0,
        }
    }

    /// All lessons in display order.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|module| module.lessons.iter())
    }

    /// Current lesson ids in display order.
    pub fn lesson_ids(&self) -> Vec<LessonId> {
        self.lessons().map(Lesson::id).collect()
    }

    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|module| module.lessons.len()).sum()
    }

    pub fn total_duration_min(&self) -> u64 {
        self.lessons().map(|lesson| u64::from(lesson.duration_min)).sum()
    }

    pub fn has_preview_lessons(&self) -> bool {
        self.lessons().any(|lesson| lesson.is_preview)
    }

    pub fn contains_lesson(&self, lesson_id: LessonId) -> bool {
        self.lesson(lesson_id).is_some()
    }

    pub fn module(&self, module_id: ModuleId) -> Option<&Module> {
        self.modules.iter().find(|module| module.id == module_id)
    }

    pub fn module_mut(&mut self, module_id: ModuleId) -> Option<&mut Module> {
        self.modules.iter_mut().find(|module| module.id == module_id)
    }

    pub fn lesson(&self, lesson_id: LessonId) -> Option<&Lesson> {
        self.lessons().find(|lesson| lesson.id == lesson_id)
    }

    pub fn lesson_mut(&mut self, lesson_id: LessonId) -> Option<&mut Lesson> {
        self.modules
            .iter_mut()
            .flat_map(|module| module.lessons.iter_mut())
            .find(|lesson| lesson.id == lesson_id)
    }

    /// Removes one module and its lessons, returning it when present.
    pub fn remove_module(&mut self, module_id: ModuleId) -> Option<Module> {
        let index = self.modules.iter().position(|module| module.id == module_id)?;
        Some(self.modules.remove(index))
    }

    /// Removes one lesson wherever it lives, returning it when present.
    pub fn remove_lesson(&mut self, lesson_id: LessonId) -> Option<Lesson> {
        self.modules.iter_mut().find_map(|module| {
            let index = module
                .lessons
                .iter()
                .position(|lesson| lesson.id == lesson_id)?;
            Some(module.lessons.remove(index))
        })
    }

    /// Reorders modules to exactly `ordering`.
    ///
    /// Rejects anything that is not a permutation of the current module ids;
    /// on rejection the tree is left untouched.
    pub fn reorder_modules(&mut self, ordering: &[ModuleId]) -> Result<(), ContentValidationError> {
        let reordered = permute(
            std::mem::take(&mut self.modules),
            ordering,
            Module::id,
            "modules",
        );
        match reordered {
            Ok(modules) => {
                self.modules = modules;
                Ok(())
            }
            Err((original, err)) => {
                self.modules = original;
                Err(err)
            }
        }
    }

    /// Reorders lessons inside one module to exactly `ordering`.
    ///
    /// Returns `Ok(false)` when the module does not exist.
    pub fn reorder_lessons(
        &mut self,
        module_id: ModuleId,
        ordering: &[LessonId],
    ) -> Result<bool, ContentValidationError> {
        let Some(module_index) = self.modules.iter().position(|module| module.id == module_id)
        else {
            return Ok(false);
        };
        let module = &mut self.modules[module_index];
        let field = format!("modules[{module_index}].lessons");
        match permute(std::mem::take(&mut module.lessons), ordering, Lesson::id, &field) {
            Ok(lessons) => {
                module.lessons = lessons;
                Ok(true)
            }
            Err((original, err)) => {
                module.lessons = original;
                Err(err)
            }
        }
    }
}

/// Why a tree failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    /// Title is empty after trimming.
    BlankTitle,
    /// Duration below zero.
    NegativeDuration,
    /// Duration does not fit the stored minute range.
    DurationOutOfRange,
    /// Same id appears twice in one tree.
    DuplicateId,
    /// Reorder input is not a permutation of existing ids.
    NotAPermutation,
}

impl ValidationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlankTitle => "must not be blank",
            Self::NegativeDuration => "must be >= 0",
            Self::DurationOutOfRange => "exceeds the maximum duration in minutes",
            Self::DuplicateId => "duplicate id",
            Self::NotAPermutation => "must be a permutation of existing ids",
        }
    }
}

/// Validation failure pinned to the offending field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentValidationError {
    /// Field path such as `modules[1].lessons[0].title`.
    pub field: String,
    pub reason: ValidationReason,
}

impl ContentValidationError {
    pub fn new(field: impl Into<String>, reason: ValidationReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

impl Display for ContentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.reason.as_str())
    }
}

impl Error for ContentValidationError {}

/// Validates content tree shape.
///
/// # Rules
/// - Every module and lesson title is non-blank.
/// - Module ids and lesson ids are unique within the tree.
///
/// Kind and duration bounds are enforced by the types themselves.
pub fn validate(tree: &ContentTree) -> Result<(), ContentValidationError> {
    let mut module_ids = HashSet::new();
    let mut lesson_ids = HashSet::new();

    for (module_index, module) in tree.modules.iter().enumerate() {
        if !module_ids.insert(module.id) {
            return Err(ContentValidationError::new(
                format!("modules[{module_index}].id"),
                ValidationReason::DuplicateId,
            ));
        }
        if is_blank(&module.title) {
            return Err(ContentValidationError::new(
                format!("modules[{module_index}].title"),
                ValidationReason::BlankTitle,
            ));
        }

        for (lesson_index, lesson) in module.lessons.iter().enumerate() {
            if !lesson_ids.insert(lesson.id) {
                return Err(ContentValidationError::new(
                    format!("modules[{module_index}].lessons[{lesson_index}].id"),
                    ValidationReason::DuplicateId,
                ));
            }
            if is_blank(&lesson.title) {
                return Err(ContentValidationError::new(
                    format!("modules[{module_index}].lessons[{lesson_index}].title"),
                    ValidationReason::BlankTitle,
                ));
            }
        }
    }

    Ok(())
}

/// Converts a caller-supplied duration into the stored unsigned form.
pub fn normalize_duration(field: &str, minutes: i64) -> Result<u32, ContentValidationError> {
    if minutes < 0 {
        return Err(ContentValidationError::new(
            field,
            ValidationReason::NegativeDuration,
        ));
    }
    u32::try_from(minutes)
        .map_err(|_| ContentValidationError::new(field, ValidationReason::DurationOutOfRange))
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn permute<T, I>(
    items: Vec<T>,
    ordering: &[I],
    id_of: impl Fn(&T) -> I,
    field: &str,
) -> Result<Vec<T>, (Vec<T>, ContentValidationError)>
where
    I: Eq + std::hash::Hash + Copy,
{
    let not_permutation =
        || ContentValidationError::new(field, ValidationReason::NotAPermutation);

    let unique: HashSet<I> = ordering.iter().copied().collect();
    if ordering.len() != items.len()
        || unique.len() != ordering.len()
        || !items.iter().all(|item| unique.contains(&id_of(item)))
    {
        return Err((items, not_permutation()));
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut reordered = Vec::with_capacity(slots.len());
    for id in ordering {
        let position = slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|item| id_of(item) == *id));
        match position.and_then(|index| slots[index].take()) {
            Some(item) => reordered.push(item),
            None => {
                // Unreachable after the membership check; restore input order.
                let mut restored = reordered;
                restored.extend(slots.into_iter().flatten());
                return Err((restored, not_permutation()));
            }
        }
    }
    Ok(reordered)
}
