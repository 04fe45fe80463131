//! Course registry use-case service.
//!
//! # Responsibility
//! - Create draft courses and flip their publication/disable switches.
//!
//! # Invariants
//! - Course titles and author ids are non-blank after trim.
//! - Disabling never touches enrollments; it only changes access decisions.

use crate::model::course::{Course, CourseId};
use crate::repo::course_repo::CourseRepository;
use crate::repo::{EntityKey, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from course registry operations.
#[derive(Debug)]
pub enum CourseServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Author id is blank after trim.
    InvalidAuthor,
    /// Target course does not exist.
    CourseNotFound(CourseId),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for CourseServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "course title must not be blank"),
            Self::InvalidAuthor => write!(f, "course author id must not be blank"),
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CourseServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CourseServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityKey::Course(course_id)) => Self::CourseNotFound(course_id),
            other => Self::Repo(other),
        }
    }
}

/// Course registry facade.
pub struct CourseService<R: CourseRepository> {
    repo: R,
}

impl<R: CourseRepository> CourseService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one draft course with an empty content tree.
    pub fn create_course(
        &self,
        title: impl Into<String>,
        author_id: &str,
    ) -> Result<Course, CourseServiceError> {
        let title = title.into();
        let title = title.trim();
        if title.is_empty() {
            return Err(CourseServiceError::InvalidTitle);
        }
        let author_id = author_id.trim();
        if author_id.is_empty() {
            return Err(CourseServiceError::InvalidAuthor);
        }

        let course = self.repo.create_course(title, author_id)?;
        info!(
            "event=course_create module=course status=ok course_id={}",
            course.id
        );
        Ok(course)
    }

    pub fn get_course(&self, course_id: CourseId) -> Result<Course, CourseServiceError> {
        self.repo
            .get_course(course_id)?
            .ok_or(CourseServiceError::CourseNotFound(course_id))
    }

    pub fn list_by_author(&self, author_id: &str) -> Result<Vec<Course>, CourseServiceError> {
        self.repo.list_by_author(author_id).map_err(Into::into)
    }

    pub fn publish(&self, course_id: CourseId) -> Result<(), CourseServiceError> {
        self.repo.set_published(course_id, true)?;
        info!("event=course_publish module=course status=ok course_id={course_id} published=true");
        Ok(())
    }

    pub fn unpublish(&self, course_id: CourseId) -> Result<(), CourseServiceError> {
        self.repo.set_published(course_id, false)?;
        info!("event=course_publish module=course status=ok course_id={course_id} published=false");
        Ok(())
    }

    /// Soft-disables a course. Enrollments stay; access flips to `none`.
    pub fn disable(&self, course_id: CourseId) -> Result<(), CourseServiceError> {
        self.repo.set_disabled(course_id, true)?;
        info!("event=course_disable module=course status=ok course_id={course_id}");
        Ok(())
    }

    pub fn enable(&self, course_id: CourseId) -> Result<(), CourseServiceError> {
        self.repo.set_disabled(course_id, false)?;
        info!("event=course_enable module=course status=ok course_id={course_id}");
        Ok(())
    }
}
