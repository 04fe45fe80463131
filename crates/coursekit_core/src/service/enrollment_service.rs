//! Enrollment ledger use-case service.
//!
//! # Responsibility
//! - Single entry point for the payment/registration collaborator to grant
//!   access, plus lookup and administrative revocation.
//!
//! # Invariants
//! - Enrolling an already-enrolled pair returns the stored record unchanged.
//! - Revocation removes access and the progress record together.

use crate::model::course::CourseId;
use crate::model::enrollment::Enrollment;
use crate::repo::enrollment_repo::{EnrollOutcome, EnrollmentRepository};
use crate::repo::{EntityKey, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from enrollment ledger operations.
#[derive(Debug)]
pub enum EnrollmentError {
    /// Learner id is blank after trim.
    InvalidLearnerId,
    CourseNotFound(CourseId),
    /// No enrollment exists for the pair.
    EnrollmentNotFound {
        learner_id: String,
        course_id: CourseId,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for EnrollmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLearnerId => write!(f, "learner id must not be blank"),
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::EnrollmentNotFound {
                learner_id,
                course_id,
            } => write!(
                f,
                "enrollment not found: learner {learner_id} course {course_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EnrollmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EnrollmentError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityKey::Course(id)) => Self::CourseNotFound(id),
            RepoError::NotFound(EntityKey::Enrollment {
                learner_id,
                course_id,
            }) => Self::EnrollmentNotFound {
                learner_id,
                course_id,
            },
            other => Self::Repo(other),
        }
    }
}

/// Enrollment ledger facade.
pub struct EnrollmentService<R: EnrollmentRepository> {
    repo: R,
}

impl<R: EnrollmentRepository> EnrollmentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Grants access to one course.
    ///
    /// # Contract
    /// - First call returns `EnrollOutcome::Created` with progress 0.
    /// - Later calls for the same pair return `EnrollOutcome::Existing` with
    ///   the stored record, never an error.
    pub fn enroll(
        &self,
        learner_id: &str,
        course_id: CourseId,
    ) -> Result<EnrollOutcome, EnrollmentError> {
        let learner_id = normalize_learner_id(learner_id)?;
        let outcome = self.repo.create_enrollment(learner_id, course_id)?;
        info!(
            "event=enrollment_create module=enrollment status=ok course_id={} created={}",
            course_id,
            outcome.was_created()
        );
        Ok(outcome)
    }

    pub fn get(&self, learner_id: &str, course_id: CourseId) -> Result<Enrollment, EnrollmentError> {
        let learner_id = normalize_learner_id(learner_id)?;
        self.repo
            .get_enrollment(learner_id, course_id)?
            .ok_or_else(|| EnrollmentError::EnrollmentNotFound {
                learner_id: learner_id.to_string(),
                course_id,
            })
    }

    pub fn is_enrolled(&self, learner_id: &str, course_id: CourseId) -> Result<bool, EnrollmentError> {
        let learner_id = normalize_learner_id(learner_id)?;
        Ok(self.repo.get_enrollment(learner_id, course_id)?.is_some())
    }

    pub fn list_for_learner(&self, learner_id: &str) -> Result<Vec<Enrollment>, EnrollmentError> {
        let learner_id = normalize_learner_id(learner_id)?;
        self.repo.list_for_learner(learner_id).map_err(Into::into)
    }

    /// Revokes access (refund/cancellation). Progress is discarded.
    pub fn revoke(&self, learner_id: &str, course_id: CourseId) -> Result<(), EnrollmentError> {
        let learner_id = normalize_learner_id(learner_id)?;
        self.repo.revoke_enrollment(learner_id, course_id)?;
        info!("event=enrollment_revoke module=enrollment status=ok course_id={course_id}");
        Ok(())
    }
}

fn normalize_learner_id(value: &str) -> Result<&str, EnrollmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EnrollmentError::InvalidLearnerId);
    }
    Ok(trimmed)
}
