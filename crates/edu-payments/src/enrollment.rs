//! Enrollment Granting
//!
//! The single place enrollments are created, for both free courses and
//! approved payments.

use edu_core::{Enrollment, EnrollmentInsert, Identity, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::checkout::parse_course_id;
use crate::error::{PaymentError, Result};

/// Whether a grant created a row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    Created,
    AlreadyEnrolled,
}

/// Enrollment service
pub struct EnrollmentService {
    store: Arc<dyn Store>,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Ensure `student_id` is enrolled in `course_id`.
    ///
    /// Checks first, then inserts; a concurrent insert that wins the race is
    /// caught by the store's uniqueness constraint and reported as
    /// `AlreadyEnrolled`.
    pub async fn grant(&self, student_id: Uuid, course_id: Uuid) -> Result<Grant> {
        if self
            .store
            .find_enrollment(student_id, course_id)
            .await?
            .is_some()
        {
            return Ok(Grant::AlreadyEnrolled);
        }

        let enrollment = Enrollment::new(student_id, course_id);
        match self.store.insert_enrollment(&enrollment).await? {
            EnrollmentInsert::Created => {
                tracing::info!(
                    enrollment_id = %enrollment.id,
                    student_id = %student_id,
                    course_id = %course_id,
                    "Enrollment created"
                );
                Ok(Grant::Created)
            }
            EnrollmentInsert::AlreadyExists => {
                tracing::debug!(
                    student_id = %student_id,
                    course_id = %course_id,
                    "Enrollment already present at insert"
                );
                Ok(Grant::AlreadyEnrolled)
            }
        }
    }

    /// Direct enrollment into a free course
    pub async fn enroll_free(
        &self,
        identity: &Identity,
        course_id: Option<&str>,
    ) -> Result<Enrollment> {
        let course_id = parse_course_id(course_id)?;
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Course".into()))?;

        if course.is_paid() {
            return Err(PaymentError::InvalidState(
                "This course is paid; use checkout to enroll.".into(),
            ));
        }

        match self.grant(identity.user_id, course.id).await? {
            Grant::AlreadyEnrolled => Err(PaymentError::InvalidState(
                "You are already enrolled in this course.".into(),
            )),
            Grant::Created => self
                .store
                .find_enrollment(identity.user_id, course.id)
                .await?
                .ok_or_else(|| PaymentError::Storage("enrollment vanished after insert".into())),
        }
    }
}
