mod admission;
mod availability;
mod error;
mod interval;
mod locks;

pub use availability::{find_conflict, is_available, ConflictPolicy};
pub use error::{Rejection, RejectionKind, RegistrarError};
pub use interval::{validate, IntervalError, COURSE_DURATION_MS};
pub use locks::{AdmissionLocks, LockKey};

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::limits::*;
use crate::model::*;
use crate::store::Store;

use admission::{admit_course, admit_enrollment};

/// Course and enrollment service for one tenant.
///
/// Holds no per-request state: the store is injected, and the only shared structure
/// is the lock table that serializes admissions touching the same resources.
pub struct Registrar<S> {
    store: Arc<S>,
    policy: ConflictPolicy,
    locks: AdmissionLocks,
}

impl<S: Store> Registrar<S> {
    pub fn new(store: Arc<S>, policy: ConflictPolicy) -> Self {
        Self {
            store,
            policy,
            locks: AdmissionLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    // ── Courses ──────────────────────────────────────────────

    pub async fn list_courses(&self) -> Result<Vec<Course>, RegistrarError> {
        let courses = self.store.list_courses().await?;
        tracing::debug!(
            "get all courses: {}",
            serde_json::to_string(&courses).unwrap_or_default()
        );
        Ok(courses)
    }

    pub async fn add_course(&self, course: Course) -> Result<(), RegistrarError> {
        let _guard = self
            .locks
            .acquire(&[LockKey::Course(course.id), LockKey::Teacher(course.teacher_id)])
            .await;
        let result: Result<(), RegistrarError> = async {
            check_course_fields(&course)?;
            if self.store.get_course(course.id).await?.is_some() {
                return Err(Rejection::CourseExists(course.id).into());
            }
            admit_course(self.store.as_ref(), self.policy, &course).await?;
            self.store.add_course(course.clone()).await?;
            Ok(())
        }
        .await;
        record("add_course", &result, || {
            format!("course {} ({})", course.id, course.interval)
        });
        result
    }

    /// Replaces every field of an existing course. The new slot and teacher are
    /// admitted exactly like a new course; an invalid slot stops there.
    pub async fn update_course(&self, course: Course) -> Result<(), RegistrarError> {
        let _guard = self
            .locks
            .acquire(&[LockKey::Course(course.id), LockKey::Teacher(course.teacher_id)])
            .await;
        let result: Result<(), RegistrarError> = async {
            check_course_fields(&course)?;
            if self.store.get_course(course.id).await?.is_none() {
                return Err(Rejection::CourseNotFound(course.id).into());
            }
            admit_course(self.store.as_ref(), self.policy, &course).await?;
            self.store.update_course(course.clone()).await?;
            Ok(())
        }
        .await;
        record("update_course", &result, || {
            format!("course {} ({})", course.id, course.interval)
        });
        result
    }

    /// Removes the course and its enrollments. No time checks.
    pub async fn delete_course(&self, id: Id) -> Result<(), RegistrarError> {
        let _guard = self.locks.acquire(&[LockKey::Course(id)]).await;
        let result: Result<(), RegistrarError> = async {
            if self.store.get_course(id).await?.is_none() {
                return Err(Rejection::CourseNotFound(id).into());
            }
            self.store.delete_course(id).await?;
            Ok(())
        }
        .await;
        record("delete_course", &result, || format!("course {id}"));
        result
    }

    // ── Students ─────────────────────────────────────────────

    pub async fn list_students(&self) -> Result<Vec<Student>, RegistrarError> {
        Ok(self.store.list_students().await?)
    }

    pub async fn add_student(&self, student: Student) -> Result<(), RegistrarError> {
        let _guard = self.locks.acquire(&[LockKey::Student(student.id)]).await;
        let result: Result<(), RegistrarError> = async {
            if student.name.len() > MAX_NAME_LEN {
                return Err(Rejection::InvalidStudent("name too long").into());
            }
            if self.store.get_student(student.id).await?.is_some() {
                return Err(Rejection::StudentExists(student.id).into());
            }
            self.store.add_student(student.clone()).await?;
            Ok(())
        }
        .await;
        record("add_student", &result, || format!("student {}", student.id));
        result
    }

    /// Removes the student and their enrollments.
    pub async fn delete_student(&self, id: Id) -> Result<(), RegistrarError> {
        let _guard = self.locks.acquire(&[LockKey::Student(id)]).await;
        let result: Result<(), RegistrarError> = async {
            if self.store.get_student(id).await?.is_none() {
                return Err(Rejection::StudentNotFound(id).into());
            }
            self.store.delete_student(id).await?;
            Ok(())
        }
        .await;
        record("delete_student", &result, || format!("student {id}"));
        result
    }

    // ── Enrollments ──────────────────────────────────────────

    pub async fn list_enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError> {
        let enrollments = self.store.list_enrollments().await?;
        tracing::debug!(
            "get all enrollments: {}",
            serde_json::to_string(&enrollments).unwrap_or_default()
        );
        Ok(enrollments)
    }

    pub async fn enroll(&self, enrollment: Enrollment) -> Result<(), RegistrarError> {
        let _guard = self
            .locks
            .acquire(&[
                LockKey::Course(enrollment.course_id),
                LockKey::Student(enrollment.student_id),
            ])
            .await;
        let result: Result<(), RegistrarError> = async {
            admit_enrollment(self.store.as_ref(), self.policy, &enrollment).await?;
            self.store.register_enrollment(enrollment).await?;
            Ok(())
        }
        .await;
        record("enroll", &result, || {
            format!("student {} to course {}", enrollment.student_id, enrollment.course_id)
        });
        result
    }

    /// Deletes an enrollment without re-validating anything.
    ///
    /// Both sides are looked up and each missing one is a not-found, but the deletion
    /// still goes to the store whenever the course exists, even if the student
    /// doesn't. When both are missing the student is the one reported.
    pub async fn withdraw(&self, enrollment: Enrollment) -> Result<(), RegistrarError> {
        let _guard = self
            .locks
            .acquire(&[
                LockKey::Course(enrollment.course_id),
                LockKey::Student(enrollment.student_id),
            ])
            .await;
        let result: Result<(), RegistrarError> = async {
            let student = self.store.get_student(enrollment.student_id).await?;
            let course = self.store.get_course(enrollment.course_id).await?;

            let missing_student = student
                .is_none()
                .then_some(Rejection::StudentNotFound(enrollment.student_id));
            if course.is_none() {
                return Err(missing_student
                    .unwrap_or(Rejection::CourseNotFound(enrollment.course_id))
                    .into());
            }
            self.store.delete_enrollment(enrollment).await?;
            match missing_student {
                Some(rejection) => Err(rejection.into()),
                None => Ok(()),
            }
        }
        .await;
        record("withdraw", &result, || {
            format!("student {} from course {}", enrollment.student_id, enrollment.course_id)
        });
        result
    }

    // ── Derived views ────────────────────────────────────────

    /// Committed intervals of a teacher (courses taught) or a student (courses attended).
    pub async fn schedule(&self, party: Party) -> Result<Vec<TimeInterval>, RegistrarError> {
        let intervals = match party {
            Party::Teacher(id) => self
                .store
                .courses_taught_by(id)
                .await?
                .into_iter()
                .map(|c| c.interval)
                .collect(),
            Party::Student(id) => self.store.student_schedule(id).await?,
        };
        Ok(intervals)
    }

    pub async fn enrolled_count(&self, course_id: Id) -> Result<u32, RegistrarError> {
        Ok(self.store.count_enrollments(course_id).await?)
    }
}

fn check_course_fields(course: &Course) -> Result<(), Rejection> {
    if course.name.len() > MAX_NAME_LEN {
        return Err(Rejection::InvalidCourse("name too long"));
    }
    if course.max_size == 0 {
        return Err(Rejection::InvalidCourse("max size must be at least 1"));
    }
    if course.max_size > MAX_COURSE_SIZE {
        return Err(Rejection::InvalidCourse("max size too large"));
    }
    Ok(())
}

/// Log and count one admission outcome.
fn record(
    operation: &'static str,
    result: &Result<(), RegistrarError>,
    subject: impl FnOnce() -> String,
) {
    let outcome = match result {
        Ok(()) => {
            info!("{operation} accepted: {}", subject());
            "accepted"
        }
        Err(RegistrarError::Rejected(r)) => {
            warn!("{operation} rejected ({}): {r}", r.kind().label());
            r.kind().label()
        }
        Err(e @ RegistrarError::Store(_)) => {
            error!("{operation} failed: {e}");
            e.outcome_label()
        }
    };
    metrics::counter!(
        crate::observability::ADMISSIONS_TOTAL,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}
