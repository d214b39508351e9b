//! Admission decisions. Each function reads what it needs from the store and either
//! authorizes the caller's single write or returns the first rule that refused it.
//! None of them write.

use crate::model::*;
use crate::store::Store;

use super::availability::{find_conflict, ConflictPolicy};
use super::error::{Rejection, RegistrarError};
use super::interval::validate;

/// Interval check, then teacher availability against every course the store says
/// `course.teacher_id` teaches. On update that set still holds the course's own
/// current slot.
pub(crate) async fn admit_course<S: Store + ?Sized>(
    store: &S,
    policy: ConflictPolicy,
    course: &Course,
) -> Result<(), RegistrarError> {
    validate(&course.interval).map_err(Rejection::InvalidTime)?;

    let taught = store.courses_taught_by(course.teacher_id).await?;
    let committed = taught.iter().map(|c| &c.interval);
    if let Some(conflict) = find_conflict(policy, committed, &course.interval) {
        return Err(Rejection::TeacherNotAvailable {
            teacher_id: course.teacher_id,
            conflict,
        }
        .into());
    }
    Ok(())
}

/// Existence (student first), capacity, then student availability against the
/// target course's slot. Returns the course on success.
pub(crate) async fn admit_enrollment<S: Store + ?Sized>(
    store: &S,
    policy: ConflictPolicy,
    enrollment: &Enrollment,
) -> Result<Course, RegistrarError> {
    let Enrollment { student_id, course_id } = *enrollment;

    if store.get_student(student_id).await?.is_none() {
        return Err(Rejection::StudentNotFound(student_id).into());
    }
    let course = store
        .get_course(course_id)
        .await?
        .ok_or(Rejection::CourseNotFound(course_id))?;

    let enrolled = store.count_enrollments(course_id).await?;
    let max_size = store.course_max_size(course_id).await?;
    // Exact equality: a store already past max_size isn't flagged here.
    if enrolled == max_size {
        return Err(Rejection::CourseFull { course_id, max_size }.into());
    }

    let schedule = store.student_schedule(student_id).await?;
    if let Some(conflict) = find_conflict(policy, &schedule, &course.interval) {
        return Err(Rejection::StudentNotAvailable { student_id, conflict }.into());
    }
    Ok(course)
}
