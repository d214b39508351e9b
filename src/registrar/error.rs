use crate::model::{Id, TimeInterval};
use crate::store::StoreError;

use super::interval::IntervalError;

/// Status category a caller uses to pick its transport-level response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    BadInput,
    NotFound,
    Conflict,
}

impl RejectionKind {
    pub fn label(self) -> &'static str {
        match self {
            RejectionKind::BadInput => "bad_input",
            RejectionKind::NotFound => "not_found",
            RejectionKind::Conflict => "conflict",
        }
    }
}

/// Why an admission was refused. Nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    InvalidTime(IntervalError),
    InvalidCourse(&'static str),
    InvalidStudent(&'static str),
    StudentNotFound(Id),
    CourseNotFound(Id),
    CourseExists(Id),
    StudentExists(Id),
    TeacherNotAvailable {
        teacher_id: Id,
        conflict: TimeInterval,
    },
    StudentNotAvailable {
        student_id: Id,
        conflict: TimeInterval,
    },
    CourseFull {
        course_id: Id,
        max_size: u32,
    },
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::InvalidTime(_)
            | Rejection::InvalidCourse(_)
            | Rejection::InvalidStudent(_) => RejectionKind::BadInput,
            Rejection::StudentNotFound(_) | Rejection::CourseNotFound(_) => {
                RejectionKind::NotFound
            }
            Rejection::CourseExists(_)
            | Rejection::StudentExists(_)
            | Rejection::TeacherNotAvailable { .. }
            | Rejection::StudentNotAvailable { .. }
            | Rejection::CourseFull { .. } => RejectionKind::Conflict,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::InvalidTime(e) => write!(f, "invalid time: {e}"),
            Rejection::InvalidCourse(msg) => write!(f, "invalid course: {msg}"),
            Rejection::InvalidStudent(msg) => write!(f, "invalid student: {msg}"),
            Rejection::StudentNotFound(id) => {
                write!(f, "the student with ID {id} could not be found")
            }
            Rejection::CourseNotFound(id) => {
                write!(f, "the course with ID {id} could not be found")
            }
            Rejection::CourseExists(id) => write!(f, "a course with ID {id} already exists"),
            Rejection::StudentExists(id) => write!(f, "a student with ID {id} already exists"),
            Rejection::TeacherNotAvailable { teacher_id, conflict } => write!(
                f,
                "teacher {teacher_id} not available in this period of time -> {conflict}"
            ),
            Rejection::StudentNotAvailable { student_id, conflict } => write!(
                f,
                "student {student_id} not available in this period of time -> {conflict}"
            ),
            Rejection::CourseFull { course_id, max_size } => write!(
                f,
                "course {course_id} is full ({max_size} seats), \
                 can't register any new student in it"
            ),
        }
    }
}

impl std::error::Error for Rejection {}

#[derive(Debug)]
pub enum RegistrarError {
    Rejected(Rejection),
    /// Unrecoverable for this request; never retried.
    Store(StoreError),
}

impl RegistrarError {
    /// The rejection, if this wasn't a store fault.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            RegistrarError::Rejected(r) => Some(r),
            RegistrarError::Store(_) => None,
        }
    }

    pub(crate) fn outcome_label(&self) -> &'static str {
        match self {
            RegistrarError::Rejected(r) => r.kind().label(),
            RegistrarError::Store(_) => "store_fault",
        }
    }
}

impl From<Rejection> for RegistrarError {
    fn from(r: Rejection) -> Self {
        RegistrarError::Rejected(r)
    }
}

impl From<StoreError> for RegistrarError {
    fn from(e: StoreError) -> Self {
        RegistrarError::Store(e)
    }
}

impl std::fmt::Display for RegistrarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrarError::Rejected(r) => write!(f, "{r}"),
            RegistrarError::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for RegistrarError {}
