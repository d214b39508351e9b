//! The persistence collaborator the registrar admits writes against.
//!
//! The registrar never mutates state itself: it reads committed schedules and counts
//! through [`Store`], decides, and then issues exactly one write. Any `StoreError` is
//! fatal for the request that hit it.

mod local;

pub use local::LocalStore;

use async_trait::async_trait;

use crate::model::*;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    /// The write-ahead log could not be appended to or compacted.
    Wal(String),
    /// A record the caller was entitled to expect is gone.
    Missing { entity: &'static str, id: Id },
    LimitExceeded(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
            StoreError::Missing { entity, id } => write!(f, "{entity} {id} missing from store"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_courses(&self) -> StoreResult<Vec<Course>>;

    async fn get_course(&self, id: Id) -> StoreResult<Option<Course>>;

    async fn course_max_size(&self, id: Id) -> StoreResult<u32>;

    /// Source of a teacher's committed intervals.
    async fn courses_taught_by(&self, teacher_id: Id) -> StoreResult<Vec<Course>>;

    /// Intervals of every course the student is enrolled in.
    async fn student_schedule(&self, student_id: Id) -> StoreResult<Vec<TimeInterval>>;

    async fn add_course(&self, course: Course) -> StoreResult<()>;

    async fn update_course(&self, course: Course) -> StoreResult<()>;

    /// Removes the course and every enrollment in it.
    async fn delete_course(&self, id: Id) -> StoreResult<()>;

    async fn list_students(&self) -> StoreResult<Vec<Student>>;

    async fn get_student(&self, id: Id) -> StoreResult<Option<Student>>;

    async fn add_student(&self, student: Student) -> StoreResult<()>;

    /// Removes the student and every enrollment they hold.
    async fn delete_student(&self, id: Id) -> StoreResult<()>;

    async fn list_enrollments(&self) -> StoreResult<Vec<Enrollment>>;

    async fn count_enrollments(&self, course_id: Id) -> StoreResult<u32>;

    async fn register_enrollment(&self, enrollment: Enrollment) -> StoreResult<()>;

    /// Deleting an enrollment that doesn't exist is a no-op.
    async fn delete_enrollment(&self, enrollment: Enrollment) -> StoreResult<()>;
}
