use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::limits::*;
use crate::model::*;
use crate::wal::Wal;

use super::{Store, StoreError, StoreResult};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Every append that is already queued when the first one arrives
/// rides along in the same batch and shares a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        respond_batch(batch, &result);

        // Compaction must see the batch above on disk before it swaps files.
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let append_result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-written bytes don't leak into the next batch.
    let flush_result = wal.flush_sync();
    append_result.and(flush_result)
}

fn respond_batch(batch: Vec<PendingAppend>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

// ── Store ────────────────────────────────────────────────

/// In-memory tables made durable by a write-ahead log.
///
/// Every mutation is appended to the WAL first and applied to the maps only once the
/// append is fsynced. Opening replays the log.
pub struct LocalStore {
    courses: DashMap<Id, Course>,
    students: DashMap<Id, Student>,
    /// course id → enrolled student ids
    rosters: DashMap<Id, BTreeSet<Id>>,
    /// student id → ids of courses they attend
    timetables: DashMap<Id, BTreeSet<Id>>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Shared by append+apply, exclusive for compaction, so a snapshot never
    /// falls between a durable append and its application.
    commit_gate: RwLock<()>,
}

impl LocalStore {
    /// Replay `wal_path` and start its writer task. Must be called inside a tokio runtime.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            courses: DashMap::new(),
            students: DashMap::new(),
            rosters: DashMap::new(),
            timetables: DashMap::new(),
            wal_tx,
            commit_gate: RwLock::new(()),
        };
        for event in &events {
            store.apply(event);
        }
        Ok(store)
    }

    fn apply(&self, event: &Event) {
        match event {
            Event::CourseAdded { course } | Event::CourseUpdated { course } => {
                self.courses.insert(course.id, course.clone());
            }
            Event::CourseDeleted { id } => {
                self.courses.remove(id);
                if let Some((_, roster)) = self.rosters.remove(id) {
                    for student_id in roster {
                        if let Some(mut courses) = self.timetables.get_mut(&student_id) {
                            courses.remove(id);
                        }
                    }
                }
            }
            Event::StudentAdded { student } => {
                self.students.insert(student.id, student.clone());
            }
            Event::StudentDeleted { id } => {
                self.students.remove(id);
                if let Some((_, courses)) = self.timetables.remove(id) {
                    for course_id in courses {
                        if let Some(mut roster) = self.rosters.get_mut(&course_id) {
                            roster.remove(id);
                        }
                    }
                }
            }
            Event::EnrollmentRegistered { student_id, course_id } => {
                self.rosters.entry(*course_id).or_default().insert(*student_id);
                self.timetables.entry(*student_id).or_default().insert(*course_id);
            }
            Event::EnrollmentDeleted { student_id, course_id } => {
                if let Some(mut roster) = self.rosters.get_mut(course_id) {
                    roster.remove(student_id);
                }
                if let Some(mut courses) = self.timetables.get_mut(student_id) {
                    courses.remove(course_id);
                }
            }
        }
    }

    async fn wal_append(&self, event: &Event) -> StoreResult<()> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    /// WAL-append then apply.
    async fn commit(&self, event: Event) -> StoreResult<()> {
        let _gate = self.commit_gate.read().await;
        self.wal_append(&event).await?;
        self.apply(&event);
        Ok(())
    }

    /// The minimal event sequence that rebuilds the current tables.
    fn snapshot_events(&self) -> Vec<Event> {
        let mut students: Vec<Student> = self.students.iter().map(|e| e.value().clone()).collect();
        students.sort_by_key(|s| s.id);
        let mut courses: Vec<Course> = self.courses.iter().map(|e| e.value().clone()).collect();
        courses.sort_by_key(|c| c.id);

        let mut events: Vec<Event> = Vec::with_capacity(students.len() + courses.len());
        events.extend(students.into_iter().map(|student| Event::StudentAdded { student }));
        events.extend(courses.into_iter().map(|course| Event::CourseAdded { course }));
        events.extend(self.enrollments_sorted().into_iter().map(|e| {
            Event::EnrollmentRegistered {
                student_id: e.student_id,
                course_id: e.course_id,
            }
        }));
        events
    }

    fn enrollments_sorted(&self) -> Vec<Enrollment> {
        let mut all: Vec<Enrollment> = self
            .rosters
            .iter()
            .flat_map(|entry| {
                let course_id = *entry.key();
                entry
                    .value()
                    .iter()
                    .map(|&student_id| Enrollment::new(student_id, course_id))
                    .collect::<Vec<_>>()
            })
            .collect();
        all.sort_by_key(|e| (e.course_id, e.student_id));
        all
    }

    /// Rewrite the WAL as a snapshot of the current state.
    pub async fn compact(&self) -> StoreResult<()> {
        let _gate = self.commit_gate.write().await;
        let events = self.snapshot_events();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let mut courses: Vec<Course> = self.courses.iter().map(|e| e.value().clone()).collect();
        courses.sort_by_key(|c| c.id);
        Ok(courses)
    }

    async fn get_course(&self, id: Id) -> StoreResult<Option<Course>> {
        Ok(self.courses.get(&id).map(|e| e.value().clone()))
    }

    async fn course_max_size(&self, id: Id) -> StoreResult<u32> {
        self.courses
            .get(&id)
            .map(|e| e.value().max_size)
            .ok_or(StoreError::Missing { entity: "course", id })
    }

    async fn courses_taught_by(&self, teacher_id: Id) -> StoreResult<Vec<Course>> {
        let mut taught: Vec<Course> = self
            .courses
            .iter()
            .filter(|e| e.value().teacher_id == teacher_id)
            .map(|e| e.value().clone())
            .collect();
        taught.sort_by_key(|c| c.id);
        Ok(taught)
    }

    async fn student_schedule(&self, student_id: Id) -> StoreResult<Vec<TimeInterval>> {
        let course_ids: Vec<Id> = self
            .timetables
            .get(&student_id)
            .map(|e| e.value().iter().copied().collect())
            .unwrap_or_default();
        Ok(course_ids
            .into_iter()
            .filter_map(|id| self.courses.get(&id).map(|c| c.interval))
            .collect())
    }

    async fn add_course(&self, course: Course) -> StoreResult<()> {
        if self.courses.len() >= MAX_COURSES_PER_TENANT {
            return Err(StoreError::LimitExceeded("too many courses"));
        }
        self.commit(Event::CourseAdded { course }).await
    }

    async fn update_course(&self, course: Course) -> StoreResult<()> {
        if !self.courses.contains_key(&course.id) {
            return Err(StoreError::Missing { entity: "course", id: course.id });
        }
        self.commit(Event::CourseUpdated { course }).await
    }

    async fn delete_course(&self, id: Id) -> StoreResult<()> {
        if !self.courses.contains_key(&id) {
            return Err(StoreError::Missing { entity: "course", id });
        }
        self.commit(Event::CourseDeleted { id }).await
    }

    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        let mut students: Vec<Student> = self.students.iter().map(|e| e.value().clone()).collect();
        students.sort_by_key(|s| s.id);
        Ok(students)
    }

    async fn get_student(&self, id: Id) -> StoreResult<Option<Student>> {
        Ok(self.students.get(&id).map(|e| e.value().clone()))
    }

    async fn add_student(&self, student: Student) -> StoreResult<()> {
        if self.students.len() >= MAX_STUDENTS_PER_TENANT {
            return Err(StoreError::LimitExceeded("too many students"));
        }
        self.commit(Event::StudentAdded { student }).await
    }

    async fn delete_student(&self, id: Id) -> StoreResult<()> {
        if !self.students.contains_key(&id) {
            return Err(StoreError::Missing { entity: "student", id });
        }
        self.commit(Event::StudentDeleted { id }).await
    }

    async fn list_enrollments(&self) -> StoreResult<Vec<Enrollment>> {
        Ok(self.enrollments_sorted())
    }

    async fn count_enrollments(&self, course_id: Id) -> StoreResult<u32> {
        Ok(self
            .rosters
            .get(&course_id)
            .map_or(0, |roster| roster.len() as u32))
    }

    async fn register_enrollment(&self, enrollment: Enrollment) -> StoreResult<()> {
        if !self.students.contains_key(&enrollment.student_id) {
            return Err(StoreError::Missing { entity: "student", id: enrollment.student_id });
        }
        if !self.courses.contains_key(&enrollment.course_id) {
            return Err(StoreError::Missing { entity: "course", id: enrollment.course_id });
        }
        self.commit(Event::EnrollmentRegistered {
            student_id: enrollment.student_id,
            course_id: enrollment.course_id,
        })
        .await
    }

    async fn delete_enrollment(&self, enrollment: Enrollment) -> StoreResult<()> {
        let enrolled = self
            .rosters
            .get(&enrollment.course_id)
            .is_some_and(|roster| roster.contains(&enrollment.student_id));
        if !enrolled {
            return Ok(());
        }
        self.commit(Event::EnrollmentDeleted {
            student_id: enrollment.student_id,
            course_id: enrollment.course_id,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = MS_PER_HOUR;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("unireg_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn course(id: Id, teacher_id: Id, start_hour: Ms) -> Course {
        Course {
            id,
            name: format!("course {id}"),
            teacher_id,
            interval: TimeInterval::new(start_hour * H, (start_hour + 1) * H),
            max_size: 10,
        }
    }

    fn student(id: Id) -> Student {
        Student { id, name: format!("student {id}") }
    }

    #[tokio::test]
    async fn replay_restores_all_tables() {
        let path = test_wal_path("replay.wal");
        {
            let store = LocalStore::open(path.clone()).unwrap();
            store.add_course(course(1, 7, 9)).await.unwrap();
            store.add_course(course(2, 8, 11)).await.unwrap();
            store.add_student(student(3)).await.unwrap();
            store.register_enrollment(Enrollment::new(3, 1)).await.unwrap();
            store.register_enrollment(Enrollment::new(3, 2)).await.unwrap();
            store.delete_enrollment(Enrollment::new(3, 2)).await.unwrap();
        }

        let store = LocalStore::open(path).unwrap();
        assert_eq!(store.list_courses().await.unwrap().len(), 2);
        assert_eq!(store.get_student(3).await.unwrap(), Some(student(3)));
        assert_eq!(store.list_enrollments().await.unwrap(), vec![Enrollment::new(3, 1)]);
        assert_eq!(store.count_enrollments(1).await.unwrap(), 1);
        assert_eq!(store.count_enrollments(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn student_schedule_follows_enrollments() {
        let store = LocalStore::open(test_wal_path("schedule.wal")).unwrap();
        store.add_course(course(1, 7, 9)).await.unwrap();
        store.add_course(course(2, 8, 13)).await.unwrap();
        store.add_student(student(3)).await.unwrap();
        store.register_enrollment(Enrollment::new(3, 1)).await.unwrap();
        store.register_enrollment(Enrollment::new(3, 2)).await.unwrap();

        let schedule = store.student_schedule(3).await.unwrap();
        assert_eq!(
            schedule,
            vec![TimeInterval::new(9 * H, 10 * H), TimeInterval::new(13 * H, 14 * H)]
        );
        assert!(store.student_schedule(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_course_drops_its_enrollments() {
        let store = LocalStore::open(test_wal_path("delete_course.wal")).unwrap();
        store.add_course(course(1, 7, 9)).await.unwrap();
        store.add_student(student(3)).await.unwrap();
        store.register_enrollment(Enrollment::new(3, 1)).await.unwrap();

        store.delete_course(1).await.unwrap();
        assert!(store.list_enrollments().await.unwrap().is_empty());
        assert!(store.student_schedule(3).await.unwrap().is_empty());
        assert!(store.get_course(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_student_drops_their_enrollments() {
        let store = LocalStore::open(test_wal_path("delete_student.wal")).unwrap();
        store.add_course(course(1, 7, 9)).await.unwrap();
        store.add_student(student(3)).await.unwrap();
        store.add_student(student(4)).await.unwrap();
        store.register_enrollment(Enrollment::new(3, 1)).await.unwrap();
        store.register_enrollment(Enrollment::new(4, 1)).await.unwrap();

        store.delete_student(3).await.unwrap();
        assert_eq!(store.count_enrollments(1).await.unwrap(), 1);
        assert_eq!(store.list_enrollments().await.unwrap(), vec![Enrollment::new(4, 1)]);
    }

    #[tokio::test]
    async fn register_requires_both_sides() {
        let store = LocalStore::open(test_wal_path("register_missing.wal")).unwrap();
        store.add_course(course(1, 7, 9)).await.unwrap();

        let result = store.register_enrollment(Enrollment::new(3, 1)).await;
        assert!(matches!(result, Err(StoreError::Missing { entity: "student", id: 3 })));
    }

    #[tokio::test]
    async fn course_max_size_of_missing_course_is_a_store_fault() {
        let store = LocalStore::open(test_wal_path("max_size_missing.wal")).unwrap();
        let result = store.course_max_size(42).await;
        assert!(matches!(result, Err(StoreError::Missing { entity: "course", id: 42 })));
    }

    #[tokio::test]
    async fn deleting_absent_enrollment_writes_nothing() {
        let store = LocalStore::open(test_wal_path("delete_absent.wal")).unwrap();
        store.add_course(course(1, 7, 9)).await.unwrap();
        let before = store.appends_since_compact().await;

        store.delete_enrollment(Enrollment::new(3, 1)).await.unwrap();
        assert_eq!(store.appends_since_compact().await, before);
    }

    #[tokio::test]
    async fn compaction_preserves_state() {
        let path = test_wal_path("compact.wal");
        {
            let store = LocalStore::open(path.clone()).unwrap();
            store.add_course(course(1, 7, 9)).await.unwrap();
            store.add_student(student(3)).await.unwrap();
            for _ in 0..20 {
                store.register_enrollment(Enrollment::new(3, 1)).await.unwrap();
                store.delete_enrollment(Enrollment::new(3, 1)).await.unwrap();
            }
            store.register_enrollment(Enrollment::new(3, 1)).await.unwrap();
            let before = std::fs::metadata(&path).unwrap().len();

            store.compact().await.unwrap();
            assert_eq!(store.appends_since_compact().await, 0);
            let after = std::fs::metadata(&path).unwrap().len();
            assert!(after < before, "compacted WAL should be smaller: {after} < {before}");
        }

        let store = LocalStore::open(path).unwrap();
        assert_eq!(store.list_enrollments().await.unwrap(), vec![Enrollment::new(3, 1)]);
        assert_eq!(store.get_course(1).await.unwrap(), Some(course(1, 7, 9)));
    }
}
