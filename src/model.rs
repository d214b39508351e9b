use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds since midnight. The only time type.
pub type Ms = i64;

/// Caller-supplied identifier of a course, student or teacher.
pub type Id = i64;

pub const MS_PER_SECOND: Ms = 1_000;
pub const MS_PER_MINUTE: Ms = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: Ms = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: Ms = 24 * MS_PER_HOUR;

/// Parse `HH:MM`, `HH:MM:SS` or `HH:MM:SS.mmm` into milliseconds since midnight.
pub fn parse_time_of_day(s: &str) -> Option<Ms> {
    let s = s.trim();
    let (clock, millis) = match s.split_once('.') {
        Some((clock, frac)) => {
            if frac.is_empty() || frac.len() > 3 {
                return None;
            }
            // "5" is half a second, not five milliseconds
            let padded = format!("{frac:0<3}");
            (clock, digits(&padded)?)
        }
        None => (s, 0),
    };

    let mut parts = clock.split(':');
    let hours = digits(parts.next()?)?;
    let minutes = digits(parts.next()?)?;
    let seconds = match parts.next() {
        Some(p) => digits(p)?,
        None => 0,
    };
    if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    Some(hours * MS_PER_HOUR + minutes * MS_PER_MINUTE + seconds * MS_PER_SECOND + millis)
}

fn digits(part: &str) -> Option<Ms> {
    if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Render milliseconds since midnight as `HH:MM:SS`, with `.mmm` only when non-zero.
pub fn format_time_of_day(t: Ms) -> String {
    let hours = t / MS_PER_HOUR;
    let minutes = (t % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (t % MS_PER_MINUTE) / MS_PER_SECOND;
    let millis = t % MS_PER_SECOND;
    if millis == 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

/// A course's scheduled slot. Unvalidated until it has been through
/// `registrar::validate`, which is the only place the one-hour rule lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: Ms,
    pub end: Ms,
}

impl TimeInterval {
    pub fn new(start: Ms, end: Ms) -> Self {
        Self { start, end }
    }

    /// Build from two `HH:MM[:SS]` strings.
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Some(Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?))
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Same start or same end. Touching intervals (one's end is the other's start) don't count.
    pub fn shares_boundary(&self, other: &TimeInterval) -> bool {
        self.start == other.start || self.end == other.end
    }

    /// Half-open overlap of `[start, end)`.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            format_time_of_day(self.start),
            format_time_of_day(self.end)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: Id,
    pub name: String,
    pub teacher_id: Id,
    pub interval: TimeInterval,
    /// Seats available; at least 1 once admitted.
    pub max_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Id,
    pub name: String,
}

/// "Student occupies the course's interval." A relation, not an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: Id,
    pub course_id: Id,
}

impl Enrollment {
    pub fn new(student_id: Id, course_id: Id) -> Self {
        Self { student_id, course_id }
    }
}

/// Whose schedule is being looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Teacher(Id),
    Student(Id),
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Teacher(id) => write!(f, "teacher {id}"),
            Party::Student(id) => write!(f, "student {id}"),
        }
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CourseAdded {
        course: Course,
    },
    CourseUpdated {
        course: Course,
    },
    CourseDeleted {
        id: Id,
    },
    StudentAdded {
        student: Student,
    },
    StudentDeleted {
        id: Id,
    },
    EnrollmentRegistered {
        student_id: Id,
        course_id: Id,
    },
    EnrollmentDeleted {
        student_id: Id,
        course_id: Id,
    },
}
