use crate::model::{MS_PER_HOUR, Ms, TimeInterval};

/// Every course slot lasts exactly this long.
pub const COURSE_DURATION_MS: Ms = MS_PER_HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalError {
    StartNotBeforeEnd,
    WrongDuration,
}

impl std::fmt::Display for IntervalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalError::StartNotBeforeEnd => write!(f, "start must precede end"),
            IntervalError::WrongDuration => write!(f, "duration must be exactly one hour"),
        }
    }
}

impl std::error::Error for IntervalError {}

/// Structural check of a proposed slot: ordered, and exactly one hour to the millisecond.
pub fn validate(interval: &TimeInterval) -> Result<(), IntervalError> {
    if interval.start >= interval.end {
        return Err(IntervalError::StartNotBeforeEnd);
    }
    if interval.duration_ms() != COURSE_DURATION_MS {
        return Err(IntervalError::WrongDuration);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MS_PER_MINUTE, MS_PER_SECOND};

    const H: Ms = MS_PER_HOUR;
    const M: Ms = MS_PER_MINUTE;

    #[test]
    fn exactly_one_hour_is_valid_anywhere_in_the_day() {
        for start_hour in 0..23 {
            let start = start_hour * H;
            assert_eq!(validate(&TimeInterval::new(start, start + H)), Ok(()));
        }
        let odd = 8 * H + 17 * M + 3 * MS_PER_SECOND;
        assert_eq!(validate(&TimeInterval::new(odd, odd + H)), Ok(()));
    }

    #[test]
    fn half_hour_is_rejected_for_duration() {
        let i = TimeInterval::new(9 * H + 30 * M, 10 * H);
        assert_eq!(validate(&i), Err(IntervalError::WrongDuration));
        assert_eq!(
            validate(&i).unwrap_err().to_string(),
            "duration must be exactly one hour"
        );
    }

    #[test]
    fn no_tolerance_around_the_hour() {
        assert_eq!(
            validate(&TimeInterval::new(9 * H, 10 * H + 1)),
            Err(IntervalError::WrongDuration)
        );
        assert_eq!(
            validate(&TimeInterval::new(9 * H, 10 * H - 1)),
            Err(IntervalError::WrongDuration)
        );
        assert_eq!(
            validate(&TimeInterval::new(9 * H, 11 * H)),
            Err(IntervalError::WrongDuration)
        );
    }

    #[test]
    fn reversed_or_empty_is_rejected_for_ordering() {
        assert_eq!(
            validate(&TimeInterval::new(10 * H, 9 * H)),
            Err(IntervalError::StartNotBeforeEnd)
        );
        assert_eq!(
            validate(&TimeInterval::new(9 * H, 9 * H)),
            Err(IntervalError::StartNotBeforeEnd)
        );
        assert_eq!(
            IntervalError::StartNotBeforeEnd.to_string(),
            "start must precede end"
        );
    }
}
