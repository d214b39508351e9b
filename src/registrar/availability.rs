use crate::model::TimeInterval;

/// What counts as a clash between a committed interval and a proposed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Clash only when the two share their start or share their end. A proposal that
    /// overlaps without sharing either boundary is accepted.
    #[default]
    SharedBoundary,
    /// Clash on any half-open overlap. Accepts strictly less than `SharedBoundary` does
    /// for one-hour slots, so switching to it changes admission outcomes.
    Overlap,
}

impl ConflictPolicy {
    pub fn clashes(self, committed: &TimeInterval, proposed: &TimeInterval) -> bool {
        match self {
            ConflictPolicy::SharedBoundary => committed.shares_boundary(proposed),
            ConflictPolicy::Overlap => committed.overlaps(proposed),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConflictPolicy::SharedBoundary => "boundary",
            ConflictPolicy::Overlap => "overlap",
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boundary" | "shared_boundary" => Ok(ConflictPolicy::SharedBoundary),
            "overlap" => Ok(ConflictPolicy::Overlap),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}

/// First committed interval that clashes with `proposed`, in iteration order.
pub fn find_conflict<'a>(
    policy: ConflictPolicy,
    committed: impl IntoIterator<Item = &'a TimeInterval>,
    proposed: &TimeInterval,
) -> Option<TimeInterval> {
    committed
        .into_iter()
        .find(|existing| policy.clashes(existing, proposed))
        .copied()
}

/// True when nothing in `committed` shares a start or an end with `proposed`.
pub fn is_available(committed: &[TimeInterval], proposed: &TimeInterval) -> bool {
    find_conflict(ConflictPolicy::SharedBoundary, committed, proposed).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MS_PER_HOUR, MS_PER_MINUTE, Ms};

    const H: Ms = MS_PER_HOUR;
    const M: Ms = MS_PER_MINUTE;

    fn slot(start: Ms, end: Ms) -> TimeInterval {
        TimeInterval::new(start, end)
    }

    #[test]
    fn empty_schedule_is_available() {
        assert!(is_available(&[], &slot(9 * H, 10 * H)));
    }

    #[test]
    fn identical_slot_conflicts() {
        assert!(!is_available(&[slot(9 * H, 10 * H)], &slot(9 * H, 10 * H)));
    }

    #[test]
    fn shared_start_alone_conflicts() {
        assert!(!is_available(&[slot(9 * H, 10 * H)], &slot(9 * H, 9 * H + 30 * M)));
    }

    #[test]
    fn shared_end_alone_conflicts() {
        assert!(!is_available(&[slot(9 * H, 10 * H)], &slot(9 * H + 30 * M, 10 * H)));
    }

    #[test]
    fn back_to_back_slots_are_available() {
        // committed.end == proposed.start is never compared
        assert!(is_available(&[slot(9 * H, 10 * H)], &slot(10 * H, 11 * H)));
        assert!(is_available(&[slot(10 * H, 11 * H)], &slot(9 * H, 10 * H)));
    }

    #[test]
    fn overlap_without_shared_boundary_is_available() {
        let committed = [slot(9 * H, 10 * H)];
        assert!(is_available(&committed, &slot(9 * H + 30 * M, 10 * H + 30 * M)));
        assert!(is_available(&committed, &slot(8 * H + 1, 9 * H + 1)));
    }

    #[test]
    fn one_millisecond_apart_is_not_shared() {
        assert!(is_available(&[slot(9 * H, 10 * H)], &slot(9 * H + 1, 10 * H + 1)));
    }

    #[test]
    fn any_member_of_the_schedule_can_conflict() {
        let committed = [slot(8 * H, 9 * H), slot(11 * H, 12 * H), slot(14 * H, 15 * H)];
        assert!(!is_available(&committed, &slot(14 * H, 15 * H)));
        assert!(is_available(&committed, &slot(12 * H, 13 * H)));
    }

    #[test]
    fn find_conflict_reports_the_committed_interval() {
        let committed = [slot(8 * H, 9 * H), slot(9 * H, 10 * H)];
        let proposed = slot(9 * H, 9 * H + 30 * M);
        assert_eq!(
            find_conflict(ConflictPolicy::SharedBoundary, &committed, &proposed),
            Some(slot(9 * H, 10 * H))
        );
    }

    #[test]
    fn overlap_policy_catches_straddling_slots() {
        let committed = [slot(9 * H, 10 * H)];
        let straddling = slot(9 * H + 30 * M, 10 * H + 30 * M);
        assert_eq!(
            find_conflict(ConflictPolicy::Overlap, &committed, &straddling),
            Some(slot(9 * H, 10 * H))
        );
        assert_eq!(
            find_conflict(ConflictPolicy::Overlap, &committed, &slot(10 * H, 11 * H)),
            None
        );
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("boundary".parse::<ConflictPolicy>(), Ok(ConflictPolicy::SharedBoundary));
        assert_eq!(" Overlap ".parse::<ConflictPolicy>(), Ok(ConflictPolicy::Overlap));
        assert!("fuzzy".parse::<ConflictPolicy>().is_err());
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::SharedBoundary);
    }
}
