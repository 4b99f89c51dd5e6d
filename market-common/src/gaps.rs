//! Session-gap detection
//!
//! Gaps are expected trading sessions with no stored bar. Detection is a
//! set difference against the calendar; missing sessions are then merged
//! into maximal contiguous runs so repair issues one provider request per
//! run instead of one per day.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::calendar;

/// A maximal run of consecutive missing trading sessions.
///
/// `start` and `end` are both trading sessions; a weekend between two
/// missing sessions does not break the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRun {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Number of missing sessions covered by this run
    pub sessions: usize,
}

/// Expected sessions in `[start, end]` with no observed counterpart,
/// ascending.
///
/// A symbol with no observed sessions at all yields the entire expected
/// set: a fresh symbol treats the whole range as missing.
pub fn missing_sessions(
    start: NaiveDate,
    end: NaiveDate,
    observed: &[NaiveDate],
) -> Vec<NaiveDate> {
    let observed: HashSet<NaiveDate> = observed.iter().copied().collect();
    calendar::expected_sessions(start, end)
        .into_iter()
        .filter(|session| !observed.contains(session))
        .collect()
}

/// Merge an ascending list of missing sessions into maximal contiguous
/// runs of trading sessions.
pub fn merge_into_runs(missing: &[NaiveDate]) -> Vec<SessionRun> {
    let mut runs: Vec<SessionRun> = Vec::new();

    for &session in missing {
        match runs.last_mut() {
            Some(run) if calendar::next_session(run.end) == session => {
                run.end = session;
                run.sessions += 1;
            }
            _ => runs.push(SessionRun {
                start: session,
                end: session,
                sessions: 1,
            }),
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_missing_wednesday_only() {
        // Week of Mon 2024-03-04; bars stored Mon, Tue, Thu, Fri
        let observed = vec![
            date(2024, 3, 4),
            date(2024, 3, 5),
            date(2024, 3, 7),
            date(2024, 3, 8),
        ];
        let missing = missing_sessions(date(2024, 3, 4), date(2024, 3, 10), &observed);
        assert_eq!(missing, vec![date(2024, 3, 6)]);
    }

    #[test]
    fn test_no_gaps_reports_empty() {
        let observed = vec![date(2024, 3, 4), date(2024, 3, 5)];
        let missing = missing_sessions(date(2024, 3, 4), date(2024, 3, 5), &observed);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_empty_store_treats_whole_range_as_missing() {
        let missing = missing_sessions(date(2024, 3, 4), date(2024, 3, 8), &[]);
        assert_eq!(missing.len(), 5);
        assert_eq!(missing[0], date(2024, 3, 4));
        assert_eq!(missing[4], date(2024, 3, 8));
    }

    #[test]
    fn test_observed_weekend_date_is_ignored() {
        // A stray Saturday row does not mask any expected session
        let observed = vec![date(2024, 3, 2)];
        let missing = missing_sessions(date(2024, 3, 1), date(2024, 3, 4), &observed);
        assert_eq!(missing, vec![date(2024, 3, 1), date(2024, 3, 4)]);
    }

    #[test]
    fn test_runs_merge_across_weekend() {
        // Fri and Mon are consecutive trading sessions
        let missing = vec![date(2024, 3, 8), date(2024, 3, 11)];
        let runs = merge_into_runs(&missing);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start, date(2024, 3, 8));
        assert_eq!(runs[0].end, date(2024, 3, 11));
        assert_eq!(runs[0].sessions, 2);
    }

    #[test]
    fn test_runs_split_on_present_session() {
        // Tue present, so Mon and Wed-Thu form two runs
        let missing = vec![date(2024, 3, 4), date(2024, 3, 6), date(2024, 3, 7)];
        let runs = merge_into_runs(&missing);
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].start, runs[0].end), (date(2024, 3, 4), date(2024, 3, 4)));
        assert_eq!((runs[1].start, runs[1].end), (date(2024, 3, 6), date(2024, 3, 7)));
        assert_eq!(runs[1].sessions, 2);
    }

    #[test]
    fn test_empty_missing_yields_no_runs() {
        assert!(merge_into_runs(&[]).is_empty());
    }
}
