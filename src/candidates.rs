use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::reference::{AgencyRecord, TractId};

pub const DEFAULT_THRESHOLD_MINUTES: u32 = 20;
pub const MIN_THRESHOLD_MINUTES: u32 = 5;
pub const MAX_THRESHOLD_MINUTES: u32 = 120;
pub const THRESHOLD_STEP_MINUTES: u32 = 5;
pub const DEFAULT_WIDEN_BY_MINUTES: u32 = 40;
pub const MAX_WIDEN_BY_MINUTES: u32 = 120;

/// Travel-time threshold in minutes: 5 to 120 in steps of 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Threshold(u32);

impl Threshold {
    pub fn new(minutes: u32) -> Result<Self, QueryError> {
        let in_range = (MIN_THRESHOLD_MINUTES..=MAX_THRESHOLD_MINUTES).contains(&minutes);
        if in_range && minutes % THRESHOLD_STEP_MINUTES == 0 {
            Ok(Threshold(minutes))
        } else {
            Err(QueryError::InvalidThreshold(minutes))
        }
    }

    pub fn minutes(self) -> u32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold(DEFAULT_THRESHOLD_MINUTES)
    }
}

impl TryFrom<u32> for Threshold {
    type Error = QueryError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Threshold::new(minutes)
    }
}

impl From<Threshold> for u32 {
    fn from(threshold: Threshold) -> u32 {
        threshold.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidates {
    pub rows: Vec<AgencyRecord>,
    /// Set when nothing fell within the requested threshold and the search
    /// was retried at this wider limit.
    pub widened_to: Option<u32>,
}

/// Rows for `tract` whose travel time is at most `minutes`. Rows without a
/// travel time never qualify, and [`TractId::UNKNOWN`] matches nothing.
pub fn within_threshold(rows: &[AgencyRecord], tract: TractId, minutes: u32) -> Vec<AgencyRecord> {
    if tract == TractId::UNKNOWN {
        return Vec::new();
    }
    let limit = f64::from(minutes);
    rows.iter()
        .filter(|row| row.tract == tract)
        .filter(|row| row.travel_time.is_some_and(|t| t <= limit))
        .cloned()
        .collect()
}

/// Select candidates for a resolved tract, widening once by `widen_by`
/// minutes when the requested threshold finds nothing.
pub fn select_candidates(
    rows: &[AgencyRecord],
    tract: TractId,
    threshold: Threshold,
    widen_by: u32,
) -> Candidates {
    let nearby = within_threshold(rows, tract, threshold.minutes());
    if !nearby.is_empty() {
        return Candidates {
            rows: nearby,
            widened_to: None,
        };
    }

    let widened = threshold.minutes().saturating_add(widen_by);
    tracing::debug!(%tract, threshold = threshold.minutes(), widened, "widening travel-time search");
    Candidates {
        rows: within_threshold(rows, tract, widened),
        widened_to: Some(widened),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(name: &str, tract: i64, minutes: Option<f64>) -> AgencyRecord {
        AgencyRecord {
            name: name.to_string(),
            address: format!("{name} address"),
            tract: TractId(tract),
            travel_time: minutes,
            ..Default::default()
        }
    }

    fn rows() -> Vec<AgencyRecord> {
        vec![
            row("A", 1, Some(8.0)),
            row("B", 1, Some(20.0)),
            row("C", 1, Some(35.0)),
            row("D", 2, Some(5.0)),
            row("E", 1, None),
            row("F", 3, Some(46.0)),
            row("G", 3, Some(59.5)),
            row("H", 3, Some(60.0)),
            row("I", 3, Some(75.0)),
        ]
    }

    #[test]
    fn threshold_bounds() {
        assert!(Threshold::new(5).is_ok());
        assert!(Threshold::new(120).is_ok());
        assert!(Threshold::new(0).is_err());
        assert!(Threshold::new(125).is_err());
        assert!(Threshold::new(22).is_err());
        assert_eq!(Threshold::default().minutes(), 20);
    }

    #[test]
    fn selects_rows_for_the_tract_within_the_threshold() {
        let candidates =
            select_candidates(&rows(), TractId(1), Threshold::new(20).unwrap(), DEFAULT_WIDEN_BY_MINUTES);
        let names: Vec<_> = candidates.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(candidates.widened_to, None);
    }

    #[test]
    fn widens_once_when_nothing_is_close() {
        let candidates =
            select_candidates(&rows(), TractId(3), Threshold::new(20).unwrap(), DEFAULT_WIDEN_BY_MINUTES);
        let names: Vec<_> = candidates.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["F", "G", "H"]);
        assert_eq!(candidates.widened_to, Some(60));
    }

    #[test]
    fn widening_does_not_escalate_further() {
        let candidates =
            select_candidates(&rows(), TractId(3), Threshold::new(5).unwrap(), DEFAULT_WIDEN_BY_MINUTES);
        assert!(candidates.rows.is_empty());
        assert_eq!(candidates.widened_to, Some(45));
    }

    #[test]
    fn unknown_tract_matches_nothing() {
        let mut rows = rows();
        rows.push(row("Far Away Pantry", -1, Some(3.0)));
        let candidates = select_candidates(
            &rows,
            TractId::UNKNOWN,
            Threshold::new(20).unwrap(),
            DEFAULT_WIDEN_BY_MINUTES,
        );
        assert!(candidates.rows.is_empty());
        assert_eq!(candidates.widened_to, Some(60));
    }

    #[test]
    fn widening_saturates_instead_of_overflowing() {
        let candidates =
            select_candidates(&rows(), TractId(4), Threshold::new(20).unwrap(), u32::MAX);
        assert!(candidates.rows.is_empty());
        assert_eq!(candidates.widened_to, Some(u32::MAX));
    }

    #[test]
    fn larger_thresholds_return_supersets() {
        let rows = rows();
        for tract in [1, 2, 3, 4] {
            for minutes in (MIN_THRESHOLD_MINUTES..=MAX_THRESHOLD_MINUTES).step_by(5) {
                let narrow = within_threshold(&rows, TractId(tract), minutes);
                let wide = within_threshold(&rows, TractId(tract), minutes + DEFAULT_WIDEN_BY_MINUTES);
                assert!(narrow.iter().all(|r| wide.contains(r)));
            }
        }
    }
}
