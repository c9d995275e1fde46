use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::Weekday;
use serde::Deserialize;

use super::{normalized_headers, open_csv, require_column, AgencyKey};
use crate::error::LoadError;

#[derive(Debug, Deserialize)]
struct RawScheduleRow {
    #[serde(default)]
    agency: Option<String>,
    #[serde(default)]
    day: Option<String>,
    #[serde(default)]
    hour: Option<String>,
    #[serde(default)]
    window: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub agency: AgencyKey,
    pub day: Weekday,
    pub hour: Option<String>,
    pub window: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        Self::from_reader(open_csv(path)?, path)
    }

    pub fn from_reader<R: Read>(mut rdr: csv::Reader<R>, path: &Path) -> Result<Self, LoadError> {
        let csv_err = |source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let headers = normalized_headers(rdr.headers().map_err(csv_err)?);
        require_column(&headers, "agency", path)?;
        require_column(&headers, "day", path)?;
        rdr.set_headers(headers);

        let mut entries = Vec::new();
        let mut dropped = 0usize;
        for result in rdr.deserialize::<RawScheduleRow>() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable schedule row: {}", e);
                    dropped += 1;
                    continue;
                }
            };

            // Rows without a recognisable weekday (the source carries an "Ist"
            // sentinel) carry no schedule information.
            let Some(day) = row.day.as_deref().and_then(parse_weekday) else {
                dropped += 1;
                continue;
            };
            let Some(agency) = row.agency.as_deref().map(AgencyKey::new) else {
                dropped += 1;
                continue;
            };

            entries.push(ScheduleEntry {
                agency,
                day,
                hour: non_empty(row.hour),
                window: non_empty(row.window),
            });
        }

        if dropped > 0 {
            tracing::debug!(path = %path.display(), dropped, "dropped malformed schedule rows");
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Agencies with at least one schedule row on `day`.
    pub fn agencies_open_on(&self, day: Weekday) -> HashSet<&AgencyKey> {
        self.entries
            .iter()
            .filter(|entry| entry.day == day)
            .map(|entry| &entry.agency)
            .collect()
    }

    /// Weekdays present in the schedule, Monday first.
    pub fn days(&self) -> Vec<Weekday> {
        let present: BTreeSet<u32> = self
            .entries
            .iter()
            .map(|entry| entry.day.num_days_from_monday())
            .collect();
        present
            .into_iter()
            .filter_map(weekday_from_index)
            .collect()
    }
}

/// Trim and title-case a day cell, then match it to a weekday.
pub fn parse_weekday(raw: &str) -> Option<Weekday> {
    let titled = title_case(raw.trim());
    ALL_WEEKDAYS
        .iter()
        .copied()
        .find(|day| weekday_name(*day) == titled)
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_from_index(n: u32) -> Option<Weekday> {
    ALL_WEEKDAYS.get(n as usize).copied()
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reference::csv_reader;

    const HOURS: &str = "Agency ,City,Address,Week,Day,Hour,Window
Hope Pantry,Raleigh,1 Main St,1, monday ,10,Morning
Hope Pantry,Raleigh,1 Main St,1,WEDNESDAY,14,Afternoon
Grace Kitchen,Durham,2 Oak Ave,1,Ist,9,Morning
 Grace Kitchen ,Durham,2 Oak Ave,2,friday,9,Morning
Loaves,Cary,3 Elm Rd,1,Monday,,
";

    fn schedule() -> Schedule {
        Schedule::from_reader(csv_reader(HOURS.as_bytes()), Path::new("hours.csv")).unwrap()
    }

    #[test]
    fn drops_sentinel_days_and_title_cases() {
        let schedule = schedule();
        assert_eq!(schedule.entries().len(), 4);
        assert_eq!(schedule.entries()[0].day, Weekday::Mon);
        assert_eq!(schedule.entries()[1].day, Weekday::Wed);
        assert_eq!(schedule.entries()[2].agency.as_str(), "Grace Kitchen");
        assert_eq!(schedule.entries()[3].hour, None);
    }

    #[test]
    fn agencies_open_on_a_day() {
        let schedule = schedule();
        let monday = schedule.agencies_open_on(Weekday::Mon);
        assert_eq!(monday.len(), 2);
        assert!(monday.contains(&AgencyKey::new("Hope Pantry")));
        assert!(monday.contains(&AgencyKey::new("Loaves")));
        assert!(schedule.agencies_open_on(Weekday::Sun).is_empty());
    }

    #[test]
    fn days_are_listed_monday_first() {
        assert_eq!(
            schedule().days(),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
    }

    #[test]
    fn missing_day_column_is_fatal() {
        let data = "agency,hour\nHope Pantry,10\n";
        let err = Schedule::from_reader(csv_reader(data.as_bytes()), Path::new("hours.csv"))
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column: "day", .. }));
    }

    #[test]
    fn parses_day_names_loosely() {
        assert_eq!(parse_weekday("  tUESDAY "), Some(Weekday::Tue));
        assert_eq!(parse_weekday("Ist"), None);
        assert_eq!(parse_weekday("Any"), None);
    }
}
