//! Attribute filters applied to the candidate set, in order: category,
//! subcategory, choice pantry, operating day.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::reference::schedule::{parse_weekday, weekday_name};
use crate::reference::{AgencyRecord, Capabilities, Schedule};

pub const ANY_DAY: &str = "Any";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DaySelection {
    #[default]
    Any,
    Day(Weekday),
}

impl FromStr for DaySelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(ANY_DAY) {
            return Ok(DaySelection::Any);
        }
        parse_weekday(s)
            .map(DaySelection::Day)
            .ok_or_else(|| format!("unknown day '{}'", s.trim()))
    }
}

impl TryFrom<String> for DaySelection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DaySelection> for String {
    fn from(day: DaySelection) -> String {
        day.to_string()
    }
}

impl fmt::Display for DaySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaySelection::Any => f.write_str(ANY_DAY),
            DaySelection::Day(day) => f.write_str(weekday_name(*day)),
        }
    }
}

/// The user's filter choices for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
    pub categories: Vec<String>,
    pub subcategories: Vec<String>,
    pub choice_only: bool,
    pub day: DaySelection,
}

/// Which filters a deployment offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterFeatures {
    pub choice_filter: bool,
    pub day_filter: bool,
}

impl Default for FilterFeatures {
    fn default() -> Self {
        Self {
            choice_filter: true,
            day_filter: true,
        }
    }
}

/// Values a UI can offer for each selector given the current candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub categories: Vec<String>,
    pub subcategories: Vec<String>,
    pub days: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub rows: Vec<AgencyRecord>,
    pub options: FilterOptions,
}

pub fn category_options(rows: &[AgencyRecord]) -> Vec<String> {
    distinct(rows.iter().filter_map(|row| row.category.as_deref()))
}

pub fn subcategory_options(rows: &[AgencyRecord]) -> Vec<String> {
    distinct(rows.iter().filter_map(|row| row.subcategory.as_deref()))
}

pub fn day_options(schedule: &Schedule) -> Vec<String> {
    std::iter::once(ANY_DAY.to_string())
        .chain(schedule.days().into_iter().map(|d| weekday_name(d).to_string()))
        .collect()
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn filter_by_category(rows: Vec<AgencyRecord>, selected: &[String]) -> Vec<AgencyRecord> {
    if selected.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|row| {
            row.category
                .as_ref()
                .is_some_and(|category| selected.contains(category))
        })
        .collect()
}

pub fn filter_by_subcategory(rows: Vec<AgencyRecord>, selected: &[String]) -> Vec<AgencyRecord> {
    if selected.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|row| {
            row.subcategory
                .as_ref()
                .is_some_and(|subcategory| selected.contains(subcategory))
        })
        .collect()
}

pub fn filter_choice_only(rows: Vec<AgencyRecord>, enabled: bool) -> Vec<AgencyRecord> {
    if !enabled {
        return rows;
    }
    rows.into_iter().filter(|row| row.choice).collect()
}

/// Keep agencies with a schedule entry on the chosen day. The join is on the
/// trimmed agency name.
pub fn filter_by_day(
    rows: Vec<AgencyRecord>,
    schedule: &Schedule,
    day: DaySelection,
) -> Vec<AgencyRecord> {
    let DaySelection::Day(day) = day else {
        return rows;
    };
    let open: HashSet<_> = schedule.agencies_open_on(day);
    rows.into_iter()
        .filter(|row| open.contains(&row.key()))
        .collect()
}

/// Run every filter in order. Subcategory options come from the rows left
/// after the category filter, not from the full candidate set.
pub fn apply_filters(
    candidates: Vec<AgencyRecord>,
    selection: &FilterSelection,
    capabilities: &Capabilities,
    schedule: &Schedule,
    features: &FilterFeatures,
) -> Filtered {
    let mut options = FilterOptions::default();

    let mut rows = candidates;
    if capabilities.category {
        options.categories = category_options(&rows);
        rows = filter_by_category(rows, &selection.categories);
    }

    if capabilities.subcategory && !rows.is_empty() {
        options.subcategories = subcategory_options(&rows);
        rows = filter_by_subcategory(rows, &selection.subcategories);
    }

    if features.choice_filter && capabilities.choice {
        rows = filter_choice_only(rows, selection.choice_only);
    }

    if features.day_filter {
        options.days = day_options(schedule);
        rows = filter_by_day(rows, schedule, selection.day);
    }

    tracing::debug!(remaining = rows.len(), "attribute filters applied");
    Filtered { rows, options }
}
