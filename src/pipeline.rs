//! One search from raw input to presentation: resolve the location, select
//! candidates, apply filters, assemble the table and map.

use serde::{Deserialize, Serialize};

use crate::candidates::{select_candidates, Threshold, DEFAULT_WIDEN_BY_MINUTES};
use crate::error::QueryError;
use crate::filters::{apply_filters, FilterFeatures, FilterOptions, FilterSelection};
use crate::geocoder::{Coordinate, Geocoder};
use crate::location::{resolve_location, LocationInput, ResolvedLocation};
use crate::presentation::{assemble, MapDefaults, Presentation, SearchMode};
use crate::reference::{AgencyRecord, ReferenceData, TractId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub location: LocationInput,
    #[serde(default)]
    pub threshold_minutes: Threshold,
    #[serde(flatten)]
    pub filters: FilterSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub mode: SearchMode,
    pub location: Option<Coordinate>,
    pub tract: Option<TractId>,
    pub notices: Vec<Notice>,
    pub options: FilterOptions,
    /// `None` whenever a no-match condition stopped the search early.
    pub results: Option<Presentation>,
}

impl SearchResponse {
    fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            location: None,
            tract: None,
            notices: Vec::new(),
            options: FilterOptions::default(),
            results: None,
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!(notice = %message, "search notice");
        self.notices.push(Notice::warning(message));
    }

    fn inform(&mut self, message: String) {
        tracing::info!(notice = %message, "search notice");
        self.notices.push(Notice::info(message));
    }
}

/// Deployment knobs shared by every query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub widen_by_minutes: u32,
    pub features: FilterFeatures,
    pub map: MapDefaults,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            widen_by_minutes: DEFAULT_WIDEN_BY_MINUTES,
            features: FilterFeatures::default(),
            map: MapDefaults::default(),
        }
    }
}

pub const ZIP_EMPTY_MESSAGE: &str = "No agencies found in that ZIP code.";
pub const NO_FILTER_MATCH_MESSAGE: &str = "No agencies found matching your filters.";
pub const MAP_SKIPPED_MESSAGE: &str =
    "Map coordinates not available for some agencies; map layer skipped.";

pub fn widened_message(threshold: u32, widened: u32) -> String {
    format!(
        "No agencies linked to your tract within {threshold} minutes. Searching within {widened} minutes instead."
    )
}

pub fn widened_empty_message(widened: u32) -> String {
    format!("No agencies found within {widened} minutes of your location.")
}

pub async fn run_search(
    query: &SearchQuery,
    data: &ReferenceData,
    geocoder: &dyn Geocoder,
    settings: &PipelineSettings,
) -> Result<SearchResponse, QueryError> {
    let resolved =
        resolve_location(&query.location, geocoder, &data.tracts, &data.matrix).await?;

    let (mut response, candidates, user) = match resolved {
        ResolvedLocation::EmptyZip { zip } => {
            let mut response = SearchResponse::new(SearchMode::Zip);
            tracing::debug!(%zip, "no matrix rows for zip");
            response.warn(ZIP_EMPTY_MESSAGE.to_string());
            return Ok(response);
        }
        ResolvedLocation::Zip { zip, rows } => {
            tracing::debug!(%zip, rows = rows.len(), "zip subset selected");
            (SearchResponse::new(SearchMode::Zip), rows, None)
        }
        ResolvedLocation::Tract { coordinate, tract } => {
            let mut response = SearchResponse::new(SearchMode::TravelTime);
            response.location = Some(coordinate);
            response.tract = Some(tract);

            let selected = select_candidates(
                &data.matrix.rows,
                tract,
                query.threshold_minutes,
                settings.widen_by_minutes,
            );
            if let Some(widened) = selected.widened_to {
                response.warn(widened_message(query.threshold_minutes.minutes(), widened));
                if selected.rows.is_empty() {
                    response.warn(widened_empty_message(widened));
                    return Ok(response);
                }
            }
            (response, selected.rows, Some(coordinate))
        }
    };

    let filtered = apply_filters(
        candidates,
        &query.filters,
        &data.matrix.capabilities,
        &data.schedule,
        &settings.features,
    );
    response.options = filtered.options;

    if filtered.rows.is_empty() {
        response.warn(NO_FILTER_MATCH_MESSAGE.to_string());
        return Ok(response);
    }

    present(&mut response, &filtered.rows, user, data, settings);

    tracing::info!(
        mode = ?response.mode,
        tract = ?response.tract,
        results = response.results.as_ref().map_or(0, |p| p.rows.len()),
        "search complete"
    );
    Ok(response)
}

fn present(
    response: &mut SearchResponse,
    rows: &[AgencyRecord],
    user: Option<Coordinate>,
    data: &ReferenceData,
    settings: &PipelineSettings,
) {
    let capabilities = &data.matrix.capabilities;
    if !capabilities.coordinates {
        response.inform(MAP_SKIPPED_MESSAGE.to_string());
    }
    response.results = Some(assemble(rows, response.mode, user, capabilities, &settings.map));
}
