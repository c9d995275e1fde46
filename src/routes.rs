use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{FeedbackError, GeocodeError, QueryError};
use crate::feedback::{CsvFeedbackSink, Feedback, FeedbackSink};
use crate::filters::day_options;
use crate::geocoder::{Geocoder, OpenCageGeocoder};
use crate::pipeline::{run_search, SearchQuery, SearchResponse};
use crate::reference::{Capabilities, DataPaths, ReferenceData};
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub geocoder: Arc<dyn Geocoder>,
    pub feedback: Arc<dyn FeedbackSink>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let geocoder = OpenCageGeocoder::new(
            settings.opencage_url.clone(),
            settings.opencage_api_key.clone(),
        );
        let feedback = CsvFeedbackSink::new(settings.feedback_csv.clone());
        Self {
            settings: Arc::new(settings),
            geocoder: Arc::new(geocoder),
            feedback: Arc::new(feedback),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/options", get(list_options))
        .route("/search", post(search))
        .route("/feedback", post(submit_feedback))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// Reference tables are read fresh for every request, off the async runtime.
async fn load_reference(paths: &DataPaths) -> Result<ReferenceData, ApiError> {
    let paths = paths.clone();
    match tokio::task::spawn_blocking(move || ReferenceData::load(&paths)).await {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(e)) => {
            tracing::error!("Failed to load reference data: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
        Err(e) => {
            tracing::error!("Reference loader panicked: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load reference data",
            ))
        }
    }
}

#[derive(Debug, Serialize)]
struct OptionsResponse {
    categories: Vec<String>,
    days: Vec<String>,
    capabilities: Capabilities,
}

async fn list_options(State(state): State<AppState>) -> Result<Json<OptionsResponse>, ApiError> {
    let data = load_reference(&state.settings.data).await?;
    let days = if state.settings.pipeline.features.day_filter {
        day_options(&data.schedule)
    } else {
        Vec::new()
    };
    Ok(Json(OptionsResponse {
        categories: data.matrix.categories(),
        days,
        capabilities: data.matrix.capabilities,
    }))
}

fn query_status(err: &QueryError) -> StatusCode {
    match err {
        QueryError::Load(_) => StatusCode::INTERNAL_SERVER_ERROR,
        QueryError::InvalidInput(_) | QueryError::InvalidThreshold(_) => StatusCode::BAD_REQUEST,
        QueryError::Geocoding(GeocodeError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
        QueryError::Geocoding(_) => StatusCode::BAD_GATEWAY,
        QueryError::AddressNotFound | QueryError::NoEnclosingTract => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

async fn search(
    State(state): State<AppState>,
    Json(query): Json<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let data = load_reference(&state.settings.data).await?;

    match run_search(&query, &data, state.geocoder.as_ref(), &state.settings.pipeline).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            let status = query_status(&e);
            if status.is_server_error() {
                tracing::error!("Search failed: {}", e);
            } else {
                tracing::info!("Search halted: {}", e);
            }
            Err(api_error(status, e))
        }
    }
}

#[derive(Debug, Serialize)]
struct FeedbackResponse {
    status: &'static str,
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(feedback): Json<Feedback>,
) -> Result<(StatusCode, Json<FeedbackResponse>), ApiError> {
    let sink = state.feedback.clone();
    let submitted_at = chrono::Utc::now();
    let result = tokio::task::spawn_blocking(move || sink.submit(&feedback, submitted_at)).await;

    match result {
        Ok(Ok(())) => Ok((
            StatusCode::CREATED,
            Json(FeedbackResponse { status: "recorded" }),
        )),
        Ok(Err(FeedbackError::EmptyMessage)) => Err(api_error(
            StatusCode::BAD_REQUEST,
            FeedbackError::EmptyMessage,
        )),
        Ok(Err(e)) => {
            tracing::error!("Failed to record feedback: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
        Err(e) => {
            tracing::error!("Feedback writer panicked: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to record feedback",
            ))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_errors_map_to_statuses() {
        assert_eq!(
            query_status(&QueryError::InvalidThreshold(7)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            query_status(&QueryError::NoEnclosingTract),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            query_status(&QueryError::Geocoding(GeocodeError::Provider {
                code: 500,
                message: "down".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            query_status(&QueryError::Geocoding(GeocodeError::NotConfigured)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
