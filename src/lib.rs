//! Food pantry finder: resolves an address or ZIP code to nearby pantry
//! agencies using precomputed travel times, then filters and lays the
//! matches out for a table and a map.

pub mod candidates;
pub mod error;
pub mod feedback;
pub mod filters;
pub mod geocoder;
pub mod location;
pub mod pipeline;
pub mod presentation;
pub mod reference;
pub mod routes;
pub mod settings;

pub use error::{FeedbackError, GeocodeError, LoadError, QueryError};
pub use pipeline::{run_search, PipelineSettings, SearchQuery, SearchResponse};
pub use routes::{build_app, AppState};
pub use settings::Settings;
