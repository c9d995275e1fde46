use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeedbackError;

const HEADER: [&str; 5] = ["submitted_at", "kind", "message", "zip", "agency"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Bug,
    Suggestion,
    DataCorrection,
    Other,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Bug => "bug",
            FeedbackKind::Suggestion => "suggestion",
            FeedbackKind::DataCorrection => "data_correction",
            FeedbackKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub message: String,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub agency: Option<String>,
}

/// Somewhere to keep user feedback. One call appends one record; failures
/// go back to the caller and are not retried.
pub trait FeedbackSink: Send + Sync {
    fn submit(&self, feedback: &Feedback, submitted_at: DateTime<Utc>) -> Result<(), FeedbackError>;
}

/// Appends feedback rows to a CSV file, writing the header when the file is
/// new or empty.
pub struct CsvFeedbackSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvFeedbackSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedbackSink for CsvFeedbackSink {
    fn submit(&self, feedback: &Feedback, submitted_at: DateTime<Utc>) -> Result<(), FeedbackError> {
        let message = feedback.message.trim();
        if message.is_empty() {
            return Err(FeedbackError::EmptyMessage);
        }

        let _guard = self.lock.lock().map_err(|_| FeedbackError::Poisoned)?;

        let open_err = |source| FeedbackError::Open {
            path: self.path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(open_err)?;
        let is_new = file.metadata().map_err(open_err)?.len() == 0;

        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            wtr.write_record(HEADER)?;
        }
        wtr.write_record([
            submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true).as_str(),
            feedback.kind.as_str(),
            message,
            optional(&feedback.zip),
            optional(&feedback.agency),
        ])?;
        wtr.flush().map_err(open_err)?;

        tracing::info!(kind = feedback.kind.as_str(), "feedback recorded");
        Ok(())
    }
}

fn optional(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "pantry-finder-{}-{name}.csv",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn feedback(message: &str) -> Feedback {
        Feedback {
            kind: FeedbackKind::DataCorrection,
            message: message.to_string(),
            zip: Some("27603".to_string()),
            agency: None,
        }
    }

    #[test]
    fn writes_header_once_then_appends() {
        let path = temp_path("append");
        let sink = CsvFeedbackSink::new(&path);
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();

        sink.submit(&feedback("Hours are wrong"), at).unwrap();
        sink.submit(&feedback("  Closed on Fridays now  "), at).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                "submitted_at,kind,message,zip,agency",
                "2024-03-05T14:30:00Z,data_correction,Hours are wrong,27603,",
                "2024-03-05T14:30:00Z,data_correction,Closed on Fridays now,27603,",
            ]
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn blank_messages_are_rejected() {
        let path = temp_path("blank");
        let sink = CsvFeedbackSink::new(&path);
        let err = sink.submit(&feedback("   "), Utc::now()).unwrap_err();
        assert!(matches!(err, FeedbackError::EmptyMessage));
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_location_is_reported() {
        let path = std::env::temp_dir()
            .join(format!("pantry-finder-missing-{}", std::process::id()))
            .join("feedback.csv");
        let sink = CsvFeedbackSink::new(&path);
        let err = sink.submit(&feedback("hello"), Utc::now()).unwrap_err();
        assert!(matches!(err, FeedbackError::Open { .. }));
    }

    #[test]
    fn kind_uses_snake_case() {
        let parsed: Feedback =
            serde_json::from_str(r#"{"kind": "data_correction", "message": "x"}"#).unwrap();
        assert_eq!(parsed.kind, FeedbackKind::DataCorrection);
        assert_eq!(parsed.zip, None);
        assert!(serde_json::from_str::<Feedback>(r#"{"kind": "praise", "message": "x"}"#).is_err());
    }
}
