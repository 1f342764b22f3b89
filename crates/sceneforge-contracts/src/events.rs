use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// User-visible studio progress, one JSON object per line in `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudioEvent {
    SessionStarted {
        out_dir: String,
        backend: String,
    },
    ImagesUploaded {
        added: usize,
        clamped: usize,
        rejected: usize,
    },
    AnalysisCompleted {
        image_id: String,
        fallback: bool,
    },
    PointsGenerated {
        count: usize,
    },
    TranslationSynced {
        point_id: String,
        target: String,
        trigger: String,
    },
    BatchStarted {
        image_id: String,
        total: usize,
    },
    BatchProgress {
        index: usize,
        total: usize,
        slogan: String,
    },
    RenderFailed {
        point_id: String,
        index: usize,
        error: String,
    },
    BatchFinished {
        produced: usize,
        failed: usize,
    },
    ResultRegenerated {
        result_id: String,
        point_id: String,
    },
    SessionFinished {
        results: usize,
    },
}

impl StudioEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::ImagesUploaded { .. } => "images_uploaded",
            Self::AnalysisCompleted { .. } => "analysis_completed",
            Self::PointsGenerated { .. } => "points_generated",
            Self::TranslationSynced { .. } => "translation_synced",
            Self::BatchStarted { .. } => "batch_started",
            Self::BatchProgress { .. } => "batch_progress",
            Self::RenderFailed { .. } => "render_failed",
            Self::BatchFinished { .. } => "batch_finished",
            Self::ResultRegenerated { .. } => "result_regenerated",
            Self::SessionFinished { .. } => "session_finished",
        }
    }
}

/// Append-only JSONL sink shared by every clone.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventLogInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Writes `event` stamped with the session id and a UTC timestamp.
    pub fn record(&self, event: &StudioEvent) -> anyhow::Result<Value> {
        let mut row = Map::new();
        row.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        row.insert("ts".to_string(), Value::String(now_utc_iso()));
        if let Value::Object(fields) = serde_json::to_value(event)? {
            row.extend(fields);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&row)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(row))
    }
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn record_writes_tagged_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::new(&path, "session-1");

        let written = log.record(&StudioEvent::BatchProgress {
            index: 2,
            total: 4,
            slogan: "Stay cold".to_string(),
        })?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed, written);
        assert_eq!(parsed["type"], Value::String("batch_progress".to_string()));
        assert_eq!(parsed["session_id"], Value::String("session-1".to_string()));
        assert_eq!(parsed["index"], Value::from(2));
        assert_eq!(parsed["slogan"], Value::String("Stay cold".to_string()));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn record_appends_and_creates_parent() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let log = EventLog::new(&path, "session-1");
        let clone = log.clone();

        log.record(&StudioEvent::PointsGenerated { count: 3 })?;
        clone.record(&StudioEvent::SessionFinished { results: 0 })?;

        let kinds: Vec<String> = fs::read_to_string(&path)?
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
            .collect();
        assert_eq!(kinds, vec!["points_generated", "session_finished"]);
        Ok(())
    }

    #[test]
    fn kind_matches_serialized_tag() -> anyhow::Result<()> {
        let event = StudioEvent::RenderFailed {
            point_id: "pt-1".to_string(),
            index: 0,
            error: "boom".to_string(),
        };
        let value = serde_json::to_value(&event)?;
        assert_eq!(value["type"], Value::String(event.kind().to_string()));
        Ok(())
    }
}
