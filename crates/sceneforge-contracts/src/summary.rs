use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::events::now_utc_iso;

/// End-of-session counters written to `summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub images: usize,
    pub points: usize,
    pub results: usize,
    pub batches: usize,
    pub render_failures: usize,
}

pub fn write_summary(path: &Path, summary: &SessionSummary) -> anyhow::Result<()> {
    let mut payload = serde_json::to_value(summary)?;
    if let Some(object) = payload.as_object_mut() {
        object.insert("ts".to_string(), now_utc_iso().into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&payload)?)?;
    Ok(())
}
