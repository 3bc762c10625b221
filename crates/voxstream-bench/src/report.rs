use std::path::Path;

use crate::runner::SceneResult;

/// All scene results from one run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Report {
    pub seed: u64,
    pub backend: String,
    pub results: Vec<SceneResult>,
}

/// Load a report from a JSON file. Returns None if missing or unreadable.
pub fn load_report(path: &Path) -> Option<Report> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save a report as pretty-printed JSON.
pub fn save_report(path: &Path, report: &Report) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Format results as a markdown summary table.
pub fn format_markdown(results: &[SceneResult]) -> String {
    let mut out = String::new();
    out.push_str("| Scene | Frames | Slots | Written | Deferred | Discarded | Max pending | Residency | Full at | Drain mean (ms) | Drain p95 (ms) |\n");
    out.push_str("|-------|--------|-------|---------|----------|-----------|-------------|-----------|---------|-----------------|----------------|\n");

    for r in results {
        let full_at = r
            .first_fully_resident_frame
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {:.1}% | {} | {:.3} | {:.3} |\n",
            r.scene_name,
            r.frames,
            r.slot_capacity,
            r.total_written,
            r.total_deferred,
            r.late_arrivals_discarded,
            r.max_pending_writes,
            r.mean_residency * 100.0,
            full_at,
            r.writer_timings.mean_ms,
            r.writer_timings.p95_ms,
        ));
    }

    out
}
