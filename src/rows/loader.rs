use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::MarketRow;

const SNAPSHOT_PREFIX: &str = "market_snapshot_";
const SNAPSHOT_SUFFIX: &str = ".json";

/// Newest `market_snapshot_*.json` in `dir`. Snapshot names embed a sortable
/// timestamp, so the lexicographically largest name is the latest one.
pub fn latest_snapshot_path(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            let name = e.file_name().into_string().ok()?;
            (name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_SUFFIX))
                .then_some(name)
        })
        .max()
        .map(|name| dir.join(name))
}

/// Read a snapshot file. A file that is mid-write fails here with a JSON error;
/// callers skip the cycle and try again on the next one.
pub fn load_rows(path: &Path) -> Result<Vec<MarketRow>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Keep rows stamped for one of `dates`. Unstamped rows are kept.
pub fn filter_by_dates(rows: Vec<MarketRow>, dates: &[String]) -> Vec<MarketRow> {
    rows.into_iter()
        .filter(|r| match &r.snapshot_for_date {
            Some(d) => dates.iter().any(|want| want == d),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn latest_snapshot_picks_newest_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "market_snapshot_20250609T1005.json",
            "market_snapshot_20250609T1205.json",
            "market_snapshot_20250608T2355.json",
            "market_odds_20250609T1300.json",
            "market_snapshot_20250609T1300.json.tmp",
        ] {
            fs::write(dir.path().join(name), "[]").unwrap();
        }
        let latest = latest_snapshot_path(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "market_snapshot_20250609T1205.json");
    }

    #[test]
    fn latest_snapshot_none_for_missing_or_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_snapshot_path(dir.path()).is_none());
        assert!(latest_snapshot_path(&dir.path().join("absent")).is_none());
    }

    #[test]
    fn load_rows_reads_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market_snapshot_1.json");
        fs::write(&path, r#"[{"ev_percent":6.1,"market":"h2h"},{"ev_percent":"3"}]"#).unwrap();
        let rows = load_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].market.as_deref(), Some("h2h"));
    }

    #[test]
    fn load_rows_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market_snapshot_1.json");
        fs::write(&path, r#"[{"ev_percent":6.1,"mar"#).unwrap();
        assert!(load_rows(&path).is_err());
    }

    #[test]
    fn date_filter_keeps_matching_and_unstamped() {
        let rows: Vec<MarketRow> = serde_json::from_str(
            r#"[{"snapshot_for_date":"2025-06-09"},{"snapshot_for_date":"2025-06-07"},{}]"#,
        )
        .unwrap();
        let kept = filter_by_dates(rows, &["2025-06-09".to_string(), "2025-06-10".to_string()]);
        assert_eq!(kept.len(), 2);
    }
}
