use std::path::Path;
use std::time::{Duration, SystemTime};

/// True if `path` exists and was last modified more than `max_age_secs` ago.
///
/// A missing path is not stale: "doesn't exist" and "fresh" both mean the
/// caller should not force any action. A modification time in the future
/// (clock skew) counts as fresh.
pub fn is_file_older_than(path: &Path, max_age_secs: u64) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age > Duration::from_secs(max_age_secs),
        Err(_) => false,
    }
}
