//! Row normalization and filtering for snapshot data produced by external jobs.

pub mod filter;
pub mod loader;
pub mod normalize;
pub mod odds;

pub use filter::{ev_percent, filter_rows, odds_value};
pub use loader::{filter_by_dates, latest_snapshot_path, load_rows};
pub use normalize::normalize_row;
