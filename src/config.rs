use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Scheduler poll tick (seconds).
pub const TICK_SECS: u64 = 10;

/// Default task periods (seconds).
pub const SIM_INTERVAL_SECS: u64 = 30 * 60;
pub const LOG_INTERVAL_SECS: u64 = 5 * 60;
pub const SNAPSHOT_INTERVAL_SECS: u64 = 5 * 60;

/// Delivery path period (seconds).
pub const DISPATCH_INTERVAL_SECS: u64 = 5 * 60;

/// HTTP statuses the delivery path treats as transient and safe to retry.
pub const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// HTTP statuses the sink uses to acknowledge a message.
pub const SUCCESS_STATUSES: &[u16] = &[200, 204];

/// EV% at or above which a rendered row is highlighted.
pub const HIGHLIGHT_EV_PERCENT: f64 = 15.0;

/// Upper bound on a single text message accepted by the sink.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Rows per posted digest; larger groups go out as several pages.
pub const PAGE_ROWS: usize = 25;

/// Market families a live digest is split into, matched as a prefix of the
/// row's market label (`totals_1st_5_innings` is a `totals` row).
pub const MARKET_FAMILIES: &[&str] = &["h2h", "spreads", "totals"];

/// Long-running watchers relaunched whenever they exit.
pub const MONITOR_SCRIPTS: &[&str] = &["cli/closing_odds_monitor.py", "cli/monitor_early_bets.py"];

/// Stall warning thresholds for launched jobs (seconds).
pub mod stall_thresholds {
    pub const SIMULATE: u64 = 45 * 60;
    pub const LOG: u64 = 10 * 60;
    pub const SNAPSHOT: u64 = 10 * 60;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Interpreter used to start every external job (PYTHON).
    pub python: String,
    /// Working directory for jobs; relative data folders resolve against it (PROJECT_ROOT).
    pub project_root: PathBuf,
    pub tick: Duration,
    pub sim_interval: Duration,
    pub log_interval: Duration,
    pub snapshot_interval: Duration,
    pub dispatch_interval: Duration,
    /// EV% floor for rows that reach rendering (MIN_EV).
    pub min_ev: f64,
    /// Inclusive odds band (ODDS_MIN, ODDS_MAX).
    pub odds_range: (f64, f64),
    /// Delivery retry cap (DELIVERY_ATTEMPTS).
    pub attempts: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
    /// Default notification sink (WEBHOOK_URL).
    pub webhook_url: Option<String>,
    /// Per-market sink overrides (MARKET_WEBHOOKS, "h2h=https://...,totals=https://...").
    pub market_webhooks: HashMap<String, String>,
    pub edge_threshold: f64,
    pub job_min_ev: f64,
    pub sim_dir: PathBuf,
    pub log_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub snapshot_max_age_secs: u64,
    /// Odds file handed to the snapshot and log jobs (ODDS_PATH). When unset
    /// the jobs pick the newest one themselves.
    pub odds_path: Option<PathBuf>,
    /// Scripts kept running for the life of the process (MONITOR_SCRIPTS,
    /// comma-separated; set it empty to run none).
    pub monitor_scripts: Vec<String>,
    pub render_images: bool,
    pub max_image_rows: usize,
    pub max_tracked_jobs: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let odds_min: f64 = env_parse("ODDS_MIN", -150.0)?;
        let odds_max: f64 = env_parse("ODDS_MAX", 200.0)?;
        if odds_min > odds_max {
            return Err(AppError::Config(format!(
                "ODDS_MIN ({odds_min}) must not exceed ODDS_MAX ({odds_max})"
            )));
        }

        let attempts: u32 = env_parse("DELIVERY_ATTEMPTS", 3)?;
        if attempts == 0 {
            return Err(AppError::Config("DELIVERY_ATTEMPTS must be at least 1".to_string()));
        }

        let tick_secs: u64 = env_parse("TICK_SECS", TICK_SECS)?;
        if tick_secs == 0 {
            return Err(AppError::Config("TICK_SECS must be at least 1".to_string()));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            python: std::env::var("PYTHON").unwrap_or_else(|_| "python3".to_string()),
            project_root: PathBuf::from(
                std::env::var("PROJECT_ROOT").unwrap_or_else(|_| ".".to_string()),
            ),
            tick: Duration::from_secs(tick_secs),
            sim_interval: Duration::from_secs(env_parse("SIM_INTERVAL_SECS", SIM_INTERVAL_SECS)?),
            log_interval: Duration::from_secs(env_parse("LOG_INTERVAL_SECS", LOG_INTERVAL_SECS)?),
            snapshot_interval: Duration::from_secs(env_parse(
                "SNAPSHOT_INTERVAL_SECS",
                SNAPSHOT_INTERVAL_SECS,
            )?),
            dispatch_interval: Duration::from_secs(env_parse(
                "DISPATCH_INTERVAL_SECS",
                DISPATCH_INTERVAL_SECS,
            )?),
            min_ev: env_parse("MIN_EV", 5.0)?,
            odds_range: (odds_min, odds_max),
            attempts,
            backoff_base: Duration::from_millis(env_parse("BACKOFF_BASE_MS", 1000)?),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", 10)?),
            webhook_url: std::env::var("WEBHOOK_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            market_webhooks: parse_market_webhooks(
                &std::env::var("MARKET_WEBHOOKS").unwrap_or_default(),
            )?,
            edge_threshold: env_parse("EDGE_THRESHOLD", 0.05)?,
            job_min_ev: env_parse("JOB_MIN_EV", 0.05)?,
            sim_dir: PathBuf::from(
                std::env::var("SIM_DIR").unwrap_or_else(|_| "backtest/sims".to_string()),
            ),
            log_dir: PathBuf::from(std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string())),
            snapshot_dir: PathBuf::from(
                std::env::var("SNAPSHOT_DIR").unwrap_or_else(|_| "backtest".to_string()),
            ),
            snapshot_max_age_secs: env_parse("SNAPSHOT_MAX_AGE_SECS", 900)?,
            odds_path: std::env::var("ODDS_PATH")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            monitor_scripts: match std::env::var("MONITOR_SCRIPTS") {
                Ok(raw) => parse_list(&raw),
                Err(_) => MONITOR_SCRIPTS.iter().map(|s| s.to_string()).collect(),
            },
            render_images: env_parse("RENDER_IMAGES", true)?,
            max_image_rows: env_parse("MAX_IMAGE_ROWS", 60)?,
            max_tracked_jobs: env_parse("MAX_TRACKED_JOBS", 64)?,
        })
    }

    /// Resolve a data folder against the project root (absolute paths pass through).
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Sink for a market label: per-market override first, then the default.
    pub fn webhook_for(&self, market: &str) -> Option<&str> {
        self.market_webhooks
            .get(&market.to_lowercase())
            .or(self.webhook_url.as_ref())
            .map(String::as_str)
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        _ => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_market_webhooks(raw: &str) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((market, url)) = entry.split_once('=') else {
            return Err(AppError::Config(format!(
                "MARKET_WEBHOOKS entry {entry:?} must look like market=url"
            )));
        };
        out.insert(market.trim().to_lowercase(), url.trim().to_string());
    }
    Ok(out)
}

#[cfg(test)]
impl Config {
    /// Defaults with no environment lookups, for tests.
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            log_level: "debug".to_string(),
            api_port: 0,
            python: "python3".to_string(),
            project_root: root.to_path_buf(),
            tick: Duration::from_secs(TICK_SECS),
            sim_interval: Duration::from_secs(SIM_INTERVAL_SECS),
            log_interval: Duration::from_secs(LOG_INTERVAL_SECS),
            snapshot_interval: Duration::from_secs(SNAPSHOT_INTERVAL_SECS),
            dispatch_interval: Duration::from_secs(DISPATCH_INTERVAL_SECS),
            min_ev: 5.0,
            odds_range: (-150.0, 200.0),
            attempts: 3,
            backoff_base: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(10),
            webhook_url: Some("https://hooks.test/default".to_string()),
            market_webhooks: HashMap::new(),
            edge_threshold: 0.05,
            job_min_ev: 0.05,
            sim_dir: PathBuf::from("backtest/sims"),
            log_dir: PathBuf::from("logs"),
            snapshot_dir: PathBuf::from("backtest"),
            snapshot_max_age_secs: 900,
            odds_path: None,
            monitor_scripts: Vec::new(),
            render_images: true,
            max_image_rows: 60,
            max_tracked_jobs: 8,
        }
    }
}
