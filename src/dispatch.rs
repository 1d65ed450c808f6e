//! Delivery path: newest snapshot file → live rows → one digest per market
//! family, paged → webhook. Runs on its own interval, independent of the
//! scheduler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::config::{Config, MARKET_FAMILIES, PAGE_ROWS};
use crate::freshness::is_file_older_than;
use crate::notify::Notifier;
use crate::render::{DisplayTable, SnapshotRenderer};
use crate::rows::{filter_by_dates, filter_rows, latest_snapshot_path, load_rows, normalize_row};
use crate::scheduler::task::target_dates;
use crate::types::MarketRow;

/// Role a row must carry to appear in the live digest.
const LIVE_ROLE: &str = "live";

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoSnapshot,
    Stale(PathBuf),
    Unreadable(String),
}

/// Result of one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSummary {
    pub skipped: Option<SkipReason>,
    pub rows: usize,
    pub groups: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Text re-sends after a failed image delivery.
    pub fallbacks: usize,
}

impl DispatchSummary {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

pub struct SnapshotDispatcher {
    cfg: Config,
    renderer: SnapshotRenderer,
    notifier: Notifier,
    health: Arc<HealthState>,
}

impl SnapshotDispatcher {
    pub fn new(cfg: Config, renderer: SnapshotRenderer, notifier: Notifier) -> Self {
        Self {
            cfg,
            renderer,
            notifier,
            health: Arc::new(HealthState::new()),
        }
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = health;
        self
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.cfg.dispatch_interval);
        interval.tick().await; // consume immediate first tick; the snapshot job needs a head start

        loop {
            interval.tick().await;
            self.run_cycle(Local::now()).await;
        }
    }

    pub fn interval(&self) -> Duration {
        self.cfg.dispatch_interval
    }

    /// One pass over the newest snapshot. Never fails; problems are logged
    /// and reflected in the summary.
    pub async fn run_cycle(&self, now: DateTime<Local>) -> DispatchSummary {
        let summary = self.cycle(now).await;
        match &summary.skipped {
            Some(_) => self.health.inc_skipped(),
            None => {
                self.health
                    .record_dispatch(now, summary.delivered as u64, summary.failed as u64);
                info!(
                    groups = summary.groups,
                    delivered = summary.delivered,
                    failed = summary.failed,
                    "[DISPATCH] cycle done: {} rows in {} groups, {} delivered, {} failed, {} text fallbacks",
                    summary.rows,
                    summary.groups,
                    summary.delivered,
                    summary.failed,
                    summary.fallbacks,
                );
            }
        }
        summary
    }

    async fn cycle(&self, now: DateTime<Local>) -> DispatchSummary {
        let dir = self.cfg.resolve(&self.cfg.snapshot_dir);
        let Some(path) = latest_snapshot_path(&dir) else {
            info!("[DISPATCH] no market snapshot in {}; skipping", dir.display());
            return DispatchSummary::skipped(SkipReason::NoSnapshot);
        };

        if is_file_older_than(&path, self.cfg.snapshot_max_age_secs) {
            warn!(
                "[DISPATCH] {} is older than {}s; skipping until the snapshot job refreshes it",
                path.display(),
                self.cfg.snapshot_max_age_secs,
            );
            return DispatchSummary::skipped(SkipReason::Stale(path));
        }

        let rows = match load_rows(&path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("[DISPATCH] cannot read {}: {e}; skipping", path.display());
                return DispatchSummary::skipped(SkipReason::Unreadable(e.to_string()));
            }
        };

        let loaded = rows.len();
        let rows: Vec<MarketRow> = rows.into_iter().filter(|r| r.has_role(LIVE_ROLE)).collect();
        debug!("[DISPATCH] {} of {loaded} rows carry the {LIVE_ROLE} role", rows.len());

        let mut rows = filter_by_dates(rows, &target_dates(now));
        rows.iter_mut().for_each(normalize_row);
        let rows = filter_rows(rows, self.cfg.min_ev, self.cfg.odds_range);

        let groups = group_by_family(rows);
        let mut summary = DispatchSummary {
            rows: groups.iter().map(|(_, rows)| rows.len()).sum(),
            groups: groups.len(),
            ..Default::default()
        };

        for (family, rows) in groups {
            self.deliver_group(family, &rows, now, &mut summary).await;
        }
        summary
    }

    /// Post one family, highest EV first, in pages of `PAGE_ROWS`.
    async fn deliver_group(
        &self,
        family: &str,
        rows: &[MarketRow],
        now: DateTime<Local>,
        summary: &mut DispatchSummary,
    ) {
        let Some(target) = self.cfg.webhook_for(family) else {
            warn!("[DISPATCH] no webhook configured for {family}; dropping {} rows", rows.len());
            summary.failed += 1;
            return;
        };

        let mut table = DisplayTable::from_market_rows(rows);
        table.sort_by_ev_desc();
        let pages = table.pages(PAGE_ROWS);
        let count = pages.len();
        for (i, page) in pages.into_iter().enumerate() {
            let label = if count > 1 {
                format!("{family} ({}/{count})", i + 1)
            } else {
                family.to_string()
            };
            self.deliver_page(target, &label, page, now, summary).await;
        }
    }

    async fn deliver_page(
        &self,
        target: &str,
        label: &str,
        table: DisplayTable,
        now: DateTime<Local>,
        summary: &mut DispatchSummary,
    ) {
        let Some(artifact) = self.renderer.render(table.clone(), label, now) else {
            return;
        };

        let was_image = artifact.is_image();
        let report = self.notifier.deliver(target, artifact).await;
        if report.is_success() {
            summary.delivered += 1;
            return;
        }

        if !was_image {
            summary.failed += 1;
            return;
        }

        warn!(
            "[DISPATCH] image delivery for {label} ended {}; sending text instead",
            report.outcome,
        );
        let Some(text) = self.renderer.render_text(table, label, now) else {
            summary.failed += 1;
            return;
        };
        summary.fallbacks += 1;
        if self.notifier.deliver(target, text).await.is_success() {
            summary.delivered += 1;
        } else {
            error!("[DISPATCH] text fallback for {label} also failed");
            summary.failed += 1;
        }
    }
}

/// Family a market label belongs to, by case-insensitive prefix.
fn market_family(market: &str) -> Option<&'static str> {
    let market = market.trim().to_lowercase();
    MARKET_FAMILIES.iter().copied().find(|f| market.starts_with(f))
}

/// Rows grouped by market family in `MARKET_FAMILIES` order. Empty families
/// are left out; rows outside every family are dropped.
fn group_by_family(rows: Vec<MarketRow>) -> Vec<(&'static str, Vec<MarketRow>)> {
    let mut groups: Vec<(&'static str, Vec<MarketRow>)> =
        MARKET_FAMILIES.iter().map(|f| (*f, Vec::new())).collect();
    let mut unmatched = 0usize;
    for row in rows {
        match row.market.as_deref().and_then(market_family) {
            Some(family) => {
                if let Some((_, bucket)) = groups.iter_mut().find(|(f, _)| *f == family) {
                    bucket.push(row);
                }
            }
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        debug!("[DISPATCH] {unmatched} rows outside {MARKET_FAMILIES:?} not posted");
    }
    groups.retain(|(_, rows)| !rows.is_empty());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::payload::Payload;
    use crate::notify::transport::{TransportError, WebhookTransport};
    use crate::notify::RetryPolicy;
    use crate::render::SvgTableExporter;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::fs::File;
    use std::sync::Mutex;
    use std::time::SystemTime;

    /// Records every post; images and text get fixed statuses.
    struct RecordingTransport {
        posts: Mutex<Vec<(String, &'static str)>>,
        image_status: u16,
        text_status: u16,
    }

    impl RecordingTransport {
        fn new(image_status: u16, text_status: u16) -> Arc<Self> {
            Arc::new(Self {
                posts: Mutex::new(Vec::new()),
                image_status,
                text_status,
            })
        }

        fn posts(&self) -> Vec<(String, &'static str)> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebhookTransport for RecordingTransport {
        async fn send(&self, target: &str, payload: &Payload) -> Result<u16, TransportError> {
            self.posts
                .lock()
                .unwrap()
                .push((target.to_string(), payload.kind()));
            Ok(match payload {
                Payload::Image { .. } => self.image_status,
                Payload::Text { .. } => self.text_status,
            })
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 9, 14, 30, 0).unwrap()
    }

    fn write_snapshot(root: &std::path::Path, rows: serde_json::Value) -> PathBuf {
        let dir = root.join("backtest");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("market_snapshot_20250609T1430.json");
        std::fs::write(&path, rows.to_string()).unwrap();
        path
    }

    fn sample_rows() -> serde_json::Value {
        json!([
            {"game_id": "CIN@NYM", "market": "h2h", "snapshot_roles": ["live"], "side": "CIN", "ev_percent": 16.0,
             "market_odds": 120, "best_book": "fanduel", "snapshot_for_date": "2025-06-09"},
            {"game_id": "LAD@SF", "market": "totals", "snapshot_roles": ["live"], "bet": {"side": "Over 8.5"},
             "ev_percent": "7.5", "odds": "-110", "snapshot_for_date": "2025-06-10"},
            {"game_id": "BOS@NYY", "market": "h2h", "snapshot_roles": ["live"], "side": "BOS", "ev_percent": 2.0,
             "market_odds": 105, "snapshot_for_date": "2025-06-09"},
            {"game_id": "OLD@ONE", "market": "h2h", "snapshot_roles": ["live"], "side": "OLD", "ev_percent": 30.0,
             "market_odds": 105, "snapshot_for_date": "2025-06-07"}
        ])
    }

    fn dispatcher(root: &std::path::Path, transport: Arc<RecordingTransport>) -> SnapshotDispatcher {
        let mut cfg = Config::for_tests(root);
        cfg.market_webhooks
            .insert("totals".to_string(), "https://hooks.test/totals".to_string());
        let renderer = SnapshotRenderer::new(Some(Box::new(SvgTableExporter::new(cfg.max_image_rows))));
        let notifier = Notifier::new(transport, RetryPolicy::new(cfg.attempts, Duration::from_millis(10)));
        SnapshotDispatcher::new(cfg, renderer, notifier)
    }

    #[tokio::test]
    async fn delivers_one_image_per_market() {
        let root = tempfile::tempdir().unwrap();
        write_snapshot(root.path(), sample_rows());
        let transport = RecordingTransport::new(200, 200);
        let summary = dispatcher(root.path(), transport.clone()).run_cycle(now()).await;

        assert_eq!(summary.skipped, None);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.groups, 2);
        assert_eq!(summary.delivered, 2);
        assert_eq!(
            transport.posts(),
            vec![
                ("https://hooks.test/default".to_string(), "image"),
                ("https://hooks.test/totals".to_string(), "image"),
            ]
        );
    }

    #[tokio::test]
    async fn failed_image_falls_back_to_text_once() {
        let root = tempfile::tempdir().unwrap();
        write_snapshot(root.path(), json!([
            {"market": "h2h", "snapshot_roles": ["live"], "side": "CIN", "ev_percent": 16.0, "market_odds": 120}
        ]));
        let transport = RecordingTransport::new(400, 204);
        let summary = dispatcher(root.path(), transport.clone()).run_cycle(now()).await;

        assert_eq!(summary.fallbacks, 1);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 0);
        let kinds: Vec<_> = transport.posts().into_iter().map(|(_, k)| k).collect();
        assert_eq!(kinds, vec!["image", "text"]);
    }

    #[tokio::test]
    async fn missing_snapshot_skips_without_delivery() {
        let root = tempfile::tempdir().unwrap();
        let transport = RecordingTransport::new(200, 200);
        let summary = dispatcher(root.path(), transport.clone()).run_cycle(now()).await;
        assert_eq!(summary.skipped, Some(SkipReason::NoSnapshot));
        assert!(transport.posts().is_empty());
    }

    #[tokio::test]
    async fn stale_snapshot_is_not_delivered() {
        let root = tempfile::tempdir().unwrap();
        let path = write_snapshot(root.path(), sample_rows());
        let old = SystemTime::now() - Duration::from_secs(3600);
        File::options().write(true).open(&path).unwrap().set_modified(old).unwrap();

        let transport = RecordingTransport::new(200, 200);
        let summary = dispatcher(root.path(), transport.clone()).run_cycle(now()).await;
        assert!(matches!(summary.skipped, Some(SkipReason::Stale(_))));
        assert!(transport.posts().is_empty());
    }

    #[tokio::test]
    async fn partial_file_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("backtest");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("market_snapshot_20250609T1430.json"), "[{\"market\": \"h2").unwrap();

        let transport = RecordingTransport::new(200, 200);
        let summary = dispatcher(root.path(), transport.clone()).run_cycle(now()).await;
        assert!(matches!(summary.skipped, Some(SkipReason::Unreadable(_))));
        assert!(transport.posts().is_empty());
    }

    #[tokio::test]
    async fn nothing_above_threshold_means_no_delivery() {
        let root = tempfile::tempdir().unwrap();
        write_snapshot(root.path(), json!([
            {"market": "h2h", "snapshot_roles": ["live"], "side": "BOS", "ev_percent": 1.0, "market_odds": 105},
            {"market": "h2h", "snapshot_roles": ["live"], "side": "LONG", "ev_percent": 40.0, "market_odds": 9999}
        ]));
        let transport = RecordingTransport::new(200, 200);
        let summary = dispatcher(root.path(), transport.clone()).run_cycle(now()).await;
        assert_eq!(summary.groups, 0);
        assert!(transport.posts().is_empty());
    }

    #[tokio::test]
    async fn sub_markets_route_to_their_family() {
        let root = tempfile::tempdir().unwrap();
        write_snapshot(root.path(), json!([
            {"market": "totals_1st_5_innings", "snapshot_roles": ["live"], "side": "Over 4.5",
             "ev_percent": 9.0, "market_odds": -105},
            {"market": "Spreads", "snapshot_roles": ["best_book", "live"], "side": "NYM -1.5",
             "ev_percent": 8.0, "market_odds": 130},
            {"market": "h2h", "snapshot_roles": ["best_book"], "side": "SF",
             "ev_percent": 12.0, "market_odds": 110},
            {"market": "team_totals", "snapshot_roles": ["live"], "side": "Over 3.5",
             "ev_percent": 11.0, "market_odds": 100},
            {"side": "No Market", "snapshot_roles": ["live"], "ev_percent": 11.0, "market_odds": 100}
        ]));
        let transport = RecordingTransport::new(200, 200);
        let summary = dispatcher(root.path(), transport.clone()).run_cycle(now()).await;

        assert_eq!(summary.groups, 2);
        assert_eq!(summary.rows, 2);
        assert_eq!(
            transport.posts(),
            vec![
                ("https://hooks.test/default".to_string(), "image"),
                ("https://hooks.test/totals".to_string(), "image"),
            ]
        );
    }

    #[tokio::test]
    async fn large_family_is_posted_in_pages() {
        let root = tempfile::tempdir().unwrap();
        let rows: Vec<serde_json::Value> = (0..60)
            .map(|i| json!({"game_id": format!("G{i}"), "market": "h2h", "snapshot_roles": ["live"],
                            "side": format!("S{i}"), "ev_percent": 5.0 + i as f64 / 10.0,
                            "market_odds": 110}))
            .collect();
        write_snapshot(root.path(), json!(rows));
        let transport = RecordingTransport::new(200, 200);
        let summary = dispatcher(root.path(), transport.clone()).run_cycle(now()).await;

        assert_eq!(summary.groups, 1);
        assert_eq!(summary.rows, 60);
        assert_eq!(summary.delivered, 3);
        assert_eq!(transport.posts().len(), 3);
    }

    #[test]
    fn families_match_by_prefix() {
        assert_eq!(market_family("h2h"), Some("h2h"));
        assert_eq!(market_family(" Totals_1st_5_innings"), Some("totals"));
        assert_eq!(market_family("spreads_alternate"), Some("spreads"));
        assert_eq!(market_family("team_totals"), None);

        let rows = vec![
            MarketRow { market: Some("totals".to_string()), ..Default::default() },
            MarketRow { market: Some("h2h_1st_inning".to_string()), ..Default::default() },
            MarketRow::default(),
        ];
        let groups = group_by_family(rows);
        let families: Vec<&str> = groups.iter().map(|(f, _)| *f).collect();
        assert_eq!(families, vec!["h2h", "totals"]);
    }
}
