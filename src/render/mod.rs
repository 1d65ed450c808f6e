//! Snapshot rendering: a styled image when the exporter is available and
//! succeeds, a fenced text table otherwise. Render errors never leave this
//! module.

pub mod image;
pub mod table;
pub mod text;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

pub use image::{ImageBuffer, ImageExporter, SvgTableExporter};
pub use table::DisplayTable;

const DISCLAIMER: &str = "_(Not an official bet, for informational purposes only)_";
const PLAIN_DISCLAIMER: &str = "Not an official bet, for informational purposes only";

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactBody {
    Image(ImageBuffer),
    /// Complete message text, caption included.
    Text(String),
}

/// One digest ready for delivery. Consumed once by the notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedArtifact {
    pub label: String,
    pub generated_at: DateTime<Local>,
    pub caption: String,
    pub body: ArtifactBody,
}

impl RenderedArtifact {
    pub fn is_image(&self) -> bool {
        matches!(self.body, ArtifactBody::Image(_))
    }
}

pub struct SnapshotRenderer {
    exporter: Option<Box<dyn ImageExporter>>,
}

impl SnapshotRenderer {
    /// `None` means image export is unavailable; every artifact is text.
    pub fn new(exporter: Option<Box<dyn ImageExporter>>) -> Self {
        Self { exporter }
    }

    /// Render `table` for `label`. Empty tables produce nothing.
    pub fn render(
        &self,
        mut table: DisplayTable,
        label: &str,
        now: DateTime<Local>,
    ) -> Option<RenderedArtifact> {
        if table.is_empty() {
            return None;
        }
        table.sort_by_ev_desc();

        let Some(exporter) = &self.exporter else {
            debug!("[RENDER] image export unavailable, using text for {label}");
            return Some(text_artifact(&table, label, now));
        };

        let stamp = timestamp(now);
        let title_lines = vec![
            format!("Live Market Snapshot: {label}"),
            format!("Generated: {stamp}"),
            PLAIN_DISCLAIMER.to_string(),
        ];
        match exporter.export(&table, &title_lines) {
            Ok(image) => Some(RenderedArtifact {
                label: label.to_string(),
                generated_at: now,
                caption: format!(
                    "📈 **Live Market Snapshot: {label}**\n_Generated: {stamp}_\n{DISCLAIMER}"
                ),
                body: ArtifactBody::Image(image),
            }),
            Err(e) => {
                warn!("[RENDER] image export failed for {label}: {e}; falling back to text");
                Some(text_artifact(&table, label, now))
            }
        }
    }

    /// Text-only rendering of the same data, used when an image could not be delivered.
    pub fn render_text(
        &self,
        mut table: DisplayTable,
        label: &str,
        now: DateTime<Local>,
    ) -> Option<RenderedArtifact> {
        if table.is_empty() {
            return None;
        }
        table.sort_by_ev_desc();
        Some(text_artifact(&table, label, now))
    }
}

fn text_artifact(table: &DisplayTable, label: &str, now: DateTime<Local>) -> RenderedArtifact {
    let caption = format!(
        "📈 **Live Market Snapshot: {label}** (text fallback)\n_Generated: {}_",
        timestamp(now)
    );
    let message = text::compose_message(&caption, table, DISCLAIMER);
    RenderedArtifact {
        label: label.to_string(),
        generated_at: now,
        caption,
        body: ArtifactBody::Text(message),
    }
}

fn timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d %H:%M (UTC%:z)").to_string()
}
