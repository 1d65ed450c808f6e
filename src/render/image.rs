//! Visual table export. The production exporter draws the table as a
//! self-contained SVG document; the sink receives it as an image attachment.

use std::fmt::Write as _;

use thiserror::Error;

use super::table::DisplayTable;

const CHAR_WIDTH: usize = 8;
const CELL_PAD: usize = 10;
const ROW_HEIGHT: usize = 24;
const TITLE_LINE_HEIGHT: usize = 20;
const MARGIN: usize = 12;

const HEADER_FILL: &str = "#e0f7fa";
const HIGHLIGHT_FILL: &str = "#d4edda";
const GRID_STROKE: &str = "#b0bec5";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("table has no columns")]
    NoColumns,

    #[error("table has {rows} rows, image export is limited to {max}")]
    TooLarge { rows: usize, max: usize },

    #[error("formatting failed: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Encoded image plus what the sink needs to attach it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// Draws a styled table. `title_lines` are printed above the grid.
pub trait ImageExporter: Send + Sync {
    fn export(&self, table: &DisplayTable, title_lines: &[String]) -> Result<ImageBuffer, RenderError>;
}

pub struct SvgTableExporter {
    max_rows: usize,
}

impl SvgTableExporter {
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }
}

impl ImageExporter for SvgTableExporter {
    fn export(&self, table: &DisplayTable, title_lines: &[String]) -> Result<ImageBuffer, RenderError> {
        if table.headers.is_empty() {
            return Err(RenderError::NoColumns);
        }
        if table.rows.len() > self.max_rows {
            return Err(RenderError::TooLarge {
                rows: table.rows.len(),
                max: self.max_rows,
            });
        }

        let widths = column_widths(table);
        let grid_width: usize = widths.iter().sum();
        let title_height = title_lines.len() * TITLE_LINE_HEIGHT;
        let grid_top = MARGIN + title_height + if title_lines.is_empty() { 0 } else { MARGIN / 2 };
        let width = grid_width + 2 * MARGIN;
        let height = grid_top + (table.rows.len() + 1) * ROW_HEIGHT + MARGIN;

        let mut svg = String::new();
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="monospace" font-size="13">"#
        )?;
        writeln!(svg, r##"<rect width="{width}" height="{height}" fill="#ffffff"/>"##)?;

        for (i, line) in title_lines.iter().enumerate() {
            let y = MARGIN + (i + 1) * TITLE_LINE_HEIGHT - 6;
            let weight = if i == 0 { "bold" } else { "normal" };
            writeln!(
                svg,
                r#"<text x="{MARGIN}" y="{y}" font-weight="{weight}">{}</text>"#,
                escape_xml(line)
            )?;
        }

        // Header band.
        writeln!(
            svg,
            r#"<rect x="{MARGIN}" y="{grid_top}" width="{grid_width}" height="{ROW_HEIGHT}" fill="{HEADER_FILL}"/>"#
        )?;
        let mut x = MARGIN;
        for (header, w) in table.headers.iter().zip(&widths) {
            let cx = x + w / 2;
            let y = grid_top + ROW_HEIGHT - 8;
            writeln!(
                svg,
                r#"<text x="{cx}" y="{y}" text-anchor="middle" font-weight="bold" fill="black">{}</text>"#,
                escape_xml(header)
            )?;
            x += w;
        }

        for (r, row) in table.rows.iter().enumerate() {
            let top = grid_top + (r + 1) * ROW_HEIGHT;
            if table.is_highlighted(row) {
                writeln!(
                    svg,
                    r#"<rect x="{MARGIN}" y="{top}" width="{grid_width}" height="{ROW_HEIGHT}" fill="{HIGHLIGHT_FILL}"/>"#
                )?;
            }
            let mut x = MARGIN;
            for (cell, w) in row.iter().zip(&widths) {
                writeln!(
                    svg,
                    r#"<text x="{}" y="{}">{}</text>"#,
                    x + CELL_PAD,
                    top + ROW_HEIGHT - 8,
                    escape_xml(cell)
                )?;
                x += w;
            }
            writeln!(
                svg,
                r#"<line x1="{MARGIN}" y1="{top}" x2="{}" y2="{top}" stroke="{GRID_STROKE}"/>"#,
                MARGIN + grid_width
            )?;
        }
        writeln!(
            svg,
            r#"<rect x="{MARGIN}" y="{grid_top}" width="{grid_width}" height="{}" fill="none" stroke="{GRID_STROKE}"/>"#,
            (table.rows.len() + 1) * ROW_HEIGHT
        )?;
        svg.push_str("</svg>\n");

        Ok(ImageBuffer {
            bytes: svg.into_bytes(),
            file_name: "snapshot.svg".to_string(),
            content_type: "image/svg+xml".to_string(),
        })
    }
}

fn column_widths(table: &DisplayTable) -> Vec<usize> {
    table
        .headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let longest = table
                .rows
                .iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0);
            longest * CHAR_WIDTH + 2 * CELL_PAD
        })
        .collect()
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
