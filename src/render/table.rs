use std::cmp::Ordering;

use crate::config::HIGHLIGHT_EV_PERCENT;
use crate::rows::{ev_percent, odds_value};
use crate::types::{FieldValue, MarketRow};

pub const EV_COLUMN: &str = "EV";

/// Display-ready grid of strings. Every row has `headers.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DisplayTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build the digest columns from normalized rows.
    pub fn from_market_rows(rows: &[MarketRow]) -> Self {
        let headers = ["Game", "Market", "Side", "Book", "Odds", EV_COLUMN]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let cells = rows
            .iter()
            .map(|r| {
                vec![
                    r.game_id.clone().unwrap_or_default(),
                    r.market.clone().unwrap_or_default(),
                    r.side.clone().unwrap_or_default(),
                    r.best_book
                        .as_ref()
                        .and_then(FieldValue::as_text)
                        .unwrap_or_default()
                        .to_string(),
                    format_american(odds_value(r)),
                    format!("{:+.1}%", ev_percent(r)),
                ]
            })
            .collect();
        Self::new(headers, cells)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ev_column(&self) -> Option<usize> {
        self.headers.iter().position(|h| h == EV_COLUMN)
    }

    /// EV of a row as displayed, if it parses.
    pub fn row_ev(&self, row: &[String]) -> Option<f64> {
        self.ev_column()
            .and_then(|i| row.get(i))
            .and_then(|cell| parse_ev_cell(cell))
    }

    /// Stable sort, highest EV first; unparseable EV sinks to the bottom.
    pub fn sort_by_ev_desc(&mut self) {
        let Some(col) = self.ev_column() else { return };
        self.rows.sort_by(|a, b| {
            let ea = a.get(col).and_then(|c| parse_ev_cell(c));
            let eb = b.get(col).and_then(|c| parse_ev_cell(c));
            match (ea, eb) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
    }

    pub fn is_highlighted(&self, row: &[String]) -> bool {
        self.row_ev(row).is_some_and(|ev| ev >= HIGHLIGHT_EV_PERCENT)
    }

    /// Split into consecutive tables of at most `size` rows, headers repeated.
    pub fn pages(&self, size: usize) -> Vec<DisplayTable> {
        self.rows
            .chunks(size.max(1))
            .map(|chunk| DisplayTable::new(self.headers.clone(), chunk.to_vec()))
            .collect()
    }
}

/// "12.5%" → 12.5. A single trailing percent sign is stripped.
pub fn parse_ev_cell(cell: &str) -> Option<f64> {
    let s = cell.trim();
    let s = s.strip_suffix('%').unwrap_or(s);
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn format_american(odds: Option<f64>) -> String {
    match odds {
        Some(v) if v.fract() == 0.0 => format!("{:+}", v as i64),
        Some(v) => format!("{v:+.1}"),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(evs: &[&str]) -> DisplayTable {
        DisplayTable::new(
            vec!["Side".to_string(), EV_COLUMN.to_string()],
            evs.iter()
                .enumerate()
                .map(|(i, ev)| vec![format!("S{i}"), ev.to_string()])
                .collect(),
        )
    }

    #[test]
    fn parses_percent_cells() {
        assert_eq!(parse_ev_cell("12.5%"), Some(12.5));
        assert_eq!(parse_ev_cell(" +15.0% "), Some(15.0));
        assert_eq!(parse_ev_cell("-3"), Some(-3.0));
        assert_eq!(parse_ev_cell("N/A"), None);
    }

    #[test]
    fn sorts_by_ev_descending() {
        let mut t = table(&["5%", "N/A", "20%", "-1%", "12%"]);
        t.sort_by_ev_desc();
        let order: Vec<&str> = t.rows.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(order, vec!["20%", "12%", "5%", "-1%", "N/A"]);
    }

    #[test]
    fn pages_keep_order_and_headers() {
        let evs: Vec<String> = (0..60).map(|i| format!("{}%", 60 - i)).collect();
        let t = table(&evs.iter().map(String::as_str).collect::<Vec<_>>());
        let pages = t.pages(25);
        let sizes: Vec<usize> = pages.iter().map(|p| p.rows.len()).collect();
        assert_eq!(sizes, vec![25, 25, 10]);
        assert_eq!(pages[1].headers, t.headers);
        assert_eq!(pages[1].rows[0][1], "35%");
        assert!(DisplayTable::new(t.headers.clone(), Vec::new()).pages(25).is_empty());
    }

    #[test]
    fn highlight_starts_at_fifteen() {
        let t = table(&["15%", "14.9%", "30"]);
        assert!(t.is_highlighted(&t.rows[0]));
        assert!(!t.is_highlighted(&t.rows[1]));
        assert!(t.is_highlighted(&t.rows[2]));
    }

    #[test]
    fn builds_digest_columns_from_rows() {
        let rows: Vec<MarketRow> = serde_json::from_str(
            r#"[{"game_id":"G1","market":"h2h","side":"CIN","best_book":"pinnacle","market_odds":"+150 (approx)","ev_percent":"16.04"},
                {"game_id":"G2","market":"totals","ev_percent":3}]"#,
        )
        .unwrap();
        let t = DisplayTable::from_market_rows(&rows);
        assert_eq!(t.headers.len(), 6);
        assert_eq!(t.rows[0], vec!["G1", "h2h", "CIN", "pinnacle", "+150", "+16.0%"]);
        assert_eq!(t.rows[1][4], "N/A");
        assert_eq!(t.rows[1][5], "+3.0%");
        assert!(t.is_highlighted(&t.rows[0]));
    }
}
