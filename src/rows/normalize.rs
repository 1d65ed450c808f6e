use serde_json::Value;

use crate::types::{BookPrices, FieldValue, MarketRow};

/// Apply every in-place normalization. Safe to call repeatedly.
pub fn normalize_row(row: &mut MarketRow) {
    ensure_consensus_books(row);
    ensure_side(row);
}

/// Back-fill an empty or missing `consensus_books`, first from the raw per-book
/// prices, then from `(best_book, market_odds)` when both are well-typed.
pub fn ensure_consensus_books(row: &mut MarketRow) {
    if row.consensus_books.as_ref().is_some_and(|books| !books.is_empty()) {
        return;
    }

    if let Some(raw) = row.raw_sportsbook.as_ref().filter(|books| !books.is_empty()) {
        row.consensus_books = Some(raw.clone());
        return;
    }

    if let (Some(FieldValue::Text(book)), Some(FieldValue::Number(odds))) =
        (&row.best_book, &row.market_odds)
    {
        let mut books = BookPrices::new();
        books.insert(book.clone(), price_value(*odds));
        row.consensus_books = Some(books);
    }
}

/// Promote `bet.side` to the top level when the row has no side of its own.
pub fn ensure_side(row: &mut MarketRow) {
    if row.side.is_some() {
        return;
    }
    if let Some(side) = row.bet.as_ref().and_then(|bet| bet.side.clone()) {
        row.side = Some(side);
    }
}

/// American prices are integral; keep them as JSON integers when they are.
fn price_value(odds: f64) -> Value {
    if odds.fract() == 0.0 && odds.abs() < i64::MAX as f64 {
        Value::from(odds as i64)
    } else {
        Value::from(odds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BetDescriptor;
    use serde_json::json;

    fn books(pairs: &[(&str, Value)]) -> BookPrices {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn existing_books_are_left_alone() {
        let mut row = MarketRow {
            consensus_books: Some(books(&[("pinnacle", json!(-105))])),
            raw_sportsbook: Some(books(&[("fanduel", json!(120))])),
            ..MarketRow::default()
        };
        ensure_consensus_books(&mut row);
        assert_eq!(row.consensus_books, Some(books(&[("pinnacle", json!(-105))])));
    }

    #[test]
    fn raw_sportsbook_fills_empty_books() {
        let mut row = MarketRow {
            consensus_books: Some(BookPrices::new()),
            raw_sportsbook: Some(books(&[("fanduel", json!(120)), ("dk", json!(115))])),
            best_book: Some(FieldValue::Text("pinnacle".to_string())),
            market_odds: Some(FieldValue::Number(-110.0)),
            ..MarketRow::default()
        };
        ensure_consensus_books(&mut row);
        assert_eq!(row.consensus_books.unwrap().len(), 2);
    }

    #[test]
    fn best_book_and_market_odds_synthesize_single_entry() {
        let mut row = MarketRow {
            best_book: Some(FieldValue::Text("pinnacle".to_string())),
            market_odds: Some(FieldValue::Number(-110.0)),
            ..MarketRow::default()
        };
        ensure_consensus_books(&mut row);
        assert_eq!(row.consensus_books, Some(books(&[("pinnacle", json!(-110))])));
    }

    #[test]
    fn mistyped_inputs_are_a_no_op() {
        let mut row = MarketRow {
            best_book: Some(FieldValue::Text("pinnacle".to_string())),
            market_odds: Some(FieldValue::Text("-110".to_string())),
            raw_sportsbook: Some(BookPrices::new()),
            ..MarketRow::default()
        };
        ensure_consensus_books(&mut row);
        assert!(row.consensus_books.is_none());
    }

    #[test]
    fn consensus_backfill_is_idempotent() {
        let mut once = MarketRow {
            best_book: Some(FieldValue::Text("pinnacle".to_string())),
            market_odds: Some(FieldValue::Number(-110.0)),
            ..MarketRow::default()
        };
        ensure_consensus_books(&mut once);
        let mut twice = once.clone();
        ensure_consensus_books(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn nested_side_is_promoted() {
        let mut row = MarketRow {
            bet: Some(BetDescriptor {
                side: Some("Over 8.5".to_string()),
                ..BetDescriptor::default()
            }),
            ..MarketRow::default()
        };
        ensure_side(&mut row);
        assert_eq!(row.side.as_deref(), Some("Over 8.5"));
    }

    #[test]
    fn top_level_side_wins() {
        let mut row = MarketRow {
            side: Some("Under 8.5".to_string()),
            bet: Some(BetDescriptor {
                side: Some("Over 8.5".to_string()),
                ..BetDescriptor::default()
            }),
            ..MarketRow::default()
        };
        normalize_row(&mut row);
        assert_eq!(row.side.as_deref(), Some("Under 8.5"));
    }
}
