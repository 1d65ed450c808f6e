use crate::rows::odds::parse_odds;
use crate::types::{FieldValue, MarketRow};

/// Odds field priority: the first present, parseable key wins.
pub fn odds_value(row: &MarketRow) -> Option<f64> {
    [&row.market_odds, &row.odds, &row.odds_display]
        .into_iter()
        .find_map(|field| parse_odds(field.as_ref()))
}

/// EV% of a row, 0 when missing or unparseable.
pub fn ev_percent(row: &MarketRow) -> f64 {
    let parsed = match &row.ev_percent {
        Some(FieldValue::Number(n)) => Some(*n),
        Some(FieldValue::Text(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Keep rows with EV% ≥ `min_ev` whose resolvable odds fall inside the
/// inclusive `odds_range`. Rows without resolvable odds are not rejected on
/// range grounds.
pub fn filter_rows<I>(rows: I, min_ev: f64, odds_range: (f64, f64)) -> Vec<MarketRow>
where
    I: IntoIterator<Item = MarketRow>,
{
    rows.into_iter()
        .filter(|row| keep_row(row, min_ev, odds_range))
        .collect()
}

fn keep_row(row: &MarketRow, min_ev: f64, (min_odds, max_odds): (f64, f64)) -> bool {
    if ev_percent(row) < min_ev {
        return false;
    }
    match odds_value(row) {
        Some(odds) => (min_odds..=max_odds).contains(&odds),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: (f64, f64) = (-150.0, 200.0);

    fn num(v: f64) -> FieldValue {
        FieldValue::Number(v)
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn row(ev: FieldValue, odds: Option<FieldValue>) -> MarketRow {
        MarketRow {
            ev_percent: Some(ev),
            odds,
            ..MarketRow::default()
        }
    }

    #[test]
    fn ev_threshold_decides_inclusion() {
        let r = row(num(10.0), Some(num(150.0)));
        assert_eq!(filter_rows(vec![r.clone()], 5.0, RANGE).len(), 1);
        assert!(filter_rows(vec![r], 15.0, RANGE).is_empty());
    }

    #[test]
    fn out_of_range_odds_drop_regardless_of_ev() {
        let r = row(num(80.0), Some(num(9999.0)));
        assert!(filter_rows(vec![r], 5.0, RANGE).is_empty());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let rows = vec![
            row(num(10.0), Some(num(-150.0))),
            row(num(10.0), Some(num(200.0))),
            row(num(10.0), Some(num(200.5))),
        ];
        assert_eq!(filter_rows(rows, 5.0, RANGE).len(), 2);
    }

    #[test]
    fn unresolvable_odds_are_kept() {
        let rows = vec![
            row(num(10.0), None),
            row(num(10.0), Some(text("N/A"))),
        ];
        assert_eq!(filter_rows(rows, 5.0, RANGE).len(), 2);
    }

    #[test]
    fn missing_or_bad_ev_counts_as_zero() {
        let missing = MarketRow::default();
        let garbage = row(text("lots"), None);
        assert_eq!(filter_rows(vec![missing.clone(), garbage.clone()], 0.0, RANGE).len(), 2);
        assert!(filter_rows(vec![missing, garbage], 0.1, RANGE).is_empty());
        assert_eq!(ev_percent(&row(text("7.25"), None)), 7.25);
    }

    #[test]
    fn odds_priority_uses_first_parseable_field() {
        let r = MarketRow {
            market_odds: Some(text("N/A")),
            odds: Some(num(9999.0)),
            odds_display: Some(text("+120")),
            ..MarketRow::default()
        };
        assert_eq!(odds_value(&r), Some(9999.0));

        let r = MarketRow {
            market_odds: Some(num(-110.0)),
            odds: Some(num(9999.0)),
            ..MarketRow::default()
        };
        assert_eq!(odds_value(&r), Some(-110.0));

        let r = MarketRow {
            odds_display: Some(text("+120 (best)")),
            ..MarketRow::default()
        };
        assert_eq!(odds_value(&r), Some(120.0));
    }

    #[test]
    fn filtering_is_idempotent() {
        let rows = vec![
            row(num(10.0), Some(num(150.0))),
            row(num(2.0), Some(num(150.0))),
            row(num(30.0), Some(text("-400"))),
            row(text("12"), Some(text("+180 (approx)"))),
            row(num(6.0), None),
        ];
        let once = filter_rows(rows, 5.0, RANGE);
        let twice = filter_rows(once.clone(), 5.0, RANGE);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }
}
