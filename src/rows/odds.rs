use std::sync::OnceLock;

use regex::Regex;

use crate::types::FieldValue;

/// Sentinel some jobs write when no price is available.
const NOT_AVAILABLE: &str = "N/A";

/// Resolve an odds field to a single number.
///
/// Accepts numbers, numeric text (`"-110"`, `"+150"`, `"1e2"`), and free text
/// that starts with a signed integer (`"+150 (approx)"` → 150). Returns `None`
/// for missing, blank, `"N/A"`, non-finite, or otherwise unusable input.
pub fn parse_odds(value: Option<&FieldValue>) -> Option<f64> {
    match value? {
        FieldValue::Number(n) => n.is_finite().then_some(*n),
        FieldValue::Text(s) => parse_odds_str(s),
        FieldValue::Other(_) => None,
    }
}

pub fn parse_odds_str(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case(NOT_AVAILABLE) {
        return None;
    }
    if let Ok(v) = s.parse::<f64>() {
        return v.is_finite().then_some(v);
    }
    leading_signed_integer(s)
}

/// Leading signed integer token, if any (`"+150 (approx)"` → 150).
fn leading_signed_integer(s: &str) -> Option<f64> {
    static LEADING_INT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = LEADING_INT.get_or_init(|| Regex::new(r"^[+-]?\d+").ok()).as_ref()?;
    re.find(s)?.as_str().parse::<f64>().ok()
}
