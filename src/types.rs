use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Loosely-typed scalar fields
// ---------------------------------------------------------------------------

/// A row field that external jobs write as a number, a string, or occasionally
/// something else entirely. `null` never reaches this type; it becomes `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Other(Value),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Book name → quoted price.
pub type BookPrices = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// MarketRow
// ---------------------------------------------------------------------------

/// One candidate opportunity as written by the snapshot job.
///
/// Only the fields this crate inspects are named; everything else rides along
/// in `extra` and is written back out unchanged. A named field holding a value
/// of the wrong shape is left in `extra` under its own key instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct MarketRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bet: Option<BetDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev_percent: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_odds: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds_display: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_book: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_books: Option<BookPrices>,
    /// Read from `_raw_sportsbook`, or `per_book` in older snapshots.
    #[serde(rename = "_raw_sportsbook", skip_serializing_if = "Option::is_none")]
    pub raw_sportsbook: Option<BookPrices>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_for_date: Option<String>,
    /// Digests this row belongs to (`live`, `best_book`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_roles: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MarketRow {
    pub fn has_role(&self, role: &str) -> bool {
        self.snapshot_roles
            .as_ref()
            .is_some_and(|roles| roles.iter().any(|r| r == role))
    }
}

impl From<Map<String, Value>> for MarketRow {
    fn from(mut map: Map<String, Value>) -> Self {
        let raw_key = if map.contains_key("_raw_sportsbook") {
            "_raw_sportsbook"
        } else {
            "per_book"
        };
        let mut row = MarketRow {
            game_id: take(&mut map, "game_id", as_string),
            market: take(&mut map, "market", as_string),
            side: take(&mut map, "side", as_string),
            bet: take(&mut map, "bet", as_bet),
            ev_percent: take(&mut map, "ev_percent", as_field),
            market_odds: take(&mut map, "market_odds", as_field),
            odds: take(&mut map, "odds", as_field),
            odds_display: take(&mut map, "odds_display", as_field),
            best_book: take(&mut map, "best_book", as_field),
            consensus_books: take(&mut map, "consensus_books", as_books),
            raw_sportsbook: take(&mut map, raw_key, as_books),
            snapshot_for_date: take(&mut map, "snapshot_for_date", as_string),
            snapshot_roles: take(&mut map, "snapshot_roles", as_roles),
            extra: Map::new(),
        };
        row.extra = map;
        row
    }
}

/// Nested `bet` object some jobs emit instead of a top-level side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct BetDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for BetDescriptor {
    fn from(mut map: Map<String, Value>) -> Self {
        let side = take(&mut map, "side", as_string);
        BetDescriptor { side, extra: map }
    }
}

/// Remove `key` and convert it. `null` is dropped; a value `convert` rejects
/// goes back into the map untouched.
fn take<T>(map: &mut Map<String, Value>, key: &str, convert: fn(Value) -> Result<T, Value>) -> Option<T> {
    match map.remove(key)? {
        Value::Null => None,
        v => match convert(v) {
            Ok(t) => Some(t),
            Err(v) => {
                map.insert(key.to_string(), v);
                None
            }
        },
    }
}

fn as_string(v: Value) -> Result<String, Value> {
    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(other),
    }
}

fn as_field(v: Value) -> Result<FieldValue, Value> {
    Ok(match v {
        Value::String(s) => FieldValue::Text(s),
        Value::Number(n) => match n.as_f64() {
            Some(f) => FieldValue::Number(f),
            None => FieldValue::Other(Value::Number(n)),
        },
        other => FieldValue::Other(other),
    })
}

fn as_books(v: Value) -> Result<BookPrices, Value> {
    match v {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(other),
    }
}

fn as_bet(v: Value) -> Result<BetDescriptor, Value> {
    match v {
        Value::Object(map) => Ok(BetDescriptor::from(map)),
        other => Err(other),
    }
}

fn as_roles(v: Value) -> Result<Vec<String>, Value> {
    match v {
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(items
            .into_iter()
            .filter_map(|i| i.as_str().map(str::to_string))
            .collect()),
        other => Err(other),
    }
}
