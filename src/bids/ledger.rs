//! Line items of a bid and the totals derived from them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use super::BidError;

pub const MARKUP_FACTOR: f64 = 1.37;

/// Non-negative money. Anything that does not read as a positive number,
/// including negatives, is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Amount(f64);

impl Amount {
    pub const ZERO: Amount = Amount(0.0);

    pub fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value)
        } else {
            Self::ZERO
        }
    }

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let normalized = if trimmed.contains('.') {
            trimmed.to_string()
        } else {
            trimmed.replacen(',', ".", 1)
        };
        numeric_prefix(&normalized)
            .and_then(|prefix| prefix.parse::<f64>().ok())
            .map(Self::new)
            .unwrap_or(Self::ZERO)
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(number) => number.as_f64().map(Self::new).unwrap_or(Self::ZERO),
            Value::String(raw) => Self::parse(raw),
            _ => Self::ZERO,
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

/// Longest prefix of `raw` that reads as a decimal number.
fn numeric_prefix(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > end + 1 || has_digits {
            has_digits = has_digits || frac_end > end + 1;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }
    Some(raw[..end].trim_end_matches('.'))
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn new_item_id() -> String {
    Uuid::new_v4().to_string()
}

// Lists may arrive JSON-encoded as a string; free text becomes one item.
fn unwrap_legacy(value: Value) -> Value {
    let Value::String(raw) = value else {
        return value;
    };
    if raw.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(list @ Value::Array(_)) => list,
        _ => json!([{ "description": raw }]),
    }
}

/// Item ids arrive as strings or, from older clients, as numbers.
fn item_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) if !id.trim().is_empty() => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        Value::Null => Ok(new_item_id()),
        Value::String(_) => Ok(new_item_id()),
        other => Err(serde::de::Error::custom(format!(
            "item id must be a string or number, got {other}"
        ))),
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::String(raw) => matches!(raw.trim(), "true" | "1"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default = "new_item_id", deserialize_with = "item_id")]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reference_price: Amount,
    #[serde(default)]
    pub cost_price: Amount,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_won: bool,
    #[serde(default)]
    pub won_price: Amount,
}

impl Item {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            reference_price: Amount::ZERO,
            cost_price: Amount::ZERO,
            is_won: false,
            won_price: Amount::ZERO,
        }
    }

    pub fn effective_won_price(&self) -> f64 {
        if self.is_won {
            self.won_price.get()
        } else {
            0.0
        }
    }

    pub fn margin_target(&self) -> f64 {
        self.cost_price.get() * MARKUP_FACTOR
    }

    pub fn suggested_won_price(&self) -> f64 {
        if self.cost_price.get() > 0.0 {
            round_cents(self.margin_target())
        } else {
            self.reference_price.get()
        }
    }

    pub fn margin_classification(&self) -> MarginClass {
        let won = self.won_price.get();
        if !self.is_won || won == 0.0 {
            return MarginClass::NotApplicable;
        }
        let target = round_cents(self.margin_target());
        if won >= target && won <= self.reference_price.get() {
            MarginClass::GoodMargin
        } else if won <= target {
            // Reaching this branch with won == target means the price also
            // exceeds the reference; the margin warning wins that tie.
            MarginClass::BelowTargetMargin
        } else {
            MarginClass::AboveReference
        }
    }

    fn apply(&mut self, field: ItemField) {
        match field {
            ItemField::Description(description) => self.description = description,
            ItemField::ReferencePrice(amount) => self.reference_price = amount,
            ItemField::CostPrice(amount) => self.cost_price = amount,
            ItemField::WonPrice(amount) => self.won_price = amount,
            ItemField::IsWon(flag) => self.is_won = flag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginClass {
    GoodMargin,
    BelowTargetMargin,
    AboveReference,
    NotApplicable,
}

impl MarginClass {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::GoodMargin => "Good Margin",
            Self::BelowTargetMargin => "Below Target Margin",
            Self::AboveReference => "Above Reference",
            Self::NotApplicable => "Not Applicable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemField {
    Description(String),
    ReferencePrice(Amount),
    CostPrice(Amount),
    WonPrice(Amount),
    IsWon(bool),
}

impl ItemField {
    pub fn parse(name: &str, value: &Value) -> Result<Self, BidError> {
        match name {
            "description" => match value {
                Value::String(text) => Ok(Self::Description(text.clone())),
                Value::Null => Ok(Self::Description(String::new())),
                other => Ok(Self::Description(other.to_string())),
            },
            "referencePrice" => Ok(Self::ReferencePrice(Amount::from_json(value))),
            "costPrice" => Ok(Self::CostPrice(Amount::from_json(value))),
            "wonPrice" => Ok(Self::WonPrice(Amount::from_json(value))),
            "isWon" => match value {
                Value::Bool(flag) => Ok(Self::IsWon(*flag)),
                other => Err(BidError::InvalidField {
                    field: "isWon",
                    reason: format!("expected a boolean, got {other}"),
                }),
            },
            other => Err(BidError::UnknownItemField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemLedger {
    items: Vec<Item>,
}

impl ItemLedger {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    /// One item that fails to decode rejects the whole list.
    pub fn from_payload(value: Value) -> Result<Self, serde_json::Error> {
        match unwrap_legacy(value) {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other).map(Self::new),
        }
    }

    /// Decodes a stored row, skipping items that no longer decode.
    pub fn from_stored(value: Value) -> Self {
        let elements = match unwrap_legacy(value) {
            Value::Null => return Self::default(),
            Value::Array(elements) => elements,
            other => {
                warn!(stored = %other, "ignoring stored items that are not a list");
                return Self::default();
            }
        };
        let total = elements.len();
        let items: Vec<Item> = elements
            .into_iter()
            .filter_map(|element| serde_json::from_value(element).ok())
            .collect();
        if items.len() < total {
            warn!(dropped = total - items.len(), "skipping stored items that fail to decode");
        }
        Self::new(items)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn add_item(&mut self) -> &Item {
        self.items.push(Item::new(new_item_id()));
        let last = self.items.len() - 1;
        &self.items[last]
    }

    /// Returns `false` when no item has the given id.
    pub fn update_item(&mut self, item_id: &str, field: ItemField) -> bool {
        match self.items.iter_mut().find(|item| item.id == item_id) {
            Some(item) => {
                item.apply(field);
                true
            }
            None => false,
        }
    }

    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != item_id);
        self.items.len() != before
    }

    pub fn quoted_total(&self) -> f64 {
        round_cents(
            self.items
                .iter()
                .map(|item| item.reference_price.get())
                .sum(),
        )
    }

    pub fn won_total(&self) -> f64 {
        round_cents(self.items.iter().map(Item::effective_won_price).sum())
    }
}
