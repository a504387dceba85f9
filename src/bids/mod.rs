//! Bid aggregate: descriptive fields, item ledger, lifecycle status and
//! the derived monetary value.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::utils::json::{lenient_date, lenient_time, serialize_optional_time, serialize_time};

pub mod ledger;
pub mod lifecycle;
pub mod patch;
pub mod reports;
pub mod repository;

pub use ledger::{Amount, Item, ItemField, ItemLedger, MarginClass, MARKUP_FACTOR};
pub use lifecycle::{derived_value, BidStatus};
pub use patch::BidPatch;
pub use reports::{group_by_city, CityGroup, Dashboard, PaymentsOverview};

/// Keys that are never stored as forward-compatible extras.
const RESERVED_KEYS: &[&str] = &["id", "value", "createdAt", "updatedAt"];

#[derive(Debug, Error, PartialEq)]
pub enum BidError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("cannot move bid from {from} to {to}")]
    InvalidTransition { from: BidStatus, to: BidStatus },
    #[error("unknown bid status `{0}`")]
    UnknownStatus(String),
    #[error("unknown item field `{0}`")]
    UnknownItemField(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deadlines {
    #[serde(default, deserialize_with = "lenient_date")]
    pub docs: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub sign: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub delivery: Option<NaiveDate>,
}

impl Deadlines {
    pub fn from_stored(value: Value) -> Self {
        match value {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            other => serde_json::from_value(other).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: String,
    pub organization: String,
    pub city: String,
    pub platform: String,
    pub bid_number: String,
    pub process_number: String,
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_time")]
    pub time: NaiveTime,
    pub modality: String,
    pub status: BidStatus,
    pub value: f64,
    pub items: ItemLedger,
    pub deadlines: Deadlines,
    pub payment_deadline: Option<NaiveDate>,
    pub is_paid: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bid {
    /// Recomputes `value` for the current status. `frozen` is what a lost
    /// bid keeps.
    pub(crate) fn settle_value(&mut self, frozen: f64) {
        self.value = derived_value(self.status, &self.items, frozen);
        self.is_paid = self.status == BidStatus::Paid;
    }

    /// Applies an item ledger operation and re-derives the value.
    pub fn edit_items<R>(&mut self, edit: impl FnOnce(&mut ItemLedger) -> R) -> R {
        let result = edit(&mut self.items);
        let current = self.value;
        self.settle_value(current);
        result
    }
}

/// Full bid record as submitted for creation (or replacement).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub bid_number: String,
    #[serde(default)]
    pub process_number: String,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient_time",
        serialize_with = "serialize_optional_time"
    )]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub modality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BidStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Amount>,
    #[serde(default, deserialize_with = "patch::payload_items")]
    pub items: ItemLedger,
    #[serde(default, deserialize_with = "patch::stored_deadlines")]
    pub deadlines: Deadlines,
    #[serde(default, deserialize_with = "lenient_date")]
    pub payment_deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BidDraft {
    /// Validates the draft and builds the record. `fallback_id` supplies an
    /// id when the caller did not.
    pub fn into_bid(self, fallback_id: impl FnOnce() -> String) -> Result<Bid, BidError> {
        let id = self
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(fallback_id);

        let organization = required_text(self.organization, "organization")?;
        let city = required_text(self.city, "city")?;
        let platform = required_text(self.platform, "platform")?;
        let bid_number = required_text(self.bid_number, "bidNumber")?;
        let process_number = required_text(self.process_number, "processNumber")?;
        let date = self.date.ok_or(BidError::MissingField("date"))?;
        let time = self.time.ok_or(BidError::MissingField("time"))?;

        let status = self.status.unwrap_or_default();
        let quoted = self.items.quoted_total();
        let frozen = self.value.map(Amount::get).unwrap_or(quoted);

        let mut bid = Bid {
            id,
            organization,
            city,
            platform,
            bid_number,
            process_number,
            date,
            time,
            modality: self.modality.trim().to_string(),
            status,
            value: 0.0,
            items: self.items,
            deadlines: self.deadlines,
            payment_deadline: self.payment_deadline,
            is_paid: false,
            extra: without_reserved(self.extra),
        };
        bid.settle_value(frozen);
        Ok(bid)
    }
}

fn required_text(value: String, field: &'static str) -> Result<String, BidError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(BidError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

pub(crate) fn without_reserved(mut extra: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        extra.remove(*key);
    }
    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> BidDraft {
        serde_json::from_value(value).expect("valid draft")
    }

    fn base() -> Value {
        json!({
            "id": "1712345678901",
            "organization": "City Hall",
            "city": "Campinas",
            "platform": "Comprasnet",
            "bidNumber": "12/2025",
            "processNumber": "3345/2025",
            "date": "2025-05-20",
            "time": "09:00",
            "modality": "Electronic Auction",
            "items": [
                { "id": "a", "description": "Desk", "referencePrice": 100 },
                { "id": "b", "description": "Chair", "referencePrice": "40.5" }
            ],
            "deadlines": { "docs": "", "sign": "", "delivery": "" },
            "paymentDeadline": "",
            "isPaid": false
        })
    }

    #[test]
    fn pending_draft_takes_quoted_total() {
        let bid = draft(base()).into_bid(|| unreachable!()).unwrap();
        assert_eq!(bid.status, BidStatus::Pending);
        assert_eq!(bid.value, 140.5);
        assert_eq!(bid.value, bid.items.quoted_total());
        assert!(!bid.is_paid);
        assert_eq!(bid.deadlines, Deadlines::default());
        assert_eq!(bid.payment_deadline, None);
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut payload = base();
        payload["city"] = json!("  ");
        assert_eq!(
            draft(payload).into_bid(|| "x".into()),
            Err(BidError::MissingField("city"))
        );

        let mut payload = base();
        payload.as_object_mut().unwrap().remove("time");
        assert_eq!(
            draft(payload).into_bid(|| "x".into()),
            Err(BidError::MissingField("time"))
        );
    }

    #[test]
    fn generates_id_when_absent_and_keeps_unknown_fields() {
        let mut payload = base();
        payload.as_object_mut().unwrap().remove("id");
        payload["contactEmail"] = json!("buyer@city.gov");
        payload["createdAt"] = json!("2025-01-01");

        let bid = draft(payload).into_bid(|| "generated".into()).unwrap();
        assert_eq!(bid.id, "generated");
        assert_eq!(bid.extra.get("contactEmail"), Some(&json!("buyer@city.gov")));
        assert!(!bid.extra.contains_key("createdAt"));
        assert!(!bid.extra.contains_key("isPaid"));
    }

    #[test]
    fn won_draft_counts_only_won_items() {
        let mut payload = base();
        payload["status"] = json!("won");
        payload["value"] = json!(9999);
        payload["items"] = json!([
            { "id": "a", "referencePrice": 100, "costPrice": 50, "isWon": true, "wonPrice": 68.5 },
            { "id": "b", "referencePrice": 40, "isWon": false, "wonPrice": 35 }
        ]);

        let bid = draft(payload).into_bid(|| unreachable!()).unwrap();
        assert_eq!(bid.value, 68.5);
        assert_eq!(
            bid.items.get("a").unwrap().margin_classification(),
            MarginClass::GoodMargin
        );
    }

    #[test]
    fn lost_draft_keeps_supplied_value() {
        let mut payload = base();
        payload["status"] = json!("lost");
        payload["value"] = json!(120);
        let bid = draft(payload).into_bid(|| unreachable!()).unwrap();
        assert_eq!(bid.value, 120.0);
    }

    #[test]
    fn paid_flag_follows_status() {
        let mut payload = base();
        payload["status"] = json!("paid");
        payload["isPaid"] = json!(false);
        let bid = draft(payload).into_bid(|| unreachable!()).unwrap();
        assert!(bid.is_paid);
    }

    #[test]
    fn serializes_with_camel_case_and_short_time() {
        let mut payload = base();
        payload["contactEmail"] = json!("buyer@city.gov");
        let bid = draft(payload).into_bid(|| unreachable!()).unwrap();
        let encoded = serde_json::to_value(&bid).unwrap();
        assert_eq!(encoded["time"], json!("09:00"));
        assert_eq!(encoded["bidNumber"], json!("12/2025"));
        assert_eq!(encoded["isPaid"], json!(false));
        assert_eq!(encoded["contactEmail"], json!("buyer@city.gov"));
        assert_eq!(encoded["deadlines"]["docs"], Value::Null);
    }

    #[test]
    fn edit_items_keeps_value_in_step() {
        let mut bid = draft(base()).into_bid(|| unreachable!()).unwrap();
        let new_id = bid.edit_items(|items| items.add_item().id.clone());
        bid.edit_items(|items| {
            items.update_item(&new_id, ItemField::ReferencePrice(Amount::parse("9.5")))
        });
        assert_eq!(bid.value, 150.0);
        assert_eq!(bid.value, bid.items.quoted_total());
    }
}
