use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::{
    required_text, without_reserved, Amount, Bid, BidError, BidStatus, Deadlines, ItemLedger,
};
use crate::utils::json::{nullable_date, nullable_time};

/// Omitted fields stay untouched. Unknown keys merge into `extra`; a `null`
/// removes one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub bid_number: Option<String>,
    #[serde(default)]
    pub process_number: Option<String>,
    #[serde(default, deserialize_with = "nullable_date")]
    pub date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable_time")]
    pub time: Option<Option<NaiveTime>>,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub status: Option<BidStatus>,
    // Ignored; always derived.
    #[serde(default)]
    pub value: Option<Amount>,
    #[serde(default, deserialize_with = "nullable_items")]
    pub items: Option<ItemLedger>,
    #[serde(default, deserialize_with = "nullable_deadlines")]
    pub deadlines: Option<Deadlines>,
    #[serde(default, deserialize_with = "nullable_date")]
    pub payment_deadline: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub is_paid: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BidPatch {
    pub fn status(status: BidStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn target_status(&self, current: BidStatus) -> BidStatus {
        match (self.status, self.is_paid) {
            (Some(status), _) => status,
            (None, Some(true)) => BidStatus::Paid,
            (None, Some(false)) if current == BidStatus::Paid => BidStatus::Delivered,
            (None, _) => current,
        }
    }
}

impl Bid {
    /// On error the bid is left untouched.
    pub fn apply_patch(&mut self, patch: BidPatch) -> Result<(), BidError> {
        if let Some(id) = patch.id.as_deref().map(str::trim) {
            if !id.is_empty() && id != self.id {
                return Err(BidError::InvalidField {
                    field: "id",
                    reason: "bid id cannot be changed".into(),
                });
            }
        }

        let target = patch.target_status(self.status);
        self.status.validate_transition(target)?;

        let mut next = self.clone();
        if let Some(value) = patch.organization {
            next.organization = required_text(value, "organization")?;
        }
        if let Some(value) = patch.city {
            next.city = required_text(value, "city")?;
        }
        if let Some(value) = patch.platform {
            next.platform = required_text(value, "platform")?;
        }
        if let Some(value) = patch.bid_number {
            next.bid_number = required_text(value, "bidNumber")?;
        }
        if let Some(value) = patch.process_number {
            next.process_number = required_text(value, "processNumber")?;
        }
        if let Some(value) = patch.modality {
            next.modality = value.trim().to_string();
        }
        if let Some(date) = patch.date {
            next.date = date.ok_or(BidError::MissingField("date"))?;
        }
        if let Some(time) = patch.time {
            next.time = time.ok_or(BidError::MissingField("time"))?;
        }
        if let Some(items) = patch.items {
            next.items = items;
        }
        if let Some(deadlines) = patch.deadlines {
            next.deadlines = deadlines;
        }
        if let Some(payment_deadline) = patch.payment_deadline {
            next.payment_deadline = payment_deadline;
        }
        for (key, value) in without_reserved(patch.extra) {
            if value.is_null() {
                next.extra.remove(&key);
            } else {
                next.extra.insert(key, value);
            }
        }

        next.status = target;
        next.settle_value(self.value);
        *self = next;
        Ok(())
    }
}

pub(crate) fn payload_items<'de, D>(deserializer: D) -> Result<ItemLedger, D::Error>
where
    D: Deserializer<'de>,
{
    ItemLedger::from_payload(Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

fn nullable_items<'de, D>(deserializer: D) -> Result<Option<ItemLedger>, D::Error>
where
    D: Deserializer<'de>,
{
    payload_items(deserializer).map(Some)
}

pub(crate) fn stored_deadlines<'de, D>(deserializer: D) -> Result<Deadlines, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(Deadlines::default()),
        Value::String(raw) if raw.trim().is_empty() => return Ok(Deadlines::default()),
        Value::String(raw) => serde_json::from_str(&raw).map_err(serde::de::Error::custom)?,
        other => other,
    };
    serde_json::from_value(value).map_err(serde::de::Error::custom)
}

fn nullable_deadlines<'de, D>(deserializer: D) -> Result<Option<Deadlines>, D::Error>
where
    D: Deserializer<'de>,
{
    stored_deadlines(deserializer).map(Some)
}
