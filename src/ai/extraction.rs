use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::AiError;
use crate::bids::ledger::new_item_id;
use crate::bids::{Amount, BidDraft, Item, ItemLedger};
use crate::utils::json::{parse_date, parse_time};

/// Fields the model managed to read off a bid notice. Anything it left
/// blank is `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedBid {
    #[serde(default, alias = "orgao", deserialize_with = "text")]
    pub organization: Option<String>,
    #[serde(default, alias = "cidade", deserialize_with = "text")]
    pub city: Option<String>,
    #[serde(default, alias = "plataforma", deserialize_with = "text")]
    pub platform: Option<String>,
    #[serde(default, alias = "numeroPregao", deserialize_with = "text")]
    pub bid_number: Option<String>,
    #[serde(default, alias = "processo", deserialize_with = "text")]
    pub process_number: Option<String>,
    #[serde(default, alias = "data", deserialize_with = "text")]
    pub date: Option<String>,
    #[serde(default, alias = "horario", deserialize_with = "text")]
    pub time: Option<String>,
    #[serde(default, alias = "modalidade", deserialize_with = "text")]
    pub modality: Option<String>,
    #[serde(default, deserialize_with = "items")]
    pub items: Vec<ExtractedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedItem {
    #[serde(default, alias = "descricao")]
    pub description: String,
    #[serde(default, alias = "valorReferencia")]
    pub reference_price: Amount,
}

/// Non-empty trimmed text; numbers are accepted as their decimal form.
fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn items<'de, D>(deserializer: D) -> Result<Vec<ExtractedItem>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(values) => Ok(values
            .into_iter()
            .filter_map(|value| serde_json::from_value::<ExtractedItem>(value).ok())
            .filter(|item| !item.description.trim().is_empty() || !item.reference_price.is_zero())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

impl ExtractedBid {
    /// Decodes the model's reply. Tolerates markdown code fences and prose
    /// around the JSON object.
    pub fn parse(raw: &str) -> Result<Self, AiError> {
        let body = strip_code_fence(raw.trim());
        let json = match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => &body[start..=end],
            _ => return Err(AiError::Malformed("no JSON object in reply".into())),
        };
        serde_json::from_str(json).map_err(|err| AiError::Malformed(err.to_string()))
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }

    pub fn parsed_time(&self) -> Option<NaiveTime> {
        self.time.as_deref().and_then(parse_time)
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    // Drop the language tag line (```json).
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Folds extracted fields into a draft. Extracted values replace what is
/// there; blanks never clobber. Extracted items replace the item list with
/// fresh ids and zeroed cost and won prices; no extracted items keeps the
/// existing list.
pub fn merge_extraction(mut draft: BidDraft, extracted: ExtractedBid) -> BidDraft {
    fn replace(slot: &mut String, value: Option<String>) {
        if let Some(value) = value {
            *slot = value;
        }
    }

    let date = extracted.parsed_date();
    let time = extracted.parsed_time();

    replace(&mut draft.organization, extracted.organization);
    replace(&mut draft.city, extracted.city);
    replace(&mut draft.platform, extracted.platform);
    replace(&mut draft.bid_number, extracted.bid_number);
    replace(&mut draft.process_number, extracted.process_number);
    replace(&mut draft.modality, extracted.modality);
    if date.is_some() {
        draft.date = date;
    }
    if time.is_some() {
        draft.time = time;
    }

    if !extracted.items.is_empty() {
        let items = extracted
            .items
            .into_iter()
            .map(|found| {
                let mut item = Item::new(new_item_id());
                item.description = found.description.trim().to_string();
                item.reference_price = found.reference_price;
                item
            })
            .collect();
        draft.items = ItemLedger::new(items);
    }

    draft
}
