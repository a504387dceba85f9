use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::bids::{repository, Bid, BidStatus, Item, ItemField, MarginClass};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub suggested_won_price: f64,
    pub margin: MarginClass,
    pub margin_label: &'static str,
}

impl From<&Item> for ItemView {
    fn from(item: &Item) -> Self {
        let margin = item.margin_classification();
        Self {
            item: item.clone(),
            suggested_won_price: item.suggested_won_price(),
            margin,
            margin_label: margin.label(),
        }
    }
}

/// Item list of one bid together with the totals derived from it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub bid_id: String,
    pub status: BidStatus,
    pub value: f64,
    pub quoted_total: f64,
    pub won_total: f64,
    pub items: Vec<ItemView>,
}

impl From<&Bid> for LedgerResponse {
    fn from(bid: &Bid) -> Self {
        Self {
            bid_id: bid.id.clone(),
            status: bid.status,
            value: bid.value,
            quoted_total: bid.items.quoted_total(),
            won_total: bid.items.won_total(),
            items: bid.items.items().iter().map(ItemView::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemUpdateRequest {
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

pub async fn list_items(
    State(state): State<AppState>,
    Path(bid_id): Path<String>,
) -> AppResult<Json<LedgerResponse>> {
    let mut conn = state.db()?;
    let bid = repository::find_bid(&mut conn, &bid_id)?;
    Ok(Json(LedgerResponse::from(&bid)))
}

pub async fn add_item(
    State(state): State<AppState>,
    Path(bid_id): Path<String>,
) -> AppResult<(StatusCode, Json<LedgerResponse>)> {
    let mut conn = state.db()?;
    let (bid, item_id) = repository::update_bid(&mut conn, &bid_id, |bid| {
        Ok(bid.edit_items(|ledger| ledger.add_item().id.clone()))
    })?;
    debug!(bid_id = %bid.id, item_id = %item_id, "item added");
    Ok((StatusCode::CREATED, Json(LedgerResponse::from(&bid))))
}

/// Unknown item ids leave the ledger untouched.
pub async fn update_item(
    State(state): State<AppState>,
    Path((bid_id, item_id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> AppResult<Json<LedgerResponse>> {
    let request: ItemUpdateRequest = serde_json::from_value(payload)
        .map_err(|err| AppError::bad_request(format!("invalid item update: {err}")))?;
    let field = ItemField::parse(&request.field, &request.value)?;

    let mut conn = state.db()?;
    let (bid, found) = repository::update_bid(&mut conn, &bid_id, |bid| {
        Ok(bid.edit_items(|ledger| ledger.update_item(&item_id, field)))
    })?;
    if !found {
        debug!(bid_id = %bid.id, item_id = %item_id, "item update ignored: unknown item");
    }
    Ok(Json(LedgerResponse::from(&bid)))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Path((bid_id, item_id)): Path<(String, String)>,
) -> AppResult<Json<LedgerResponse>> {
    let mut conn = state.db()?;
    let (bid, _) = repository::update_bid(&mut conn, &bid_id, |bid| {
        Ok(bid.edit_items(|ledger| ledger.remove_item(&item_id)))
    })?;
    Ok(Json(LedgerResponse::from(&bid)))
}
