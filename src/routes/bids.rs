use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::bids::{
    group_by_city, repository, Bid, BidDraft, BidPatch, BidStatus, CityGroup, Dashboard,
    PaymentsOverview,
};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BidListQuery {
    pub status: Option<String>,
}

impl BidListQuery {
    fn status(&self) -> AppResult<Option<BidStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(raw.parse::<BidStatus>()?)),
        }
    }
}

/// Time-based id for bids created without one.
fn generate_bid_id() -> String {
    Utc::now().timestamp_millis().to_string()
}

pub async fn list_bids(
    State(state): State<AppState>,
    Query(query): Query<BidListQuery>,
) -> AppResult<Json<Vec<Bid>>> {
    let status = query.status()?;
    let mut conn = state.db()?;
    Ok(Json(repository::list_bids(&mut conn, status)?))
}

pub async fn list_bids_by_city(
    State(state): State<AppState>,
    Query(query): Query<BidListQuery>,
) -> AppResult<Json<Vec<CityGroup>>> {
    let status = query.status()?;
    let mut conn = state.db()?;
    let bids = repository::list_bids(&mut conn, status)?;
    Ok(Json(group_by_city(bids)))
}

pub async fn get_bid(
    State(state): State<AppState>,
    Path(bid_id): Path<String>,
) -> AppResult<Json<Bid>> {
    let mut conn = state.db()?;
    Ok(Json(repository::find_bid(&mut conn, &bid_id)?))
}

/// Creates the bid, replacing any stored bid with the same id.
pub async fn create_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<Bid>)> {
    let draft: BidDraft = serde_json::from_value(payload)
        .map_err(|err| AppError::bad_request(format!("invalid bid payload: {err}")))?;
    let bid = draft.into_bid(generate_bid_id)?;

    let mut conn = state.db()?;
    let saved = repository::save_bid(&mut conn, &bid)?;
    info!(
        bid_id = %saved.id,
        status = %saved.status,
        value = saved.value,
        user = %user.username,
        "bid saved"
    );

    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<String>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Bid>> {
    let patch: BidPatch = serde_json::from_value(payload)
        .map_err(|err| AppError::bad_request(format!("invalid bid update: {err}")))?;

    let mut conn = state.db()?;
    let (bid, previous) = repository::update_bid(&mut conn, &bid_id, |bid| {
        let previous = bid.status;
        bid.apply_patch(patch)?;
        Ok(previous)
    })?;

    if previous != bid.status {
        info!(
            bid_id = %bid.id,
            from = %previous,
            to = %bid.status,
            value = bid.value,
            user = %user.username,
            "bid status changed"
        );
    }

    Ok(Json(bid))
}

pub async fn delete_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bid_id): Path<String>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    repository::delete_bid(&mut conn, &bid_id)?;
    info!(bid_id = %bid_id, user = %user.username, "bid deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<Dashboard>> {
    let mut conn = state.db()?;
    let bids = repository::list_bids(&mut conn, None)?;
    Ok(Json(Dashboard::from_bids(&bids)))
}

pub async fn payments(State(state): State<AppState>) -> AppResult<Json<PaymentsOverview>> {
    let mut conn = state.db()?;
    let bids = repository::list_bids(&mut conn, None)?;
    Ok(Json(PaymentsOverview::from_bids(bids)))
}
