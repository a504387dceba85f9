//! Bid persistence. Items, deadlines and forward-compatible extras live in
//! JSONB columns; callers only ever see the typed [`Bid`].

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;

use super::{Bid, BidStatus, Deadlines, ItemLedger};
use crate::error::{AppError, AppResult};
use crate::models::{BidRecord, BidRow};
use crate::schema::bids;

impl TryFrom<BidRow> for Bid {
    type Error = AppError;

    fn try_from(row: BidRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<BidStatus>().map_err(|err| {
            AppError::internal(format!("bid {} has corrupt status: {err}", row.id))
        })?;
        let extra = match row.extra {
            Value::Object(map) => map,
            _ => Default::default(),
        };

        Ok(Bid {
            id: row.id,
            organization: row.organization,
            city: row.city,
            platform: row.platform,
            bid_number: row.bid_number,
            process_number: row.process_number,
            date: row.bid_date,
            time: row.bid_time,
            modality: row.modality,
            status,
            value: row.value,
            items: ItemLedger::from_stored(row.items),
            deadlines: Deadlines::from_stored(row.deadlines),
            payment_deadline: row.payment_deadline,
            is_paid: row.is_paid,
            extra,
        })
    }
}

fn to_record(bid: &Bid) -> AppResult<BidRecord> {
    Ok(BidRecord {
        id: bid.id.clone(),
        organization: bid.organization.clone(),
        city: bid.city.clone(),
        platform: bid.platform.clone(),
        bid_number: bid.bid_number.clone(),
        process_number: bid.process_number.clone(),
        bid_date: bid.date,
        bid_time: bid.time,
        modality: bid.modality.clone(),
        status: bid.status.as_str().to_string(),
        value: bid.value,
        items: serde_json::to_value(&bid.items)?,
        deadlines: serde_json::to_value(&bid.deadlines)?,
        payment_deadline: bid.payment_deadline,
        is_paid: bid.is_paid,
        extra: Value::Object(bid.extra.clone()),
        updated_at: Utc::now().naive_utc(),
    })
}

/// All bids, optionally of one status, in schedule order.
pub fn list_bids(conn: &mut PgConnection, status: Option<BidStatus>) -> AppResult<Vec<Bid>> {
    let mut query = bids::table.into_boxed();
    if let Some(status) = status {
        query = query.filter(bids::status.eq(status.as_str()));
    }

    let rows: Vec<BidRow> = query
        .order((bids::bid_date.asc(), bids::bid_time.asc(), bids::id.asc()))
        .load(conn)?;

    rows.into_iter().map(Bid::try_from).collect()
}

pub fn find_bid(conn: &mut PgConnection, bid_id: &str) -> AppResult<Bid> {
    let row: BidRow = bids::table.find(bid_id).first(conn)?;
    Bid::try_from(row)
}

/// Inserts the bid, replacing any stored record with the same id.
pub fn save_bid(conn: &mut PgConnection, bid: &Bid) -> AppResult<Bid> {
    let record = to_record(bid)?;
    diesel::insert_into(bids::table)
        .values(&record)
        .on_conflict(bids::id)
        .do_update()
        .set(&record)
        .execute(conn)?;
    find_bid(conn, &bid.id)
}

/// Loads the bid under a row lock, lets `change` mutate it and writes the
/// result back in the same transaction. Nothing is written when `change`
/// fails.
pub fn update_bid<F, R>(conn: &mut PgConnection, bid_id: &str, change: F) -> AppResult<(Bid, R)>
where
    F: FnOnce(&mut Bid) -> AppResult<R>,
{
    conn.transaction(|conn| {
        let row: BidRow = bids::table.find(bid_id).for_update().first(conn)?;
        let mut bid = Bid::try_from(row)?;
        let outcome = change(&mut bid)?;

        let record = to_record(&bid)?;
        diesel::update(bids::table.find(bid_id))
            .set(&record)
            .execute(conn)?;

        Ok((bid, outcome))
    })
}

pub fn delete_bid(conn: &mut PgConnection, bid_id: &str) -> AppResult<()> {
    let deleted = diesel::delete(bids::table.find(bid_id)).execute(conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    Ok(())
}
