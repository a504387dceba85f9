use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = bids)]
pub struct BidRow {
    pub id: String,
    pub organization: String,
    pub city: String,
    pub platform: String,
    pub bid_number: String,
    pub process_number: String,
    pub bid_date: NaiveDate,
    pub bid_time: NaiveTime,
    pub modality: String,
    pub status: String,
    pub value: f64,
    pub items: serde_json::Value,
    pub deadlines: serde_json::Value,
    pub payment_deadline: Option<NaiveDate>,
    pub is_paid: bool,
    pub extra: serde_json::Value,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Full column set written on create, replace and update.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = bids)]
#[diesel(treat_none_as_null = true)]
pub struct BidRecord {
    pub id: String,
    pub organization: String,
    pub city: String,
    pub platform: String,
    pub bid_number: String,
    pub process_number: String,
    pub bid_date: NaiveDate,
    pub bid_time: NaiveTime,
    pub modality: String,
    pub status: String,
    pub value: f64,
    pub items: serde_json::Value,
    pub deadlines: serde_json::Value,
    pub payment_deadline: Option<NaiveDate>,
    pub is_paid: bool,
    pub extra: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: Uuid,
    pub stored_name: String,
    pub original_name: String,
    pub category: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub stored_name: String,
    pub original_name: String,
    pub category: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = settings)]
#[diesel(primary_key(key))]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = settings)]
pub struct NewSetting<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub updated_at: NaiveDateTime,
}
