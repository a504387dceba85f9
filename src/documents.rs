//! Uploaded documents: category tags, stored-name generation and the
//! certificate expiry convention (`certidao|<YYYY-MM-DD>`).

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Document, NewDocument};
use crate::schema::documents;
use crate::utils::json::parse_date;

pub const CATEGORY_ENTRY: &str = "entry";
pub const CATEGORY_EXIT: &str = "exit";
pub const CERTIFICATE_PREFIX: &str = "certidao";

pub const MAX_ORIGINAL_NAME_LEN: usize = 255;
const MAX_SANITIZED_LEN: usize = 200;

pub const EXPIRY_WARNING_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Entry,
    Exit,
    Certificate { expires_on: Option<NaiveDate> },
    Other(String),
}

impl Category {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            CATEGORY_ENTRY => return Self::Entry,
            CATEGORY_EXIT => return Self::Exit,
            _ => {}
        }
        match raw.split_once('|') {
            Some((CERTIFICATE_PREFIX, date)) => Self::Certificate {
                expires_on: parse_date(date),
            },
            None if raw == CERTIFICATE_PREFIX => Self::Certificate { expires_on: None },
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Unlike `parse`, an unreadable certificate date is an error.
    pub fn from_upload(raw: &str) -> AppResult<Self> {
        let category = Self::parse(raw);
        if let Self::Certificate { expires_on: None } = category {
            let suffix = raw.trim().split_once('|').map(|(_, date)| date.trim());
            if let Some(date) = suffix.filter(|date| !date.is_empty()) {
                return Err(AppError::bad_request(format!(
                    "invalid certificate expiry `{date}`, expected YYYY-MM-DD"
                )));
            }
        }
        Ok(category)
    }

    pub fn as_tag(&self) -> String {
        match self {
            Self::Entry => CATEGORY_ENTRY.to_string(),
            Self::Exit => CATEGORY_EXIT.to_string(),
            Self::Certificate {
                expires_on: Some(date),
            } => format!("{CERTIFICATE_PREFIX}|{}", date.format("%Y-%m-%d")),
            Self::Certificate { expires_on: None } => format!("{CERTIFICATE_PREFIX}|"),
            Self::Other(tag) => tag.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    Expired,
    ExpiringSoon,
    Valid,
    NoExpiry,
}

impl Expiry {
    pub fn classify(expires_on: Option<NaiveDate>, today: NaiveDate) -> Self {
        let Some(expires_on) = expires_on else {
            return Self::NoExpiry;
        };
        if expires_on < today {
            Self::Expired
        } else if expires_on <= today + Duration::days(EXPIRY_WARNING_DAYS) {
            Self::ExpiringSoon
        } else {
            Self::Valid
        }
    }
}

pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// `<unix-millis>-<sanitized name>`. Overlong names keep their tail so the
/// extension survives.
pub fn stored_name(original_name: &str, now: NaiveDateTime) -> String {
    let sanitized = sanitize_file_name(original_name);
    let tail = &sanitized[sanitized.len().saturating_sub(MAX_SANITIZED_LEN)..];
    format!("{}-{tail}", now.and_utc().timestamp_millis())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub category: String,
    pub content_type: Option<String>,
    pub size: i64,
    pub created_at: NaiveDateTime,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            filename: document.stored_name,
            original_name: document.original_name,
            category: document.category,
            content_type: document.content_type,
            size: document.size_bytes,
            created_at: document.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResponse {
    #[serde(flatten)]
    pub document: DocumentResponse,
    pub expires_on: Option<NaiveDate>,
    pub expiry: Expiry,
}

impl CertificateResponse {
    pub fn new(document: Document, today: NaiveDate) -> Self {
        let expires_on = match Category::parse(&document.category) {
            Category::Certificate { expires_on } => expires_on,
            _ => None,
        };
        Self {
            document: document.into(),
            expires_on,
            expiry: Expiry::classify(expires_on, today),
        }
    }
}

pub fn insert_document(conn: &mut PgConnection, new_document: &NewDocument) -> AppResult<Document> {
    let document = diesel::insert_into(documents::table)
        .values(new_document)
        .get_result(conn)?;
    Ok(document)
}

/// Documents newest first. `certidao` matches every certificate whatever
/// its expiry suffix.
pub fn list_documents(conn: &mut PgConnection, category: Option<&str>) -> AppResult<Vec<Document>> {
    let mut query = documents::table.into_boxed();
    match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(CERTIFICATE_PREFIX) => {
            query = query.filter(documents::category.like(format!("{CERTIFICATE_PREFIX}%")));
        }
        Some(category) => {
            query = query.filter(documents::category.eq(category.to_string()));
        }
        None => {}
    }

    let rows = query
        .order((documents::created_at.desc(), documents::id.desc()))
        .load(conn)?;
    Ok(rows)
}

pub fn find_by_stored_name(conn: &mut PgConnection, stored_name: &str) -> AppResult<Document> {
    let document = documents::table
        .filter(documents::stored_name.eq(stored_name))
        .first(conn)?;
    Ok(document)
}

pub fn find_document(conn: &mut PgConnection, document_id: Uuid) -> AppResult<Document> {
    let document = documents::table.find(document_id).first(conn)?;
    Ok(document)
}

pub fn delete_document(conn: &mut PgConnection, document_id: Uuid) -> AppResult<()> {
    let removed = diesel::delete(documents::table.find(document_id)).execute(conn)?;
    if removed == 0 {
        return Err(AppError::not_found());
    }
    Ok(())
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
