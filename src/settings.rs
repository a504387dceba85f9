//! Runtime key/value settings stored in the `settings` table.

use std::collections::BTreeMap;

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::models::{NewSetting, Setting};
use crate::schema::settings;

pub const GEMINI_API_KEY: &str = "gemini_api_key";
pub const COMPANY_NAME: &str = "company_name";

pub const MAX_KEY_LEN: usize = 100;

pub fn get_all(conn: &mut PgConnection) -> AppResult<BTreeMap<String, String>> {
    let rows: Vec<Setting> = settings::table.order(settings::key.asc()).load(conn)?;
    Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
}

pub fn get(conn: &mut PgConnection, key: &str) -> AppResult<Option<String>> {
    let value = settings::table
        .find(key)
        .select(settings::value)
        .first::<String>(conn)
        .optional()?;
    Ok(value)
}

pub fn upsert(conn: &mut PgConnection, key: &str, value: &str) -> AppResult<()> {
    let record = NewSetting {
        key,
        value,
        updated_at: Utc::now().naive_utc(),
    };
    diesel::insert_into(settings::table)
        .values(&record)
        .on_conflict(settings::key)
        .do_update()
        .set(&record)
        .execute(conn)?;
    Ok(())
}

pub fn delete(conn: &mut PgConnection, key: &str) -> AppResult<bool> {
    let deleted = diesel::delete(settings::table.find(key)).execute(conn)?;
    Ok(deleted > 0)
}

/// Key stored through the settings screen, falling back to configuration.
pub fn resolve_api_key(conn: &mut PgConnection, config: &AppConfig) -> AppResult<Option<String>> {
    let stored = get(conn, GEMINI_API_KEY)?.filter(|key| !key.trim().is_empty());
    Ok(stored.or_else(|| config.gemini_api_key.clone()))
}

pub fn resolve_company_name(conn: &mut PgConnection, config: &AppConfig) -> AppResult<String> {
    let stored = get(conn, COMPANY_NAME)?.filter(|name| !name.trim().is_empty());
    Ok(stored.unwrap_or_else(|| config.company_name.clone()))
}

/// Hides secrets when settings are listed back to a client.
pub fn masked(key: &str, value: &str) -> String {
    if key != GEMINI_API_KEY || value.len() <= 4 {
        return value.to_string();
    }
    let tail: String = value.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{tail}")
}

/// Whether `incoming` is the masked form a listing showed for `stored`,
/// i.e. a client posting the listing back unchanged.
pub fn is_masked_echo(key: &str, stored: &str, incoming: &str) -> bool {
    key == GEMINI_API_KEY && incoming.starts_with("****") && masked(key, stored) == incoming
}

#[cfg(test)]
mod tests {
    use super::{is_masked_echo, masked};

    #[test]
    fn masks_only_the_api_key() {
        assert_eq!(masked("gemini_api_key", "AIzaSyExample1234"), "****1234");
        assert_eq!(masked("company_name", "Acme Supplies"), "Acme Supplies");
        assert_eq!(masked("gemini_api_key", "abc"), "abc");
    }

    #[test]
    fn recognises_a_masked_key_posted_back() {
        let stored = "AIzaSyExample1234";
        assert!(is_masked_echo("gemini_api_key", stored, "****1234"));
        assert!(!is_masked_echo("gemini_api_key", stored, "****9999"));
        assert!(!is_masked_echo("gemini_api_key", stored, "AIzaSyOther1234"));
        assert!(!is_masked_echo("company_name", "****1234", "****1234"));
    }
}
