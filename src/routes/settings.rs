use std::collections::BTreeMap;

use axum::extract::{Json, State};
use diesel::{Connection, PgConnection};
use serde_json::Value;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::settings::{self, GEMINI_API_KEY, MAX_KEY_LEN};
use crate::state::AppState;

fn masked_settings(conn: &mut PgConnection) -> AppResult<BTreeMap<String, String>> {
    let stored = settings::get_all(conn)?;
    Ok(stored
        .into_iter()
        .map(|(key, value)| {
            let shown = settings::masked(&key, &value);
            (key, shown)
        })
        .collect())
}

pub async fn get_settings(
    State(state): State<AppState>,
) -> AppResult<Json<BTreeMap<String, String>>> {
    let mut conn = state.db()?;
    Ok(Json(masked_settings(&mut conn)?))
}

/// Upserts every key of the object; `null` removes the key. The API key
/// as the listing masks it is left alone.
pub async fn save_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<Value>,
) -> AppResult<Json<BTreeMap<String, String>>> {
    let Value::Object(entries) = payload else {
        return Err(AppError::bad_request("settings must be a JSON object"));
    };

    let mut changes = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let key = key.trim().to_string();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(AppError::bad_request(format!(
                "setting keys must be 1 to {MAX_KEY_LEN} characters"
            )));
        }
        let value = match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
            _ => {
                return Err(AppError::bad_request(format!(
                    "setting `{key}` must be a string, number, boolean or null"
                )))
            }
        };
        changes.push((key, value));
    }

    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        for (key, value) in &changes {
            match value {
                Some(value) if key == GEMINI_API_KEY => {
                    let stored = settings::get(conn, key)?;
                    if !stored.is_some_and(|stored| settings::is_masked_echo(key, &stored, value)) {
                        settings::upsert(conn, key, value)?;
                    }
                }
                Some(value) => settings::upsert(conn, key, value)?,
                None => {
                    settings::delete(conn, key)?;
                }
            }
        }
        Ok(())
    })?;

    let keys: Vec<&str> = changes.iter().map(|(key, _)| key.as_str()).collect();
    info!(keys = ?keys, user = %user.username, "settings updated");

    Ok(Json(masked_settings(&mut conn)?))
}
