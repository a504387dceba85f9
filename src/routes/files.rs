use axum::body::Body;
use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::documents::{
    self, CertificateResponse, Category, DocumentResponse, CERTIFICATE_PREFIX,
    MAX_ORIGINAL_NAME_LEN,
};
use crate::error::{AppError, AppResult};
use crate::models::NewDocument;
use crate::state::AppState;
use crate::storage::ObjectStorage;

#[derive(Debug, Deserialize)]
pub struct FileListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
}

fn attachment_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let ascii_fallback: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_ascii() && !ch.is_ascii_control() => ch,
            _ => '_',
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "attachment; filename=\"{ascii_fallback}\"; filename*=UTF-8''{encoded}"
    ))
}

pub async fn upload_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut category: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                original_name = field.file_name().map(str::to_string);
                content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                file_bytes = Some(data.to_vec());
            }
            // `type` is what older clients send.
            Some(field_name @ ("category" | "type")) => {
                let is_alias = field_name == "type";
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid category: {err}"))
                })?;
                if !is_alias || category.is_none() {
                    category = Some(value);
                }
            }
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| {
        warn!("upload rejected: missing file field");
        AppError::bad_request("file field is required")
    })?;
    if file_bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    let original_name = original_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::bad_request("filename is required"))?;
    if original_name.chars().count() > MAX_ORIGINAL_NAME_LEN {
        return Err(AppError::bad_request(format!(
            "filename must be at most {MAX_ORIGINAL_NAME_LEN} characters"
        )));
    }
    let category = Category::from_upload(category.as_deref().unwrap_or_default())?.as_tag();

    let now = Utc::now().naive_utc();
    let stored_name = documents::stored_name(&original_name, now);
    let content_type = content_type.filter(|mime| mime.len() <= 100).or_else(|| {
        mime_guess::from_path(&original_name)
            .first()
            .map(|mime| mime.to_string())
    });
    let size_bytes = file_bytes.len() as i64;

    state
        .storage
        .put_object(
            &stored_name,
            file_bytes,
            content_type.clone(),
            attachment_content_disposition(&original_name),
        )
        .await
        .map_err(|err| {
            error!(error = ?err, stored_name = %stored_name, "failed to store upload");
            AppError::internal(err)
        })?;

    let mut conn = state.db()?;
    let inserted = documents::insert_document(
        &mut conn,
        &NewDocument {
            id: Uuid::new_v4(),
            stored_name: stored_name.clone(),
            original_name,
            category,
            content_type,
            size_bytes,
        },
    );
    let document = match inserted {
        Ok(document) => document,
        Err(err) => {
            if let Err(cleanup) = state.storage.delete_object(&stored_name).await {
                warn!(error = ?cleanup, stored_name = %stored_name, "failed to remove orphaned upload");
            }
            return Err(err);
        }
    };

    info!(
        document_id = %document.id,
        stored_name = %document.stored_name,
        category = %document.category,
        size_bytes = document.size_bytes,
        user = %user.username,
        "document uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: document.id,
            filename: document.stored_name,
        }),
    ))
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileListQuery>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    let rows = documents::list_documents(&mut conn, query.category.as_deref())?;
    Ok(Json(rows.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn list_certificates(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CertificateResponse>>> {
    let mut conn = state.db()?;
    let today = documents::today();
    let rows = documents::list_documents(&mut conn, Some(CERTIFICATE_PREFIX))?;
    Ok(Json(
        rows.into_iter()
            .map(|row| CertificateResponse::new(row, today))
            .collect(),
    ))
}

pub async fn delete_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (document, row_removed) = {
        let mut conn = state.db()?;
        let document = documents::find_document(&mut conn, document_id)?;
        let row_removed = documents::delete_document(&mut conn, document_id);
        (document, row_removed)
    };

    remove_stored_bytes(state.storage.as_ref(), &document.stored_name, row_removed).await?;

    info!(document_id = %document.id, user = %user.username, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Byte removal is attempted whatever happened to the row; a failure there
/// is only logged, a failed row removal is returned after it.
async fn remove_stored_bytes(
    storage: &dyn ObjectStorage,
    stored_name: &str,
    row_removed: AppResult<()>,
) -> AppResult<()> {
    if let Err(err) = storage.delete_object(stored_name).await {
        warn!(
            error = ?err,
            stored_name = %stored_name,
            row_removed = row_removed.is_ok(),
            "stored bytes could not be removed"
        );
    }
    if let Err(err) = &row_removed {
        error!(error = %err, stored_name = %stored_name, "document row could not be removed");
    }
    row_removed
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let document = {
        let mut conn = state.db()?;
        documents::find_by_stored_name(&mut conn, &filename)?
    };

    let bytes = state
        .storage
        .get_object(&document.stored_name)
        .await
        .map_err(|err| {
            warn!(error = ?err, stored_name = %document.stored_name, "stored bytes missing");
            AppError::new(StatusCode::NOT_FOUND, "file not found")
        })?;

    let content_type = document
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Some(value) = attachment_content_disposition(&document.original_name)
        .and_then(|value| HeaderValue::from_str(&value).ok())
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::{attachment_content_disposition, remove_stored_bytes};
    use crate::error::AppError;
    use crate::storage::{LocalDiskStorage, ObjectStorage};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn bytes_are_removed_even_when_the_row_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path()).await.unwrap();
        storage
            .put_object("1700000000000-nf.pdf", b"%PDF".to_vec(), None, None)
            .await
            .unwrap();

        let result = remove_stored_bytes(
            &storage,
            "1700000000000-nf.pdf",
            Err(AppError::internal("connection reset")),
        )
        .await;
        assert_eq!(result.unwrap_err().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(storage.list_objects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_bytes_do_not_fail_a_removed_row() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path()).await.unwrap();

        assert!(remove_stored_bytes(&storage, "gone.pdf", Ok(())).await.is_ok());
    }

    #[test]
    fn content_disposition_keeps_original_name() {
        let value = attachment_content_disposition("Certidão \"FGTS\".pdf").unwrap();
        assert_eq!(
            value,
            "attachment; filename=\"Certid_o _FGTS_.pdf\"; filename*=UTF-8''Certid%C3%A3o%20%22FGTS%22%2Epdf"
        );
        assert_eq!(attachment_content_disposition(""), None);
    }
}
