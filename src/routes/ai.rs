use axum::extract::{Json, Path, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::ai::{prompts, Attachment, GenerateRequest};
use crate::ai::{merge_extraction, AiError};
use crate::auth::AuthenticatedUser;
use crate::bids::{repository, Bid, BidDraft};
use crate::error::{AppError, AppResult};
use crate::settings;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub data: String,
    pub mime_type: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateTextRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractBidRequest {
    pub data: String,
    pub mime_type: String,
    #[serde(default)]
    pub draft: Option<BidDraft>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

fn parse_body<T: serde::de::DeserializeOwned>(payload: Value) -> AppResult<T> {
    serde_json::from_value(payload)
        .map_err(|err| AppError::bad_request(format!("invalid request: {err}")))
}

/// API key and company name, read before any await point.
fn ai_context(state: &AppState) -> AppResult<(Option<String>, String)> {
    let mut conn = state.db()?;
    let api_key = settings::resolve_api_key(&mut conn, &state.config)?;
    let company = settings::resolve_company_name(&mut conn, &state.config)?;
    Ok((api_key, company))
}

fn load_bid_and_context(state: &AppState, bid_id: &str) -> AppResult<(Bid, Option<String>, String)> {
    let bid = {
        let mut conn = state.db()?;
        repository::find_bid(&mut conn, bid_id)?
    };
    let (api_key, company) = ai_context(state)?;
    Ok((bid, api_key, company))
}

async fn run_text(
    state: &AppState,
    api_key: Option<&str>,
    request: GenerateRequest,
    purpose: &'static str,
) -> AppResult<Json<TextResponse>> {
    match state.ai.generate(api_key, &request).await {
        Ok(text) => {
            info!(purpose, chars = text.len(), "AI text generated");
            Ok(Json(TextResponse { text }))
        }
        Err(err) => Err(log_ai_failure(err, purpose)),
    }
}

fn log_ai_failure(err: AiError, purpose: &'static str) -> AppError {
    error!(purpose, error = %err, "AI request failed");
    AppError::from(err)
}

pub async fn extract(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<Json<TextResponse>> {
    let request: ExtractRequest = parse_body(payload)?;
    let attachment = Attachment::from_upload(&request.mime_type, &request.data)?;
    let prompt = request
        .prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .unwrap_or_else(|| prompts::EXTRACTION_PROMPT.to_string());

    let (api_key, _) = ai_context(&state)?;
    run_text(
        &state,
        api_key.as_deref(),
        GenerateRequest::extraction(prompt, attachment),
        "extract",
    )
    .await
}

pub async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<Json<TextResponse>> {
    let request: GenerateTextRequest = parse_body(payload)?;
    let (api_key, _) = ai_context(&state)?;
    run_text(
        &state,
        api_key.as_deref(),
        GenerateRequest::text(request.prompt),
        "generate",
    )
    .await
}

/// Reads a bid notice and folds what the model found into the draft.
pub async fn extract_bid(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<Value>,
) -> AppResult<Json<BidDraft>> {
    let request: ExtractBidRequest = parse_body(payload)?;
    let attachment = Attachment::from_upload(&request.mime_type, &request.data)?;
    let (api_key, _) = ai_context(&state)?;

    let extracted = state
        .ai
        .extract_bid(
            api_key.as_deref(),
            &GenerateRequest::extraction(prompts::EXTRACTION_PROMPT, attachment),
        )
        .await
        .map_err(|err| log_ai_failure(err, "extract-bid"))?;

    info!(
        items = extracted.items.len(),
        user = %user.username,
        "bid details extracted"
    );
    Ok(Json(merge_extraction(
        request.draft.unwrap_or_default(),
        extracted,
    )))
}

pub async fn bid_strategy(
    State(state): State<AppState>,
    Path(bid_id): Path<String>,
) -> AppResult<Json<TextResponse>> {
    let (bid, api_key, company) = load_bid_and_context(&state, &bid_id)?;
    let prompt = prompts::strategy_prompt(&bid, &company);
    run_text(&state, api_key.as_deref(), GenerateRequest::text(prompt), "strategy").await
}

pub async fn payment_reminder(
    State(state): State<AppState>,
    Path(bid_id): Path<String>,
) -> AppResult<Json<TextResponse>> {
    let (bid, api_key, company) = load_bid_and_context(&state, &bid_id)?;
    let prompt = prompts::payment_reminder_prompt(&bid, &company);
    run_text(
        &state,
        api_key.as_deref(),
        GenerateRequest::text(prompt),
        "payment-reminder",
    )
    .await
}
