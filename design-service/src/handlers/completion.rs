use crate::dtos::{CompletionRequest, CompletionResponse};
use crate::middleware::Caller;
use crate::startup::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

/// Upper bound on tokens a caller may request per completion.
const MAX_TOKENS_LIMIT: u32 = 2048;

/// `POST /completions`
pub async fn generate_completion(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    payload: Option<Json<CompletionRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let request = payload.map(|Json(request)| request);
    let prompt = request
        .as_ref()
        .and_then(|r| r.prompt.as_deref())
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Please provide a prompt in the request body."
            ))
        })?;
    let max_tokens = request
        .as_ref()
        .and_then(|r| r.max_tokens)
        .unwrap_or(state.config.completion.default_max_tokens)
        .clamp(1, MAX_TOKENS_LIMIT);

    let secret_name = &state.config.completion.secret_name;
    let api_key = state.secrets.get_secret(secret_name).await.map_err(|e| {
        tracing::error!(secret = %secret_name, "Error retrieving API key: {}", e);
        AppError::InternalError(anyhow::anyhow!("Error retrieving API key: {}", e))
    })?;

    let text = state
        .completions
        .complete(&api_key, prompt, max_tokens)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, "Completion failed: {}", e);
            e
        })?;

    tracing::info!(
        user_id = %user_id,
        prompt_len = prompt.len(),
        max_tokens = max_tokens,
        "Completion generated"
    );

    Ok(Json(CompletionResponse { text }))
}
