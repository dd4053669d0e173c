use crate::auth::{authorize, require_identity};
use crate::dtos::{DeleteResponse, DesignResponse, ItemQuery};
use crate::middleware::Caller;
use crate::models::{is_truthy, Design};
use crate::services::record_design_operation;
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use service_core::error::AppError;

type Payload = Option<Json<Map<String, Value>>>;

fn record<T>(operation: &'static str, result: &Result<T, AppError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => match err.status_code().as_u16() {
            400 => "invalid",
            401 => "unauthenticated",
            403 => "forbidden",
            404 => "not_found",
            409 => "conflict",
            _ => "error",
        },
    };
    record_design_operation(operation, outcome);
}

fn required_id(id: Option<&str>) -> Result<&str, AppError> {
    match id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(AppError::BadRequest(anyhow::anyhow!("id is required"))),
    }
}

async fn fetch(state: &AppState, id: &str) -> Result<Design, AppError> {
    state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Item not found")))
}

/// `POST /items`
pub async fn create_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Payload,
) -> Result<impl IntoResponse, AppError> {
    let result = create(&state, &headers, payload).await;
    record("create", &result);
    result.map(|design| (StatusCode::CREATED, Json(design)))
}

async fn create(
    state: &AppState,
    headers: &HeaderMap,
    payload: Payload,
) -> Result<DesignResponse, AppError> {
    let fields = match payload {
        Some(Json(fields))
            if is_truthy(fields.get("version")) && is_truthy(fields.get("generator")) =>
        {
            fields
        }
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Missing required fields: version, generator"
            )))
        }
    };

    let user_id = require_identity(headers)?;
    let design = Design::new(user_id, fields);

    state.store.create(&design).await.map_err(|e| {
        tracing::error!(design_id = %design.id, "Failed to store design: {}", e);
        e
    })?;

    tracing::info!(
        design_id = %design.id,
        user_id = %design.user_id,
        "Design created"
    );

    Ok(DesignResponse::from(design))
}

/// `GET /items`: one design when `id` is given, otherwise all of the caller's.
pub async fn get_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Query<ItemQuery>,
) -> Result<axum::response::Response, AppError> {
    if query.id.is_some() {
        return read_item(State(state), headers, query)
            .await
            .map(IntoResponse::into_response);
    }

    let result = match require_identity(&headers) {
        Ok(user_id) => list(&state, &user_id).await,
        Err(e) => Err(e.into()),
    };
    record("list", &result);
    result.map(|designs| Json(designs).into_response())
}

/// `GET /readUserItems`
pub async fn read_user_items(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> Result<impl IntoResponse, AppError> {
    let result = list(&state, &user_id).await;
    record("list", &result);
    result.map(Json)
}

async fn list(state: &AppState, user_id: &str) -> Result<Vec<DesignResponse>, AppError> {
    let designs = state.store.find_by_owner(user_id).await.map_err(|e| {
        tracing::error!(user_id = %user_id, "Failed to list designs: {}", e);
        e
    })?;

    tracing::debug!(user_id = %user_id, count = designs.len(), "Listed designs");

    Ok(designs.into_iter().map(DesignResponse::from).collect())
}

/// `GET /items?id=`
pub async fn read_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ItemQuery>,
) -> Result<impl IntoResponse, AppError> {
    let result = read(&state, &headers, query.id.as_deref()).await;
    record("read", &result);
    result.map(Json)
}

async fn read(
    state: &AppState,
    headers: &HeaderMap,
    id: Option<&str>,
) -> Result<DesignResponse, AppError> {
    let id = required_id(id)?;
    let design = fetch(state, id).await?;

    authorize(headers, Some(&design)).map_err(|e| {
        tracing::warn!(design_id = %id, "Read denied: {}", e);
        e
    })?;

    Ok(DesignResponse::from(design))
}

/// `PUT /items`
pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Payload,
) -> Result<impl IntoResponse, AppError> {
    let result = update(&state, &headers, payload).await;
    record("update", &result);
    result.map(Json)
}

async fn update(
    state: &AppState,
    headers: &HeaderMap,
    payload: Payload,
) -> Result<DesignResponse, AppError> {
    let mut fields = payload.map(|Json(fields)| fields).unwrap_or_default();
    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        _ => String::new(),
    };
    let id = required_id(Some(id.as_str()))?;

    let mut design = fetch(state, id).await?;

    let user_id = authorize(headers, Some(&design)).map_err(|e| {
        tracing::warn!(design_id = %id, "Update denied: {}", e);
        e
    })?;

    let expected = design.revision();
    design.merge(fields);

    state.store.replace(&design, &expected).await.map_err(|e| {
        tracing::warn!(design_id = %id, user_id = %user_id, "Failed to replace design: {}", e);
        e
    })?;

    tracing::info!(design_id = %id, user_id = %user_id, "Design updated");

    Ok(DesignResponse::from(design))
}

/// `DELETE /items?id=`
pub async fn delete_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ItemQuery>,
) -> Result<impl IntoResponse, AppError> {
    let result = delete(&state, &headers, query.id.as_deref()).await;
    record("delete", &result);
    result.map(Json)
}

async fn delete(
    state: &AppState,
    headers: &HeaderMap,
    id: Option<&str>,
) -> Result<DeleteResponse, AppError> {
    let id = required_id(id)?;
    let design = fetch(state, id).await?;

    let user_id = authorize(headers, Some(&design)).map_err(|e| {
        tracing::warn!(design_id = %id, "Delete denied: {}", e);
        e
    })?;

    // Gone or re-owned between the read and the delete
    if !state.store.delete(id, &user_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Item not found")));
    }

    tracing::info!(design_id = %id, user_id = %user_id, "Design deleted");

    Ok(DeleteResponse {
        message: "Item deleted successfully".to_string(),
        id: id.to_string(),
    })
}
