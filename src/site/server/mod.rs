// SPDX-License-Identifier: MIT

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::builder::{Envelope, ItemsRequest};
use crate::conditions::{ConditionList, ConditionsError, ValidationError};
use crate::site::{PageContext, SiteCatalog};

/// Shared state of the catalog server
#[derive(Clone)]
pub struct AppState {
    site: Arc<SiteCatalog>,
    token: Option<String>,
}

impl AppState {
    pub fn new(site: SiteCatalog, token: Option<String>) -> Self {
        Self {
            site: Arc::new(site),
            token,
        }
    }

    /// Use `VC_API_TOKEN` as the required bearer token when set
    pub fn from_env(site: SiteCatalog) -> Self {
        let token = env::var("VC_API_TOKEN").ok().filter(|t| !t.is_empty());
        Self::new(site, token)
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let Some(expected) = &self.token else {
            return Ok(());
        };
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented == Some(expected.as_str()) {
            Ok(())
        } else {
            log::warn!("Rejected request with missing or invalid token");
            Err(failure(StatusCode::FORBIDDEN, "Invalid or missing token"))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/sources", post(list_sources))
        .route("/api/items", post(list_items))
        .route("/api/evaluate", post(evaluate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(port: u16, state: AppState) -> Result<(), ConditionsError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, state).await
}

/// Serve on an already bound listener
pub async fn serve_with_listener(
    listener: TcpListener,
    state: AppState,
) -> Result<(), ConditionsError> {
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn reply<T: Serialize>(data: T) -> Response {
    Json(Envelope::ok(data)).into_response()
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(Envelope::<()>::error(message))).into_response()
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_sources(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    reply(state.site.sources())
}

async fn list_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ItemsRequest>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    if request.source.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Missing source");
    }

    let items = match &request.include {
        Some(ids) => state.site.lookup(&request.source, ids),
        None => state.site.items(&request.source, &request.search),
    };
    log::debug!("Serving {} items of '{}'", items.len(), request.source);
    reply(items)
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    /// Either the condition array or the persisted field as a string
    #[serde(default)]
    conditions: Value,
    #[serde(default)]
    context: PageContext,
    #[serde(default)]
    lenient: bool,
}

fn parse_conditions(raw: Value, lenient: bool) -> Result<ConditionList, ValidationError> {
    match raw {
        Value::Null => Ok(ConditionList::empty()),
        Value::String(field) if lenient => ConditionList::from_json_lenient(&field),
        Value::String(field) => ConditionList::from_json(&field),
        other if lenient => ConditionList::from_json_lenient(&other.to_string()),
        other => ConditionList::from_value(other),
    }
}

async fn evaluate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<EvaluateRequest>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }

    match parse_conditions(request.conditions, request.lenient) {
        Ok(conditions) => reply(conditions.evaluate(&request.context)),
        Err(e) => {
            log::warn!("Rejected conditions: {}", e);
            failure(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}
