use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use tokio::time::{Instant, timeout_at};

use crate::{
    application::{creatures::CreatureService, error::HttpError},
    config::TimeoutSettings,
    domain::creatures::LookupResult,
};

use super::middleware::{log_responses, set_request_context};

const LOOKUP_SOURCE: &str = "infra::http::public::lookup";

#[derive(Clone)]
pub struct HttpState {
    pub creatures: Arc<CreatureService>,
    pub timeouts: TimeoutSettings,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/v1/pokemon/{name}", get(pokemon))
        .route("/api/v1/pokemon/translated/{name}", get(translated_pokemon))
        .route("/_health", get(health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn pokemon(
    State(state): State<HttpState>,
    Path(name): Path<String>,
) -> Result<Json<LookupResult>, HttpError> {
    let budget = state.timeouts.lookup;
    lookup(&state, &name, false, budget).await
}

async fn translated_pokemon(
    State(state): State<HttpState>,
    Path(name): Path<String>,
) -> Result<Json<LookupResult>, HttpError> {
    let budget = state.timeouts.translated_lookup;
    lookup(&state, &name, true, budget).await
}

async fn lookup(
    state: &HttpState,
    name: &str,
    translate: bool,
    budget: Duration,
) -> Result<Json<LookupResult>, HttpError> {
    let deadline = Instant::now() + budget;
    let result = timeout_at(
        deadline,
        state.creatures.lookup(name, translate, Some(deadline)),
    )
    .await
    .map_err(|_| HttpError::timed_out(LOOKUP_SOURCE))??;

    Ok(Json(result))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn fallback() -> impl IntoResponse {
    HttpError::new(
        "infra::http::public::fallback",
        StatusCode::NOT_FOUND,
        "not found",
        "no route matched",
    )
}
