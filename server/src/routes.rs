use std::sync::Arc;

use affiliate_core::{
    error::LedgerResult,
    store::{LedgerStore, PinRequestRow, Profile},
    types::Role,
};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::ApiError, state::AppState};

/// `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Envelope<Health>> {
    Envelope::ok(Health {
        status: "ok",
        environment: state.config.environment.clone(),
        timestamp: Utc::now(),
    })
}

pub async fn users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<Profile>>>, ApiError> {
    let users = with_store(&state, |store| store.profiles_by_role(None)).await?;
    Ok(Envelope::ok(users))
}

pub async fn promoters_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<Profile>>>, ApiError> {
    let promoters = with_store(&state, |store| store.profiles_by_role(Some(Role::Promoter))).await?;
    Ok(Envelope::ok(promoters))
}

pub async fn customers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<Profile>>>, ApiError> {
    let customers = with_store(&state, |store| store.profiles_by_role(Some(Role::Customer))).await?;
    Ok(Envelope::ok(customers))
}

pub async fn pin_requests_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<PinRequestRow>>>, ApiError> {
    let requests = with_store(&state, |store| store.pin_requests()).await?;
    Ok(Envelope::ok(requests))
}

/// Run a store query on the blocking pool.
async fn with_store<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&LedgerStore) -> LedgerResult<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let store = state.store.lock().map_err(|_| ApiError::StorePoisoned)?;
        f(&store).map_err(ApiError::from)
    })
    .await?
}
