//! Manual catalog endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::{ApiError, AppState};
use crate::database::{Manual, ManualSummary, StepSummary};
use crate::generation::Lookup;

#[derive(Debug, Serialize)]
pub struct ManualDetail {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub product_image_url: Option<String>,
}

impl From<Manual> for ManualDetail {
    fn from(manual: Manual) -> Self {
        Self {
            id: manual.manual_id,
            name: manual.name,
            slug: manual.slug,
            description: manual.description,
            product_image_url: manual.product_image_url,
        }
    }
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<ManualSummary>> {
    let manuals = state.orchestrator.store().list_manuals().await;
    Json(manuals.iter().map(ManualSummary::from).collect())
}

pub async fn get(
    State(state): State<AppState>,
    Path(manual_id): Path<i32>,
) -> Result<Json<ManualDetail>, ApiError> {
    match state.orchestrator.store().get_manual(manual_id).await {
        Lookup::Found(manual) => Ok(Json(manual.into())),
        Lookup::Missing => Err(ApiError::manual_not_found(manual_id)),
        Lookup::Unavailable => Err(ApiError::StoreUnavailable),
    }
}

pub async fn delete(
    State(state): State<AppState>,
    Path(manual_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    match state.orchestrator.store().delete_manual(manual_id).await {
        Lookup::Found(()) => {
            tracing::info!("Deleted manual {}", manual_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Lookup::Missing => Err(ApiError::manual_not_found(manual_id)),
        Lookup::Unavailable => Err(ApiError::StoreUnavailable),
    }
}

pub async fn steps(
    State(state): State<AppState>,
    Path(manual_id): Path<i32>,
) -> Result<Json<Vec<StepSummary>>, ApiError> {
    let store = state.orchestrator.store();
    if store.get_manual(manual_id).await == Lookup::Missing {
        return Err(ApiError::manual_not_found(manual_id));
    }

    let mut steps = store.steps_for_manual(manual_id).await;
    steps.sort_by_key(|s| s.step_number);
    Ok(Json(steps.iter().map(StepSummary::from).collect()))
}
