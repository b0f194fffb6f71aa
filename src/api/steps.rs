//! Per-step viewer endpoints.
//!
//! Every endpoint answers immediately. Missing generated content comes
//! back as a fallback with `status: pending` and is filled in behind the
//! request.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{fallback, ApiError, AppState};
use crate::generation::{
    Field, FieldValue, GenerationKey, OrientationHint, ReadStatus, StepId, StepPoll,
};
use crate::generator::GenerationInputs;

#[derive(Debug, Deserialize)]
pub struct StepPath {
    manual_id: i32,
    step: i32,
}

impl StepPath {
    fn step_id(&self) -> StepId {
        StepId::new(self.manual_id, self.step)
    }
}

#[derive(Debug, Serialize)]
pub struct ExplanationResponse {
    pub manual_id: i32,
    pub step: i32,
    pub status: ReadStatus,
    pub description: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OrientationResponse {
    pub status: ReadStatus,
    #[serde(flatten)]
    pub hint: OrientationHint,
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    colorized: bool,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub status: ReadStatus,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ChecklistResponse {
    pub status: ReadStatus,
    pub checklist: Vec<String>,
}

async fn source_image(state: &AppState, step: StepId) -> Result<String, ApiError> {
    state
        .source
        .resolve(state.orchestrator.store(), step)
        .await
        .ok_or_else(|| ApiError::step_not_found(step))
}

fn combined(statuses: &[ReadStatus]) -> ReadStatus {
    if statuses.iter().all(|s| *s == ReadStatus::Ready) {
        ReadStatus::Ready
    } else {
        ReadStatus::Pending
    }
}

pub async fn explanation(
    State(state): State<AppState>,
    Path(path): Path<StepPath>,
) -> Result<Json<ExplanationResponse>, ApiError> {
    let step = path.step_id();
    let image_url = source_image(&state, step).await?;
    let inputs = GenerationInputs::image(image_url);

    let description = state
        .orchestrator
        .read(
            GenerationKey { step, field: Field::Description },
            FieldValue::Text(fallback::explanation(step.step_number)),
            inputs.clone(),
        )
        .await;
    let tools = state
        .orchestrator
        .read(
            GenerationKey { step, field: Field::Tools },
            FieldValue::List(fallback::tools(step.step_number)),
            inputs,
        )
        .await;

    Ok(Json(ExplanationResponse {
        manual_id: step.manual_id,
        step: step.step_number,
        status: combined(&[description.status, tools.status]),
        description: description.value.as_text().unwrap_or_default().to_string(),
        tools: tools.value.as_list().map(<[String]>::to_vec).unwrap_or_default(),
    }))
}

pub async fn explanation_status(
    State(state): State<AppState>,
    Path(path): Path<StepPath>,
) -> Result<Json<StepPoll>, ApiError> {
    let step = path.step_id();
    source_image(&state, step).await?;
    Ok(Json(state.orchestrator.poll_step(step).await))
}

pub async fn orientation(
    State(state): State<AppState>,
    Path(path): Path<StepPath>,
) -> Result<Json<OrientationResponse>, ApiError> {
    let step = path.step_id();
    let current = source_image(&state, step).await?;

    // The last step has nothing to compare against
    let next = match step.next() {
        Some(next) => source_image(&state, next).await.ok(),
        None => None,
    };
    let Some(next) = next else {
        return Ok(Json(OrientationResponse {
            status: ReadStatus::Ready,
            hint: OrientationHint::safe_default(),
        }));
    };

    let result = state
        .orchestrator
        .read(
            GenerationKey { step, field: Field::OrientationText },
            FieldValue::Orientation(OrientationHint::safe_default()),
            GenerationInputs::images(current, next),
        )
        .await;

    Ok(Json(OrientationResponse {
        status: result.status,
        hint: result.value.as_orientation().cloned().unwrap_or_default(),
    }))
}

pub async fn image(
    State(state): State<AppState>,
    Path(path): Path<StepPath>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<ImageResponse>, ApiError> {
    let step = path.step_id();
    let image_url = source_image(&state, step).await?;

    if !query.colorized {
        return Ok(Json(ImageResponse {
            status: ReadStatus::Ready,
            url: image_url,
        }));
    }

    let result = state
        .orchestrator
        .read(
            GenerationKey { step, field: Field::ColorizedImageUrl },
            FieldValue::Url(image_url.clone()),
            GenerationInputs::image(image_url.clone()),
        )
        .await;

    let url = match result.value {
        FieldValue::Url(url) => url,
        _ => image_url,
    };
    Ok(Json(ImageResponse {
        status: result.status,
        url,
    }))
}

pub async fn checklist(
    State(state): State<AppState>,
    Path(path): Path<StepPath>,
) -> Result<Json<ChecklistResponse>, ApiError> {
    let step = path.step_id();
    let image_url = source_image(&state, step).await?;

    let response = match state
        .orchestrator
        .checklist(step, GenerationInputs::image(image_url))
        .await?
    {
        Some(checklist) => ChecklistResponse {
            status: ReadStatus::Ready,
            checklist,
        },
        None => ChecklistResponse {
            status: ReadStatus::Pending,
            checklist: Vec::new(),
        },
    };
    Ok(Json(response))
}
