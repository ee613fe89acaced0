use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use prov_infra::{Deadline, MachineRecord};

use crate::dto::{StartMachineRequest, StopMachineRequest, StopMachineResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn start_machine(
    State(state): State<AppState>,
    Json(req): Json<StartMachineRequest>,
) -> Result<(StatusCode, Json<MachineRecord>), ApiError> {
    let deadline = Deadline::after(req.timeout());

    let record = state
        .orchestrator
        .create_machine(deadline, req.location_id.as_deref())
        .await?;

    tracing::info!(machine_id = %record.machine_id, "machine started");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_machines(
    State(state): State<AppState>,
) -> Result<Json<Vec<MachineRecord>>, ApiError> {
    Ok(Json(state.orchestrator.existing_machines().await?))
}

pub async fn stop_machine(
    State(state): State<AppState>,
    Json(req): Json<StopMachineRequest>,
) -> Result<Json<StopMachineResponse>, ApiError> {
    if req.address.trim().is_empty() {
        return Err(ApiError::BadRequest("address must not be empty".into()));
    }

    let stopped = state
        .orchestrator
        .stop_machine(&req.address, Duration::from_secs(req.timeout_secs))
        .await?;

    Ok(Json(StopMachineResponse {
        address: req.address,
        stopped,
    }))
}
