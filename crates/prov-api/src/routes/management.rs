use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use prov_infra::MachineRecord;

use crate::dto::StartFleetRequest;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn start_fleet(
    State(state): State<AppState>,
    Json(req): Json<StartFleetRequest>,
) -> Result<(StatusCode, Json<Vec<MachineRecord>>), ApiError> {
    let machines = state
        .fleet
        .start(Duration::from_secs(req.timeout_secs))
        .await?;
    Ok((StatusCode::CREATED, Json(machines)))
}

pub async fn list_fleet(
    State(state): State<AppState>,
) -> Result<Json<Vec<MachineRecord>>, ApiError> {
    Ok(Json(state.fleet.existing().await?))
}

pub async fn stop_fleet(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.fleet.stop().await?;
    Ok(StatusCode::NO_CONTENT)
}
