use axum::Json;
use axum::extract::State;

use crate::dto::ValidationResponse;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn validate_config(
    State(state): State<AppState>,
) -> Result<Json<ValidationResponse>, ApiError> {
    state.validator.validate().await?;

    Ok(Json(ValidationResponse {
        provider: state.validator.provider().to_string(),
        valid: true,
    }))
}
