use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Infra(#[from] prov_infra::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        use prov_infra::Error as Infra;

        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Infra(e) => match e {
                Infra::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                Infra::InvalidConfiguration(_) | Infra::UnknownTemplate(_) => {
                    StatusCode::BAD_REQUEST
                }
                Infra::NameSpaceExhausted { .. } | Infra::ExistingFleet { .. } => {
                    StatusCode::CONFLICT
                }
                Infra::NoManagementMachines { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({ "error": self.to_string() });
        // A node left behind by a timeout is reported so it can be cleaned up.
        if let ApiError::Infra(e) = &self
            && let Some(node_id) = e.timed_out_node()
        {
            body["node_id"] = node_id.into();
        }
        (status, axum::Json(body)).into_response()
    }
}
