mod auth;
mod config;
mod dto;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use prov_infra::gateway::GatewayConnector;
use prov_infra::validation::HttpArtifactChecker;
use prov_infra::{CloudConfig, ControlPlaneFactory, ProviderRegistry};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::routes::api_router;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    // Cloud configuration
    let raw = tokio::fs::read_to_string(&config.cloud_config_path)
        .await
        .expect("failed to read cloud configuration");
    let cloud = Arc::new(CloudConfig::from_json(&raw).expect("invalid cloud configuration"));

    let template_name = config
        .template_name
        .clone()
        .or_else(|| cloud.templates.keys().next().cloned())
        .expect("cloud configuration declares no templates");
    let template = cloud
        .template(&template_name)
        .expect("configured template is not declared");

    // Control plane session
    let connector = Arc::new(GatewayConnector::from_env().expect("failed to configure gateway"));
    let control_plane = connector
        .connect(&cloud.provider, &cloud.user, &template.overrides)
        .await
        .expect("failed to connect to control plane");
    tracing::info!(
        provider = %cloud.provider,
        template = %template_name,
        gateway = connector.base_url(),
        "control plane ready"
    );

    let state = AppState::new(
        config.clone(),
        cloud,
        &template_name,
        ProviderRegistry::default(),
        control_plane,
        connector,
        Arc::new(HttpArtifactChecker::new()),
    )
    .expect("failed to build provisioning state");
    let orchestrator = state.orchestrator.clone();

    let app = api_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(addr = %config.listen_addr, "starting provisioning API");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("server error");

    if let Err(e) = orchestrator.close().await {
        tracing::warn!(error = %e, "failed to close control plane");
    }
}
