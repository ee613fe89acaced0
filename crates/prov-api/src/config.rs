use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub control_plane_api_key: String,
    pub cloud_config_path: PathBuf,
    /// Template used for machines; the first declared template when unset.
    pub template_name: Option<String>,
    /// Provision machines under the management group naming convention.
    pub management: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            listen_addr: env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".into())
                .parse()
                .expect("LISTEN_ADDR must be a valid socket address"),
            control_plane_api_key: env::var("CONTROL_PLANE_API_KEY")
                .expect("CONTROL_PLANE_API_KEY must be set"),
            cloud_config_path: env::var("CLOUD_CONFIG_PATH")
                .expect("CLOUD_CONFIG_PATH must be set")
                .into(),
            template_name: env::var("PROVISIONING_TEMPLATE")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            management: env::var("PROVISIONING_MANAGEMENT")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::parse_bool;

    #[test]
    fn management_flag_parsing() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
