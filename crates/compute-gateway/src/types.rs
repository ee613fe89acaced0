use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Session types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ConnectRequest {
    pub provider: String,
    pub identity: String,
    pub credential: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub id: String,
}

// ── Node types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CreateNodeRequest {
    pub name: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteNodesRequest {
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    pub status: String,
    #[serde(default)]
    pub private_addresses: Vec<String>,
    #[serde(default)]
    pub public_addresses: Vec<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub credentials: Option<LoginCredentials>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Login identity returned by the provider at creation time.
///
/// `password` is `None` when the provider did not return one, which is
/// distinct from an empty password.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginCredentials {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

// ── Inventory types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hardware {
    pub id: String,
    #[serde(default)]
    pub ram_mb: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveTemplateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedTemplate {
    pub image_id: String,
    pub hardware_id: String,
    pub location: Location,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroup {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyPair {
    pub name: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

// ── Windows password ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct WindowsPasswordRequest {
    /// Base64 of the PEM-encoded private key the instance was launched with.
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowsPassword {
    /// `None` until the instance has generated its administrator password.
    #[serde(default)]
    pub password: Option<String>,
}
