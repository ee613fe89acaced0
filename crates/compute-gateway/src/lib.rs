//! Typed Rust client for the multi-cloud compute gateway.
//!
//! Covers the subset needed for provisioning and pre-flight validation:
//! sessions, nodes (create, get, list, delete, batch delete), inventory
//! (images, hardware, locations, template resolution), and the
//! provider-family security-group / key-pair lookups.

mod types;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),

    #[error("gateway {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client bound to one authenticated gateway session.
#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    provider: String,
    session: String,
    http: reqwest::Client,
}

impl GatewayClient {
    /// Open a session for `req.provider` with the given credentials.
    ///
    /// The gateway validates the credentials while building the session,
    /// so a failure here usually means authentication was rejected.
    pub async fn connect(base_url: impl Into<String>, req: &ConnectRequest) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::new();

        let resp = http
            .post(endpoint(&base_url, &["sessions"])?)
            .json(req)
            .send()
            .await?;

        let session: Session = Self::check(resp, "create session").await?.json().await?;

        Ok(Self {
            base_url,
            provider: req.provider.clone(),
            session: session.id,
            http,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Session-scoped URL. Each segment is percent-encoded on its own, so
    /// names taken from configuration cannot change the path.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut all = vec!["sessions", self.session.as_str()];
        all.extend_from_slice(segments);
        endpoint(&self.base_url, &all)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    /// Like `check` but also treats 404 as success (for delete idempotency).
    async fn check_allow_404(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() && status.as_u16() != 404 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    /// GET that maps 404 to `None`.
    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        endpoint: &'static str,
    ) -> Result<Option<T>> {
        let resp = self.http.get(self.url(segments)?).send().await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let value = Self::check(resp, endpoint).await?.json().await?;
        Ok(Some(value))
    }

    async fn get_list<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        endpoint: &'static str,
    ) -> Result<Vec<T>> {
        let resp = self.http.get(self.url(segments)?).send().await?;
        Self::check(resp, endpoint).await?.json().await.map_err(Error::from)
    }

    /// End the session. A session that already expired is not an error.
    pub async fn close(&self) -> Result<()> {
        let resp = self
            .http
            .delete(endpoint(&self.base_url, &["sessions", self.session.as_str()])?)
            .send()
            .await?;

        Self::check_allow_404(resp, "close session").await?;
        Ok(())
    }

    // ── Nodes ────────────────────────────────────────────────────────

    pub async fn create_node(&self, req: &CreateNodeRequest) -> Result<Node> {
        let resp = self.http.post(self.url(&["nodes"])?).json(req).send().await?;

        Self::check(resp, "create node")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn get_node(&self, node_id: &str) -> Result<Option<Node>> {
        self.get_optional(&["nodes", node_id], "get node").await
    }

    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.get_list(&["nodes"], "list nodes").await
    }

    pub async fn find_nodes(&self, query: &[(&str, &str)]) -> Result<Vec<Node>> {
        let resp = self
            .http
            .get(self.url(&["nodes"])?)
            .query(query)
            .send()
            .await?;

        Self::check(resp, "find nodes")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn delete_node(&self, node_id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&["nodes", node_id])?)
            .send()
            .await?;

        Self::check_allow_404(resp, "delete node").await?;
        Ok(())
    }

    /// Delete a node and block until the gateway reports it gone, or
    /// `wait_secs` elapses on the gateway side.
    pub async fn delete_node_and_wait(&self, node_id: &str, wait_secs: u64) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&["nodes", node_id])?)
            .query(&[("wait_secs", wait_secs.to_string())])
            .send()
            .await?;

        Self::check_allow_404(resp, "delete node and wait").await?;
        Ok(())
    }

    pub async fn delete_nodes_by_address(&self, req: &DeleteNodesRequest) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&["nodes", "delete"])?)
            .json(req)
            .send()
            .await?;

        Self::check(resp, "delete nodes").await?;
        Ok(())
    }

    // ── Inventory ────────────────────────────────────────────────────

    pub async fn list_images(&self) -> Result<Vec<Image>> {
        self.get_list(&["images"], "list images").await
    }

    pub async fn list_hardware(&self) -> Result<Vec<Hardware>> {
        self.get_list(&["hardware"], "list hardware").await
    }

    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        self.get_list(&["locations"], "list locations").await
    }

    pub async fn default_location(&self) -> Result<Option<Location>> {
        self.get_optional(&["locations", "default"], "default location").await
    }

    pub async fn resolve_template(&self, req: &ResolveTemplateRequest) -> Result<ResolvedTemplate> {
        let resp = self
            .http
            .post(self.url(&["templates", "resolve"])?)
            .json(req)
            .send()
            .await?;

        Self::check(resp, "resolve template")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── EC2 family ───────────────────────────────────────────────────

    pub async fn ec2_security_groups(&self, region: &str, name: &str) -> Result<Vec<SecurityGroup>> {
        let resp = self
            .http
            .get(self.url(&["ec2", "regions", region, "security-groups"])?)
            .query(&[("name", name)])
            .send()
            .await?;

        Self::check(resp, "describe security groups")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn ec2_key_pairs(&self, region: &str, name: &str) -> Result<Vec<KeyPair>> {
        let resp = self
            .http
            .get(self.url(&["ec2", "regions", region, "key-pairs"])?)
            .query(&[("name", name)])
            .send()
            .await?;

        Self::check(resp, "describe key pairs")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn ec2_windows_password(&self, node_id: &str, private_key_pem: &[u8]) -> Result<WindowsPassword> {
        let body = WindowsPasswordRequest {
            private_key: STANDARD.encode(private_key_pem),
        };

        let resp = self
            .http
            .post(self.url(&["ec2", "nodes", node_id, "windows-password"])?)
            .json(&body)
            .send()
            .await?;

        Self::check(resp, "get windows password")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── OpenStack family ─────────────────────────────────────────────

    /// `None` when the zone does not expose the security-group extension.
    pub async fn openstack_security_groups(&self, zone: &str) -> Result<Option<Vec<SecurityGroup>>> {
        self.get_optional(
            &["openstack", "zones", zone, "security-groups"],
            "list zone security groups",
        )
        .await
    }

    /// `None` when the zone does not expose the key-pair extension.
    pub async fn openstack_key_pairs(&self, zone: &str) -> Result<Option<Vec<KeyPair>>> {
        self.get_optional(&["openstack", "zones", zone, "key-pairs"], "list zone key pairs")
            .await
    }

    // ── CloudStack family ────────────────────────────────────────────

    pub async fn cloudstack_security_group(&self, name: &str) -> Result<Option<SecurityGroup>> {
        self.get_optional(
            &["cloudstack", "security-groups", name],
            "get security group",
        )
        .await
    }

    pub async fn cloudstack_ssh_key_pair(&self, name: &str) -> Result<Option<KeyPair>> {
        self.get_optional(&["cloudstack", "ssh-key-pairs", name], "get ssh key pair")
            .await
    }
}

fn endpoint(base_url: &str, segments: &[&str]) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base_url)
        .map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::InvalidUrl(base_url.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
