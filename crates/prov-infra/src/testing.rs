//! In-memory control plane for unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::types::{
    CloudConfig, CloudCredentials, CloudNode, NodeCredentials, NodeSpec, NodeStatus,
    ProvisionTemplate,
};
use crate::{ControlPlane, ControlPlaneFactory, Error, Result};

#[derive(Default)]
struct MockState {
    nodes: BTreeMap<String, CloudNode>,
    scripts: HashMap<String, VecDeque<NodeStatus>>,
    new_node_script: Vec<NodeStatus>,
    new_node_credentials: Option<NodeCredentials>,
    next_id: u32,
    create_calls: usize,
    failing_creates: HashSet<usize>,
    name_lookups: usize,
    destroyed: Vec<String>,
    fail_destroy: bool,
    batch_destroyed: Vec<BTreeSet<String>>,
    list_error: bool,
    images: Vec<String>,
    hardware: Vec<String>,
    locations: Vec<String>,
    default_location: Option<String>,
    default_location_error: bool,
    unresolvable_images: HashSet<String>,
    windows_password: Option<String>,
    windows_pending_polls: usize,
    windows_polls: usize,
    ec2_groups: BTreeMap<String, BTreeSet<String>>,
    ec2_keys: BTreeMap<String, BTreeSet<String>>,
    openstack_groups: BTreeMap<String, Vec<String>>,
    openstack_keys: BTreeMap<String, Vec<String>>,
    cloudstack_groups: BTreeSet<String>,
    cloudstack_keys: BTreeSet<String>,
    closed: bool,
    hang_status: bool,
    hang_password: bool,
}

pub(crate) struct MockControlPlane {
    state: Mutex<MockState>,
}

impl MockControlPlane {
    /// New nodes start PENDING once, then report RUNNING.
    pub fn new() -> Self {
        let state = MockState {
            new_node_script: vec![NodeStatus::Pending, NodeStatus::Running],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn with_script(self, script: &[NodeStatus]) -> Self {
        self.lock().new_node_script = script.to_vec();
        self
    }

    pub fn with_node_credentials(self, credentials: NodeCredentials) -> Self {
        self.lock().new_node_credentials = Some(credentials);
        self
    }

    /// Fail the creation calls at these zero-based call indices.
    pub fn failing_creates(self, calls: &[usize]) -> Self {
        self.lock().failing_creates = calls.iter().copied().collect();
        self
    }

    /// Status lookups never answer.
    pub fn hanging_status_lookups(self) -> Self {
        self.lock().hang_status = true;
        self
    }

    /// Windows password lookups never answer.
    pub fn hanging_password_lookups(self) -> Self {
        self.lock().hang_password = true;
        self
    }

    pub fn failing_destroys(self) -> Self {
        self.lock().fail_destroy = true;
        self
    }

    pub fn failing_listing(self) -> Self {
        self.lock().list_error = true;
        self
    }

    pub fn with_existing(self, node: CloudNode) -> Self {
        self.lock().nodes.insert(node.id.clone(), node);
        self
    }

    pub fn with_inventory(self, images: &[&str], hardware: &[&str], locations: &[&str]) -> Self {
        {
            let mut state = self.lock();
            state.images = images.iter().map(|s| s.to_string()).collect();
            state.hardware = hardware.iter().map(|s| s.to_string()).collect();
            state.locations = locations.iter().map(|s| s.to_string()).collect();
        }
        self
    }

    pub fn with_default_location(self, location: &str) -> Self {
        self.lock().default_location = Some(location.to_string());
        self
    }

    pub fn failing_default_location(self) -> Self {
        self.lock().default_location_error = true;
        self
    }

    pub fn unresolvable_image(self, image: &str) -> Self {
        self.lock().unresolvable_images.insert(image.to_string());
        self
    }

    /// Windows password becomes available after `pending_polls` empty answers.
    pub fn with_windows_password(self, password: &str, pending_polls: usize) -> Self {
        {
            let mut state = self.lock();
            state.windows_password = Some(password.to_string());
            state.windows_pending_polls = pending_polls;
        }
        self
    }

    pub fn with_ec2_groups(self, region: &str, names: &[&str]) -> Self {
        self.lock()
            .ec2_groups
            .insert(region.to_string(), names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_ec2_keys(self, region: &str, names: &[&str]) -> Self {
        self.lock()
            .ec2_keys
            .insert(region.to_string(), names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_openstack_groups(self, zone: &str, names: &[&str]) -> Self {
        self.lock()
            .openstack_groups
            .insert(zone.to_string(), names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_openstack_keys(self, zone: &str, names: &[&str]) -> Self {
        self.lock()
            .openstack_keys
            .insert(zone.to_string(), names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_cloudstack(self, groups: &[&str], keys: &[&str]) -> Self {
        {
            let mut state = self.lock();
            state.cloudstack_groups = groups.iter().map(|s| s.to_string()).collect();
            state.cloudstack_keys = keys.iter().map(|s| s.to_string()).collect();
        }
        self
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn name_lookups(&self) -> usize {
        self.lock().name_lookups
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.lock().destroyed.clone()
    }

    pub fn batch_destroyed(&self) -> Vec<BTreeSet<String>> {
        self.lock().batch_destroyed.clone()
    }

    pub fn windows_polls(&self) -> usize {
        self.lock().windows_polls
    }

    pub fn live_nodes(&self) -> Vec<CloudNode> {
        self.lock().nodes.values().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

pub(crate) fn node(id: &str, group: &str, status: NodeStatus) -> CloudNode {
    CloudNode {
        id: id.to_string(),
        name: Some(group.to_string()),
        group: Some(group.to_string()),
        status,
        private_addresses: vec![format!("ip-{id}")],
        public_addresses: Vec::new(),
        location_id: Some("us-east-1".into()),
        credentials: None,
    }
}

pub(crate) fn config(templates: &[(&str, ProvisionTemplate)]) -> CloudConfig {
    CloudConfig {
        provider: "aws-ec2".into(),
        user: CloudCredentials {
            identity: "AKIA".into(),
            api_key: "secret".into(),
        },
        management_group: "mgmt-".into(),
        machine_name_prefix: "app-".into(),
        management_machines: 2,
        max_servers: 5,
        artifact_url: None,
        templates: templates
            .iter()
            .map(|(name, t)| (name.to_string(), Arc::new(t.clone())))
            .collect(),
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn create_node(&self, spec: &NodeSpec) -> Result<CloudNode> {
        let mut state = self.lock();
        let call = state.create_calls;
        state.create_calls += 1;
        if state.failing_creates.contains(&call) {
            return Err(Error::ControlPlane(format!("quota exceeded on call {call}")));
        }

        state.next_id += 1;
        let n = state.next_id;
        let id = format!("node-{n}");
        let mut script: VecDeque<NodeStatus> = state.new_node_script.iter().copied().collect();
        let status = script.front().copied().unwrap_or(NodeStatus::Pending);

        let node = CloudNode {
            id: id.clone(),
            name: Some(spec.name.clone()),
            group: Some(spec.group.clone()),
            status,
            private_addresses: vec![format!("10.0.0.{n}")],
            public_addresses: vec![format!("203.0.113.{n}")],
            location_id: spec.location_id.clone().or_else(|| Some("us-east-1".into())),
            credentials: state.new_node_credentials.clone(),
        };
        if !script.is_empty() {
            script.pop_front();
        }
        state.scripts.insert(id.clone(), script);
        state.nodes.insert(id, node.clone());
        Ok(node)
    }

    async fn get_node(&self, id: &str) -> Result<Option<CloudNode>> {
        let hang = self.lock().hang_status;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.lock();
        let next = state.scripts.get_mut(id).and_then(|script| {
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().copied()
            }
        });
        match state.nodes.get_mut(id) {
            Some(node) => {
                if let Some(status) = next {
                    node.status = status;
                }
                Ok(Some(node.clone()))
            }
            None => Ok(None),
        }
    }

    async fn get_node_by_address(&self, address: &str) -> Result<Option<CloudNode>> {
        let state = self.lock();
        Ok(state
            .nodes
            .values()
            .find(|n| {
                n.private_addresses.iter().any(|a| a == address)
                    || n.public_addresses.iter().any(|a| a == address)
            })
            .cloned())
    }

    async fn destroy_node(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.destroyed.push(id.to_string());
        if state.fail_destroy {
            return Err(Error::ControlPlane(format!("destroy of {id} rejected")));
        }
        state.nodes.remove(id);
        Ok(())
    }

    async fn destroy_nodes_by_address(&self, addresses: &BTreeSet<String>) -> Result<()> {
        let mut state = self.lock();
        state.batch_destroyed.push(addresses.clone());
        state
            .nodes
            .retain(|_, n| !n.private_addresses.iter().any(|a| addresses.contains(a)));
        Ok(())
    }

    async fn destroy_node_and_wait(&self, id: &str, _timeout: Duration) -> Result<()> {
        self.destroy_node(id).await
    }

    async fn list_nodes(&self) -> Result<Vec<CloudNode>> {
        let state = self.lock();
        if state.list_error {
            return Err(Error::ControlPlane("listing unavailable".into()));
        }
        Ok(state.nodes.values().cloned().collect())
    }

    async fn find_node_by_name(&self, name: &str) -> Result<Option<CloudNode>> {
        let mut state = self.lock();
        state.name_lookups += 1;
        Ok(state
            .nodes
            .values()
            .find(|n| n.name.as_deref() == Some(name))
            .cloned())
    }

    async fn list_images(&self) -> Result<Vec<String>> {
        Ok(self.lock().images.clone())
    }

    async fn list_hardware_profiles(&self) -> Result<Vec<String>> {
        Ok(self.lock().hardware.clone())
    }

    async fn list_assignable_locations(&self) -> Result<Vec<String>> {
        Ok(self.lock().locations.clone())
    }

    async fn resolve_template(
        &self,
        image_id: Option<&str>,
        _hardware_id: Option<&str>,
        location_id: Option<&str>,
    ) -> Result<String> {
        let state = self.lock();
        if let Some(image) = image_id
            && state.unresolvable_images.contains(image)
        {
            return Err(Error::ControlPlane(format!(
                "no hardware profile matches image {image}"
            )));
        }
        location_id
            .map(str::to_string)
            .or_else(|| state.default_location.clone())
            .ok_or_else(|| Error::ControlPlane("no default location".into()))
    }

    async fn default_location(&self) -> Result<Option<String>> {
        let state = self.lock();
        if state.default_location_error {
            return Err(Error::Unsupported("default location"));
        }
        Ok(state.default_location.clone())
    }

    async fn windows_password(&self, _node_id: &str, private_key: &[u8]) -> Result<Option<String>> {
        assert!(!private_key.is_empty(), "private key must be read from disk");
        let hang = self.lock().hang_password;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.lock();
        state.windows_polls += 1;
        if state.windows_polls <= state.windows_pending_polls {
            return Ok(None);
        }
        Ok(state.windows_password.clone())
    }

    async fn ec2_security_groups(&self, region: &str, name: &str) -> Result<Vec<String>> {
        let state = self.lock();
        Ok(state
            .ec2_groups
            .get(region)
            .filter(|names| names.contains(name))
            .map(|_| vec![name.to_string()])
            .unwrap_or_default())
    }

    async fn ec2_key_pairs(&self, region: &str, name: &str) -> Result<Vec<String>> {
        let state = self.lock();
        Ok(state
            .ec2_keys
            .get(region)
            .filter(|names| names.contains(name))
            .map(|_| vec![name.to_string()])
            .unwrap_or_default())
    }

    async fn openstack_security_groups(&self, zone: &str) -> Result<Option<Vec<String>>> {
        Ok(self.lock().openstack_groups.get(zone).cloned())
    }

    async fn openstack_key_pairs(&self, zone: &str) -> Result<Option<Vec<String>>> {
        Ok(self.lock().openstack_keys.get(zone).cloned())
    }

    async fn cloudstack_security_group(&self, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        Ok(state.cloudstack_groups.get(name).cloned())
    }

    async fn cloudstack_key_pair(&self, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        Ok(state.cloudstack_keys.get(name).cloned())
    }

    async fn close(&self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

/// Factory handing out clones of one shared mock.
pub(crate) struct MockFactory {
    plane: Arc<MockControlPlane>,
    reject: bool,
    connects: Mutex<Vec<BTreeMap<String, String>>>,
}

impl MockFactory {
    pub fn new(plane: Arc<MockControlPlane>) -> Self {
        Self {
            plane,
            reject: false,
            connects: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(plane: Arc<MockControlPlane>) -> Self {
        Self {
            reject: true,
            ..Self::new(plane)
        }
    }

    /// Override maps of every connection made, in order.
    pub fn connects(&self) -> Vec<BTreeMap<String, String>> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlPlaneFactory for MockFactory {
    async fn connect(
        &self,
        _provider: &str,
        _credentials: &CloudCredentials,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ControlPlane>> {
        self.connects.lock().unwrap().push(overrides.clone());
        if self.reject {
            return Err(Error::ControlPlane("401 unauthorized".into()));
        }
        Ok(self.plane.clone())
    }
}
