
//! Turns a [`TopologyDescriptor`] into a running lab.
//!
//! The workflow is strictly sequential: lab, then every node in order, then every interface lookup,
//! then every link in order, then start. The first failing step ends the run; anything already
//! created is left on the server.

use std::collections::HashMap;
use std::fmt;
use log::{debug, error, info};
use serde::Serialize;

use crate::rest::{LabApi, Session};
use crate::rest_types as rt;
use crate::topology::{LinkEndpoint, TopologyDescriptor};

/// The step a run failed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
	LabCreate,
	NodeCreate,
	InterfaceResolve,
	LinkCreate,
	Start,
}
impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Stage::LabCreate => "creating the lab",
			Stage::NodeCreate => "creating the nodes",
			Stage::InterfaceResolve => "resolving the node interfaces",
			Stage::LinkCreate => "creating the links",
			Stage::Start => "starting the lab",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionState {
	Unstarted,
	LabCreated,
	NodesCreated,
	InterfacesResolved,
	LinksCreated,
	/// Terminal success
	Started,
	/// Terminal failure
	Failed(Stage),
}
impl ProvisionState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, ProvisionState::Started | ProvisionState::Failed(_))
	}
}

/// Everything a run created, and where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningResult {
	lab_id: Option<String>,
	node_ids: HashMap<String, String>,
	link_ids: Vec<String>,
	started: bool,
	failure_stage: Option<Stage>,
	error_detail: Option<String>,
	state: ProvisionState,
}

impl ProvisioningResult {
	fn new() -> ProvisioningResult {
		ProvisioningResult {
			lab_id: None,
			node_ids: HashMap::new(),
			link_ids: Vec::new(),
			started: false,
			failure_stage: None,
			error_detail: None,
			state: ProvisionState::Unstarted,
		}
	}

	fn advance(&mut self, state: ProvisionState) {
		debug!("provisioning: {:?} -> {:?}", self.state, state);
		self.state = state;
	}

	fn fail(mut self, stage: Stage, detail: impl Into<String>) -> ProvisioningResult {
		let detail = detail.into();
		error!("failed {}: {}", stage, detail);
		self.advance(ProvisionState::Failed(stage));
		self.failure_stage = Some(stage);
		self.error_detail = Some(detail);
		self
	}

	pub fn lab_id(&self) -> Option<&str> { self.lab_id.as_deref() }
	/// Node label to CML node ID
	pub fn node_ids(&self) -> &HashMap<String, String> { &self.node_ids }
	/// Link IDs, in the order the links were described
	pub fn link_ids(&self) -> &[String] { &self.link_ids }
	pub fn started(&self) -> bool { self.started }
	pub fn failure_stage(&self) -> Option<Stage> { self.failure_stage }
	pub fn error_detail(&self) -> Option<&str> { self.error_detail.as_deref() }
	pub fn state(&self) -> ProvisionState { self.state }

	/// One line describing the outcome, for people.
	pub fn summary(&self, title: &str) -> String {
		match (self.failure_stage, &self.lab_id) {
			(None, Some(id)) if self.started => format!("Lab '{}' created and started successfully! ID: {}. Check it in CML.", title, id),
			(Some(stage), lab_id) => {
				let detail = self.error_detail.as_deref().unwrap_or("unknown error");
				match lab_id {
					Some(id) => format!("Failed {} for lab '{}' (ID: {}): {}", stage, title, id, detail),
					None => format!("Failed {} for lab '{}': {}", stage, title, detail),
				}
			},
			_ => format!("Provisioning of lab '{}' did not finish ({:?})", title, self.state),
		}
	}
}

/// Drives a [`LabApi`] through the provisioning steps.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator<A> {
	api: A,
}

impl<A: LabApi> Orchestrator<A> {
	pub fn new(api: A) -> Orchestrator<A> {
		Orchestrator { api }
	}

	pub fn api(&self) -> &A { &self.api }

	/// Provisions `topology` using `session`. Never fails outright; check [`ProvisioningResult::failure_stage`].
	///
	/// Running this twice creates two labs, CML does not deduplicate by title.
	pub async fn provision(&self, session: &Session, topology: &TopologyDescriptor) -> ProvisioningResult {
		let mut result = ProvisioningResult::new();

		let lab_id = match self.api.create_lab(session, topology.title(), topology.description()).await {
			Ok(id) => id,
			Err(e) => return result.fail(Stage::LabCreate, e.to_string()),
		};
		info!("Lab '{}' created. ID: {}", topology.title(), lab_id);
		result.lab_id = Some(lab_id.clone());
		result.advance(ProvisionState::LabCreated);

		for node in topology.nodes() {
			match self.api.create_node(session, &lab_id, node).await {
				Ok(id) => {
					info!("Node '{}' added. ID: {}", node.label, id);
					result.node_ids.insert(node.label.clone(), id);
				},
				Err(e) => return result.fail(Stage::NodeCreate, format!("node '{}': {}", node.label, e)),
			}
		}
		result.advance(ProvisionState::NodesCreated);

		// every interface is resolved before the first link is created
		let resolved = resolve_links(&self.api, session, &lab_id, &result.node_ids, topology).await;
		let link_ends = match resolved {
			Ok(ends) => ends,
			Err(detail) => return result.fail(Stage::InterfaceResolve, detail),
		};
		result.advance(ProvisionState::InterfacesResolved);

		for (link, (src, dst)) in topology.links().iter().zip(&link_ends) {
			match self.api.create_link(session, &lab_id, src, dst).await {
				Ok(id) => {
					info!("Link {}:{} <-> {}:{} created. ID: {}", link.a.node, link.a.interface, link.b.node, link.b.interface, id);
					result.link_ids.push(id);
				},
				Err(e) => return result.fail(Stage::LinkCreate, e.to_string()),
			}
		}
		result.advance(ProvisionState::LinksCreated);

		if let Err(e) = self.api.start_lab(session, &lab_id).await {
			return result.fail(Stage::Start, e.to_string());
		}
		info!("Lab ID: {} started", lab_id);
		result.started = true;
		result.advance(ProvisionState::Started);
		result
	}
}

/// Interface ID pairs for every link, in descriptor order
async fn resolve_links<A: LabApi>(api: &A, session: &Session, lab_id: &str, node_ids: &HashMap<String, String>, topology: &TopologyDescriptor) -> Result<Vec<(String, String)>, String> {
	let mut resolver = InterfaceResolver::new(api, session, lab_id, node_ids);
	let mut ends = Vec::with_capacity(topology.links().len());
	for link in topology.links() {
		let a = resolver.resolve(&link.a).await?;
		let b = resolver.resolve(&link.b).await?;
		ends.push((a, b));
	}
	Ok(ends)
}

/// Looks interfaces up by label, listing each node at most once.
struct InterfaceResolver<'a, A> {
	api: &'a A,
	session: &'a Session,
	lab_id: &'a str,
	node_ids: &'a HashMap<String, String>,
	cache: HashMap<&'a str, Vec<rt::Interface>>,
}

impl<'a, A: LabApi> InterfaceResolver<'a, A> {
	fn new(api: &'a A, session: &'a Session, lab_id: &'a str, node_ids: &'a HashMap<String, String>) -> Self {
		InterfaceResolver { api, session, lab_id, node_ids, cache: HashMap::new() }
	}

	/// Returns the interface ID for an endpoint, or a description of why there is none.
	async fn resolve(&mut self, ep: &LinkEndpoint) -> Result<String, String> {
		let node_ids: &'a HashMap<String, String> = self.node_ids;
		let (label, node_id) = node_ids.get_key_value(ep.node.as_str())
			.ok_or_else(|| format!("node {} was not created", ep.node))?;

		if !self.cache.contains_key(label.as_str()) {
			let interfaces = self.api.list_interfaces(self.session, self.lab_id, node_id).await
				.map_err(|e| format!("listing interfaces of node {}: {}", ep.node, e))?;
			debug!("node {} has interfaces {:?}", ep.node, interfaces.iter().map(|i| &i.label).collect::<Vec<_>>());
			self.cache.insert(label.as_str(), interfaces);
		}

		self.cache.get(label.as_str())
			.and_then(|ints| ints.iter().find(|i| i.label == ep.interface))
			.map(|i| i.id.clone())
			.ok_or_else(|| format!("interface {} not found on node {}", ep.interface, ep.node))
	}
}
