
//! Declarative lab descriptions.
//!
//! A [`TopologyDescriptor`] is validated once, when it is built or deserialized, and is read-only afterwards.
//! Whether the referenced interfaces actually exist is only known once the nodes are created on the server.

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
	#[error("Lab title must not be empty")]
	EmptyTitle,
	#[error("Node #{0} has an empty label")]
	EmptyLabel(usize),
	#[error("Node label `{0}` is used more than once")]
	DuplicateLabel(String),
	#[error("Link #{link} references unknown node `{node}`")]
	UnknownNode { link: usize, node: String },
	#[error("Link #{0} connects an interface to itself")]
	SelfLink(usize),
	#[error("Unable to parse topology as YAML")]
	Yaml(#[from] serde_yaml::Error),
	#[error("Unable to parse topology as JSON")]
	Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
	pub label: String,
	pub image_definition: String,
	/// Defaults to the image definition, which is how CML names the stock images.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_definition: Option<String>,
	/// Device configuration, sent verbatim
	#[serde(default)]
	pub configuration: String,
	pub x: isize,
	pub y: isize,
}
impl NodeSpec {
	pub fn new(label: impl Into<String>, image_definition: impl Into<String>, configuration: impl Into<String>, x: isize, y: isize) -> NodeSpec {
		NodeSpec {
			label: label.into(),
			image_definition: image_definition.into(),
			node_definition: None,
			configuration: configuration.into(),
			x,
			y,
		}
	}

	pub fn node_definition(&self) -> &str {
		self.node_definition.as_deref().unwrap_or(&self.image_definition)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEndpoint {
	/// Label of a node within the same topology
	pub node: String,
	/// Interface label on that node, eg: `Ethernet0/0`
	pub interface: String,
}
impl LinkEndpoint {
	pub fn new(node: impl Into<String>, interface: impl Into<String>) -> LinkEndpoint {
		LinkEndpoint { node: node.into(), interface: interface.into() }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
	pub a: LinkEndpoint,
	pub b: LinkEndpoint,
}
impl LinkSpec {
	pub fn new(a: LinkEndpoint, b: LinkEndpoint) -> LinkSpec {
		LinkSpec { a, b }
	}
	pub fn endpoints(&self) -> [&LinkEndpoint; 2] {
		[&self.a, &self.b]
	}
}

/// Unvalidated shape of a topology file
#[derive(Deserialize)]
struct RawTopology {
	title: String,
	#[serde(default)]
	description: Option<String>,
	nodes: Vec<NodeSpec>,
	#[serde(default)]
	links: Vec<LinkSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTopology")]
pub struct TopologyDescriptor {
	title: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	description: Option<String>,
	nodes: Vec<NodeSpec>,
	links: Vec<LinkSpec>,
}

impl TryFrom<RawTopology> for TopologyDescriptor {
	type Error = TopologyError;
	fn try_from(raw: RawTopology) -> Result<Self, Self::Error> {
		let topo = TopologyDescriptor::new(raw.title, raw.nodes, raw.links)?;
		Ok(match raw.description {
			Some(d) => topo.with_description(d),
			None => topo,
		})
	}
}

impl TopologyDescriptor {
	pub fn new(title: impl Into<String>, nodes: Vec<NodeSpec>, links: Vec<LinkSpec>) -> Result<TopologyDescriptor, TopologyError> {
		let title = title.into();
		if title.trim().is_empty() {
			return Err(TopologyError::EmptyTitle);
		}

		let mut labels = HashSet::with_capacity(nodes.len());
		for (i, node) in nodes.iter().enumerate() {
			if node.label.trim().is_empty() {
				return Err(TopologyError::EmptyLabel(i));
			}
			if !labels.insert(node.label.as_str()) {
				return Err(TopologyError::DuplicateLabel(node.label.clone()));
			}
		}

		for (i, link) in links.iter().enumerate() {
			if let Some(ep) = link.endpoints().into_iter().find(|ep| !labels.contains(ep.node.as_str())) {
				return Err(TopologyError::UnknownNode { link: i, node: ep.node.clone() });
			}
			if link.a == link.b {
				return Err(TopologyError::SelfLink(i));
			}
		}

		Ok(TopologyDescriptor { title, description: None, nodes, links })
	}

	pub fn with_description(mut self, description: impl Into<String>) -> TopologyDescriptor {
		self.description = Some(description.into());
		self
	}

	pub fn from_yaml(s: &str) -> Result<TopologyDescriptor, TopologyError> {
		Ok(serde_yaml::from_str(s)?)
	}
	pub fn from_json(s: &str) -> Result<TopologyDescriptor, TopologyError> {
		Ok(serde_json::from_str(s)?)
	}

	pub fn title(&self) -> &str { &self.title }
	/// The lab description, falling back to the title
	pub fn description(&self) -> &str { self.description.as_deref().unwrap_or(&self.title) }
	pub fn nodes(&self) -> &[NodeSpec] { &self.nodes }
	pub fn links(&self) -> &[LinkSpec] { &self.links }
}
