
//! Typed view of the model's function calls.
//!
//! The model is offered a closed set of functions. Whatever it picks is decoded once, here, into a
//! [`TopologyRequest`]; nothing downstream looks at function names.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use cml::templates;
use cml::topology::{TopologyDescriptor, TopologyError};

#[derive(Debug, Error)]
pub enum IntentError {
	#[error("http error: {0}")]
	Http(String),
	#[error("response error: {0}")]
	Response(String),
	#[error("serialization error: {0}")]
	Serialization(String),
}

/// A function invocation as the model returned it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
	pub name: String,
	#[serde(default)]
	pub args: Value,
}

/// Turns a user message into at most one function call.
#[async_trait]
pub trait IntentModel: Send + Sync {
	async fn invoke(&self, message: &str) -> Result<Option<FunctionCall>, IntentError>;
}

/// The labs users can ask for
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum TopologyRequest {
	CreateLabTopologyTwoRouters {
		router1_name: String,
		router2_name: String,
	},
}

impl TopologyRequest {
	/// Fails for unknown function names and for arguments of the wrong shape
	pub fn from_call(call: &FunctionCall) -> Result<TopologyRequest, serde_json::Error> {
		serde_json::from_value(json!({ "name": call.name, "args": call.args }))
	}

	pub fn topology(&self) -> Result<TopologyDescriptor, TopologyError> {
		match self {
			TopologyRequest::CreateLabTopologyTwoRouters { router1_name, router2_name } => {
				let title = format!("LAB_{}_{}_Automated", router1_name, router2_name);
				templates::two_router_lab(&title, router1_name, router2_name)
			},
		}
	}
}

/// Function declarations offered to the model, one per [`TopologyRequest`] variant
pub fn function_declarations() -> Value {
	json!([
		{
			"name": "create_lab_topology_two_routers",
			"description": "Creates a new Cisco CML2 topology with two routers (for example R1 and R2) using the iol-xe image, \
				connected through interface Ethernet0/0, addressed 10.1.2.1/24 on the first router and 10.1.2.2/24 on the second. \
				Both routers get a basic hostname and interface IP configuration.",
			"parameters": {
				"type": "object",
				"properties": {
					"router1_name": {
						"type": "string",
						"description": "Name of the first router, such as R1."
					},
					"router2_name": {
						"type": "string",
						"description": "Name of the second router, such as R2."
					}
				},
				"required": ["router1_name", "router2_name"]
			}
		}
	])
}

#[cfg(test)]
mod tests {
	use super::*;

	fn call(name: &str, args: Value) -> FunctionCall {
		FunctionCall { name: name.into(), args }
	}

	#[test]
	fn decodes_two_router_request() {
		let req = TopologyRequest::from_call(&call("create_lab_topology_two_routers", json!({"router1_name": "R1", "router2_name": "R2"}))).unwrap();
		assert_eq!(req, TopologyRequest::CreateLabTopologyTwoRouters { router1_name: "R1".into(), router2_name: "R2".into() });

		let topo = req.topology().unwrap();
		assert_eq!(topo.title(), "LAB_R1_R2_Automated");
		assert_eq!(topo.nodes()[0].label, "R1");
	}

	#[test]
	fn rejects_unknown_function_and_bad_args() {
		assert!(TopologyRequest::from_call(&call("delete_everything", json!({}))).is_err());
		assert!(TopologyRequest::from_call(&call("create_lab_topology_two_routers", json!({"router1_name": "R1"}))).is_err());
	}

	#[test]
	fn declarations_cover_every_request() {
		let decls = function_declarations();
		let names: Vec<&str> = decls.as_array().unwrap().iter().filter_map(|d| d["name"].as_str()).collect();
		assert_eq!(names, ["create_lab_topology_two_routers"]);
	}
}
