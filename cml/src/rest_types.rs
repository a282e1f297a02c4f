
use serde::{Deserialize, Serialize};

/// Body for `POST /authenticate`
#[derive(Serialize)]
pub struct AuthRequest<'a> {
	pub username: &'a str,
	pub password: &'a str,
}

/// Body for `POST /labs`
#[derive(Debug, Serialize)]
pub struct NewLab<'a> {
	pub title: &'a str,
	pub description: &'a str,
}

/// Body for `POST /labs/{lab_id}/nodes`
#[derive(Debug, Serialize)]
pub struct NewNode<'a> {
	pub label: &'a str,
	pub image_definition: &'a str,
	pub node_definition: &'a str,
	pub configuration: &'a str,
	pub x: isize,
	pub y: isize,
}

/// Body for `POST /labs/{lab_id}/links`
#[derive(Debug, Serialize)]
pub struct NewLink<'a> {
	pub src_int: &'a str,
	pub dst_int: &'a str,
}

/// The part of a creation response we care about. CML echoes back the whole object, we only keep its ID.
#[derive(Debug, Deserialize)]
pub struct Created {
	pub id: String,
}

/// A node interface, as returned by `GET /labs/{lab_id}/nodes/{node_id}/interfaces?data=true`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
	pub id: String,
	pub label: String,
	/// physical, loopback, etc
	#[serde(rename = "type", default)]
	pub mode: Option<String>,
	#[serde(default)]
	pub slot: Option<u64>,
	#[serde(default)]
	pub is_connected: Option<bool>,
}
