
//! Cisco Modeling Labs REST client, and a provisioning workflow on top of it.

pub mod rest_types;
pub mod rest;
pub mod topology;
pub mod templates;
pub mod provision;

pub use rest_types as rt;
pub use provision::{Orchestrator, ProvisionState, ProvisioningResult, Stage};
pub use rest::{Authenticate, LabApi, LabClient, Session};
pub use topology::TopologyDescriptor;

use base64::Engine;
use thiserror::Error;

pub const ENV_CML_SERVER: &str = "CML_SERVER";
pub const ENV_CML_USERNAME: &str = "CML_USERNAME";
pub const ENV_CML_PASSWORD: &str = "CML_PASSWORD";
pub const ENV_CML_PASSWORD64: &str = "CML_PASSWORD64";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Missing or invalid environment variable `{0}`")]
	Missing(&'static str),
	#[error("Missing or invalid environment variable(s): `{0}` or `{1}`")]
	MissingEither(&'static str, &'static str),
}

/// Used to get Authentication info from environment variables (CML_SERVER, CML_USERNAME, CML_PASSWORD64, CML_PASSWORD)
pub fn get_auth_env() -> Result<rest::Authenticate, ConfigError> {
	auth_from(|key| std::env::var(key).ok())
}

fn auth_from(var: impl Fn(&str) -> Option<String>) -> Result<rest::Authenticate, ConfigError> {
	let base_url = var(ENV_CML_SERVER)
		.filter(|s| !s.trim().is_empty())
		.ok_or(ConfigError::Missing(ENV_CML_SERVER))?;
	let username = var(ENV_CML_USERNAME)
		.ok_or(ConfigError::Missing(ENV_CML_USERNAME))?;
	let password: String = var(ENV_CML_PASSWORD64)
		.and_then(|s| base64::engine::general_purpose::STANDARD.decode(s.trim()).ok())
		.and_then(|vu8| String::from_utf8(vu8).ok())
		.or_else(|| var(ENV_CML_PASSWORD))
		.ok_or(ConfigError::MissingEither(ENV_CML_PASSWORD64, ENV_CML_PASSWORD))?;

	Ok(rest::Authenticate::new(base_url, username, password))
}
