
use log::{error, info, warn};

use cml::rest::{Authenticate, LabApi};
use cml::Orchestrator;

use crate::intent::{IntentModel, TopologyRequest};

pub const FALLBACK_MESSAGE: &str = "Sorry, I did not understand your request. Try something like 'Create a lab with R1 and R2'.";
pub const BACKEND_ERROR_MESSAGE: &str = "Error communicating with the backend.";

/// Answers one chat message: ask the model, provision whatever it asked for, describe the result.
///
/// Every message authenticates its own session, so concurrent messages share nothing mutable.
pub struct ChatFrontEnd<M, A> {
	model: M,
	auth: Authenticate,
	orchestrator: Orchestrator<A>,
}

impl<M: IntentModel, A: LabApi> ChatFrontEnd<M, A> {
	pub fn new(model: M, auth: Authenticate, api: A) -> Self {
		ChatFrontEnd { model, auth, orchestrator: Orchestrator::new(api) }
	}

	pub async fn respond(&self, message: &str) -> String {
		let call = match self.model.invoke(message).await {
			Ok(Some(call)) => call,
			Ok(None) => return FALLBACK_MESSAGE.to_owned(),
			Err(e) => {
				error!("chat processing failed: {}", e);
				return BACKEND_ERROR_MESSAGE.to_owned();
			},
		};

		let request = match TopologyRequest::from_call(&call) {
			Ok(r) => r,
			Err(e) => {
				warn!("unsupported function call {:?}: {}", call.name, e);
				return FALLBACK_MESSAGE.to_owned();
			},
		};

		let topology = match request.topology() {
			Ok(t) => t,
			Err(e) => return format!("Unable to build that topology: {}", e),
		};

		let session = match self.auth.login().await {
			Ok(s) => s,
			Err(e) => return format!("Authentication with CML failed: {}", e.detail),
		};

		info!("provisioning '{}' for chat request", topology.title());
		let result = self.orchestrator.provision(&session, &topology).await;
		result.summary(topology.title())
	}
}
