//! Gemini `generateContent` client with function calling.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intent::{function_declarations, FunctionCall, IntentError, IntentModel};

#[derive(Debug, Clone)]
pub struct GeminiClientConfig {
	pub api_key: String,
	/// Model name (e.g., "gemini-1.5-flash-latest")
	pub model: String,
	pub endpoint: String,
}

impl Default for GeminiClientConfig {
	fn default() -> Self {
		Self {
			api_key: String::new(),
			model: "gemini-1.5-flash-latest".to_string(),
			endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
		}
	}
}

pub struct GeminiClient {
	client: reqwest::Client,
	config: GeminiClientConfig,
}

impl GeminiClient {
	pub fn new(config: GeminiClientConfig) -> Result<Self, IntentError> {
		let client = reqwest::Client::builder()
			.build()
			.map_err(|e| IntentError::Http(e.to_string()))?;
		Ok(Self { client, config })
	}

	/// The key travels in the `x-goog-api-key` header, never in the URL
	fn build_url(&self) -> String {
		format!("{}/models/{}:generateContent", self.config.endpoint, self.config.model)
	}
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
	contents: Vec<GeminiContent>,
	tools: Vec<GeminiTool>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
	role: String,
	parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
	text: String,
}

#[derive(Debug, Serialize)]
struct GeminiTool {
	#[serde(rename = "functionDeclarations")]
	function_declarations: Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
	candidates: Option<Vec<GeminiCandidate>>,
	error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
	content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
	#[serde(default)]
	parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
	#[serde(rename = "functionCall")]
	function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
	message: String,
}

/// The function call carried by the first candidate, if any
///
/// The model may answer with a text part ahead of its call, so every part of that candidate is checked.
fn first_function_call(response: GeminiResponse) -> Result<Option<FunctionCall>, IntentError> {
	if let Some(error) = response.error {
		return Err(IntentError::Response(format!("Gemini API error: {}", error.message)));
	}
	Ok(response.candidates
		.and_then(|c| c.into_iter().next())
		.and_then(|c| c.content)
		.and_then(|c| c.parts.into_iter().find_map(|p| p.function_call)))
}

#[async_trait]
impl IntentModel for GeminiClient {
	async fn invoke(&self, message: &str) -> Result<Option<FunctionCall>, IntentError> {
		let mut headers = HeaderMap::new();
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		let mut key = HeaderValue::from_str(&self.config.api_key)
			.map_err(|_| IntentError::Http("API key is not a valid header value".into()))?;
		key.set_sensitive(true);
		headers.insert("x-goog-api-key", key);

		let body = GeminiRequest {
			contents: vec![GeminiContent {
				role: "user".to_string(),
				parts: vec![GeminiPart { text: message.to_string() }],
			}],
			tools: vec![GeminiTool { function_declarations: function_declarations() }],
		};

		let response = self.client
			.post(self.build_url())
			.headers(headers)
			.json(&body)
			.send()
			.await
			.map_err(|e| IntentError::Http(e.without_url().to_string()))?;

		if !response.status().is_success() {
			let status = response.status();
			let text = response.text().await.unwrap_or_default();
			return Err(IntentError::Response(format!("HTTP {}: {}", status, text)));
		}

		let text = response.text().await
			.map_err(|e| IntentError::Http(e.without_url().to_string()))?;
		let parsed: GeminiResponse = serde_json::from_str(&text)
			.map_err(|e| IntentError::Serialization(e.to_string()))?;

		let call = first_function_call(parsed)?;
		debug!("model picked {:?}", call.as_ref().map(|c| &c.name));
		Ok(call)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn parse(v: Value) -> GeminiResponse {
		serde_json::from_value(v).unwrap()
	}

	#[test]
	fn build_url_names_model_but_not_key() {
		let client = GeminiClient::new(GeminiClientConfig { api_key: "test-key".into(), ..Default::default() }).unwrap();
		let url = client.build_url();
		assert_eq!(url, "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent");
		assert!(!url.contains("test-key"));
	}

	#[tokio::test]
	async fn transport_errors_do_not_leak_key() {
		// nothing listens on the discard port
		let client = GeminiClient::new(GeminiClientConfig {
			api_key: "SUPERSECRETKEY".into(),
			endpoint: "http://127.0.0.1:9".into(),
			..Default::default()
		}).unwrap();
		let err = client.invoke("create a lab").await.unwrap_err();
		assert!(matches!(err, IntentError::Http(_)));
		assert!(!err.to_string().contains("SUPERSECRETKEY"));
	}

	#[tokio::test]
	async fn key_is_sent_as_header() {
		use axum::http::HeaderMap as AxumHeaders;
		use axum::routing::post;
		use axum::{Json, Router};

		let app = Router::new().route("/models/:model", post(|headers: AxumHeaders| async move {
			let key = headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()).unwrap_or_default().to_owned();
			Json(json!({"candidates": [{"content": {"parts": [{"functionCall": {
				"name": "create_lab_topology_two_routers",
				"args": {"router1_name": key, "router2_name": "R2"}
			}}]}}]}))
		}));
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});

		let client = GeminiClient::new(GeminiClientConfig {
			api_key: "k-42".into(),
			endpoint: format!("http://{}", addr),
			..Default::default()
		}).unwrap();
		let call = client.invoke("create a lab").await.unwrap().unwrap();
		assert_eq!(call.args["router1_name"], "k-42");
	}

	#[test]
	fn request_carries_function_declarations() {
		let body = GeminiRequest {
			contents: vec![GeminiContent { role: "user".into(), parts: vec![GeminiPart { text: "hi".into() }] }],
			tools: vec![GeminiTool { function_declarations: function_declarations() }],
		};
		let v = serde_json::to_value(&body).unwrap();
		assert_eq!(v["tools"][0]["functionDeclarations"][0]["name"], "create_lab_topology_two_routers");
		assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
	}

	#[test]
	fn extracts_function_call() {
		let resp = parse(json!({
			"candidates": [{
				"content": {
					"role": "model",
					"parts": [{
						"functionCall": {
							"name": "create_lab_topology_two_routers",
							"args": {"router1_name": "R1", "router2_name": "R2"}
						}
					}]
				}
			}]
		}));
		let call = first_function_call(resp).unwrap().unwrap();
		assert_eq!(call.name, "create_lab_topology_two_routers");
		assert_eq!(call.args["router2_name"], "R2");
	}

	#[test]
	fn call_after_text_part_is_found() {
		let resp = parse(json!({"candidates": [{"content": {"parts": [
			{"text": "Sure, creating it."},
			{"functionCall": {"name": "create_lab_topology_two_routers", "args": {"router1_name": "A", "router2_name": "B"}}}
		]}}]}));
		let call = first_function_call(resp).unwrap().unwrap();
		assert_eq!(call.args["router1_name"], "A");
	}

	#[test]
	fn text_only_answer_has_no_call() {
		let resp = parse(json!({"candidates": [{"content": {"parts": [{"text": "Hello!"}]}}]}));
		assert_eq!(first_function_call(resp).unwrap(), None);
		assert_eq!(first_function_call(parse(json!({}))).unwrap(), None);
	}

	#[test]
	fn api_error_is_reported() {
		let resp = parse(json!({"error": {"code": 400, "message": "API key not valid"}}));
		assert!(matches!(first_function_call(resp), Err(IntentError::Response(m)) if m.contains("API key not valid")));
	}
}
