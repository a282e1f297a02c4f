use std::sync::Arc;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::warn;
use serde::{Deserialize, Serialize};

use cml::rest::LabApi;

use crate::frontend::{ChatFrontEnd, BACKEND_ERROR_MESSAGE};
use crate::intent::IntentModel;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
	pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
	pub response: String,
}

pub fn router<M, A>(frontend: Arc<ChatFrontEnd<M, A>>) -> Router
	where M: IntentModel + 'static, A: LabApi + 'static
{
	Router::new()
		.route("/", get(index))
		.route("/chat", post(chat::<M, A>))
		.with_state(frontend)
}

async fn index() -> Html<&'static str> {
	Html(INDEX_HTML)
}

/// Always answers with a [`ChatResponse`], even when the request body is unusable
async fn chat<M, A>(State(frontend): State<Arc<ChatFrontEnd<M, A>>>, req: Result<Json<ChatRequest>, JsonRejection>) -> Json<ChatResponse>
	where M: IntentModel + 'static, A: LabApi + 'static
{
	let response = match req {
		Ok(Json(req)) => frontend.respond(&req.message).await,
		Err(e) => {
			warn!("rejected chat request: {}", e.body_text());
			BACKEND_ERROR_MESSAGE.to_owned()
		},
	};
	Json(ChatResponse { response })
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use cml::rest::Authenticate;
	use cml::LabClient;
	use crate::frontend::FALLBACK_MESSAGE;
	use crate::intent::{FunctionCall, IntentError};

	struct Silent;

	#[async_trait]
	impl IntentModel for Silent {
		async fn invoke(&self, _message: &str) -> Result<Option<FunctionCall>, IntentError> {
			Ok(None)
		}
	}

	async fn serve() -> String {
		let frontend = ChatFrontEnd::new(Silent, Authenticate::new("http://127.0.0.1:9/api/v0", "u", "p"), LabClient);
		let app = router(Arc::new(frontend));
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		format!("http://{}", addr)
	}

	#[tokio::test]
	async fn chat_endpoint_answers_with_json() {
		let base = serve().await;
		let resp: ChatResponse = reqwest::Client::new()
			.post(format!("{}/chat", base))
			.json(&serde_json::json!({"message": "hello"}))
			.send().await.unwrap()
			.json().await.unwrap();
		assert_eq!(resp.response, FALLBACK_MESSAGE);
	}

	#[tokio::test]
	async fn bad_request_body_still_gets_json() {
		let base = serve().await;
		let client = reqwest::Client::new();

		let resp = client.post(format!("{}/chat", base))
			.json(&serde_json::json!({"text": "hello"}))
			.send().await.unwrap();
		assert!(resp.status().is_success());
		let resp: ChatResponse = resp.json().await.unwrap();
		assert_eq!(resp.response, BACKEND_ERROR_MESSAGE);

		let resp: ChatResponse = client.post(format!("{}/chat", base))
			.header("content-type", "application/json")
			.body("{not json")
			.send().await.unwrap()
			.json().await.unwrap();
		assert_eq!(resp.response, BACKEND_ERROR_MESSAGE);
	}

	#[tokio::test]
	async fn index_is_served() {
		let base = serve().await;
		let resp = reqwest::get(format!("{}/", base)).await.unwrap();
		assert!(resp.status().is_success());
		assert!(resp.text().await.unwrap().contains("/chat"));
	}
}
