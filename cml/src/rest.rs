
use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::rest_types as rt;
use crate::topology::NodeSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
	/// The server rejected the credentials (4xx)
	Unauthorized,
	/// The server could not be reached, or could not answer
	Unreachable,
	/// The server answered, but not with a JSON string token
	MalformedResponse,
}

#[derive(Debug, Clone, Error)]
#[error("Authentication failed ({kind:?}): {detail}")]
pub struct AuthError {
	pub kind: AuthErrorKind,
	pub detail: String,
}
impl AuthError {
	fn new(kind: AuthErrorKind, detail: impl Into<String>) -> AuthError {
		AuthError { kind, detail: detail.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
	/// Non-2xx response
	HttpStatus(u16),
	/// Transport level failure (DNS, TLS, refused connection, ...)
	Unreachable,
	/// 2xx response whose body did not have the expected shape
	MalformedResponse,
}

/// A failed call against one endpoint. `body` holds the response body, or the transport error message.
#[derive(Debug, Clone)]
pub struct ApiError {
	pub endpoint: String,
	pub kind: ApiErrorKind,
	pub body: String,
}
impl ApiError {
	fn new(endpoint: impl Into<String>, kind: ApiErrorKind, body: impl Into<String>) -> ApiError {
		ApiError {
			endpoint: endpoint.into(),
			kind,
			body: body.into(),
		}
	}

	pub fn status(&self) -> Option<u16> {
		match self.kind {
			ApiErrorKind::HttpStatus(code) => Some(code),
			_ => None,
		}
	}
}
impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			ApiErrorKind::HttpStatus(code) => write!(f, "{} responded with HTTP {}", self.endpoint, code)?,
			ApiErrorKind::Unreachable => write!(f, "unable to reach {}", self.endpoint)?,
			ApiErrorKind::MalformedResponse => write!(f, "unexpected response from {}", self.endpoint)?,
		}
		let body = self.body.trim();
		if !body.is_empty() {
			write!(f, ": {}", body)?;
		}
		Ok(())
	}
}
impl std::error::Error for ApiError {}

#[derive(Debug, Clone, PartialEq)]
enum RawApiResponse {
	None,
	PlainText(String),
	Json(Value),
}
impl RawApiResponse {
	/// Splits a response into its status and body. Any body that parses as JSON is JSON, whatever its content type says.
	async fn extract(resp: Response) -> Result<(u16, RawApiResponse), ApiError> {
		let endpoint = resp.url().path().to_owned();
		let status = resp.status().as_u16();

		let text = resp.text().await
			.map_err(|e| ApiError::new(&endpoint, ApiErrorKind::Unreachable, e.to_string()))?;

		let body = if text.trim().is_empty() {
			RawApiResponse::None
		} else {
			match serde_json::from_str::<Value>(&text) {
				Ok(v) => RawApiResponse::Json(v),
				Err(_) => RawApiResponse::PlainText(text),
			}
		};
		trace!("{} -> {} {:?}", endpoint, status, body);
		Ok((status, body))
	}

	fn into_text(self) -> String {
		match self {
			RawApiResponse::None => String::new(),
			RawApiResponse::PlainText(s) => s,
			RawApiResponse::Json(v) => v.to_string(),
		}
	}
}

fn get_cml_client() -> reqwest::Result<Client> {
	Client::builder()
		.danger_accept_invalid_certs(true) // many CML instances are self-signed
		.build()
}

/// An authenticated (or deliberately unauthenticated) view of one CML server.
///
/// The token is fixed once the session exists; cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct Session {
	client: Client,
	base_url: String,
	token: Option<String>,
}
impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("base_url", &self.base_url)
			.field("authenticated", &self.token.is_some())
			.finish()
	}
}
impl Session {
	/// Builds a session from an already known token, without contacting the server.
	pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Session, AuthError> {
		let client = get_cml_client()
			.map_err(|e| AuthError::new(AuthErrorKind::Unreachable, e.to_string()))?;
		Ok(Session::with_client(client, base_url.into(), token))
	}

	fn with_client(client: Client, base_url: String, token: Option<String>) -> Session {
		let base_url = base_url.trim_end_matches('/').to_owned();
		Session { client, base_url, token }
	}

	pub fn base_url(&self) -> &str { &self.base_url }
	pub fn token(&self) -> Option<&str> { self.token.as_deref() }
	pub fn is_authenticated(&self) -> bool { self.token.is_some() }

	/// Forgets the bearer token. Later calls are sent unauthenticated and will be rejected by the server.
	pub fn invalidate(&mut self) {
		self.token = None;
	}

	fn url(&self, endpoint: &str) -> String {
		format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
	}

	fn request(&self, method: reqwest::Method, endpoint: &str) -> RequestBuilder {
		let req = self.client.request(method, self.url(endpoint));
		match &self.token {
			Some(t) => req.bearer_auth(t),
			None => req,
		}
	}
}

/// Credentials for one CML server. `base_url` includes the API prefix, eg: `https://cml.example.com/api/v0`
pub struct Authenticate {
	pub base_url: String,
	pub username: String,
	pub password: String,
}
impl fmt::Debug for Authenticate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Authenticate")
			.field("base_url", &self.base_url)
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}
impl Authenticate {
	pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Authenticate {
		Authenticate {
			base_url: base_url.into(),
			username: username.into(),
			password: password.into(),
		}
	}

	/// Exchanges the credentials for a bearer token. Never retries.
	pub async fn login(&self) -> Result<Session, AuthError> {
		use AuthErrorKind::*;

		let client = get_cml_client()
			.map_err(|e| AuthError::new(Unreachable, e.to_string()))?;
		let session = Session::with_client(client, self.base_url.clone(), None);

		debug!("authenticating to {} as {}", session.base_url(), self.username);
		let resp = session.request(reqwest::Method::POST, "authenticate")
			.json(&rt::AuthRequest { username: &self.username, password: &self.password })
			.send().await
			.map_err(|e| AuthError::new(Unreachable, e.to_string()))?;

		let (status, body) = RawApiResponse::extract(resp).await
			.map_err(|e| AuthError::new(Unreachable, e.to_string()))?;

		match (status, body) {
			(200..=299, RawApiResponse::Json(Value::String(token))) if !token.is_empty() => {
				Ok(Session { token: Some(token), ..session })
			},
			(200..=299, body) => Err(AuthError::new(MalformedResponse, format!("expected a JSON string token, got: {}", body.into_text()))),
			(400..=499, body) => Err(AuthError::new(Unauthorized, format!("HTTP {}: {}", status, body.into_text()))),
			(status, body) => Err(AuthError::new(Unreachable, format!("HTTP {}: {}", status, body.into_text()))),
		}
	}
}

/// The remote lab operations the provisioning workflow needs. One method is one REST call.
#[async_trait]
pub trait LabApi: Send + Sync {
	async fn create_lab(&self, session: &Session, title: &str, description: &str) -> Result<String, ApiError>;
	/// Creates a node with its interfaces already populated
	async fn create_node(&self, session: &Session, lab_id: &str, spec: &NodeSpec) -> Result<String, ApiError>;
	async fn list_interfaces(&self, session: &Session, lab_id: &str, node_id: &str) -> Result<Vec<rt::Interface>, ApiError>;
	async fn create_link(&self, session: &Session, lab_id: &str, src_int: &str, dst_int: &str) -> Result<String, ApiError>;
	async fn start_lab(&self, session: &Session, lab_id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: LabApi + ?Sized> LabApi for Arc<T> {
	async fn create_lab(&self, session: &Session, title: &str, description: &str) -> Result<String, ApiError> {
		(**self).create_lab(session, title, description).await
	}
	async fn create_node(&self, session: &Session, lab_id: &str, spec: &NodeSpec) -> Result<String, ApiError> {
		(**self).create_node(session, lab_id, spec).await
	}
	async fn list_interfaces(&self, session: &Session, lab_id: &str, node_id: &str) -> Result<Vec<rt::Interface>, ApiError> {
		(**self).list_interfaces(session, lab_id, node_id).await
	}
	async fn create_link(&self, session: &Session, lab_id: &str, src_int: &str, dst_int: &str) -> Result<String, ApiError> {
		(**self).create_link(session, lab_id, src_int, dst_int).await
	}
	async fn start_lab(&self, session: &Session, lab_id: &str) -> Result<(), ApiError> {
		(**self).start_lab(session, lab_id).await
	}
}

/// [`LabApi`] over the CML v0 REST API. Holds no state; everything comes from the [`Session`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LabClient;

impl LabClient {
	async fn send(req: RequestBuilder, endpoint: &str) -> Result<RawApiResponse, ApiError> {
		let resp = req.send().await
			.map_err(|e| ApiError::new(endpoint, ApiErrorKind::Unreachable, e.to_string()))?;

		match RawApiResponse::extract(resp).await? {
			(200..=299, body) => Ok(body),
			(status, body) => Err(ApiError::new(endpoint, ApiErrorKind::HttpStatus(status), body.into_text())),
		}
	}

	async fn send_json<T: DeserializeOwned>(req: RequestBuilder, endpoint: &str) -> Result<T, ApiError> {
		match LabClient::send(req, endpoint).await? {
			RawApiResponse::Json(j) => serde_json::from_value::<T>(j.clone())
				.map_err(|e| ApiError::new(endpoint, ApiErrorKind::MalformedResponse, format!("{} ({})", j, e))),
			other => Err(ApiError::new(endpoint, ApiErrorKind::MalformedResponse, other.into_text())),
		}
	}
}

#[async_trait]
impl LabApi for LabClient {
	async fn create_lab(&self, session: &Session, title: &str, description: &str) -> Result<String, ApiError> {
		let endpoint = "/labs";
		let req = session.request(reqwest::Method::POST, endpoint)
			.json(&rt::NewLab { title, description });
		let created: rt::Created = LabClient::send_json(req, endpoint).await?;
		Ok(created.id)
	}

	async fn create_node(&self, session: &Session, lab_id: &str, spec: &NodeSpec) -> Result<String, ApiError> {
		let endpoint = format!("/labs/{}/nodes", lab_id);
		let req = session.request(reqwest::Method::POST, &endpoint)
			.query(&[("populate_interfaces", "true")])
			.json(&rt::NewNode {
				label: &spec.label,
				image_definition: &spec.image_definition,
				node_definition: spec.node_definition(),
				configuration: &spec.configuration,
				x: spec.x,
				y: spec.y,
			});
		let created: rt::Created = LabClient::send_json(req, &endpoint).await?;
		Ok(created.id)
	}

	async fn list_interfaces(&self, session: &Session, lab_id: &str, node_id: &str) -> Result<Vec<rt::Interface>, ApiError> {
		let endpoint = format!("/labs/{}/nodes/{}/interfaces", lab_id, node_id);
		let req = session.request(reqwest::Method::GET, &endpoint)
			.query(&[("data", "true")]);
		LabClient::send_json(req, &endpoint).await
	}

	async fn create_link(&self, session: &Session, lab_id: &str, src_int: &str, dst_int: &str) -> Result<String, ApiError> {
		let endpoint = format!("/labs/{}/links", lab_id);
		let req = session.request(reqwest::Method::POST, &endpoint)
			.json(&rt::NewLink { src_int, dst_int });
		let created: rt::Created = LabClient::send_json(req, &endpoint).await?;
		Ok(created.id)
	}

	async fn start_lab(&self, session: &Session, lab_id: &str) -> Result<(), ApiError> {
		let endpoint = format!("/labs/{}/start", lab_id);
		let req = session.request(reqwest::Method::PUT, &endpoint);
		LabClient::send(req, &endpoint).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn session_joins_urls() {
		let session = Session::new("https://cml.example/api/v0/", Some("tok".into())).unwrap();
		assert_eq!(session.base_url(), "https://cml.example/api/v0");
		assert_eq!(session.url("/labs/1/start"), "https://cml.example/api/v0/labs/1/start");
		assert_eq!(session.url("authenticate"), "https://cml.example/api/v0/authenticate");
	}

	#[test]
	fn invalidate_drops_token() {
		let mut session = Session::new("https://cml.example/api/v0", Some("tok".into())).unwrap();
		assert!(session.is_authenticated());
		session.invalidate();
		assert_eq!(session.token(), None);
	}

	#[test]
	fn debug_output_hides_secrets() {
		let auth = Authenticate::new("https://cml", "admin", "hunter2");
		assert!(!format!("{:?}", auth).contains("hunter2"));

		let session = Session::new("https://cml", Some("secret-token".into())).unwrap();
		assert!(!format!("{:?}", session).contains("secret-token"));
	}

	#[test]
	fn api_error_display() {
		let e = ApiError::new("/labs", ApiErrorKind::HttpStatus(500), "{\"description\":\"boom\"}");
		assert_eq!(e.status(), Some(500));
		assert_eq!(e.to_string(), "/labs responded with HTTP 500: {\"description\":\"boom\"}");

		let e = ApiError::new("/labs/1/start", ApiErrorKind::Unreachable, "");
		assert_eq!(e.status(), None);
		assert_eq!(e.to_string(), "unable to reach /labs/1/start");
	}

	#[tokio::test]
	async fn unreachable_server_is_reported() {
		// nothing listens on the discard port
		let auth = Authenticate::new("http://127.0.0.1:9/api/v0", "admin", "admin");
		let err = auth.login().await.unwrap_err();
		assert_eq!(err.kind, AuthErrorKind::Unreachable);

		let session = Session::new("http://127.0.0.1:9/api/v0", Some("tok".into())).unwrap();
		let err = LabClient.create_lab(&session, "L1", "L1").await.unwrap_err();
		assert_eq!(err.kind, ApiErrorKind::Unreachable);
		assert_eq!(err.endpoint, "/labs");
	}
}
