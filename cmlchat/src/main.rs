use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use clap::Parser;
use log::info;

use cml::LabClient;
use cmlchat::{server, ChatFrontEnd, GeminiClient, GeminiClientConfig};

#[derive(Parser)]
#[command(version, about = "Chat with an assistant that builds Cisco Modeling Labs topologies")]
struct Args {
	#[arg(long, default_value = "127.0.0.1:5000")]
	listen: SocketAddr,

	/// Google AI Studio API key
	#[arg(long, env = "AI_STUDIO_API_KEY", hide_env_values = true)]
	api_key: String,

	#[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash-latest")]
	model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	dotenvy::dotenv().ok();
	env_logger::init();

	let args = Args::parse();
	let auth = cml::get_auth_env()?;

	let gemini = GeminiClient::new(GeminiClientConfig {
		api_key: args.api_key,
		model: args.model,
		..Default::default()
	})?;
	let frontend = Arc::new(ChatFrontEnd::new(gemini, auth, LabClient));

	let listener = tokio::net::TcpListener::bind(args.listen)
		.await
		.context("bind server listener failed")?;
	info!("cmlchat listening on http://{}", args.listen);
	axum::serve(listener, server::router(frontend))
		.await
		.context("server terminated with error")
}
