use std::process::ExitCode;
use clap::Parser;

use cmllab::Args;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	dotenvy::dotenv().ok();
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
		.target(env_logger::Target::Stdout)
		.init();

	let args = Args::parse();
	Ok(match args.handle().await? {
		true => ExitCode::SUCCESS,
		false => ExitCode::FAILURE,
	})
}
