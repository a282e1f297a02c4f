
use std::path::{Path, PathBuf};
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, trace};

use cml::rest::Authenticate;
use cml::{templates, LabClient, Orchestrator, ProvisioningResult, TopologyDescriptor};

#[derive(Parser)]
#[command(version, about = "Provision labs on a Cisco Modeling Labs server")]
pub struct Args {
	/// Emit the provisioning result as JSON
	#[arg(short, long, global = true)]
	json: bool,

	#[command(subcommand)]
	rootsubcmd: SubCmdRoot,
}
impl Args {
	/// Runs the selected subcommand. `Ok(false)` means the command ran but did not succeed.
	pub async fn handle(&self) -> anyhow::Result<bool> {
		match &self.rootsubcmd {
			SubCmdRoot::Provision(p) => p.handle(self).await,
			SubCmdRoot::Check(c) => c.handle(self),
		}
	}
}

#[derive(Subcommand)]
pub enum SubCmdRoot {
	/// Create, wire and start a lab
	Provision(SubCmdProvision),
	/// Validate a topology file without contacting CML
	Check(SubCmdCheck),
}

#[derive(clap::Args)]
pub struct SubCmdProvision {
	/// YAML or JSON topology file. Without one, a two router lab is built
	#[arg(short, long)]
	file: Option<PathBuf>,

	/// Title of the two router lab
	#[arg(short, long, default_value = "Lab_API_Python", conflicts_with = "file")]
	title: String,

	/// Router names of the two router lab, first one gets the .1 addresses
	#[arg(long, num_args = 2, value_names = ["ROUTER1", "ROUTER2"], default_values = ["R1", "R2"], conflicts_with = "file")]
	routers: Vec<String>,
}
impl SubCmdProvision {
	fn topology(&self) -> anyhow::Result<TopologyDescriptor> {
		match &self.file {
			Some(path) => load_topology(path),
			None => match self.routers.as_slice() {
				[r1, r2] => Ok(templates::two_router_lab(&self.title, r1, r2)?),
				other => anyhow::bail!("expected two router names, got {}", other.len()),
			},
		}
	}

	async fn handle(&self, args: &Args) -> anyhow::Result<bool> {
		let topology = self.topology()?;
		let auth = cml::get_auth_env()?;
		let result = provision(&auth, &topology).await?;

		if args.json {
			println!("{}", serde_json::to_string_pretty(&result)?);
		} else {
			println!("{}", result.summary(topology.title()));
		}
		Ok(result.started())
	}
}

#[derive(clap::Args)]
pub struct SubCmdCheck {
	file: PathBuf,
}
impl SubCmdCheck {
	fn handle(&self, args: &Args) -> anyhow::Result<bool> {
		let topology = load_topology(&self.file)?;
		if args.json {
			println!("{}", serde_json::to_string_pretty(&topology)?);
		} else {
			println!("Lab '{}': {} nodes, {} links", topology.title(), topology.nodes().len(), topology.links().len());
			for link in topology.links() {
				println!("  {}:{} <-> {}:{}", link.a.node, link.a.interface, link.b.node, link.b.interface);
			}
		}
		Ok(true)
	}
}

/// Reads a topology file, picking the format from its extension (YAML unless `.json`)
pub fn load_topology(path: &Path) -> anyhow::Result<TopologyDescriptor> {
	let text = std::fs::read_to_string(path)
		.with_context(|| format!("reading {}", path.display()))?;
	let topo = match path.extension().and_then(|e| e.to_str()) {
		Some("json") => TopologyDescriptor::from_json(&text),
		_ => TopologyDescriptor::from_yaml(&text),
	};
	topo.with_context(|| format!("invalid topology in {}", path.display()))
}

/// Authenticates once and runs one provisioning pass. Authentication failures are errors; provisioning failures are in the result.
pub async fn provision(auth: &Authenticate, topology: &TopologyDescriptor) -> anyhow::Result<ProvisioningResult> {
	info!("Starting CML automation against {}", auth.base_url);
	let session = auth.login().await
		.context("Authentication with CML failed")?;
	trace!("authenticated as {}", auth.username);

	Ok(Orchestrator::new(LabClient).provision(&session, topology).await)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_to_two_router_lab() {
		let args = Args::try_parse_from(["cmllab", "provision"]).unwrap();
		let SubCmdRoot::Provision(p) = &args.rootsubcmd else { panic!("expected provision") };
		let topo = p.topology().unwrap();
		assert_eq!(topo.title(), "Lab_API_Python");
		assert_eq!(topo.nodes()[0].label, "R1");
		assert_eq!(topo.nodes()[1].label, "R2");
	}

	#[test]
	fn custom_router_names() {
		let args = Args::try_parse_from(["cmllab", "provision", "--routers", "core", "edge", "-t", "wan"]).unwrap();
		let SubCmdRoot::Provision(p) = &args.rootsubcmd else { panic!("expected provision") };
		let topo = p.topology().unwrap();
		assert_eq!(topo.title(), "wan");
		assert_eq!(topo.links()[0].b.node, "edge");
	}

	#[test]
	fn file_conflicts_with_template_options() {
		assert!(Args::try_parse_from(["cmllab", "provision", "-f", "lab.yaml", "-t", "x"]).is_err());
	}

	#[test]
	fn loads_bundled_topologies() {
		let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("topologies");
		let yaml = load_topology(&dir.join("triangle.yaml")).unwrap();
		assert_eq!(yaml.nodes().len(), 3);
		assert_eq!(yaml.links().len(), 3);

		let json = load_topology(&dir.join("two-routers.json")).unwrap();
		assert_eq!(json.nodes().len(), 2);
	}

	#[test]
	fn missing_file_is_an_error() {
		assert!(load_topology(Path::new("/nonexistent/lab.yaml")).is_err());
	}
}
