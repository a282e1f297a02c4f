//! Ready-made topologies.

use crate::topology::{LinkEndpoint, LinkSpec, NodeSpec, TopologyDescriptor, TopologyError};

pub const DEFAULT_IMAGE: &str = "iol-xe";
pub const DEFAULT_INTERFACE: &str = "Ethernet0/0";

/// Minimal IOS configuration: hostname, a loopback, and one addressed interface. `index` starts at 1.
pub fn router_config(hostname: &str, index: u8) -> String {
	format!(
"
hostname {hostname}
interface Loopback0
 ip address {i}.{i}.{i}.{i} 255.255.255.0
interface {int}
 ip address 10.1.2.{i} 255.255.255.0
end
", hostname = hostname, i = index, int = DEFAULT_INTERFACE)
}

/// Two IOL routers joined on `Ethernet0/0`, addressed 10.1.2.1/24 and 10.1.2.2/24.
///
/// Router order matters: the first one gets the `.1` addresses.
pub fn two_router_lab(title: &str, router1: &str, router2: &str) -> Result<TopologyDescriptor, TopologyError> {
	let nodes = vec![
		NodeSpec::new(router1, DEFAULT_IMAGE, router_config(router1, 1), 100, 100),
		NodeSpec::new(router2, DEFAULT_IMAGE, router_config(router2, 2), 400, 100),
	];
	let links = vec![LinkSpec::new(
		LinkEndpoint::new(router1, DEFAULT_INTERFACE),
		LinkEndpoint::new(router2, DEFAULT_INTERFACE),
	)];
	TopologyDescriptor::new(title, nodes, links)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_router_gets_first_addresses() {
		let topo = two_router_lab("LAB_A_B_Automated", "A", "B").unwrap();
		let a = &topo.nodes()[0];
		let b = &topo.nodes()[1];

		assert_eq!((a.label.as_str(), a.x, a.y), ("A", 100, 100));
		assert_eq!((b.label.as_str(), b.x, b.y), ("B", 400, 100));
		assert!(a.configuration.contains("hostname A\n"));
		assert!(a.configuration.contains(" ip address 1.1.1.1 255.255.255.0\n"));
		assert!(a.configuration.contains(" ip address 10.1.2.1 255.255.255.0\n"));
		assert!(b.configuration.contains(" ip address 2.2.2.2 255.255.255.0\n"));
		assert!(b.configuration.contains(" ip address 10.1.2.2 255.255.255.0\n"));
		assert_eq!(a.node_definition(), "iol-xe");
		assert_eq!(topo.links().len(), 1);
		assert_eq!(topo.links()[0].b, LinkEndpoint::new("B", "Ethernet0/0"));
	}

	#[test]
	fn same_name_twice_is_rejected() {
		assert!(two_router_lab("L", "R1", "R1").is_err());
	}
}
