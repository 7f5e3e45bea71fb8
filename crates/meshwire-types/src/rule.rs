//! compiled firewall rules.
//!
//! an [`AclRule`] is the artifact shipped to a node's data plane: the
//! protocol, ports and peer prefixes one policy allows for that node.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::acl::{Acl, AclId, Protocol, TrafficDirection};

/// the compiled allow-list one policy contributes for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclRule {
    /// policy the rule was compiled from.
    pub id: AclId,

    /// protocol the policy allows.
    pub allowed_protocol: Protocol,

    /// ports the policy allows.
    pub allowed_ports: Vec<String>,

    /// direction traffic may be initiated in.
    pub direction: TrafficDirection,

    /// ipv4 prefixes of allowed peers.
    #[serde(default)]
    pub ip_list: Vec<IpNet>,

    /// ipv6 prefixes of allowed peers.
    #[serde(default)]
    pub ip6_list: Vec<IpNet>,

    /// always true; the model is allow-only.
    pub allowed: bool,
}

impl AclRule {
    /// an empty allow rule carrying the policy's protocol, ports and direction.
    pub fn allow(acl: &Acl) -> Self {
        Self {
            id: acl.id.clone(),
            allowed_protocol: acl.proto,
            allowed_ports: acl.port.clone(),
            direction: acl.allowed_direction,
            ip_list: Vec::new(),
            ip6_list: Vec::new(),
            allowed: true,
        }
    }

    /// whether the rule carries no peer prefixes.
    pub fn is_empty(&self) -> bool {
        self.ip_list.is_empty() && self.ip6_list.is_empty()
    }

    /// deduplicate and sort both prefix lists.
    pub fn dedup_sort(&mut self) {
        self.ip_list = unique_ipnet_list(std::mem::take(&mut self.ip_list));
        self.ip6_list = unique_ipnet_list(std::mem::take(&mut self.ip6_list));
    }
}

/// the ipv6-mapped byte form used for ordering addresses of either family.
fn mapped_octets(ip: IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

/// sort prefixes by ip (ipv6-mapped byte order), then prefix length ascending.
pub fn sort_ipnets(nets: &mut [IpNet]) {
    nets.sort_by(|a, b| {
        mapped_octets(a.addr())
            .cmp(&mapped_octets(b.addr()))
            .then(a.prefix_len().cmp(&b.prefix_len()))
    });
}

/// drop duplicate prefixes and return the list sorted.
///
/// duplicates are keyed by the cidr string, so textual equality decides,
/// not numeric equivalence of masks.
pub fn unique_ipnet_list(nets: Vec<IpNet>) -> Vec<IpNet> {
    let mut seen = HashSet::new();
    let mut unique: Vec<IpNet> = nets
        .into_iter()
        .filter(|net| seen.insert(net.to_string()))
        .collect();
    sort_ipnets(&mut unique);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_unique_drops_duplicates() {
        let list = unique_ipnet_list(vec![
            net("10.0.0.2/32"),
            net("10.0.0.1/32"),
            net("10.0.0.2/32"),
        ]);
        assert_eq!(list, vec![net("10.0.0.1/32"), net("10.0.0.2/32")]);
    }

    #[test]
    fn test_sort_by_ip_then_prefix() {
        let list = unique_ipnet_list(vec![
            net("10.0.0.1/32"),
            net("10.0.0.1/24"),
            net("10.0.0.0/8"),
        ]);
        assert_eq!(
            list,
            vec![net("10.0.0.0/8"), net("10.0.0.1/24"), net("10.0.0.1/32")]
        );
    }

    #[test]
    fn test_sort_mixed_families() {
        // ipv4 maps into ::ffff:0:0/96, which sorts after low ipv6 space
        let list = unique_ipnet_list(vec![net("10.0.0.1/32"), net("fd00::1/128"), net("::1/128")]);
        assert_eq!(
            list,
            vec![net("::1/128"), net("10.0.0.1/32"), net("fd00::1/128")]
        );
    }

    #[test]
    fn test_unique_is_idempotent() {
        let once = unique_ipnet_list(vec![net("10.0.0.2/32"), net("10.0.0.1/32")]);
        let twice = unique_ipnet_list(once.clone());
        assert_eq!(once, twice);
    }

    #[cfg(test)]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn ipnet_strategy() -> impl Strategy<Value = IpNet> {
            (any::<[u8; 4]>(), 0u8..=32).prop_map(|(octets, prefix)| {
                IpNet::new(IpAddr::from(octets), prefix).unwrap()
            })
        }

        proptest! {
            #[test]
            fn unique_output_has_no_duplicate_cidrs(
                nets in prop::collection::vec(ipnet_strategy(), 0..32)
            ) {
                let unique = unique_ipnet_list(nets);
                let mut seen = HashSet::new();
                for net in &unique {
                    prop_assert!(seen.insert(net.to_string()));
                }
            }

            #[test]
            fn unique_output_is_sorted(
                nets in prop::collection::vec(ipnet_strategy(), 0..32)
            ) {
                let unique = unique_ipnet_list(nets);
                for pair in unique.windows(2) {
                    let key = |n: &IpNet| (mapped_octets(n.addr()), n.prefix_len());
                    prop_assert!(key(&pair[0]) <= key(&pair[1]));
                }
            }

            #[test]
            fn unique_is_idempotent(
                nets in prop::collection::vec(ipnet_strategy(), 0..32)
            ) {
                let once = unique_ipnet_list(nets);
                let twice = unique_ipnet_list(once.clone());
                prop_assert_eq!(once, twice);
            }
        }
    }
}
