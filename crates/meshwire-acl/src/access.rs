//! user-scoped access helpers.
//!
//! these answer "which nodes can this user reach or manage" questions
//! for the api layer: remote-access gateways granted by policy, nodes
//! visible under group roles, and networks visible at all.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use meshwire_types::{
    ALL_REMOTE_ACCESS_GWS_RSRC_ID, Network, NetworkId, Node, NodeId, RoleId, RsrcId, RsrcType,
    TagId, User, WILDCARD,
};

use crate::directory::{GroupLookup, NodeDirectory};
use crate::evaluator::PolicyEvaluator;
use crate::resolver::IdentityResolver;
use crate::roles::RoleRegistry;

/// computes user-visible node and network sets.
pub struct UserAccess {
    roles: Arc<RoleRegistry>,
    groups: Arc<dyn GroupLookup>,
    nodes: Arc<dyn NodeDirectory>,
    resolver: Arc<IdentityResolver>,
}

fn is_platform_admin(user: &User) -> bool {
    matches!(
        user.platform_role_id.as_str(),
        RoleId::SUPER_ADMIN | RoleId::ADMIN
    )
}

impl UserAccess {
    /// create the helper over the given registries and directories.
    pub fn new(
        roles: Arc<RoleRegistry>,
        groups: Arc<dyn GroupLookup>,
        nodes: Arc<dyn NodeDirectory>,
        resolver: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            roles,
            groups,
            nodes,
            resolver,
        }
    }

    /// the remote-access gateways a user may connect through.
    ///
    /// platform admins see every gateway; everyone else collects the
    /// gateways selected by the dst side of their enabled user policies,
    /// with a wildcard dst admitting every gateway in the policy's
    /// network.
    pub fn user_rag_nodes(&self, user: &User, evaluator: &PolicyEvaluator) -> HashMap<NodeId, Node> {
        let mut gws = HashMap::new();
        let all_nodes = self.nodes.all_nodes();

        if is_platform_admin(user) {
            for node in &all_nodes {
                if node.is_ingress_gateway {
                    gws.insert(node.id, node.clone());
                }
            }
        }

        for policy in evaluator.list_user_policies(user) {
            if !policy.enabled {
                continue;
            }
            let tag_map = self.resolver.tag_node_map(&policy.network_id, false);
            for dst in &policy.dst {
                if dst.value == WILDCARD {
                    for node in &all_nodes {
                        if node.network == policy.network_id && node.is_ingress_gateway {
                            gws.insert(node.id, node.clone());
                        }
                    }
                    continue;
                }
                if let Some(tagged) = tag_map.get(&TagId::from(dst.value.as_str())) {
                    for node in tagged {
                        if node.is_ingress_gateway {
                            gws.insert(node.id, node.clone());
                        }
                    }
                }
            }
        }
        gws
    }

    /// the subset of `nodes` in `net` the user may see through group roles.
    ///
    /// a group role over all networks short-circuits to the full list.
    /// full-access roles admit every network node; gateway scopes admit
    /// either every ingress gateway or the individually listed ones.
    /// static clients behind admitted gateways ride along.
    pub fn filtered_nodes_by_user_access(
        &self,
        user: &User,
        nodes: &[Node],
        net: &NetworkId,
    ) -> Vec<Node> {
        let mut filtered: Vec<Node> = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut network_roles: HashSet<RoleId> = HashSet::new();

        for group_id in &user.groups {
            let Some(group) = self.groups.get_group(group_id) else {
                continue;
            };
            if group.network_roles.contains_key(&NetworkId::all()) {
                return self.with_static_nodes(nodes.to_vec());
            }
            for roles in group.network_roles.values() {
                network_roles.extend(roles.iter().cloned());
            }
        }

        let network_nodes: Vec<&Node> =
            nodes.iter().filter(|node| node.network == *net).collect();

        for role_id in &network_roles {
            let Ok(role) = self.roles.get(role_id) else {
                continue;
            };
            if role.full_access {
                for node in &network_nodes {
                    if seen.insert(node.id) {
                        filtered.push((*node).clone());
                    }
                }
                continue;
            }
            let Some(gw_scopes) = role.network_level_access.get(&RsrcType::RemoteAccessGateways)
            else {
                continue;
            };
            if gw_scopes.contains_key(&RsrcId::from(ALL_REMOTE_ACCESS_GWS_RSRC_ID)) {
                for node in &network_nodes {
                    if node.is_ingress_gateway && seen.insert(node.id) {
                        filtered.push((*node).clone());
                    }
                }
            } else {
                for (gw_id, scope) in gw_scopes {
                    if !scope.read {
                        continue;
                    }
                    let Ok(id) = gw_id.as_str().parse::<u64>() else {
                        continue;
                    };
                    if let Some(node) = self.nodes.node_by_id(NodeId(id)) {
                        if node.is_ingress_gateway && seen.insert(node.id) {
                            filtered.push(node);
                        }
                    }
                }
            }
        }
        self.with_static_nodes(filtered)
    }

    /// append the static clients terminating on gateways in the list.
    fn with_static_nodes(&self, mut nodes: Vec<Node>) -> Vec<Node> {
        let gw_ids: HashSet<NodeId> = nodes
            .iter()
            .filter(|node| node.is_ingress_gateway)
            .map(|node| node.id)
            .collect();
        if gw_ids.is_empty() {
            return nodes;
        }
        let seen: HashSet<NodeId> = nodes.iter().map(|node| node.id).collect();
        for node in self.nodes.all_nodes() {
            if seen.contains(&node.id) {
                continue;
            }
            let Some(sn) = &node.static_node else {
                continue;
            };
            if sn
                .ingress_gateway_id
                .is_some_and(|gw| gw_ids.contains(&gw))
            {
                nodes.push(node);
            }
        }
        nodes
    }

    /// the networks a user may see at all.
    ///
    /// platform roles with full access see everything; otherwise the
    /// user's group roles decide, with the all-networks sentinel again
    /// short-circuiting.
    pub fn filter_networks_by_role(&self, networks: Vec<Network>, user: &User) -> Vec<Network> {
        let Ok(platform_role) = self.roles.get(&user.platform_role_id) else {
            return Vec::new();
        };
        if platform_role.full_access {
            return networks;
        }

        let mut visible: HashSet<NetworkId> = HashSet::new();
        for group_id in &user.groups {
            let Some(group) = self.groups.get_group(group_id) else {
                continue;
            };
            for net in group.network_roles.keys() {
                if net.is_all() {
                    return networks;
                }
                visible.insert(net.clone());
            }
        }
        networks
            .into_iter()
            .filter(|network| visible.contains(&network.id))
            .collect()
    }
}
