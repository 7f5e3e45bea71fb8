//! per-node firewall rule compilation.
//!
//! for a target node, the compiler walks every device policy applying to
//! it and accretes the addresses of the remote peers each policy admits,
//! then folds in the user policies granting static clients access. The
//! output is a map from policy id to [`AclRule`], a pure function of
//! current state: compiling twice without an intervening change yields
//! identical rules.

use std::collections::HashMap;
use std::sync::Arc;

use meshwire_types::{
    Acl, AclId, AclRule, GroupId, Node, NodeId, PolicyTagKind, TagId, TrafficDirection, WILDCARD,
};

use crate::registry::{AclRegistry, tag_value_set};
use crate::resolver::IdentityResolver;

/// compiles per-node allow-lists from the policy set.
pub struct RuleCompiler {
    registry: Arc<AclRegistry>,
    resolver: Arc<IdentityResolver>,
}

/// add every prefix of `nodes` (except the target's own) to the rule.
fn accrete_nodes(rule: &mut AclRule, nodes: Option<&Vec<Node>>, target: NodeId) {
    for node in nodes.into_iter().flatten() {
        if node.id == target {
            continue;
        }
        if let Some(ip) = node.ipv4 {
            rule.ip_list.push(ip);
        }
        if let Some(ip) = node.ipv6 {
            rule.ip6_list.push(ip);
        }
        if node.is_static {
            if let Some(sn) = &node.static_node {
                if let Some(ip) = sn.address {
                    rule.ip_list.push(ip);
                }
                if let Some(ip) = sn.address6 {
                    rule.ip6_list.push(ip);
                }
            }
        }
    }
}

impl RuleCompiler {
    /// create a compiler over the registry and resolver.
    pub fn new(registry: Arc<AclRegistry>, resolver: Arc<IdentityResolver>) -> Self {
        Self { registry, resolver }
    }

    /// compile the allow-list map for a target node.
    pub fn acl_rules_for_node(&self, target: &Node) -> HashMap<AclId, AclRule> {
        let target = target.resolved();
        let mut rules = HashMap::new();

        // ingress gateways only see the static clients terminating on
        // them; everything else peers with the full network
        let tagged_nodes = self
            .resolver
            .tag_node_map(&target.network, target.is_ingress_gateway);
        let policies = self.registry.list_device_policies(&target.network);

        let mut target_tags = target.tags.snapshot();
        target_tags.insert(TagId::from(WILDCARD));

        for acl in &policies {
            if !acl.enabled {
                continue;
            }
            let src_tags = tag_value_set(&acl.src);
            let dst_tags = tag_value_set(&acl.dst);
            let mut rule = AclRule::allow(acl);

            for node_tag in &target_tags {
                if acl.allowed_direction == TrafficDirection::Bi {
                    let in_src = src_tags.contains(node_tag.as_str());
                    let in_dst = dst_tags.contains(node_tag.as_str());
                    if in_src && !in_dst {
                        for dst in &dst_tags {
                            if *dst == node_tag.as_str() {
                                continue;
                            }
                            accrete_nodes(&mut rule, tagged_nodes.get(&TagId::from(*dst)), target.id);
                        }
                    }
                    if in_dst && !in_src {
                        for src in &src_tags {
                            if *src == node_tag.as_str() {
                                continue;
                            }
                            accrete_nodes(&mut rule, tagged_nodes.get(&TagId::from(*src)), target.id);
                        }
                    }
                    if in_src && in_dst {
                        accrete_nodes(&mut rule, tagged_nodes.get(node_tag), target.id);
                    }
                } else if dst_tags.contains(node_tag.as_str()) || dst_tags.contains(WILDCARD) {
                    for src in &src_tags {
                        if *src == node_tag.as_str() {
                            continue;
                        }
                        accrete_nodes(&mut rule, tagged_nodes.get(&TagId::from(*src)), target.id);
                    }
                }
            }

            if !rule.is_empty() {
                rule.dedup_sort();
                rules.insert(acl.id.clone(), rule);
            }
        }

        // static clients terminate on the gateway itself, so gateways
        // take no user-policy rules
        if !target.is_ingress_gateway {
            self.user_acl_rules_for_node(&target, &mut rules);
        }
        rules
    }

    /// fold user policies into the rule map: static clients owned by a
    /// matching user contribute their own prefixes under the policy.
    fn user_acl_rules_for_node(&self, target: &Node, rules: &mut HashMap<AclId, AclRule>) {
        let user_nodes = self.resolver.static_user_nodes(&target.network);
        let user_grp_map = self.resolver.user_group_map();
        let acls = self.registry.list_user_policies(&target.network);
        let target_tags = target.tags.snapshot();

        let mut allowed_users: HashMap<String, Vec<&Acl>> = HashMap::new();
        for node_tag in &target_tags {
            for acl in &acls {
                if !acl.enabled {
                    continue;
                }
                let dst_tags = tag_value_set(&acl.dst);
                if !dst_tags.contains(node_tag.as_str()) {
                    continue;
                }
                for src in &acl.src {
                    match src.kind {
                        PolicyTagKind::User => {
                            allowed_users.entry(src.value.clone()).or_default().push(acl);
                        }
                        PolicyTagKind::UserGroup => {
                            let gid = GroupId::from(src.value.as_str());
                            if let Some(members) = user_grp_map.get(&gid) {
                                for name in members {
                                    allowed_users.entry(name.clone()).or_default().push(acl);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        for user_node in &user_nodes {
            let Some(sn) = &user_node.static_node else {
                continue;
            };
            if !sn.enabled {
                continue;
            }
            let Some(acls) = allowed_users.get(&sn.owner) else {
                continue;
            };
            for acl in acls {
                let rule = rules
                    .entry(acl.id.clone())
                    .or_insert_with(|| AclRule::allow(acl));
                if let Some(ip) = sn.address {
                    rule.ip_list.push(ip);
                }
                if let Some(ip) = sn.address6 {
                    rule.ip6_list.push(ip);
                }
                rule.dedup_sort();
            }
        }
    }
}
