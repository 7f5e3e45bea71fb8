//! policy evaluation: may these two principals communicate?
//!
//! evaluation is symmetric over the two peers; the only asymmetry is the
//! direction flag. A policy has four ways to select a pair of tag sets,
//! and the two clauses that put the initiating node on the dst side only
//! count when the policy is bidirectional. the cheap mesh-construction
//! path ignores direction entirely, because mesh reachability is
//! bidirectional regardless of who may initiate.

use std::collections::HashSet;
use std::sync::Arc;

use meshwire_types::{Acl, NetworkId, Node, PolicyKind, TagId, TrafficDirection, User, WILDCARD};

use crate::directory::UserDirectory;
use crate::registry::{AclRegistry, tag_value_set};

/// answers allow/deny questions against the current policy set.
pub struct PolicyEvaluator {
    registry: Arc<AclRegistry>,
    users: Arc<dyn UserDirectory>,
}

/// whether a device policy selects the `(node, peer)` pair.
///
/// with `enforce_direction` set, the clauses that place `node` on the
/// dst side (or `peer` on the src side) require a bidirectional policy;
/// the src-to-dst clauses always count.
fn policy_allows(
    policy: &Acl,
    node_tags: &HashSet<TagId>,
    peer_tags: &HashSet<TagId>,
    enforce_direction: bool,
) -> bool {
    let src = tag_value_set(&policy.src);
    let dst = tag_value_set(&policy.dst);
    let reverse_ok = !enforce_direction || policy.allowed_direction == TrafficDirection::Bi;

    let hits = |tags: &HashSet<TagId>, side: &HashSet<&str>| {
        tags.iter().any(|t| side.contains(t.as_str()))
    };
    // wildcard short-circuits before per-tag matching
    let covers = |side: &HashSet<&str>, tags: &HashSet<TagId>| {
        side.contains(WILDCARD) || hits(tags, side)
    };

    if hits(node_tags, &src) && covers(&dst, peer_tags) {
        return true;
    }
    if hits(peer_tags, &dst) && covers(&src, node_tags) {
        return true;
    }
    if reverse_ok && hits(node_tags, &dst) && covers(&src, peer_tags) {
        return true;
    }
    if reverse_ok && hits(peer_tags, &src) && covers(&dst, node_tags) {
        return true;
    }
    false
}

impl PolicyEvaluator {
    /// create an evaluator over the registry and user directory.
    pub fn new(registry: Arc<AclRegistry>, users: Arc<dyn UserDirectory>) -> Self {
        Self { registry, users }
    }

    /// whether the network's default policy of the given kind is enabled.
    fn default_policy(&self, net: &NetworkId, kind: PolicyKind) -> Option<Acl> {
        self.registry
            .get_default_policy(net, kind)
            .ok()
            .filter(|acl| acl.enabled)
    }

    /// cheap reachability test used for peer-mesh construction.
    ///
    /// conservative: a match in either direction counts, regardless of
    /// the policy's direction flag.
    pub fn is_peer_allowed(&self, node: &Node, peer: &Node, check_default: bool) -> bool {
        let node = node.resolved();
        let peer = peer.resolved();
        let node_tags = node.tags.snapshot();
        let peer_tags = peer.tags.snapshot();

        if check_default
            && self
                .default_policy(&node.network, PolicyKind::Device)
                .is_some()
        {
            return true;
        }

        self.registry
            .list_device_policies(&peer.network)
            .iter()
            .filter(|policy| policy.enabled)
            .any(|policy| policy_allows(policy, &node_tags, &peer_tags, false))
    }

    /// reachability test that reports the matching policies.
    ///
    /// direction is respected: a match that puts `node` on the dst side
    /// only counts when the policy is bidirectional. each matching
    /// policy appears once in the returned list.
    pub fn is_node_allowed_to_communicate(
        &self,
        node: &Node,
        peer: &Node,
        check_default: bool,
    ) -> (bool, Vec<Acl>) {
        let node = node.resolved();
        let peer = peer.resolved();
        let node_tags = node.tags.snapshot();
        let peer_tags = peer.tags.snapshot();

        if check_default {
            if let Some(default) = self.default_policy(&node.network, PolicyKind::Device) {
                return (true, vec![default]);
            }
        }

        let allowed: Vec<Acl> = self
            .registry
            .list_device_policies(&peer.network)
            .into_iter()
            .filter(|policy| policy.enabled)
            .filter(|policy| policy_allows(policy, &node_tags, &peer_tags, true))
            .collect();
        (!allowed.is_empty(), allowed)
    }

    /// whether a user may reach the peer, with the granting policies.
    pub fn is_user_allowed_to_communicate(&self, username: &str, peer: &Node) -> (bool, Vec<Acl>) {
        let peer = peer.resolved();

        if let Some(default) = self.default_policy(&peer.network, PolicyKind::User) {
            return (true, vec![default]);
        }

        let Some(user) = self.users.get_user(username) else {
            return (false, Vec::new());
        };
        let peer_tags = peer.tags.snapshot();

        let allowed: Vec<Acl> = self
            .policies_of_user(&user, &peer.network)
            .into_iter()
            .filter(|policy| policy.enabled)
            .filter(|policy| {
                let dst = tag_value_set(&policy.dst);
                dst.contains(WILDCARD) || peer_tags.iter().any(|t| dst.contains(t.as_str()))
            })
            .collect();
        (!allowed.is_empty(), allowed)
    }

    /// user policies in a network whose subjects select the user: by
    /// username, by one of their network roles, or by group membership.
    pub fn policies_of_user(&self, user: &User, net: &NetworkId) -> Vec<Acl> {
        self.registry
            .list_user_policies(net)
            .into_iter()
            .filter(|acl| {
                let src = tag_value_set(&acl.src);
                src.contains(user.username.as_str())
                    || user
                        .all_network_roles()
                        .iter()
                        .any(|role| src.contains(role.as_str()))
                    || user.groups.iter().any(|g| src.contains(g.as_str()))
            })
            .collect()
    }

    /// every user policy, across networks, whose subjects select the
    /// user by username or group membership.
    pub fn list_user_policies(&self, user: &User) -> Vec<Acl> {
        self.registry
            .list()
            .into_iter()
            .filter(|acl| acl.rule_type == PolicyKind::User)
            .filter(|acl| {
                let src = tag_value_set(&acl.src);
                src.contains(user.username.as_str())
                    || user.groups.iter().any(|g| src.contains(g.as_str()))
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use meshwire_store::MemStore;
    use meshwire_types::test_utils::TestNodeBuilder;
    use meshwire_types::{
        AclId, GroupId, PolicyTag, Protocol, RoleId, ServiceType,
    };

    use crate::registry::{ALL_NODES_SLUG, ALL_USERS_SLUG};
    use crate::testing::MockDirectory;

    struct Fixture {
        registry: Arc<AclRegistry>,
        dir: Arc<MockDirectory>,
        evaluator: PolicyEvaluator,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(AclRegistry::new(Arc::new(MemStore::new())));
        let dir = Arc::new(MockDirectory::new());
        let evaluator = PolicyEvaluator::new(Arc::clone(&registry), dir.clone());
        Fixture {
            registry,
            dir,
            evaluator,
        }
    }

    fn seed_defaults(f: &Fixture) {
        f.registry
            .create_default_network_policies(&NetworkId::from("mesh"))
            .unwrap();
    }

    fn disable(f: &Fixture, slug: &str) {
        let id = AclId::new(&NetworkId::from("mesh"), slug);
        let existing = f.registry.get(&id).unwrap();
        let mut off = existing.clone();
        off.enabled = false;
        f.registry.update(&off, &existing).unwrap();
    }

    fn device_policy(slug: &str, direction: TrafficDirection, src: &str, dst: &str) -> Acl {
        Acl {
            id: AclId::new(&NetworkId::from("mesh"), slug),
            name: slug.to_string(),
            meta_data: String::new(),
            network_id: NetworkId::from("mesh"),
            rule_type: PolicyKind::Device,
            proto: Protocol::All,
            service_type: ServiceType::Any,
            port: vec![],
            src: vec![PolicyTag::device(src)],
            dst: vec![PolicyTag::device(dst)],
            allowed_direction: direction,
            enabled: true,
            default: false,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
        }
    }

    fn user_policy(slug: &str, src: Vec<PolicyTag>, dst: &str) -> Acl {
        Acl {
            id: AclId::new(&NetworkId::from("mesh"), slug),
            name: slug.to_string(),
            meta_data: String::new(),
            network_id: NetworkId::from("mesh"),
            rule_type: PolicyKind::User,
            proto: Protocol::All,
            service_type: ServiceType::Any,
            port: vec![],
            src,
            dst: vec![PolicyTag::device(dst)],
            allowed_direction: TrafficDirection::Uni,
            enabled: true,
            default: false,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
        }
    }

    fn db_node() -> Node {
        TestNodeBuilder::new(1)
            .with_tags(["db"])
            .with_ipv4("10.0.0.1/32")
            .build()
    }

    fn web_node() -> Node {
        TestNodeBuilder::new(2)
            .with_tags(["web"])
            .with_ipv4("10.0.0.2/32")
            .build()
    }

    #[test]
    fn test_enabled_default_allows_everyone() {
        let f = fixture();
        seed_defaults(&f);

        let n1 = db_node();
        let n2 = web_node();
        assert!(f.evaluator.is_peer_allowed(&n1, &n2, true));
        assert!(f.evaluator.is_peer_allowed(&n2, &n1, true));

        let (ok, acls) = f.evaluator.is_node_allowed_to_communicate(&n1, &n2, true);
        assert!(ok);
        assert_eq!(acls.len(), 1);
        assert_eq!(acls[0].id.as_str(), "mesh.all-nodes");
    }

    #[test]
    fn test_no_policies_denies() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);

        let n1 = db_node();
        let n2 = web_node();
        assert!(!f.evaluator.is_peer_allowed(&n1, &n2, true));
        let (ok, acls) = f.evaluator.is_node_allowed_to_communicate(&n1, &n2, true);
        assert!(!ok);
        assert!(acls.is_empty());
    }

    #[test]
    fn test_uni_policy_only_allows_src_initiator() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);
        f.registry
            .insert(&device_policy("webdb", TrafficDirection::Uni, "web", "db"))
            .unwrap();

        let n1 = db_node();
        let n2 = web_node();

        let (ok, acls) = f.evaluator.is_node_allowed_to_communicate(&n2, &n1, true);
        assert!(ok);
        assert_eq!(acls.len(), 1);
        assert_eq!(acls[0].id.as_str(), "mesh.webdb");

        let (ok, acls) = f.evaluator.is_node_allowed_to_communicate(&n1, &n2, true);
        assert!(!ok);
        assert!(acls.is_empty());

        // mesh construction stays conservative in both directions
        assert!(f.evaluator.is_peer_allowed(&n1, &n2, true));
        assert!(f.evaluator.is_peer_allowed(&n2, &n1, true));
    }

    #[test]
    fn test_bi_policy_allows_both_initiators() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);
        f.registry
            .insert(&device_policy("webdb", TrafficDirection::Bi, "web", "db"))
            .unwrap();

        let n1 = db_node();
        let n2 = web_node();
        let (ok, _) = f.evaluator.is_node_allowed_to_communicate(&n2, &n1, true);
        assert!(ok);
        let (ok, _) = f.evaluator.is_node_allowed_to_communicate(&n1, &n2, true);
        assert!(ok);
    }

    #[test]
    fn test_wildcard_src_matches_any_peer() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);
        f.registry
            .insert(&device_policy("any-db", TrafficDirection::Uni, WILDCARD, "db"))
            .unwrap();

        let n1 = db_node();
        let untagged = TestNodeBuilder::new(3).with_ipv4("10.0.0.3/32").build();
        let (ok, _) = f
            .evaluator
            .is_node_allowed_to_communicate(&untagged, &n1, true);
        assert!(ok);
    }

    #[test]
    fn test_peer_allowed_is_symmetric() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);
        f.registry
            .insert(&device_policy("webdb", TrafficDirection::Uni, "web", "db"))
            .unwrap();

        let nodes = [
            db_node(),
            web_node(),
            TestNodeBuilder::new(3).with_tags(["app"]).build(),
        ];
        for check_default in [false, true] {
            for a in &nodes {
                for b in &nodes {
                    assert_eq!(
                        f.evaluator.is_peer_allowed(a, b, check_default),
                        f.evaluator.is_peer_allowed(b, a, check_default),
                    );
                }
            }
        }
    }

    #[test]
    fn test_disabled_policy_is_skipped() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);
        let mut policy = device_policy("webdb", TrafficDirection::Bi, "web", "db");
        policy.enabled = false;
        f.registry.insert(&policy).unwrap();

        assert!(!f.evaluator.is_peer_allowed(&db_node(), &web_node(), true));
    }

    #[test]
    fn test_tag_snapshot_sees_concurrent_retag() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);
        f.registry
            .insert(&device_policy("webdb", TrafficDirection::Bi, "web", "db"))
            .unwrap();

        let n1 = db_node();
        let n2 = web_node();
        // re-tag through a shared handle, as the tag manager would
        let handle = n2.tags.clone();
        handle.remove(&TagId::from("web"));

        assert!(!f.evaluator.is_peer_allowed(&n1, &n2, true));
    }

    #[test]
    fn test_user_default_policy_allows() {
        let f = fixture();
        seed_defaults(&f);

        let (ok, acls) = f
            .evaluator
            .is_user_allowed_to_communicate("anyone", &db_node());
        assert!(ok);
        assert_eq!(acls[0].id.as_str(), "mesh.all-users");
    }

    #[test]
    fn test_user_group_policy() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_USERS_SLUG);

        let mut alice = User::new("alice", RoleId::from(RoleId::SERVICE_USER));
        alice.groups.insert(GroupId::from("eng"));
        f.dir.add_user(alice);
        f.dir
            .add_user(User::new("bob", RoleId::from(RoleId::SERVICE_USER)));

        f.registry
            .insert(&user_policy(
                "eng-db",
                vec![PolicyTag::user_group("eng")],
                "db",
            ))
            .unwrap();

        let n1 = db_node();
        let (ok, acls) = f.evaluator.is_user_allowed_to_communicate("alice", &n1);
        assert!(ok);
        assert_eq!(acls.len(), 1);
        assert_eq!(acls[0].id.as_str(), "mesh.eng-db");

        let (ok, acls) = f.evaluator.is_user_allowed_to_communicate("bob", &n1);
        assert!(!ok);
        assert!(acls.is_empty());
    }

    #[test]
    fn test_user_policy_by_network_role() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_USERS_SLUG);

        let mut carol = User::new("carol", RoleId::from(RoleId::SERVICE_USER));
        carol.network_roles.insert(
            NetworkId::from("mesh"),
            [RoleId::from(RoleId::NETWORK_ADMIN)].into_iter().collect(),
        );
        f.dir.add_user(carol);

        f.registry
            .insert(&user_policy(
                "admins-db",
                vec![PolicyTag::user_role(RoleId::NETWORK_ADMIN)],
                "db",
            ))
            .unwrap();

        let (ok, _) = f
            .evaluator
            .is_user_allowed_to_communicate("carol", &db_node());
        assert!(ok);
    }

    #[test]
    fn test_user_policy_wildcard_dst() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_USERS_SLUG);

        f.dir
            .add_user(User::new("alice", RoleId::from(RoleId::SERVICE_USER)));
        f.registry
            .insert(&user_policy(
                "alice-anywhere",
                vec![PolicyTag::user("alice")],
                WILDCARD,
            ))
            .unwrap();

        let untagged = TestNodeBuilder::new(9).build();
        let (ok, _) = f
            .evaluator
            .is_user_allowed_to_communicate("alice", &untagged);
        assert!(ok);
    }

    #[test]
    fn test_unknown_user_denied() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_USERS_SLUG);

        let (ok, acls) = f
            .evaluator
            .is_user_allowed_to_communicate("ghost", &db_node());
        assert!(!ok);
        assert!(acls.is_empty());
    }

    #[test]
    fn test_static_peer_is_normalized_before_matching() {
        use meshwire_types::test_utils::TestStaticNodeBuilder;

        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);
        f.registry
            .insert(&device_policy("webdb", TrafficDirection::Bi, "web", "db"))
            .unwrap();

        // wrapper carries no tags; the embedded client carries tag db
        let static_peer = TestNodeBuilder::new(7)
            .with_static_node(
                TestStaticNodeBuilder::new("laptop", "alice")
                    .with_address("10.0.0.50/32")
                    .with_tags(["db"])
                    .build(),
            )
            .build();

        assert!(f.evaluator.is_peer_allowed(&web_node(), &static_peer, true));
    }

    #[test]
    fn test_matched_policy_reported_once() {
        let f = fixture();
        seed_defaults(&f);
        disable(&f, ALL_NODES_SLUG);
        // both sides of the pair match the policy both ways
        let mut policy = device_policy("webdb", TrafficDirection::Bi, "web", "db");
        policy.src.push(PolicyTag::device("db"));
        policy.dst.push(PolicyTag::device("web"));
        f.registry.insert(&policy).unwrap();

        let (ok, acls) = f
            .evaluator
            .is_node_allowed_to_communicate(&db_node(), &web_node(), true);
        assert!(ok);
        assert_eq!(acls.len(), 1);
    }
}
