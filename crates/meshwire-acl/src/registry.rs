//! durable acl policy registry with a coherent in-memory cache.
//!
//! the registry layers a process-wide policy cache over the blob store.
//! Reads take the shared lock; every mutating call updates the store
//! first and, only on success, the cache under the exclusive lock, so a
//! successful write is observable in order on every thread. entries are
//! returned by value; the cache never hands out references.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::warn;

use meshwire_store::{ACLS_TABLE, Store};
use meshwire_types::{
    Acl, AclId, NetworkId, PolicyKind, PolicyTag, PolicyTagKind, Protocol, ServiceType, TagId,
    TrafficDirection, WILDCARD,
};

use crate::error::{Error, Result};

/// slug of the default device policy allowing all nodes.
pub const ALL_NODES_SLUG: &str = "all-nodes";

/// slug of the default user policy allowing all users.
pub const ALL_USERS_SLUG: &str = "all-users";

/// slug of the default policy meshing all remote-access gateways.
pub const ALL_REMOTE_ACCESS_GWS_SLUG: &str = "all-remote-access-gws";

/// name of the network-scoped tag carried by remote-access gateways.
pub const REMOTE_ACCESS_TAG: &str = "remote-access-gws";

/// collapse a policy side into its value set.
pub(crate) fn tag_value_set(tags: &[PolicyTag]) -> HashSet<&str> {
    tags.iter().map(|t| t.value.as_str()).collect()
}

/// crud and caching for acl policies.
pub struct AclRegistry {
    store: Arc<dyn Store>,
    cache: RwLock<HashMap<AclId, Acl>>,
    cache_enabled: bool,
}

impl AclRegistry {
    /// create a registry over the given store, with caching on.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            cache_enabled: true,
        }
    }

    /// create a registry that always reads through to the store.
    pub fn with_cache_disabled(store: Arc<dyn Store>) -> Self {
        Self {
            cache_enabled: false,
            ..Self::new(store)
        }
    }

    fn cache_store(&self, acl: &Acl) {
        if self.cache_enabled {
            self.cache
                .write()
                .unwrap()
                .insert(acl.id.clone(), acl.clone());
        }
    }

    fn cache_remove(&self, id: &AclId) {
        if self.cache_enabled {
            self.cache.write().unwrap().remove(id);
        }
    }

    fn cache_get(&self, id: &AclId) -> Option<Acl> {
        if !self.cache_enabled {
            return None;
        }
        self.cache.read().unwrap().get(id).cloned()
    }

    fn cache_list(&self) -> Vec<Acl> {
        if !self.cache_enabled {
            return Vec::new();
        }
        self.cache.read().unwrap().values().cloned().collect()
    }

    /// serialize and persist a policy, then refresh the cache entry.
    fn write(&self, acl: &Acl) -> Result<()> {
        let data = serde_json::to_string(acl)?;
        self.store.insert(ACLS_TABLE, acl.id.as_str(), &data)?;
        self.cache_store(acl);
        Ok(())
    }

    /// create a policy; fails if the id is already taken.
    pub fn insert(&self, acl: &Acl) -> Result<()> {
        if self.exists(&acl.id) {
            return Err(Error::PolicyExists(acl.id.clone()));
        }
        self.write(acl)
    }

    /// create or replace a policy.
    pub fn upsert(&self, acl: &Acl) -> Result<()> {
        self.write(acl)
    }

    /// apply the replaceable fields of `new_acl` onto `existing` and persist.
    ///
    /// on default policies only `enabled` may change; everything else is
    /// silently kept. a service type of `Any` forces an empty port list
    /// and [`Protocol::All`].
    pub fn update(&self, new_acl: &Acl, existing: &Acl) -> Result<Acl> {
        let mut acl = existing.clone();
        if !acl.default {
            acl.name = new_acl.name.clone();
            acl.src = new_acl.src.clone();
            acl.dst = new_acl.dst.clone();
            acl.allowed_direction = new_acl.allowed_direction;
            acl.port = new_acl.port.clone();
            acl.proto = new_acl.proto;
            acl.service_type = new_acl.service_type;
        }
        if new_acl.service_type == ServiceType::Any {
            acl.port.clear();
            acl.proto = Protocol::All;
        }
        acl.enabled = new_acl.enabled;
        self.write(&acl)?;
        Ok(acl)
    }

    /// fetch a policy by id.
    pub fn get(&self, id: &AclId) -> Result<Acl> {
        if let Some(acl) = self.cache_get(id) {
            return Ok(acl);
        }
        match self.store.fetch_record(ACLS_TABLE, id.as_str()) {
            Ok(data) => {
                let acl: Acl = serde_json::from_str(&data)?;
                self.cache_store(&acl);
                Ok(acl)
            }
            Err(err) if err.is_empty_record() => Err(Error::PolicyNotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// whether a policy with the given id exists.
    pub fn exists(&self, id: &AclId) -> bool {
        self.get(id).is_ok()
    }

    /// delete a policy.
    pub fn delete(&self, acl: &Acl) -> Result<()> {
        self.store.delete_record(ACLS_TABLE, acl.id.as_str())?;
        self.cache_remove(&acl.id);
        Ok(())
    }

    /// every policy.
    ///
    /// served from the cache when it holds anything; otherwise a full
    /// scan repopulates it. records that fail to decode are skipped.
    pub fn list(&self) -> Vec<Acl> {
        let cached = self.cache_list();
        if !cached.is_empty() {
            return cached;
        }
        let records = match self.store.fetch_records(ACLS_TABLE) {
            Ok(records) => records,
            Err(err) if err.is_empty_record() => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "listing acl policies failed");
                return Vec::new();
            }
        };
        let mut acls = Vec::with_capacity(records.len());
        for (key, data) in &records {
            match serde_json::from_str::<Acl>(data) {
                Ok(acl) => {
                    self.cache_store(&acl);
                    acls.push(acl);
                }
                Err(err) => warn!(key = %key, error = %err, "skipping undecodable acl record"),
            }
        }
        acls
    }

    /// every policy in a network.
    pub fn list_by_network(&self, net: &NetworkId) -> Vec<Acl> {
        self.list()
            .into_iter()
            .filter(|acl| acl.network_id == *net)
            .collect()
    }

    /// every device policy in a network.
    pub fn list_device_policies(&self, net: &NetworkId) -> Vec<Acl> {
        self.list()
            .into_iter()
            .filter(|acl| acl.network_id == *net && acl.rule_type == PolicyKind::Device)
            .collect()
    }

    /// every user policy in a network.
    pub fn list_user_policies(&self, net: &NetworkId) -> Vec<Acl> {
        self.list()
            .into_iter()
            .filter(|acl| acl.network_id == *net && acl.rule_type == PolicyKind::User)
            .collect()
    }

    /// the effective default policy of a network for the given rule type.
    ///
    /// the canonical default is returned when enabled. Otherwise any
    /// enabled policy of the same rule type whose src and dst both hold
    /// the wildcard acts as the default; failing that, the disabled
    /// canonical default comes back.
    pub fn get_default_policy(&self, net: &NetworkId, rule_type: PolicyKind) -> Result<Acl> {
        let slug = match rule_type {
            PolicyKind::Device => ALL_NODES_SLUG,
            PolicyKind::User => ALL_USERS_SLUG,
        };
        let acl = self
            .get(&AclId::new(net, slug))
            .map_err(|_| Error::DefaultPolicyNotFound(net.clone()))?;
        if acl.enabled {
            return Ok(acl);
        }
        for policy in self.list_by_network(net) {
            if !policy.enabled || policy.rule_type != rule_type {
                continue;
            }
            let src = tag_value_set(&policy.src);
            let dst = tag_value_set(&policy.dst);
            if src.contains(WILDCARD) && dst.contains(WILDCARD) {
                return Ok(policy);
            }
        }
        Ok(acl)
    }

    /// seed the default policies of a freshly created network.
    ///
    /// inserts the all-nodes, all-users and all-remote-access-gws
    /// defaults plus the two default group policies, each gated on
    /// existence so re-seeding is idempotent.
    pub fn create_default_network_policies(&self, net: &NetworkId) -> Result<()> {
        if net.is_empty() {
            return Ok(());
        }
        let _ = self.list_by_network(net);

        let all_nodes = AclId::new(net, ALL_NODES_SLUG);
        if !self.exists(&all_nodes) {
            self.insert(&Acl {
                id: all_nodes,
                name: "All Nodes".to_string(),
                meta_data: "This policy allows all nodes in the network to communicate with each other"
                    .to_string(),
                network_id: net.clone(),
                rule_type: PolicyKind::Device,
                proto: Protocol::All,
                service_type: ServiceType::Any,
                port: vec![],
                src: vec![PolicyTag::device(WILDCARD)],
                dst: vec![PolicyTag::device(WILDCARD)],
                allowed_direction: TrafficDirection::Bi,
                enabled: true,
                default: true,
                created_by: "auto".to_string(),
                created_at: Utc::now(),
            })?;
        }

        let all_users = AclId::new(net, ALL_USERS_SLUG);
        if !self.exists(&all_users) {
            self.insert(&Acl {
                id: all_users,
                name: "All Users".to_string(),
                meta_data: "This policy gives every user access to everything in the network"
                    .to_string(),
                network_id: net.clone(),
                rule_type: PolicyKind::User,
                proto: Protocol::All,
                service_type: ServiceType::Any,
                port: vec![],
                src: vec![PolicyTag::user(WILDCARD)],
                dst: vec![PolicyTag::device(WILDCARD)],
                allowed_direction: TrafficDirection::Uni,
                enabled: true,
                default: true,
                created_by: "auto".to_string(),
                created_at: Utc::now(),
            })?;
        }

        let all_gws = AclId::new(net, ALL_REMOTE_ACCESS_GWS_SLUG);
        if !self.exists(&all_gws) {
            self.insert(&Acl {
                id: all_gws,
                name: "All Remote Access Gateways".to_string(),
                meta_data: String::new(),
                network_id: net.clone(),
                rule_type: PolicyKind::Device,
                proto: Protocol::All,
                service_type: ServiceType::Any,
                port: vec![],
                src: vec![PolicyTag::device(TagId::scoped(net, REMOTE_ACCESS_TAG).as_str())],
                dst: vec![PolicyTag::device(WILDCARD)],
                allowed_direction: TrafficDirection::Bi,
                enabled: true,
                default: true,
                created_by: "auto".to_string(),
                created_at: Utc::now(),
            })?;
        }

        self.create_default_group_policies(net)
    }

    /// seed the default user-group policies granting gateway access to
    /// the network-admin and network-user groups.
    fn create_default_group_policies(&self, net: &NetworkId) -> Result<()> {
        for role in ["network-admin", "network-user"] {
            let id = AclId::new(net, &format!("{role}-grp"));
            if self.exists(&id) {
                continue;
            }
            self.insert(&Acl {
                id,
                name: format!("{role}-grp"),
                meta_data: String::new(),
                network_id: net.clone(),
                rule_type: PolicyKind::User,
                proto: Protocol::All,
                service_type: ServiceType::Any,
                port: vec![],
                src: vec![PolicyTag::user_group(format!("{net}-{role}-grp"))],
                dst: vec![PolicyTag::device(TagId::scoped(net, REMOTE_ACCESS_TAG).as_str())],
                allowed_direction: TrafficDirection::Uni,
                enabled: true,
                default: true,
                created_by: "auto".to_string(),
                created_at: Utc::now(),
            })?;
        }
        Ok(())
    }

    /// delete every default policy of a network on teardown.
    pub fn delete_default_network_policies(&self, net: &NetworkId) -> Result<()> {
        for acl in self.list_by_network(net) {
            if acl.default {
                self.delete(&acl)?;
            }
        }
        Ok(())
    }

    /// rewrite a renamed device tag across the network's device policies.
    pub fn update_device_tag(&self, old: &TagId, new: &TagId, net: &NetworkId) -> Result<()> {
        for mut acl in self.list_device_policies(net) {
            let mut changed = false;
            for entry in acl.src.iter_mut().chain(acl.dst.iter_mut()) {
                if entry.kind == PolicyTagKind::Device && entry.value == old.as_str() {
                    entry.value = new.to_string();
                    changed = true;
                }
            }
            if changed {
                self.upsert(&acl)?;
            }
        }
        Ok(())
    }

    /// strip a deleted device tag from the network's device policies.
    pub fn remove_device_tag_from_policies(&self, tag: &TagId, net: &NetworkId) -> Result<()> {
        for mut acl in self.list_device_policies(net) {
            let before = acl.src.len() + acl.dst.len();
            acl.src
                .retain(|e| !(e.kind == PolicyTagKind::Device && e.value == tag.as_str()));
            acl.dst
                .retain(|e| !(e.kind == PolicyTagKind::Device && e.value == tag.as_str()));
            if acl.src.len() + acl.dst.len() != before {
                self.upsert(&acl)?;
            }
        }
        Ok(())
    }

    /// whether any device policy in the network references the tag.
    pub fn tag_has_active_policy(&self, tag: &TagId, net: &NetworkId) -> bool {
        self.list_device_policies(net).iter().any(|acl| {
            acl.src
                .iter()
                .chain(acl.dst.iter())
                .any(|e| e.kind == PolicyTagKind::Device && e.value == tag.as_str())
        })
    }

    /// one-time sweep normalizing stored policies that predate the
    /// service-type invariant.
    pub fn normalize_policies(&self) -> Result<()> {
        for mut acl in self.list() {
            if !acl.is_normalized() {
                acl.normalize();
                self.upsert(&acl)?;
            }
        }
        Ok(())
    }
}
