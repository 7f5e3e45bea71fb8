//! table-namespaced key/value persistence for meshwire.
//!
//! every entity is stored as a json blob under a `(table, key)` pair.
//! backends are expected to be internally synchronized; concurrent
//! inserts and fetches are safe. A missing key surfaces as the
//! distinguished [`Error::EmptyRecord`] kind so consumers can test for
//! absence instead of catching a generic failure.

#![warn(missing_docs)]

mod error;
mod mem;

pub use error::{Error, Result};
pub use mem::MemStore;

use std::collections::BTreeMap;

/// table holding acl policies, keyed by `<network>.<slug>`.
pub const ACLS_TABLE: &str = "acls";

/// table holding role permission templates, keyed by role id.
pub const USER_PERMISSIONS_TABLE: &str = "user_permissions";

/// table holding user groups, keyed by group id.
pub const USER_GROUPS_TABLE: &str = "user_groups";

/// a table-namespaced blob store.
///
/// values are json-serialized entities; the store treats them as opaque
/// strings.
pub trait Store: Send + Sync {
    /// write a value under `(table, key)`, replacing any existing record.
    fn insert(&self, table: &str, key: &str, value: &str) -> Result<()>;

    /// read the value stored under `(table, key)`.
    ///
    /// fails with [`Error::EmptyRecord`] when the key is absent.
    fn fetch_record(&self, table: &str, key: &str) -> Result<String>;

    /// read every record in a table, keyed by record key.
    ///
    /// fails with [`Error::EmptyRecord`] when the table holds no records.
    fn fetch_records(&self, table: &str) -> Result<BTreeMap<String, String>>;

    /// delete the record under `(table, key)`.
    ///
    /// fails with [`Error::EmptyRecord`] when the key is absent.
    fn delete_record(&self, table: &str, key: &str) -> Result<()>;
}
