//! Cache key derivation.
//!
//! A listing is cached under `<family>:v<version>:<fingerprint>`, where the
//! fingerprint is the SHA-256 of the canonical JSON form of its query.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Named group of cache entries sharing one version counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceFamily(&'static str);

impl ResourceFamily {
    pub const PRODUCTS: ResourceFamily = ResourceFamily("products");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Key under which a family's version counter is stored.
pub fn version_key(family: ResourceFamily) -> String {
    format!("cache:{family}:version")
}

/// Filter, sort and pagination parameters of one list request.
///
/// Parameters are held unordered; only [`QueryDescriptor::normalize`] imposes
/// an order. Absent values are kept and serialize as `null`, so a descriptor
/// always normalizes the same way regardless of which optional filters the
/// caller happened to set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    params: HashMap<String, Value>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Canonical JSON object with keys in lexicographic order.
    pub fn normalize(&self) -> String {
        let mut names: Vec<&String> = self.params.keys().collect();
        names.sort();

        let mut ordered = Map::new();
        for name in names {
            if let Some(value) = self.params.get(name) {
                ordered.insert(name.clone(), value.clone());
            }
        }

        Value::Object(ordered).to_string()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.normalize())
    }
}

impl<K, V> FromIterator<(K, V)> for QueryDescriptor
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut descriptor = QueryDescriptor::new();
        for (name, value) in iter {
            descriptor.insert(name, value);
        }
        descriptor
    }
}

/// Lowercase hex SHA-256 digest of `canonical`.
pub fn fingerprint(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    let bytes: &[u8] = &digest;
    hex::encode(bytes)
}

/// Composite key of one cached listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    family: ResourceFamily,
    version: u64,
    fingerprint: String,
}

impl CacheKey {
    pub fn new(family: ResourceFamily, version: u64, fingerprint: impl Into<String>) -> Self {
        Self {
            family,
            version,
            fingerprint: fingerprint.into(),
        }
    }

    pub fn for_query(family: ResourceFamily, version: u64, descriptor: &QueryDescriptor) -> Self {
        Self::new(family, version, descriptor.fingerprint())
    }

    pub fn family(&self) -> ResourceFamily {
        self.family
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:v{}:{}", self.family, self.version, self.fingerprint)
    }
}
