pub mod informer;

use kube::ResourceExt;

use crate::{Error, Result};

/// Cache key of an object: `namespace/name`.
pub fn meta_key<K: ResourceExt>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Splits a `namespace/name` reference.
pub fn parse_name_ns(value: &str) -> Result<(String, String)> {
    match value.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((ns.to_owned(), name.to_owned()))
        }
        _ => Err(Error::InvalidConfiguration(format!(
            "invalid format (namespace/name) '{value}'"
        ))),
    }
}
