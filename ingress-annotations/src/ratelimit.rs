//! Connection and request rate limiting backed by shared-memory zones.

use k8s_openapi::api::networking::v1::Ingress;

use ingress_types::policy::{RateLimit, Zone};

use crate::parser::get_int_annotation;
use crate::{Error, Result};

const LIMIT_CONNECTIONS: &str = "ingress.kubernetes.io/limit-connections";
const LIMIT_RPS: &str = "ingress.kubernetes.io/limit-rps";

/// Zone size in megabytes shared by every zone the controller declares.
const SHARED_SIZE: i32 = 5;

pub fn parse(ing: &Ingress) -> Result<RateLimit> {
    let connections = get_int_annotation(LIMIT_CONNECTIONS, ing);
    let rps = get_int_annotation(LIMIT_RPS, ing);

    if let (Err(c), Err(r)) = (&connections, &rps)
        && c.is_missing()
        && r.is_missing()
    {
        return Err(Error::Missing(LIMIT_CONNECTIONS));
    }

    let ns = ing.metadata.namespace.as_deref().unwrap_or_default();
    let name = ing.metadata.name.as_deref().unwrap_or_default();
    // Both zones carry the connections-derived name. This mirrors the
    // behaviour the proxy configuration was written against.
    let zone_name = format!("{ns}_{name}_conn");

    Ok(RateLimit {
        connections: zone(&zone_name, connections.unwrap_or(0)),
        rps: zone(&zone_name, rps.unwrap_or(0)),
    })
}

fn zone(name: &str, limit: i32) -> Zone {
    Zone {
        name: name.to_owned(),
        limit,
        burst: limit * 5,
        shared_size: SHARED_SIZE,
    }
}
