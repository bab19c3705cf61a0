//! Client certificate authentication. The referenced secret supplies the
//! CA bundle the proxy verifies client certificates against.

use k8s_openapi::api::networking::v1::Ingress;

use ingress_types::policy::CertificateAuth;

use crate::parser::{get_string_annotation, parse_name_ns};
use crate::{Error, Result};

pub const AUTH_TLS_SECRET: &str = "ingress.kubernetes.io/auth-tls-secret";

/// Parses the `auth-tls-secret` annotation. `resolve` maps the
/// `namespace/name` secret reference to a certificate already materialised
/// by the TLS store.
pub fn parse(
    ing: &Ingress,
    resolve: impl Fn(&str) -> Option<CertificateAuth>,
) -> Result<CertificateAuth> {
    let raw = get_string_annotation(AUTH_TLS_SECRET, ing)?;
    let (ns, name) = parse_name_ns(&raw)?;
    let key = format!("{ns}/{name}");
    resolve(&key).ok_or(Error::SecretNotFound(key))
}

/// The secret reference without resolution, for reference checks.
pub fn secret_reference(ing: &Ingress) -> Option<String> {
    let raw = get_string_annotation(AUTH_TLS_SECRET, ing).ok()?;
    let (ns, name) = parse_name_ns(&raw).ok()?;
    Some(format!("{ns}/{name}"))
}
