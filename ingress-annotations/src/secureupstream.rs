use k8s_openapi::api::networking::v1::Ingress;

use crate::Result;
use crate::parser::get_bool_annotation;

const SECURE_BACKENDS: &str = "ingress.kubernetes.io/secure-backends";

/// Whether the proxy should talk TLS to the upstream servers.
pub fn parse(ing: &Ingress) -> Result<bool> {
    get_bool_annotation(SECURE_BACKENDS, ing)
}
