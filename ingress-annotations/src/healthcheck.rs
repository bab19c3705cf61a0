//! Passive health checking for the backends of an upstream.

use k8s_openapi::api::networking::v1::Ingress;

use ingress_types::Defaults;
use ingress_types::policy::HealthCheck;

use crate::parser::get_int_annotation;

const MAX_FAILS: &str = "ingress.kubernetes.io/upstream-max-fails";
const FAIL_TIMEOUT: &str = "ingress.kubernetes.io/upstream-fail-timeout";

/// Falls back to the backend defaults for any value not set on the
/// ingress. Never fails: unparseable values behave like absent ones.
pub fn parse(defaults: &Defaults, ing: &Ingress) -> HealthCheck {
    let max_fails = get_int_annotation(MAX_FAILS, ing).unwrap_or(defaults.upstream_max_fails);
    let fail_timeout =
        get_int_annotation(FAIL_TIMEOUT, ing).unwrap_or(defaults.upstream_fail_timeout);

    HealthCheck {
        max_fails,
        fail_timeout,
    }
}
