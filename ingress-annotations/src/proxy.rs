//! Per-location proxy timeouts and buffer sizing.

use k8s_openapi::api::networking::v1::Ingress;

use ingress_types::Defaults;
use ingress_types::policy::Proxy;

use crate::parser::{get_int_annotation, get_string_annotation};

const CONNECT_TIMEOUT: &str = "ingress.kubernetes.io/proxy-connect-timeout";
const SEND_TIMEOUT: &str = "ingress.kubernetes.io/proxy-send-timeout";
const READ_TIMEOUT: &str = "ingress.kubernetes.io/proxy-read-timeout";
const BUFFER_SIZE: &str = "ingress.kubernetes.io/proxy-buffer-size";

/// Every value falls back to the backend defaults independently.
pub fn parse(defaults: &Defaults, ing: &Ingress) -> Proxy {
    Proxy {
        connect_timeout: get_int_annotation(CONNECT_TIMEOUT, ing)
            .unwrap_or(defaults.proxy_connect_timeout),
        send_timeout: get_int_annotation(SEND_TIMEOUT, ing).unwrap_or(defaults.proxy_send_timeout),
        read_timeout: get_int_annotation(READ_TIMEOUT, ing).unwrap_or(defaults.proxy_read_timeout),
        buffer_size: get_string_annotation(BUFFER_SIZE, ing)
            .unwrap_or_else(|_| defaults.proxy_buffer_size.clone()),
    }
}

/// Proxy policy built purely from defaults, used for seeded locations.
pub fn from_defaults(defaults: &Defaults) -> Proxy {
    Proxy {
        connect_timeout: defaults.proxy_connect_timeout,
        send_timeout: defaults.proxy_send_timeout,
        read_timeout: defaults.proxy_read_timeout,
        buffer_size: defaults.proxy_buffer_size.clone(),
    }
}
