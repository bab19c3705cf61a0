//! Parsers turning ingress annotations into typed per-location policy.
//!
//! Every parser is a pure function of the ingress object (plus the backend
//! defaults where fallback applies). A missing annotation is reported with
//! [`Error::Missing`] so callers can distinguish "not configured" from
//! "misconfigured".

pub mod auth;
pub mod authreq;
pub mod authtls;
pub mod class;
pub mod cors;
pub mod healthcheck;
pub mod ipwhitelist;
pub mod parser;
pub mod proxy;
pub mod ratelimit;
pub mod rewrite;
pub mod secureupstream;
pub mod sslpassthrough;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("annotation {0} is not set")]
    Missing(&'static str),

    #[error("invalid annotation: {0}")]
    Invalid(String),

    #[error("secret {0} not found")]
    SecretNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the annotation is simply absent, as opposed to present
    /// but unparseable.
    pub fn is_missing(&self) -> bool {
        matches!(self, Error::Missing(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use k8s_openapi::api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
        IngressServiceBackend, IngressSpec, ServiceBackendPort,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    pub fn backend(name: &str, port: i32) -> IngressBackend {
        IngressBackend {
            service: Some(IngressServiceBackend {
                name: name.into(),
                port: Some(ServiceBackendPort {
                    number: Some(port),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }
    }

    pub fn build_ingress() -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                name: Some("foo".into()),
                namespace: Some("default".into()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                default_backend: Some(backend("default-backend", 80)),
                rules: Some(vec![IngressRule {
                    host: Some("foo.bar.com".into()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some("/foo".into()),
                            path_type: "Prefix".into(),
                            backend: backend("default-backend", 80),
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            status: None,
        }
    }

    pub fn with_annotations(mut ing: Ingress, data: &[(&str, &str)]) -> Ingress {
        let map: BTreeMap<String, String> = data
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ing.metadata.annotations = Some(map);
        ing
    }
}
