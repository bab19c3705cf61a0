//! Shared fixtures for the controller test modules.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Secret, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rcgen::{CertificateParams, DnType, KeyPair};

/// Self-signed certificate and key covering `hosts`. The first host is
/// also the common name.
pub fn self_signed(hosts: &[&str]) -> (String, String) {
    let mut params =
        CertificateParams::new(hosts.iter().map(|h| h.to_string()).collect::<Vec<_>>()).unwrap();
    params
        .distinguished_name
        .push(DnType::CommonName, hosts[0]);
    let key_pair = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    (cert.pem(), key_pair.serialize_pem())
}

pub fn meta(ns: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: Some(ns.into()),
        ..Default::default()
    }
}

pub fn service_backend(name: &str, port: i32) -> IngressBackend {
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

/// `host/path -> svc:port` rule in namespace `default`.
pub fn ingress(name: &str, host: &str, path: &str, svc: &str, port: i32) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            resource_version: Some("1".into()),
            ..meta("default", name)
        },
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: (!host.is_empty()).then(|| host.to_string()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: (!path.is_empty()).then(|| path.to_string()),
                        path_type: "Prefix".into(),
                        backend: service_backend(svc, port),
                    }],
                }),
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn with_tls(mut ing: Ingress, hosts: &[&str], secret: &str) -> Ingress {
    let spec = ing.spec.get_or_insert_default();
    spec.tls = Some(vec![IngressTLS {
        hosts: Some(hosts.iter().map(|h| h.to_string()).collect()),
        secret_name: Some(secret.into()),
    }]);
    ing
}

/// Service with one TCP port `port -> target_port`.
pub fn service(ns: &str, name: &str, port: i32, target_port: i32) -> Service {
    Service {
        metadata: meta(ns, name),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("http".into()),
                port,
                protocol: Some("TCP".into()),
                target_port: Some(IntOrString::Int(target_port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

/// Endpoints with the given ready addresses on one TCP port.
pub fn endpoints(ns: &str, name: &str, ips: &[&str], port: i32) -> Endpoints {
    Endpoints {
        metadata: meta(ns, name),
        subsets: Some(vec![EndpointSubset {
            addresses: Some(
                ips.iter()
                    .map(|ip| EndpointAddress {
                        ip: ip.to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ports: Some(vec![EndpointPort {
                name: Some("http".into()),
                port,
                protocol: Some("TCP".into()),
                ..Default::default()
            }]),
            ..Default::default()
        }]),
    }
}

pub fn tls_secret(ns: &str, name: &str, cert: &str, key: &str) -> Secret {
    let mut data = BTreeMap::new();
    data.insert("tls.crt".to_string(), ByteString(cert.as_bytes().to_vec()));
    data.insert("tls.key".to_string(), ByteString(key.as_bytes().to_vec()));
    Secret {
        metadata: meta(ns, name),
        type_: Some("kubernetes.io/tls".into()),
        data: Some(data),
        ..Default::default()
    }
}

/// Reflector store pre-loaded with the given objects.
pub fn store_of<K>(objects: Vec<K>) -> kube::runtime::reflector::Store<K>
where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + std::fmt::Debug
        + k8s_openapi::serde::de::DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    use kube::runtime::reflector;
    use kube::runtime::watcher;

    let (store, mut writer) = reflector::store();
    for obj in objects {
        writer.apply_watcher_event(&watcher::Event::Apply(obj));
    }
    store
}

pub fn arc_sorted(ingresses: Vec<Ingress>) -> Vec<Arc<Ingress>> {
    let mut list: Vec<Arc<Ingress>> = ingresses.into_iter().map(Arc::new).collect();
    list.sort_by_key(|i| {
        i.metadata
            .resource_version
            .as_deref()
            .and_then(|rv| rv.parse::<u64>().ok())
            .unwrap_or(u64::MAX)
    });
    list
}
