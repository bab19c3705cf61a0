//! Assembly of the routing model from the informer snapshot.
//!
//! The builder is a pure function of the snapshot: the ingress list comes
//! in pre-filtered and sorted, warnings are returned as values, and every
//! output container is sorted before emission so the same snapshot always
//! renders to the same bytes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::api::networking::v1::{Ingress, IngressBackend, IngressRule};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::runtime::reflector::{ObjectRef, Store};
use tracing::{debug, warn};

use ingress_annotations as annotations;
use ingress_types::policy::{
    BasicDigest, CertificateAuth, ExternalAuth, HealthCheck, Proxy, RateLimit, Redirect,
    SourceRange,
};
use ingress_types::types::{
    Configuration, Location, PassthroughUpstream, Server, Upstream, UpstreamServer,
};
use ingress_types::{DEF_SERVER_NAME, DEF_UPSTREAM_NAME, Defaults, RESERVED_PORTS, ROOT_LOCATION};

use crate::tls::{CertTracker, DEFAULT_CERT_KEY, ssl};

/// Read view over the cluster state a single sync works from.
pub struct Snapshot<'a> {
    /// Admitted ingresses, sorted ascending by resource version so the
    /// oldest rule wins conflicts.
    pub ingresses: Vec<Arc<Ingress>>,
    pub services: &'a Store<Service>,
    pub endpoints: &'a Store<Endpoints>,
    pub secrets: &'a Store<Secret>,
    pub certs: &'a CertTracker,
    pub defaults: Defaults,
    /// `namespace/name` of the service answering unmatched requests.
    pub default_service: String,
    pub healthz_url: String,
    pub auth_dir: PathBuf,
    pub tcp_services: BTreeMap<String, String>,
    pub udp_services: BTreeMap<String, String>,
}

/// A per-ingress problem surfaced as a `Warning:MAPPING` event.
pub struct Warning {
    pub ingress: Arc<Ingress>,
    pub message: String,
}

pub fn build(snapshot: &Snapshot<'_>) -> (Configuration, Vec<Warning>) {
    let mut warnings = Vec::new();

    let mut upstreams = create_upstreams(snapshot);
    let mut servers = create_servers(snapshot, &upstreams, &mut warnings);
    apply_locations(snapshot, &upstreams, &mut servers, &mut warnings);

    for upstream in upstreams.values_mut() {
        if upstream.backends.is_empty() {
            warn!(
                upstream = %upstream.name,
                "upstream does not have any active endpoints, using default backend"
            );
            upstream.backends.push(UpstreamServer::default_backend());
        }
    }

    let mut model = Configuration {
        healthz_url: snapshot.healthz_url.clone(),
        upstreams: upstreams.into_values().collect(),
        servers: servers.into_values().collect(),
        tcp_upstreams: stream_services(snapshot, &snapshot.tcp_services, "TCP"),
        udp_upstreams: stream_services(snapshot, &snapshot.udp_services, "UDP"),
        passthrough_upstreams: Vec::new(),
    };
    model.passthrough_upstreams = passthrough_upstreams(&model.servers);
    model.sort();

    (model, warnings)
}

/// Ingresses admitted by the class filter, oldest first.
pub fn admitted_ingresses(store: &Store<Ingress>, class: &str) -> Vec<Arc<Ingress>> {
    let mut ingresses: Vec<Arc<Ingress>> = store
        .state()
        .into_iter()
        .filter(|ing| annotations::class::is_valid(ing, class))
        .collect();
    ingresses.sort_by(|a, b| {
        resource_version(a)
            .cmp(&resource_version(b))
            .then_with(|| ingress_key(a).cmp(&ingress_key(b)))
    });
    ingresses
}

fn resource_version(ing: &Ingress) -> u64 {
    ing.metadata
        .resource_version
        .as_deref()
        .and_then(|rv| rv.parse().ok())
        .unwrap_or(u64::MAX)
}

fn ingress_key(ing: &Ingress) -> String {
    format!(
        "{}/{}",
        ing.metadata.namespace.as_deref().unwrap_or_default(),
        ing.metadata.name.as_deref().unwrap_or_default()
    )
}

fn rules(ing: &Ingress) -> &[IngressRule] {
    ing.spec
        .as_ref()
        .and_then(|spec| spec.rules.as_deref())
        .unwrap_or_default()
}

fn default_backend(ing: &Ingress) -> Option<&IngressBackend> {
    ing.spec.as_ref()?.default_backend.as_ref()
}

/// Service name and stringified port of an ingress backend.
fn backend_service(backend: &IngressBackend) -> Option<(String, String)> {
    let svc = backend.service.as_ref()?;
    let port = svc
        .port
        .as_ref()
        .map(|p| {
            p.name
                .clone()
                .unwrap_or_else(|| p.number.unwrap_or_default().to_string())
        })
        .unwrap_or_default();
    Some((svc.name.clone(), port))
}

fn upstream_name(ns: &str, svc: &str, port: &str) -> String {
    format!("{ns}-{svc}-{port}")
}

fn get_service(snapshot: &Snapshot<'_>, key: &str) -> Option<Arc<Service>> {
    let (ns, name) = key.split_once('/')?;
    snapshot.services.get(&ObjectRef::new(name).within(ns))
}

fn get_secret(snapshot: &Snapshot<'_>, key: &str) -> Option<Arc<Secret>> {
    let (ns, name) = key.split_once('/')?;
    snapshot.secrets.get(&ObjectRef::new(name).within(ns))
}

/// Phase 1: one upstream per referenced `(service, port)` pair, plus the
/// seeded default backend. Endpoint resolution failures leave the pool
/// empty; the finalise step substitutes the sentinel.
fn create_upstreams(snapshot: &Snapshot<'_>) -> BTreeMap<String, Upstream> {
    let mut upstreams = BTreeMap::new();
    upstreams.insert(DEF_UPSTREAM_NAME.to_string(), default_upstream(snapshot));

    for ing in &snapshot.ingresses {
        let hz = annotations::healthcheck::parse(&snapshot.defaults, ing);
        let ns = ing.metadata.namespace.clone().unwrap_or_default();

        if let Some((svc, port)) = default_backend(ing).and_then(backend_service) {
            let name = upstream_name(&ns, &svc, &port);
            if !upstreams.contains_key(&name) {
                debug!(upstream = %name, "creating upstream");
                let mut upstream = Upstream::new(&name);
                match svc_endpoints(snapshot, &format!("{ns}/{svc}"), &port, &hz) {
                    Ok(backends) => upstream.backends = backends,
                    Err(e) => warn!(upstream = %name, "error creating upstream: {e}"),
                }
                upstreams.insert(name, upstream);
            }
        }

        for rule in rules(ing) {
            let Some(http) = rule.http.as_ref() else {
                continue;
            };
            for path in &http.paths {
                let Some((svc, port)) = backend_service(&path.backend) else {
                    continue;
                };
                let name = upstream_name(&ns, &svc, &port);
                if upstreams.contains_key(&name) {
                    continue;
                }
                debug!(upstream = %name, "creating upstream");
                let mut upstream = Upstream::new(&name);
                match svc_endpoints(snapshot, &format!("{ns}/{svc}"), &port, &hz) {
                    Ok(backends) => upstream.backends = backends,
                    Err(e) => warn!("error obtaining service endpoints: {e}"),
                }
                upstreams.insert(name, upstream);
            }
        }
    }

    upstreams
}

/// Upstream for the operator-configured default backend service. Falls
/// back to the sentinel so unmatched requests get a 503 instead of an
/// invalid configuration.
fn default_upstream(snapshot: &Snapshot<'_>) -> Upstream {
    let mut upstream = Upstream::new(DEF_UPSTREAM_NAME);

    let Some(svc) = get_service(snapshot, &snapshot.default_service) else {
        warn!(
            "default backend service {} does not exist",
            snapshot.default_service
        );
        upstream.backends.push(UpstreamServer::default_backend());
        return upstream;
    };

    let target_port = svc
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .map(|sp| sp.target_port.clone().unwrap_or(IntOrString::Int(sp.port)));

    let mut backends = match target_port {
        Some(target) => endpoints_for(snapshot, &svc, &target, "TCP", &HealthCheck::default()),
        None => Vec::new(),
    };
    if backends.is_empty() {
        warn!(
            "default backend service {} does not have any active endpoints",
            snapshot.default_service
        );
        backends = vec![UpstreamServer::default_backend()];
    }
    upstream.backends = backends;
    upstream
}

/// Resolves the backend port against the service ports by numeric
/// equality, name equality, or target-port string equality, in that
/// order, then collects the TCP endpoints behind the matched port.
fn svc_endpoints(
    snapshot: &Snapshot<'_>,
    svc_key: &str,
    backend_port: &str,
    hz: &HealthCheck,
) -> crate::Result<Vec<UpstreamServer>> {
    let svc = get_service(snapshot, svc_key)
        .ok_or_else(|| crate::Error::MissingResource(format!("service {svc_key}")))?;

    let ports = svc
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.clone())
        .unwrap_or_default();

    let matched = ports
        .iter()
        .find(|sp| sp.port.to_string() == backend_port)
        .or_else(|| ports.iter().find(|sp| sp.name.as_deref() == Some(backend_port)))
        .or_else(|| {
            ports.iter().find(|sp| {
                sp.target_port.as_ref().is_some_and(|tp| match tp {
                    IntOrString::Int(i) => i.to_string() == backend_port,
                    IntOrString::String(s) => s == backend_port,
                })
            })
        });

    let Some(service_port) = matched else {
        warn!("service {svc_key} does not expose port {backend_port}");
        return Ok(Vec::new());
    };

    let target = service_port
        .target_port
        .clone()
        .unwrap_or(IntOrString::Int(service_port.port));
    let backends = endpoints_for(snapshot, &svc, &target, "TCP", hz);
    if backends.is_empty() {
        warn!("service {svc_key} does not have any active endpoints");
    }
    Ok(backends)
}

/// `ip:port` pairs of the endpoint subsets matching the target port and
/// protocol.
fn endpoints_for(
    snapshot: &Snapshot<'_>,
    svc: &Service,
    target_port: &IntOrString,
    proto: &str,
    hz: &HealthCheck,
) -> Vec<UpstreamServer> {
    let ns = svc.metadata.namespace.as_deref().unwrap_or_default();
    let name = svc.metadata.name.as_deref().unwrap_or_default();
    let Some(endpoints) = snapshot.endpoints.get(&ObjectRef::new(name).within(ns)) else {
        warn!("no endpoints found for service {ns}/{name}");
        return Vec::new();
    };

    let mut servers = Vec::new();
    for subset in endpoints.subsets.as_deref().unwrap_or_default() {
        for port in subset.ports.as_deref().unwrap_or_default() {
            if port.protocol.as_deref().unwrap_or("TCP") != proto {
                continue;
            }
            let matched = match target_port {
                IntOrString::Int(number) => port.port == *number,
                IntOrString::String(name) => port.name.as_deref() == Some(name),
            };
            if !matched {
                continue;
            }
            for address in subset.addresses.as_deref().unwrap_or_default() {
                servers.push(UpstreamServer {
                    address: address.ip.clone(),
                    port: port.port.to_string(),
                    max_fails: hz.max_fails,
                    fail_timeout: hz.fail_timeout,
                });
            }
        }
    }
    servers
}

/// Phase 2: one server per hostname, each seeded with a default-backend
/// location at `/`, plus the catch-all. A second pass attaches TLS
/// material from the cert tracker.
fn create_servers(
    snapshot: &Snapshot<'_>,
    upstreams: &BTreeMap<String, Upstream>,
    warnings: &mut Vec<Warning>,
) -> BTreeMap<String, Server> {
    let proxy = annotations::proxy::from_defaults(&snapshot.defaults);
    let default_upstream = upstreams
        .get(DEF_UPSTREAM_NAME)
        .cloned()
        .unwrap_or_else(|| Upstream::new(DEF_UPSTREAM_NAME));
    let root_location = |upstream: Upstream| Location {
        path: ROOT_LOCATION.into(),
        is_def_backend: true,
        upstream,
        proxy: proxy.clone(),
        ..Default::default()
    };

    let mut servers = BTreeMap::new();
    let mut catch_all = Server {
        name: DEF_SERVER_NAME.into(),
        locations: vec![root_location(default_upstream.clone())],
        ..Default::default()
    };
    if let Some(cert) = snapshot.certs.get(DEFAULT_CERT_KEY) {
        catch_all.ssl = true;
        catch_all.ssl_certificate = cert.pem_file_name.clone();
        catch_all.ssl_pem_checksum = cert.pem_sha.clone();
    }
    servers.insert(DEF_SERVER_NAME.to_string(), catch_all);

    for ing in &snapshot.ingresses {
        let ns = ing.metadata.namespace.clone().unwrap_or_default();
        let passthrough = annotations::sslpassthrough::parse(ing).unwrap_or(false);
        let ing_backend = default_backend(ing).and_then(backend_service);

        for rule in rules(ing) {
            let host = rule
                .host
                .clone()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEF_SERVER_NAME.into());

            if !servers.contains_key(&host) {
                servers.insert(
                    host.clone(),
                    Server {
                        name: host.clone(),
                        locations: vec![root_location(default_upstream.clone())],
                        ssl_passthrough: passthrough,
                        ..Default::default()
                    },
                );
            }

            if let Some((svc, port)) = &ing_backend {
                if host == DEF_SERVER_NAME {
                    warnings.push(Warning {
                        ingress: ing.clone(),
                        message: "rules with a default backend are only allowed with hostnames"
                            .into(),
                    });
                } else if let Some(upstream) = upstreams.get(&upstream_name(&ns, svc, port))
                    && let Some(server) = servers.get_mut(&host)
                    && let Some(root) = server
                        .locations
                        .iter_mut()
                        .find(|l| l.path == ROOT_LOCATION && l.is_def_backend)
                {
                    root.upstream = upstream.clone();
                }
            }
        }
    }

    attach_certificates(snapshot, &mut servers);
    servers
}

/// TLS pass: servers referenced by an ingress with `spec.tls` get the
/// materialised certificate when its names cover the host.
fn attach_certificates(snapshot: &Snapshot<'_>, servers: &mut BTreeMap<String, Server>) {
    for ing in &snapshot.ingresses {
        let Some(tls) = ing
            .spec
            .as_ref()
            .and_then(|spec| spec.tls.as_ref())
            .and_then(|tls| tls.first())
        else {
            continue;
        };
        let Some(secret_name) = tls.secret_name.as_deref().filter(|s| !s.is_empty()) else {
            warn!("no secretName defined for hosts of ingress {}", ingress_key(ing));
            continue;
        };

        let ns = ing.metadata.namespace.as_deref().unwrap_or_default();
        let secret_key = format!("{ns}/{secret_name}");
        let Some(cert) = snapshot.certs.get(&secret_key) else {
            warn!("ssl certificate for secret {secret_key} is not available yet");
            continue;
        };

        for rule in rules(ing) {
            let Some(host) = rule.host.as_deref().filter(|h| !h.is_empty()) else {
                continue;
            };
            let Some(server) = servers.get_mut(host) else {
                continue;
            };
            if server.ssl {
                continue;
            }
            if ssl::is_host_valid(host, &cert.cn) {
                server.ssl = true;
                server.ssl_certificate = cert.pem_file_name.clone();
                server.ssl_pem_checksum = cert.pem_sha.clone();
            } else {
                warn!(
                    "ssl certificate in secret {secret_key} is not valid for host {host} \
                     defined in ingress {}",
                    ingress_key(ing)
                );
            }
        }
    }
}

struct PolicyBundle {
    auth: BasicDigest,
    rate_limit: RateLimit,
    redirect: Redirect,
    secure_upstream: bool,
    whitelist: SourceRange,
    enable_cors: bool,
    external_auth: ExternalAuth,
    proxy: Proxy,
    certificate_auth: CertificateAuth,
    ssl_passthrough: bool,
}

fn policy_bundle(snapshot: &Snapshot<'_>, ing: &Ingress) -> PolicyBundle {
    let key = ingress_key(ing);

    let auth = annotations::auth::parse(ing, &snapshot.auth_dir, |secret| {
        get_secret(snapshot, secret)
    })
    .unwrap_or_else(|e| {
        if !e.is_missing() {
            debug!("error reading authentication in ingress {key}: {e}");
        }
        BasicDigest::default()
    });

    let rate_limit = annotations::ratelimit::parse(ing).unwrap_or_else(|e| {
        if !e.is_missing() {
            debug!("error reading rate limit annotation in ingress {key}: {e}");
        }
        RateLimit::default()
    });

    let redirect = annotations::rewrite::parse(ing).unwrap_or_else(|e| {
        if !e.is_missing() {
            debug!("error parsing rewrite annotations for ingress {key}: {e}");
        }
        Redirect::default()
    });

    let secure_upstream = annotations::secureupstream::parse(ing).unwrap_or_else(|e| {
        if !e.is_missing() {
            debug!("error reading secure upstream in ingress {key}: {e}");
        }
        false
    });

    let whitelist = annotations::ipwhitelist::parse(&snapshot.defaults, ing).unwrap_or_else(|e| {
        if !e.is_missing() {
            debug!("error reading whitelist annotation in ingress {key}: {e}");
        }
        SourceRange {
            cidr: snapshot.defaults.whitelist_source_range.clone(),
        }
    });

    let enable_cors = annotations::cors::parse(ing).unwrap_or(false);

    let external_auth = annotations::authreq::parse(ing).unwrap_or_else(|e| {
        if !e.is_missing() {
            debug!("error reading auth request annotation in ingress {key}: {e}");
        }
        ExternalAuth::default()
    });

    let proxy = annotations::proxy::parse(&snapshot.defaults, ing);

    let certificate_auth = annotations::authtls::parse(ing, |secret| {
        snapshot.certs.get(secret).map(|cert| CertificateAuth {
            secret: secret.to_owned(),
            ca_file_name: if cert.ca_file_name.is_empty() {
                cert.pem_file_name.clone()
            } else {
                cert.ca_file_name.clone()
            },
            pem_sha: cert.pem_sha.clone(),
        })
    })
    .unwrap_or_else(|e| {
        if !e.is_missing() {
            debug!("error reading certificate auth annotation in ingress {key}: {e}");
        }
        CertificateAuth::default()
    });

    let ssl_passthrough = annotations::sslpassthrough::parse(ing).unwrap_or(false);

    PolicyBundle {
        auth,
        rate_limit,
        redirect,
        secure_upstream,
        whitelist,
        enable_cors,
        external_auth,
        proxy,
        certificate_auth,
        ssl_passthrough,
    }
}

fn apply_policy(location: &mut Location, policy: &PolicyBundle) {
    location.basic_digest_auth = policy.auth.clone();
    location.rate_limit = policy.rate_limit.clone();
    location.redirect = policy.redirect.clone();
    location.secure_upstream = policy.secure_upstream;
    location.whitelist = policy.whitelist.clone();
    location.enable_cors = policy.enable_cors;
    location.external_auth = policy.external_auth.clone();
    location.proxy = policy.proxy.clone();
    location.certificate_auth = policy.certificate_auth.clone();
    location.ssl_passthrough = policy.ssl_passthrough;
}

/// Phase 3: bind each `(host, path)` to its upstream with the per-ingress
/// policy bundle. The first rule (oldest resource version) wins a path;
/// later claims are dropped with a `MAPPING` warning.
fn apply_locations(
    snapshot: &Snapshot<'_>,
    upstreams: &BTreeMap<String, Upstream>,
    servers: &mut BTreeMap<String, Server>,
    warnings: &mut Vec<Warning>,
) {
    for ing in &snapshot.ingresses {
        let ns = ing.metadata.namespace.clone().unwrap_or_default();
        let policy = policy_bundle(snapshot, ing);
        let ing_backend = default_backend(ing).and_then(backend_service);

        for rule in rules(ing) {
            let host = rule
                .host
                .clone()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEF_SERVER_NAME.into());

            let Some(http) = rule.http.as_ref() else {
                // a rule carrying only the ingress default backend points
                // every location of the host at it
                if host != DEF_SERVER_NAME
                    && let Some((svc, port)) = &ing_backend
                    && let Some(upstream) = upstreams.get(&upstream_name(&ns, svc, port))
                    && let Some(server) = servers.get_mut(&host)
                {
                    for location in &mut server.locations {
                        location.upstream = upstream.clone();
                    }
                }
                continue;
            };

            for path in &http.paths {
                let Some((svc, port)) = backend_service(&path.backend) else {
                    continue;
                };
                let Some(upstream) = upstreams.get(&upstream_name(&ns, &svc, &port)) else {
                    continue;
                };

                let mut nginx_path = path.path.clone().unwrap_or_default();
                if nginx_path.is_empty() {
                    warnings.push(Warning {
                        ingress: ing.clone(),
                        message: format!(
                            "ingress rule {} contains no path definition, assuming {ROOT_LOCATION}",
                            ingress_key(ing)
                        ),
                    });
                    nginx_path = ROOT_LOCATION.into();
                }

                let Some(server) = servers.get_mut(&host) else {
                    continue;
                };

                let mut add_location = true;
                for location in &mut server.locations {
                    if location.path != nginx_path {
                        continue;
                    }
                    if location.is_def_backend {
                        // still the seeded placeholder; claim it
                        location.upstream = upstream.clone();
                        location.is_def_backend = false;
                        apply_policy(location, &policy);
                    } else {
                        warnings.push(Warning {
                            ingress: ing.clone(),
                            message: format!(
                                "path {nginx_path} already defined in another ingress rule"
                            ),
                        });
                    }
                    add_location = false;
                    break;
                }

                if add_location {
                    let mut location = Location {
                        path: nginx_path,
                        is_def_backend: false,
                        upstream: upstream.clone(),
                        ..Default::default()
                    };
                    apply_policy(&mut location, &policy);
                    server.locations.push(location);
                }
            }
        }
    }
}

/// TCP/UDP services exposed through the dedicated config maps:
/// `externalPort -> namespace/name:port`. Reserved ports and services
/// without endpoints are dropped with a warning; there is no stream
/// equivalent of the default backend.
fn stream_services(
    snapshot: &Snapshot<'_>,
    data: &BTreeMap<String, String>,
    proto: &str,
) -> Vec<Location> {
    let mut locations = Vec::new();

    for (external_port, target) in data {
        let Ok(port) = external_port.parse::<u16>() else {
            warn!("{external_port} is not valid as a {proto} port");
            continue;
        };
        if RESERVED_PORTS.contains(&port) {
            warn!(
                "port {port} cannot be used for {proto} services, \
                 it is reserved for the ingress controller"
            );
            continue;
        }

        let Some((ns_name, svc_port)) = target.split_once(':') else {
            warn!("invalid format (namespace/name:port) '{target}'");
            continue;
        };
        let Some((ns, svc_name)) = ns_name.split_once('/') else {
            warn!("invalid format (namespace/name:port) '{target}'");
            continue;
        };

        let Some(svc) = get_service(snapshot, ns_name) else {
            warn!("service {ns_name} was not found");
            continue;
        };

        let ports = svc
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.clone())
            .unwrap_or_default();
        let matched = match svc_port.parse::<i32>() {
            Ok(number) => ports.iter().find(|sp| sp.port == number),
            Err(_) => ports.iter().find(|sp| sp.name.as_deref() == Some(svc_port)),
        };
        let Some(service_port) = matched else {
            warn!("service {ns_name} does not expose port {svc_port}");
            continue;
        };

        let target_port = service_port
            .target_port
            .clone()
            .unwrap_or(IntOrString::Int(service_port.port));
        let backends = endpoints_for(snapshot, &svc, &target_port, proto, &HealthCheck::default());
        if backends.is_empty() {
            warn!("service {ns_name} does not have any active endpoints");
            continue;
        }

        locations.push(Location {
            path: external_port.clone(),
            upstream: Upstream {
                name: format!("{ns}-{svc_name}-{port}"),
                backends,
                secure: false,
            },
            ..Default::default()
        });
    }

    locations
}

/// Hosts terminating TLS at the backend, paired with the upstream of
/// their root location.
fn passthrough_upstreams(servers: &[Server]) -> Vec<PassthroughUpstream> {
    servers
        .iter()
        .filter(|server| server.ssl_passthrough)
        .filter_map(|server| {
            server
                .locations
                .iter()
                .find(|location| location.path == ROOT_LOCATION)
                .map(|location| PassthroughUpstream {
                    host: server.name.clone(),
                    upstream: location.upstream.clone(),
                })
        })
        .collect()
}
