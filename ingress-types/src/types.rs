use crate::policy::{
    BasicDigest, CertificateAuth, ExternalAuth, Proxy, RateLimit, Redirect, SourceRange,
};

/// A single backend behind an upstream, addressed as `address:port`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpstreamServer {
    pub address: String,
    pub port: String,
    pub max_fails: i32,
    pub fail_timeout: i32,
}

impl UpstreamServer {
    /// The sentinel backend substituted when a service has no active
    /// endpoints. The proxy answers 503 on this port.
    pub fn default_backend() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: "8181".into(),
            max_fails: 0,
            fail_timeout: 0,
        }
    }
}

/// A named pool of backends addressable by the proxy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Upstream {
    pub name: String,
    pub backends: Vec<UpstreamServer>,
    pub secure: bool,
}

impl Upstream {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when the only backend is the 503 sentinel.
    pub fn is_default(&self) -> bool {
        self.backends.len() == 1 && self.backends[0] == UpstreamServer::default_backend()
    }
}

/// A path rule under a virtual server. The upstream is embedded by value
/// so the emitted model stays a tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Location {
    pub path: String,
    pub is_def_backend: bool,
    pub upstream: Upstream,
    pub basic_digest_auth: BasicDigest,
    pub rate_limit: RateLimit,
    pub redirect: Redirect,
    pub secure_upstream: bool,
    pub whitelist: SourceRange,
    pub enable_cors: bool,
    pub external_auth: ExternalAuth,
    pub proxy: Proxy,
    pub certificate_auth: CertificateAuth,
    pub ssl_passthrough: bool,
}

/// A virtual server keyed by hostname, or by `_` for the catch-all.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Server {
    pub name: String,
    pub locations: Vec<Location>,
    pub ssl: bool,
    pub ssl_certificate: String,
    pub ssl_pem_checksum: String,
    pub ssl_passthrough: bool,
}

/// An SSL-passthrough binding between a hostname and the upstream of its
/// root location.
#[derive(Clone, Debug, PartialEq)]
pub struct PassthroughUpstream {
    pub host: String,
    pub upstream: Upstream,
}

/// A certificate materialised on disk from a TLS secret.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SslCert {
    pub name: String,
    pub namespace: String,
    /// `<namespace>/<name>` of the secret this cert came from.
    pub secret: String,
    pub cert_file_name: String,
    pub key_file_name: String,
    pub ca_file_name: String,
    /// Path to the concatenated cert + key file.
    pub pem_file_name: String,
    /// SHA1 over the pem file, used to detect rotated secrets.
    pub pem_sha: String,
    /// Common name plus all subject alternative names.
    pub cn: Vec<String>,
}

impl SslCert {
    pub fn secret_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// The full routing model handed to the backend on every sync.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Configuration {
    pub healthz_url: String,
    pub upstreams: Vec<Upstream>,
    pub servers: Vec<Server>,
    pub tcp_upstreams: Vec<Location>,
    pub udp_upstreams: Vec<Location>,
    pub passthrough_upstreams: Vec<PassthroughUpstream>,
}

impl Configuration {
    /// Applies the canonical ordering: upstreams by name, backends by
    /// `(address, port)`, servers by name, locations descending by path so
    /// the most specific prefix wins and `/` sorts last.
    pub fn sort(&mut self) {
        for upstream in &mut self.upstreams {
            sort_backends(&mut upstream.backends);
        }
        self.upstreams.sort_by(|a, b| a.name.cmp(&b.name));

        for server in &mut self.servers {
            server.locations.sort_by(|a, b| b.path.cmp(&a.path));
        }
        self.servers.sort_by(|a, b| a.name.cmp(&b.name));

        self.passthrough_upstreams
            .sort_by(|a, b| a.host.cmp(&b.host));
    }
}

pub fn sort_backends(backends: &mut [UpstreamServer]) {
    backends.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.port.cmp(&b.port)));
}

#[cfg(test)]
mod test {
    use super::*;

    fn backend(addr: &str, port: &str) -> UpstreamServer {
        UpstreamServer {
            address: addr.into(),
            port: port.into(),
            ..Default::default()
        }
    }

    #[test]
    fn backends_sort_by_address_then_port() {
        let mut backends = vec![
            backend("10.0.0.2", "80"),
            backend("10.0.0.1", "8080"),
            backend("10.0.0.1", "80"),
        ];
        sort_backends(&mut backends);
        assert_eq!(backends[0], backend("10.0.0.1", "80"));
        assert_eq!(backends[1], backend("10.0.0.1", "8080"));
        assert_eq!(backends[2], backend("10.0.0.2", "80"));
    }

    #[test]
    fn locations_sort_descending_with_root_last() {
        let mut cfg = Configuration {
            servers: vec![Server {
                name: "foo.bar".into(),
                locations: vec![
                    Location {
                        path: "/".into(),
                        ..Default::default()
                    },
                    Location {
                        path: "/app".into(),
                        ..Default::default()
                    },
                    Location {
                        path: "/app/v2".into(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        cfg.sort();
        let paths: Vec<&str> = cfg.servers[0]
            .locations
            .iter()
            .map(|l| l.path.as_str())
            .collect();
        assert_eq!(paths, ["/app/v2", "/app", "/"]);
    }

    #[test]
    fn model_sort_is_idempotent() {
        let mut cfg = Configuration {
            upstreams: vec![
                Upstream::new("default-b-80"),
                Upstream::new("default-a-80"),
            ],
            servers: vec![
                Server {
                    name: "b.example.com".into(),
                    ..Default::default()
                },
                Server {
                    name: "_".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        cfg.sort();
        let once = cfg.clone();
        cfg.sort();
        assert_eq!(once, cfg);
        assert_eq!(cfg.upstreams[0].name, "default-a-80");
        assert_eq!(cfg.servers[0].name, "_");
    }

    #[test]
    fn default_upstream_detection() {
        let mut ups = Upstream::new("default-svc-80");
        assert!(!ups.is_default());
        ups.backends.push(UpstreamServer::default_backend());
        assert!(ups.is_default());
        ups.backends.push(backend("10.0.0.1", "80"));
        assert!(!ups.is_default());
    }
}
