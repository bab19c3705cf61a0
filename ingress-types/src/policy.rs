//! Per-location policy values produced by the annotation parsers and
//! embedded in the routing model.

/// Basic or digest authentication backed by an htpasswd file materialised
/// from a secret.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicDigest {
    /// `basic` or `digest`.
    pub auth_type: String,
    pub realm: String,
    /// Path of the htpasswd file on disk.
    pub file: String,
    pub secured: bool,
}

/// Authentication delegated to an external endpoint via sub-request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalAuth {
    pub url: String,
    pub method: String,
    pub send_headers: Vec<String>,
}

/// Client certificate authentication. The CA bundle comes from a secret.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateAuth {
    /// `<namespace>/<name>` of the CA secret.
    pub secret: String,
    pub ca_file_name: String,
    pub pem_sha: String,
}

/// A shared-memory zone limiting either connections or requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Zone {
    pub name: String,
    pub limit: i32,
    pub burst: i32,
    /// Zone size in megabytes.
    pub shared_size: i32,
}

impl Zone {
    pub fn is_defined(&self) -> bool {
        self.limit > 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub connections: Zone,
    pub rps: Zone,
}

/// Path rewrite applied before proxying.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Redirect {
    pub target: String,
    pub add_base_url: bool,
}

/// Client source ranges allowed to reach the location.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceRange {
    pub cidr: Vec<String>,
}

/// Proxy timeouts and buffering applied to the location.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Proxy {
    pub connect_timeout: i32,
    pub send_timeout: i32,
    pub read_timeout: i32,
    pub buffer_size: String,
}

/// Passive health checking applied to the backends of an upstream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthCheck {
    pub max_fails: i32,
    pub fail_timeout: i32,
}
