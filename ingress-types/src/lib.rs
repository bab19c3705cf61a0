pub mod backend;
pub mod defaults;
pub mod policy;
pub mod types;

pub use backend::Backend;
pub use defaults::Defaults;
pub use types::{Configuration, Location, Server, SslCert, Upstream, UpstreamServer};

/// Name of the upstream backing every location that has no service of its own.
pub const DEF_UPSTREAM_NAME: &str = "upstream-default-backend";

/// Hostname of the catch-all virtual server.
pub const DEF_SERVER_NAME: &str = "_";

/// Every server owns a location at this path.
pub const ROOT_LOCATION: &str = "/";

/// Directory holding the materialised `.pem` files.
pub const DEFAULT_SSL_DIRECTORY: &str = "/etc/ingress-controller/ssl";

/// Ports owned by the proxy itself. They never appear as TCP or UDP
/// stream services.
pub const RESERVED_PORTS: [u16; 4] = [80, 443, 8181, 18080];
