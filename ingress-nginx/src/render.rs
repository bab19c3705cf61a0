//! Deterministic rendering of the routing model into an NGINX
//! configuration. The model arrives fully sorted, so rendering the same
//! model always produces byte-identical output.

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

use ingress_types::types::{Configuration, Location, Server, Upstream};

use crate::config::NginxConfig;

pub fn render(cfg: &NginxConfig, model: &Configuration) -> String {
    let mut out = String::new();

    let w = &mut out;
    let _ = writeln!(w, "daemon off;");
    let _ = writeln!(w, "worker_processes auto;");
    let _ = writeln!(w, "pid /run/nginx.pid;");
    let _ = writeln!(w);
    let _ = writeln!(w, "events {{");
    let _ = writeln!(w, "    worker_connections 16384;");
    let _ = writeln!(w, "}}");
    let _ = writeln!(w);

    let _ = writeln!(w, "http {{");
    let _ = writeln!(
        w,
        "    server_names_hash_max_size {};",
        cfg.server_name_hash_max_size
    );
    let _ = writeln!(
        w,
        "    server_names_hash_bucket_size {};",
        cfg.server_name_hash_bucket_size
    );
    if !cfg.resolver.is_empty() {
        let _ = writeln!(w, "    resolver {} valid=30s;", cfg.resolver);
    }
    if cfg.skip_access_log_urls.is_empty() {
        let _ = writeln!(w, "    access_log /var/log/nginx/access.log;");
    } else {
        let _ = writeln!(w, "    map $request_uri $loggable {{");
        let _ = writeln!(w, "        default 1;");
        for url in &cfg.skip_access_log_urls {
            let _ = writeln!(w, "        {url} 0;");
        }
        let _ = writeln!(w, "    }}");
        let _ = writeln!(
            w,
            "    access_log /var/log/nginx/access.log combined if=$loggable;"
        );
    }
    let _ = writeln!(w);

    for zone in rate_limit_zones(&model.servers) {
        let _ = writeln!(w, "    {zone}");
    }
    let _ = writeln!(w);

    for upstream in &model.upstreams {
        write_upstream(w, upstream);
        let _ = writeln!(w);
    }

    for server in &model.servers {
        write_server(w, cfg, server, &model.healthz_url);
        let _ = writeln!(w);
    }

    // internal vhost backing the loopback health probe
    let _ = writeln!(w, "    server {{");
    let _ = writeln!(w, "        listen 18080 default_server;");
    let _ = writeln!(w, "        location {} {{", healthz_path(&model.healthz_url));
    let _ = writeln!(w, "            access_log off;");
    let _ = writeln!(w, "            return 200;");
    let _ = writeln!(w, "        }}");
    let _ = writeln!(w, "        location /nginx_status {{");
    let _ = writeln!(w, "            stub_status on;");
    let _ = writeln!(w, "            access_log off;");
    let _ = writeln!(w, "        }}");
    let _ = writeln!(w, "    }}");
    let _ = writeln!(w, "}}");

    if !model.tcp_upstreams.is_empty()
        || !model.udp_upstreams.is_empty()
        || !model.passthrough_upstreams.is_empty()
    {
        let _ = writeln!(w);
        let _ = writeln!(w, "stream {{");
        for loc in &model.tcp_upstreams {
            write_stream_service(w, loc, false);
        }
        for loc in &model.udp_upstreams {
            write_stream_service(w, loc, true);
        }
        for pt in &model.passthrough_upstreams {
            let _ = writeln!(w, "    # passthrough {}", pt.host);
            write_upstream(w, &pt.upstream);
        }
        let _ = writeln!(w, "}}");
    }

    squeeze_blank_lines(&out)
}

fn healthz_path(url: &str) -> &str {
    if url.is_empty() { "/healthz" } else { url }
}

fn write_upstream(w: &mut String, upstream: &Upstream) {
    let _ = writeln!(w, "    upstream {} {{", upstream.name);
    let _ = writeln!(w, "        least_conn;");
    for backend in &upstream.backends {
        let mut server = format!("server {}:{}", backend.address, backend.port);
        if backend.max_fails > 0 {
            let _ = write!(server, " max_fails={}", backend.max_fails);
        }
        if backend.fail_timeout > 0 {
            let _ = write!(server, " fail_timeout={}s", backend.fail_timeout);
        }
        let _ = writeln!(w, "        {server};");
    }
    let _ = writeln!(w, "    }}");
}

fn write_server(w: &mut String, cfg: &NginxConfig, server: &Server, healthz_url: &str) {
    let _ = writeln!(w, "    server {{");
    let _ = writeln!(w, "        server_name {};", server.name);
    let _ = writeln!(w, "        listen 80;");

    if server.ssl && !server.ssl_passthrough {
        let _ = writeln!(w, "        listen 443 ssl;");
        let _ = writeln!(w, "        ssl_certificate {};", server.ssl_certificate);
        let _ = writeln!(w, "        ssl_certificate_key {};", server.ssl_certificate);
        // pem checksum {sha} — forces a reload when the secret rotates
        let _ = writeln!(w, "        # pem checksum {}", server.ssl_pem_checksum);
        if cfg.ssl_redirect {
            let _ = writeln!(w, "        if ($scheme = http) {{");
            let _ = writeln!(w, "            return 301 https://$host$request_uri;");
            let _ = writeln!(w, "        }}");
        }
    }

    if let Some(ca) = server
        .locations
        .iter()
        .map(|l| l.certificate_auth.ca_file_name.as_str())
        .find(|ca| !ca.is_empty())
    {
        let _ = writeln!(w, "        ssl_client_certificate {ca};");
        let _ = writeln!(w, "        ssl_verify_client on;");
    }

    if !cfg.custom_http_errors.is_empty() {
        for code in &cfg.custom_http_errors {
            let _ = writeln!(w, "        error_page {code} = @custom_errors;");
        }
        let _ = writeln!(w, "        location @custom_errors {{");
        let _ = writeln!(w, "            proxy_pass http://upstream-default-backend;");
        let _ = writeln!(w, "        }}");
    }

    for location in &server.locations {
        write_location(w, location);
        if !location.external_auth.url.is_empty() {
            write_external_auth_location(w, location);
        }
    }

    let _ = writeln!(w, "        location {} {{", healthz_path(healthz_url));
    let _ = writeln!(w, "            access_log off;");
    let _ = writeln!(w, "            proxy_pass http://127.0.0.1:18080;");
    let _ = writeln!(w, "        }}");
    let _ = writeln!(w, "    }}");
}

fn write_location(w: &mut String, location: &Location) {
    let _ = writeln!(w, "        location {} {{", build_location(location));

    if location.basic_digest_auth.secured {
        match location.basic_digest_auth.auth_type.as_str() {
            "digest" => {
                let _ = writeln!(
                    w,
                    "            auth_digest \"{}\";",
                    location.basic_digest_auth.realm
                );
                let _ = writeln!(
                    w,
                    "            auth_digest_user_file {};",
                    location.basic_digest_auth.file
                );
            }
            _ => {
                let _ = writeln!(
                    w,
                    "            auth_basic \"{}\";",
                    location.basic_digest_auth.realm
                );
                let _ = writeln!(
                    w,
                    "            auth_basic_user_file {};",
                    location.basic_digest_auth.file
                );
            }
        }
    }

    if !location.external_auth.url.is_empty() {
        let _ = writeln!(w, "            auth_request {};", auth_location(location));
    }

    if !location.whitelist.cidr.is_empty() {
        for cidr in &location.whitelist.cidr {
            let _ = writeln!(w, "            allow {cidr};");
        }
        let _ = writeln!(w, "            deny all;");
    }

    for limit in rate_limits(location) {
        let _ = writeln!(w, "            {limit}");
    }

    if location.enable_cors {
        let _ = writeln!(w, "            add_header Access-Control-Allow-Origin $http_origin;");
        let _ = writeln!(w, "            add_header Access-Control-Allow-Credentials true;");
        let _ = writeln!(
            w,
            "            add_header Access-Control-Allow-Methods \"GET, PUT, POST, DELETE, PATCH, OPTIONS\";"
        );
    }

    let _ = writeln!(
        w,
        "            proxy_connect_timeout {}s;",
        location.proxy.connect_timeout
    );
    let _ = writeln!(
        w,
        "            proxy_send_timeout {}s;",
        location.proxy.send_timeout
    );
    let _ = writeln!(
        w,
        "            proxy_read_timeout {}s;",
        location.proxy.read_timeout
    );
    let _ = writeln!(
        w,
        "            proxy_buffer_size {};",
        location.proxy.buffer_size
    );

    for line in build_proxy_pass(location).lines() {
        let _ = writeln!(w, "            {line}");
    }
    let _ = writeln!(w, "        }}");
}

fn write_external_auth_location(w: &mut String, location: &Location) {
    let _ = writeln!(w, "        location = {} {{", auth_location(location));
    let _ = writeln!(w, "            internal;");
    for header in &location.external_auth.send_headers {
        let _ = writeln!(w, "            proxy_set_header {header} $http_{header};");
    }
    if !location.external_auth.method.is_empty() {
        let _ = writeln!(
            w,
            "            proxy_method {};",
            location.external_auth.method
        );
    }
    let _ = writeln!(w, "            proxy_pass {};", location.external_auth.url);
    let _ = writeln!(w, "        }}");
}

fn write_stream_service(w: &mut String, loc: &Location, udp: bool) {
    write_upstream(w, &loc.upstream);
    let _ = writeln!(w, "    server {{");
    if udp {
        let _ = writeln!(w, "        listen {} udp;", loc.path);
    } else {
        let _ = writeln!(w, "        listen {};", loc.path);
    }
    let _ = writeln!(w, "        proxy_pass {};", loc.upstream.name);
    let _ = writeln!(w, "    }}");
}

/// Locations with a rewrite target need a regex match so the captured
/// suffix can be re-appended.
pub fn build_location(location: &Location) -> String {
    let path = &location.path;
    if !location.redirect.target.is_empty() && location.redirect.target != *path {
        return format!("~* {path}");
    }
    path.clone()
}

/// Internal location name for the external auth sub-request, derived from
/// the path so two locations never collide.
fn auth_location(location: &Location) -> String {
    let encoded = URL_SAFE.encode(location.path.as_bytes()).replace('=', "");
    format!("/_external-auth-{encoded}")
}

/// Builds the `proxy_pass` block, applying the rewrite annotation when the
/// target differs from the location path.
pub fn build_proxy_pass(location: &Location) -> String {
    let proto = if location.secure_upstream {
        "https"
    } else {
        "http"
    };
    let default = format!("proxy_pass {proto}://{};", location.upstream.name);

    let target = &location.redirect.target;
    if target.is_empty() || *target == location.path {
        return default;
    }

    let mut path = location.path.clone();
    if path != "/" && !path.ends_with('/') {
        path.push('/');
    }

    let mut abu = String::new();
    if location.redirect.add_base_url {
        let mut base = target.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        abu = format!(
            "subs_filter '<head(.*)>' '<head$1><base href=\"$scheme://$server_name{base}\">' r;\n"
        );
    }

    if target == "/" {
        return format!(
            "rewrite {path}(.*) /$1 break;\nrewrite {} / break;\nproxy_pass {proto}://{};\n{abu}",
            location.path, location.upstream.name
        );
    }

    format!(
        "rewrite {path}(.*) {target}/$1 break;\nproxy_pass {proto}://{};\n{abu}",
        location.upstream.name
    )
}

/// One zone declaration per defined zone across every location, in model
/// order. Zones repeated by several locations are declared once.
pub fn rate_limit_zones(servers: &[Server]) -> Vec<String> {
    let mut zones = Vec::new();
    for server in servers {
        for loc in &server.locations {
            if loc.rate_limit.connections.is_defined() {
                zones.push(format!(
                    "limit_conn_zone $binary_remote_addr zone={}:{}m;",
                    loc.rate_limit.connections.name, loc.rate_limit.connections.shared_size
                ));
            }
            if loc.rate_limit.rps.is_defined() {
                zones.push(format!(
                    "limit_req_zone $binary_remote_addr zone={}:{}m rate={}r/s;",
                    loc.rate_limit.rps.name,
                    loc.rate_limit.rps.shared_size,
                    loc.rate_limit.rps.limit
                ));
            }
        }
    }
    let mut seen = std::collections::HashSet::new();
    zones.retain(|z| seen.insert(z.clone()));
    zones
}

/// Per-location limits: connections by address first, then requests.
pub fn rate_limits(location: &Location) -> Vec<String> {
    let mut limits = Vec::new();
    if location.rate_limit.connections.is_defined() {
        limits.push(format!(
            "limit_conn {} {};",
            location.rate_limit.connections.name, location.rate_limit.connections.limit
        ));
    }
    if location.rate_limit.rps.is_defined() {
        limits.push(format!(
            "limit_req zone={} burst={} nodelay;",
            location.rate_limit.rps.name, location.rate_limit.rps.burst
        ));
    }
    limits
}

/// Collapses runs of blank lines into a single one, like `cat -s`.
pub fn squeeze_blank_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut blank = false;
    for line in input.lines() {
        if line.trim().is_empty() {
            if !blank {
                out.push('\n');
            }
            blank = true;
        } else {
            out.push_str(line);
            out.push('\n');
            blank = false;
        }
    }
    out
}

/// Rounds up to the next power of two, leaving exact powers (and zero)
/// untouched.
pub fn next_power_of_2(v: i32) -> i32 {
    let mut v = v;
    v -= 1;
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v + 1
}

#[cfg(test)]
mod test {
    use super::*;
    use ingress_types::policy::{RateLimit, Redirect, Zone};
    use ingress_types::types::{UpstreamServer, Upstream};

    fn location(path: &str, upstream: &str) -> Location {
        Location {
            path: path.into(),
            upstream: Upstream {
                name: upstream.into(),
                backends: vec![UpstreamServer {
                    address: "10.0.0.1".into(),
                    port: "8080".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn next_power_of_2_matches_expected_values() {
        for (input, expected) in [(0, 0), (1, 1), (2, 2), (3, 4), (4, 4), (5, 8), (17, 32)] {
            assert_eq!(next_power_of_2(input), expected, "input {input}");
        }
    }

    #[test]
    fn squeeze_collapses_blank_runs() {
        let squeezed = squeeze_blank_lines("a\n\n\n\nb\n\nc\n");
        assert_eq!(squeezed, "a\n\nb\n\nc\n");
    }

    #[test]
    fn plain_location_uses_path_verbatim() {
        let loc = location("/app", "default-svc-80");
        assert_eq!(build_location(&loc), "/app");
        assert_eq!(build_proxy_pass(&loc), "proxy_pass http://default-svc-80;");
    }

    #[test]
    fn rewrite_switches_to_regex_location() {
        let mut loc = location("/app", "default-svc-80");
        loc.redirect = Redirect {
            target: "/".into(),
            add_base_url: false,
        };
        assert_eq!(build_location(&loc), "~* /app");
        let pass = build_proxy_pass(&loc);
        assert!(pass.contains("rewrite /app/(.*) /$1 break;"), "{pass}");
        assert!(pass.contains("rewrite /app / break;"), "{pass}");
    }

    #[test]
    fn secure_upstream_proxies_https() {
        let mut loc = location("/", "default-svc-443");
        loc.secure_upstream = true;
        assert_eq!(build_proxy_pass(&loc), "proxy_pass https://default-svc-443;");
    }

    #[test]
    fn rate_limit_zones_and_limits() {
        let mut loc = location("/", "default-svc-80");
        loc.rate_limit = RateLimit {
            connections: Zone {
                name: "default_foo_conn".into(),
                limit: 10,
                burst: 50,
                shared_size: 5,
            },
            rps: Zone {
                name: "default_foo_conn".into(),
                limit: 100,
                burst: 500,
                shared_size: 5,
            },
        };
        let server = Server {
            name: "foo.bar".into(),
            locations: vec![loc.clone()],
            ..Default::default()
        };

        let zones = rate_limit_zones(&[server]);
        assert_eq!(zones.len(), 2);
        assert!(zones[0].starts_with("limit_conn_zone"));
        assert!(zones[1].contains("rate=100r/s"));

        let limits = rate_limits(&loc);
        assert_eq!(limits[0], "limit_conn default_foo_conn 10;");
        assert!(limits[1].contains("burst=500"));
    }

    #[test]
    fn skipped_urls_render_a_loggable_map() {
        let cfg = NginxConfig {
            skip_access_log_urls: vec!["/healthz".into(), "/metrics".into()],
            ..Default::default()
        };
        let model = Configuration {
            servers: vec![Server {
                name: "_".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let out = render(&cfg, &model);
        assert!(out.contains("map $request_uri $loggable"));
        assert!(out.contains("        /healthz 0;"));
        assert!(out.contains("if=$loggable"));
    }

    #[test]
    fn render_is_deterministic() {
        let mut model = Configuration {
            healthz_url: "/healthz".into(),
            upstreams: vec![Upstream {
                name: "default-svc-80".into(),
                backends: vec![UpstreamServer {
                    address: "10.0.0.1".into(),
                    port: "8080".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            servers: vec![Server {
                name: "foo.bar".into(),
                locations: vec![location("/", "default-svc-80")],
                ..Default::default()
            }],
            ..Default::default()
        };
        model.sort();
        let cfg = NginxConfig::default();
        let first = render(&cfg, &model);
        let second = render(&cfg, &model.clone());
        assert_eq!(first, second);
        assert!(!first.contains("\n\n\n"));
    }
}
