//! Decoding of the main configuration config-map into the NGINX settings
//! record. Keys are kebab-case; values are decoded permissively and
//! invalid or unknown entries are logged and skipped.

use std::collections::BTreeMap;

use ingress_types::Defaults;
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub struct NginxConfig {
    pub custom_http_errors: Vec<i32>,
    pub proxy_connect_timeout: i32,
    pub proxy_read_timeout: i32,
    pub proxy_send_timeout: i32,
    pub proxy_buffer_size: String,
    pub resolver: String,
    pub skip_access_log_urls: Vec<String>,
    pub ssl_redirect: bool,
    pub upstream_max_fails: i32,
    pub upstream_fail_timeout: i32,
    pub whitelist_source_range: Vec<String>,
    pub server_name_hash_bucket_size: i32,
    pub server_name_hash_max_size: i32,
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            custom_http_errors: Vec::new(),
            proxy_connect_timeout: 5,
            proxy_read_timeout: 60,
            proxy_send_timeout: 60,
            proxy_buffer_size: "4k".into(),
            resolver: String::new(),
            skip_access_log_urls: Vec::new(),
            ssl_redirect: true,
            upstream_max_fails: 0,
            upstream_fail_timeout: 0,
            whitelist_source_range: Vec::new(),
            server_name_hash_bucket_size: 64,
            server_name_hash_max_size: 512,
        }
    }
}

impl NginxConfig {
    /// Merges config-map data over the defaults.
    pub fn from_map(data: &BTreeMap<String, String>) -> Self {
        let mut cfg = Self::default();
        for (key, value) in data {
            match key.as_str() {
                "custom-http-errors" => cfg.custom_http_errors = parse_error_codes(value),
                "proxy-connect-timeout" => merge_int(key, value, &mut cfg.proxy_connect_timeout),
                "proxy-read-timeout" => merge_int(key, value, &mut cfg.proxy_read_timeout),
                "proxy-send-timeout" => merge_int(key, value, &mut cfg.proxy_send_timeout),
                "proxy-buffer-size" => cfg.proxy_buffer_size = value.clone(),
                "resolver" => cfg.resolver = value.clone(),
                "skip-access-log-urls" => {
                    cfg.skip_access_log_urls =
                        value.split(',').map(|s| s.trim().to_owned()).collect();
                }
                "ssl-redirect" => merge_bool(key, value, &mut cfg.ssl_redirect),
                "upstream-max-fails" => merge_int(key, value, &mut cfg.upstream_max_fails),
                "upstream-fail-timeout" => merge_int(key, value, &mut cfg.upstream_fail_timeout),
                "whitelist-source-range" => {
                    cfg.whitelist_source_range =
                        value.split(',').map(|s| s.trim().to_owned()).collect();
                }
                "server-name-hash-bucket-size" => {
                    merge_int(key, value, &mut cfg.server_name_hash_bucket_size);
                }
                "server-name-hash-max-size" => {
                    merge_int(key, value, &mut cfg.server_name_hash_max_size);
                }
                unknown => warn!("unknown configuration setting {unknown}"),
            }
        }
        cfg
    }

    /// The subset of settings the annotation parsers fall back to.
    pub fn defaults(&self) -> Defaults {
        Defaults {
            upstream_max_fails: self.upstream_max_fails,
            upstream_fail_timeout: self.upstream_fail_timeout,
            proxy_connect_timeout: self.proxy_connect_timeout,
            proxy_send_timeout: self.proxy_send_timeout,
            proxy_read_timeout: self.proxy_read_timeout,
            proxy_buffer_size: self.proxy_buffer_size.clone(),
            whitelist_source_range: self.whitelist_source_range.clone(),
        }
    }
}

fn merge_int(key: &str, value: &str, target: &mut i32) {
    match value.trim().parse() {
        Ok(v) => *target = v,
        Err(_) => warn!("{value} is not a valid number for {key}"),
    }
}

fn merge_bool(key: &str, value: &str, target: &mut bool) {
    match value.trim().parse() {
        Ok(v) => *target = v,
        Err(_) => warn!("{value} is not a valid boolean for {key}"),
    }
}

/// Custom error pages only make sense for redirection and error statuses.
fn parse_error_codes(value: &str) -> Vec<i32> {
    let mut codes = Vec::new();
    for entry in value.split(',').map(str::trim) {
        match entry.parse::<i32>() {
            Ok(code) if (300..600).contains(&code) => codes.push(code),
            Ok(code) => warn!("error code {code} is not valid for custom error pages"),
            Err(_) => warn!("{entry} is not a valid http code"),
        }
    }
    codes
}
