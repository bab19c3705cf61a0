/// Backend-provided defaults consumed by the annotation parsers when an
/// ingress does not override a value.
#[derive(Clone, Debug, PartialEq)]
pub struct Defaults {
    pub upstream_max_fails: i32,
    pub upstream_fail_timeout: i32,
    pub proxy_connect_timeout: i32,
    pub proxy_send_timeout: i32,
    pub proxy_read_timeout: i32,
    pub proxy_buffer_size: String,
    pub whitelist_source_range: Vec<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            upstream_max_fails: 0,
            upstream_fail_timeout: 0,
            proxy_connect_timeout: 5,
            proxy_send_timeout: 60,
            proxy_read_timeout: 60,
            proxy_buffer_size: "4k".into(),
            whitelist_source_range: Vec::new(),
        }
    }
}
