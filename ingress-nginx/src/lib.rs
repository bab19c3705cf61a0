//! NGINX implementation of the backend adapter: renders the routing model
//! into `nginx.conf`, validates it with `nginx -t`, and drives reloads.

pub mod config;
pub mod render;

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use tokio::process::Command;
use tracing::{debug, info};

use ingress_types::backend::{Backend, Error, Result};
use ingress_types::{Configuration, Defaults};

use crate::config::NginxConfig;
use crate::render::next_power_of_2;

const DEF_BINARY: &str = "/usr/sbin/nginx";
const DEF_CONFIG_PATH: &str = "/etc/nginx/nginx.conf";

pub struct NginxBackend {
    binary: PathBuf,
    config_path: PathBuf,
}

impl NginxBackend {
    pub fn new() -> Self {
        let binary = std::env::var("NGINX_BINARY").unwrap_or_else(|_| DEF_BINARY.into());
        Self {
            binary: binary.into(),
            config_path: DEF_CONFIG_PATH.into(),
        }
    }

    pub fn with_paths(binary: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_path: config_path.into(),
        }
    }

    /// Runs the binary in test mode against a temporary copy of the
    /// rendered configuration.
    async fn test_configuration(&self, rendered: &[u8]) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new()?;
        tmp.write_all(rendered)?;
        tmp.flush()?;

        let output = Command::new(&self.binary)
            .arg("-t")
            .arg("-c")
            .arg(tmp.path())
            .output()
            .await?;
        if !output.status.success() {
            return Err(Error::Validation(combined_output(
                &output.stdout,
                &output.stderr,
            )));
        }
        Ok(())
    }
}

impl Default for NginxBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for NginxBackend {
    fn name(&self) -> &'static str {
        "nginx"
    }

    fn info(&self) -> String {
        format!("NGINX ({})", self.binary.display())
    }

    fn upstream_defaults(&self) -> Defaults {
        NginxConfig::default().defaults()
    }

    async fn on_update(&self, cfg: Option<&ConfigMap>, model: &Configuration) -> Result<Vec<u8>> {
        let mut config = cfg
            .and_then(|c| c.data.as_ref())
            .map(NginxConfig::from_map)
            .unwrap_or_default();

        // NGINX cannot resize the hash tables holding server names, so the
        // configured sizes are raised (never lowered) to fit the longest
        // hostname and the sum of all hostname lengths.
        let mut longest = 0usize;
        let mut total = 0usize;
        for server in &model.servers {
            total += server.name.len();
            longest = longest.max(server.name.len());
        }
        let bucket = next_power_of_2(longest as i32);
        if bucket > config.server_name_hash_bucket_size {
            debug!(
                from = config.server_name_hash_bucket_size,
                to = bucket,
                "adjusting server_names_hash_bucket_size"
            );
            config.server_name_hash_bucket_size = bucket;
        }
        let max = next_power_of_2(total as i32);
        if max > config.server_name_hash_max_size {
            debug!(
                from = config.server_name_hash_max_size,
                to = max,
                "adjusting server_names_hash_max_size"
            );
            config.server_name_hash_max_size = max;
        }

        let rendered = render::render(&config, model);
        self.test_configuration(rendered.as_bytes()).await?;
        Ok(rendered.into_bytes())
    }

    fn is_reload_required(&self, rendered: &[u8]) -> bool {
        match std::fs::read(&self.config_path) {
            Ok(current) => current != rendered,
            Err(_) => true,
        }
    }

    async fn restart(&self, rendered: &[u8]) -> Result<String> {
        let dir = self
            .config_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(rendered)?;
        tmp.flush()?;
        tmp.persist(&self.config_path).map_err(|e| e.error)?;

        let output = Command::new(&self.binary)
            .arg("-s")
            .arg("reload")
            .output()
            .await?;
        let combined = combined_output(&output.stdout, &output.stderr);
        if !output.status.success() {
            return Err(Error::Command(combined));
        }
        Ok(combined)
    }

    async fn start(&self) -> Result<()> {
        info!("starting {}", self.info());
        Command::new(&self.binary)
            .arg("-c")
            .arg(&self.config_path)
            .spawn()?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("-s")
            .arg("stop")
            .output()
            .await?;
        if !output.status.success() {
            return Err(Error::Command(combined_output(
                &output.stdout,
                &output.stderr,
            )));
        }
        Ok(())
    }
}

fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&String::from_utf8_lossy(stderr));
    }
    combined
}

#[cfg(test)]
mod test {
    use super::*;
    use ingress_types::types::{Server, Upstream, UpstreamServer};

    fn model() -> Configuration {
        let mut model = Configuration {
            healthz_url: "/healthz".into(),
            upstreams: vec![Upstream {
                name: "upstream-default-backend".into(),
                backends: vec![UpstreamServer::default_backend()],
                ..Default::default()
            }],
            servers: vec![Server {
                name: "_".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        model.sort();
        model
    }

    // `true` accepts any arguments and exits 0, standing in for a proxy
    // binary that always validates.
    fn accepting_backend(dir: &std::path::Path) -> NginxBackend {
        NginxBackend::with_paths("true", dir.join("nginx.conf"))
    }

    #[tokio::test]
    async fn on_update_renders_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let backend = accepting_backend(dir.path());
        let rendered = backend.on_update(None, &model()).await.unwrap();
        let text = String::from_utf8(rendered).unwrap();
        assert!(text.contains("upstream upstream-default-backend"));
        assert!(text.contains("server 127.0.0.1:8181;"));
    }

    #[tokio::test]
    async fn validation_failure_surfaces_output() {
        let dir = tempfile::tempdir().unwrap();
        let backend = NginxBackend::with_paths("false", dir.path().join("nginx.conf"));
        let err = backend.on_update(None, &model()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn reload_required_only_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let backend = accepting_backend(dir.path());
        let rendered = backend.on_update(None, &model()).await.unwrap();

        assert!(backend.is_reload_required(&rendered));
        backend.restart(&rendered).await.unwrap();
        assert!(!backend.is_reload_required(&rendered));
    }

    #[tokio::test]
    async fn hash_sizes_are_raised_never_lowered() {
        let dir = tempfile::tempdir().unwrap();
        let backend = accepting_backend(dir.path());
        let mut m = model();
        m.servers.push(Server {
            name: "a".repeat(100),
            ..Default::default()
        });
        m.sort();
        let text = String::from_utf8(backend.on_update(None, &m).await.unwrap()).unwrap();
        // 100 bytes rounds up to 128, above the default bucket size of 64
        assert!(text.contains("server_names_hash_bucket_size 128;"));
        // total below the default of 512 leaves the configured value alone
        assert!(text.contains("server_names_hash_max_size 512;"));
    }
}
