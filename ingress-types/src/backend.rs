use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use thiserror::Error;

use crate::defaults::Defaults;
use crate::types::Configuration;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The proxy rejected the rendered configuration in test mode. Carries
    /// the combined stdout and stderr of the test run.
    #[error("invalid configuration:\n{0}")]
    Validation(String),

    /// The proxy failed to reload or stop. Carries the combined output.
    #[error("command failed:\n{0}")]
    Command(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Seam between the reconciler and the proxy it drives. Implementations
/// are chosen at process start and never swapped at runtime.
///
/// The reconciler calls `on_update` with the freshly built model, asks
/// `is_reload_required` whether the rendered bytes differ from what is
/// running, and only then `restart`s the proxy.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Human readable build information for startup logging.
    fn info(&self) -> String;

    /// Defaults handed to the annotation parsers.
    fn upstream_defaults(&self) -> Defaults;

    /// Renders the native configuration for the model and validates it by
    /// running the proxy binary in test mode against a temporary file.
    /// Returns the rendered bytes; the file on disk is untouched.
    async fn on_update(&self, cfg: Option<&ConfigMap>, model: &Configuration) -> Result<Vec<u8>>;

    /// True iff the rendered bytes differ from the configuration file
    /// currently on disk.
    fn is_reload_required(&self, rendered: &[u8]) -> bool;

    /// Writes the configuration atomically and signals the proxy to
    /// reload. Returns the combined output of the reload command.
    async fn restart(&self, rendered: &[u8]) -> Result<String>;

    /// Launches the proxy process.
    async fn start(&self) -> Result<()>;

    /// Stops the proxy process.
    async fn stop(&self) -> Result<()>;
}
