use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use ingress_types::DEFAULT_SSL_DIRECTORY;

use crate::Result;
use crate::kubernetes::parse_name_ns;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Kubernetes ingress reconciler driving an NGINX proxy")]
pub struct ControllerArgs {
    /// Service used to serve a 404 page for the default backend. Takes
    /// the form namespace/name.
    #[arg(long)]
    pub default_backend_service: String,

    /// Name of the ingress class this controller owns.
    #[arg(long, default_value = "nginx")]
    pub ingress_class: String,

    /// ConfigMap holding the custom proxy configuration, namespace/name.
    #[arg(long, default_value = "")]
    pub config_map: String,

    /// ConfigMap with the TCP services to expose. The key is the external
    /// port; the value is namespace/name:port of the target service.
    #[arg(long, default_value = "")]
    pub tcp_services_configmap: String,

    /// ConfigMap with the UDP services to expose, same format as the TCP
    /// one.
    #[arg(long, default_value = "")]
    pub udp_services_configmap: String,

    /// Relist and confirm cluster resources this often.
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    pub sync_period: Duration,

    /// Namespace to watch for ingress. Empty watches all namespaces.
    #[arg(long, default_value = "")]
    pub watch_namespace: String,

    /// Port for the healthz endpoint.
    #[arg(long, default_value_t = 10254)]
    pub healthz_port: u16,

    /// Enable profiling via the web interface.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub profiling: bool,

    /// Secret with the certificate used by the HTTPS catch-all server,
    /// namespace/name.
    #[arg(long, default_value = "")]
    pub default_ssl_certificate: String,

    /// URL used as health check inside the default server.
    #[arg(long, default_value = "/healthz")]
    pub health_check_path: String,

    /// Service fronting the ingress controller. The controller mirrors
    /// its addresses onto the ingress status.
    #[arg(long, default_value = "")]
    pub publish_service: String,

    /// Directory where the TLS secrets are materialised as pem files.
    #[arg(long, default_value = DEFAULT_SSL_DIRECTORY)]
    pub ssl_dir: PathBuf,

    /// Directory for htpasswd files created from auth secrets.
    #[arg(long, default_value = "/etc/ingress-controller/auth")]
    pub auth_dir: PathBuf,
}

impl ControllerArgs {
    /// Startup validation of every namespace/name reference. Errors here
    /// abort the process before anything is watched.
    pub fn validate(&self) -> Result<()> {
        parse_name_ns(&self.default_backend_service)?;
        for reference in [
            &self.config_map,
            &self.tcp_services_configmap,
            &self.udp_services_configmap,
            &self.default_ssl_certificate,
            &self.publish_service,
        ] {
            if !reference.is_empty() {
                parse_name_ns(reference)?;
            }
        }
        Ok(())
    }
}

fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty duration".into());
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    let (value, unit) = raw.split_at(raw.len() - 1);
    let value: u64 = value
        .parse()
        .map_err(|_| format!("invalid duration '{raw}'"))?;
    match unit {
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(format!("invalid duration unit in '{raw}'")),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> clap::error::Result<ControllerArgs> {
        let mut argv = vec!["ingress-controller"];
        argv.extend_from_slice(args);
        ControllerArgs::try_parse_from(argv)
    }

    #[test]
    fn default_backend_service_is_required() {
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn defaults_match_the_contract() {
        let args = parse(&["--default-backend-service", "kube-system/backend"]).unwrap();
        assert_eq!(args.ingress_class, "nginx");
        assert_eq!(args.sync_period, Duration::from_secs(60));
        assert_eq!(args.healthz_port, 10254);
        assert!(args.profiling);
        assert_eq!(args.health_check_path, "/healthz");
        assert_eq!(args.watch_namespace, "");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn profiling_can_be_disabled() {
        let args = parse(&[
            "--default-backend-service",
            "kube-system/backend",
            "--profiling",
            "false",
        ])
        .unwrap();
        assert!(!args.profiling);
    }

    #[test]
    fn malformed_references_fail_validation() {
        let args = parse(&["--default-backend-service", "no-namespace"]).unwrap();
        assert!(args.validate().is_err());

        let args = parse(&[
            "--default-backend-service",
            "kube-system/backend",
            "--config-map",
            "also-no-namespace",
        ])
        .unwrap();
        assert!(args.validate().is_err());
    }
}
