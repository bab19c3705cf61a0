use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ingress_controller::config::ControllerArgs;
use ingress_controller::controller::{IngressController, Settings};
use ingress_controller::kubernetes::parse_name_ns;
use ingress_controller::metrics::ReloadMetrics;
use ingress_controller::{Error, Result, http};
use ingress_nginx::NginxBackend;
use ingress_types::Backend;

#[tokio::main]
async fn main() -> ExitCode {
    setup_subscriber();
    let args = ControllerArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: ControllerArgs) -> Result<()> {
    args.validate()?;

    let client = Client::try_default().await?;

    validate_service(&client, &args.default_backend_service).await?;
    info!(
        "validated {} as the default backend",
        args.default_backend_service
    );
    if !args.publish_service.is_empty() {
        validate_service(&client, &args.publish_service).await?;
        info!(
            "service {} validated as source of ingress status",
            args.publish_service
        );
    }
    if !args.ingress_class.is_empty() {
        info!("watching for ingress class {}", args.ingress_class);
    }
    if args.profiling {
        info!("profiling enabled");
    }

    let backend: Arc<dyn Backend> = Arc::new(NginxBackend::new());
    info!("using {} backend", backend.info());

    let settings = Settings {
        client,
        backend,
        resync_period: args.sync_period,
        default_service: args.default_backend_service.clone(),
        ingress_class: args.ingress_class.clone(),
        watch_namespace: args.watch_namespace.clone(),
        config_map: args.config_map.clone(),
        tcp_services_configmap: args.tcp_services_configmap.clone(),
        udp_services_configmap: args.udp_services_configmap.clone(),
        default_ssl_certificate: args.default_ssl_certificate.clone(),
        healthz_url: args.health_check_path.clone(),
        publish_service: args.publish_service.clone(),
        ssl_dir: args.ssl_dir.clone(),
        auth_dir: args.auth_dir.clone(),
    };
    let controller = IngressController::new(settings, ReloadMetrics::new());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.healthz_port));
    let mut http_handle = tokio::spawn(http::serve(
        addr,
        http::HealthState::new()?,
        controller.stop_token(),
    ));

    let ctrl = controller.clone();
    let mut controller_handle = tokio::spawn(async move { ctrl.start().await });

    let mut signal_handle = tokio::spawn(shutdown_signal());

    tokio::select! {
        h = &mut http_handle => {
            match h {
                Ok(Ok(())) => info!("http endpoint exited"),
                Ok(Err(e)) => error!("http endpoint failed: {e}"),
                Err(e) => error!("http task failed to complete: {e}"),
            }
        }
        h = &mut controller_handle => {
            if let Err(e) = h {
                error!("controller task failed to complete: {e}");
            }
        }
        _ = &mut signal_handle => {
            if let Err(e) = controller.stop() {
                error!("{e}");
            }
            let (http_res, ctrl_res) = tokio::join!(http_handle, controller_handle);
            if let Err(e) = http_res {
                error!("http endpoint exited with error: {e}");
            }
            if let Err(e) = ctrl_res {
                error!("controller exited with error: {e}");
            }
        }
    }
    info!("exiting");
    Ok(())
}

async fn validate_service(client: &Client, reference: &str) -> Result<()> {
    let (ns, name) = parse_name_ns(reference)?;
    let api: Api<Service> = Api::namespaced(client.clone(), &ns);
    api.get(&name)
        .await
        .map_err(|_| Error::MissingResource(format!("service {reference}")))?;
    Ok(())
}

fn setup_subscriber() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingress_controller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };
    tokio::select! {
        _ = ctrl_c => {
            info!("captured ctrl_c signal");
        },
        _ = terminate => {},
    }
}
