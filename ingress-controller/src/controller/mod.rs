//! The reconciler: informer event handlers feed two rate-limited work
//! queues, and single workers per queue rebuild the routing model and
//! drive the proxy backend.

pub mod builder;
mod backend_ssl;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::Client;
use kube::api::Api;
use kube::runtime::events::EventType;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ingress_annotations as annotations;
use ingress_types::Backend;

use crate::events::{EventRecorder, ingress_ref, reasons};
use crate::kubernetes::informer::{Event, Handler, Informer};
use crate::kubernetes::{meta_key, parse_name_ns};
use crate::metrics::ReloadMetrics;
use crate::task::{Queue, RateLimiter};
use crate::tls::CertTracker;
use crate::{Error, Result};

const STORE_SYNC_POLL_PERIOD: Duration = Duration::from_secs(1);

/// Static wiring of the controller, resolved from the CLI at startup.
pub struct Settings {
    pub client: Client,
    pub backend: Arc<dyn Backend>,
    pub resync_period: Duration,
    /// `namespace/name` of the default backend service.
    pub default_service: String,
    pub ingress_class: String,
    /// Namespace to watch; empty watches all.
    pub watch_namespace: String,
    pub config_map: String,
    pub tcp_services_configmap: String,
    pub udp_services_configmap: String,
    pub default_ssl_certificate: String,
    pub healthz_url: String,
    pub publish_service: String,
    pub ssl_dir: PathBuf,
    pub auth_dir: PathBuf,
}

pub struct IngressController {
    pub(crate) settings: Settings,
    pub(crate) ingresses: Informer<Ingress>,
    pub(crate) endpoints: Informer<Endpoints>,
    pub(crate) services: Informer<Service>,
    pub(crate) secrets: Informer<Secret>,
    pub(crate) configmaps: Informer<ConfigMap>,
    pub(crate) sync_queue: Arc<Queue>,
    pub(crate) secret_queue: Arc<Queue>,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) certs: CertTracker,
    pub(crate) recorder: EventRecorder,
    pub(crate) reload: ReloadMetrics,
    stop: CancellationToken,
    // serialises Stop so concurrent stoppers cannot race the queues
    stop_guard: Mutex<()>,
}

fn api_for<K>(settings: &Settings) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    if settings.watch_namespace.is_empty() {
        Api::all(settings.client.clone())
    } else {
        Api::namespaced(settings.client.clone(), &settings.watch_namespace)
    }
}

impl IngressController {
    pub fn new(settings: Settings, reload: ReloadMetrics) -> Arc<Self> {
        let sync_queue = Queue::new("sync");
        let secret_queue = Queue::new("secret");
        let certs = CertTracker::new();
        let recorder = EventRecorder::new(settings.client.clone());

        let ingress_handler = ingress_handler(
            sync_queue.clone(),
            recorder.clone(),
            settings.ingress_class.clone(),
        );
        let endpoints_handler = resync_handler::<Endpoints>(sync_queue.clone());
        let secret_handler = secret_handler(secret_queue.clone(), certs.clone());
        let configmap_handler = configmap_handler(
            sync_queue.clone(),
            [
                settings.config_map.clone(),
                settings.tcp_services_configmap.clone(),
                settings.udp_services_configmap.clone(),
            ],
        );
        // services feed the model through the store alone
        let service_handler: Handler<Service> = Arc::new(|_| {});

        let resync = settings.resync_period;
        Arc::new(Self {
            ingresses: Informer::new(api_for(&settings), resync, ingress_handler),
            endpoints: Informer::new(api_for(&settings), resync, endpoints_handler),
            services: Informer::new(api_for(&settings), resync, service_handler),
            secrets: Informer::new(api_for(&settings), resync, secret_handler),
            configmaps: Informer::new(api_for(&settings), resync, configmap_handler),
            sync_queue,
            secret_queue,
            rate_limiter: RateLimiter::for_sync(),
            certs,
            recorder,
            reload,
            stop: CancellationToken::new(),
            stop_guard: Mutex::new(()),
            settings,
        })
    }

    /// Cancelled once [`stop`](Self::stop) runs; collaborators such as the
    /// HTTP endpoint tie their shutdown to it.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub(crate) fn informers_synced(&self) -> bool {
        self.ingresses.has_synced()
            && self.services.has_synced()
            && self.endpoints.has_synced()
            && self.secrets.has_synced()
            && self.configmaps.has_synced()
    }

    /// Launches the informers and both queue workers, then blocks until
    /// the stop signal.
    pub async fn start(self: Arc<Self>) {
        info!("starting ingress controller");

        let backend = self.settings.backend.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.start().await {
                error!("backend failed to start: {e}");
            }
        });

        self.ingresses.run(self.stop.child_token());
        self.endpoints.run(self.stop.child_token());
        self.services.run(self.stop.child_token());
        self.secrets.run(self.stop.child_token());
        self.configmaps.run(self.stop.child_token());

        let ctrl = self.clone();
        tokio::spawn(async move { ctrl.run_sync_worker().await });
        let ctrl = self.clone();
        tokio::spawn(async move { ctrl.run_secret_worker().await });

        self.stop.cancelled().await;
    }

    /// Idempotent under an exclusive guard: the first caller closes the
    /// stop signal and drains the queues, later callers get an error.
    pub fn stop(&self) -> Result<()> {
        let _guard = self.stop_guard.lock().unwrap();

        if self.sync_queue.is_shutting_down() {
            return Err(Error::ShutdownInProgress);
        }

        info!("shutting down controller queues");
        self.stop.cancel();
        self.sync_queue.shutdown();
        self.secret_queue.shutdown();
        Ok(())
    }

    async fn run_sync_worker(&self) {
        while let Some(item) = self.sync_queue.next().await {
            if let Err(e) = self.sync(&item.key).await {
                warn!(key = %item.key, "requeuing, sync failed: {e}");
                self.sync_queue.requeue(item);
            }
        }
        debug!("sync worker exiting");
    }

    async fn run_secret_worker(&self) {
        while let Some(item) = self.secret_queue.next().await {
            if let Err(e) = self.sync_secret(&item.key).await {
                warn!(key = %item.key, "requeuing, secret sync failed: {e}");
                self.secret_queue.requeue(item);
            }
        }
        debug!("secret worker exiting");
    }

    /// One full reconciliation: build the model, render it, and reload the
    /// proxy only when the rendered bytes changed.
    pub(crate) async fn sync(&self, key: &str) -> Result<()> {
        self.rate_limiter.accept().await;

        if self.sync_queue.is_shutting_down() {
            return Ok(());
        }
        if !self.informers_synced() {
            tokio::time::sleep(STORE_SYNC_POLL_PERIOD).await;
            return Err(Error::NotSynced);
        }
        debug!(key, "syncing");

        let config_map = self.main_config_map()?;

        let snapshot = builder::Snapshot {
            ingresses: builder::admitted_ingresses(
                self.ingresses.store(),
                &self.settings.ingress_class,
            ),
            services: self.services.store(),
            endpoints: self.endpoints.store(),
            secrets: self.secrets.store(),
            certs: &self.certs,
            defaults: self.settings.backend.upstream_defaults(),
            default_service: self.settings.default_service.clone(),
            healthz_url: self.settings.healthz_url.clone(),
            auth_dir: self.settings.auth_dir.clone(),
            tcp_services: self.configmap_data(&self.settings.tcp_services_configmap),
            udp_services: self.configmap_data(&self.settings.udp_services_configmap),
        };
        let (model, warnings) = builder::build(&snapshot);
        for warning in warnings {
            self.recorder.publish(
                ingress_ref(&warning.ingress),
                EventType::Warning,
                reasons::MAPPING,
                warning.message,
            );
        }

        let rendered = self
            .settings
            .backend
            .on_update(config_map.as_deref(), &model)
            .await?;

        if !self.settings.backend.is_reload_required(&rendered) {
            debug!("configuration unchanged, skipping reload");
            return Ok(());
        }

        match self.settings.backend.restart(&rendered).await {
            Ok(output) => {
                self.reload.count_success();
                info!("backend reloaded");
                debug!(%output, "reload output");
                Ok(())
            }
            Err(e) => {
                self.reload.count_error();
                error!("unexpected failure restarting the backend:\n{e}");
                Err(e.into())
            }
        }
    }

    /// The operator-provided configuration config-map. Configured but not
    /// yet cached is an error so the sync is retried.
    fn main_config_map(&self) -> Result<Option<Arc<ConfigMap>>> {
        if self.settings.config_map.is_empty() {
            return Ok(None);
        }
        let (ns, name) = parse_name_ns(&self.settings.config_map)?;
        self.configmaps
            .store()
            .get(&kube::runtime::reflector::ObjectRef::new(&name).within(&ns))
            .map(Some)
            .ok_or_else(|| Error::MissingResource(format!("configmap {}", self.settings.config_map)))
    }

    /// Data of a TCP/UDP services config-map; empty when unset or absent.
    fn configmap_data(&self, key: &str) -> BTreeMap<String, String> {
        if key.is_empty() {
            return BTreeMap::new();
        }
        let Ok((ns, name)) = parse_name_ns(key) else {
            warn!("invalid configmap reference '{key}'");
            return BTreeMap::new();
        };
        match self
            .configmaps
            .store()
            .get(&kube::runtime::reflector::ObjectRef::new(&name).within(&ns))
        {
            Some(cm) => cm.data.clone().unwrap_or_default(),
            None => {
                debug!("no configured stream services found in {key}");
                BTreeMap::new()
            }
        }
    }
}

fn ingress_handler(
    queue: Arc<Queue>,
    recorder: EventRecorder,
    class: String,
) -> Handler<Ingress> {
    Arc::new(move |event| match event {
        Event::Add(ing) => {
            if !annotations::class::is_valid(&ing, &class) {
                debug!(
                    "ignoring add for ingress {} based on the class annotation",
                    meta_key(&*ing)
                );
                return;
            }
            recorder.publish(
                ingress_ref(&ing),
                EventType::Normal,
                reasons::CREATE,
                format!("Ingress {}", meta_key(&*ing)),
            );
            queue.enqueue(meta_key(&*ing));
        }
        Event::Update { old, cur } => {
            if !annotations::class::is_valid(&cur, &class) {
                return;
            }
            if old != cur {
                recorder.publish(
                    ingress_ref(&cur),
                    EventType::Normal,
                    reasons::UPDATE,
                    format!("Ingress {}", meta_key(&*cur)),
                );
                queue.enqueue(meta_key(&*cur));
            }
        }
        Event::Delete(ing) => {
            if !annotations::class::is_valid(&ing, &class) {
                debug!(
                    "ignoring delete for ingress {} based on the class annotation",
                    meta_key(&*ing)
                );
                return;
            }
            recorder.publish(
                ingress_ref(&ing),
                EventType::Normal,
                reasons::DELETE,
                format!("Ingress {}", meta_key(&*ing)),
            );
            queue.enqueue(meta_key(&*ing));
        }
    })
}

/// Add and delete enqueue unconditionally; updates only when the object
/// actually changed, which also filters the resync re-emissions.
fn resync_handler<K>(queue: Arc<Queue>) -> Handler<K>
where
    K: kube::ResourceExt + PartialEq + Send + Sync + 'static,
{
    Arc::new(move |event| match event {
        Event::Add(obj) | Event::Delete(obj) => queue.enqueue(meta_key(&*obj)),
        Event::Update { old, cur } => {
            if old != cur {
                queue.enqueue(meta_key(&*cur));
            }
        }
    })
}

/// Secret adds and updates always hit the secret queue so certificates
/// are re-checked every resync period; deletes drop the tracked cert
/// without a queue round-trip.
fn secret_handler(queue: Arc<Queue>, certs: CertTracker) -> Handler<Secret> {
    Arc::new(move |event| match event {
        Event::Add(secret) => queue.enqueue(meta_key(&*secret)),
        Event::Update { cur, .. } => queue.enqueue(meta_key(&*cur)),
        Event::Delete(secret) => {
            let key = meta_key(&*secret);
            if certs.delete(&key).is_some() {
                info!("removed ssl certificate for deleted secret {key}");
            }
        }
    })
}

/// Only updates to one of the three configured maps trigger a sync.
fn configmap_handler(queue: Arc<Queue>, watched: [String; 3]) -> Handler<ConfigMap> {
    Arc::new(move |event| {
        if let Event::Update { old, cur } = event
            && old != cur
        {
            let key = meta_key(&*cur);
            if watched.iter().any(|name| *name == key) {
                info!("configuration configmap {key} changed, queueing sync");
                queue.enqueue(key);
            }
        }
    })
}
