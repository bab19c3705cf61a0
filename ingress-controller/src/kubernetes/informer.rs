//! List+watch informer backed by a kube-rs reflector store.
//!
//! Each informer owns its store; the reconciler only reads it. Typed
//! add/update/delete notifications are dispatched to a handler, and a
//! resync timer periodically re-delivers every cached object as an update
//! with `old == cur` so handlers can refresh derived state.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::serde::de::DeserializeOwned;
use kube::Api;
use kube::Resource;
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::watcher::{self, watcher};
use kube::runtime::WatchStreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub enum Event<K> {
    Add(Arc<K>),
    Update { old: Arc<K>, cur: Arc<K> },
    Delete(Arc<K>),
}

pub type Handler<K> = Arc<dyn Fn(Event<K>) + Send + Sync>;

pub struct Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    store: Store<K>,
    synced: Arc<AtomicBool>,
    task: Mutex<Option<Task<K>>>,
}

struct Task<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    api: Api<K>,
    writer: Writer<K>,
    resync: Duration,
    handler: Handler<K>,
}

impl<K> Informer<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
    <K as Resource>::DynamicType: Default + Eq + Hash + Clone,
{
    pub fn new(api: Api<K>, resync: Duration, handler: Handler<K>) -> Self {
        let (store, writer) = reflector::store();
        Self {
            store,
            synced: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(Some(Task {
                api,
                writer,
                resync,
                handler,
            })),
        }
    }

    pub fn store(&self) -> &Store<K> {
        &self.store
    }

    /// True once the initial list has been applied to the store.
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }

    /// Spawns the watch loop. Calling it a second time is a no-op.
    pub fn run(&self, cancel: CancellationToken) {
        let Some(task) = self.task.lock().unwrap().take() else {
            return;
        };
        let store = self.store.clone();
        let synced = self.synced.clone();
        tokio::spawn(run_informer(task, store, synced, cancel));
    }
}

async fn run_informer<K>(
    task: Task<K>,
    store: Store<K>,
    synced: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
    <K as Resource>::DynamicType: Default + Eq + Hash + Clone,
{
    let Task {
        api,
        mut writer,
        resync,
        handler,
    } = task;

    let stream = watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);

    let mut resync_timer = tokio::time::interval(resync);
    resync_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    resync_timer.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = resync_timer.tick() => {
                if synced.load(Ordering::Relaxed) {
                    debug!("resync tick");
                    for obj in store.state() {
                        handler(Event::Update { old: obj.clone(), cur: obj });
                    }
                }
            }
            ev = stream.next() => {
                match ev {
                    Some(Ok(event)) => dispatch(event, &mut writer, &store, &synced, &handler),
                    Some(Err(e)) => warn!(error = %e, "unexpected error with watch stream"),
                    None => break,
                }
            }
        }
    }
}

fn dispatch<K>(
    event: watcher::Event<K>,
    writer: &mut Writer<K>,
    store: &Store<K>,
    synced: &AtomicBool,
    handler: &Handler<K>,
) where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
    <K as Resource>::DynamicType: Default + Eq + Hash + Clone,
{
    match event {
        watcher::Event::Apply(obj) => {
            let old = store.get(&ObjectRef::from_obj(&obj));
            writer.apply_watcher_event(&watcher::Event::Apply(obj.clone()));
            let cur = Arc::new(obj);
            match old {
                Some(old) => handler(Event::Update { old, cur }),
                None => handler(Event::Add(cur)),
            }
        }
        // During a (re)list the store still serves the previous state:
        // known objects dispatch as updates, new ones as adds.
        watcher::Event::InitApply(obj) => {
            let old = store.get(&ObjectRef::from_obj(&obj));
            writer.apply_watcher_event(&watcher::Event::InitApply(obj.clone()));
            let cur = Arc::new(obj);
            match old {
                Some(old) => handler(Event::Update { old, cur }),
                None => handler(Event::Add(cur)),
            }
        }
        watcher::Event::Delete(obj) => {
            writer.apply_watcher_event(&watcher::Event::Delete(obj.clone()));
            handler(Event::Delete(Arc::new(obj)));
        }
        watcher::Event::Init => writer.apply_watcher_event(&watcher::Event::Init),
        watcher::Event::InitDone => {
            writer.apply_watcher_event(&watcher::Event::InitDone);
            synced.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod test {
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;

    fn config_map(name: &str, value: &str) -> ConfigMap {
        let mut data = std::collections::BTreeMap::new();
        data.insert("key".to_string(), value.to_string());
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some("default".into()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }

    #[derive(Debug, PartialEq)]
    enum Seen {
        Add(String),
        Update(bool),
        Delete(String),
    }

    fn recording_handler() -> (Handler<ConfigMap>, Arc<Mutex<Vec<Seen>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let handler: Handler<ConfigMap> = Arc::new(move |event| {
            let entry = match event {
                Event::Add(obj) => Seen::Add(obj.metadata.name.clone().unwrap()),
                Event::Update { old, cur } => Seen::Update(old == cur),
                Event::Delete(obj) => Seen::Delete(obj.metadata.name.clone().unwrap()),
            };
            record.lock().unwrap().push(entry);
        });
        (handler, seen)
    }

    #[test]
    fn dispatch_distinguishes_add_update_delete() {
        let (store, mut writer) = reflector::store::<ConfigMap>();
        let synced = AtomicBool::new(false);
        let (handler, seen) = recording_handler();

        dispatch(
            watcher::Event::Apply(config_map("a", "1")),
            &mut writer,
            &store,
            &synced,
            &handler,
        );
        dispatch(
            watcher::Event::Apply(config_map("a", "2")),
            &mut writer,
            &store,
            &synced,
            &handler,
        );
        dispatch(
            watcher::Event::Delete(config_map("a", "2")),
            &mut writer,
            &store,
            &synced,
            &handler,
        );

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            [
                Seen::Add("a".into()),
                Seen::Update(false),
                Seen::Delete("a".into())
            ]
        );
        assert!(store.state().is_empty());
    }

    #[test]
    fn init_done_marks_synced() {
        let (store, mut writer) = reflector::store::<ConfigMap>();
        let synced = AtomicBool::new(false);
        let (handler, _) = recording_handler();

        dispatch(
            watcher::Event::Init,
            &mut writer,
            &store,
            &synced,
            &handler,
        );
        assert!(!synced.load(Ordering::Relaxed));
        dispatch(
            watcher::Event::InitDone,
            &mut writer,
            &store,
            &synced,
            &handler,
        );
        assert!(synced.load(Ordering::Relaxed));
    }
}
