//! Fire-and-forget publication of Kubernetes events. A failed publish logs
//! a warning and never fails the sync that produced it.

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

pub mod reasons {
    pub const CREATE: &str = "CREATE";
    pub const UPDATE: &str = "UPDATE";
    pub const DELETE: &str = "DELETE";
    pub const MAPPING: &str = "MAPPING";
}

#[derive(Clone)]
pub struct EventRecorder {
    recorder: Recorder,
}

impl EventRecorder {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: "ingress-controller".into(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }

    pub fn publish(
        &self,
        reference: ObjectReference,
        type_: EventType,
        reason: &'static str,
        note: String,
    ) {
        let recorder = self.recorder.clone();
        tokio::spawn(async move {
            let event = Event {
                type_,
                reason: reason.to_string(),
                note: Some(note),
                action: "Sync".into(),
                secondary: None,
            };
            if let Err(e) = recorder.publish(&event, &reference).await {
                warn!(reason, error = %e, "failed to publish event");
            }
        });
    }
}

/// Object reference for an ingress, targeted by the recorded events.
pub fn ingress_ref(ing: &Ingress) -> ObjectReference {
    ObjectReference {
        api_version: Some("networking.k8s.io/v1".into()),
        kind: Some("Ingress".into()),
        name: ing.metadata.name.clone(),
        namespace: ing.metadata.namespace.clone(),
        uid: ing.metadata.uid.clone(),
        ..Default::default()
    }
}
