use std::sync::{LazyLock, RwLock};

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::{counter::Counter, family::Family};
use prometheus_client::registry::Registry;

pub static REGISTRY: LazyLock<RwLock<Registry>> =
    LazyLock::new(|| RwLock::new(Registry::with_prefix("ingress_controller")));

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub operation_type: String,
}

/// Counters tracking proxy reloads. Registered once at process start.
#[derive(Clone)]
pub struct ReloadMetrics {
    operations: Family<OperationLabels, Counter>,
    errors: Family<OperationLabels, Counter>,
}

impl ReloadMetrics {
    pub fn new() -> Self {
        let mut registry = REGISTRY.write().unwrap();
        let operations = Family::<OperationLabels, Counter>::default();
        let errors = Family::<OperationLabels, Counter>::default();
        registry.register(
            "reload_operations",
            "Cumulative number of proxy reload operations by operation type",
            operations.clone(),
        );
        registry.register(
            "reload_operations_errors",
            "Cumulative number of proxy reload operation errors by operation type",
            errors.clone(),
        );
        Self { operations, errors }
    }

    pub fn count_success(&self) {
        self.operations
            .get_or_create(&OperationLabels {
                operation_type: "reload".into(),
            })
            .inc();
    }

    pub fn count_error(&self) {
        self.errors
            .get_or_create(&OperationLabels {
                operation_type: "reload".into(),
            })
            .inc();
    }
}

impl Default for ReloadMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders the registry in the Prometheus text exposition format.
pub fn encode() -> String {
    let mut buffer = String::new();
    let registry = &*REGISTRY.read().unwrap();
    match prometheus_client::encoding::text::encode(&mut buffer, registry) {
        Ok(()) => buffer,
        Err(_) => String::new(),
    }
}
