//! Long-lived tracker of certificates materialised on disk. Written only
//! by the secret worker, read by the main sync.

pub mod ssl;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ingress_types::SslCert;

/// Key of the cert backing the catch-all server.
pub const DEFAULT_CERT_KEY: &str = "default/_";

#[derive(Clone, Default)]
pub struct CertTracker {
    inner: Arc<Mutex<HashMap<String, SslCert>>>,
}

impl CertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<SslCert> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().contains_key(key)
    }

    pub fn update(&self, key: impl Into<String>, cert: SslCert) {
        self.inner.lock().unwrap().insert(key.into(), cert);
    }

    pub fn delete(&self, key: &str) -> Option<SslCert> {
        self.inner.lock().unwrap().remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
