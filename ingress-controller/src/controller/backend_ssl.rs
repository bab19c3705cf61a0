//! Secret-queue sync: keeps the on-disk PEM files and the cert tracker in
//! step with the TLS secrets referenced by ingress rules.

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::ObjectRef;
use tracing::{debug, warn};

use ingress_annotations as annotations;
use ingress_types::SslCert;

use crate::controller::IngressController;
use crate::tls::{DEFAULT_CERT_KEY, ssl};
use crate::{Error, Result};

const TLS_CERT_KEY: &str = "tls.crt";
const TLS_PRIVATE_KEY_KEY: &str = "tls.key";
const CA_KEY: &str = "ca.crt";

/// Name under which the synthesised fallback pair is materialised.
const SNAKE_OIL_NAME: &str = "system-snake-oil-certificate";

impl IngressController {
    /// Handles one secret-queue tick. Per-secret failures requeue that key
    /// only; other secrets are unaffected.
    pub(crate) async fn sync_secret(&self, key: &str) -> Result<()> {
        self.rate_limiter.accept().await;

        if self.secret_queue.is_shutting_down() {
            return Ok(());
        }
        if !self.informers_synced() {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            return Err(Error::NotSynced);
        }

        self.seed_default_cert();

        let Some((ns, name)) = key.split_once('/') else {
            warn!("ignoring malformed secret key '{key}'");
            return Ok(());
        };
        let Some(secret) = self.secrets.store().get(&ObjectRef::new(name).within(ns)) else {
            debug!("secret {key} no longer exists");
            return Ok(());
        };

        if !secret_referenced(&self.ingresses.store().state(), &secret) {
            debug!("secret {key} is not referenced by any ingress rule");
            return Ok(());
        }

        let mut cert = self.materialise_secret(key, &secret)?;
        cert.name = name.to_owned();
        cert.namespace = ns.to_owned();
        cert.secret = key.to_owned();
        self.certs.update(key, cert);
        debug!("updated ssl certificate for secret {key}");
        Ok(())
    }

    /// Writes the combined PEM for a secret into the SSL directory.
    fn materialise_secret(&self, key: &str, secret: &Secret) -> Result<SslCert> {
        let data = secret
            .data
            .as_ref()
            .ok_or_else(|| Error::Ssl(format!("secret {key} has no data")))?;
        let cert = data
            .get(TLS_CERT_KEY)
            .ok_or_else(|| Error::Ssl(format!("secret {key} has no cert")))?;
        let private_key = data
            .get(TLS_PRIVATE_KEY_KEY)
            .ok_or_else(|| Error::Ssl(format!("secret {key} has no private key")))?;
        let ca = data.get(CA_KEY);

        let pem_name = key.replace('/', "-");
        ssl::add_or_update_cert_and_key(
            &self.settings.ssl_dir,
            &pem_name,
            &String::from_utf8_lossy(&cert.0),
            &String::from_utf8_lossy(&private_key.0),
            ca.map(|ca| String::from_utf8_lossy(&ca.0).into_owned())
                .as_deref()
                .unwrap_or(""),
        )
    }

    /// Ensures the catch-all entry exists: the operator-supplied default
    /// secret when configured, else the snake-oil pair shipped in the
    /// image. Retried on every tick until it succeeds.
    fn seed_default_cert(&self) {
        if self.certs.contains(DEFAULT_CERT_KEY) {
            return;
        }

        let seeded = if self.settings.default_ssl_certificate.is_empty() {
            match ssl::fake_ssl_cert() {
                Some((cert, key)) => {
                    ssl::add_or_update_cert_and_key(
                        &self.settings.ssl_dir,
                        SNAKE_OIL_NAME,
                        &cert,
                        &key,
                        "",
                    )
                    .map_err(|e| warn!("unable to use the fake ssl certificate: {e}"))
                    .ok()
                }
                None => None,
            }
        } else {
            let key = self.settings.default_ssl_certificate.clone();
            let Some((ns, name)) = key.split_once('/') else {
                warn!("invalid default ssl certificate reference '{key}'");
                return;
            };
            match self.secrets.store().get(&ObjectRef::new(name).within(ns)) {
                Some(secret) => self
                    .materialise_secret(&key, &secret)
                    .map_err(|e| warn!("unexpected error reading default ssl certificate: {e}"))
                    .ok(),
                None => {
                    warn!("default ssl certificate {key} does not exist yet");
                    None
                }
            }
        };

        if let Some(mut cert) = seeded {
            cert.secret = self.settings.default_ssl_certificate.clone();
            self.certs.update(DEFAULT_CERT_KEY, cert);
        }
    }
}

/// A secret is of interest when some ingress in its namespace lists it
/// under `spec.tls`, or any ingress points its client-cert annotation at
/// it.
fn secret_referenced(ingresses: &[std::sync::Arc<Ingress>], secret: &Secret) -> bool {
    let ns = secret.metadata.namespace.as_deref().unwrap_or_default();
    let name = secret.metadata.name.as_deref().unwrap_or_default();
    let key = format!("{ns}/{name}");

    for ing in ingresses {
        if annotations::authtls::secret_reference(ing).as_deref() == Some(key.as_str()) {
            return true;
        }
        if ing.metadata.namespace.as_deref() != Some(ns) {
            continue;
        }
        let tls_entries = ing
            .spec
            .as_ref()
            .and_then(|spec| spec.tls.as_deref())
            .unwrap_or_default();
        if tls_entries
            .iter()
            .any(|tls| tls.secret_name.as_deref() == Some(name))
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::test_util::{ingress, tls_secret, with_tls};

    #[test]
    fn tls_reference_must_share_the_namespace() {
        let ing = with_tls(ingress("foo", "foo.bar", "/", "svc", 80), &["foo.bar"], "t");
        let ingresses = vec![Arc::new(ing)];

        let same_ns = tls_secret("default", "t", "c", "k");
        assert!(secret_referenced(&ingresses, &same_ns));

        let other_ns = tls_secret("other", "t", "c", "k");
        assert!(!secret_referenced(&ingresses, &other_ns));

        let unrelated = tls_secret("default", "other", "c", "k");
        assert!(!secret_referenced(&ingresses, &unrelated));
    }

    #[test]
    fn auth_tls_annotation_references_across_namespaces() {
        let mut ing = ingress("foo", "foo.bar", "/", "svc", 80);
        ing.metadata.annotations = Some(
            [(
                "ingress.kubernetes.io/auth-tls-secret".to_string(),
                "certs/client-ca".to_string(),
            )]
            .into(),
        );
        let ingresses = vec![Arc::new(ing)];

        let referenced = tls_secret("certs", "client-ca", "c", "k");
        assert!(secret_referenced(&ingresses, &referenced));
    }
}
