//! Basic and digest authentication backed by an htpasswd secret.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress;

use ingress_types::policy::BasicDigest;

use crate::parser::get_string_annotation;
use crate::{Error, Result};

const AUTH_TYPE: &str = "ingress.kubernetes.io/auth-type";
const AUTH_SECRET: &str = "ingress.kubernetes.io/auth-secret";
const AUTH_REALM: &str = "ingress.kubernetes.io/auth-realm";

/// Datum inside the secret holding the htpasswd content.
const AUTH_FILE_KEY: &str = "auth";

/// Parses the auth annotations and materialises the htpasswd file under
/// `auth_dir` so the proxy can reference it. `lookup` resolves a secret by
/// `namespace/name` from the informer cache.
pub fn parse(
    ing: &Ingress,
    auth_dir: &Path,
    lookup: impl Fn(&str) -> Option<Arc<Secret>>,
) -> Result<BasicDigest> {
    let auth_type = get_string_annotation(AUTH_TYPE, ing)?;
    if auth_type != "basic" && auth_type != "digest" {
        return Err(Error::Invalid(format!(
            "{auth_type} is not a valid auth type (basic or digest)"
        )));
    }

    let secret_name = get_string_annotation(AUTH_SECRET, ing)?;
    let ns = ing.metadata.namespace.clone().unwrap_or_default();
    let name = ing.metadata.name.clone().unwrap_or_default();
    let secret_key = format!("{ns}/{secret_name}");
    let secret = lookup(&secret_key).ok_or_else(|| Error::SecretNotFound(secret_key.clone()))?;

    let realm = get_string_annotation(AUTH_REALM, ing).unwrap_or_default();

    let file = auth_dir.join(format!("{ns}-{name}.passwd"));
    dump_secret(&file, &secret)?;

    Ok(BasicDigest {
        auth_type,
        realm,
        file: file.to_string_lossy().into_owned(),
        secured: true,
    })
}

/// Writes the `auth` datum of the secret to `path`.
fn dump_secret(path: &Path, secret: &Secret) -> Result<()> {
    let auth = secret
        .data
        .as_ref()
        .and_then(|d| d.get(AUTH_FILE_KEY))
        .ok_or_else(|| {
            Error::Invalid(format!(
                "secret {} does not contain the {AUTH_FILE_KEY} datum",
                secret.metadata.name.as_deref().unwrap_or_default()
            ))
        })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &auth.0)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use k8s_openapi::ByteString;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;
    use crate::fixtures::{build_ingress, with_annotations};

    fn mock_secret() -> Arc<Secret> {
        let mut data = BTreeMap::new();
        data.insert(
            "auth".to_string(),
            ByteString(b"foo:$apr1$OFG3Xybp$ckL0FHDAkoXYIlH9.cysT0".to_vec()),
        );
        Arc::new(Secret {
            metadata: ObjectMeta {
                name: Some("demo-secret".into()),
                namespace: Some("default".into()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        })
    }

    #[test]
    fn ingress_without_annotations_reports_missing() {
        let ing = build_ingress();
        let dir = tempfile::tempdir().unwrap();
        let err = parse(&ing, dir.path(), |_| Some(mock_secret())).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn basic_auth_materialises_htpasswd() {
        let ing = with_annotations(
            build_ingress(),
            &[
                (AUTH_TYPE, "basic"),
                (AUTH_SECRET, "demo-secret"),
                (AUTH_REALM, "-realm-"),
            ],
        );
        let dir = tempfile::tempdir().unwrap();

        let auth = parse(&ing, dir.path(), |key| {
            assert_eq!(key, "default/demo-secret");
            Some(mock_secret())
        })
        .unwrap();

        assert_eq!(auth.auth_type, "basic");
        assert_eq!(auth.realm, "-realm-");
        assert!(auth.secured);
        let written = fs::read_to_string(&auth.file).unwrap();
        assert!(written.starts_with("foo:"));
    }

    #[test]
    fn unknown_auth_type_is_rejected() {
        let ing = with_annotations(
            build_ingress(),
            &[(AUTH_TYPE, "token"), (AUTH_SECRET, "demo-secret")],
        );
        let dir = tempfile::tempdir().unwrap();
        let err = parse(&ing, dir.path(), |_| Some(mock_secret())).unwrap_err();
        assert!(!err.is_missing());
    }

    #[test]
    fn secret_without_auth_datum_fails() {
        let ing = with_annotations(
            build_ingress(),
            &[(AUTH_TYPE, "basic"), (AUTH_SECRET, "demo-secret")],
        );
        let dir = tempfile::tempdir().unwrap();
        let secret = Arc::new(Secret {
            metadata: ObjectMeta {
                name: Some("demo-secret".into()),
                namespace: Some("default".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(parse(&ing, dir.path(), |_| Some(secret.clone())).is_err());
    }
}
