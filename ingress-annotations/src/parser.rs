//! Shared accessors over `metadata.annotations`.

use k8s_openapi::api::networking::v1::Ingress;

use crate::{Error, Result};

pub fn get_string_annotation(name: &'static str, ing: &Ingress) -> Result<String> {
    let value = ing
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(name))
        .ok_or(Error::Missing(name))?;
    Ok(value.trim().to_owned())
}

pub fn get_bool_annotation(name: &'static str, ing: &Ingress) -> Result<bool> {
    let raw = get_string_annotation(name, ing)?;
    raw.parse::<bool>()
        .map_err(|_| Error::Invalid(format!("{name}: {raw} is not a boolean")))
}

pub fn get_int_annotation(name: &'static str, ing: &Ingress) -> Result<i32> {
    let raw = get_string_annotation(name, ing)?;
    raw.parse::<i32>()
        .map_err(|_| Error::Invalid(format!("{name}: {raw} is not a number")))
}

/// Splits a `namespace/name` reference.
pub fn parse_name_ns(value: &str) -> Result<(String, String)> {
    match value.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((ns.to_owned(), name.to_owned()))
        }
        _ => Err(Error::Invalid(format!(
            "invalid format (namespace/name) '{value}'"
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::{build_ingress, with_annotations};

    #[test]
    fn missing_annotation_is_distinguishable() {
        let ing = build_ingress();
        let err = get_string_annotation("ingress.kubernetes.io/auth-url", &ing).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn bool_annotation_rejects_garbage() {
        let ing = with_annotations(build_ingress(), &[("ingress.kubernetes.io/enable-cors", "si")]);
        let err = get_bool_annotation("ingress.kubernetes.io/enable-cors", &ing).unwrap_err();
        assert!(!err.is_missing());
    }

    #[test]
    fn name_ns_parsing() {
        assert_eq!(
            parse_name_ns("default/web").unwrap(),
            ("default".into(), "web".into())
        );
        assert!(parse_name_ns("web").is_err());
        assert!(parse_name_ns("a/b/c").is_err());
        assert!(parse_name_ns("/b").is_err());
    }
}
