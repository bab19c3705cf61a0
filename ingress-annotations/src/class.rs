//! Annotation-based gate selecting which routing rules this controller
//! owns.

use k8s_openapi::api::networking::v1::Ingress;

pub const INGRESS_CLASS_KEY: &str = "kubernetes.io/ingress.class";

/// An ingress is admitted when the class annotation is unset, empty, or
/// equal to the configured class.
pub fn is_valid(ing: &Ingress, class: &str) -> bool {
    match ing
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(INGRESS_CLASS_KEY))
    {
        None => true,
        Some(value) => value.is_empty() || value == class,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::{build_ingress, with_annotations};

    #[test]
    fn missing_annotation_is_admitted() {
        assert!(is_valid(&build_ingress(), "nginx"));
    }

    #[test]
    fn matching_class_is_admitted() {
        let ing = with_annotations(build_ingress(), &[(INGRESS_CLASS_KEY, "custom")]);
        assert!(is_valid(&ing, "custom"));
        assert!(!is_valid(&ing, "nginx"));
    }

    #[test]
    fn empty_class_is_admitted() {
        let ing = with_annotations(build_ingress(), &[(INGRESS_CLASS_KEY, "")]);
        assert!(is_valid(&ing, "nginx"));
    }
}
