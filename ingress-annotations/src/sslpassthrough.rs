use k8s_openapi::api::networking::v1::Ingress;

use crate::Result;
use crate::parser::get_bool_annotation;

const SSL_PASSTHROUGH: &str = "ingress.kubernetes.io/ssl-passthrough";

/// Whether TLS should be passed to the backend unterminated.
pub fn parse(ing: &Ingress) -> Result<bool> {
    get_bool_annotation(SSL_PASSTHROUGH, ing)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::{build_ingress, with_annotations};

    #[test]
    fn parses_bool() {
        let ing = with_annotations(build_ingress(), &[(SSL_PASSTHROUGH, "true")]);
        assert!(parse(&ing).unwrap());
        assert!(parse(&build_ingress()).unwrap_err().is_missing());
    }
}
