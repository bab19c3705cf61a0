//! Authentication delegated to an external endpoint.

use k8s_openapi::api::networking::v1::Ingress;

use ingress_types::policy::ExternalAuth;

use crate::parser::get_string_annotation;
use crate::{Error, Result};

const AUTH_URL: &str = "ingress.kubernetes.io/auth-url";
const AUTH_METHOD: &str = "ingress.kubernetes.io/auth-method";
const AUTH_SEND_HEADERS: &str = "ingress.kubernetes.io/auth-send-headers";

const VALID_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE",
];

pub fn parse(ing: &Ingress) -> Result<ExternalAuth> {
    let url = get_string_annotation(AUTH_URL, ing)?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::Invalid(format!("{url} is not a valid URL")));
    }

    let method = match get_string_annotation(AUTH_METHOD, ing) {
        Ok(m) if VALID_METHODS.contains(&m.as_str()) => m,
        Ok(m) => {
            return Err(Error::Invalid(format!("{m} is not a valid HTTP method")));
        }
        Err(e) if e.is_missing() => String::new(),
        Err(e) => return Err(e),
    };

    let send_headers = match get_string_annotation(AUTH_SEND_HEADERS, ing) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_owned)
            .collect(),
        Err(_) => Vec::new(),
    };

    Ok(ExternalAuth {
        url,
        method,
        send_headers,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::{build_ingress, with_annotations};

    #[test]
    fn url_is_required() {
        let err = parse(&build_ingress()).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn rejects_non_http_url() {
        let ing = with_annotations(build_ingress(), &[(AUTH_URL, "ldap://auth.internal")]);
        assert!(parse(&ing).is_err());
    }

    #[test]
    fn parses_url_method_and_headers() {
        let ing = with_annotations(
            build_ingress(),
            &[
                (AUTH_URL, "https://auth.internal/check"),
                (AUTH_METHOD, "POST"),
                (AUTH_SEND_HEADERS, "X-User, X-Groups"),
            ],
        );
        let auth = parse(&ing).unwrap();
        assert_eq!(auth.url, "https://auth.internal/check");
        assert_eq!(auth.method, "POST");
        assert_eq!(auth.send_headers, ["X-User", "X-Groups"]);
    }

    #[test]
    fn rejects_unknown_method() {
        let ing = with_annotations(
            build_ingress(),
            &[
                (AUTH_URL, "https://auth.internal/check"),
                (AUTH_METHOD, "FETCH"),
            ],
        );
        assert!(parse(&ing).is_err());
    }
}
