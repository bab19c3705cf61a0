//! Path rewriting and `<base>` tag injection.

use k8s_openapi::api::networking::v1::Ingress;

use ingress_types::policy::Redirect;

use crate::Result;
use crate::parser::{get_bool_annotation, get_string_annotation};

const REWRITE_TO: &str = "ingress.kubernetes.io/rewrite-to";
const ADD_BASE_URL: &str = "ingress.kubernetes.io/add-base-url";

pub fn parse(ing: &Ingress) -> Result<Redirect> {
    let target = get_string_annotation(REWRITE_TO, ing)?;
    let add_base_url = get_bool_annotation(ADD_BASE_URL, ing).unwrap_or(false);

    Ok(Redirect {
        target,
        add_base_url,
    })
}
