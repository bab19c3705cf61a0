use k8s_openapi::api::networking::v1::Ingress;

use crate::Result;
use crate::parser::get_bool_annotation;

const ENABLE_CORS: &str = "ingress.kubernetes.io/enable-cors";

pub fn parse(ing: &Ingress) -> Result<bool> {
    get_bool_annotation(ENABLE_CORS, ing)
}
