//! Source-range restriction from comma-separated CIDRs.

use std::net::IpAddr;

use k8s_openapi::api::networking::v1::Ingress;

use ingress_types::Defaults;
use ingress_types::policy::SourceRange;

use crate::parser::get_string_annotation;
use crate::{Error, Result};

const WHITELIST: &str = "ingress.kubernetes.io/whitelist-source-range";

pub fn parse(defaults: &Defaults, ing: &Ingress) -> Result<SourceRange> {
    let raw = match get_string_annotation(WHITELIST, ing) {
        Ok(raw) => raw,
        Err(e) if e.is_missing() => {
            return Ok(SourceRange {
                cidr: defaults.whitelist_source_range.clone(),
            });
        }
        Err(e) => return Err(e),
    };

    let mut cidr = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        validate_cidr(entry)?;
        cidr.push(entry.to_owned());
    }
    Ok(SourceRange { cidr })
}

fn validate_cidr(entry: &str) -> Result<()> {
    let (addr, prefix) = entry
        .split_once('/')
        .ok_or_else(|| Error::Invalid(format!("{entry} is not a valid CIDR")))?;
    let addr: IpAddr = addr
        .parse()
        .map_err(|_| Error::Invalid(format!("{entry} is not a valid CIDR")))?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    match prefix.parse::<u8>() {
        Ok(len) if len <= max => Ok(()),
        _ => Err(Error::Invalid(format!("{entry} is not a valid CIDR"))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::{build_ingress, with_annotations};

    #[test]
    fn defaults_apply_when_unset() {
        let defaults = Defaults {
            whitelist_source_range: vec!["10.0.0.0/8".into()],
            ..Default::default()
        };
        let wl = parse(&defaults, &build_ingress()).unwrap();
        assert_eq!(wl.cidr, ["10.0.0.0/8"]);
    }

    #[test]
    fn parses_multiple_ranges() {
        let ing = with_annotations(
            build_ingress(),
            &[(WHITELIST, "192.168.0.0/16, fd00::/8")],
        );
        let wl = parse(&Defaults::default(), &ing).unwrap();
        assert_eq!(wl.cidr, ["192.168.0.0/16", "fd00::/8"]);
    }

    #[test]
    fn rejects_bad_ranges() {
        for bad in ["10.0.0.1", "300.0.0.0/8", "10.0.0.0/33"] {
            let ing = with_annotations(build_ingress(), &[(WHITELIST, bad)]);
            assert!(parse(&Defaults::default(), &ing).is_err(), "{bad}");
        }
    }
}
