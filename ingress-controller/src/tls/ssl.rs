//! Materialisation of PEM files from secret data: combined cert + key
//! written atomically into the SSL directory, SHA1-tracked for change
//! detection.

use std::fs;
use std::io::Write;
use std::path::Path;

use sha1::{Digest, Sha1};
use x509_parser::pem::Pem;
use x509_parser::prelude::GeneralName;

use ingress_types::SslCert;

use crate::{Error, Result};

const SNAKE_OIL_PEM: &str = "/etc/ssl/certs/ssl-cert-snakeoil.pem";
const SNAKE_OIL_KEY: &str = "/etc/ssl/private/ssl-cert-snakeoil.key";

/// Writes `<ssl_dir>/<name>.pem` containing `cert + "\n" + key` via a temp
/// file and atomic rename, plus `<name>.ca` when a CA bundle is present.
/// The certificate is parsed to collect the common name and SANs.
pub fn add_or_update_cert_and_key(
    ssl_dir: &Path,
    name: &str,
    cert: &str,
    key: &str,
    ca: &str,
) -> Result<SslCert> {
    fs::create_dir_all(ssl_dir)?;
    set_mode(ssl_dir, 0o655)?;

    let content = format!("{cert}\n{key}");
    let cn = names_from_pem(content.as_bytes())?;

    let pem_file_name = ssl_dir.join(format!("{name}.pem"));
    let mut tmp = tempfile::NamedTempFile::new_in(ssl_dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(&pem_file_name).map_err(|e| Error::Io(e.error))?;
    set_mode(&pem_file_name, 0o644)?;

    let mut ca_file_name = String::new();
    if !ca.is_empty() {
        names_from_pem(ca.as_bytes())
            .map_err(|e| Error::Ssl(format!("invalid CA bundle: {e}")))?;
        let ca_path = ssl_dir.join(format!("{name}.ca"));
        fs::write(&ca_path, ca)?;
        set_mode(&ca_path, 0o644)?;
        ca_file_name = ca_path.to_string_lossy().into_owned();
    }

    let pem_file_name = pem_file_name.to_string_lossy().into_owned();
    Ok(SslCert {
        cert_file_name: pem_file_name.clone(),
        key_file_name: pem_file_name.clone(),
        ca_file_name,
        pem_sha: pem_sha1(Path::new(&pem_file_name)),
        pem_file_name,
        cn,
        ..Default::default()
    })
}

/// Common name plus SANs of the first certificate in the buffer.
fn names_from_pem(pem: &[u8]) -> Result<Vec<String>> {
    let block = Pem::iter_from_buffer(pem)
        .next()
        .ok_or_else(|| Error::Ssl("no valid PEM formatted block found".into()))?
        .map_err(|e| Error::Ssl(format!("invalid PEM block: {e}")))?;
    let cert = block
        .parse_x509()
        .map_err(|e| Error::Ssl(format!("invalid x509 certificate: {e}")))?;

    let mut names = Vec::new();
    if let Some(cn) = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
    {
        names.push(cn.to_owned());
    }
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for general_name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = general_name {
                let dns = (*dns).to_owned();
                if !names.contains(&dns) {
                    names.push(dns);
                }
            }
        }
    }
    Ok(names)
}

/// SHA1 of a pem file, hex encoded. Returns an empty string when the file
/// cannot be read, matching the change-detection use where a missing file
/// always differs.
pub fn pem_sha1(path: &Path) -> String {
    let Ok(bytes) = fs::read(path) else {
        return String::new();
    };
    let digest = Sha1::digest(&bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Snake-oil pair generated at image build time, used when no default
/// certificate is configured.
pub fn fake_ssl_cert() -> Option<(String, String)> {
    let cert = fs::read_to_string(SNAKE_OIL_PEM).ok()?;
    let key = fs::read_to_string(SNAKE_OIL_KEY).ok()?;
    Some((cert, key))
}

/// Wildcard-aware hostname check against the names of a certificate.
/// A wildcard covers exactly one label: `*.example.com` matches
/// `a.example.com` but neither `example.com` nor `a.b.example.com`.
pub fn is_host_valid(host: &str, cn: &[String]) -> bool {
    for name in cn {
        if name == host {
            return true;
        }
        if let Some(suffix) = name.strip_prefix("*.")
            && let Some((label, rest)) = host.split_once('.')
            && !label.is_empty()
            && rest == suffix
        {
            return true;
        }
    }
    false
}

fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
