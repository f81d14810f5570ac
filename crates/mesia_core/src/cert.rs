/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{anyhow, Context, Result};
use rustls_pemfile::certs;
use std::io::BufRead;
use std::path::Path;

/// DER bytes of the first certificate in a PEM stream. Key sections are skipped.
pub fn certificate_der_from_pem(reader: &mut dyn BufRead) -> Result<Vec<u8>> {
    let chain = certs(reader)
        .collect::<Result<Vec<_>, _>>()
        .context("read certificate pem")?;
    let first = chain.first().ok_or_else(|| anyhow!("no certificate in pem"))?;
    if first.is_empty() {
        return Err(anyhow!("empty certificate"));
    }
    Ok(first.to_vec())
}

pub fn load_certificate_der(path: &Path) -> Result<Vec<u8>> {
    let mut reader = std::io::BufReader::new(
        std::fs::File::open(path).with_context(|| format!("open certificate {}", path.display()))?,
    );
    certificate_der_from_pem(&mut reader).with_context(|| format!("parse certificate {}", path.display()))
}

/// The `a=fingerprint:sha-256` value for the certificate at `path`.
pub fn certificate_fingerprint(path: &Path) -> Result<String> {
    let der = load_certificate_der(path)?;
    Ok(mesia_protocol::fingerprint(&der))
}
