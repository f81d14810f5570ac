/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use sha2::{Digest as _, Sha256};

/// SHA-256 fingerprint of a DER certificate, as carried by `a=fingerprint:sha-256`.
pub fn fingerprint(der: &[u8]) -> String {
    let digest = Sha256::digest(der);
    format_fingerprint(&digest)
}

/// Uppercase hex byte pairs joined by colons, e.g. `AB:01:FF`.
pub fn format_fingerprint(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}
