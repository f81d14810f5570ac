/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use mesia_core::ice::IceConfig;
use mesia_core::NegotiationConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub template_path: PathBuf,
    pub cert_path: PathBuf,
    pub gather_timeout_secs: u64,
    pub answer_timeout_secs: u64,
    pub enable_ipv6: bool,
}

impl Config {
    pub fn negotiation(&self) -> NegotiationConfig {
        NegotiationConfig {
            gather_timeout: Duration::from_secs(self.gather_timeout_secs),
            answer_timeout: Duration::from_secs(self.answer_timeout_secs),
        }
    }

    pub fn ice(&self) -> IceConfig {
        IceConfig {
            enable_ipv6: self.enable_ipv6,
        }
    }
}

pub fn load_config() -> Result<Config> {
    config_from(|key| std::env::var(key).ok())
}

pub(crate) fn config_from(var: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let bind = var("MESIA_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string());
    let bind: SocketAddr = bind.parse().context("MESIA_BIND invalid")?;

    let template_path = var("MESIA_TEMPLATE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("webrtc_loopback.html"));

    let cert_path = var("MESIA_CERT_PEM")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("certkey.pem"));

    let gather_timeout_secs = var("MESIA_GATHER_TIMEOUT_SECS")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10)
        .max(1)
        .min(120);

    let answer_timeout_secs = var("MESIA_ANSWER_TIMEOUT_SECS")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60)
        .max(5)
        .min(3600);

    let enable_ipv6 = var("MESIA_ENABLE_IPV6")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    Ok(Config {
        bind,
        template_path,
        cert_path,
        gather_timeout_secs,
        answer_timeout_secs,
        enable_ipv6,
    })
}
