/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use mesia_core::cert::certificate_fingerprint;
use mesia_core::ice::IceAgentFactory;
use mesia_core::media::LoopbackMediaEngine;
use mesia_core::SessionStore;
use mesia_server::config::load_config;
use mesia_server::{router, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = load_config()?;
    let fingerprint = certificate_fingerprint(&cfg.cert_path)
        .with_context(|| format!("load certificate {}", cfg.cert_path.display()))?;
    info!(cert = %cfg.cert_path.display(), %fingerprint, "certificate loaded");
    info!(
        gather_timeout_secs = cfg.gather_timeout_secs,
        answer_timeout_secs = cfg.answer_timeout_secs,
        ipv6 = cfg.enable_ipv6,
        "negotiation settings"
    );

    let store = Arc::new(SessionStore::new(
        Arc::new(IceAgentFactory::new(cfg.ice())),
        Arc::new(LoopbackMediaEngine),
        fingerprint,
        cfg.negotiation(),
    ));
    let app = router(AppState {
        store: store.clone(),
        template_path: cfg.template_path.clone(),
    });

    info!("mesia_server listening on http://{}", cfg.bind);
    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("http server")?;

    store.close_all().await;
    info!("mesia_server stopped");
    Ok(())
}
