/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use async_trait::async_trait;
use mesia_protocol::{Candidate, ComponentId, Credentials};
use std::sync::Arc;
use webrtc::util::Conn;

/// Components of the single media stream: primary and control.
pub const STREAM_COMPONENTS: usize = 2;

/// A stream inside a connectivity agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    pub id: u32,
    pub components: usize,
}

/// Result of one complete gathering pass over every component of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheredStream {
    pub credentials: Credentials,
    /// Primary-component candidates first, each component in discovery order.
    pub candidates: Vec<Candidate>,
}

/// Connectivity establishment for one session.
#[async_trait]
pub trait ConnectivityAgent: Send + Sync {
    async fn add_stream(&self, components: usize) -> Result<StreamHandle>;

    async fn remove_stream(&self, stream: StreamHandle) -> Result<()>;

    /// Probes local paths and resolves once, with the whole batch, when gathering is done.
    async fn gather(&self, stream: StreamHandle) -> Result<GatheredStream>;

    async fn set_remote_credentials(&self, stream: StreamHandle, credentials: &Credentials) -> Result<()>;

    async fn add_remote_candidate(&self, stream: StreamHandle, candidate: &Candidate) -> Result<()>;

    /// Runs connectivity checks on one component and returns the selected path.
    async fn connect(&self, stream: StreamHandle, component: ComponentId) -> Result<Arc<dyn Conn + Send + Sync>>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn ConnectivityAgent>>;
}
