/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use async_trait::async_trait;
use mesia_protocol::sdp::{VIDEO_PAYLOAD_TYPE, VIDEO_RTPMAP};
use mesia_protocol::ComponentId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::agent::{ConnectivityAgent, StreamHandle};
use crate::session::SessionEvent;

const RECV_BUFFER_SIZE: usize = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParams {
    pub payload_type: u8,
    pub rtpmap: &'static str,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            payload_type: VIDEO_PAYLOAD_TYPE,
            rtpmap: VIDEO_RTPMAP,
        }
    }
}

/// Reports session-fatal media failures back to the owning session.
#[derive(Clone)]
pub struct FaultSink {
    session_id: i64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl FaultSink {
    pub(crate) fn new(session_id: i64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { session_id, tx }
    }

    pub fn report(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(session_id = self.session_id, "media fault: {reason}");
        let _ = self.tx.send(SessionEvent::MediaFault(reason));
    }
}

/// The negotiated path handed to the media engine.
pub struct MediaChannel {
    pub session_id: i64,
    pub agent: Arc<dyn ConnectivityAgent>,
    pub stream: StreamHandle,
    pub component: ComponentId,
    pub codec: CodecParams,
    /// Upper bound on connectivity checks before the path counts as failed.
    pub connect_timeout: Duration,
    pub faults: FaultSink,
}

#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn start(&self, channel: MediaChannel) -> Result<Box<dyn MediaSession>>;
}

#[async_trait]
pub trait MediaSession: Send {
    async fn stop(self: Box<Self>) -> Result<()>;
}

/// Sends every datagram received on the primary component straight back to the peer.
#[derive(Default)]
pub struct LoopbackMediaEngine;

struct LoopbackSession {
    task: JoinHandle<()>,
}

#[async_trait]
impl MediaEngine for LoopbackMediaEngine {
    async fn start(&self, channel: MediaChannel) -> Result<Box<dyn MediaSession>> {
        let MediaChannel {
            session_id,
            agent,
            stream,
            component,
            codec,
            connect_timeout,
            faults,
        } = channel;
        info!(session_id, pt = codec.payload_type, codec = codec.rtpmap, "starting loopback media");
        let task = tokio::spawn(async move {
            let conn = match tokio::time::timeout(connect_timeout, agent.connect(stream, component)).await {
                Ok(Ok(c)) => c,
                Ok(Err(e)) => {
                    faults.report(format!("connectivity checks failed: {e:#}"));
                    return;
                }
                Err(_) => {
                    faults.report(format!("connectivity checks timed out after {connect_timeout:?}"));
                    return;
                }
            };
            info!(session_id, "media path established");
            let mut buf = vec![0u8; RECV_BUFFER_SIZE];
            loop {
                let n = match conn.recv(&mut buf).await {
                    Ok(n) => n,
                    Err(e) => {
                        faults.report(format!("media recv: {e}"));
                        return;
                    }
                };
                if let Err(e) = conn.send(&buf[..n]).await {
                    faults.report(format!("media send: {e}"));
                    return;
                }
            }
        });
        Ok(Box::new(LoopbackSession { task }))
    }
}

#[async_trait]
impl MediaSession for LoopbackSession {
    async fn stop(self: Box<Self>) -> Result<()> {
        self.task.abort();
        Ok(())
    }
}
