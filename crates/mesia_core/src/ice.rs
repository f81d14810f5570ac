/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! webrtc-ice backed connectivity agent.
//!
//! webrtc-ice agents handle a single component, so a stream with N components
//! is N agents sharing the stream's local credentials. Only UDP host
//! candidates are gathered and no STUN or TURN servers are contacted.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mesia_protocol::{Candidate, ComponentId, Credentials};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use webrtc::ice::agent::agent_config::AgentConfig;
use webrtc::ice::agent::Agent;
use webrtc::ice::candidate::candidate_base::unmarshal_candidate;
use webrtc::ice::candidate::CandidateType;
use webrtc::ice::network_type::NetworkType;
use webrtc::util::Conn;

use crate::agent::{AgentFactory, ConnectivityAgent, GatheredStream, StreamHandle};

const UFRAG_LEN: usize = 16;
const PWD_LEN: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct IceConfig {
    pub enable_ipv6: bool,
}

pub struct IceAgentFactory {
    cfg: IceConfig,
}

impl IceAgentFactory {
    pub fn new(cfg: IceConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl AgentFactory for IceAgentFactory {
    async fn create(&self) -> Result<Arc<dyn ConnectivityAgent>> {
        Ok(Arc::new(IceAgent::new(self.cfg.clone())))
    }
}

struct IceStream {
    credentials: Credentials,
    remote: Option<Credentials>,
    // Index i serves component i + 1.
    components: Vec<Arc<Agent>>,
}

pub struct IceAgent {
    cfg: IceConfig,
    next_stream_id: AtomicU32,
    streams: Mutex<HashMap<u32, IceStream>>,
}

fn random_token(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn component_index(component: ComponentId) -> usize {
    usize::from(component.as_u16()) - 1
}

impl IceAgent {
    pub fn new(cfg: IceConfig) -> Self {
        Self {
            cfg,
            next_stream_id: AtomicU32::new(1),
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn agent_config(&self, credentials: &Credentials) -> AgentConfig {
        let mut network_types = vec![NetworkType::Udp4];
        if self.cfg.enable_ipv6 {
            network_types.push(NetworkType::Udp6);
        }
        AgentConfig {
            network_types,
            candidate_types: vec![CandidateType::Host],
            local_ufrag: credentials.ufrag.clone(),
            local_pwd: credentials.pwd.clone(),
            ..Default::default()
        }
    }

    async fn component_agent(&self, stream: StreamHandle, component: ComponentId) -> Result<Arc<Agent>> {
        let guard = self.streams.lock().await;
        let s = guard
            .get(&stream.id)
            .with_context(|| format!("unknown stream {}", stream.id))?;
        s.components
            .get(component_index(component))
            .cloned()
            .with_context(|| format!("stream {} has no component {component}", stream.id))
    }
}

async fn gather_component(agent: &Agent, component: ComponentId) -> Result<Vec<Candidate>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    agent.on_candidate(Box::new(move |c| {
        let _ = tx.send(c);
        Box::pin(async {})
    }));
    agent.gather_candidates().context("start candidate gathering")?;

    let mut out = Vec::new();
    // A `None` candidate marks the end of gathering.
    while let Some(Some(c)) = rx.recv().await {
        if c.candidate_type() != CandidateType::Host {
            continue;
        }
        let address: IpAddr = match c.address().parse() {
            Ok(a) => a,
            Err(_) => {
                debug!(address = %c.address(), "skipping candidate without ip literal");
                continue;
            }
        };
        out.push(Candidate {
            foundation: c.foundation(),
            component,
            priority: c.priority(),
            address,
            port: c.port(),
        });
    }
    Ok(out)
}

#[async_trait]
impl ConnectivityAgent for IceAgent {
    async fn add_stream(&self, components: usize) -> Result<StreamHandle> {
        if components == 0 || components > ComponentId::ALL.len() {
            return Err(anyhow!("unsupported component count {components}"));
        }
        let credentials = Credentials::new(random_token(UFRAG_LEN), random_token(PWD_LEN));
        let mut agents = Vec::with_capacity(components);
        for _ in 0..components {
            match Agent::new(self.agent_config(&credentials)).await {
                Ok(agent) => agents.push(Arc::new(agent)),
                Err(e) => {
                    for a in agents {
                        let _ = a.close().await;
                    }
                    return Err(anyhow!("create ice agent: {e}"));
                }
            }
        }
        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        self.streams.lock().await.insert(
            id,
            IceStream {
                credentials,
                remote: None,
                components: agents,
            },
        );
        Ok(StreamHandle { id, components })
    }

    async fn remove_stream(&self, stream: StreamHandle) -> Result<()> {
        let removed = self.streams.lock().await.remove(&stream.id);
        if let Some(s) = removed {
            for agent in s.components {
                if let Err(e) = agent.close().await {
                    debug!(stream = stream.id, "ice agent close: {e}");
                }
            }
        }
        Ok(())
    }

    async fn gather(&self, stream: StreamHandle) -> Result<GatheredStream> {
        let (credentials, agents) = {
            let guard = self.streams.lock().await;
            let s = guard
                .get(&stream.id)
                .with_context(|| format!("unknown stream {}", stream.id))?;
            (s.credentials.clone(), s.components.clone())
        };
        let mut candidates = Vec::new();
        for (agent, component) in agents.iter().zip(ComponentId::ALL) {
            candidates.extend(gather_component(agent, component).await?);
        }
        Ok(GatheredStream { credentials, candidates })
    }

    async fn set_remote_credentials(&self, stream: StreamHandle, credentials: &Credentials) -> Result<()> {
        let agents = {
            let mut guard = self.streams.lock().await;
            let s = guard
                .get_mut(&stream.id)
                .with_context(|| format!("unknown stream {}", stream.id))?;
            s.remote = Some(credentials.clone());
            s.components.clone()
        };
        for agent in agents {
            agent
                .set_remote_credentials(credentials.ufrag.clone(), credentials.pwd.clone())
                .await
                .context("set remote credentials")?;
        }
        Ok(())
    }

    async fn add_remote_candidate(&self, stream: StreamHandle, candidate: &Candidate) -> Result<()> {
        let agent = self.component_agent(stream, candidate.component).await?;
        // Each webrtc-ice agent only knows its own component as 1.
        let raw = format!(
            "{} 1 udp {} {} {} typ host",
            candidate.foundation, candidate.priority, candidate.address, candidate.port
        );
        let parsed = unmarshal_candidate(&raw).with_context(|| format!("unmarshal candidate {raw}"))?;
        let parsed: Arc<dyn webrtc::ice::candidate::Candidate + Send + Sync> = Arc::new(parsed);
        agent.add_remote_candidate(&parsed).context("add remote candidate")?;
        Ok(())
    }

    async fn connect(&self, stream: StreamHandle, component: ComponentId) -> Result<Arc<dyn Conn + Send + Sync>> {
        let remote = {
            let guard = self.streams.lock().await;
            let s = guard
                .get(&stream.id)
                .with_context(|| format!("unknown stream {}", stream.id))?;
            s.remote.clone().context("remote credentials not set")?
        };
        let agent = self.component_agent(stream, component).await?;
        // Dropping the sender cancels the dial, so it lives until dial returns.
        let (_cancel_tx, cancel_rx) = mpsc::channel(1);
        let conn: Arc<dyn Conn + Send + Sync> = agent
            .dial(cancel_rx, remote.ufrag, remote.pwd)
            .await
            .context("ice dial")?;
        Ok(conn)
    }

    async fn close(&self) -> Result<()> {
        let streams = self.streams.lock().await.drain().collect::<Vec<_>>();
        for (id, s) in streams {
            for agent in s.components {
                if let Err(e) = agent.close().await {
                    debug!(stream = id, "ice agent close: {e}");
                }
            }
        }
        Ok(())
    }
}
