/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! In-memory agent and media engine for driving sessions without a network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mesia_protocol::{Candidate, ComponentId, Credentials};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use webrtc::util::Conn;

use crate::agent::{AgentFactory, ConnectivityAgent, GatheredStream, StreamHandle};
use crate::media::{FaultSink, MediaChannel, MediaEngine, MediaSession};

pub const FAKE_UFRAG: &str = "fakeufrag";
pub const FAKE_PWD: &str = "fakepasswordfakepassword";

pub fn host_candidate(foundation: &str, component: ComponentId, priority: u32, port: u16) -> Candidate {
    Candidate {
        foundation: foundation.to_string(),
        component,
        priority,
        address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
        port,
    }
}

/// A primary and a control candidate on 192.168.1.10.
pub fn default_candidates() -> Vec<Candidate> {
    vec![
        host_candidate("1", ComponentId::Primary, 2130706431, 40000),
        host_candidate("1", ComponentId::Control, 2130706430, 40001),
    ]
}

/// How a fake agent answers `gather`.
#[derive(Clone)]
pub enum GatherScript {
    Immediate(Vec<Candidate>),
    /// Completes once the notify is triggered.
    Gate(Arc<Notify>, Vec<Candidate>),
    Never,
    Fail(String),
}

#[derive(Debug, Clone, Default)]
pub struct FakeAgentState {
    pub added_streams: usize,
    pub removed_streams: usize,
    pub gathers: usize,
    pub remote_credentials: Option<Credentials>,
    pub remote_candidates: Vec<Candidate>,
    pub closed: bool,
}

pub struct FakeAgent {
    script: GatherScript,
    reject_candidates: bool,
    stall_connect: bool,
    next_stream: AtomicU32,
    state: Mutex<FakeAgentState>,
}

impl FakeAgent {
    pub fn new(script: GatherScript) -> Self {
        Self {
            script,
            reject_candidates: false,
            stall_connect: false,
            next_stream: AtomicU32::new(1),
            state: Mutex::new(FakeAgentState::default()),
        }
    }

    /// Every remote candidate is refused, so no path ever becomes usable.
    pub fn rejecting_candidates(mut self) -> Self {
        self.reject_candidates = true;
        self
    }

    /// Connectivity checks never finish.
    pub fn stalling_connect(mut self) -> Self {
        self.stall_connect = true;
        self
    }

    pub fn snapshot(&self) -> FakeAgentState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectivityAgent for FakeAgent {
    async fn add_stream(&self, components: usize) -> Result<StreamHandle> {
        self.state.lock().unwrap().added_streams += 1;
        let id = self.next_stream.fetch_add(1, Ordering::Relaxed);
        Ok(StreamHandle { id, components })
    }

    async fn remove_stream(&self, _stream: StreamHandle) -> Result<()> {
        self.state.lock().unwrap().removed_streams += 1;
        Ok(())
    }

    async fn gather(&self, _stream: StreamHandle) -> Result<GatheredStream> {
        self.state.lock().unwrap().gathers += 1;
        let candidates = match &self.script {
            GatherScript::Immediate(c) => c.clone(),
            GatherScript::Gate(gate, c) => {
                gate.notified().await;
                c.clone()
            }
            GatherScript::Never => std::future::pending().await,
            GatherScript::Fail(reason) => return Err(anyhow!("{reason}")),
        };
        Ok(GatheredStream {
            credentials: Credentials::new(FAKE_UFRAG, FAKE_PWD),
            candidates,
        })
    }

    async fn set_remote_credentials(&self, _stream: StreamHandle, credentials: &Credentials) -> Result<()> {
        self.state.lock().unwrap().remote_credentials = Some(credentials.clone());
        Ok(())
    }

    async fn add_remote_candidate(&self, _stream: StreamHandle, candidate: &Candidate) -> Result<()> {
        if self.reject_candidates {
            return Err(anyhow!("candidate refused"));
        }
        self.state.lock().unwrap().remote_candidates.push(candidate.clone());
        Ok(())
    }

    async fn connect(&self, _stream: StreamHandle, _component: ComponentId) -> Result<Arc<dyn Conn + Send + Sync>> {
        if self.stall_connect {
            return std::future::pending().await;
        }
        Err(anyhow!("fake agent has no network"))
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Hands out [`FakeAgent`]s running the same script and keeps them for inspection.
pub struct FakeAgentFactory {
    script: GatherScript,
    reject_candidates: bool,
    stall_connect: bool,
    fail: bool,
    agents: Mutex<Vec<Arc<FakeAgent>>>,
}

impl FakeAgentFactory {
    pub fn new(script: GatherScript) -> Self {
        Self {
            script,
            reject_candidates: false,
            stall_connect: false,
            fail: false,
            agents: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting_candidates(mut self) -> Self {
        self.reject_candidates = true;
        self
    }

    pub fn stalling_connect(mut self) -> Self {
        self.stall_connect = true;
        self
    }

    /// `create` always fails.
    pub fn failing() -> Self {
        let mut f = Self::new(GatherScript::Never);
        f.fail = true;
        f
    }

    pub fn agents(&self) -> Vec<Arc<FakeAgent>> {
        self.agents.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentFactory for FakeAgentFactory {
    async fn create(&self) -> Result<Arc<dyn ConnectivityAgent>> {
        if self.fail {
            return Err(anyhow!("agent backend unavailable"));
        }
        let mut agent = FakeAgent::new(self.script.clone());
        agent.reject_candidates = self.reject_candidates;
        agent.stall_connect = self.stall_connect;
        let agent = Arc::new(agent);
        self.agents.lock().unwrap().push(agent.clone());
        Ok(agent)
    }
}

/// Counts starts and stops and keeps each session's fault sink.
#[derive(Default)]
pub struct FakeMediaEngine {
    fail_start: AtomicBool,
    starts: AtomicUsize,
    stops: Arc<AtomicUsize>,
    faults: Mutex<Vec<FaultSink>>,
}

struct FakeMediaSession {
    stops: Arc<AtomicUsize>,
}

impl FakeMediaEngine {
    pub fn failing() -> Self {
        let engine = Self::default();
        engine.fail_start.store(true, Ordering::Relaxed);
        engine
    }

    pub fn started(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stopped(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }

    /// Reports a fault on the `index`-th started media session.
    pub fn fault(&self, index: usize, reason: &str) {
        if let Some(sink) = self.faults.lock().unwrap().get(index) {
            sink.report(reason);
        }
    }
}

#[async_trait]
impl MediaEngine for FakeMediaEngine {
    async fn start(&self, channel: MediaChannel) -> Result<Box<dyn MediaSession>> {
        if self.fail_start.load(Ordering::Relaxed) {
            return Err(anyhow!("codec unavailable"));
        }
        self.starts.fetch_add(1, Ordering::Relaxed);
        self.faults.lock().unwrap().push(channel.faults);
        Ok(Box::new(FakeMediaSession {
            stops: self.stops.clone(),
        }))
    }
}

#[async_trait]
impl MediaSession for FakeMediaSession {
    async fn stop(self: Box<Self>) -> Result<()> {
        self.stops.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
