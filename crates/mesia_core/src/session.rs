/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! One negotiation, driven by its own task.
//!
//! The task owns the agent, stream, media session and the paused response.
//! Everything else talks to it through [`SessionHandle`]; the gatherer and
//! the media engine report back through the event channel.

use mesia_protocol::{ComponentId, LocalDescription, RemoteDescription};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::agent::{ConnectivityAgent, GatheredStream, StreamHandle};
use crate::config::NegotiationConfig;
use crate::error::NegotiationError;
use crate::gatherer::{preferred_candidate, start_gathering, GatheringOutcome, GatheringTask};
use crate::media::{CodecParams, FaultSink, MediaChannel, MediaEngine, MediaSession};
use crate::store::{unregister, SharedRegistry};

const COMMAND_QUEUE: usize = 16;

/// Continuation of the request that triggered the session, answered with the
/// encoded local description once gathering completes.
pub type PendingResponse = oneshot::Sender<Result<String, NegotiationError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Gathering,
    Ready,
    Negotiating,
    Active,
    Closed,
}

#[derive(Debug)]
pub(crate) enum SessionEvent {
    Gathering(GatheringOutcome),
    MediaFault(String),
}

enum Command {
    ApplyRemote {
        text: String,
        reply: oneshot::Sender<Result<SessionState, NegotiationError>>,
    },
    LocalDescription {
        reply: oneshot::Sender<Option<String>>,
    },
    Reoffer {
        reply: oneshot::Sender<Option<String>>,
    },
    Close {
        reason: &'static str,
    },
}

/// Shared by every session of a store.
pub(crate) struct SessionContext {
    pub(crate) fingerprint: String,
    pub(crate) engine: Arc<dyn MediaEngine>,
    pub(crate) cfg: NegotiationConfig,
    pub(crate) registry: SharedRegistry,
}

#[derive(Clone)]
pub struct SessionHandle {
    id: i64,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Decodes and applies the peer's description. A rejected description leaves the state as it was.
    pub async fn apply_remote(&self, text: impl Into<String>) -> Result<SessionState, NegotiationError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ApplyRemote {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| NegotiationError::Closed)?;
        rx.await.unwrap_or(Err(NegotiationError::Closed))
    }

    /// The encoded local description, once gathering has completed.
    pub async fn local_description(&self) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::LocalDescription { reply }).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Offers the cached local description again for a page reload.
    ///
    /// Only a READY session can be offered again; its answer deadline restarts.
    /// Any other state yields `None` and the caller should start over.
    pub async fn reoffer(&self) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Reoffer { reply }).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Closes the session and waits until its resources are released. Idempotent.
    pub async fn close(&self) {
        let _ = self
            .commands
            .send(Command::Close {
                reason: "closed by request",
            })
            .await;
        self.closed().await;
    }

    pub async fn closed(&self) {
        let mut rx = self.state.clone();
        let _ = rx.wait_for(|s| *s == SessionState::Closed).await;
    }
}

pub(crate) struct Session {
    id: i64,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    agent: Arc<dyn ConnectivityAgent>,
    stream: StreamHandle,
    pending: Option<PendingResponse>,
    gathering: Option<GatheringTask>,
    media: Option<Box<dyn MediaSession>>,
    local_description: Option<String>,
    remote_paths: usize,
    answer_deadline: Option<Instant>,
    events: mpsc::UnboundedSender<SessionEvent>,
    ctx: Arc<SessionContext>,
}

impl Session {
    fn new(
        id: i64,
        agent: Arc<dyn ConnectivityAgent>,
        stream: StreamHandle,
        pending: Option<PendingResponse>,
        ctx: Arc<SessionContext>,
    ) -> (Self, watch::Receiver<SessionState>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Init);
        let (events, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            id,
            state: SessionState::Init,
            state_tx,
            agent,
            stream,
            pending,
            gathering: None,
            media: None,
            local_description: None,
            remote_paths: 0,
            answer_deadline: None,
            events,
            ctx,
        };
        (session, state_rx, events_rx)
    }

    /// Creates the session, starts gathering and hands the session to its own task.
    pub(crate) fn spawn(
        id: i64,
        agent: Arc<dyn ConnectivityAgent>,
        stream: StreamHandle,
        pending: Option<PendingResponse>,
        ctx: Arc<SessionContext>,
    ) -> SessionHandle {
        let (mut session, state_rx, events_rx) = Self::new(id, agent, stream, pending, ctx);
        let (commands, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        session.begin_gathering();
        tokio::spawn(session.run(commands_rx, events_rx));
        SessionHandle {
            id,
            commands,
            state: state_rx,
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            debug!(session_id = self.id, from = ?self.state, to = ?next, "session transition");
        }
        self.state = next;
        self.state_tx.send_replace(next);
    }

    fn begin_gathering(&mut self) {
        let events = self.events.clone();
        let task = start_gathering(
            self.agent.clone(),
            self.stream,
            self.ctx.cfg.gather_timeout,
            move |outcome| {
                let _ = events.send(SessionEvent::Gathering(outcome));
            },
        );
        self.gathering = Some(task);
        self.set_state(SessionState::Gathering);
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        while self.state != SessionState::Closed {
            let deadline = self.answer_deadline;
            let answer_timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                Some(event) = events.recv() => self.on_event(event).await,
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => self.close("all handles dropped").await,
                },
                _ = answer_timer => {
                    warn!(session_id = self.id, state = ?self.state, "no usable remote description before deadline");
                    self.close("answer timeout").await;
                }
            }
        }
        debug!(session_id = self.id, "session task finished");
    }

    async fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::ApplyRemote { text, reply } => {
                let res = self.apply_remote(&text).await;
                let _ = reply.send(res);
            }
            Command::LocalDescription { reply } => {
                let _ = reply.send(self.local_description.clone());
            }
            Command::Reoffer { reply } => {
                let _ = reply.send(self.reoffer());
            }
            Command::Close { reason } => self.close(reason).await,
        }
    }

    async fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Gathering(outcome) => self.on_gathering(outcome).await,
            SessionEvent::MediaFault(reason) => {
                if self.state == SessionState::Closed {
                    return;
                }
                error!(session_id = self.id, "media engine failed: {reason}");
                self.close("media fault").await;
            }
        }
    }

    async fn on_gathering(&mut self, outcome: GatheringOutcome) {
        if self.state != SessionState::Gathering {
            debug!(session_id = self.id, state = ?self.state, "discarding late gathering result");
            return;
        }
        self.gathering = None;
        let gathered = match outcome {
            GatheringOutcome::Complete(g) => g,
            GatheringOutcome::Failed(e) => {
                self.fail(NegotiationError::Gathering(e)).await;
                return;
            }
            GatheringOutcome::TimedOut(after) => {
                self.fail(NegotiationError::Timeout(after)).await;
                return;
            }
        };
        let text = match self.describe(gathered) {
            Ok(t) => t,
            Err(e) => {
                self.fail(e).await;
                return;
            }
        };
        self.local_description = Some(text.clone());
        self.answer_deadline = Some(Instant::now() + self.ctx.cfg.answer_timeout);
        self.set_state(SessionState::Ready);
        info!(session_id = self.id, "local description ready");
        match self.pending.take() {
            Some(pending) => {
                if pending.send(Ok(text)).is_err() {
                    debug!(session_id = self.id, "requester went away before the description was ready");
                }
            }
            None => debug!(session_id = self.id, "no pending request for local description"),
        }
    }

    fn reoffer(&mut self) -> Option<String> {
        if self.state != SessionState::Ready {
            debug!(session_id = self.id, state = ?self.state, "cannot offer again");
            return None;
        }
        self.answer_deadline = Some(Instant::now() + self.ctx.cfg.answer_timeout);
        self.local_description.clone()
    }

    fn describe(&self, gathered: GatheredStream) -> Result<String, NegotiationError> {
        let preferred = preferred_candidate(&gathered.candidates)
            .map(|c| c.socket_addr())
            .ok_or_else(|| NegotiationError::Gathering("no primary host candidate".to_string()))?;
        let local = LocalDescription {
            credentials: gathered.credentials,
            fingerprint: self.ctx.fingerprint.clone(),
            preferred,
            candidates: gathered.candidates,
        };
        Ok(local.encode())
    }

    async fn apply_remote(&mut self, text: &str) -> Result<SessionState, NegotiationError> {
        match self.state {
            SessionState::Init | SessionState::Gathering => return Err(NegotiationError::NotReady),
            SessionState::Active => return Err(NegotiationError::AlreadyActive),
            SessionState::Closed => return Err(NegotiationError::Closed),
            SessionState::Ready | SessionState::Negotiating => {}
        }
        debug!(session_id = self.id, "processing remote description:\n{text}");
        let remote = RemoteDescription::decode(text)?;
        for skip in &remote.skipped {
            debug!(session_id = self.id, "remote candidate ignored: {skip}");
        }

        self.agent
            .set_remote_credentials(self.stream, &remote.credentials)
            .await
            .map_err(|e| NegotiationError::Agent(format!("{e:#}")))?;
        self.set_state(SessionState::Negotiating);

        for cand in &remote.candidates {
            match self.agent.add_remote_candidate(self.stream, cand).await {
                Ok(()) => self.remote_paths += 1,
                Err(e) => warn!(
                    session_id = self.id,
                    candidate = %cand.to_attribute(),
                    "remote candidate rejected: {e:#}"
                ),
            }
        }
        info!(
            session_id = self.id,
            applied = remote.candidates.len(),
            usable = self.remote_paths,
            "remote description applied"
        );

        if self.remote_paths > 0 {
            self.start_media().await?;
        }
        Ok(self.state)
    }

    async fn start_media(&mut self) -> Result<(), NegotiationError> {
        let channel = MediaChannel {
            session_id: self.id,
            agent: self.agent.clone(),
            stream: self.stream,
            component: ComponentId::Primary,
            codec: CodecParams::default(),
            connect_timeout: self.ctx.cfg.answer_timeout,
            faults: FaultSink::new(self.id, self.events.clone()),
        };
        match self.ctx.engine.start(channel).await {
            Ok(media) => {
                self.media = Some(media);
                self.answer_deadline = None;
                self.set_state(SessionState::Active);
                info!(session_id = self.id, "media engine started");
                Ok(())
            }
            Err(e) => {
                let err = NegotiationError::Media(format!("{e:#}"));
                error!(session_id = self.id, "{err}");
                self.close("media engine failed to start").await;
                Err(err)
            }
        }
    }

    async fn fail(&mut self, err: NegotiationError) {
        warn!(session_id = self.id, "negotiation failed: {err}");
        if let Some(pending) = self.pending.take() {
            let _ = pending.send(Err(err));
        }
        self.close("negotiation failed").await;
    }

    async fn close(&mut self, reason: &str) {
        if self.state == SessionState::Closed {
            return;
        }
        info!(session_id = self.id, from = ?self.state, reason, "closing session");
        self.answer_deadline = None;
        if let Some(task) = self.gathering.take() {
            task.cancel();
        }
        if let Some(pending) = self.pending.take() {
            let _ = pending.send(Err(NegotiationError::Closed));
        }
        if let Some(media) = self.media.take() {
            if let Err(e) = media.stop().await {
                warn!(session_id = self.id, "media engine stop: {e:#}");
            }
        }
        if let Err(e) = self.agent.remove_stream(self.stream).await {
            warn!(session_id = self.id, "remove stream: {e:#}");
        }
        if let Err(e) = self.agent.close().await {
            warn!(session_id = self.id, "close agent: {e:#}");
        }
        unregister(&self.ctx.registry, self.id).await;
        self.set_state(SessionState::Closed);
    }
}
