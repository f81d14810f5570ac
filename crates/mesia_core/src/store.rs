/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::agent::{AgentFactory, STREAM_COMPONENTS};
use crate::config::NegotiationConfig;
use crate::error::StoreError;
use crate::media::MediaEngine;
use crate::session::{PendingResponse, Session, SessionContext, SessionHandle};

/// Random draws attempted before giving up on finding a free session id.
pub const MAX_ID_DRAWS: usize = 16;

pub(crate) struct Registry {
    sessions: HashMap<i64, SessionHandle>,
    rng: Box<dyn RngCore + Send>,
}

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

#[cfg(test)]
pub(crate) fn new_registry() -> SharedRegistry {
    registry_with_rng(Box::new(StdRng::from_entropy()))
}

fn registry_with_rng(rng: Box<dyn RngCore + Send>) -> SharedRegistry {
    Arc::new(Mutex::new(Registry {
        sessions: HashMap::new(),
        rng,
    }))
}

pub(crate) async fn unregister(registry: &SharedRegistry, id: i64) {
    if registry.lock().await.sessions.remove(&id).is_some() {
        debug!(session_id = id, "session unregistered");
    }
}

impl Registry {
    // 0 is what the cookie parser yields for "no session", so it is never handed out.
    fn draw_id(&mut self) -> Option<i64> {
        for _ in 0..MAX_ID_DRAWS {
            let id: i64 = self.rng.gen();
            if id != 0 && !self.sessions.contains_key(&id) {
                return Some(id);
            }
        }
        None
    }
}

/// Live sessions keyed by the id carried in the client's cookie.
pub struct SessionStore {
    factory: Arc<dyn AgentFactory>,
    ctx: Arc<SessionContext>,
    registry: SharedRegistry,
}

impl SessionStore {
    pub fn new(
        factory: Arc<dyn AgentFactory>,
        engine: Arc<dyn MediaEngine>,
        fingerprint: String,
        cfg: NegotiationConfig,
    ) -> Self {
        Self::with_rng(factory, engine, fingerprint, cfg, Box::new(StdRng::from_entropy()))
    }

    /// Same as [`SessionStore::new`] with a caller-supplied id source.
    pub fn with_rng(
        factory: Arc<dyn AgentFactory>,
        engine: Arc<dyn MediaEngine>,
        fingerprint: String,
        cfg: NegotiationConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let registry = registry_with_rng(rng);
        let ctx = Arc::new(SessionContext {
            fingerprint,
            engine,
            cfg,
            registry: registry.clone(),
        });
        Self {
            factory,
            ctx,
            registry,
        }
    }

    /// Creates a session with a fresh id and starts gathering for it.
    ///
    /// `pending` is answered with the encoded local description, or with the
    /// error that ended the session first.
    pub async fn create_session(&self, pending: Option<PendingResponse>) -> Result<SessionHandle, StoreError> {
        let agent = self
            .factory
            .create()
            .await
            .map_err(|e| StoreError::Agent(format!("{e:#}")))?;
        let stream = match agent.add_stream(STREAM_COMPONENTS).await {
            Ok(s) => s,
            Err(e) => {
                let _ = agent.close().await;
                return Err(StoreError::Agent(format!("add stream: {e:#}")));
            }
        };

        let mut guard = self.registry.lock().await;
        let Some(id) = guard.draw_id() else {
            drop(guard);
            warn!("session id space exhausted after {MAX_ID_DRAWS} draws");
            let _ = agent.remove_stream(stream).await;
            let _ = agent.close().await;
            return Err(StoreError::IdSpaceExhausted(MAX_ID_DRAWS));
        };
        let handle = Session::spawn(id, agent, stream, pending, self.ctx.clone());
        guard.sessions.insert(id, handle.clone());
        let live = guard.sessions.len();
        drop(guard);

        info!(session_id = id, live, "session created");
        Ok(handle)
    }

    pub async fn lookup(&self, id: i64) -> Option<SessionHandle> {
        self.registry.lock().await.sessions.get(&id).cloned()
    }

    /// Closes the session and forgets it. Unknown ids are ignored.
    pub async fn remove(&self, id: i64) {
        let handle = self.registry.lock().await.sessions.remove(&id);
        match handle {
            Some(h) => h.close().await,
            None => debug!(session_id = id, "remove: no such session"),
        }
    }

    pub async fn len(&self) -> usize {
        self.registry.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Closes every live session; used on shutdown.
    pub async fn close_all(&self) {
        let handles = {
            let mut guard = self.registry.lock().await;
            guard.sessions.drain().map(|(_, h)| h).collect::<Vec<_>>()
        };
        if !handles.is_empty() {
            info!(count = handles.len(), "closing all sessions");
        }
        for h in handles {
            h.close().await;
        }
    }
}
