/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use mesia_protocol::{Candidate, ComponentId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::agent::{ConnectivityAgent, GatheredStream, StreamHandle};

#[derive(Debug)]
pub enum GatheringOutcome {
    Complete(GatheredStream),
    Failed(String),
    TimedOut(Duration),
}

/// An in-flight gathering pass. Dropping it cancels the probe.
pub struct GatheringTask {
    handle: JoinHandle<()>,
}

impl GatheringTask {
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for GatheringTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Starts gathering on its own task. `on_complete` runs at most once, on that
/// task, with the whole batch; it does not run if the task is cancelled first.
pub fn start_gathering<F>(
    agent: Arc<dyn ConnectivityAgent>,
    stream: StreamHandle,
    deadline: Duration,
    on_complete: F,
) -> GatheringTask
where
    F: FnOnce(GatheringOutcome) + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let outcome = match tokio::time::timeout(deadline, agent.gather(stream)).await {
            Ok(Ok(gathered)) => {
                debug!(
                    stream = stream.id,
                    candidates = gathered.candidates.len(),
                    "candidate gathering done"
                );
                GatheringOutcome::Complete(gathered)
            }
            Ok(Err(e)) => GatheringOutcome::Failed(format!("{e:#}")),
            Err(_) => GatheringOutcome::TimedOut(deadline),
        };
        on_complete(outcome);
    });
    GatheringTask { handle }
}

/// Highest-priority primary-component candidate; the first one wins a tie.
pub fn preferred_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    for cand in candidates.iter().filter(|c| c.component == ComponentId::Primary) {
        match best {
            Some(b) if b.priority >= cand.priority => {}
            _ => best = Some(cand),
        }
    }
    best
}
