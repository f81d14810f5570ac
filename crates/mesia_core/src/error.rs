/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use mesia_protocol::DecodeError;
use std::time::Duration;

/// Errors a caller sees while driving a session. None of them is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    #[error("malformed remote description: {0}")]
    Decode(#[from] DecodeError),
    #[error("no local description has been produced yet")]
    NotReady,
    #[error("session is already active; renegotiation is not supported")]
    AlreadyActive,
    #[error("candidate gathering did not finish within {0:?}")]
    Timeout(Duration),
    #[error("candidate gathering failed: {0}")]
    Gathering(String),
    #[error("connectivity agent error: {0}")]
    Agent(String),
    #[error("media engine error: {0}")]
    Media(String),
    #[error("session closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no free session id after {0} draws")]
    IdSpaceExhausted(usize),
    #[error("connectivity agent setup failed: {0}")]
    Agent(String),
}
