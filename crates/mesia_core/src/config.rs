/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::time::Duration;

/// Per-session deadlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationConfig {
    /// How long gathering may run before the pending response gets a timeout.
    pub gather_timeout: Duration,
    /// How long a session with a local description waits for a usable remote one.
    pub answer_timeout: Duration,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            gather_timeout: Duration::from_secs(10),
            answer_timeout: Duration::from_secs(60),
        }
    }
}
