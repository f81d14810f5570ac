/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod agent;
pub mod cert;
pub mod config;
pub mod error;
pub mod gatherer;
pub mod ice;
pub mod media;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{AgentFactory, ConnectivityAgent, GatheredStream, StreamHandle};
pub use config::NegotiationConfig;
pub use error::{NegotiationError, StoreError};
pub use session::{PendingResponse, SessionHandle, SessionState};
pub use store::SessionStore;
