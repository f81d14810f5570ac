/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::fmt;
use std::net::{IpAddr, SocketAddr};

pub mod fingerprint;
pub mod sdp;

pub use fingerprint::{fingerprint, format_fingerprint};
pub use sdp::{DecodeError, LocalDescription, RemoteDescription};

/// Longest foundation accepted on either side of the exchange.
pub const MAX_FOUNDATION_LEN: usize = 32;

/// Component of the single media stream. Primary carries media, control carries RTCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentId {
    Primary,
    Control,
}

impl ComponentId {
    pub const ALL: [ComponentId; 2] = [ComponentId::Primary, ComponentId::Control];

    pub fn as_u16(self) -> u16 {
        match self {
            ComponentId::Primary => 1,
            ComponentId::Control => 2,
        }
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(ComponentId::Primary),
            2 => Some(ComponentId::Control),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A UDP host candidate. No other transport or candidate type exists in this protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub foundation: String,
    pub component: ComponentId,
    pub priority: u32,
    pub address: IpAddr,
    pub port: u16,
}

impl Candidate {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// `candidate:<foundation> <component> UDP <priority> <address> <port> typ host`
    pub fn to_attribute(&self) -> String {
        format!(
            "candidate:{} {} UDP {} {} {} typ host",
            self.foundation, self.component, self.priority, self.address, self.port
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ufrag: String,
    pub pwd: String,
}

impl Credentials {
    pub fn new(ufrag: impl Into<String>, pwd: impl Into<String>) -> Self {
        Self {
            ufrag: ufrag.into(),
            pwd: pwd.into(),
        }
    }
}

/// Characters allowed in credentials and foundations (the base64 alphabet, no padding).
pub fn is_ice_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '/'
}

pub fn is_ice_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_ice_char)
}
