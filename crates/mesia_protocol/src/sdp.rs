/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Session-description text exchanged between the page and the server.
//!
//! The local side always emits one bundled VP8 video section followed by every
//! gathered host candidate. The remote side is read with a line tokenizer that
//! only understands the ICE credential and candidate attributes; everything
//! else in a browser answer is ignored.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::{is_ice_token, Candidate, ComponentId, Credentials, MAX_FOUNDATION_LEN};

pub const ORIGIN_SESSION_ID: &str = "2750483185";
pub const VIDEO_PAYLOAD_TYPE: u8 = 96;
pub const VIDEO_RTPMAP: &str = "VP8/90000";
pub const MEDIA_ID: &str = "video";

const UFRAG_ATTR: &str = "ice-ufrag";
const PWD_ATTR: &str = "ice-pwd";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("remote description has no a=ice-ufrag line")]
    MissingUfrag,
    #[error("remote description has no a=ice-pwd line")]
    MissingPwd,
    #[error("remote description carries conflicting a={attribute} values")]
    ConflictingCredential { attribute: &'static str },
    #[error("a={attribute} value is outside the base64 alphabet")]
    InvalidCredential { attribute: &'static str },
}

/// Why a candidate line was left out of a decoded description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CandidateSkip {
    #[error("malformed candidate line")]
    Malformed,
    #[error("unknown component {0}")]
    UnknownComponent(u16),
    #[error("unsupported transport {0}")]
    UnsupportedTransport(String),
    #[error("unsupported candidate type {0}")]
    UnsupportedType(String),
    #[error("address {0} is not an IP literal")]
    UnresolvedAddress(String),
}

/// Everything needed to render the offer sent to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDescription {
    pub credentials: Credentials,
    pub fingerprint: String,
    /// Endpoint named by the origin, media and connection lines.
    pub preferred: SocketAddr,
    pub candidates: Vec<Candidate>,
}

impl LocalDescription {
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LocalDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.preferred.ip();
        let family = address_family(addr);

        write!(f, "v=0\r\n")?;
        write!(f, "o=- {ORIGIN_SESSION_ID} 0 IN {family} {addr}\r\n")?;
        write!(f, "s=\r\n")?;
        write!(f, "t=0 0\r\n")?;
        write!(f, "a={UFRAG_ATTR}:{}\r\n", self.credentials.ufrag)?;
        write!(f, "a={PWD_ATTR}:{}\r\n", self.credentials.pwd)?;
        write!(f, "a=fingerprint:sha-256 {}\r\n", self.fingerprint)?;
        write!(f, "a=group:BUNDLE {MEDIA_ID}\r\n")?;
        write!(f, "m={MEDIA_ID} {} RTP/SAVPF {VIDEO_PAYLOAD_TYPE}\r\n", self.preferred.port())?;
        write!(f, "c=IN {family} {addr}\r\n")?;
        write!(f, "a=rtpmap:{VIDEO_PAYLOAD_TYPE} {VIDEO_RTPMAP}\r\n")?;
        write!(f, "a=sendrecv\r\n")?;
        write!(f, "a=mid:{MEDIA_ID}\r\n")?;
        write!(f, "a=rtcp-mux\r\n")?;
        for cand in &self.candidates {
            write!(f, "a={}\r\n", cand.to_attribute())?;
        }
        Ok(())
    }
}

fn address_family(addr: IpAddr) -> &'static str {
    match addr {
        IpAddr::V4(_) => "IP4",
        IpAddr::V6(_) => "IP6",
    }
}

/// Credentials and usable paths extracted from the peer's description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescription {
    pub credentials: Credentials,
    pub candidates: Vec<Candidate>,
    /// Candidate lines present in the text but not usable here.
    pub skipped: Vec<CandidateSkip>,
}

impl RemoteDescription {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let mut ufrag = CredentialSlot::new(UFRAG_ATTR);
        let mut pwd = CredentialSlot::new(PWD_ATTR);
        let mut candidates = Vec::new();
        let mut skipped = Vec::new();

        for line in tokenize(text) {
            match line {
                SdpLine::IceUfrag(v) => ufrag.fill(v)?,
                SdpLine::IcePwd(v) => pwd.fill(v)?,
                SdpLine::Candidate(Ok(c)) => candidates.push(c),
                SdpLine::Candidate(Err(skip)) => skipped.push(skip),
                SdpLine::Other => {}
            }
        }

        let ufrag = ufrag.value.ok_or(DecodeError::MissingUfrag)?;
        let pwd = pwd.value.ok_or(DecodeError::MissingPwd)?;
        Ok(Self {
            credentials: Credentials { ufrag, pwd },
            candidates,
            skipped,
        })
    }
}

enum SdpLine<'a> {
    IceUfrag(&'a str),
    IcePwd(&'a str),
    Candidate(Result<Candidate, CandidateSkip>),
    Other,
}

fn tokenize(text: &str) -> impl Iterator<Item = SdpLine<'_>> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .map(classify)
}

fn classify(line: &str) -> SdpLine<'_> {
    let Some(attr) = line.strip_prefix("a=") else {
        return SdpLine::Other;
    };
    if let Some(v) = attr.strip_prefix("ice-ufrag:") {
        return SdpLine::IceUfrag(v);
    }
    if let Some(v) = attr.strip_prefix("ice-pwd:") {
        return SdpLine::IcePwd(v);
    }
    if let Some(v) = attr.strip_prefix("candidate:") {
        return SdpLine::Candidate(parse_candidate(v));
    }
    SdpLine::Other
}

struct CredentialSlot {
    attribute: &'static str,
    value: Option<String>,
}

impl CredentialSlot {
    fn new(attribute: &'static str) -> Self {
        Self { attribute, value: None }
    }

    // Bundled answers repeat the pair once per media section; only identical repeats are accepted.
    fn fill(&mut self, v: &str) -> Result<(), DecodeError> {
        if !is_ice_token(v) {
            return Err(DecodeError::InvalidCredential { attribute: self.attribute });
        }
        match &self.value {
            Some(prev) if prev != v => Err(DecodeError::ConflictingCredential { attribute: self.attribute }),
            Some(_) => Ok(()),
            None => {
                self.value = Some(v.to_string());
                Ok(())
            }
        }
    }
}

/// Parses the value of an `a=candidate:` attribute (the text after the colon).
///
/// Grammar: `<foundation> <component> udp <priority> <address> <port> typ host`,
/// optionally followed by extension name/value pairs such as `generation 0`.
pub fn parse_candidate(value: &str) -> Result<Candidate, CandidateSkip> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 8 || (parts.len() - 8) % 2 != 0 {
        return Err(CandidateSkip::Malformed);
    }

    let foundation = parts[0];
    if !is_ice_token(foundation) || foundation.len() > MAX_FOUNDATION_LEN {
        return Err(CandidateSkip::Malformed);
    }
    let component_raw: u16 = parts[1].parse().map_err(|_| CandidateSkip::Malformed)?;
    let component = ComponentId::from_u16(component_raw).ok_or(CandidateSkip::UnknownComponent(component_raw))?;
    if !matches!(parts[2], "udp" | "UDP") {
        return Err(CandidateSkip::UnsupportedTransport(parts[2].to_string()));
    }
    let priority: u32 = parts[3].parse().map_err(|_| CandidateSkip::Malformed)?;
    let address: IpAddr = parts[4]
        .parse()
        .map_err(|_| CandidateSkip::UnresolvedAddress(parts[4].to_string()))?;
    let port: u16 = parts[5].parse().map_err(|_| CandidateSkip::Malformed)?;
    if parts[6] != "typ" {
        return Err(CandidateSkip::Malformed);
    }
    if parts[7] != "host" {
        return Err(CandidateSkip::UnsupportedType(parts[7].to_string()));
    }

    Ok(Candidate {
        foundation: foundation.to_string(),
        component,
        priority,
        address,
        port,
    })
}
