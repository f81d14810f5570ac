/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use mesia_protocol::sdp::CandidateSkip;
use mesia_protocol::{ComponentId, Credentials, LocalDescription, RemoteDescription};
use std::net::{IpAddr, SocketAddr};

// Shape of what a browser answers with, trimmed to one media section.
const BROWSER_ANSWER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE video\r\n\
a=msid-semantic: WMS\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=candidate:842163049 1 udp 1677729535 198.51.100.4 61234 typ srflx raddr 0.0.0.0 rport 0 generation 0 network-cost 999\r\n\
a=candidate:1467250027 1 udp 2122260223 192.168.1.44 61234 typ host generation 0 network-id 1\r\n\
a=candidate:1467250027 2 udp 2122260222 192.168.1.44 61235 typ host generation 0 network-id 1\r\n\
a=candidate:2999745851 1 udp 2122194687 fe80::1 61236 typ host generation 0\r\n\
a=candidate:3 1 udp 2122129151 8f2e4c3a-1b.local 61237 typ host generation 0\r\n\
a=ice-ufrag:Xk9/\r\n\
a=ice-pwd:q7W+fJ2mNcR4sZ1vY8bL0pTa\r\n\
a=ice-options:trickle\r\n\
a=fingerprint:sha-256 01:02:03\r\n\
a=setup:active\r\n\
a=mid:video\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:96 VP8/90000\r\n";

#[test]
fn browser_answer_yields_host_paths_only() {
    let remote = RemoteDescription::decode(BROWSER_ANSWER).unwrap();
    assert_eq!(remote.credentials, Credentials::new("Xk9/", "q7W+fJ2mNcR4sZ1vY8bL0pTa"));

    let endpoints: Vec<(ComponentId, SocketAddr)> = remote
        .candidates
        .iter()
        .map(|c| (c.component, c.socket_addr()))
        .collect();
    assert_eq!(
        endpoints,
        vec![
            (ComponentId::Primary, "192.168.1.44:61234".parse().unwrap()),
            (ComponentId::Control, "192.168.1.44:61235".parse().unwrap()),
            (ComponentId::Primary, "[fe80::1]:61236".parse().unwrap()),
        ]
    );
    assert_eq!(
        remote.skipped,
        vec![
            CandidateSkip::UnsupportedType("srflx".to_string()),
            CandidateSkip::UnresolvedAddress("8f2e4c3a-1b.local".to_string()),
        ]
    );
}

#[test]
fn ipv6_offer_survives_decoding() {
    let addr: IpAddr = "2001:db8::7".parse().unwrap();
    let candidates = vec![mesia_protocol::Candidate {
        foundation: "4".to_string(),
        component: ComponentId::Primary,
        priority: 2113937151,
        address: addr,
        port: 9000,
    }];
    let local = LocalDescription {
        credentials: Credentials::new("ufrag6", "password6password6password6"),
        fingerprint: mesia_protocol::fingerprint(b"cert"),
        preferred: SocketAddr::new(addr, 9000),
        candidates: candidates.clone(),
    };
    let text = local.encode();
    assert!(text.contains("o=- 2750483185 0 IN IP6 2001:db8::7\r\n"));
    assert!(text.contains("c=IN IP6 2001:db8::7\r\n"));

    let decoded = RemoteDescription::decode(&text).unwrap();
    assert_eq!(decoded.credentials, local.credentials);
    assert_eq!(decoded.candidates, candidates);
    assert!(decoded.skipped.is_empty());
}
