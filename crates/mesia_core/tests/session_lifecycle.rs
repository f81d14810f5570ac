/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use mesia_core::testing::{
    default_candidates, host_candidate, FakeAgentFactory, FakeMediaEngine, GatherScript, FAKE_PWD, FAKE_UFRAG,
};
use mesia_core::media::LoopbackMediaEngine;
use mesia_core::{NegotiationConfig, NegotiationError, SessionHandle, SessionState, SessionStore};
use mesia_protocol::{ComponentId, Credentials, DecodeError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

const FINGERPRINT: &str = "AB:CD:EF";
const REMOTE: &str = "v=0\r\n\
o=- 1 0 IN IP4 10.0.0.9\r\n\
s=\r\n\
t=0 0\r\n\
a=ice-ufrag:peerufrag\r\n\
a=ice-pwd:peerpasswordpeerpassword\r\n\
m=video 9 RTP/SAVPF 96\r\n\
a=candidate:3 1 udp 2122260223 10.0.0.9 50000 typ host\r\n\
a=candidate:3 2 udp 2122260222 10.0.0.9 50001 typ host\r\n";

struct Harness {
    factory: Arc<FakeAgentFactory>,
    engine: Arc<FakeMediaEngine>,
    store: SessionStore,
}

fn harness_with(factory: FakeAgentFactory, engine: FakeMediaEngine, cfg: NegotiationConfig) -> Harness {
    let factory = Arc::new(factory);
    let engine = Arc::new(engine);
    let store = SessionStore::new(factory.clone(), engine.clone(), FINGERPRINT.to_string(), cfg);
    Harness {
        factory,
        engine,
        store,
    }
}

fn harness(script: GatherScript) -> Harness {
    harness_with(
        FakeAgentFactory::new(script),
        FakeMediaEngine::default(),
        NegotiationConfig::default(),
    )
}

async fn ready_session(h: &Harness) -> (SessionHandle, String) {
    let (tx, rx) = oneshot::channel();
    let handle = h.store.create_session(Some(tx)).await.unwrap();
    let local = rx.await.unwrap().unwrap();
    (handle, local)
}

#[tokio::test]
async fn page_request_yields_local_description() {
    let h = harness(GatherScript::Immediate(default_candidates()));
    let (handle, local) = ready_session(&h).await;

    assert!(local.starts_with("v=0\r\no=- 2750483185 0 IN IP4 192.168.1.10\r\n"));
    assert!(local.contains(&format!("a=ice-ufrag:{FAKE_UFRAG}\r\n")));
    assert!(local.contains(&format!("a=ice-pwd:{FAKE_PWD}\r\n")));
    assert!(local.contains(&format!("a=fingerprint:sha-256 {FINGERPRINT}\r\n")));
    assert!(local.contains("m=video 40000 RTP/SAVPF 96\r\n"));
    assert!(local.ends_with("a=candidate:1 2 UDP 2130706430 192.168.1.10 40001 typ host\r\n"));

    assert_eq!(handle.state(), SessionState::Ready);
    assert_eq!(handle.local_description().await.as_deref(), Some(local.as_str()));
    assert_eq!(h.store.lookup(handle.id()).await.map(|s| s.id()), Some(handle.id()));
}

#[tokio::test]
async fn remote_description_activates_media() {
    let h = harness(GatherScript::Immediate(default_candidates()));
    let (handle, _) = ready_session(&h).await;

    assert_eq!(handle.apply_remote(REMOTE).await, Ok(SessionState::Active));
    assert_eq!(handle.state(), SessionState::Active);
    assert_eq!(h.engine.started(), 1);

    let agent = &h.factory.agents()[0];
    let snap = agent.snapshot();
    assert_eq!(
        snap.remote_credentials,
        Some(Credentials::new("peerufrag", "peerpasswordpeerpassword"))
    );
    assert_eq!(snap.remote_candidates.len(), 2);
    assert_eq!(snap.remote_candidates[1].component, ComponentId::Control);

    assert_eq!(handle.apply_remote(REMOTE).await, Err(NegotiationError::AlreadyActive));
    assert_eq!(h.engine.started(), 1);
}

#[tokio::test]
async fn malformed_remote_leaves_session_ready() {
    let h = harness(GatherScript::Immediate(default_candidates()));
    let (handle, _) = ready_session(&h).await;

    let res = handle.apply_remote("v=0\r\na=ice-pwd:abcdef\r\n").await;
    assert_eq!(res, Err(NegotiationError::Decode(DecodeError::MissingUfrag)));
    assert_eq!(handle.state(), SessionState::Ready);
    assert!(h.factory.agents()[0].snapshot().remote_credentials.is_none());

    assert_eq!(handle.apply_remote(REMOTE).await, Ok(SessionState::Active));
}

#[tokio::test]
async fn remote_without_candidates_waits_for_more() {
    let h = harness(GatherScript::Immediate(default_candidates()));
    let (handle, _) = ready_session(&h).await;

    let bare = "a=ice-ufrag:peerufrag\r\na=ice-pwd:peerpasswordpeerpassword\r\n";
    assert_eq!(handle.apply_remote(bare).await, Ok(SessionState::Negotiating));
    assert_eq!(h.engine.started(), 0);

    assert_eq!(handle.apply_remote(REMOTE).await, Ok(SessionState::Active));
    assert_eq!(h.engine.started(), 1);
}

#[tokio::test]
async fn refused_candidates_do_not_start_media() {
    let h = harness_with(
        FakeAgentFactory::new(GatherScript::Immediate(default_candidates())).rejecting_candidates(),
        FakeMediaEngine::default(),
        NegotiationConfig::default(),
    );
    let (handle, _) = ready_session(&h).await;
    assert_eq!(handle.apply_remote(REMOTE).await, Ok(SessionState::Negotiating));
    assert_eq!(h.engine.started(), 0);
}

#[tokio::test]
async fn remote_before_gathering_completes_is_not_ready() {
    let gate = Arc::new(Notify::new());
    let h = harness(GatherScript::Gate(gate.clone(), default_candidates()));
    let (tx, rx) = oneshot::channel();
    let handle = h.store.create_session(Some(tx)).await.unwrap();

    assert_eq!(handle.apply_remote(REMOTE).await, Err(NegotiationError::NotReady));
    assert_eq!(handle.state(), SessionState::Gathering);
    assert_eq!(handle.local_description().await, None);

    gate.notify_one();
    assert!(rx.await.unwrap().is_ok());
    assert_eq!(handle.apply_remote(REMOTE).await, Ok(SessionState::Active));
}

#[tokio::test]
async fn gathering_timeout_fails_request_and_forgets_session() {
    let h = harness_with(
        FakeAgentFactory::new(GatherScript::Never),
        FakeMediaEngine::default(),
        NegotiationConfig {
            gather_timeout: Duration::from_millis(30),
            ..NegotiationConfig::default()
        },
    );
    let (tx, rx) = oneshot::channel();
    let handle = h.store.create_session(Some(tx)).await.unwrap();

    assert!(matches!(rx.await.unwrap(), Err(NegotiationError::Timeout(_))));
    handle.closed().await;
    assert!(h.store.lookup(handle.id()).await.is_none());
    assert!(h.factory.agents()[0].snapshot().closed);
}

#[tokio::test]
async fn gathering_failure_is_reported() {
    let h = harness(GatherScript::Fail("no usable interface".to_string()));
    let (tx, rx) = oneshot::channel();
    let handle = h.store.create_session(Some(tx)).await.unwrap();
    match rx.await.unwrap() {
        Err(NegotiationError::Gathering(msg)) => assert!(msg.contains("no usable interface")),
        other => panic!("unexpected {other:?}"),
    }
    handle.closed().await;
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn only_control_candidates_fail_gathering() {
    let h = harness(GatherScript::Immediate(vec![host_candidate(
        "9",
        ComponentId::Control,
        100,
        41000,
    )]));
    let (tx, rx) = oneshot::channel();
    let _handle = h.store.create_session(Some(tx)).await.unwrap();
    assert!(matches!(rx.await.unwrap(), Err(NegotiationError::Gathering(_))));
}

#[tokio::test]
async fn unanswered_session_expires() {
    let h = harness_with(
        FakeAgentFactory::new(GatherScript::Immediate(default_candidates())),
        FakeMediaEngine::default(),
        NegotiationConfig {
            answer_timeout: Duration::from_millis(40),
            ..NegotiationConfig::default()
        },
    );
    let (handle, _) = ready_session(&h).await;
    tokio::time::timeout(Duration::from_secs(5), handle.closed())
        .await
        .unwrap();
    assert_eq!(handle.state(), SessionState::Closed);
    assert!(h.store.is_empty().await);
    assert_eq!(handle.apply_remote(REMOTE).await, Err(NegotiationError::Closed));
}

#[tokio::test]
async fn media_fault_tears_session_down() {
    let h = harness(GatherScript::Immediate(default_candidates()));
    let (handle, _) = ready_session(&h).await;
    handle.apply_remote(REMOTE).await.unwrap();

    h.engine.fault(0, "decoder crashed");
    handle.closed().await;
    assert_eq!(h.engine.stopped(), 1);
    assert!(h.store.lookup(handle.id()).await.is_none());
    let snap = h.factory.agents()[0].snapshot();
    assert!(snap.closed);
    assert_eq!(snap.removed_streams, 1);
}

#[tokio::test]
async fn media_start_failure_closes_session() {
    let h = harness_with(
        FakeAgentFactory::new(GatherScript::Immediate(default_candidates())),
        FakeMediaEngine::failing(),
        NegotiationConfig::default(),
    );
    let (handle, _) = ready_session(&h).await;
    assert!(matches!(handle.apply_remote(REMOTE).await, Err(NegotiationError::Media(_))));
    assert_eq!(handle.state(), SessionState::Closed);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn close_releases_everything_once() {
    let h = harness(GatherScript::Immediate(default_candidates()));
    let (handle, _) = ready_session(&h).await;
    handle.apply_remote(REMOTE).await.unwrap();

    handle.close().await;
    handle.close().await;
    h.store.remove(handle.id()).await;

    assert_eq!(h.engine.stopped(), 1);
    assert_eq!(h.factory.agents()[0].snapshot().removed_streams, 1);
    assert_eq!(handle.local_description().await, None);
}

#[tokio::test]
async fn reoffer_restarts_answer_deadline() {
    let h = harness_with(
        FakeAgentFactory::new(GatherScript::Immediate(default_candidates())),
        FakeMediaEngine::default(),
        NegotiationConfig {
            answer_timeout: Duration::from_millis(400),
            ..NegotiationConfig::default()
        },
    );
    let (handle, local) = ready_session(&h).await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(handle.reoffer().await.as_deref(), Some(local.as_str()));
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(handle.state(), SessionState::Ready);

    tokio::time::timeout(Duration::from_secs(5), handle.closed())
        .await
        .unwrap();
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn reoffer_refused_once_active() {
    let h = harness(GatherScript::Immediate(default_candidates()));
    let (handle, _) = ready_session(&h).await;
    handle.apply_remote(REMOTE).await.unwrap();

    assert_eq!(handle.reoffer().await, None);
    assert_eq!(handle.state(), SessionState::Active);
    handle.close().await;
    assert_eq!(handle.reoffer().await, None);
}

#[tokio::test]
async fn stalled_connectivity_checks_close_active_session() {
    let factory = Arc::new(FakeAgentFactory::new(GatherScript::Immediate(default_candidates())).stalling_connect());
    let store = SessionStore::new(
        factory.clone(),
        Arc::new(LoopbackMediaEngine),
        FINGERPRINT.to_string(),
        NegotiationConfig {
            answer_timeout: Duration::from_millis(200),
            ..NegotiationConfig::default()
        },
    );
    let (tx, rx) = oneshot::channel();
    let handle = store.create_session(Some(tx)).await.unwrap();
    rx.await.unwrap().unwrap();

    assert_eq!(handle.apply_remote(REMOTE).await, Ok(SessionState::Active));
    tokio::time::timeout(Duration::from_secs(5), handle.closed())
        .await
        .unwrap();
    assert!(store.is_empty().await);
    let snap = factory.agents()[0].snapshot();
    assert!(snap.closed);
    assert_eq!(snap.removed_streams, 1);
}

#[tokio::test]
async fn failed_connectivity_checks_close_active_session() {
    let factory = Arc::new(FakeAgentFactory::new(GatherScript::Immediate(default_candidates())));
    let store = SessionStore::new(
        factory.clone(),
        Arc::new(LoopbackMediaEngine),
        FINGERPRINT.to_string(),
        NegotiationConfig::default(),
    );
    let (tx, rx) = oneshot::channel();
    let handle = store.create_session(Some(tx)).await.unwrap();
    rx.await.unwrap().unwrap();

    handle.apply_remote(REMOTE).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle.closed())
        .await
        .unwrap();
    assert!(store.is_empty().await);
}
