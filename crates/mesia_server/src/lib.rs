/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod config;
pub mod page;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use mesia_core::{NegotiationError, SessionHandle, SessionStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span, warn};

pub const SESSION_COOKIE: &str = "id";
const MIME_TYPE: &str = "text/html";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub template_path: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(root))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                info_span!("http", method = %req.method(), uri = %req.uri())
            }),
        )
        .with_state(state)
}

async fn not_found(method: Method) -> Response {
    if method != Method::GET {
        return StatusCode::NOT_IMPLEMENTED.into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

async fn root(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if method != Method::GET {
        return StatusCode::NOT_IMPLEMENTED.into_response();
    }

    let existing = match session_cookie(&headers) {
        Some(id) => state.store.lookup(id).await,
        None => None,
    };
    let sdp = query.get("sdp").cloned();

    match (existing, sdp) {
        (Some(session), Some(sdp)) => apply_answer(&session, sdp).await,
        (Some(session), None) => match session.reoffer().await {
            Some(local) => {
                info!(session_id = session.id(), "offering ready session again for page reload");
                match tokio::fs::read_to_string(&state.template_path).await {
                    Ok(template) => page_response(session.id(), &template, &local),
                    Err(e) => {
                        error!(path = %state.template_path.display(), "template read failed: {e}");
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                }
            }
            None => {
                info!(session_id = session.id(), state = ?session.state(), "replacing session on page reload");
                state.store.remove(session.id()).await;
                serve_page(&state).await
            }
        },
        (None, _) => serve_page(&state).await,
    }
}

async fn apply_answer(session: &SessionHandle, sdp: String) -> Response {
    match session.apply_remote(sdp).await {
        Ok(next) => {
            info!(session_id = session.id(), state = ?next, "remote description accepted");
            html(StatusCode::OK, String::new())
        }
        Err(e) => {
            warn!(session_id = session.id(), "remote description rejected: {e}");
            html(StatusCode::NOT_ACCEPTABLE, String::new())
        }
    }
}

async fn serve_page(state: &AppState) -> Response {
    // Read before allocating so a missing template never leaves a session behind.
    let template = match tokio::fs::read_to_string(&state.template_path).await {
        Ok(t) => t,
        Err(e) => {
            error!(path = %state.template_path.display(), "template read failed: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let (tx, rx) = oneshot::channel();
    let session = match state.store.create_session(Some(tx)).await {
        Ok(s) => s,
        Err(e) => {
            error!("session create failed: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match rx.await {
        Ok(Ok(local)) => page_response(session.id(), &template, &local),
        Ok(Err(e)) => {
            warn!(session_id = session.id(), "no local description: {e}");
            status_for(&e).into_response()
        }
        Err(_) => {
            debug!(session_id = session.id(), "session dropped the pending response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn page_response(id: i64, template: &str, local: &str) -> Response {
    let mut resp = html(StatusCode::OK, page::render_page(template, local));
    if let Ok(v) = HeaderValue::from_str(&format!("{SESSION_COOKIE}={id}; Path=/")) {
        resp.headers_mut().insert(header::SET_COOKIE, v);
    }
    resp
}

fn html(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, MIME_TYPE)], body).into_response()
}

fn status_for(err: &NegotiationError) -> StatusCode {
    match err {
        NegotiationError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        NegotiationError::Decode(_)
        | NegotiationError::NotReady
        | NegotiationError::AlreadyActive
        | NegotiationError::Closed => StatusCode::NOT_ACCEPTABLE,
        NegotiationError::Gathering(_) | NegotiationError::Agent(_) | NegotiationError::Media(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Session id from the `id` cookie. Zero and unparsable values mean no session.
pub fn session_cookie(headers: &HeaderMap) -> Option<i64> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE)
        .find_map(|(_, value)| value.trim().parse::<i64>().ok().filter(|id| *id != 0))
}
