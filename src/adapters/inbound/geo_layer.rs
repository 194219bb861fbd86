//! Geo Layer
//!
//! axum middleware that classifies every request exactly once and
//! attaches the resulting
//! [`RequestGeoContext`](crate::domain::entities::RequestGeoContext) to
//! request extensions.

use super::http_server::HttpState;
use crate::application::EDGE_COUNTRY_HEADER;
use crate::domain::entities::RequestSignals;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Sticky segment preference cookie.
pub const FORCE_VIEW_COOKIE: &str = "force_view";

pub const EDGE_CLIENT_IP_HEADER: &str = "cf-connecting-ip";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Classify the request, then make sure the response declares what it
/// varies on.
pub async fn geo_middleware(State(state): State<HttpState>, mut req: Request, next: Next) -> Response {
    let signals = extract_signals(&req);
    let ctx = state.classifier.classify(&signals).await;

    tracing::debug!(
        ip = %ctx.client_ip,
        country = %ctx.country_code,
        segment = %ctx.segment,
        override_applied = ctx.override_applied,
        "request classified"
    );

    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;
    merge_vary(response.headers_mut(), state.cache.vary());
    response
}

/// Collect the raw classification inputs from a request.
///
/// The peer address is taken from [`ConnectInfo`] when the server was
/// started with it, and is loopback otherwise.
pub fn extract_signals(req: &Request) -> RequestSignals {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let headers = req.headers();
    let jar = CookieJar::from_headers(headers);

    RequestSignals {
        peer,
        edge_client_ip: header_string(headers, EDGE_CLIENT_IP_HEADER),
        forwarded_for: header_string(headers, FORWARDED_FOR_HEADER),
        edge_country: header_string(headers, EDGE_COUNTRY_HEADER),
        override_view: jar.get(FORCE_VIEW_COOKIE).map(|c| c.value().to_string()),
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Add every token of `required` missing from the response's `Vary`.
pub fn merge_vary(headers: &mut HeaderMap, required: &str) {
    let mut tokens: Vec<String> = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let before = tokens.len();
    for wanted in required.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tokens.iter().any(|t| t.eq_ignore_ascii_case(wanted)) {
            tokens.push(wanted.to_string());
        }
    }
    if tokens.len() == before && headers.contains_key(header::VARY) {
        return;
    }

    match HeaderValue::from_str(&tokens.join(", ")) {
        Ok(value) => {
            headers.insert(header::VARY, value);
        }
        Err(e) => tracing::warn!(error = %e, "could not set Vary header"),
    }
}
