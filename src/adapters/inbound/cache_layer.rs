//! Cache Layer
//!
//! Opt-in read-through caching for individual routes. A route wrapped
//! with [`wrap`] is served through [`ResponseCache`] using the geo
//! context the geo layer attached to the request.

use crate::application::{CacheOutcome, ResponseCache};
use crate::domain::entities::{CacheKey, CachedResponse, RequestGeoContext};
use crate::domain::services::CacheKeyBuilder;
use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{Query, Request, State},
    handler::Handler,
    http::{HeaderName, HeaderValue, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
};
use std::time::Duration;

/// Diagnostic header reporting the cache outcome.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Largest handler body that will be buffered for caching.
const MAX_CACHED_BODY: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKind {
    Page,
    Api,
}

/// Caching scope of one route: logical name, TTL and key shape.
#[derive(Debug, Clone)]
pub struct CachedRoute {
    logical_name: String,
    ttl: Duration,
    kind: RouteKind,
}

impl CachedRoute {
    /// Whole-page caching: coarse key, no request parameters.
    pub fn page(name: &str, ttl: Duration) -> Self {
        Self {
            logical_name: format!("page:{}", name),
            ttl,
            kind: RouteKind::Page,
        }
    }

    /// API caching: key includes a digest of the query parameters.
    pub fn api(name: &str, ttl: Duration) -> Self {
        Self {
            logical_name: format!("api:{}", name),
            ttl,
            kind: RouteKind::Api,
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache key for a request to this route.
    pub fn key(&self, ctx: &RequestGeoContext, uri: &Uri) -> CacheKey {
        match self.kind {
            RouteKind::Page => {
                CacheKeyBuilder::for_context(&self.logical_name, ctx, std::iter::empty())
            }
            RouteKind::Api => {
                let digest = query_digest(uri);
                CacheKeyBuilder::for_context(
                    &self.logical_name,
                    ctx,
                    [("params", digest.as_str())],
                )
            }
        }
    }
}

fn query_digest(uri: &Uri) -> String {
    match Query::<Vec<(String, String)>>::try_from_uri(uri) {
        Ok(Query(pairs)) => {
            CacheKeyBuilder::digest(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        }
        // Unparsable query strings still get a stable key.
        Err(_) => CacheKeyBuilder::digest([("", uri.query().unwrap_or(""))]),
    }
}

#[derive(Clone)]
struct CacheScope {
    cache: ResponseCache,
    route: CachedRoute,
}

/// Wrap a GET handler with read-through caching.
///
/// The geo layer must run before the wrapped route; without a geo
/// context the handler runs uncached.
pub fn wrap<H, T, S>(cache: ResponseCache, route: CachedRoute, handler: H) -> MethodRouter<S>
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    get(handler).route_layer(middleware::from_fn_with_state(
        CacheScope { cache, route },
        cache_middleware,
    ))
}

async fn cache_middleware(State(scope): State<CacheScope>, req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<RequestGeoContext>().cloned() else {
        tracing::warn!(
            route = scope.route.logical_name(),
            "no geo context on request, serving uncached"
        );
        return next.run(req).await;
    };

    let key = scope.route.key(&ctx, req.uri());
    let served = scope
        .cache
        .serve(&key, scope.route.ttl(), move || async move {
            to_cached(next.run(req).await).await
        })
        .await;

    let (mut response, outcome) = match served {
        Ok((cached, outcome)) => (from_cached(cached), outcome),
        Err(passthrough) => (passthrough, CacheOutcome::Bypass),
    };
    response.headers_mut().insert(
        HeaderName::from_static(CACHE_STATUS_HEADER),
        HeaderValue::from_static(outcome.as_str()),
    );
    response
}

/// Buffer a handler response into its storable form.
///
/// Bodies of unknown length or larger than the buffering limit are not
/// touched; the response is handed back as `Err` to be sent as is.
pub async fn to_cached(response: Response) -> Result<CachedResponse, Response> {
    let fits = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_CACHED_BODY as u64);
    if !fits {
        tracing::debug!(
            lower = response.body().size_hint().lower(),
            "response body not bufferable, passing through"
        );
        return Err(response);
    }

    let (parts, body) = response.into_parts();
    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
        .collect();

    match to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => Ok(CachedResponse::new(
            parts.status.as_u16(),
            headers,
            bytes.to_vec(),
        )),
        // The handler's body stream itself failed; there is nothing left to pass on.
        Err(e) => {
            tracing::error!(error = %e, "failed to buffer handler body");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// Rebuild an HTTP response from a stored entry.
pub fn from_cached(cached: CachedResponse) -> Response {
    let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Body::from(cached.body)).into_response();

    let headers = response.headers_mut();
    headers.clear();
    for (name, value) in cached.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "skipping invalid cached header"),
        }
    }
    response
}
