//! HTTP Server
//!
//! Site routes on axum: homepage routing by segment, the view switch,
//! cached landing pages and API, geo detection, and health.

use super::cache_layer::{wrap, CachedRoute};
use super::geo_layer::{geo_middleware, FORCE_VIEW_COOKIE};
use crate::application::{GeoClassifier, ResponseCache};
use crate::domain::entities::RequestGeoContext;
use crate::domain::value_objects::{Locale, Segment};
use crate::infrastructure::shutdown_signal;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Cache-Control for responses that must never be stored anywhere.
pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate, max-age=0, private";

/// Lifetime of the view preference cookie.
pub const FORCE_VIEW_MAX_AGE: time::Duration = time::Duration::days(365);

/// Route-level settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// When false the homepage always routes to the GLOBAL landing page
    pub geo_detection: bool,
    /// Mark the view cookie `Secure`
    pub secure_cookies: bool,
    pub page_ttl: Duration,
    pub api_ttl: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            geo_detection: true,
            secure_cookies: true,
            page_ttl: Duration::from_secs(1800),
            api_ttl: Duration::from_secs(900),
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct HttpState {
    pub classifier: Arc<GeoClassifier>,
    pub cache: ResponseCache,
    pub settings: Arc<HttpSettings>,
}

impl HttpState {
    pub fn new(classifier: Arc<GeoClassifier>, cache: ResponseCache, settings: HttpSettings) -> Self {
        Self {
            classifier,
            cache,
            settings: Arc::new(settings),
        }
    }
}

/// Geo detection response.
#[derive(Debug, Serialize)]
pub struct GeoDetectResponse {
    pub country_code: String,
    pub visitor_type: Segment,
    pub default_language: Locale,
    pub override_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cache: String,
}

#[derive(Debug, Deserialize)]
pub struct DetectQuery {
    #[serde(default)]
    pub debug: Option<String>,
}

/// Build the application router.
pub fn router(state: HttpState) -> Router {
    let page_ttl = state.settings.page_ttl;
    let api_ttl = state.settings.api_ttl;

    Router::new()
        .route("/", get(homepage_handler))
        .route("/set-view/:view", get(set_view_handler))
        .route(
            "/en/",
            wrap(
                state.cache.clone(),
                CachedRoute::page("home-en", page_ttl),
                landing_en_handler,
            ),
        )
        .route(
            "/tr/",
            wrap(
                state.cache.clone(),
                CachedRoute::page("home-tr", page_ttl),
                landing_tr_handler,
            ),
        )
        .route(
            "/api/v1/settings",
            wrap(
                state.cache.clone(),
                CachedRoute::api("settings", api_ttl),
                settings_handler,
            ),
        )
        .route("/api/v1/geo/detect", get(detect_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), geo_middleware)),
        )
        .with_state(state)
}

/// HTTP server.
pub struct HttpServer {
    listen_addr: String,
    state: HttpState,
}

impl HttpServer {
    pub fn new(listen_addr: String, state: HttpState) -> Self {
        Self { listen_addr, state }
    }

    /// Run until a shutdown signal arrives.
    ///
    /// Excluded from coverage since it only returns on a signal.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!(
            "listening on {} (cache substrate: {})",
            self.listen_addr,
            self.state.cache.mode()
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("server stopped");
        Ok(())
    }
}

// Handler functions

fn redirect(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location), (header::CACHE_CONTROL, NO_CACHE)],
    )
        .into_response()
}

async fn homepage_handler(
    State(state): State<HttpState>,
    Extension(ctx): Extension<RequestGeoContext>,
) -> Response {
    let segment = if state.settings.geo_detection {
        ctx.segment
    } else {
        Segment::Global
    };
    tracing::debug!(segment = %segment, "homepage redirect");
    redirect(segment.landing_path())
}

async fn set_view_handler(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path(view): Path<String>,
) -> Response {
    let Some(segment) = Segment::parse(&view) else {
        return (StatusCode::BAD_REQUEST, "invalid view").into_response();
    };

    tracing::info!(segment = %segment, "view preference set");

    (
        jar.add(view_cookie(segment, state.settings.secure_cookies)),
        redirect(segment.landing_path()),
    )
        .into_response()
}

/// Create the sticky view preference cookie.
fn view_cookie(segment: Segment, secure: bool) -> Cookie<'static> {
    Cookie::build((FORCE_VIEW_COOKIE, segment.as_str().to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(FORCE_VIEW_MAX_AGE)
        .build()
}

fn landing_page(locale: Locale, ctx: &RequestGeoContext) -> Html<String> {
    let (title, tagline, switch_label, switch_to) = match locale {
        Locale::En => (
            "Unlock the Turkish Market",
            "Your authorized distribution partner in Turkey",
            "Türkçe görünüm",
            Segment::Local,
        ),
        Locale::Tr => (
            "Türkiye'nin Dağıtım Ortağı",
            "Markanızı Türkiye pazarına taşıyoruz",
            "Global view",
            Segment::Global,
        ),
    };

    Html(format!(
        "<!doctype html>\n<html lang=\"{lang}\">\n<head><title>{title}</title></head>\n<body data-segment=\"{segment}\">\n<h1>{title}</h1>\n<p>{tagline}</p>\n<a href=\"/set-view/{switch}\">{switch_label}</a>\n</body>\n</html>\n",
        lang = locale.as_str(),
        title = title,
        segment = ctx.segment,
        tagline = tagline,
        switch = switch_to.as_str(),
        switch_label = switch_label,
    ))
}

async fn landing_en_handler(Extension(ctx): Extension<RequestGeoContext>) -> Html<String> {
    landing_page(Locale::En, &ctx)
}

async fn landing_tr_handler(Extension(ctx): Extension<RequestGeoContext>) -> Html<String> {
    landing_page(Locale::Tr, &ctx)
}

async fn settings_handler(Extension(ctx): Extension<RequestGeoContext>) -> impl IntoResponse {
    let (site_name, contact_email) = match ctx.segment {
        Segment::Local => ("LOXTR Türkiye", "info@loxtr.com"),
        Segment::Global => ("LOXTR", "partners@loxtr.com"),
    };
    Json(serde_json::json!({
        "site_name": site_name,
        "contact_email": contact_email,
        "default_language": ctx.locale,
        "visitor_type": ctx.segment,
    }))
}

async fn detect_handler(
    Extension(ctx): Extension<RequestGeoContext>,
    Query(query): Query<DetectQuery>,
) -> impl IntoResponse {
    let ip_address = match query.debug.as_deref() {
        Some("true") => Some(ctx.client_ip.to_string()),
        _ => None,
    };

    let response = GeoDetectResponse {
        country_code: ctx.country_code.as_str().to_string(),
        visitor_type: ctx.segment,
        default_language: ctx.locale,
        override_applied: ctx.override_applied,
        ip_address,
    };
    ([(header::CACHE_CONTROL, NO_CACHE)], Json(response))
}

async fn health_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: state.cache.mode().to_string(),
    };
    Json(response)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::value_objects::CountryCode;

    fn ctx(segment: Segment) -> RequestGeoContext {
        RequestGeoContext {
            client_ip: "85.100.1.1".parse().unwrap(),
            country_code: CountryCode::new("TR"),
            segment,
            locale: Locale::for_segment(segment),
            override_applied: false,
        }
    }

    // ===== Settings Tests =====

    #[test]
    fn test_default_settings() {
        let settings = HttpSettings::default();
        assert!(settings.geo_detection);
        assert!(settings.secure_cookies);
        assert_eq!(settings.page_ttl, Duration::from_secs(1800));
        assert_eq!(settings.api_ttl, Duration::from_secs(900));
    }

    #[test]
    fn test_force_view_max_age_is_one_year() {
        assert_eq!(FORCE_VIEW_MAX_AGE.whole_seconds(), 31_536_000);
    }

    // ===== Cookie Tests =====

    #[test]
    fn test_view_cookie_attributes() {
        let cookie = view_cookie(Segment::Local, true);

        assert_eq!(cookie.name(), FORCE_VIEW_COOKIE);
        assert_eq!(cookie.value(), "LOCAL");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(FORCE_VIEW_MAX_AGE));
    }

    #[test]
    fn test_view_cookie_not_secure_when_disabled() {
        let cookie = view_cookie(Segment::Global, false);
        assert!(!cookie.to_string().contains("Secure"));
    }

    // ===== Rendering Tests =====

    #[test]
    fn test_landing_page_language_and_switch() {
        let Html(en) = landing_page(Locale::En, &ctx(Segment::Global));
        assert!(en.contains("lang=\"en\""));
        assert!(en.contains("/set-view/LOCAL"));
        assert!(en.contains("data-segment=\"GLOBAL\""));

        let Html(tr) = landing_page(Locale::Tr, &ctx(Segment::Local));
        assert!(tr.contains("lang=\"tr\""));
        assert!(tr.contains("/set-view/GLOBAL"));
    }

    #[test]
    fn test_detect_response_omits_ip_by_default() {
        let response = GeoDetectResponse {
            country_code: "TR".to_string(),
            visitor_type: Segment::Local,
            default_language: Locale::Tr,
            override_applied: false,
            ip_address: None,
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["visitor_type"], "LOCAL");
        assert_eq!(json["default_language"], "tr");
        assert!(json.get("ip_address").is_none());
    }

    #[test]
    fn test_redirect_is_uncacheable_302() {
        let response = redirect("/tr/");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/tr/");
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), NO_CACHE);
    }
}
