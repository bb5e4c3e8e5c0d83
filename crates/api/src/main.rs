mod cache;
mod config;
mod metrics;
mod response;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use geo::Gazetteer;
use index::ElasticsearchBackend;
use matching::{MatchError, Matcher};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cache::{Cache, CacheStats};
use crate::config::AppConfig;
use crate::metrics::{Metrics, MetricsSnapshot, Outcome, TimedOperation};
use crate::response::{ErrorResponse, MatchingResponse};

struct AppState {
    matcher: Matcher,
    cache: Option<Cache>,
    metrics: Arc<Metrics>,
}

#[derive(Deserialize)]
struct MatchParams {
    affiliation: Option<String>,
    all_status: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    search: String,
}

#[derive(Serialize)]
struct MetricsResponse {
    profile: String,
    requests: MetricsSnapshot,
    cache: Option<CacheStats>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    let profile = config.matching_profile()?;

    let gazetteer = match &config.geo.cities_path {
        Some(path) => {
            let cities = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read city table {}", path))?;
            Gazetteer::with_cities(&cities)
        }
        None => Gazetteer::embedded(),
    }
    .context("Failed to load gazetteer")?;
    let gazetteer = Arc::new(gazetteer);
    let backend = ElasticsearchBackend::new(
        config.search.url.clone(),
        config.search.index.clone(),
        config.request_timeout(),
        config.retry.clone(),
    )
    .context("Failed to create search client")?;

    info!(
        profile = %profile.name,
        search_url = %config.search.url,
        index = %config.search.index,
        cache = config.cache.enabled,
        "Starting affiliation matcher"
    );

    let state = Arc::new(AppState {
        matcher: Matcher::new(Arc::new(backend), gazetteer, profile),
        cache: config.cache.enabled.then(|| Cache::new(config.cache.max_entries)),
        metrics: Metrics::new(),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!("Server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, router(state)).await.context("Server error")?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/organizations", get(match_organizations))
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `all_status` given bare or as "true" widens matching to every status.
fn active_only(all_status: Option<&str>) -> bool {
    !matches!(all_status.map(|v| v.trim().to_lowercase()).as_deref(), Some("" | "true"))
}

async fn match_organizations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MatchParams>,
) -> Result<Json<MatchingResponse>, ApiError> {
    let timer = TimedOperation::start();
    let active_only = active_only(params.all_status.as_deref());
    let affiliation = params.affiliation.unwrap_or_default();
    let profile = &state.matcher.profile().name;

    if let Some(cached) = state
        .cache
        .as_ref()
        .and_then(|c| c.get(profile, active_only, &affiliation))
    {
        state.metrics.record_cache_hit();
        let chosen = cached.items.first().is_some_and(|i| i.chosen);
        state.metrics.record_request(Outcome::Matched { chosen }, timer.elapsed());
        return Ok(Json(cached));
    }

    match state.matcher.match_affiliation(&affiliation, active_only).await {
        Ok(result) => {
            let response = MatchingResponse::from(&result);
            state.metrics.record_request(
                Outcome::Matched {
                    chosen: result.chosen().is_some(),
                },
                timer.elapsed(),
            );
            info!(
                results = response.number_of_results,
                chosen = result.chosen().map(|c| c.organization_id()),
                queries = result.trace.queries_issued,
                elapsed_ms = timer.elapsed().as_millis() as u64,
                "Affiliation matched"
            );
            if let Some(cache) = &state.cache {
                cache.set(profile, active_only, &affiliation, response.clone());
            }
            Ok(Json(response))
        }
        Err(e @ MatchError::MissingAffiliation) => {
            state.metrics.record_request(Outcome::Rejected, timer.elapsed());
            warn!("Match request without affiliation");
            Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string()))))
        }
        Err(e @ MatchError::Backend(_)) => {
            state.metrics.record_request(Outcome::Failed, timer.elapsed());
            error!(error = %e, "Affiliation matching failed");
            Err((StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse::new(e.to_string()))))
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.matcher.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                search: "ok".to_string(),
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".to_string(),
                search: format!("error: {}", e),
            }),
        ),
    }
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        profile: state.matcher.profile().name.clone(),
        requests: state.metrics.snapshot(),
        cache: state.cache.as_ref().map(Cache::stats),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use index::{Organization, SearchBackend, SearchError, SearchHit, SearchQuery};
    use matching::MatchingProfile;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct StubBackend {
        down: bool,
    }

    #[async_trait]
    impl SearchBackend for StubBackend {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
            if self.down {
                return Err(SearchError::Unavailable("connection refused".into()));
            }
            if query.text != "university of excellence" {
                return Ok(Vec::new());
            }
            let source = json!({
                "id": "https://ror.org/00excel00",
                "status": "active",
                "names": [{"value": "University of Excellence", "types": ["ror_display"]}],
                "locations": [{"geonames_details": {"country_code": "GB"}}]
            });
            let organization = Organization::from_document(None, source)
                .ok_or_else(|| SearchError::Malformed("bad fixture".into()))?;
            Ok(vec![SearchHit {
                score: 12.0,
                organization: Arc::new(organization),
            }])
        }

        async fn ping(&self) -> Result<(), SearchError> {
            if self.down {
                Err(SearchError::Unavailable("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    fn app(down: bool) -> Router {
        let gazetteer = Arc::new(Gazetteer::embedded().unwrap());
        let state = Arc::new(AppState {
            matcher: Matcher::new(Arc::new(StubBackend { down }), gazetteer, MatchingProfile::default()),
            cache: Some(Cache::new(16)),
            metrics: Metrics::new(),
        });
        router(state)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_all_status_flag() {
        assert!(active_only(None));
        assert!(!active_only(Some("")));
        assert!(!active_only(Some("TRUE")));
        assert!(active_only(Some("false")));
        assert!(active_only(Some("yes")));
    }

    #[tokio::test]
    async fn test_match_endpoint() {
        let (status, body) = get_json(app(false), "/organizations?affiliation=University%20of%20Excellence").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["number_of_results"], 1);
        assert_eq!(body["items"][0]["chosen"], true);
        assert_eq!(body["items"][0]["score"], 1.0);
        assert_eq!(body["items"][0]["organization"]["id"], "https://ror.org/00excel00");
    }

    #[tokio::test]
    async fn test_missing_affiliation() {
        let (status, body) = get_json(app(false), "/organizations").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"errors": ["'affiliation' parameter missing"]}));
    }

    #[tokio::test]
    async fn test_backend_failure() {
        let (status, body) = get_json(app(true), "/organizations?affiliation=University%20of%20Excellence").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);

        let (status, body) = get_json(app(true), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test]
    async fn test_metrics_count_requests() {
        let app = app(false);
        get_json(app.clone(), "/organizations?affiliation=University%20of%20Excellence").await;
        get_json(app.clone(), "/organizations?affiliation=University%20of%20Excellence").await;
        let (status, body) = get_json(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"], "multi");
        assert_eq!(body["requests"]["total_requests"], 2);
        assert_eq!(body["requests"]["requests_with_chosen"], 2);
        assert_eq!(body["requests"]["cache_hits"], 1);
        assert_eq!(body["cache"]["responses_cached"], 1);
    }
}
