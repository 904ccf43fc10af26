//! HTTP surface for the `apply-color` operation.
//!
//! Every orchestrator outcome maps to a JSON body `{success, image?, error?}`.
//! Soft failures (timeouts, exhausted retries, jobs the provider gave up on)
//! are 200s carrying the original image so the client can keep showing it.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::RecolorError;
use crate::orchestrator::ColorApplicationOrchestrator;
use crate::request::{ColorApplicationRequest, ColorApplicationResult, Failure, FailureKind};

/// Extra room for the JSON envelope around the image.
const BODY_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<ColorApplicationOrchestrator>,
}

/// Inbound `apply-color` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyColorBody {
    image: String,
    element_type: String,
    color: String,
    /// Anything but a string falls back to the hex code.
    #[serde(default)]
    color_name: Option<serde_json::Value>,
}

/// Outbound `apply-color` body.
#[derive(Debug, Serialize)]
struct ApplyColorResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Build the router with CORS, tracing and a body limit sized for the largest accepted image.
pub fn router(orchestrator: Arc<ColorApplicationOrchestrator>) -> Router {
    let body_limit = orchestrator.limits().max_image_bytes.saturating_add(BODY_OVERHEAD);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/apply-color", post(apply_color))
        .route("/health", get(health))
        .with_state(AppState { orchestrator })
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: &str, app: Router) -> Result<(), RecolorError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn apply_color(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let caller = caller_identity(&headers);
    if !state.orchestrator.admit(&caller) {
        return reply(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            Some("Too many requests. Please wait a moment."),
        );
    }

    let body = match body {
        Ok(bytes) => bytes,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let limit = state.orchestrator.limits().max_image_bytes;
            return reply(
                StatusCode::BAD_REQUEST,
                None,
                Some(&format!("Image too large. Maximum size is {limit} bytes.")),
            );
        }
        Err(rejection) => {
            return reply(StatusCode::BAD_REQUEST, None, Some(&rejection.body_text()));
        }
    };

    let body: ApplyColorBody = match serde_json::from_slice(&body) {
        Ok(b) => b,
        Err(e) => {
            return reply(StatusCode::BAD_REQUEST, None, Some(&format!("Invalid request body: {e}")));
        }
    };

    let request = ColorApplicationRequest {
        source_image: body.image,
        element_label: body.element_type,
        target_color_hex: body.color,
        color_name: match body.color_name {
            Some(serde_json::Value::String(name)) => Some(name),
            _ => None,
        },
    };
    to_response(state.orchestrator.apply(request).await)
}

fn to_response(result: ColorApplicationResult) -> Response {
    let Some(failure) = result.error else {
        return reply(StatusCode::OK, result.image_ref, None);
    };
    let (status, message) = failure_status(&failure);
    if status == StatusCode::OK {
        // Soft failure: hand back the untouched photo.
        return reply(status, Some(result.fallback_image), Some(&message));
    }
    reply(status, None, Some(&message))
}

fn failure_status(failure: &Failure) -> (StatusCode, String) {
    match (failure.kind, failure.status) {
        (FailureKind::InvalidInput, _) => (StatusCode::BAD_REQUEST, failure.detail.clone()),
        (FailureKind::RateLimited, _) | (FailureKind::ProviderFailed, Some(429)) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.".to_string(),
        ),
        (FailureKind::ProviderFailed, Some(402)) => (
            StatusCode::PAYMENT_REQUIRED,
            "Payment required. Please add credits to continue.".to_string(),
        ),
        (FailureKind::ProviderFailed, Some(422)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid image or model unavailable. Try again.".to_string(),
        ),
        (FailureKind::ProviderFailed, Some(status)) => {
            tracing::error!(status, detail = %failure.detail, "provider rejected request");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to apply color".to_string())
        }
        (FailureKind::ProviderFailed, None) => {
            (StatusCode::OK, "The model did not produce an image. Try again.".to_string())
        }
        (FailureKind::Timeout | FailureKind::Exhausted, _) => {
            (StatusCode::OK, "The model did not produce an image in time. Try again.".to_string())
        }
    }
}

fn reply(status: StatusCode, image: Option<String>, error: Option<&str>) -> Response {
    let body = ApplyColorResponse {
        success: status == StatusCode::OK && error.is_none(),
        image,
        error: error.map(str::to_string),
    };
    (status, Json(body)).into_response()
}

/// Caller identity for rate limiting: first `x-forwarded-for` hop, then `x-real-ip`.
fn caller_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("unknown")
        .to_string()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Ctrl+C received, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::machine::Policy;
    use crate::orchestrator::OrchestratorSettings;
    use crate::ports::image_provider::{GenerationParams, ImageProvider, JobSnapshot, Submission};
    use crate::ports::clock::Clock;
    use crate::rate_limit::RateLimiter;
    use crate::request::InputLimits;
    use crate::testing::{http_error, ManualClock, ScriptedProvider, SOURCE_IMAGE};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const RESULT_URL: &str = "https://replicate.delivery/pbxt/out-0.webp";

    fn app(provider: ScriptedProvider, max_requests: u32) -> (Router, Arc<ScriptedProvider>) {
        app_with_limits(provider, max_requests, InputLimits::default())
    }

    fn app_with_limits(
        provider: ScriptedProvider,
        max_requests: u32,
        limits: InputLimits,
    ) -> (Router, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let orchestrator = ColorApplicationOrchestrator::new(
            Arc::clone(&provider) as Arc<dyn ImageProvider>,
            Arc::new(ManualClock::new()) as Arc<dyn Clock>,
            OrchestratorSettings {
                model: "asiryan/flux-dev".into(),
                generation: GenerationParams::default(),
                limits,
                policy: Policy::default(),
            },
        )
        .with_rate_limit(RateLimiter::new(Duration::from_secs(60), max_requests));
        (router(Arc::new(orchestrator)), provider)
    }

    fn body(color: &str) -> String {
        serde_json::json!({
            "image": SOURCE_IMAGE,
            "elementType": "parede principal",
            "color": color,
            "colorName": "Verde Floresta",
        })
        .to_string()
    }

    async fn post(app: &Router, ip: &str, payload: String) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/apply-color")
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(payload))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn completed() -> Result<Submission, RecolorError> {
        Ok(Submission::Completed(JobSnapshot::succeeded(RESULT_URL)))
    }

    #[tokio::test]
    async fn success_returns_image() {
        let (app, _) = app(ScriptedProvider::new().on_submit(completed()), 5);
        let (status, json) = post(&app, "203.0.113.1", body("#4A7C59")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["image"], RESULT_URL);
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn invalid_color_is_bad_request() {
        let (app, provider) = app(ScriptedProvider::new().on_submit(completed()), 5);
        let (status, json) = post(&app, "203.0.113.1", body("verde")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(provider.submit_count(), 0);
    }

    #[tokio::test]
    async fn unparseable_body_is_bad_request() {
        let (app, _) = app(ScriptedProvider::new(), 5);
        let (status, json) = post(&app, "203.0.113.1", "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn body_over_limit_is_json_bad_request() {
        let (app, provider) = app_with_limits(
            ScriptedProvider::new().on_submit(completed()),
            5,
            InputLimits { max_image_bytes: 1000 },
        );
        let huge = format!("data:image/png;base64,{}", "A".repeat(200_000));
        let payload = serde_json::json!({
            "image": huge,
            "elementType": "parede",
            "color": "#fff",
        })
        .to_string();

        let (status, json) = post(&app, "203.0.113.1", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().starts_with("Image too large"));
        assert_eq!(provider.submit_count(), 0);
    }

    #[tokio::test]
    async fn non_string_color_name_falls_back_to_hex() {
        let (app, provider) = app(ScriptedProvider::new().on_submit(completed()), 5);
        let payload = serde_json::json!({
            "image": SOURCE_IMAGE,
            "elementType": "parede principal",
            "color": "#4A7C59",
            "colorName": 42,
        })
        .to_string();

        let (status, json) = post(&app, "203.0.113.1", payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        let sent = provider.submitted();
        assert!(sent[0].prompt.contains("to the color #4A7C59 (hex: #4A7C59)"));
    }

    #[tokio::test]
    async fn quota_maps_to_payment_required() {
        let (app, _) = app(ScriptedProvider::new().on_submit(Err(http_error(402))), 5);
        let (status, _) = post(&app, "203.0.113.1", body("#fff")).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn rejected_input_maps_to_unprocessable() {
        let (app, _) = app(ScriptedProvider::new().on_submit(Err(http_error(422))), 5);
        let (status, _) = post(&app, "203.0.113.1", body("#fff")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn bad_credentials_are_internal_errors() {
        let (app, _) = app(ScriptedProvider::new().on_submit(Err(http_error(401))), 5);
        let (status, json) = post(&app, "203.0.113.1", body("#fff")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to apply color");
    }

    #[tokio::test]
    async fn exhausted_is_soft_failure_with_original() {
        let (app, provider) = app(ScriptedProvider::new().on_submit(Err(http_error(500))), 5);
        let (status, json) = post(&app, "203.0.113.1", body("#fff")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["image"], SOURCE_IMAGE);
        assert_eq!(provider.submit_count(), 3);
    }

    #[tokio::test]
    async fn caller_limit_applies_before_parsing() {
        let (app, provider) = app(ScriptedProvider::new().on_submit(completed()), 2);
        assert_eq!(post(&app, "198.51.100.9", body("#fff")).await.0, StatusCode::OK);
        assert_eq!(post(&app, "198.51.100.9", body("#fff")).await.0, StatusCode::OK);

        let (status, json) = post(&app, "198.51.100.9", "{not json".to_string()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["success"], false);
        assert_eq!(provider.submit_count(), 2);

        assert_eq!(post(&app, "198.51.100.10", body("#fff")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _) = app(ScriptedProvider::new(), 5);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn caller_identity_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_identity(&headers), "unknown");
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(caller_identity(&headers), "10.0.0.2");
        headers.insert("x-forwarded-for", "203.0.113.5, 10.0.0.1".parse().unwrap());
        assert_eq!(caller_identity(&headers), "203.0.113.5");
    }
}
