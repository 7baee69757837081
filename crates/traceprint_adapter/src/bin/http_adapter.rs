#![forbid(unsafe_code)]

use std::{collections::BTreeMap, env, net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use traceprint_adapter::{AdapterRuntime, AdminListOutcome, CaptureFailure};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("TRACEPRINT_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let runtime = Arc::new(AdapterRuntime::default_from_env()?);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/capture", post(capture))
        .route("/admin", get(admin_list))
        .fallback(not_found)
        .with_state(runtime);

    println!("traceprint_adapter_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn lowercase_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

async fn capture(
    State(runtime): State<Arc<AdapterRuntime>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    match runtime.run_capture(Utc::now(), &lowercase_headers(&headers), &body) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(CaptureFailure::MalformedBody(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": reason })),
        )
            .into_response(),
        Err(CaptureFailure::Internal(reason)) => {
            eprintln!("traceprint_adapter_http capture failed: {reason}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": reason })),
            )
                .into_response()
        }
    }
}

async fn admin_list(State(runtime): State<Arc<AdapterRuntime>>, headers: HeaderMap) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match runtime.run_admin_list(authorization) {
        Ok(AdminListOutcome::Authorized(rows)) => (StatusCode::OK, Json(rows)).into_response(),
        Ok(AdminListOutcome::Rejected { message, challenge }) => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, challenge)],
            message,
        )
            .into_response(),
        Err(reason) => {
            eprintln!("traceprint_adapter_http admin listing failed: {reason}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": reason })),
            )
                .into_response()
        }
    }
}

async fn healthz(State(runtime): State<Arc<AdapterRuntime>>) -> Response {
    match runtime.health_report() {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(reason) => {
            eprintln!("traceprint_adapter_http health report failed: {reason}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": reason })),
            )
                .into_response()
        }
    }
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not Found" })),
    )
        .into_response()
}
