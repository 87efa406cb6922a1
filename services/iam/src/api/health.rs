//! Health and readiness probes.

use axum::Json;
use axum::extract::State;
use finrecon_adapter_postgres::check_connection;
use finrecon_errors::AppResult;
use serde::Serialize;

use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health/ready, pings the database.
pub async fn readiness(State(state): State<AppState>) -> AppResult<Json<ReadinessResponse>> {
    check_connection(&state.pool).await?;
    Ok(Json(ReadinessResponse {
        status: "ready",
        database: "up",
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::api_routes;
    use crate::test_support::{TestContext, response_json};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_ok() {
        let ctx = TestContext::new();
        let response = api_routes(ctx.state.clone())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "finrecon-iam");
    }
}
