use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use appointment_cell::router::appointment_routes;
use availability_cell::router::availability_routes;
use shared_config::AppConfig;
use shared_database::SharedStore;

pub fn create_router(config: Arc<AppConfig>, store: SharedStore) -> Router {
    let backend = config.storage_backend.to_string();

    Router::new()
        .route("/", get(|| async { "Hospital scheduling API is running!" }))
        .route(
            "/health",
            get(move || {
                let backend = backend.clone();
                async move { Json(json!({ "status": "ok", "storage_backend": backend })) }
            }),
        )
        .nest("/availability", availability_routes(config.clone(), store.clone()))
        .nest("/appointments", appointment_routes(config, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use shared_config::StorageBackend;
    use shared_database::InMemoryStore;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = AppConfig {
            database_rest_url: String::new(),
            database_api_key: String::new(),
            jwt_secret: "router-test-secret".to_string(),
            storage_backend: StorageBackend::Memory,
            bind_address: "127.0.0.1:0".parse().unwrap(),
        };
        create_router(Arc::new(config), Arc::new(InMemoryStore::permissive()))
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["storage_backend"], "memory");
    }

    #[tokio::test]
    async fn cells_are_mounted() {
        let doctor_id = "6f1c3f9e-2a51-4b8e-9a55-2f4b1d1c0a11";
        let response = app()
            .oneshot(
                Request::builder()
                    .uri(format!("/availability/{}/available-slots?date=2025-03-03", doctor_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app()
            .oneshot(Request::builder().uri("/appointments").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
