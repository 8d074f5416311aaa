//! The webhook HTTP handler.

use crate::audit;
use crate::core::{QuarantineInfo, ScanRecord, ScanStatus, VaultError, VaultResult};
use crate::pipeline::Notifier;
use crate::repository::{ArcRepository, VaultRepository};
use crate::webhook::secret_matches;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying the shared webhook secret.
const SECRET_HEADER: &str = "x-hook-secret";

/// Collaborators and configuration for the webhook endpoint.
#[derive(Debug)]
pub struct WebhookState {
    repository: ArcRepository,
    notifier: Arc<dyn Notifier>,
    secret: SecretString,
    quarantine_bucket: String,
}

impl WebhookState {
    /// Creates the webhook state.
    pub fn new(
        repository: ArcRepository,
        notifier: Arc<dyn Notifier>,
        secret: impl Into<String>,
        quarantine_bucket: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            notifier,
            secret: SecretString::new(secret.into().into()),
            quarantine_bucket: quarantine_bucket.into(),
        }
    }
}

/// Builds the webhook router: `POST /` only, so other methods get 405.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/", post(ingest_scan_result))
        .with_state(state)
}

/// Scan-result payload pushed by the edge worker.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    item_id: String,
    status: ScanStatus,
    #[serde(default)]
    details: Option<WebhookDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookDetails {
    #[serde(default)]
    threats: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    success: bool,
    item_id: String,
    status: ScanStatus,
}

async fn ingest_scan_result(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Response {
    // Authentication first: nothing else is inspected without it.
    let authorized = headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|provided| {
            secret_matches(provided.as_bytes(), state.secret.expose_secret().as_bytes())
        });
    if !authorized {
        tracing::warn!("Webhook rejected: missing or invalid secret");
        return (StatusCode::FORBIDDEN, "invalid webhook secret").into_response();
    }

    // Validation next, still before any state mutation.
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Webhook rejected: malformed payload");
            return (StatusCode::BAD_REQUEST, "malformed payload").into_response();
        }
    };
    if payload.item_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "itemId is required").into_response();
    }

    match apply_scan_update(&state, &payload).await {
        Ok(()) => {
            audit::emit_webhook_applied(&payload.item_id, payload.status);
            (
                StatusCode::OK,
                Json(WebhookResponse {
                    success: true,
                    item_id: payload.item_id,
                    status: payload.status,
                }),
            )
                .into_response()
        }
        Err(VaultError::ItemNotFound { .. }) => {
            (StatusCode::NOT_FOUND, "unknown item").into_response()
        }
        Err(e) => {
            tracing::error!(item_id = %payload.item_id, error = %e, "Webhook update failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "update failed").into_response()
        }
    }
}

/// Applies the pushed result with the orchestrator's terminal update shape.
async fn apply_scan_update(state: &WebhookState, payload: &WebhookPayload) -> VaultResult<()> {
    let mut item = state
        .repository
        .get_item(&payload.item_id)
        .await?
        .ok_or_else(|| VaultError::item_not_found(&payload.item_id))?;

    let details = payload.details.as_ref();
    let threats = details
        .and_then(|d| d.threats.clone())
        .unwrap_or_default();
    let provider = details
        .and_then(|d| d.provider.clone())
        .unwrap_or_else(|| "webhook".to_string());

    item.scan_status = payload.status;
    item.scan_results = Some(ScanRecord {
        scanned_at: Utc::now(),
        threats: threats.clone(),
        provider,
        error: details.and_then(|d| d.error.clone()),
    });

    if payload.status == ScanStatus::Infected {
        item.quarantine_info = Some(QuarantineInfo {
            quarantined_at: Utc::now(),
            reason: format!("Threats detected: {}", threats.join("; ")),
            bucket: state.quarantine_bucket.clone(),
            key: item.location.key.clone(),
        });
    }

    state.repository.update_item(&item).await?;

    // Best-effort: the 200 does not depend on the notification.
    if payload.status == ScanStatus::Infected {
        if let Err(e) = state
            .notifier
            .notify_infection(&item.user_id, &item, &threats)
            .await
        {
            tracing::warn!(
                item_id = %item.id,
                error = %e,
                "Infection notification failed"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StorageLocation, StorageProvider, VaultItem};
    use crate::pipeline::NoopNotifier;
    use crate::repository::{MemoryRepository, VaultRepository};

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SECRET: &str = "hook-secret-123";

    fn test_router() -> (Arc<MemoryRepository>, Router) {
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_item(VaultItem::new_staged(
            "item-1",
            "user-1",
            "abc.jpg",
            "image/jpeg",
            1024,
            StorageLocation::new(StorageProvider::R2Staging, "staging", "staging/abc.jpg"),
        ));
        let state = Arc::new(WebhookState::new(
            repo.clone(),
            Arc::new(NoopNotifier::new()),
            SECRET,
            "quarantine",
        ));
        (repo, router(state))
    }

    fn post_request(secret: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn clean_result_applies_and_responds_200() {
        let (repo, app) = test_router();
        let body = serde_json::json!({
            "itemId": "item-1",
            "status": "clean",
            "details": {"provider": "edge-worker"}
        });

        let response = app.oneshot(post_request(Some(SECRET), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["itemId"], "item-1");
        assert_eq!(parsed["status"], "clean");

        let item = repo.get_item("item-1").await.unwrap().unwrap();
        assert_eq!(item.scan_status, ScanStatus::Clean);
        assert_eq!(item.scan_results.unwrap().provider, "edge-worker");
        assert!(item.quarantine_info.is_none());
    }

    #[tokio::test]
    async fn infected_result_sets_quarantine_info() {
        let (repo, app) = test_router();
        let body = serde_json::json!({
            "itemId": "item-1",
            "status": "infected",
            "details": {"threats": ["Virus: EICAR-Test (engineA)"]}
        });

        let response = app.oneshot(post_request(Some(SECRET), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let item = repo.get_item("item-1").await.unwrap().unwrap();
        assert_eq!(item.scan_status, ScanStatus::Infected);
        let info = item.quarantine_info.unwrap();
        assert!(info.reason.contains("EICAR-Test"));
        assert_eq!(info.bucket, "quarantine");
    }

    #[tokio::test]
    async fn wrong_secret_same_length_is_403() {
        let (repo, app) = test_router();
        // Same length as SECRET, one character changed
        let mut wrong = SECRET.to_string().into_bytes();
        wrong[5] ^= 0x01;
        let wrong = String::from_utf8(wrong).unwrap();
        assert_eq!(wrong.len(), SECRET.len());

        let body = serde_json::json!({"itemId": "item-1", "status": "clean"});
        let response = app
            .oneshot(post_request(Some(&wrong), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Rejected before any mutation
        let item = repo.get_item("item-1").await.unwrap().unwrap();
        assert_eq!(item.scan_status, ScanStatus::Pending);
    }

    #[tokio::test]
    async fn missing_secret_is_403() {
        let (_repo, app) = test_router();
        let body = serde_json::json!({"itemId": "item-1", "status": "clean"});
        let response = app.oneshot(post_request(None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_status_is_400() {
        let (_repo, app) = test_router();
        let body = serde_json::json!({"itemId": "item-1", "status": "quarantined"});
        let response = app.oneshot(post_request(Some(SECRET), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_fields_are_400() {
        let (_repo, app) = test_router();
        let body = serde_json::json!({"status": "clean"});
        let response = app.oneshot(post_request(Some(SECRET), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (_repo, app) = test_router();
        let body = serde_json::json!({"itemId": "", "status": "clean"});
        let response = app.oneshot(post_request(Some(SECRET), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_item_is_404() {
        let (_repo, app) = test_router();
        let body = serde_json::json!({"itemId": "missing", "status": "clean"});
        let response = app.oneshot(post_request(Some(SECRET), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_post_method_is_405() {
        let (_repo, app) = test_router();
        let request = Request::builder()
            .method("GET")
            .uri("/")
            .header(SECRET_HEADER, SECRET)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn repository_failure_is_500() {
        let (repo, app) = test_router();
        repo.set_fail_updates(true);

        let body = serde_json::json!({"itemId": "item-1", "status": "clean"});
        let response = app.oneshot(post_request(Some(SECRET), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
