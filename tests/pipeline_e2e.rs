//! End-to-end pipeline scenarios over injected in-memory collaborators.

use std::sync::Arc;

use vaultscan::backends::{MockOutcome, MockScanner};
use vaultscan::core::{ScanStatus, StorageLocation, StorageProvider, VaultItem};
use vaultscan::pipeline::ScanPipeline;
use vaultscan::repository::{MemoryRepository, VaultRepository};
use vaultscan::storage::MemoryStorage;
use vaultscan::vault::{OrchestratorConfig, ProcessOutcome, VaultScanOrchestrator};
use vaultscan::FileHasher;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

struct Harness {
    repo: Arc<MemoryRepository>,
    storage: Arc<MemoryStorage>,
    scanner: Arc<MockScanner>,
    orchestrator: Arc<VaultScanOrchestrator>,
    pipeline: ScanPipeline,
}

fn harness(scanner: MockScanner) -> Harness {
    init_tracing();
    let repo = Arc::new(MemoryRepository::new());
    let storage = Arc::new(MemoryStorage::new());
    let scanner = Arc::new(scanner);
    let orchestrator = Arc::new(VaultScanOrchestrator::new(
        repo.clone(),
        storage.clone(),
        storage.clone(),
        OrchestratorConfig::default(),
    ));
    let pipeline = ScanPipeline::builder()
        .with_repository(repo.clone())
        .with_storage(storage.clone())
        .with_transfer(storage.clone())
        .with_scanner(scanner.clone())
        .with_orchestrator(orchestrator.clone())
        .build()
        .unwrap();

    Harness {
        repo,
        storage,
        scanner,
        orchestrator,
        pipeline,
    }
}

/// A staged JPEG whose header matches the declared `image/jpeg` signature.
fn jpeg_payload() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
    data.extend(std::iter::repeat(0x42u8).take(400));
    data
}

fn stage(harness: &Harness, item_id: &str, user_id: &str, file_name: &str, data: &[u8]) {
    let key = format!("staging/{file_name}");
    harness
        .storage
        .insert_object("staging", key.clone(), data.to_vec(), "image/jpeg");
    harness.repo.insert_item(VaultItem::new_staged(
        item_id,
        user_id,
        file_name,
        "image/jpeg",
        data.len() as u64,
        StorageLocation::new(StorageProvider::R2Staging, "staging", key),
    ));
}

#[tokio::test]
async fn clean_file_is_released_end_to_end() {
    let h = harness(MockScanner::new_clean());
    stage(&h, "item-1", "user-1", "abc.jpg", &jpeg_payload());

    let outcome = h
        .pipeline
        .scan_vault_item("item-1", "user-1", false)
        .await
        .unwrap();
    let ProcessOutcome::Released { final_key } = outcome else {
        panic!("expected release, got {outcome:?}");
    };

    // Staging object gone, final object created at vault/{user}/{ts}_{name}
    assert!(!h.storage.has_object("staging", "staging/abc.jpg"));
    assert!(final_key.starts_with("vault/user-1/"));
    assert!(final_key.ends_with("_abc.jpg"));
    assert!(h.storage.has_object("vault", &final_key));

    // Exactly one populated storage location on the item
    let item = h.repo.get_item("item-1").await.unwrap().unwrap();
    assert_eq!(item.scan_status, ScanStatus::Clean);
    assert_eq!(item.location.provider, StorageProvider::B2);
    assert_eq!(item.location.key, final_key);
    assert!(item.quarantine_info.is_none());
}

#[tokio::test]
async fn infected_file_is_quarantined_end_to_end() {
    let payload = jpeg_payload();
    let file_hash = FileHasher::new().hash_bytes(&payload).sha256;

    let h = harness(MockScanner::new().with_response(
        file_hash,
        MockOutcome::Infected(vec!["Virus: EICAR-Test (engineA)".into()]),
    ));
    stage(&h, "item-2", "user-1", "abc.jpg", &payload);

    let outcome = h
        .pipeline
        .scan_vault_item("item-2", "user-1", false)
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::Quarantined { .. }));

    // Staging gone, object moved under quarantine/{user}/...
    assert!(!h.storage.has_object("staging", "staging/abc.jpg"));
    let quarantine_keys = h.storage.keys_in_bucket("quarantine");
    assert_eq!(quarantine_keys.len(), 1);
    assert!(quarantine_keys[0].starts_with("quarantine/user-1/"));

    // One record with matching threats
    let records = h
        .repo
        .quarantine_records_for_user("user-1")
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].threats, vec!["Virus: EICAR-Test (engineA)"]);

    // Item is infected with a populated reason naming the threat
    let item = h.repo.get_item("item-2").await.unwrap().unwrap();
    assert_eq!(item.scan_status, ScanStatus::Infected);
    assert!(item
        .quarantine_info
        .as_ref()
        .unwrap()
        .reason
        .contains("EICAR-Test"));
}

#[tokio::test]
async fn no_double_location_after_finalization() {
    // Clean and infected paths both end with exactly one stored object and
    // a single-location item.
    for (scanner, expect_bucket) in [
        (MockScanner::new_clean(), "vault"),
        (
            MockScanner::new_infected(vec!["Virus: X".into()]),
            "quarantine",
        ),
    ] {
        let h = harness(scanner);
        stage(&h, "item", "user-1", "one.jpg", &jpeg_payload());

        h.pipeline.scan_vault_item("item", "user-1", false).await.unwrap();

        assert_eq!(h.storage.object_count(), 1, "exactly one copy must exist");
        assert_eq!(h.storage.keys_in_bucket(expect_bucket).len(), 1);
        assert!(h.storage.keys_in_bucket("staging").is_empty());

        let item = h.repo.get_item("item").await.unwrap().unwrap();
        assert_eq!(item.location.bucket, expect_bucket);
    }
}

#[tokio::test]
async fn scheduled_batch_drains_pending_items() {
    let h = harness(MockScanner::new_clean());
    for i in 0..5 {
        stage(
            &h,
            &format!("item-{i}"),
            "user-1",
            &format!("photo-{i}.jpg"),
            &jpeg_payload(),
        );
    }

    let report = h.pipeline.scheduled_scan_processor().await.unwrap();
    assert_eq!(report.processed, 5);
    assert_eq!(report.succeeded, 5);
    assert!(report.errors.is_empty());

    // Identical bytes across items: the cache kept external calls to one
    assert_eq!(h.scanner.scan_count(), 1);

    let status = h.pipeline.get_quarantine_status("user-1").await.unwrap();
    assert_eq!(status.pending_scans, 0);
}

#[tokio::test]
async fn scanner_outage_quarantines_instead_of_releasing() {
    let h = harness(MockScanner::new_unreachable());
    stage(&h, "item-x", "user-1", "abc.jpg", &jpeg_payload());

    let outcome = h
        .pipeline
        .scan_vault_item("item-x", "user-1", false)
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::Quarantined { .. }));

    let item = h.repo.get_item("item-x").await.unwrap().unwrap();
    assert_eq!(item.scan_status, ScanStatus::Infected);
    let results = item.scan_results.unwrap();
    assert!(results.provider.ends_with("_error"));
    assert!(!results.threats.is_empty());
}

#[tokio::test]
async fn retention_sweep_twice_deletes_nothing_new() {
    let h = harness(MockScanner::new_infected(vec!["Virus: X".into()]));
    stage(&h, "item-q", "user-1", "bad.jpg", &jpeg_payload());
    h.pipeline
        .scan_vault_item("item-q", "user-1", false)
        .await
        .unwrap();

    // Nothing has expired yet
    let report = h
        .orchestrator
        .cleanup_expired_quarantined_files()
        .await
        .unwrap();
    assert_eq!(report.deleted, 0);
    assert!(report.errors.is_empty());

    let report = h
        .orchestrator
        .cleanup_expired_quarantined_files()
        .await
        .unwrap();
    assert_eq!(report.deleted, 0);
    assert!(report.errors.is_empty());

    // The quarantined object and record both survive
    assert_eq!(h.storage.keys_in_bucket("quarantine").len(), 1);
    assert_eq!(
        h.repo
            .quarantine_records_for_user("user-1")
            .await
            .unwrap()
            .len(),
        1
    );
}

mod webhook_flow {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use vaultscan::pipeline::NoopNotifier;
    use vaultscan::webhook::{router, WebhookState};

    const SECRET: &str = "edge-worker-secret";

    #[tokio::test]
    async fn pushed_infection_updates_item_and_responds() {
        init_tracing();
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_item(VaultItem::new_staged(
            "item-w",
            "user-1",
            "pushed.jpg",
            "image/jpeg",
            512,
            StorageLocation::new(StorageProvider::R2Staging, "staging", "staging/pushed.jpg"),
        ));
        let app = router(Arc::new(WebhookState::new(
            repo.clone(),
            Arc::new(NoopNotifier::new()),
            SECRET,
            "quarantine",
        )));

        let body = serde_json::json!({
            "itemId": "item-w",
            "status": "infected",
            "details": {"threats": ["Virus: EICAR-Test"], "provider": "edge-worker"}
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .header("x-hook-secret", SECRET)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let item = repo.get_item("item-w").await.unwrap().unwrap();
        assert_eq!(item.scan_status, ScanStatus::Infected);
        assert_eq!(item.scan_results.unwrap().provider, "edge-worker");
    }

    #[tokio::test]
    async fn tampered_secret_is_rejected_without_mutation() {
        init_tracing();
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_item(VaultItem::new_staged(
            "item-w",
            "user-1",
            "pushed.jpg",
            "image/jpeg",
            512,
            StorageLocation::new(StorageProvider::R2Staging, "staging", "staging/pushed.jpg"),
        ));
        let app = router(Arc::new(WebhookState::new(
            repo.clone(),
            Arc::new(NoopNotifier::new()),
            SECRET,
            "quarantine",
        )));

        // Correct length, one character changed
        let mut tampered = SECRET.to_string().into_bytes();
        tampered[0] ^= 0x01;
        let tampered = String::from_utf8(tampered).unwrap();

        let body = serde_json::json!({"itemId": "item-w", "status": "clean"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .header("x-hook-secret", tampered)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let item = repo.get_item("item-w").await.unwrap().unwrap();
        assert_eq!(item.scan_status, ScanStatus::Pending);
    }
}
