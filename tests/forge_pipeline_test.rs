//! Upload → translate → extract against a mocked Forge.
//!
//! Covers:
//! - the happy path for a 10 MiB IFC model, ending in a priced estimate
//! - policy rejections that never touch the network
//! - progress reporting and mid-transfer failures
//! - extraction sequencing and the "still preparing" response

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bimcost::core::models::{JobStatus, ProjectEstimate, TranslationJob, UploadState};
use bimcost::core::rates::RateTable;
use bimcost::error::BimcostError;
use bimcost::forge::{JobTracker, PollPolicy, UploadPolicy, encode_urn};

use common::fixtures::{
    SAMPLE_TOTAL, TEST_BUCKET, TEST_CHUNK, forge_client, mount_manifest_sequence,
    mount_model_data, mount_submit, mount_token, mount_upload, write_model,
};
use common::logger::TestLogger;

const TEN_MIB: usize = 10 * 1024 * 1024;

fn fast_policy(max_attempts: u32) -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), max_attempts)
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn ifc_model_uploads_translates_and_prices() {
    let log = TestLogger::new("ifc_model_uploads_translates_and_prices");
    log.phase("setup");

    let server = MockServer::start().await;
    mount_upload(&server, 2).await;
    mount_submit(&server).await;
    mount_manifest_sequence(&server, 1).await;
    mount_model_data(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path(), "sample.ifc", TEN_MIB);
    let forge = Arc::new(forge_client(&server.uri()));

    log.phase("upload");
    let mut events = Vec::new();
    let session = forge
        .upload_file(&model, "user-1", &UploadPolicy::default(), |p| events.push(p))
        .await
        .expect("upload succeeds");

    assert_eq!(session.state(), UploadState::Uploaded);
    assert_eq!(session.bytes_transferred(), TEN_MIB as u64);
    let urn = session.object_urn().expect("urn after upload").to_string();
    assert!(bimcost::forge::decode_urn(&urn)
        .unwrap()
        .starts_with(&format!("urn:adsk.objects:os.object:{TEST_BUCKET}/")));

    log.phase("translate");
    let tracker = JobTracker::new(Arc::clone(&forge), fast_policy(60));
    let job = tracker.submit(&urn).await.expect("submit");
    assert_eq!(job.status, JobStatus::Submitted);

    let first = tracker.poll(job).await.expect("first poll");
    assert_eq!(first.status.wire_label(), "pending");
    assert_eq!(first.progress_percent, 40);

    let mut seen = Vec::new();
    let done = tracker
        .wait(first, &CancellationToken::new(), |j| seen.push(j.status))
        .await
        .expect("wait");
    assert_eq!(done.status, JobStatus::Success);
    assert_eq!(done.progress_percent, 100);
    assert_eq!(seen, vec![JobStatus::Success]);

    log.phase("extract");
    let batch = forge.extract_elements(&done).await.expect("extract");
    assert_eq!(batch.len(), 4);
    let rates = RateTable::builtin();
    let records: Vec<_> = batch.records(&rates).collect();
    let estimate = ProjectEstimate::from_records(batch.urn(), &records);

    let line_sum: f64 = estimate.lines.iter().map(|l| l.total).sum();
    assert!((estimate.total - line_sum).abs() < 0.01);
    assert!((estimate.total - SAMPLE_TOTAL).abs() < 0.01);
    assert_eq!(estimate.lines[2].category, "Door");
    assert_eq!(estimate.lines[2].quantity, "1 ea");
    log.finish_ok();
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_file_size() {
    let server = MockServer::start().await;
    mount_upload(&server, 3).await;

    let dir = tempfile::tempdir().unwrap();
    let size = (TEST_CHUNK * 2 + 1234) as usize;
    let model = write_model(dir.path(), "tower.rvt", size);
    let forge = forge_client(&server.uri());

    let mut events = Vec::new();
    forge
        .upload_file(&model, "user-1", &UploadPolicy::default(), |p| events.push(p))
        .await
        .unwrap();

    assert_eq!(events.len(), 3);
    assert!(events.windows(2).all(|w| w[0].bytes_transferred < w[1].bytes_transferred));
    let last = events.last().unwrap();
    assert_eq!(last.bytes_transferred, size as u64);
    assert_eq!(last.file_size_bytes, size as u64);

    let puts = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT")
        .count();
    assert_eq!(puts, 3);
}

#[tokio::test]
async fn same_caller_and_name_yield_same_urn() {
    let server = MockServer::start().await;
    mount_upload(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path(), "plan.dwg", 4096);
    let forge = forge_client(&server.uri());
    let policy = UploadPolicy::default();

    let a = forge.upload_file(&model, "user-1", &policy, |_| {}).await.unwrap();
    let b = forge.upload_file(&model, "user-1", &policy, |_| {}).await.unwrap();
    let c = forge.upload_file(&model, "user-2", &policy, |_| {}).await.unwrap();
    assert_eq!(a.object_urn(), b.object_urn());
    assert_ne!(a.object_urn(), c.object_urn());
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn oversize_file_is_rejected_without_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path(), "big.ifc", 4096);
    let forge = forge_client(&server.uri());

    let err = forge
        .upload_file(&model, "user-1", &UploadPolicy::new(1024), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, BimcostError::UploadRejected { too_large: true, .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_extension_is_rejected_without_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let notes = write_model(dir.path(), "notes.txt", 10);
    let forge = forge_client(&server.uri());

    let err = forge
        .upload_file(&notes, "user-1", &UploadPolicy::default(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, BimcostError::UploadRejected { too_large: false, .. }));
    assert_eq!(err.exit_code(), bimcost::ExitCode::InvalidInput);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_credentials_surface_as_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authentication/v2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid client"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path(), "sample.ifc", 100);
    let err = forge_client(&server.uri())
        .upload_file(&model, "user-1", &UploadPolicy::default(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, BimcostError::Credential(_)));
    assert!(!err.is_retryable());
}

// =============================================================================
// Transfer Failures
// =============================================================================

#[tokio::test]
async fn failed_part_reports_offset_reached() {
    let server = MockServer::start().await;
    // Mounted first so it wins over the catch-all part mock.
    Mock::given(method("PUT"))
        .and(path("/s3/part-2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_upload(&server, 2).await;

    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path(), "sample.ifc", TEN_MIB);
    let err = forge_client(&server.uri())
        .upload_file(&model, "user-1", &UploadPolicy::default(), |_| {})
        .await
        .unwrap_err();

    match err {
        BimcostError::Upload { offset, ref file_name, .. } => {
            assert_eq!(offset, TEST_CHUNK);
            assert_eq!(file_name, "sample.ifc");
        }
        other => panic!("expected Upload error, got {other:?}"),
    }
}

#[tokio::test]
async fn token_is_reused_across_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authentication/v2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::fixtures::token_body()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let forge = forge_client(&server.uri());
    let a = forge.tokens().access_token().await.unwrap();
    let b = forge.tokens().access_token().await.unwrap();
    assert_eq!(a, b);
    assert!(a.expires_in(chrono::Utc::now()) > 3500);
}

#[tokio::test]
async fn concurrent_callers_share_one_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authentication/v2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::fixtures::token_body())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let forge = forge_client(&server.uri());
    let tokens = futures::future::join_all((0..8).map(|_| forge.tokens().access_token())).await;

    let tokens: Vec<_> = tokens.into_iter().map(Result::unwrap).collect();
    assert_eq!(tokens.len(), 8);
    assert!(tokens.iter().all(|t| *t == tokens[0]));
}

#[tokio::test]
async fn expired_token_is_exchanged_again() {
    let server = MockServer::start().await;
    // Inside the expiry margin, so stale as soon as it is issued.
    Mock::given(method("POST"))
        .and(path("/authentication/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "short-lived",
            "expires_in": 30
        })))
        .expect(2)
        .mount(&server)
        .await;

    let forge = forge_client(&server.uri());
    let first = forge.tokens().access_token().await.unwrap();
    assert!(!first.is_fresh(chrono::Utc::now(), bimcost::forge::auth::EXPIRY_MARGIN));
    let second = forge.tokens().access_token().await.unwrap();
    assert_eq!(second.token, "short-lived");
    assert!(second.expires_at >= first.expires_at);
}

// =============================================================================
// Extraction
// =============================================================================

#[tokio::test]
async fn extraction_before_success_makes_no_request() {
    let server = MockServer::start().await;
    let forge = forge_client(&server.uri());
    let job = TranslationJob::submitted(encode_urn(TEST_BUCKET, "k.ifc"));

    let err = forge.extract_elements(&job).await.unwrap_err();
    assert!(matches!(err, BimcostError::NotReady { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn property_database_still_preparing_is_retryable() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/modelderivative/v2/designdata/[^/]+/metadata$"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "result": "success"
        })))
        .mount(&server)
        .await;

    let forge = forge_client(&server.uri());
    let mut job = TranslationJob::submitted(encode_urn(TEST_BUCKET, "k.ifc"));
    job.status = JobStatus::Success;

    let err = forge.extract_elements(&job).await.unwrap_err();
    assert!(matches!(
        err,
        BimcostError::ForgeApi {
            status_code: 202,
            ..
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn failed_translation_stays_failed() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/modelderivative/v2/designdata/[^/]+/manifest$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::fixtures::manifest_body("failed", "complete")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tracker = JobTracker::new(Arc::new(forge_client(&server.uri())), fast_policy(10));
    let job = tracker.track(&encode_urn(TEST_BUCKET, "k.ifc")).unwrap();
    let job = tracker
        .wait(job, &CancellationToken::new(), |_| {})
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);

    // Terminal records are returned as-is.
    let again = tracker.poll(job.clone()).await.unwrap();
    assert_eq!(again, job);
}
