//! Payload factories and mock wiring for Forge and AI provider tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bimcost::core::http::build_client;
use bimcost::forge::{ForgeClient, ForgeCredentials};
use bimcost::storage::{AppConfig, Config};

pub const TEST_BUCKET: &str = "bimcost-test";
pub const VIEW_GUID: &str = "view-3d-guid";

/// Smallest chunk the object store accepts; keeps part counts predictable.
pub const TEST_CHUNK: u64 = 5 * 1024 * 1024;

/// Sum of the line totals in [`tree_body`] / [`properties_body`]:
/// 12.5 m² + 10 m² of wall at 180, one door at 950, 40 m² of floor at 120.
pub const SAMPLE_TOTAL: f64 = 2250.0 + 1800.0 + 950.0 + 4800.0;

// =============================================================================
// Forge Payloads
// =============================================================================

pub fn token_body() -> Value {
    json!({
        "access_token": "test-access-token",
        "token_type": "Bearer",
        "expires_in": 3599
    })
}

/// Signed part URLs pointing back at the mock server.
pub fn signed_upload_body(uri: &str, parts: u64) -> Value {
    let urls: Vec<String> = (1..=parts).map(|n| format!("{uri}/s3/part-{n}")).collect();
    json!({ "uploadKey": "upload-key-1", "urls": urls })
}

pub fn manifest_body(status: &str, progress: &str) -> Value {
    json!({ "type": "manifest", "status": status, "progress": progress })
}

pub fn metadata_body() -> Value {
    json!({
        "data": {
            "type": "metadata",
            "metadata": [
                { "name": "Sheet", "role": "2d", "guid": "view-2d-guid" },
                { "name": "{3D}", "role": "3d", "guid": VIEW_GUID }
            ]
        }
    })
}

pub fn tree_body() -> Value {
    json!({
        "data": {
            "type": "objects",
            "objects": [{
                "objectid": 1,
                "name": "Model",
                "objects": [
                    { "objectid": 2, "name": "Walls", "objects": [
                        { "objectid": 3, "name": "Basic Wall [101]" },
                        { "objectid": 4, "name": "Basic Wall [102]" }
                    ]},
                    { "objectid": 5, "name": "Doors", "objects": [
                        { "objectid": 6, "name": "Single Door [201]" }
                    ]},
                    { "objectid": 7, "name": "Floors", "objects": [
                        { "objectid": 8, "name": "Floor [301]" }
                    ]}
                ]
            }]
        }
    })
}

pub fn properties_body() -> Value {
    json!({
        "data": {
            "type": "properties",
            "collection": [
                { "objectid": 3, "name": "Basic Wall [101]", "externalId": "wall-101",
                  "properties": {
                      "Other": { "Category": "Revit Walls" },
                      "Dimensions": { "Area": "12.5 m^2", "Length": "5000 mm" }
                  }},
                { "objectid": 4, "name": "Basic Wall [102]", "externalId": "wall-102",
                  "properties": {
                      "Other": { "Category": "Revit Walls" },
                      "Dimensions": { "Area": 10.0 }
                  }},
                { "objectid": 6, "name": "Single Door [201]", "externalId": "door-201",
                  "properties": {
                      "Other": { "Category": "Revit Doors" },
                      "Dimensions": { "Area": "2.1 m^2" }
                  }},
                { "objectid": 8, "name": "Floor [301]", "externalId": "floor-301",
                  "properties": {
                      "Other": { "Category": "Revit Floors" },
                      "Dimensions": { "Area": "40 m^2", "Volume": "8 m^3" }
                  }}
            ]
        }
    })
}

// =============================================================================
// AI Payloads
// =============================================================================

/// OpenAI-compatible chat completion carrying `content` as the reply.
pub fn chat_completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

// =============================================================================
// Mock Wiring
// =============================================================================

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/authentication/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(server)
        .await;
}

/// Token, bucket, signed URLs, part PUTs and finalize for a `parts`-part upload.
pub async fn mount_upload(server: &MockServer, parts: u64) {
    mount_token(server).await;
    Mock::given(method("POST"))
        .and(path("/oss/v2/buckets"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "reason": "exists" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/oss/v2/buckets/[^/]+/objects/[^/]+/signeds3upload$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(signed_upload_body(&server.uri(), parts)),
        )
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/s3/part-\d+$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/oss/v2/buckets/[^/]+/objects/[^/]+/signeds3upload$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objectKey": "k" })))
        .mount(server)
        .await;
}

pub async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/modelderivative/v2/designdata/job"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "created" })))
        .mount(server)
        .await;
}

/// Metadata, object tree and properties for the sample model.
pub async fn mount_model_data(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/modelderivative/v2/designdata/[^/]+/metadata$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_body()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(&format!(
            r"^/modelderivative/v2/designdata/[^/]+/metadata/{VIEW_GUID}$"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(tree_body()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(&format!(
            r"^/modelderivative/v2/designdata/[^/]+/metadata/{VIEW_GUID}/properties$"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(properties_body()))
        .mount(server)
        .await;
}

/// Manifest that reports pending for the first `pending_polls` reads and
/// success afterwards.
pub async fn mount_manifest_sequence(server: &MockServer, pending_polls: u64) {
    let manifest = r"^/modelderivative/v2/designdata/[^/]+/manifest$";
    if pending_polls > 0 {
        Mock::given(method("GET"))
            .and(path_regex(manifest))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(manifest_body("inprogress", "40% complete")),
            )
            .up_to_n_times(pending_polls)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path_regex(manifest))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_body("success", "complete")))
        .mount(server)
        .await;
}

// =============================================================================
// Clients and Config
// =============================================================================

/// Forge client with credentials against `uri`.
pub fn forge_client(uri: &str) -> ForgeClient {
    ForgeClient::new(
        build_client(Duration::from_secs(10)).expect("client"),
        uri,
        TEST_BUCKET,
        Some(ForgeCredentials::new("test-client", "test-secret")),
        TEST_CHUNK,
    )
}

/// Resolved config with every external base URL pointed at mocks and the
/// given environment entries applied.
pub fn test_config(forge_uri: &str, ai_uri: &str, extra_env: &[(&str, &str)]) -> AppConfig {
    test_config_with(forge_uri, ai_uri, extra_env, |_| {})
}

/// Like [`test_config`], with `tweak` applied to the file-level config
/// before resolution.
pub fn test_config_with(
    forge_uri: &str,
    ai_uri: &str,
    extra_env: &[(&str, &str)],
    tweak: impl FnOnce(&mut Config),
) -> AppConfig {
    let mut env: Vec<(String, String)> = vec![
        ("FORGE_BASE_URL".to_string(), forge_uri.to_string()),
        ("XAI_BASE_URL".to_string(), format!("{ai_uri}/xai")),
        ("OPENAI_BASE_URL".to_string(), format!("{ai_uri}/openai")),
        ("FORGE_BUCKET".to_string(), TEST_BUCKET.to_string()),
    ];
    env.extend(
        extra_env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
    );
    let mut config = Config::default();
    config.forge.chunk_size_mib = 5;
    config.forge.poll_interval_secs = 1;
    tweak(&mut config);
    AppConfig::resolve(config, |key| {
        env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
    .expect("test config resolves")
}

/// Write a model file of exactly `size` bytes.
pub fn write_model(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, content).expect("write model");
    path
}
