//! End-to-end tests against real gateway and storage node servers

use minis3_cli::{
    create_node_router, create_router, AppState, GatewayConfig, NodeSeed, NodeServerConfig,
    NodeState,
};
use reqwest::{multipart, Client, StatusCode};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A storage node listening on a random port
struct TestNode {
    name: String,
    url: String,
    dir: TempDir,
}

// Helper to spawn a storage node on a random port
async fn spawn_node(name: &str) -> TestNode {
    let dir = TempDir::new().unwrap();
    let config = NodeServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        base_dir: dir.path().to_path_buf(),
        ..Default::default()
    };

    let state = Arc::new(NodeState::new(config).await.unwrap());
    let app = create_node_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestNode {
        name: name.to_string(),
        url: format!("http://{}", addr),
        dir,
    }
}

// Helper to spawn a gateway seeded with the given nodes
async fn spawn_gateway(nodes: &[&TestNode], tweak: impl FnOnce(&mut GatewayConfig)) -> String {
    let mut config = GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        per_call_timeout_ms: 5_000,
        nodes: nodes
            .iter()
            .map(|n| NodeSeed {
                name: n.name.clone(),
                base_url: n.url.clone(),
            })
            .collect(),
        ..Default::default()
    };
    tweak(&mut config);

    let state = Arc::new(AppState::new(config).await.unwrap());
    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Address nothing is listening on
async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn create_bucket(client: &Client, base_url: &str, name: &str) {
    let res = client
        .post(format!("{}/buckets", base_url))
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

async fn upload(
    client: &Client,
    base_url: &str,
    bucket: &str,
    key: &str,
    data: &[u8],
    replication: Option<usize>,
) -> reqwest::Response {
    let form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(data.to_vec()).file_name("upload.bin"),
    );
    let mut request = client.post(format!("{}/objects/{}/{}", base_url, bucket, key));
    if let Some(r) = replication {
        request = request.query(&[("replication", r)]);
    }
    request.multipart(form).send().await.unwrap()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[tokio::test]
async fn test_health() {
    let node = spawn_node("node-a").await;
    let base_url = spawn_gateway(&[&node], |_| {}).await;
    let client = Client::new();

    let res = client.get(format!("{}/health", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "UP");
    assert_eq!(body["nodes"]["total"], 1);
    assert_eq!(body["nodes"]["up"], 1);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let node = spawn_node("node-a").await;
    let base_url = spawn_gateway(&[&node], |_| {}).await;
    let client = Client::new();

    let res = client
        .get(format!("{}/buckets/missing", base_url))
        .header("x-request-id", "trace-1234")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers()["x-request-id"], "trace-1234");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "NoSuchBucket");
    assert_eq!(body["requestId"], "trace-1234");
}

#[tokio::test]
async fn test_bucket_lifecycle() {
    let node = spawn_node("node-a").await;
    let base_url = spawn_gateway(&[&node], |_| {}).await;
    let client = Client::new();

    // 1. List buckets (should be empty)
    let res = client.get(format!("{}/buckets", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!([]));

    // 2. Create bucket
    create_bucket(&client, &base_url, "photos").await;

    // 3. Duplicate is a conflict
    let res = client
        .post(format!("{}/buckets", base_url))
        .json(&json!({ "name": "photos" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // 4. Get bucket
    let res = client.get(format!("{}/buckets/photos", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "photos");

    // 5. Delete bucket
    let res = client.delete(format!("{}/buckets/photos", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // 6. Verify bucket gone
    let res = client.get(format!("{}/buckets/photos", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_bucket_name() {
    let node = spawn_node("node-a").await;
    let base_url = spawn_gateway(&[&node], |_| {}).await;
    let client = Client::new();

    let res = client
        .post(format!("{}/buckets", base_url))
        .json(&json!({ "name": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "InvalidBucketName");
}

#[tokio::test]
async fn test_node_management() {
    let node_a = spawn_node("node-a").await;
    let node_b = spawn_node("node-b").await;
    let base_url = spawn_gateway(&[&node_a], |_| {}).await;
    let client = Client::new();

    // Register a second node at runtime
    let res = client
        .post(format!("{}/nodes/register", base_url))
        .json(&json!({ "name": "node-b", "baseUrl": node_b.url }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "node-b");
    assert_eq!(body["status"], "UP");

    // Names are unique
    let res = client
        .post(format!("{}/nodes/register", base_url))
        .json(&json!({ "name": "node-b", "baseUrl": node_b.url }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client.get(format!("{}/nodes", base_url)).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Probe reports live health
    let res = client
        .get(format!("{}/nodes/node-b/health", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["health"], "UP");

    // Mark it down
    let res = client
        .put(format!("{}/nodes/node-b/status", base_url))
        .json(&json!({ "status": "DOWN" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "DOWN");

    // Unknown status
    let res = client
        .put(format!("{}/nodes/node-b/status", base_url))
        .json(&json!({ "status": "SLEEPING" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(format!("{}/nodes/nope", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_probe_dead_node() {
    let node = spawn_node("node-a").await;
    let base_url = spawn_gateway(&[&node], |_| {}).await;
    let client = Client::new();

    let res = client
        .post(format!("{}/nodes/register", base_url))
        .json(&json!({ "name": "ghost", "baseUrl": dead_address().await }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .get(format!("{}/nodes/ghost/health", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["health"], "DOWN");
    assert_eq!(body["registryStatus"], "UP");
}

#[tokio::test]
async fn test_object_lifecycle() {
    let node_a = spawn_node("node-a").await;
    let node_b = spawn_node("node-b").await;
    let node_c = spawn_node("node-c").await;
    let base_url = spawn_gateway(&[&node_a, &node_b, &node_c], |_| {}).await;
    let client = Client::new();
    create_bucket(&client, &base_url, "photos").await;

    let first = b"first version of the cat".to_vec();
    let second = b"second version of the cat".to_vec();

    // 1. Upload v1
    let res = upload(&client, &base_url, "photos", "cats/cat.png", &first, None).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["version"], 1);
    assert_eq!(receipt["checksum"], sha256_hex(&first));
    assert_eq!(receipt["replicationFactor"], 2);
    assert_eq!(receipt["successfulReplicas"], 2);
    assert_eq!(receipt["degraded"], false);
    assert_eq!(receipt["replicas"].as_array().unwrap().len(), 2);

    // 2. Upload v2
    let res = upload(&client, &base_url, "photos", "cats/cat.png", &second, None).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["version"], 2);

    // 3. Latest is v2
    let res = client
        .get(format!("{}/objects/photos/cats/cat.png", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-object-version"], "2");
    assert_eq!(res.headers()["x-object-checksum"], sha256_hex(&second).as_str());
    assert!(res.headers().contains_key("x-served-by"));
    assert_eq!(res.bytes().await.unwrap().as_ref(), second.as_slice());

    // 4. Explicit v1
    let res = client
        .get(format!("{}/objects/photos/cats/cat.png?version=1", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().as_ref(), first.as_slice());

    // 5. Listings
    let res = client
        .get(format!("{}/versions/photos/cats/cat.png", base_url))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let versions: Vec<u64> = body["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_u64().unwrap())
        .collect();
    assert_eq!(versions, vec![1, 2]);

    let res = client
        .get(format!("{}/objects/photos?prefix=cats/", base_url))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["objects"][0]["key"], "cats/cat.png");
    assert_eq!(body["objects"][0]["latestVersion"], 2);
    assert_eq!(body["objects"][0]["versionCount"], 2);

    // 6. Delete v2; latest falls back to v1 and v2 is gone
    let res = client
        .delete(format!("{}/objects/photos/cats/cat.png?version=2", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/objects/photos/cats/cat.png", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-object-version"], "1");

    let res = client
        .get(format!("{}/objects/photos/cats/cat.png?version=2", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GONE);

    // 7. Deleting again is harmless
    let res = client
        .delete(format!("{}/objects/photos/cats/cat.png?version=2", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // 8. Bucket with live versions cannot be dropped
    let res = client.delete(format!("{}/buckets/photos", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_replicas_land_on_nodes() {
    let node_a = spawn_node("node-a").await;
    let node_b = spawn_node("node-b").await;
    let base_url = spawn_gateway(&[&node_a, &node_b], |_| {}).await;
    let client = Client::new();
    create_bucket(&client, &base_url, "docs").await;

    let data = b"replicated payload";
    let res = upload(&client, &base_url, "docs", "report.txt", data, Some(2)).await;
    let receipt: Value = res.json().await.unwrap();

    for node in [&node_a, &node_b] {
        let replica = receipt["replicas"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["nodeName"] == node.name.as_str())
            .unwrap();
        assert_eq!(replica["writeStatus"], "SUCCESS");

        let path = replica["storagePath"].as_str().unwrap();
        assert!(path.starts_with("docs/"));
        assert!(path.ends_with("/1/blob"));
        let on_disk = std::fs::read(node.dir.path().join(path)).unwrap();
        assert_eq!(on_disk, data);
    }
}

#[tokio::test]
async fn test_read_fails_over_to_next_replica() {
    let node_a = spawn_node("node-a").await;
    let node_b = spawn_node("node-b").await;
    let base_url = spawn_gateway(&[&node_a, &node_b], |_| {}).await;
    let client = Client::new();
    create_bucket(&client, &base_url, "docs").await;

    let data = b"survives one lost replica";
    let res = upload(&client, &base_url, "docs", "a.txt", data, Some(2)).await;
    let receipt: Value = res.json().await.unwrap();
    let first = &receipt["replicas"][0];
    let lost = [&node_a, &node_b]
        .into_iter()
        .find(|n| first["nodeName"] == n.name.as_str())
        .unwrap();
    std::fs::remove_file(lost.dir.path().join(first["storagePath"].as_str().unwrap())).unwrap();

    let res = client
        .get(format!("{}/objects/docs/a.txt", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-served-by"], receipt["replicas"][1]["nodeName"].as_str().unwrap());
    assert_eq!(res.bytes().await.unwrap().as_ref(), data.as_slice());

    // Lose the second copy too
    let second = &receipt["replicas"][1];
    let lost = [&node_a, &node_b]
        .into_iter()
        .find(|n| second["nodeName"] == n.name.as_str())
        .unwrap();
    std::fs::remove_file(lost.dir.path().join(second["storagePath"].as_str().unwrap())).unwrap();

    let res = client
        .get(format!("{}/objects/docs/a.txt", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_degraded_upload() {
    let node_a = spawn_node("node-a").await;
    let node_b = spawn_node("node-b").await;
    let base_url = spawn_gateway(&[&node_a, &node_b], |_| {}).await;
    let client = Client::new();

    let res = client
        .post(format!("{}/nodes/register", base_url))
        .json(&json!({ "name": "ghost", "baseUrl": dead_address().await }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    create_bucket(&client, &base_url, "docs").await;

    let res = upload(&client, &base_url, "docs", "b.txt", b"two of three", Some(3)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["successfulReplicas"], 2);
    assert_eq!(receipt["degraded"], true);

    let failed: Vec<&Value> = receipt["replicas"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["writeStatus"] == "FAILED")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["nodeName"], "ghost");

    // Reads skip the failed replica
    let res = client
        .get(format!("{}/objects/docs/b.txt", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_ne!(res.headers()["x-served-by"], "ghost");
}

#[tokio::test]
async fn test_upload_rejections() {
    let node_a = spawn_node("node-a").await;
    let node_b = spawn_node("node-b").await;
    let base_url = spawn_gateway(&[&node_a, &node_b], |config| {
        config.max_object_size = 1024;
    })
    .await;
    let client = Client::new();
    create_bucket(&client, &base_url, "docs").await;

    // Unknown bucket
    let res = upload(&client, &base_url, "nope", "a.txt", b"data", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Empty file
    let res = upload(&client, &base_url, "docs", "a.txt", b"", None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "EmptyObject");

    // Too large
    let res = upload(&client, &base_url, "docs", "a.txt", &[7u8; 2048], None).await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // More replicas than nodes
    let res = upload(&client, &base_url, "docs", "a.txt", b"data", Some(5)).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "InsufficientReplicas");

    // Zero replicas
    let res = upload(&client, &base_url, "docs", "a.txt", b"data", Some(0)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Nothing was stored by any of the above
    let res = client
        .get(format!("{}/objects/docs/a.txt", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Missing file field
    let form = multipart::Form::new().text("other", "value");
    let res = client
        .post(format!("{}/objects/docs/a.txt", base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_errors() {
    let node_a = spawn_node("node-a").await;
    let node_b = spawn_node("node-b").await;
    let base_url = spawn_gateway(&[&node_a, &node_b], |_| {}).await;
    let client = Client::new();
    create_bucket(&client, &base_url, "docs").await;

    let res = client
        .get(format!("{}/objects/docs/missing.txt", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    upload(&client, &base_url, "docs", "a.txt", b"only v1", None).await;

    let res = client
        .get(format!("{}/objects/docs/a.txt?version=9", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "NoSuchVersion");

    // Delete needs an explicit version
    let res = client
        .delete(format!("{}/objects/docs/a.txt", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Only version tombstoned: nothing left to serve
    client
        .delete(format!("{}/objects/docs/a.txt?version=1", base_url))
        .send()
        .await
        .unwrap();
    let res = client
        .get(format!("{}/objects/docs/a.txt", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_storage_node_protocol() {
    let node = spawn_node("node-a").await;
    let client = Client::new();

    let res = client.get(format!("{}/health", node.url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "UP");

    let form = multipart::Form::new()
        .part("file", multipart::Part::bytes(b"raw blob".to_vec()).file_name("blob"))
        .text("path", "bkt/1/1/blob");
    let res = client
        .put(format!("{}/store", node.url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/fetch", node.url))
        .query(&[("path", "bkt/1/1/blob")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().as_ref(), b"raw blob");

    // Escaping the base directory is rejected
    let form = multipart::Form::new()
        .part("file", multipart::Part::bytes(b"evil".to_vec()).file_name("blob"))
        .text("path", "../escape");
    let res = client
        .put(format!("{}/store", node.url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .delete(format!("{}/store", node.url))
        .query(&[("path", "bkt/1/1/blob")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(format!("{}/fetch", node.url))
        .query(&[("path", "bkt/1/1/blob")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Deleting a missing blob still succeeds
    let res = client
        .delete(format!("{}/store", node.url))
        .query(&[("path", "bkt/1/1/blob")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}
