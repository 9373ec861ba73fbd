use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use webclip::host::{read_message, Host};
use webclip::relay;
use webclip::{CaptureSettings, Panel, SnapshotStorage, SnapshotStore};

fn frame(message: &Value) -> Vec<u8> {
    let body = serde_json::to_vec(message).unwrap();
    let mut framed = (body.len() as u32).to_ne_bytes().to_vec();
    framed.extend_from_slice(&body);
    framed
}

fn frames(messages: &[Value]) -> Vec<u8> {
    messages.iter().flat_map(frame).collect()
}

async fn decode_all(mut output: &[u8]) -> Vec<Value> {
    let mut responses = Vec::new();
    while let Some(body) = read_message(&mut output).await.unwrap() {
        responses.push(serde_json::from_slice(&body).unwrap());
    }
    responses
}

async fn serve(host: &Host, requests: &[Value]) -> Vec<Value> {
    let input = frames(requests);
    let mut reader = input.as_slice();
    let mut output = Vec::new();
    let handled = host.serve(&mut reader, &mut output).await.unwrap();
    assert_eq!(handled, requests.len());
    decode_all(&output).await
}

async fn setup_store(temp_dir: &TempDir) -> Arc<SnapshotStore> {
    let path = temp_dir
        .path()
        .join("clips.db")
        .to_string_lossy()
        .to_string();
    let store = Arc::new(SnapshotStore::new(path, 2));
    store.initialize().await.unwrap();
    store
}

#[tokio::test]
async fn test_ping_and_malformed_request() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(&temp_dir).await;
    let (relay, _inbox) = relay::channel(4);
    let host = Host::new(store, relay, CaptureSettings::default());

    let responses = serve(
        &host,
        &[json!({"action": "ping"}), json!({"action": "export"})],
    )
    .await;

    assert_eq!(responses[0], json!({"success": true}));
    assert_eq!(responses[1]["success"], false);
    assert!(responses[1]["error"]
        .as_str()
        .unwrap()
        .starts_with("Malformed request"));
}

#[tokio::test]
async fn test_clip_flows_through_relay_to_panel() {
    let temp_dir = TempDir::new().unwrap();
    let host_store = setup_store(&temp_dir).await;
    let panel_store = setup_store(&temp_dir).await;

    let (relay, inbox) = relay::channel(8);
    let mut panel = Panel::new(panel_store);
    panel.open().await;
    let worker = tokio::spawn(async move { panel.run(inbox).await });

    let host = Host::new(host_store.clone(), relay, CaptureSettings::default());
    let responses = serve(
        &host,
        &[
            json!({"action": "clipPage", "data": {
                "title": "A", "url": "http://a.test", "content": "hello",
                "wordCount": 1, "readingTime": 1
            }}),
            json!({"action": "capturePage", "data": {
                "title": "B", "url": "http://b.test", "favicon": "",
                "bodyText": "one two three"
            }}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 2);
    for response in &responses {
        assert_eq!(response["success"], true);
        assert!(response["eventId"].is_string());
    }

    drop(host);
    assert_eq!(worker.await.unwrap(), 2);

    let pages = host_store.get_all_snapshots().await.unwrap();
    assert_eq!(pages.len(), 2);
    let b = pages.iter().find(|p| p.title == "B").unwrap();
    assert_eq!(b.content, "one two three");
    assert_eq!(b.word_count, Some(3));
    assert_eq!(b.favicon, None);
}

#[tokio::test]
async fn test_get_all_delete_and_clear() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(&temp_dir).await;
    let a = store
        .add_snapshot(webclip::NewSnapshot::new("A", "http://a.test", "hello").with_metrics(1, 1))
        .await
        .unwrap();
    store
        .add_snapshot(webclip::NewSnapshot::new("B", "http://b.test", "world"))
        .await
        .unwrap();

    let (relay, _inbox) = relay::channel(1);
    let host = Host::new(store.clone(), relay, CaptureSettings::default());

    let responses = serve(
        &host,
        &[
            json!({"action": "getAll"}),
            json!({"action": "delete", "id": a.as_i64()}),
            json!({"action": "delete", "id": 4242}),
            json!({"action": "getAll"}),
            json!({"action": "clearAll"}),
            json!({"action": "getAll"}),
        ],
    )
    .await;

    let first = responses[0]["pages"].as_array().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0]["wordCount"], 1);
    assert!(first[1].get("wordCount").is_none());

    assert_eq!(responses[1], json!({"success": true}));
    assert_eq!(responses[2], json!({"success": true}));

    let after_delete = responses[3]["pages"].as_array().unwrap();
    assert_eq!(after_delete.len(), 1);
    assert_eq!(after_delete[0]["title"], "B");

    assert_eq!(responses[4], json!({"success": true}));
    assert_eq!(responses[5]["pages"], json!([]));
}

#[tokio::test]
async fn test_uninitialized_store_reports_failure() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir
        .path()
        .join("clips.db")
        .to_string_lossy()
        .to_string();
    let store = Arc::new(SnapshotStore::new(path, 1));
    let (relay, _inbox) = relay::channel(1);
    let host = Host::new(store, relay, CaptureSettings::default());

    let responses = serve(&host, &[json!({"action": "getAll"})]).await;
    assert_eq!(
        responses[0],
        json!({"success": false, "error": "Store not initialized"})
    );
}

#[tokio::test]
async fn test_clip_without_panel_reports_closed_relay() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(&temp_dir).await;
    let (relay, inbox) = relay::channel(1);
    drop(inbox);
    let host = Host::new(store, relay, CaptureSettings::default());

    let responses = serve(
        &host,
        &[json!({"action": "clipPage", "data": {"url": "http://a.test"}})],
    )
    .await;
    assert_eq!(responses[0]["success"], false);
}

#[tokio::test]
async fn test_oversized_response_keeps_host_serving() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(&temp_dir).await;
    let content = "word ".repeat(100_000);
    for i in 0..3 {
        store
            .add_snapshot(webclip::NewSnapshot::new(
                format!("p{}", i),
                "http://a.test",
                content.as_str(),
            ))
            .await
            .unwrap();
    }

    let (relay, _inbox) = relay::channel(1);
    let host = Host::new(store.clone(), relay, CaptureSettings::default());

    let responses = serve(
        &host,
        &[
            json!({"action": "getAll"}),
            json!({"action": "ping"}),
            json!({"action": "clearAll"}),
            json!({"action": "getAll"}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["success"], false);
    assert!(responses[0]["error"]
        .as_str()
        .unwrap()
        .contains("exceeds the 1 MiB limit"));
    assert_eq!(responses[1], json!({"success": true}));
    assert_eq!(responses[2], json!({"success": true}));
    assert_eq!(responses[3]["pages"], json!([]));
}
