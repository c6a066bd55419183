//! History persistence, listing and statistics.

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

mod common;

fn client_scan(id: &str, timestamp: &str, flagged: bool, confidence: f64) -> Value {
    json!({
        "id": id,
        "timestamp": timestamp,
        "content": "Breaking: something happened",
        "imageUrl": null,
        "isAIGenerated": flagged,
        "confidenceScore": confidence,
        "riskLevel": if flagged { "high" } else { "low" },
        "indicators": ["odd phrasing", "no sources"],
        "factCheckSuggestion": "Search for primary reporting",
        "verdict": if flagged { "Likely synthetic" } else { "Looks authentic" }
    })
}

#[tokio::test]
async fn saved_scans_come_back_newest_first() {
    let app = common::spawn_app().await;
    let (token, _) = app.register("alice", "secret1").await;

    for scan in [
        client_scan("scan-1", "2024-05-01T10:00:00.000Z", true, 80.0),
        client_scan("scan-2", "2024-05-03T10:00:00.000Z", false, 60.0),
        client_scan("scan-3", "2024-05-02T10:00:00.000Z", true, 100.0),
    ] {
        let (status, body) = app
            .request(Method::POST, "/api/scans", Some(&token), Some(scan))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
    }

    let (status, body) = app
        .request(Method::GET, "/api/scans", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let scans = body.as_array().unwrap();
    let ids: Vec<_> = scans.iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["scan-2", "scan-3", "scan-1"]);
    assert_eq!(scans[0], client_scan("scan-2", "2024-05-03T10:00:00.000Z", false, 60.0));

    let (status, stats) = app
        .request(Method::GET, "/api/scans/stats", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalScanned"], 3);
    assert_eq!(stats["flagged"], 2);
    assert_eq!(stats["verified"], 1);
    assert!((stats["accuracy"].as_f64().unwrap() - 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn stats_for_new_user_are_zero() {
    let app = common::spawn_app().await;
    let (token, _) = app.register("alice", "secret1").await;

    let (status, stats) = app
        .request(Method::GET, "/api/scans/stats", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stats,
        json!({ "totalScanned": 0, "flagged": 0, "verified": 0, "accuracy": 0.0 })
    );
}

#[tokio::test]
async fn history_is_private_to_each_user() {
    let app = common::spawn_app().await;
    let (alice, _) = app.register("alice", "secret1").await;
    let (bob, _) = app.register("bob", "secret2").await;

    app.request(
        Method::POST,
        "/api/scans",
        Some(&alice),
        Some(client_scan("alice-1", "2024-05-01T10:00:00.000Z", true, 90.0)),
    )
    .await;

    let (_, body) = app.request(Method::GET, "/api/scans", Some(&bob), None).await;
    assert_eq!(body, json!([]));

    let (_, stats) = app
        .request(Method::GET, "/api/scans/stats", Some(&bob), None)
        .await;
    assert_eq!(stats["totalScanned"], 0);
}

#[tokio::test]
async fn invalid_risk_level_is_rejected() {
    let app = common::spawn_app().await;
    let (token, _) = app.register("alice", "secret1").await;

    let mut scan = client_scan("bad", "2024-05-01T10:00:00.000Z", true, 90.0);
    scan["riskLevel"] = json!("catastrophic");

    let (status, _) = app
        .request(Method::POST, "/api/scans", Some(&token), Some(scan))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.request(Method::GET, "/api/scans", Some(&token), None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn duplicate_scan_id_is_a_store_error() {
    let app = common::spawn_app().await;
    let (token, _) = app.register("alice", "secret1").await;
    let scan = client_scan("same", "2024-05-01T10:00:00.000Z", true, 90.0);

    let (status, _) = app
        .request(Method::POST, "/api/scans", Some(&token), Some(scan.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::POST, "/api/scans", Some(&token), Some(scan))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Database error");
}
