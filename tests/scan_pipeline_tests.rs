use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use secops_backend::config::Settings;
use secops_backend::{build_router, AppState};

fn test_settings() -> Settings {
    let mut settings = Settings::new_with_env_file(false).unwrap();
    settings.http_timeout_seconds = 2.0;
    settings.banner_timeout_seconds = 2.0;
    settings
}

async fn post_scan(app: axum::Router, target: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/scans")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "target": target }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

fn finding_names(report: &Value) -> Vec<String> {
    report["vulnerabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn hardened_target_scan_completes_without_findings() {
    let target_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Strict-Transport-Security", "max-age=63072000")
                .insert_header("X-Frame-Options", "DENY")
                .insert_header("X-Content-Type-Options", "nosniff")
                .insert_header("Content-Security-Policy", "default-src 'self'")
                .insert_header("X-XSS-Protection", "1; mode=block"),
        )
        .mount(&target_server)
        .await;

    let asset_db = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ports": [] })))
        .mount(&asset_db)
        .await;

    let mut settings = test_settings();
    settings.asset_db_url = asset_db.uri();
    let state = AppState::new(settings).unwrap();
    let app = build_router(state);

    let target = target_server.address().to_string();
    let (status, report) = post_scan(app.clone(), &target).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["status"], "completed");
    assert_eq!(report["target"], target);
    assert!(report["vulnerabilities"].as_array().unwrap().is_empty());
    // Plain HTTP target: no TLS assessment is attached
    assert!(report.get("tls").is_none());

    // The report is retrievable afterwards
    let id = report["id"].as_str().unwrap();
    let (status, fetched) = get_json(app.clone(), &format!("/api/scans/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], report["id"]);

    let (status, listed) = get_json(app, "/api/scans").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_target_fails_the_scan() {
    let state = AppState::new(test_settings()).unwrap();
    let app = build_router(state);

    // Nothing listens on port 1
    let (status, body) = post_scan(app.clone(), "127.0.0.1:1").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "TARGET_UNREACHABLE");

    // The failed attempt is recorded as a failed report
    let (status, listed) = get_json(app, "/api/scans").await;
    assert_eq!(status, StatusCode::OK);
    let reports = listed.as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["status"], "failed");
    assert_eq!(reports[0]["target"], "127.0.0.1:1");
    assert!(reports[0]["error"].as_str().unwrap().contains("did not respond"));
    assert!(reports[0]["vulnerabilities"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_target_is_rejected_before_any_probe() {
    let state = AppState::new(test_settings()).unwrap();
    let app = build_router(state);

    let (status, body) = post_scan(app, "   ").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn dangerous_ports_and_missing_headers_are_reported() {
    let target_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target_server)
        .await;

    let asset_db = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ports": [23, 3389] })))
        .mount(&asset_db)
        .await;

    let mut settings = test_settings();
    settings.asset_db_url = asset_db.uri();
    let state = AppState::new(settings).unwrap();
    let app = build_router(state);

    let (status, report) = post_scan(app, &target_server.address().to_string()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["status"], "completed");
    assert_eq!(report["ports"], json!([23, 3389]));

    let names = finding_names(&report);
    assert!(names.contains(&"Potentially Dangerous Ports Open".to_string()));
    assert!(names.contains(&"Missing Strict-Transport-Security".to_string()));
    assert!(names.contains(&"Missing X-Frame-Options".to_string()));
    assert!(names.contains(&"Missing X-Content-Type-Options".to_string()));
    assert!(names.contains(&"Missing Content-Security-Policy".to_string()));
    assert!(names.contains(&"Missing X-XSS-Protection".to_string()));

    let dangerous = report["vulnerabilities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["name"] == "Potentially Dangerous Ports Open")
        .unwrap();
    assert_eq!(dangerous["severity"], "high");
    assert_eq!(dangerous["exploitable"], true);
}

#[tokio::test]
async fn fingerprinted_service_is_correlated_against_the_cve_feed() {
    let target_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx/1.18.0")
                .insert_header("Strict-Transport-Security", "max-age=63072000")
                .insert_header("X-Frame-Options", "DENY")
                .insert_header("X-Content-Type-Options", "nosniff")
                .insert_header("Content-Security-Policy", "default-src 'self'")
                .insert_header("X-XSS-Protection", "1; mode=block"),
        )
        .mount(&target_server)
        .await;

    let target_port = target_server.address().port();

    let asset_db = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ports": [target_port] })),
        )
        .mount(&asset_db)
        .await;

    let cve_feed = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("keywordSearch", "nginx 1.18.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vulnerabilities": [
                {
                    "cve": {
                        "id": "CVE-2021-23017",
                        "descriptions": [{ "lang": "en", "value": "resolver heap write" }],
                        "metrics": {
                            "cvssMetricV31": [
                                { "cvssData": { "baseScore": 9.8, "vectorString": "CVSS:3.1/AV:N" } }
                            ]
                        }
                    }
                }
            ]
        })))
        .mount(&cve_feed)
        .await;

    let mut settings = test_settings();
    settings.asset_db_url = asset_db.uri();
    settings.cve_feed_url = cve_feed.uri();
    let state = AppState::new(settings).unwrap();
    let app = build_router(state);

    // Scan the mock server's own address so the banner probe reaches it
    let target = target_server.address().ip().to_string();
    let (status, report) = post_scan(app, &format!("{}:{}", target, target_port)).await;

    assert_eq!(status, StatusCode::CREATED);

    let services = report["services"].as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["service"], "nginx");
    assert_eq!(services[0]["version"], "1.18.0");

    let names = finding_names(&report);
    assert!(names.contains(&"Outdated Service Version".to_string()));
    assert!(names.contains(&"Known Vulnerability: CVE-2021-23017".to_string()));

    let cve = report["vulnerabilities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["name"] == "Known Vulnerability: CVE-2021-23017")
        .unwrap();
    assert_eq!(cve["severity"], "critical");
    assert_eq!(cve["cve"]["id"], "CVE-2021-23017");
    assert_eq!(cve["cve"]["score"], 9.8);
}

#[tokio::test]
async fn unknown_scan_id_returns_not_found() {
    let state = AppState::new(test_settings()).unwrap();
    let app = build_router(state);

    let (status, body) = get_json(
        app,
        &format!("/api/scans/{}", uuid::Uuid::new_v4()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn path_matching_is_checked_on_the_asset_db() {
    // Guard against a regression in URL building: the target is encoded into
    // the lookup path
    let asset_db = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/203.0.113.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ports": [80] })))
        .mount(&asset_db)
        .await;

    let client = secops_backend::services::external::AssetDbClient::new(
        secops_backend::services::external::RateLimitedClient::new(10, 0).unwrap(),
        asset_db.uri(),
        None,
    );

    let ports = client.lookup_ports("203.0.113.9").await.unwrap();
    assert_eq!(ports, vec![80]);
}
