//! End-to-end HTTP scenarios exercised through `axum-test`.

use axum_test::TestServer;
use lobby_coordinator::config::ServerConfig;
use lobby_coordinator::server::{ws, AppState};
use serde_json::{json, Value};

fn fast_config() -> ServerConfig {
    ServerConfig {
        countdown_seconds: 1,
        post_game_grace_seconds: 1,
        code_length: 4,
        max_players: 2,
        queue_eta_seconds: 30,
        persistence_url: None,
    }
}

fn server() -> TestServer {
    let state = AppState::new(&fast_config());
    let app = ws::router("*").with_state(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn solo_create_join_ready_starts_countdown() {
    let server = server();

    let created = server
        .post("/lobby/create")
        .add_header("X-Device-ID", "a")
        .json(&json!({}))
        .await;
    created.assert_status_ok();
    let created_body: Value = created.json();
    let code = created_body["lobby"]["code"].as_str().unwrap().to_string();
    assert_eq!(created_body["lobby"]["current_players"], 1);

    let joined = server
        .post("/lobby/join")
        .add_header("X-Device-ID", "b")
        .json(&json!({"code": code}))
        .await;
    joined.assert_status_ok();
    let joined_body: Value = joined.json();
    assert_eq!(joined_body["lobby"]["current_players"], 2);

    let ready_a = server
        .post("/lobby/ready")
        .add_header("X-Device-ID", "a")
        .json(&json!({"is_ready": true}))
        .await;
    ready_a.assert_status_ok();

    let ready_b = server
        .post("/lobby/ready")
        .add_header("X-Device-ID", "b")
        .json(&json!({"is_ready": true}))
        .await;
    ready_b.assert_status_ok();
    let ready_b_body: Value = ready_b.json();
    assert_eq!(ready_b_body["lobby"]["status"], "countdown");
}

#[tokio::test]
async fn joining_unknown_code_is_404() {
    let server = server();
    let response = server
        .post("/lobby/join")
        .add_header("X-Device-ID", "a")
        .json(&json!({"code": "ZZZZ"}))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_device_header_is_401() {
    let server = server();
    let response = server.post("/lobby/create").json(&json!({})).await;
    response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn second_join_to_full_lobby_is_409() {
    let server = server();
    let created = server
        .post("/lobby/create")
        .add_header("X-Device-ID", "a")
        .json(&json!({}))
        .await;
    let code = created.json::<Value>()["lobby"]["code"].as_str().unwrap().to_string();

    server
        .post("/lobby/join")
        .add_header("X-Device-ID", "b")
        .json(&json!({"code": code}))
        .await
        .assert_status_ok();

    let third = server
        .post("/lobby/join")
        .add_header("X-Device-ID", "c")
        .json(&json!({"code": code}))
        .await;
    third.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn last_leaver_makes_the_code_reusable() {
    let server = server();
    server
        .post("/lobby/create")
        .add_header("X-Device-ID", "a")
        .json(&json!({}))
        .await
        .assert_status_ok();

    server
        .post("/lobby/leave")
        .add_header("X-Device-ID", "a")
        .json(&json!({}))
        .await
        .assert_status_ok();

    let status = server
        .get("/lobby/status")
        .add_header("X-Device-ID", "a")
        .await;
    status.assert_status_ok();
    let body: Value = status.json();
    assert!(body["lobby"].is_null());
}
