//! Coordinator behavior against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use confab_client::chat::ChatApi;
use confab_client::config::Config;
use confab_client::http::Transport;
use confab_session::{SessionCoordinator, SessionPhase};

fn coordinator_for(server: &MockServer, api_key: Option<&str>) -> SessionCoordinator {
    let config = Config {
        api_key: api_key.map(str::to_string),
        base_url: server.uri(),
        user: "admin".to_string(),
        request_timeout_secs: 2,
    };
    SessionCoordinator::new(ChatApi::new(Arc::new(Transport::new(&config).unwrap())))
}

fn session_body(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("session {id}"),
        "inputs": {},
        "status": "normal",
        "introduction": "",
        "created_at": 1_700_000_000,
        "updated_at": 1_700_000_100
    })
}

fn message_body(id: &str, conversation_id: &str, created_at: i64) -> Value {
    json!({
        "id": id,
        "conversation_id": conversation_id,
        "inputs": {},
        "query": "question",
        "answer": "answer",
        "created_at": created_at
    })
}

fn page_body(data: Vec<Value>) -> Value {
    json!({"data": data, "has_more": false, "limit": 20})
}

async fn mount_conversations(server: &MockServer, data: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/chat/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(data)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn refresh_replaces_the_whole_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(vec![
            session_body("s1"),
            session_body("s2"),
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_conversations(&server, vec![session_body("s3")]).await;

    let coordinator = coordinator_for(&server, Some("app-key"));

    coordinator.refresh_sessions().await.unwrap();
    let first: Vec<String> = coordinator.sessions().iter().map(|s| s.id.clone()).collect();
    assert_eq!(first, ["s1", "s2"]);

    coordinator.refresh_sessions().await.unwrap();
    let second: Vec<String> = coordinator.sessions().iter().map(|s| s.id.clone()).collect();
    // Stale entries are dropped, not merged.
    assert_eq!(second, ["s3"]);
}

#[tokio::test]
async fn refresh_without_credential_makes_no_network_call() {
    let server = MockServer::start().await;
    let coordinator = coordinator_for(&server, None);

    coordinator.refresh_sessions().await.unwrap();

    assert!(coordinator.sessions().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_with_empty_id_makes_no_network_call() {
    let server = MockServer::start().await;
    let coordinator = coordinator_for(&server, Some("app-key"));
    coordinator.set_active_session("s1");

    coordinator.delete_session("", true).await.unwrap();

    assert_eq!(coordinator.active_session_id(), "s1");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_the_active_session_aborts_and_resets_to_idle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/messages"))
        .and(query_param("conversation_id", "s1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_body(vec![message_body("m1", "s1", 10)]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/chat/conversations/s1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_conversations(&server, vec![]).await;

    let coordinator = coordinator_for(&server, Some("app-key"));
    coordinator.set_active_session("s1");

    let in_flight = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.load_messages(false).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(coordinator.is_loading());

    coordinator.delete_session("s1", true).await.unwrap();

    assert_eq!(coordinator.active_session_id(), "");
    assert!(coordinator.messages().is_empty());
    assert_eq!(coordinator.phase(), SessionPhase::Idle);

    let err = in_flight.await.unwrap().unwrap_err();
    assert!(err.is_aborted());
    assert!(!coordinator.is_loading());
}

#[tokio::test]
async fn deleting_an_inactive_session_keeps_the_buffer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/messages"))
        .and(query_param("conversation_id", "s1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page_body(vec![message_body("m1", "s1", 10)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/chat/conversations/s2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_conversations(&server, vec![session_body("s1")]).await;

    let coordinator = coordinator_for(&server, Some("app-key"));
    coordinator.set_active_session("s1");
    coordinator.load_messages(false).await.unwrap();

    coordinator.delete_session("s2", true).await.unwrap();

    assert_eq!(coordinator.active_session_id(), "s1");
    assert_eq!(coordinator.messages().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn fire_and_forget_delete_still_refreshes_the_list() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/chat/conversations/s2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_conversations(&server, vec![session_body("s1")]).await;

    let coordinator = coordinator_for(&server, Some("app-key"));
    coordinator.delete_session("s2", false).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let ids: Vec<String> = coordinator.sessions().iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, ["s1"]);
}

#[tokio::test]
async fn loaded_messages_are_sorted_ascending_by_created_at() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/messages"))
        .and(query_param("conversation_id", "s1"))
        .and(query_param("limit", "100"))
        .and(query_param("user", "admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(vec![
            message_body("m3", "s1", 30),
            message_body("m1", "s1", 10),
            message_body("m2", "s1", 20),
        ])))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server, Some("app-key"));
    coordinator.set_active_session("s1");
    coordinator.load_messages(false).await.unwrap();

    let messages = coordinator.messages();
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["m1", "m2", "m3"]);
    for pair in messages.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
    }
    assert_eq!(coordinator.phase(), SessionPhase::Loaded);
}

#[tokio::test]
async fn loading_flag_resets_even_when_the_fetch_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server, Some("app-key"));
    coordinator.set_active_session("s1");

    let err = coordinator.load_messages(false).await.unwrap_err();
    assert_eq!(err.message, "boom");
    assert!(!coordinator.is_loading());
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_load_never_raises_the_loading_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_body(vec![message_body("m1", "s1", 10)]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server, Some("app-key"));
    coordinator.set_active_session("s1");

    let in_flight = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.load_messages(true).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!coordinator.is_loading());

    in_flight.await.unwrap().unwrap();
    assert_eq!(coordinator.messages().len(), 1);
}

#[tokio::test]
async fn load_without_credential_makes_no_network_call() {
    let server = MockServer::start().await;
    let coordinator = coordinator_for(&server, None);
    coordinator.set_active_session("s1");

    coordinator.load_messages(false).await.unwrap();

    assert!(coordinator.messages().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_messages_resets_active_id_and_buffer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chat/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page_body(vec![message_body("m1", "s1", 10)])),
        )
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server, Some("app-key"));
    coordinator.set_active_session("s1");
    coordinator.load_messages(false).await.unwrap();
    assert_eq!(coordinator.phase(), SessionPhase::Loaded);

    coordinator.clear_messages();

    assert_eq!(coordinator.active_session_id(), "");
    assert!(coordinator.messages().is_empty());
    assert_eq!(coordinator.phase(), SessionPhase::Idle);
}
