//! HTTP tests against a live server bound to a free local port, backed by
//! the fake chat model and embedder.

mod common;

use common::{line_count, test_config, text, tool_call, FakeChat, FakeEmbedder};
use mindcare::config::Config;
use mindcare::index::build_indexes;
use mindcare::ingest::ingest_documents;
use mindcare::prompts::WELCOME_MESSAGE;
use mindcare::server::run_server_with_backends;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

struct TestServer {
    base: String,
    config: Config,
    chat: Arc<FakeChat>,
    _tmp: TempDir,
}

/// Start a server; `indexed` controls whether the vector index is built.
async fn start(indexed: bool) -> TestServer {
    let tmp = TempDir::new().unwrap();
    let port = find_free_port();
    let mut config = test_config(&tmp);
    config.server.bind = format!("127.0.0.1:{}", port);

    let chat = Arc::new(FakeChat::new());
    let embedder = Arc::new(FakeEmbedder::new());
    if indexed {
        ingest_documents(&config, chat.as_ref(), embedder.as_ref())
            .await
            .unwrap();
        build_indexes(&config, embedder.as_ref()).await.unwrap();
    }

    let server_config = config.clone();
    let server_chat = chat.clone();
    tokio::spawn(async move {
        run_server_with_backends(&server_config, server_chat, embedder)
            .await
            .unwrap();
    });
    wait_for_server(port).await;

    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        config,
        chat,
        _tmp: tmp,
    }
}

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn health_reports_version() {
    let server = start(false).await;
    let body: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn home_and_user_pages_render() {
    let server = start(false).await;

    let home = reqwest::get(format!("{}/", server.base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(home.contains("MindCare Chatbot"));
    assert!(home.contains("Usage Guide"));

    let user = reqwest::get(format!("{}/user", server.base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(user.contains("No data available to display."));
}

#[tokio::test]
async fn chat_page_shows_welcome() {
    let server = start(true).await;
    let html = reqwest::get(format!("{}/chat", server.base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Chào bạn!"));
    assert_eq!(line_count(&server.config.paths.conversation_file), 1);
}

#[tokio::test]
async fn chat_page_without_index_shows_error() {
    let server = start(false).await;
    let resp = reqwest::get(format!("{}/chat", server.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert!(html.contains("class=\"error\""));
    assert!(html.contains("does not exist"));
}

#[tokio::test]
async fn api_chat_turn_and_score() {
    let server = start(true).await;
    let client = reqwest::Client::new();

    server
        .chat
        .push(tool_call("c1", "dsm5_query", json!({ "input": "lo lắng" })));
    server.chat.push(tool_call(
        "c2",
        "save_score",
        json!({ "score": 4, "level": "kém", "content": "mất ngủ", "total_guess": "lo âu" }),
    ));
    server.chat.push(text("Cảm ơn bạn đã chia sẻ."));

    let resp = client
        .post(format!("{}/api/chat", server.base))
        .json(&json!({ "message": "Tôi cảm thấy lo lắng" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["response"], "Cảm ơn bạn đã chia sẻ.");
    assert_eq!(body["messages"], 3);

    let messages: Value = client
        .get(format!("{}/api/messages", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = messages["messages"].as_array().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0]["content"], WELCOME_MESSAGE);
    assert_eq!(list[1]["role"], "user");

    let scores: Value = client
        .get(format!("{}/api/scores", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = scores["scores"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["Level"], "kém");

    let time = entries[0]["Time"].as_str().unwrap();
    let one = client
        .get(format!("{}/api/scores/{}", server.base, time.replace(' ', "%20")))
        .send()
        .await
        .unwrap();
    assert_eq!(one.status(), 200);
    let one: Value = one.json().await.unwrap();
    assert_eq!(one["Score"], 4);

    let user = client
        .get(format!("{}/user", server.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(user.contains("<svg"));
    assert!(user.contains("mất ngủ"));
}

#[tokio::test]
async fn api_chat_rejects_empty_message() {
    let server = start(true).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", server.base))
        .json(&json!({ "message": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn api_chat_failure_returns_agent_error() {
    let server = start(true).await;
    server.chat.push_error("rate limited");
    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", server.base))
        .json(&json!({ "message": "xin chào" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "agent_error");
    // only the welcome message was saved
    assert_eq!(line_count(&server.config.paths.conversation_file), 1);
}

#[tokio::test]
async fn unknown_score_time_is_not_found() {
    let server = start(false).await;
    let resp = reqwest::get(format!(
        "{}/api/scores/2020-01-01%2000:00:00",
        server.base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn form_post_and_clear_history() {
    let server = start(true).await;
    let client = no_redirect_client();

    let resp = client
        .post(format!("{}/chat", server.base))
        .form(&[("message", "Hôm nay mình hơi buồn")])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(line_count(&server.config.paths.conversation_file), 3);

    let resp = client
        .post(format!("{}/chat/clear", server.base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(
        resp.headers()["location"].to_str().unwrap(),
        "/chat?cleared=1"
    );
    assert!(!server.config.paths.conversation_file.exists());

    let html = client
        .get(format!("{}/chat?cleared=1", server.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Đã xóa lịch sử hội thoại!"));
    assert_eq!(html.matches("Chào bạn!").count(), 1);
    assert_eq!(line_count(&server.config.paths.conversation_file), 1);
}

#[tokio::test]
async fn api_clear_resets_transcript() {
    let server = start(true).await;
    let client = reqwest::Client::new();
    client
        .post(format!("{}/api/chat", server.base))
        .json(&json!({ "message": "xin chào" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/api/clear", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let messages: Value = client
        .get(format!("{}/api/messages", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(messages["messages"].as_array().unwrap().is_empty());
}
