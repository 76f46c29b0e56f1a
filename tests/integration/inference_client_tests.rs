//! Integration tests for the chat-completions client against a local stub
//! server.

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use task_harvester::config::LlmConfig;
use task_harvester::inference::{OpenAiClient, TaskInference};
use task_harvester::AppError;

/// Serve a completions endpoint that always answers with `status` and
/// `body`, returning a client pointed at it.
async fn client_for(status: StatusCode, body: &'static str) -> OpenAiClient {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || async move { (status, body) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    OpenAiClient::new(&LlmConfig {
        api_base: format!("http://{addr}/v1"),
        api_key: "sk-test".into(),
        ..LlmConfig::default()
    })
    .expect("client")
}

#[tokio::test]
async fn completion_text_is_returned() {
    let client = client_for(
        StatusCode::OK,
        r#"{"choices":[{"message":{"content":" {\"title\": \"x\"} "}}]}"#,
    )
    .await;

    let text = client.complete("system", "Message: hi").await.expect("completion");
    assert_eq!(text.as_deref(), Some(r#"{"title": "x"}"#));
}

#[tokio::test]
async fn oversized_input_is_rejected_for_that_message_only() {
    let client = client_for(
        StatusCode::BAD_REQUEST,
        r#"{"error":{"code":"context_length_exceeded"}}"#,
    )
    .await;

    let err = client
        .complete("system", "Message: a very long paste")
        .await
        .expect_err("400 must fail");

    assert!(err.is_message_scoped());
    assert!(matches!(err, AppError::Rejected(msg) if msg.contains("context_length_exceeded")));
}

#[tokio::test]
async fn rate_limit_and_auth_failures_are_channel_wide() {
    for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::UNAUTHORIZED] {
        let client = client_for(status, "{}").await;

        let err = client
            .complete("system", "Message: hi")
            .await
            .expect_err("must fail");

        assert!(matches!(err, AppError::Llm(_)), "{status}: {err}");
    }
}
