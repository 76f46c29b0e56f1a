//! Integration tests for the task board HTTP API.
//!
//! Each test serves the router on an ephemeral port backed by an
//! in-memory store.

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use task_harvester::api::{cors_layer, router, serve_listener, ApiState};
use task_harvester::models::task::{NewTask, TaskSource};
use task_harvester::persistence::task_repo::TaskRepo;

use super::test_helpers::test_db;

const FRONTEND: &str = "http://localhost:3001";

struct TestServer {
    base: String,
    http: reqwest::Client,
    tasks: TaskRepo,
    ct: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

async fn spawn_server() -> TestServer {
    let db = test_db().await;
    let state = ApiState::new(&db);
    let tasks = state.tasks.clone();
    let app = router(state, cors_layer(&[FRONTEND.to_owned()]).expect("cors"));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");

    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = serve_listener(listener, app, server_ct).await;
    });

    TestServer {
        base: format!("http://{addr}"),
        http: reqwest::Client::new(),
        tasks,
        ct,
    }
}

#[tokio::test]
async fn health_returns_ok() {
    let server = spawn_server().await;

    let resp = server
        .http
        .get(format!("{}/health", server.base))
        .send()
        .await
        .expect("request");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.expect("body"), "ok");
}

#[tokio::test]
async fn create_then_list_tasks() {
    let server = spawn_server().await;

    let resp = server
        .http
        .post(format!("{}/api/tasks", server.base))
        .json(&json!({"title": "  Water plants ", "description": "balcony", "source": "slack"}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.expect("json");
    assert_eq!(created["title"], "Water plants");
    assert_eq!(created["status"], "pending");
    assert!(created["source"].is_null(), "manual tasks carry no source");

    let list: Value = server
        .http
        .get(format!("{}/api/tasks", server.base))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(list.as_array().expect("array").len(), 1);
    assert_eq!(list[0]["id"], created["id"]);
}

#[tokio::test]
async fn list_can_filter_by_source() {
    let server = spawn_server().await;
    for (title, source) in [("from slack", Some(TaskSource::Slack)), ("manual", None)] {
        server
            .tasks
            .create(&NewTask {
                title: title.into(),
                source,
                ..NewTask::default()
            })
            .await
            .expect("seed");
    }

    let list: Value = server
        .http
        .get(format!("{}/api/tasks?source=slack", server.base))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");

    let list = list.as_array().expect("array");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "from slack");
}

#[tokio::test]
async fn blank_title_is_bad_request_with_detail() {
    let server = spawn_server().await;

    let resp = server
        .http
        .post(format!("{}/api/tasks", server.base))
        .json(&json!({"title": "   "}))
        .send()
        .await
        .expect("request");

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["detail"], "title must not be empty");
}

#[tokio::test]
async fn update_changes_status() {
    let server = spawn_server().await;
    let task = server
        .tasks
        .create(&NewTask {
            title: "Review PR".into(),
            ..NewTask::default()
        })
        .await
        .expect("seed");

    let resp = server
        .http
        .put(format!("{}/api/tasks/{}", server.base, task.id))
        .json(&json!({"status": "done"}))
        .send()
        .await
        .expect("request");

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["title"], "Review PR");
}

#[tokio::test]
async fn update_with_null_due_date_clears_it() {
    let server = spawn_server().await;
    let task = server
        .tasks
        .create(&NewTask {
            title: "Renew lease".into(),
            due_date: Some("next Friday".into()),
            ..NewTask::default()
        })
        .await
        .expect("seed");

    let resp = server
        .http
        .put(format!("{}/api/tasks/{}", server.base, task.id))
        .json(&json!({"due_date": null}))
        .send()
        .await
        .expect("request");

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json");
    assert!(body["due_date"].is_null());
    assert_eq!(body["title"], "Renew lease");
    let stored = server.tasks.get_by_id(task.id).await.expect("stored");
    assert!(stored.due_date.is_none());
}

#[tokio::test]
async fn unknown_source_filter_is_bad_request_with_detail() {
    let server = spawn_server().await;

    let resp = server
        .http
        .get(format!("{}/api/tasks?source=bogus", server.base))
        .send()
        .await
        .expect("request");

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json body");
    assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn malformed_json_body_is_bad_request_with_detail() {
    let server = spawn_server().await;

    let resp = server
        .http
        .post(format!("{}/api/tasks", server.base))
        .header("content-type", "application/json")
        .body("{\"title\": ")
        .send()
        .await
        .expect("request");

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json body");
    assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn non_numeric_task_id_is_bad_request_with_detail() {
    let server = spawn_server().await;

    let resp = server
        .http
        .delete(format!("{}/api/tasks/abc", server.base))
        .send()
        .await
        .expect("request");

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json body");
    assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn update_unknown_task_is_not_found() {
    let server = spawn_server().await;

    let resp = server
        .http
        .put(format!("{}/api/tasks/999", server.base))
        .json(&json!({"title": "nope"}))
        .send()
        .await
        .expect("request");

    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["detail"], "task 999 not found");
}

#[tokio::test]
async fn delete_removes_task() {
    let server = spawn_server().await;
    let task = server
        .tasks
        .create(&NewTask {
            title: "Temporary".into(),
            ..NewTask::default()
        })
        .await
        .expect("seed");
    let url = format!("{}/api/tasks/{}", server.base, task.id);

    let resp = server.http.delete(&url).send().await.expect("request");
    assert_eq!(resp.status(), 204);

    let resp = server.http.delete(&url).send().await.expect("request");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn duplicate_client_is_conflict() {
    let server = spawn_server().await;
    let url = format!("{}/api/clients", server.base);
    let body = json!({"name": "Ada", "slack_id": "U1", "email": "ada@example.com"});

    let first = server.http.post(&url).json(&body).send().await.expect("request");
    assert_eq!(first.status(), 201);

    let second = server
        .http
        .post(&url)
        .json(&json!({"name": "Bob", "slack_id": "U1"}))
        .send()
        .await
        .expect("request");
    assert_eq!(second.status(), 409);
    let detail: Value = second.json().await.expect("json");
    assert_eq!(detail["detail"], "slack id already exists");

    let list: Value = server
        .http
        .get(&url)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(list.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn cors_preflight_allows_frontend_origin() {
    let server = spawn_server().await;

    let resp = server
        .http
        .request(reqwest::Method::OPTIONS, format!("{}/api/tasks", server.base))
        .header("Origin", FRONTEND)
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .expect("request");

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .expect("allow-origin header"),
        FRONTEND
    );
    assert_eq!(
        resp.headers()
            .get("access-control-allow-credentials")
            .expect("allow-credentials header"),
        "true"
    );
}

#[tokio::test]
async fn cors_rejects_unknown_origin() {
    let server = spawn_server().await;

    let resp = server
        .http
        .get(format!("{}/api/tasks", server.base))
        .header("Origin", "http://evil.example.com")
        .send()
        .await
        .expect("request");

    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

#[test]
fn invalid_cors_origin_is_config_error() {
    let result = cors_layer(&["bad\norigin".to_owned()]);
    assert!(matches!(result, Err(task_harvester::AppError::Config(_))));
}
