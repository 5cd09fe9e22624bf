use reqwest::StatusCode;
use serde_json::json;

use arcana_api::app::build_app;
use arcana_api::config::AppConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod (in-memory services), bound to an ephemeral port.
        let app = build_app(&AppConfig::default()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn assert_job_id_shape(job_id: &str) {
    // job-<unix_ms>-<9 lowercase alphanumeric chars>
    let rest = job_id.strip_prefix("job-").expect("missing job- prefix");
    let (millis, suffix) = rest.rsplit_once('-').expect("missing suffix separator");
    assert!(!millis.is_empty() && millis.bytes().all(|b| b.is_ascii_digit()), "bad millis in {job_id}");
    assert_eq!(suffix.len(), 9, "bad suffix length in {job_id}");
    assert!(
        suffix.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()),
        "bad suffix charset in {job_id}"
    );
}

async fn topup(client: &reqwest::Client, base_url: &str, user: &str, amount: i64) {
    let res = client
        .post(format!("{base_url}/credits/topup"))
        .json(&json!({ "userIdentifier": user, "amount": amount }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn submit(
    client: &reqwest::Client,
    base_url: &str,
    question: &str,
    user: Option<&str>,
) -> reqwest::Response {
    let mut body = json!({ "question": question });
    if let Some(user) = user {
        body["userIdentifier"] = json!(user);
    }
    client
        .post(format!("{base_url}/predict"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

/// The workflow is fire-and-forget; poll until the job reaches a terminal
/// status.
async fn poll_until_terminal(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
) -> serde_json::Value {
    for _ in 0..200 {
        let res = client
            .get(format!("{base_url}/predict/{job_id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();

        match body["status"].as_str() {
            Some("COMPLETED") | Some("FAILED") => return body,
            _ => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
        }
    }
    panic!("job {job_id} did not reach a terminal status within timeout");
}

async fn balance_of(client: &reqwest::Client, base_url: &str, user: &str) -> i64 {
    let res = client
        .get(format!("{base_url}/credits/{user}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    body["balance"].as_i64().unwrap()
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn submit_then_poll_to_completion() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    topup(&client, &srv.base_url, "u1", 1).await;

    let res = submit(&client, &srv.base_url, "Will I find love?", Some("u1")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "PENDING");
    let job_id = body["jobId"].as_str().unwrap().to_string();
    assert_job_id_shape(&job_id);

    let terminal = poll_until_terminal(&client, &srv.base_url, &job_id).await;
    assert_eq!(terminal["status"], "COMPLETED");
    assert_eq!(terminal["question"], "Will I find love?");
    assert!(terminal["completedAt"].is_string());

    let result = &terminal["result"];
    let selected = result["selectedCards"].as_array().unwrap();
    let recommended = result["analysis"]["recommended_count"].as_u64().unwrap();
    assert_eq!(selected.len() as u64, recommended);
    assert_eq!(
        result["reading"]["cards"].as_array().unwrap().len(),
        selected.len()
    );

    // One credit spent.
    assert_eq!(balance_of(&client, &srv.base_url, "u1").await, 0);
}

#[tokio::test]
async fn disapproved_question_fails_without_charge() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    topup(&client, &srv.base_url, "u2", 1).await;

    let res = submit(
        &client,
        &srv.base_url,
        "Can you diagnose my illness?",
        Some("u2"),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let terminal = poll_until_terminal(&client, &srv.base_url, &job_id).await;
    assert_eq!(terminal["status"], "FAILED");
    assert!(terminal["result"].is_null());
    assert!(terminal["error"].is_string());

    // Policy rejection never reaches the ledger.
    assert_eq!(balance_of(&client, &srv.base_url, "u2").await, 1);
}

#[tokio::test]
async fn blank_question_is_a_validation_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = submit(&client, &srv.base_url, "   ", None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn oversized_question_is_a_validation_error() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = submit(&client, &srv.base_url, &"x".repeat(501), None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn second_submission_inside_cooldown_is_limited() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    topup(&client, &srv.base_url, "u3", 2).await;

    let res = submit(&client, &srv.base_url, "First question?", Some("u3")).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = submit(&client, &srv.base_url, "Second question?", Some("u3")).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "TOO_MANY_REQUESTS");
    let retry_after = body["retryAfter"].as_u64().unwrap();
    assert!((1..=120).contains(&retry_after), "retryAfter={retry_after}");
}

#[tokio::test]
async fn insufficient_credits_map_to_402() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = submit(&client, &srv.base_url, "Am I covered?", Some("pauper")).await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "INSUFFICIENT_CREDITS");
}

#[tokio::test]
async fn anonymous_submission_skips_credit_and_cooldown_checks() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = submit(&client, &srv.base_url, "What lies ahead?", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let terminal = poll_until_terminal(&client, &srv.base_url, &job_id).await;
    assert_eq!(terminal["status"], "COMPLETED");

    // A second anonymous submission is not rate limited.
    let res = submit(&client, &srv.base_url, "And after that?", None).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_and_unknown_job_ids() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/predict/not-a-job-id", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "INVALID_JOB_ID");

    // Well-formed but never issued.
    let res = client
        .get(format!("{}/predict/job-1700000000000-abcdefghi", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "PREDICTION_NOT_FOUND");
}

#[tokio::test]
async fn card_catalog_is_served_read_only() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/cards", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 78);

    let res = client
        .get(format!("{}/cards/0", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["name"], "The Fool");

    let res = client
        .get(format!("{}/cards/99", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_users_get_independent_jobs() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let mut jobs = Vec::new();
    for (user, question) in [
        ("c1", "Will I find love?"),
        ("c2", "Should I change my job?"),
        ("c3", "What about my finances?"),
    ] {
        topup(&client, &srv.base_url, user, 1).await;
        let res = submit(&client, &srv.base_url, question, Some(user)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        jobs.push((user, body["jobId"].as_str().unwrap().to_string()));
    }

    for (user, job_id) in jobs {
        let terminal = poll_until_terminal(&client, &srv.base_url, &job_id).await;
        assert_eq!(terminal["status"], "COMPLETED", "user {user}");
        assert_eq!(balance_of(&client, &srv.base_url, user).await, 0);
    }
}
