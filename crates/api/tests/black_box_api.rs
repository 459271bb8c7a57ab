use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio_stream::StreamExt;

use stockroom_api::app::{build_app, services::AppServices};
use stockroom_infra::AppConfig;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let config = AppConfig {
            shared_secret: SECRET.to_string(),
            ..AppConfig::default()
        };
        let services = Arc::new(AppServices::build(config).await.expect("services"));
        let app = build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        self.services.shutdown();
    }
}

struct Crew {
    supervisor: String,
    agent1: String,
    agent2: String,
}

async fn post_json(client: &reqwest::Client, url: String, body: Value) -> reqwest::Response {
    client.post(url).bearer_auth(SECRET).json(&body).send().await.unwrap()
}

async fn create_material(client: &reqwest::Client, server: &TestServer, body: Value) -> Value {
    let res = post_json(client, server.url("/materials"), body).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn register_crew(client: &reqwest::Client, server: &TestServer) -> Crew {
    let mut ids = Vec::new();
    for (name, badge, role) in [
        ("Awa Diallo", "S-001", "supervisor"),
        ("Jean Kouassi", "A-101", "agent"),
        ("Marc Yao", "A-102", "agent"),
    ] {
        let res = post_json(
            client,
            server.url("/staff"),
            json!({ "name": name, "badge": badge, "role": role }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        ids.push(body["id"].as_str().unwrap().to_string());
    }
    Crew {
        supervisor: ids[0].clone(),
        agent1: ids[1].clone(),
        agent2: ids[2].clone(),
    }
}

fn submission(crew: &Crew, materials: Value) -> Value {
    json!({
        "supervisor_id": crew.supervisor,
        "agent1_id": crew.agent1,
        "agent2_id": crew.agent2,
        "materials": materials,
        "note": "night shift",
    })
}

async fn get_json(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).bearer_auth(SECRET).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_the_shared_secret() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/materials")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/materials"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/materials"))
        .bearer_auth(SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_returns_the_token_for_the_right_password() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/login"))
        .json(&json!({ "username": "admin", "password": SECRET }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["role"], "admin");
    assert_eq!(body["token"], SECRET);

    let res = client
        .post(server.url("/login"))
        .json(&json!({ "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_debits_stock_and_records_history() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;

    create_material(
        &client,
        &server,
        json!({ "id": "gloves", "name": "Gloves", "quantity": 40, "unit_price": 250 }),
    )
    .await;
    create_material(&client, &server, json!({ "id": "masks", "name": "Masks", "quantity": 30 })).await;

    let res = post_json(
        &client,
        server.url("/requests"),
        submission(&crew, json!({ "gloves": 10, "masks": 2 })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let record: Value = res.json().await.unwrap();
    assert_eq!(record["id"], 1);
    assert_eq!(record["total_value"], 2500);
    assert_eq!(record["lines"][0]["material_id"], "gloves");
    assert_eq!(record["requester"]["supervisor"]["name"], "Awa Diallo");

    let (status, gloves) = get_json(&client, server.url("/materials/gloves")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gloves["quantity"], 30);
    assert_eq!(gloves["level"], "normal");

    let (status, fetched) = get_json(&client, server.url("/requests/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn insufficient_stock_is_a_conflict_and_debits_nothing() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;

    create_material(&client, &server, json!({ "id": "gloves", "name": "Gloves", "quantity": 40 })).await;
    create_material(&client, &server, json!({ "id": "masks", "name": "Masks", "quantity": 3 })).await;

    let res = post_json(
        &client,
        server.url("/requests"),
        submission(&crew, json!({ "gloves": 10, "masks": 5 })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["material"], "masks");
    assert_eq!(body["requested"], 5);
    assert_eq!(body["available"], 3);
    assert_eq!(body["shortfall"], 2);

    let (_, gloves) = get_json(&client, server.url("/materials/gloves")).await;
    assert_eq!(gloves["quantity"], 40);

    let (_, history) = get_json(&client, server.url("/requests")).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn malformed_submissions_are_bad_requests() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;
    create_material(&client, &server, json!({ "id": "gloves", "name": "Gloves", "quantity": 40 })).await;

    let res = post_json(&client, server.url("/requests"), submission(&crew, json!({ "gloves": 0 }))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = post_json(&client, server.url("/requests"), submission(&crew, json!({}))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/requests"))
        .bearer_auth(SECRET)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;

    let res = post_json(&client, server.url("/requests"), submission(&crew, json!({ "ghost": 1 }))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    create_material(&client, &server, json!({ "id": "gloves", "name": "Gloves", "quantity": 40 })).await;
    let mut body = submission(&crew, json!({ "gloves": 1 }));
    body["agent2_id"] = json!(uuid::Uuid::now_v7().to_string());
    let res = post_json(&client, server.url("/requests"), body).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let (status, _) = get_json(&client, server.url("/materials/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&client, server.url("/predictions/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;
    create_material(&client, &server, json!({ "id": "gloves", "name": "Gloves", "quantity": 100 })).await;

    for qty in 1..=4 {
        let res = post_json(&client, server.url("/requests"), submission(&crew, json!({ "gloves": qty }))).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let (status, history) = get_json(&client, server.url("/requests?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![4, 3]);
}

#[tokio::test]
async fn stock_alerts_list_every_material_most_severe_first() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;
    create_material(&client, &server, json!({ "id": "gloves", "name": "Gloves", "quantity": 20 })).await;
    create_material(&client, &server, json!({ "id": "masks", "name": "Masks", "quantity": 100 })).await;

    let res = post_json(&client, server.url("/requests"), submission(&crew, json!({ "gloves": 16 }))).await;
    assert_eq!(res.status(), StatusCode::OK);

    let (status, alerts) = get_json(&client, server.url("/stock-alerts")).await;
    assert_eq!(status, StatusCode::OK);
    let alerts = alerts.as_array().unwrap().clone();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0]["material"]["id"], "gloves");
    assert_eq!(alerts[0]["level"], "critique");
    assert_eq!(alerts[1]["material"]["id"], "masks");
    assert_eq!(alerts[1]["level"], "normal");
    assert_eq!(alerts[1]["prediction"]["should_reorder"], false);
}

#[tokio::test]
async fn trends_and_predictions_follow_committed_history() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;
    create_material(
        &client,
        &server,
        json!({ "id": "gloves", "name": "Gloves", "quantity": 100, "unit_price": 100 }),
    )
    .await;

    let res = post_json(&client, server.url("/requests"), submission(&crew, json!({ "gloves": 10 }))).await;
    assert_eq!(res.status(), StatusCode::OK);

    // The trend projection is fed asynchronously; poll until it catches up.
    let mut trends = Value::Null;
    for _ in 0..100 {
        let (status, body) = get_json(&client, server.url("/trends?top=3")).await;
        assert_eq!(status, StatusCode::OK);
        if !body["top_materials"].as_array().unwrap().is_empty() {
            trends = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(trends["top_materials"][0]["material_id"], "gloves");
    assert_eq!(trends["top_materials"][0]["cumulative_usage"], 10);
    let months = trends["monthly_trends"].as_object().unwrap();
    assert_eq!(months.len(), 1);
    let bucket = months.values().next().unwrap();
    assert_eq!(bucket["count"], 1);
    assert_eq!(bucket["total_value"], 1000);

    let (status, prediction) = get_json(&client, server.url("/predictions/gloves")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prediction["material_id"], "gloves");
    assert_eq!(prediction["current_quantity"], 90);
    // The current month is still open, so it is not part of the window yet.
    assert_eq!(prediction["monthly_usage"], json!([]));
    assert_eq!(prediction["should_reorder"], false);
    assert_eq!(prediction["confidence"], "low");
}

#[tokio::test]
async fn notifications_stream_reports_commits() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;
    create_material(&client, &server, json!({ "id": "gloves", "name": "Gloves", "quantity": 40 })).await;

    let res = client
        .get(server.url("/notifications"))
        .bearer_auth(SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let mut stream = res.bytes_stream();

    let res = post_json(&client, server.url("/requests"), submission(&crew, json!({ "gloves": 5 }))).await;
    assert_eq!(res.status(), StatusCode::OK);

    let mut received = String::new();
    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            received.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if received.contains("success") {
                return;
            }
        }
    })
    .await;

    assert!(outcome.is_ok(), "no success event within timeout, got: {received}");
    assert!(received.contains("gloves"));
}

#[tokio::test]
async fn materials_can_be_restocked_patched_and_removed() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    create_material(&client, &server, json!({ "id": "tape", "name": "Tape", "quantity": 4 })).await;

    let res = post_json(&client, server.url("/materials/tape/restock"), json!({ "quantity": 20 })).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["quantity"], 24);
    assert_eq!(body["level"], "normal");

    let res = post_json(&client, server.url("/materials/tape/restock"), json!({ "quantity": 0 })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .patch(server.url("/materials/tape"))
        .bearer_auth(SECRET)
        .json(&json!({ "location": "Shelf B" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["location"], "Shelf B");
    assert_eq!(body["quantity"], 24);

    let res = client
        .delete(server.url("/materials/tape"))
        .bearer_auth(SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, _) = get_json(&client, server.url("/materials/tape")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn staff_members_can_be_updated() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let crew = register_crew(&client, &server).await;

    let res = client
        .patch(server.url(&format!("/staff/{}", crew.agent1)))
        .bearer_auth(SECRET)
        .json(&json!({ "name": "Jean K. Kouassi", "badge": "A-111", "role": "agent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], crew.agent1.as_str());
    assert_eq!(body["badge"], "A-111");

    let (_, fetched) = get_json(&client, server.url(&format!("/staff/{}", crew.agent1))).await;
    assert_eq!(fetched["name"], "Jean K. Kouassi");

    // Badge already held by the other agent.
    let res = client
        .patch(server.url(&format!("/staff/{}", crew.agent1)))
        .bearer_auth(SECRET)
        .json(&json!({ "name": "Jean", "badge": "A-102", "role": "agent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .patch(server.url(&format!("/staff/{}", uuid::Uuid::now_v7())))
        .bearer_auth(SECRET)
        .json(&json!({ "name": "Nobody", "role": "agent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_staff_ids_get_a_json_error() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(&client, server.url("/staff/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let res = client
        .delete(server.url("/staff/not-a-uuid"))
        .bearer_auth(SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}
