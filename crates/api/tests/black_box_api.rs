use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use stockbook_api::app::services::AppServices;
use stockbook_auth::{JwtClaims, Role};
use stockbook_core::{ProductId, UserId};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, on an ephemeral port.
        let app = stockbook_api::app::build_app(JWT_SECRET.to_string(), Arc::new(AppServices::in_memory()));
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

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(role: Role) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        role,
        active: true,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn create_product(client: &reqwest::Client, srv: &TestServer, token: &str, sku: &str) -> String {
    let res = client
        .post(srv.url("/products"))
        .bearer_auth(token)
        .json(&json!({
            "sku": sku,
            "name": format!("Product {sku}"),
            "purchase_price": "2.00",
            "selling_price": "5.00",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn post_movement(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    kind: &str,
    body: Value,
) -> reqwest::Response {
    client
        .post(srv.url(&format!("/transactions/{kind}")))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/products"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(mint_jwt(Role::Staff))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["role"], "staff");
    let permissions = body["permissions"].as_array().unwrap();
    assert!(permissions.iter().any(|p| p == "stock.record"));
    assert!(!permissions.iter().any(|p| p == "stock.adjust"));
}

#[tokio::test]
async fn purchase_then_sale_updates_balance() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(Role::Manager);
    let id = create_product(&client, &srv, &token, "SKU-100").await;

    let res = post_movement(
        &client,
        &srv,
        &token,
        "purchase",
        json!({ "product_id": id, "quantity": 100, "unit_price": "2.00", "reference_number": "PO-1" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = post_movement(
        &client,
        &srv,
        &token,
        "sale",
        json!({ "product_id": id, "quantity": 30, "unit_price": "5.00" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let recorded: Value = res.json().await.unwrap();
    assert_eq!(recorded["entry"]["total_amount"], "150.00");
    assert_eq!(recorded["entry"]["entry_type"], "sale");
    assert_eq!(recorded["balance"]["quantity"], 70);

    let res = client
        .get(srv.url(&format!("/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let detail: Value = res.json().await.unwrap();
    assert_eq!(detail["stock"]["quantity"], 70);
    assert_eq!(detail["available_quantity"], 70);
    assert_eq!(detail["entries"].as_array().unwrap().len(), 2);
    assert_eq!(detail["entries"][0]["entry_type"], "sale");

    let res = client
        .get(srv.url("/transactions?type=purchase"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let purchases: Value = res.json().await.unwrap();
    assert_eq!(purchases.as_array().unwrap().len(), 1);
    assert_eq!(purchases[0]["reference_number"], "PO-1");

    let res = client
        .get(srv.url(&format!("/products/{id}/reconciliation")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["consistent"], true);
    assert_eq!(report["ledger_quantity"], 70);
}

#[tokio::test]
async fn oversell_is_rejected_and_balance_unchanged() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(Role::Admin);
    let id = create_product(&client, &srv, &token, "SKU-5").await;

    post_movement(
        &client,
        &srv,
        &token,
        "purchase",
        json!({ "product_id": id, "quantity": 5, "unit_price": "1.00" }),
    )
    .await;

    let res = post_movement(
        &client,
        &srv,
        &token,
        "sale",
        json!({ "product_id": id, "quantity": 10, "unit_price": "1.00" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["requested"], 10);
    assert_eq!(body["available"], 5);

    let detail: Value = client
        .get(srv.url(&format!("/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["stock"]["quantity"], 5);
}

#[tokio::test]
async fn invalid_movements_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(Role::Admin);
    let id = create_product(&client, &srv, &token, "SKU-BAD").await;

    let res = post_movement(
        &client,
        &srv,
        &token,
        "purchase",
        json!({ "product_id": id, "quantity": 0, "unit_price": "1.00" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = post_movement(
        &client,
        &srv,
        &token,
        "purchase",
        json!({ "product_id": "nope", "quantity": 1, "unit_price": "1.00" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = post_movement(
        &client,
        &srv,
        &token,
        "sale",
        json!({ "product_id": ProductId::new().to_string(), "quantity": 1, "unit_price": "1.00" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn staff_cannot_adjust_or_edit_catalog() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let manager = mint_jwt(Role::Manager);
    let staff = mint_jwt(Role::Staff);
    let id = create_product(&client, &srv, &manager, "SKU-ADJ").await;

    let adjustment = json!({ "product_id": id, "direction": "in", "quantity": 3, "unit_price": "0" });

    let res = post_movement(&client, &srv, &staff, "adjustment", adjustment.clone()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url("/products"))
        .bearer_auth(&staff)
        .json(&json!({ "sku": "X", "name": "X", "purchase_price": "1", "selling_price": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = post_movement(&client, &srv, &manager, "adjustment", adjustment).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let recorded: Value = res.json().await.unwrap();
    assert_eq!(recorded["entry"]["direction"], "in");
    assert_eq!(recorded["balance"]["quantity"], 3);
}

#[tokio::test]
async fn duplicate_sku_conflicts_and_deleted_product_is_gone() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(Role::Admin);
    let id = create_product(&client, &srv, &token, "SKU-DUP").await;

    let res = client
        .post(srv.url("/products"))
        .bearer_auth(&token)
        .json(&json!({ "sku": "SKU-DUP", "name": "Again", "purchase_price": "1", "selling_price": "2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .delete(srv.url(&format!("/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = post_movement(
        &client,
        &srv,
        &token,
        "purchase",
        json!({ "product_id": id, "quantity": 1, "unit_price": "1.00" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // The SKU is free again once its product is deleted.
    create_product(&client, &srv, &token, "SKU-DUP").await;
}

#[tokio::test]
async fn categories_and_dashboard() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(Role::Admin);

    let res = client
        .post(srv.url("/categories"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Beverages" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let id = create_product(&client, &srv, &token, "SKU-TEA").await;
    post_movement(
        &client,
        &srv,
        &token,
        "purchase",
        json!({ "product_id": id, "quantity": 20, "unit_price": "2.00" }),
    )
    .await;
    post_movement(
        &client,
        &srv,
        &token,
        "sale",
        json!({ "product_id": id, "quantity": 4, "unit_price": "5.00" }),
    )
    .await;

    let res = client
        .get(srv.url("/dashboard/stats"))
        .bearer_auth(mint_jwt(Role::Staff))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stats: Value = res.json().await.unwrap();
    assert_eq!(stats["total_products"], 1);
    assert_eq!(stats["total_categories"], 1);
    assert_eq!(stats["inventory_value"], "32.00");
    assert_eq!(stats["today_sales"], "20.00");
    assert_eq!(stats["recent_entries"].as_array().unwrap().len(), 2);
    assert_eq!(stats["top_products"][0]["product"]["sku"], "SKU-TEA");
    assert_eq!(stats["top_products"][0]["balance"]["quantity"], 16);

    let categories: Value = client
        .get(srv.url("/categories"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(categories[0]["name"], "Beverages");
}

#[tokio::test]
async fn unreadable_bodies_are_json_bad_requests() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(Role::Admin);
    let id = create_product(&client, &srv, &token, "SKU-JSON").await;

    let res = post_movement(
        &client,
        &srv,
        &token,
        "purchase",
        json!({ "product_id": id, "quantity": 2.5, "unit_price": "1.00" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_quantity");

    let res = post_movement(
        &client,
        &srv,
        &token,
        "purchase",
        json!({ "product_id": id, "quantity": 1, "unit_price": 1.005 }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    let res = client
        .post(srv.url("/transactions/sale"))
        .bearer_auth(&token)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"product_id\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    let res = client
        .post(srv.url("/products"))
        .bearer_auth(&token)
        .json(&json!({ "sku": "NO-NAME" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    // Nothing was recorded by any of the above.
    let detail: Value = client
        .get(srv.url(&format!("/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["stock"]["quantity"], 0);
}

#[tokio::test]
async fn category_lifecycle_keeps_products() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(Role::Admin);
    let staff = mint_jwt(Role::Staff);

    let category: Value = client
        .post(srv.url("/categories"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Snacks" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let category_id = category["id"].as_str().unwrap().to_string();
    let category_url = srv.url(&format!("/categories/{category_id}"));

    let res = client
        .post(srv.url("/products"))
        .bearer_auth(&admin)
        .json(&json!({
            "sku": "SKU-CHIPS",
            "name": "Chips",
            "category_id": category_id,
            "purchase_price": "1.00",
            "selling_price": "2.00",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let product: Value = res.json().await.unwrap();
    let product_id = product["id"].as_str().unwrap().to_string();

    let res = client
        .put(&category_url)
        .bearer_auth(&admin)
        .json(&json!({ "name": "Savoury snacks", "description": "crisps and nuts" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let fetched: Value = client
        .get(&category_url)
        .bearer_auth(&staff)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["name"], "Savoury snacks");
    assert_eq!(fetched["description"], "crisps and nuts");

    let res = client.delete(&category_url).bearer_auth(&staff).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client.delete(&category_url).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(&category_url).bearer_auth(&admin).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let detail: Value = client
        .get(srv.url(&format!("/products/{product_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["sku"], "SKU-CHIPS");
    assert!(detail["category_id"].is_null());

    let res = client
        .get(srv.url("/categories/not-a-uuid"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
