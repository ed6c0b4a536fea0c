use std::collections::HashMap;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use spicecart_auth::{JwtClaims, PrincipalId, Role};
use spicecart_infra::AppConfig;

const JWT_SECRET: &str = "black-box-secret";
const KEY_SECRET: &str = "test-key-secret";
const WEBHOOK_SECRET: &str = "test-webhook-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let vars = HashMap::from([
            ("JWT_SECRET".to_string(), JWT_SECRET.to_string()),
            ("PAYMENT_GATEWAY".to_string(), "offline".to_string()),
            ("RAZORPAY_KEY_SECRET".to_string(), KEY_SECRET.to_string()),
            ("RAZORPAY_WEBHOOK_SECRET".to_string(), WEBHOOK_SECRET.to_string()),
        ]);
        let config = AppConfig::from_map(&vars).expect("valid test config");

        // Same router as prod, bound to an ephemeral port.
        let app = spicecart_api::app::build_app(&config).await.expect("app builds");
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
            client: reqwest::Client::new(),
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
    }
}

fn mint_jwt(jwt_secret: &str, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        roles,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn admin_token() -> String {
    mint_jwt(JWT_SECRET, vec![Role::ADMIN])
}

async fn create_active_product(server: &TestServer, sku: &str, name: &str, price: u64) -> String {
    let token = admin_token();
    let res = server
        .client
        .post(server.url("/api/admin/products"))
        .bearer_auth(&token)
        .json(&json!({
            "sku": sku,
            "name": name,
            "description": "Single-origin, stone ground",
            "category": "Whole Spices",
            "pack_size": "100 g",
            "price": price,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let id = body["id"].as_str().unwrap().to_string();

    let res = server
        .client
        .post(server.url(&format!("/api/admin/products/{id}/activate")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    id
}

fn kochi_address() -> Value {
    json!({
        "line1": "12 Rose Street",
        "landmark": "Near St. Mary's Church",
        "city": "Kochi",
        "pincode": "682001",
    })
}

async fn place_order(
    server: &TestServer,
    product_id: &str,
    quantity: u32,
    payment_method: &str,
    idempotency_key: Option<&str>,
) -> reqwest::Response {
    let mut req = server.client.post(server.url("/api/orders")).json(&json!({
        "customer": {"name": "Anu Thomas", "phone": "+91 98470 12345"},
        "address": kochi_address(),
        "items": [{"product_id": product_id, "quantity": quantity}],
        "payment_method": payment_method,
    }));
    if let Some(key) = idempotency_key {
        req = req.header("Idempotency-Key", key);
    }
    req.send().await.unwrap()
}

async fn change_status(server: &TestServer, order_id: &str, status: &str) -> reqwest::Response {
    server
        .client
        .patch(server.url(&format!("/api/admin/orders/{order_id}/status")))
        .bearer_auth(mint_jwt(JWT_SECRET, vec![Role::STAFF]))
        .json(&json!({ "status": status }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_require_valid_token_and_permission() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/api/admin/orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let forged = mint_jwt("some-other-secret", vec![Role::ADMIN]);
    let res = server
        .client
        .get(server.url("/api/admin/orders"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let staff = mint_jwt(JWT_SECRET, vec![Role::STAFF]);
    let res = server
        .client
        .post(server.url("/api/admin/products"))
        .bearer_auth(&staff)
        .json(&json!({"sku": "X-1", "name": "X", "category": "Y", "price": 100}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    let res = server
        .client
        .get(server.url("/api/admin/whoami"))
        .bearer_auth(&staff)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["roles"], json!(["staff"]));
}

#[tokio::test]
async fn catalog_lists_only_active_products() {
    let server = TestServer::spawn().await;
    let token = admin_token();

    let pepper = create_active_product(&server, "pep-100", "Black Pepper", 12_000).await;

    // A draft stays hidden from the storefront.
    let res = server
        .client
        .post(server.url("/api/admin/products"))
        .bearer_auth(&token)
        .json(&json!({
            "sku": "CAR-50",
            "name": "Green Cardamom",
            "category": "Whole Spices",
            "price": 30_000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let listed: Value = server
        .client
        .get(server.url("/api/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["sku"], "PEP-100");
    assert_eq!(listed[0]["slug"], "black-pepper");

    let res = server.client.get(server.url("/api/products/black-pepper")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let by_id = server.url(&format!("/api/products/{pepper}"));
    let res = server.client.get(by_id).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = server.client.get(server.url("/api/products/green-cardamom")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let categories: Value = server
        .client
        .get(server.url("/api/products/categories"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(categories, json!(["Whole Spices"]));

    let all: Value = server
        .client
        .get(server.url("/api/admin/products"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);

    // Duplicate SKU.
    let res = server
        .client
        .post(server.url("/api/admin/products"))
        .bearer_auth(&token)
        .json(&json!({
            "sku": "PEP-100",
            "name": "Pepper Again",
            "category": "Whole Spices",
            "price": 100,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate");

    // Zero price is rejected by the aggregate.
    let res = server
        .client
        .post(server.url("/api/admin/products"))
        .bearer_auth(&token)
        .json(&json!({"sku": "CLV-50", "name": "Cloves", "category": "Whole Spices", "price": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn price_change_is_idempotent() {
    let server = TestServer::spawn().await;
    let token = admin_token();
    let id = create_active_product(&server, "TUR-200", "Turmeric Powder", 9_000).await;

    for expected_events in [1, 0] {
        let res = server
            .client
            .put(server.url(&format!("/api/admin/products/{id}/price")))
            .bearer_auth(&token)
            .json(&json!({"price": 9_500}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["events_committed"], expected_events);
        assert_eq!(body["product"]["price"], 9_500);
    }

    let res = server
        .client
        .put(server.url("/api/admin/products/not-a-uuid/price"))
        .bearer_auth(&token)
        .json(&json!({"price": 9_500}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn cart_quote_prices_server_side_and_waives_delivery_at_threshold() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;

    let quote: Value = server
        .client
        .post(server.url("/api/cart/quote"))
        .json(&json!({"items": [
            {"product_id": pepper, "quantity": 1},
            {"product_id": pepper, "quantity": 1},
        ]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quote["lines"].as_array().unwrap().len(), 1);
    assert_eq!(quote["subtotal"], 24_000);
    assert_eq!(quote["delivery_fee"], 4_000);
    assert_eq!(quote["total"], 28_000);
    assert_eq!(quote["free_delivery_remaining"], 25_900);

    let quote: Value = server
        .client
        .post(server.url("/api/cart/quote"))
        .json(&json!({"items": [{"product_id": pepper, "quantity": 5}]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quote["delivery_fee"], 0);
    assert_eq!(quote["total"], 60_000);

    let res = server
        .client
        .post(server.url("/api/cart/quote"))
        .json(&json!({"items": [{"product_id": uuid_like(), "quantity": 1}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server
        .client
        .post(server.url("/api/cart/quote"))
        .json(&json!({"items": [{"product_id": pepper, "quantity": 51}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

fn uuid_like() -> String {
    "0190f5b2-7c1e-7a4b-9c3d-2e1f0a9b8c7d".to_string()
}

#[tokio::test]
async fn deliveries_are_restricted_to_one_city() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;

    let check: Value = server
        .client
        .post(server.url("/api/cart/delivery-check"))
        .json(&json!({"city": "  kochi ", "pincode": "682 001"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(check["deliverable"], true);

    let check: Value = server
        .client
        .post(server.url("/api/cart/delivery-check"))
        .json(&json!({"city": "Chennai", "pincode": "600001"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(check["deliverable"], false);
    assert_eq!(check["reason"], "city_not_served");

    let res = server
        .client
        .post(server.url("/api/orders"))
        .json(&json!({
            "customer": {"name": "Ravi", "phone": "9876543210"},
            "address": {"line1": "4 Beach Road", "city": "Chennai", "pincode": "600001"},
            "items": [{"product_id": pepper, "quantity": 1}],
            "payment_method": "cod",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "undeliverable");
}

#[tokio::test]
async fn stale_client_total_is_rejected_with_fresh_quote() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;

    let res = server
        .client
        .post(server.url("/api/orders"))
        .json(&json!({
            "customer": {"name": "Anu", "phone": "9847012345"},
            "address": kochi_address(),
            "items": [{"product_id": pepper, "quantity": 2}],
            "payment_method": "cod",
            "expected_total": 20_000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "price_mismatch");
    assert_eq!(body["details"]["total"], 28_000);
}

#[tokio::test]
async fn checkout_validates_input() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;

    // Not a mobile number.
    let res = server
        .client
        .post(server.url("/api/orders"))
        .json(&json!({
            "customer": {"name": "Anu", "phone": "12345"},
            "address": kochi_address(),
            "items": [{"product_id": pepper, "quantity": 1}],
            "payment_method": "cod",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // Malformed body.
    let res = server
        .client
        .post(server.url("/api/orders"))
        .header("content-type", "application/json")
        .body("{\"customer\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Empty cart.
    let res = server
        .client
        .post(server.url("/api/orders"))
        .json(&json!({
            "customer": {"name": "Anu", "phone": "9847012345"},
            "address": kochi_address(),
            "items": [],
            "payment_method": "cod",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

async fn admin_customers(server: &TestServer) -> Vec<Value> {
    let customers: Value = server
        .client
        .get(server.url("/api/admin/customers"))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    customers.as_array().unwrap().clone()
}

#[tokio::test]
async fn refused_checkout_leaves_customers_untouched() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;
    let checkout = |name: &str, notes: String| {
        json!({
            "customer": {"name": name, "phone": "9847099999"},
            "address": kochi_address(),
            "items": [{"product_id": pepper, "quantity": 1}],
            "payment_method": "cod",
            "notes": notes,
        })
    };

    // Notes over the limit: nothing is registered for a new phone.
    let res = server
        .client
        .post(server.url("/api/orders"))
        .json(&checkout("Ravi Menon", "x".repeat(600)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(admin_customers(&server).await.is_empty());

    let res = server
        .client
        .post(server.url("/api/orders"))
        .json(&checkout("Ravi Menon", "ring twice".to_string()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // A refused checkout does not overwrite a returning customer either.
    let res = server
        .client
        .post(server.url("/api/orders"))
        .json(&checkout("Someone Else", "y".repeat(600)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let customers = admin_customers(&server).await;
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0]["name"], "Ravi Menon");
    assert_eq!(customers[0]["phone"], "9847099999");
}

#[tokio::test]
async fn idempotency_key_returns_the_original_order() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;

    let first = place_order(&server, &pepper, 2, "cod", Some("checkout-abc")).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["created"], true);

    let again = place_order(&server, &pepper, 2, "cod", Some("checkout-abc")).await;
    assert_eq!(again.status(), StatusCode::OK);
    let again: Value = again.json().await.unwrap();
    assert_eq!(again["created"], false);
    assert_eq!(again["events_committed"], 0);
    assert_eq!(again["order"]["id"], first["order"]["id"]);

    let other = place_order(&server, &pepper, 2, "cod", Some("checkout-def")).await;
    assert_eq!(other.status(), StatusCode::CREATED);

    let token = admin_token();
    let orders: Value = server
        .client
        .get(server.url("/api/admin/orders"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.as_array().unwrap().len(), 2);

    // Both orders belong to the one customer keyed by phone.
    let customers: Value = server
        .client
        .get(server.url("/api/admin/customers"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let customers = customers.as_array().unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0]["phone"], "9847012345");

    let customer_id = customers[0]["customer_id"].as_str().unwrap();
    let detail: Value = server
        .client
        .get(server.url(&format!("/api/admin/customers/{customer_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["orders"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn orders_can_be_tracked_by_number_and_phone() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;

    let placed: Value = place_order(&server, &pepper, 1, "cod", None).await.json().await.unwrap();
    let number = placed["order"]["order_number"].as_str().unwrap().to_string();
    assert!(number.starts_with("SC-"));

    let res = server
        .client
        .get(server.url("/api/orders/track"))
        .query(&[("order_number", number.to_lowercase().as_str()), ("phone", "098470 12345")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tracked: Value = res.json().await.unwrap();
    assert_eq!(tracked["id"], placed["order"]["id"]);
    assert_eq!(tracked["status"], "pending");

    let res = server
        .client
        .get(server.url("/api/orders/track"))
        .query(&[("order_number", number.as_str()), ("phone", "9000000000")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cod_status_transitions_are_idempotent() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;

    let placed: Value = place_order(&server, &pepper, 1, "cod", None).await.json().await.unwrap();
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();

    // Skipping a step is not allowed.
    let res = change_status(&server, &order_id, "delivered").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invariant_violation");

    for (status, events) in [("confirmed", 1), ("confirmed", 0), ("shipped", 1), ("shipped", 0)] {
        let res = change_status(&server, &order_id, status).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status"], status);
        assert_eq!(body["events_committed"], events);
    }

    // Delivering a COD order also records the cash payment.
    let res = change_status(&server, &order_id, "delivered").await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "delivered");
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["events_committed"], 2);

    let res = change_status(&server, &order_id, "cancelled").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = change_status(&server, &order_id, "teleported").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = change_status(&server, "0190f5b2-7c1e-7a4b-9c3d-2e1f0a9b8c7d", "confirmed").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

async fn online_order_with_gateway(server: &TestServer, pepper: &str) -> (String, String) {
    let placed: Value = place_order(server, pepper, 1, "online", None).await.json().await.unwrap();
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();

    let res = server
        .client
        .post(server.url("/api/payments/orders"))
        .json(&json!({"order_id": order_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["amount"], 16_000);
    assert_eq!(body["gateway"], "offline");
    let gateway_order_id = body["gateway_order_id"].as_str().unwrap().to_string();

    // Asking again returns the same gateway order.
    let again: Value = server
        .client
        .post(server.url("/api/payments/orders"))
        .json(&json!({"order_id": order_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["gateway_order_id"], gateway_order_id.as_str());
    assert_eq!(again["events_committed"], 0);

    (order_id, gateway_order_id)
}

#[tokio::test]
async fn online_payment_is_verified_by_signature() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;
    let (order_id, gateway_order_id) = online_order_with_gateway(&server, &pepper).await;

    // Unpaid online orders cannot be confirmed by hand.
    let res = change_status(&server, &order_id, "confirmed").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = server
        .client
        .post(server.url("/api/payments/verify"))
        .json(&json!({
            "order_id": order_id,
            "razorpay_order_id": gateway_order_id,
            "razorpay_payment_id": "pay_test_1",
            "razorpay_signature": "deadbeef",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_signature");

    let signature = spicecart_payments::sign_hex(
        KEY_SECRET.as_bytes(),
        format!("{gateway_order_id}|pay_test_1").as_bytes(),
    )
    .unwrap();
    for events in [2, 0] {
        let res = server
            .client
            .post(server.url("/api/payments/verify"))
            .json(&json!({
                "order_id": order_id,
                "razorpay_order_id": gateway_order_id,
                "razorpay_payment_id": "pay_test_1",
                "razorpay_signature": signature,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["payment_status"], "paid");
        assert_eq!(body["order_status"], "confirmed");
        assert_eq!(body["events_committed"], events);
    }

    let res = server
        .client
        .post(server.url("/api/payments/orders"))
        .json(&json!({"order_id": order_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cod_orders_have_no_gateway_payment() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;
    let placed: Value = place_order(&server, &pepper, 1, "cod", None).await.json().await.unwrap();

    let res = server
        .client
        .post(server.url("/api/payments/orders"))
        .json(&json!({"order_id": placed["order"]["id"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

fn webhook_body(event: &str, gateway_order_id: &str, payment_id: &str, amount: u64) -> String {
    json!({
        "entity": "event",
        "event": event,
        "payload": {"payment": {"entity": {
            "id": payment_id,
            "entity": "payment",
            "amount": amount,
            "currency": "INR",
            "order_id": gateway_order_id,
            "error_description": "Payment was declined by the bank",
        }}}
    })
    .to_string()
}

fn sign(body: &str) -> String {
    spicecart_payments::sign_hex(WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap()
}

async fn post_webhook(server: &TestServer, body: String, signature: &str) -> reqwest::Response {
    server
        .client
        .post(server.url("/api/payments/webhook"))
        .header("content-type", "application/json")
        .header("X-Razorpay-Signature", signature)
        .body(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn webhook_requires_valid_signature_and_captures_payment() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;
    let (order_id, gateway_order_id) = online_order_with_gateway(&server, &pepper).await;

    let failed = webhook_body("payment.failed", &gateway_order_id, "pay_declined", 16_000);
    let res = post_webhook(&server, failed.clone(), "00ff").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let signature = sign(&failed);
    let res = post_webhook(&server, failed, &signature).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["payment_status"], "failed");
    assert_eq!(body["order_status"], "pending");

    let captured = webhook_body("payment.captured", &gateway_order_id, "pay_ok", 16_000);
    let signature = sign(&captured);
    let res = post_webhook(&server, captured.clone(), &signature).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["order_id"], order_id.as_str());
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["order_status"], "confirmed");

    // Gateways redeliver; the replay commits nothing.
    let res = post_webhook(&server, captured, &signature).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["events_committed"], 0);

    // A tampered body no longer matches its signature.
    let tampered = webhook_body("payment.captured", &gateway_order_id, "pay_ok", 1);
    let res = post_webhook(&server, tampered, &signature).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let ignored = json!({"event": "refund.created", "payload": {}}).to_string();
    let signature = sign(&ignored);
    let res = post_webhook(&server, ignored, &signature).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ignored");

    // A failed payment that never had a gateway order is acknowledged.
    let orphan = json!({
        "entity": "event",
        "event": "payment.failed",
        "payload": {"payment": {"entity": {
            "id": "pay_qr_1",
            "entity": "payment",
            "amount": 16_000,
            "currency": "INR",
            "error_description": "Payment was declined by the bank",
        }}}
    })
    .to_string();
    let signature = sign(&orphan);
    let res = post_webhook(&server, orphan, &signature).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["event"], "payment.failed");
}

#[tokio::test]
async fn read_models_can_be_rebuilt_by_admin_only() {
    let server = TestServer::spawn().await;
    let pepper = create_active_product(&server, "PEP-100", "Black Pepper", 12_000).await;
    place_order(&server, &pepper, 1, "cod", None).await;

    let res = server
        .client
        .post(server.url("/api/admin/read-models/rebuild"))
        .bearer_auth(mint_jwt(JWT_SECRET, vec![Role::STAFF]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .client
        .post(server.url("/api/admin/read-models/rebuild"))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    // Product created + activated, customer registered, order placed.
    assert_eq!(body["events_replayed"], 4);

    let listed: Value = server
        .client
        .get(server.url("/api/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}
