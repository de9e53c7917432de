#![allow(dead_code)]
use std::{net::SocketAddr, sync::Arc};

use material_registry_backend::{
    api,
    auth::{ApiKey, ServiceIdentity},
    store::{memory::Partner, MemoryStore},
    AppState,
};

pub const API_KEY: &str = "TEST_SECRET";
pub const SERVICE: &str = "material-registry-test";

/// Spin up a real Axum server on a random port over a fresh in-memory store,
/// returning its address and the store for seeding. Every test gets its own
/// store, so no cleanup is needed.
pub async fn setup_test_app() -> (SocketAddr, Arc<MemoryStore>) {
    setup_with_key(Some(API_KEY)).await
}

/// Same as [`setup_test_app`] with an explicit (possibly absent) API key.
pub async fn setup_with_key(key: Option<&str>) -> (SocketAddr, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());

    let state = AppState {
        store: store.clone(),
        api_key: ApiKey::new(key.map(String::from)),
        service: ServiceIdentity::new(SERVICE),
    };

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, store)
}

pub async fn create_supplier(store: &MemoryStore, name: &str) -> Partner {
    store.add_partner(name, 1).await
}

/// Build a reqwest client (reusable across requests in a test).
pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

pub fn material_body(code: &str, material_type: &str, buy_price: f64, supplier_id: i64) -> serde_json::Value {
    serde_json::json!({
        "code": code,
        "name": format!("Kain {}", code),
        "material_type": material_type,
        "buy_price": buy_price,
        "supplier_id": supplier_id,
    })
}

/// Create a material through the API and return the response body.
pub async fn create_material(addr: SocketAddr, body: &serde_json::Value) -> serde_json::Value {
    let resp = http_client()
        .post(url(addr, "/api/materials"))
        .header("X-API-Key", API_KEY)
        .json(body)
        .send()
        .await
        .expect("Create request failed");

    assert_eq!(resp.status(), 201, "Create should return 201");
    resp.json().await.expect("Failed to parse create response")
}
