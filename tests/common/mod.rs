#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use fatbellies::{
    config::{AppState, Config},
    db::MemoryRepository,
    routes::build_router,
};

pub struct TestApp {
    pub router: Router,
    pub repo: MemoryRepository,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub server: Option<String>,
    pub body: Value,
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused/fatbellies".to_string(),
        ..Default::default()
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

pub fn spawn_app_with(config: Config) -> TestApp {
    let repo = MemoryRepository::new();
    let state = AppState::from_parts(config, Arc::new(repo.clone()), Arc::new(repo.clone()));
    TestApp { router: build_router(state), repo }
}

impl TestApp {
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn raw_json(&self, method: &str, uri: &str, raw: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let server = response
            .headers()
            .get("server")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        TestResponse { status, server, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request("POST", uri, Some(body)).await
    }

    /// Creates a branch and returns its id.
    pub async fn create_branch(&self, name: &str, lat: f64, long: f64) -> String {
        let res = self
            .post(
                "/api/branches",
                serde_json::json!({
                    "branch_name": name,
                    "opening_hours": 10,
                    "locations": { "latitude": lat, "longitude": long }
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["result"]["id"].as_str().unwrap().to_string()
    }

    /// Creates a meal plan and returns its id.
    pub async fn create_meal_plan(&self, name: &str, price: i64) -> String {
        let res = self
            .post(
                "/api/mealplans",
                serde_json::json!({
                    "meal_plan_name": name,
                    "max_capacity": 20,
                    "price": price,
                    "day": "Saturday"
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["result"]["id"].as_str().unwrap().to_string()
    }
}
