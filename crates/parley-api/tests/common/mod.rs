#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use parley_api::{AppStateInner, Settings, router};
use parley_db::Database;

#[derive(Clone)]
pub struct TestApp {
    router: Router,
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub access: String,
    pub refresh: String,
}

impl TestApp {
    /// A fresh in-memory service with the POST limit effectively off.
    pub fn new() -> Self {
        Self::with_settings(Settings {
            rate_limit: 10_000,
            ..Settings::default()
        })
    }

    pub fn with_settings(settings: Settings) -> Self {
        let db = Database::open_in_memory().expect("in-memory database");
        Self {
            router: router(AppStateInner::new(db, settings)),
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.send(request(method, uri, token, body)).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn register(&self, email: &str) -> TestUser {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse",
                    "first_name": email.split('@').next().unwrap_or("test"),
                    "last_name": "Tester",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {}: {}", email, body);
        TestUser {
            id: body["user_id"].as_str().unwrap().parse().unwrap(),
            email: email.to_string(),
            access: body["access"].as_str().unwrap().to_string(),
            refresh: body["refresh"].as_str().unwrap().to_string(),
        }
    }

    pub async fn open_conversation(&self, owner: &TestUser, others: &[&TestUser]) -> String {
        let ids: Vec<String> = others.iter().map(|u| u.id.to_string()).collect();
        let (status, body) = self
            .post("/conversations", &owner.access, json!({ "participant_ids": ids }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn send_message(&self, conversation: &str, from: &TestUser, to: &TestUser, content: &str) -> Value {
        let (status, body) = self
            .post(
                &format!("/conversations/{}/messages", conversation),
                &from.access,
                json!({ "receiver_id": to.id, "content": content }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
