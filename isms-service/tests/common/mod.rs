#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use isms_service::config::IsmsConfig;
use isms_service::services::{FixedClock, InMemoryStore};
use isms_service::startup::Application;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub const TENANT_HEADER: &str = "X-Tenant-ID";
pub const USER_HEADER: &str = "X-User-ID";

pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub client: Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let mut config = IsmsConfig::default();
        config.service_name = "isms-service-test".to_string();
        config.common.port = 0; // Random port

        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(test_epoch()));

        let app = Application::build_with(config, store.clone(), clock.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            store,
            clock,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    fn scoped(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(TENANT_HEADER, self.tenant_id.to_string())
            .header(USER_HEADER, self.user_id.to_string())
    }

    pub async fn get(&self, path: &str) -> Response {
        self.scoped(self.client.get(self.url(path)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.scoped(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.scoped(self.client.put(self.url(path)))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.scoped(self.client.delete(self.url(path)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POST and return the parsed body, asserting the expected status.
    pub async fn post_ok(&self, path: &str, body: &Value, status: u16) -> Value {
        let response = self.post(path, body).await;
        assert_eq!(response.status().as_u16(), status, "POST {}", path);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn get_json(&self, path: &str) -> Value {
        let response = self.get(path).await;
        assert_eq!(response.status().as_u16(), 200, "GET {}", path);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn create_organization(&self, name: &str, org_type: &str, parent_id: Option<&str>) -> Value {
        self.post_ok(
            "/organizations",
            &json!({ "name": name, "org_type": org_type, "parent_id": parent_id }),
            201,
        )
        .await
    }

    pub async fn create_domain(&self, name: &str, parent_id: Option<&str>) -> Value {
        self.post_ok(
            "/domains",
            &json!({
                "name": name,
                "description": format!("{} control domain", name),
                "parent_id": parent_id
            }),
            201,
        )
        .await
    }

    pub async fn create_asset(&self, name: &str, organization_id: &str, cia: [&str; 3]) -> Value {
        self.post_ok(
            "/assets",
            &json!({
                "name": name,
                "asset_type": "software",
                "owner_id": self.user_id,
                "organization_id": organization_id,
                "classification": {
                    "confidentiality": cia[0],
                    "integrity": cia[1],
                    "availability": cia[2]
                }
            }),
            201,
        )
        .await
    }

    /// A grant window starting now and lasting `days`.
    pub fn window(&self, days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = test_epoch();
        (now, now + Duration::days(days))
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id missing").to_string()
}
