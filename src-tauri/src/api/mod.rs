//! Typed calls to the admin edge functions.
//!
//! Each call is a thin projection over the [`Gateway`]; errors come back
//! exactly as the gateway produced them.

pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, Request};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::AppConfig;
use crate::editor::RecordUpdater;
use crate::error::AppError;
use crate::gateway::{Gateway, RequestOptions};
use crate::list::ListSource;
use crate::reports::ReportSource;
use crate::session::TokenProvider;

use types::{
    ListQuery, MetricsSnapshot, Page, RecipeRow, RecipeUpdate, ReportKind, UserRow, UserToggle,
};

const METRICS_FN: &str = "admin-metrics";
const USERS_FN: &str = "admin-users";
const RECIPES_FN: &str = "admin-recipes";
const REPORTS_FN: &str = "admin-reports";

pub struct AdminApi {
    gateway: Gateway,
    config: AppConfig,
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AppError> {
    resp.json::<T>()
        .await
        .map_err(|e| AppError::Decode(e.to_string()))
}

impl AdminApi {
    pub fn new(config: AppConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, AppError> {
        let gateway = Gateway::new(tokens, Some(config.anon_key.clone()))?;
        Ok(Self { gateway, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn fetch_metrics(&self) -> Result<MetricsSnapshot, AppError> {
        let request = self.metrics_request().await?;
        decode(self.gateway.send(request).await?).await
    }

    pub async fn list_users(&self, query: &ListQuery) -> Result<Page<UserRow>, AppError> {
        let request = self.list_request(USERS_FN, query).await?;
        let page: Page<UserRow> = decode(self.gateway.send(request).await?).await?;
        Ok(page.capped(query.page_size))
    }

    pub async fn set_user_enabled(&self, id_user: i64, enabled: bool) -> Result<UserRow, AppError> {
        info!("Setting user {} enabled={}", id_user, enabled);
        let request = self.user_toggle_request(id_user, enabled).await?;
        decode(self.gateway.send(request).await?).await
    }

    pub async fn list_recipes(&self, query: &ListQuery) -> Result<Page<RecipeRow>, AppError> {
        let request = self.list_request(RECIPES_FN, query).await?;
        let page: Page<RecipeRow> = decode(self.gateway.send(request).await?).await?;
        Ok(page.capped(query.page_size))
    }

    pub async fn update_recipe(&self, payload: &RecipeUpdate) -> Result<RecipeRow, AppError> {
        info!("Updating recipe {}", payload.id_recipe);
        let request = self.recipe_update_request(payload).await?;
        decode(self.gateway.send(request).await?).await
    }

    pub async fn fetch_report(&self, kind: ReportKind) -> Result<Vec<u8>, AppError> {
        let request = self.report_request(kind).await?;
        let bytes = self
            .gateway
            .send(request)
            .await?
            .bytes()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn metrics_request(&self) -> Result<Request, AppError> {
        self.gateway
            .build(Method::GET, &self.config.endpoint(METRICS_FN), RequestOptions::default())
            .await
    }

    async fn list_request(&self, function: &str, query: &ListQuery) -> Result<Request, AppError> {
        let url = format!("{}?{}", self.config.endpoint(function), query.to_query_string());
        self.gateway
            .build(Method::GET, &url, RequestOptions::default())
            .await
    }

    async fn user_toggle_request(&self, id_user: i64, enabled: bool) -> Result<Request, AppError> {
        let body = serde_json::to_value(UserToggle { id_user, enabled })
            .map_err(|e| AppError::Decode(format!("Failed to encode user update: {}", e)))?;
        self.gateway
            .build(Method::PATCH, &self.config.endpoint(USERS_FN), RequestOptions::json(body))
            .await
    }

    async fn recipe_update_request(&self, payload: &RecipeUpdate) -> Result<Request, AppError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| AppError::Decode(format!("Failed to encode recipe update: {}", e)))?;
        self.gateway
            .build(Method::PATCH, &self.config.endpoint(RECIPES_FN), RequestOptions::json(body))
            .await
    }

    async fn report_request(&self, kind: ReportKind) -> Result<Request, AppError> {
        let url = format!("{}?type={}", self.config.endpoint(REPORTS_FN), kind);
        self.gateway
            .build(Method::GET, &url, RequestOptions::default().header(ACCEPT, "text/csv"))
            .await
    }
}

#[async_trait]
impl ListSource<UserRow> for Arc<AdminApi> {
    async fn list(&self, query: &ListQuery) -> Result<Page<UserRow>, AppError> {
        self.list_users(query).await
    }
}

#[async_trait]
impl ListSource<RecipeRow> for Arc<AdminApi> {
    async fn list(&self, query: &ListQuery) -> Result<Page<RecipeRow>, AppError> {
        self.list_recipes(query).await
    }
}

#[async_trait]
impl RecordUpdater<RecipeUpdate> for Arc<AdminApi> {
    type Output = RecipeRow;

    async fn update(&self, payload: &RecipeUpdate) -> Result<RecipeRow, AppError> {
        self.update_recipe(payload).await
    }
}

#[async_trait]
impl ReportSource for Arc<AdminApi> {
    async fn fetch_report(&self, kind: ReportKind) -> Result<Vec<u8>, AppError> {
        AdminApi::fetch_report(self, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StaticTokenProvider;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn api_at(base: &str) -> AdminApi {
        let config = AppConfig {
            supabase_url: base.to_string(),
            anon_key: "anon".to_string(),
            edge_base: format!("{}/functions/v1", base),
        };
        AdminApi::new(config, Arc::new(StaticTokenProvider::new(Some("tok")))).unwrap()
    }

    fn body_json(req: &Request) -> serde_json::Value {
        let bytes = req.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    /// Serves one connection with a canned answer and hands back the raw request.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_list_requests_carry_query_and_token() {
        let api = api_at("https://abc.supabase.co");
        let req = api
            .list_request(USERS_FN, &ListQuery::new("ana b", 2, 20))
            .await
            .unwrap();
        assert_eq!(req.method(), Method::GET);
        assert_eq!(
            req.url().as_str(),
            "https://abc.supabase.co/functions/v1/admin-users?q=ana%20b&page=2&pageSize=20"
        );
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer tok");

        let req = api
            .list_request(RECIPES_FN, &ListQuery::new("", 1, 20))
            .await
            .unwrap();
        assert_eq!(
            req.url().as_str(),
            "https://abc.supabase.co/functions/v1/admin-recipes?page=1&pageSize=20"
        );
    }

    #[tokio::test]
    async fn test_user_toggle_is_patch_with_minimal_body() {
        let api = api_at("https://abc.supabase.co");
        let req = api.user_toggle_request(42, false).await.unwrap();
        assert_eq!(req.method(), Method::PATCH);
        assert_eq!(req.url().as_str(), "https://abc.supabase.co/functions/v1/admin-users");
        assert_eq!(req.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(body_json(&req), json!({ "id_user": 42, "enabled": false }));
    }

    #[tokio::test]
    async fn test_recipe_update_is_patch_with_editable_fields() {
        let api = api_at("https://abc.supabase.co");
        let payload = RecipeUpdate {
            id_recipe: 7,
            title: "Guiso".to_string(),
            difficulty: Some("easy".to_string()),
            calories_per_serving_kcal: None,
        };
        let req = api.recipe_update_request(&payload).await.unwrap();
        assert_eq!(req.method(), Method::PATCH);
        assert_eq!(req.url().as_str(), "https://abc.supabase.co/functions/v1/admin-recipes");
        assert_eq!(
            body_json(&req),
            json!({
                "id_recipe": 7,
                "title": "Guiso",
                "difficulty": "easy",
                "calories_per_serving_kcal": null
            })
        );
    }

    #[tokio::test]
    async fn test_report_request_asks_for_csv() {
        let api = api_at("https://abc.supabase.co");
        let req = api.report_request(ReportKind::Recipes).await.unwrap();
        assert_eq!(req.method(), Method::GET);
        assert_eq!(
            req.url().as_str(),
            "https://abc.supabase.co/functions/v1/admin-reports?type=recipes"
        );
        assert_eq!(req.headers().get(ACCEPT).unwrap(), "text/csv");
        assert!(req.headers().get(CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_metrics_request_targets_metrics_function() {
        let api = api_at("https://abc.supabase.co");
        let req = api.metrics_request().await.unwrap();
        assert_eq!(req.url().as_str(), "https://abc.supabase.co/functions/v1/admin-metrics");
    }

    #[tokio::test]
    async fn test_update_failure_surfaces_function_message() {
        let (base, server) = one_shot_server("500 Internal Server Error", r#"{"error":"db timeout"}"#).await;
        let api = api_at(&base);
        let payload = RecipeUpdate {
            id_recipe: 7,
            title: "Guiso".to_string(),
            difficulty: None,
            calories_per_serving_kcal: Some(410.0),
        };
        let err = api.update_recipe(&payload).await.unwrap_err();
        assert_eq!(err.to_string(), "db timeout");
        assert_eq!(err.status(), Some(500));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("PATCH /functions/v1/admin-recipes HTTP/1.1"), "got {}", raw);
        assert!(raw.contains(r#""id_recipe":7"#));
    }

    #[tokio::test]
    async fn test_list_users_decodes_and_caps_page() {
        let (base, server) = one_shot_server(
            "200 OK",
            r#"{"data":[{"id_user":1,"name":"Ana"},{"id_user":2,"name":"Anabel"},{"id_user":3,"name":"Mariana"}],"total":3}"#,
        )
        .await;
        let api = api_at(&base);
        let page = api.list_users(&ListQuery::new("ana", 1, 2)).await.unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.total, 3);

        let raw = server.await.unwrap();
        assert!(
            raw.starts_with("GET /functions/v1/admin-users?q=ana&page=1&pageSize=2 HTTP/1.1"),
            "got {}",
            raw
        );
        assert!(raw.to_lowercase().contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let api = api_at("http://127.0.0.1:1");
        let err = api.list_users(&ListQuery::new("ana", 1, 20)).await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_report_transport_failure_is_network_error() {
        let api = Arc::new(api_at("http://127.0.0.1:1"));
        let err = ReportSource::fetch_report(&api, ReportKind::Usage).await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
    }
}
