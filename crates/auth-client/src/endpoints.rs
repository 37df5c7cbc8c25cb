//! Typed wrappers for the protected codebase API endpoints
//!
//! All of these go through `ApiClient::send`, so any of them can trigger (or
//! wait on) a token refresh and a single replay.

use serde_json::Value;

use crate::client::ApiClient;
use crate::error::Result;
use crate::request::ApiRequest;

/// Pagination for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl Page {
    fn apply(self, request: ApiRequest) -> ApiRequest {
        request
            .query("page", self.page)
            .query("per_page", self.per_page)
    }
}

impl ApiClient {
    pub async fn generate_api_key(&self) -> Result<Value> {
        self.send_json(ApiRequest::post("/generate_key")).await
    }

    /// Kick off server-side data gathering.
    pub async fn gather(&self) -> Result<Value> {
        self.send_json(ApiRequest::post("/gather")).await
    }

    pub async fn data(&self, page: Page) -> Result<Value> {
        self.send_json(page.apply(ApiRequest::get("/data"))).await
    }

    pub async fn dashboard(&self, page: Page) -> Result<Value> {
        self.send_json(page.apply(ApiRequest::get("/dashboard"))).await
    }

    pub async fn user_snippets(&self, page: Page) -> Result<Value> {
        self.send_json(page.apply(ApiRequest::get("/user-snippets")))
            .await
    }

    pub async fn search(&self, query: &str) -> Result<Value> {
        self.send_json(ApiRequest::get("/search").query("q", query))
            .await
    }

    pub async fn submit(&self, body: Value) -> Result<Value> {
        self.send_json(ApiRequest::post("/submit").json(body)).await
    }

    pub async fn submit_correction(&self, body: Value) -> Result<Value> {
        self.send_json(ApiRequest::post("/submit-correction").json(body))
            .await
    }

    /// Documentation for a snippet. `markdown` asks the server to render it.
    pub async fn documentation(&self, snippet_id: u64, markdown: bool) -> Result<Value> {
        let mut request = ApiRequest::get(format!("/documentation/{snippet_id}"));
        if markdown {
            request = request.query("format", "markdown");
        }
        self.send_json(request).await
    }

    pub async fn generate_documentation(&self, snippet_id: u64) -> Result<Value> {
        self.send_json(ApiRequest::post(format!(
            "/documentation/generate/{snippet_id}"
        )))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminator::LogListener;
    use crate::test_support::{MockApi, MockConfig, start_mock_api};
    use session_auth::{Credential, CredentialStore, MemoryStore};
    use std::sync::Arc;

    async fn logged_in() -> (MockApi, ApiClient) {
        let api = start_mock_api(MockConfig::default()).await;
        api.accept_access("T1");
        let store = Arc::new(CredentialStore::new(Arc::new(MemoryStore::new())));
        store
            .set(&Credential::new("T1", Some("R1".into())))
            .await
            .unwrap();
        let client = ApiClient::new(
            reqwest::Client::new(),
            api.base_url.clone(),
            store,
            Arc::new(LogListener),
        );
        (api, client)
    }

    #[test]
    fn default_page_is_first_ten() {
        assert_eq!(
            Page::default(),
            Page {
                page: 1,
                per_page: 10
            }
        );
    }

    #[tokio::test]
    async fn list_endpoints_send_pagination() {
        let (_api, client) = logged_in().await;

        let body = client.dashboard(Page::default()).await.unwrap();
        assert_eq!(body["method"], "GET");
        assert_eq!(body["path"], "/dashboard");
        assert_eq!(body["query"], "page=1&per_page=10");

        let body = client
            .user_snippets(Page {
                page: 3,
                per_page: 25,
            })
            .await
            .unwrap();
        assert_eq!(body["path"], "/user-snippets");
        assert_eq!(body["query"], "page=3&per_page=25");

        let body = client.data(Page::default()).await.unwrap();
        assert_eq!(body["path"], "/data");
    }

    #[tokio::test]
    async fn search_encodes_query() {
        let (_api, client) = logged_in().await;
        let body = client.search("async fn").await.unwrap();
        assert_eq!(body["path"], "/search");
        assert_eq!(body["query"], "q=async+fn");
    }

    #[tokio::test]
    async fn submit_posts_json_body() {
        let (_api, client) = logged_in().await;
        let body = client
            .submit(serde_json::json!({"code": "fn main() {}", "language": "rust"}))
            .await
            .unwrap();
        assert_eq!(body["method"], "POST");
        assert_eq!(body["path"], "/submit");
        assert_eq!(body["body"]["language"], "rust");

        let body = client
            .submit_correction(serde_json::json!({"snippet_id": 7}))
            .await
            .unwrap();
        assert_eq!(body["path"], "/submit-correction");
        assert_eq!(body["body"]["snippet_id"], 7);
    }

    #[tokio::test]
    async fn documentation_paths() {
        let (_api, client) = logged_in().await;

        let body = client.documentation(42, true).await.unwrap();
        assert_eq!(body["path"], "/documentation/42");
        assert_eq!(body["query"], "format=markdown");

        let body = client.documentation(42, false).await.unwrap();
        assert!(body["query"].is_null());

        let body = client.generate_documentation(42).await.unwrap();
        assert_eq!(body["method"], "POST");
        assert_eq!(body["path"], "/documentation/generate/42");
    }

    #[tokio::test]
    async fn key_and_gather_are_posts() {
        let (_api, client) = logged_in().await;
        assert_eq!(client.generate_api_key().await.unwrap()["path"], "/generate_key");
        assert_eq!(client.gather().await.unwrap()["method"], "POST");
    }

    #[tokio::test]
    async fn wrappers_refresh_like_any_request() {
        let (api, client) = logged_in().await;
        api.expire_access();

        let body = client.dashboard(Page::default()).await.unwrap();
        assert_eq!(body["token"], "T2");
        assert_eq!(api.refresh_calls(), 1);
    }
}
