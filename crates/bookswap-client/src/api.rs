use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use bookswap_types::api::{
    CreateProductRequest, ErrorBody, LoginRequest, MatchRequest, RegisterRequest,
    SendMessageRequest, StatusMessage, UploadResponse, UserInfo,
};
use bookswap_types::models::{Category, Message, Notification, Product, User};

use crate::error::ClientError;

/// Typed wrapper over the bookswap REST API.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a server-relative path such as an uploaded image.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    // -- Users --

    pub async fn register(&self, req: &RegisterRequest) -> Result<UserInfo, ClientError> {
        self.send(self.request(Method::POST, "/api/users").json(req)).await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<UserInfo, ClientError> {
        self.send(self.request(Method::POST, "/api/users/login").json(req))
            .await
    }

    pub async fn profile(&self) -> Result<User, ClientError> {
        self.send(self.authed(Method::GET, "/api/users/profile")?).await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.send(self.authed(Method::GET, "/api/users/notifications")?)
            .await
    }

    pub async fn mark_notifications_read(&self) -> Result<StatusMessage, ClientError> {
        self.send(self.authed(Method::POST, "/api/users/notifications/read")?)
            .await
    }

    // -- Products --

    /// All listings, newest first, optionally narrowed to one category.
    pub async fn products(&self, category: Option<Category>) -> Result<Vec<Product>, ClientError> {
        let mut req = self.request(Method::GET, "/api/products");
        if let Some(category) = category {
            req = req.query(&[("category", category.code())]);
        }
        self.send(req).await
    }

    pub async fn product(&self, id: Uuid) -> Result<Product, ClientError> {
        self.send(self.request(Method::GET, &format!("/api/products/{}", id)))
            .await
    }

    pub async fn my_products(&self) -> Result<Vec<Product>, ClientError> {
        self.send(self.authed(Method::GET, "/api/products/myproducts")?)
            .await
    }

    pub async fn matched_products(&self) -> Result<Vec<Product>, ClientError> {
        self.send(self.authed(Method::GET, "/api/products/matched")?)
            .await
    }

    pub async fn create_product(&self, req: &CreateProductRequest) -> Result<Product, ClientError> {
        self.send(self.authed(Method::POST, "/api/products")?.json(req))
            .await
    }

    pub async fn request_product(&self, id: Uuid) -> Result<StatusMessage, ClientError> {
        self.send(self.authed(Method::POST, &format!("/api/products/{}/request", id))?)
            .await
    }

    pub async fn match_product(
        &self,
        id: Uuid,
        requester_id: Uuid,
    ) -> Result<StatusMessage, ClientError> {
        let body = MatchRequest { requester_id };
        self.send(
            self.authed(Method::POST, &format!("/api/products/{}/match", id))?
                .json(&body),
        )
        .await
    }

    // -- Messages --

    pub async fn messages(&self, product_id: Uuid) -> Result<Vec<Message>, ClientError> {
        self.send(self.authed(Method::GET, &format!("/api/products/{}/messages", product_id))?)
            .await
    }

    pub async fn send_message(
        &self,
        product_id: Uuid,
        text: impl Into<String>,
    ) -> Result<Message, ClientError> {
        let body = SendMessageRequest {
            message: text.into(),
        };
        self.send(
            self.authed(Method::POST, &format!("/api/products/{}/messages", product_id))?
                .json(&body),
        )
        .await
    }

    // -- Uploads --

    /// Upload an image and get back the server path to put in a listing.
    pub async fn upload_image(
        &self,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ClientError> {
        let part = Part::bytes(bytes).file_name(file_name.into());
        let form = Form::new().part("image", part);
        self.send(self.authed(Method::POST, "/api/upload")?.multipart(form))
            .await
    }

    // -- Plumbing --

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotLoggedIn)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let response = req.send().await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turn a non-2xx response into [`ClientError::Api`] carrying the server's message.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.message,
        Err(_) if text.is_empty() => status.canonical_reason().unwrap_or("error").to_string(),
        Err(_) => text,
    };
    debug!("API error {}: {}", status, message);
    Err(ClientError::Api { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:3001/");
        assert_eq!(client.base_url(), "http://localhost:3001");
        assert_eq!(
            client.resolve("/uploads/image-1.png"),
            "http://localhost:3001/uploads/image-1.png"
        );
        assert_eq!(
            client.resolve("https://cdn.example/x.png"),
            "https://cdn.example/x.png"
        );
    }

    #[tokio::test]
    async fn private_calls_need_a_token() {
        let client = ApiClient::new("http://127.0.0.1:9");
        let err = client.notifications().await.unwrap_err();
        assert!(matches!(err, ClientError::NotLoggedIn));
    }
}
