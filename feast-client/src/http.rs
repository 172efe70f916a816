//! HTTP client for network-based API calls

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::client::{CurrentUserResponse, LoginRequest, LoginResponse, RegisterRequest};
use shared::response::MessageResponse;
use shared::{AddItemRequest, Cart, CartResponse, CartsResponse, ErrorBody, UpdateQuantityRequest};

use crate::{CartApi, ClientConfig, ClientError, ClientResult};

/// HTTP client for making network requests to the Feast server
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Set the authentication token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the current token
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<T> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send::<T, ()>(Method::GET, path, None).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Make a POST request without body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send::<T, ()>(Method::POST, path, None).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send::<T, ()>(Method::DELETE, path, None).await
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(match status {
                StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
                StatusCode::NOT_FOUND => ClientError::NotFound(message),
                StatusCode::CONFLICT => ClientError::Conflict(message),
                StatusCode::BAD_REQUEST => ClientError::Validation(message),
                _ => ClientError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    // ========== Auth API ==========

    pub async fn register(&self, req: &RegisterRequest) -> ClientResult<MessageResponse> {
        self.post("/api/v1/auth/register", req).await
    }

    /// Login with email and password
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<LoginResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/api/v1/auth/login", &request).await
    }

    /// Get current user info
    pub async fn me(&self) -> ClientResult<CurrentUserResponse> {
        self.get("/api/v1/auth/me").await
    }

    // ========== Cart API ==========

    /// Checked-out carts, newest first
    pub async fn cart_history(&self) -> ClientResult<Vec<Cart>> {
        let resp: CartsResponse = self.get("/api/v1/carts/history").await?;
        Ok(resp.carts)
    }

    /// Remove a line from whichever active cart holds it
    pub async fn remove_item_anywhere(&self, item_id: &str) -> ClientResult<Cart> {
        let resp: CartResponse = self.delete(&format!("/api/v1/cart/items/{item_id}")).await?;
        Ok(resp.cart)
    }
}

#[async_trait]
impl CartApi for HttpClient {
    async fn list_carts(&self) -> ClientResult<Vec<Cart>> {
        let resp: CartsResponse = self.get("/api/v1/carts").await?;
        Ok(resp.carts)
    }

    async fn add_item(&self, restaurant_id: &str, req: &AddItemRequest) -> ClientResult<Cart> {
        let resp: CartResponse = self
            .post(&format!("/api/v1/carts/{restaurant_id}/items"), req)
            .await?;
        Ok(resp.cart)
    }

    async fn update_quantity(
        &self,
        restaurant_id: &str,
        item_id: &str,
        quantity: u32,
    ) -> ClientResult<Cart> {
        let resp: CartResponse = self
            .put(
                &format!("/api/v1/carts/{restaurant_id}/items/{item_id}"),
                &UpdateQuantityRequest { quantity },
            )
            .await?;
        Ok(resp.cart)
    }

    async fn remove_item(&self, restaurant_id: &str, item_id: &str) -> ClientResult<Cart> {
        let resp: CartResponse = self
            .delete(&format!("/api/v1/carts/{restaurant_id}/items/{item_id}"))
            .await?;
        Ok(resp.cart)
    }

    async fn clear_cart(&self, restaurant_id: &str) -> ClientResult<Cart> {
        let resp: CartResponse = self
            .delete(&format!("/api/v1/carts/{restaurant_id}/clear"))
            .await?;
        Ok(resp.cart)
    }

    async fn checkout(&self, restaurant_id: &str) -> ClientResult<Cart> {
        let resp: CartResponse = self
            .post_empty(&format!("/api/v1/carts/{restaurant_id}/checkout"))
            .await?;
        Ok(resp.cart)
    }
}
