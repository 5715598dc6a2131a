//! Typed access to the chat backend's REST API.
//!
//! One method per remote capability. Authenticated calls take the session
//! token and attach it as a bearer credential. Calls are never retried and
//! never chained; callers decide what to do after a mutation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::Instrument;

use phama_common::api_call_span;
use phama_common::logging::generate_trace_id;

use crate::error::{ClientError, Result};
use crate::models::{
    Ack, ImageFile, LoginResponse, Message, SendMessageRequest, SignupRequest, User,
};

/// Backend endpoint paths.
pub mod endpoints {
    pub const LOGIN: &str = "/token";
    pub const CREATE_USER: &str = "/create_user/";
    pub const CURRENT_USER: &str = "/users/me";
    pub const ALL_MESSAGES: &str = "/get_all_message";
    pub const SEND_MESSAGE: &str = "/send_message";
    pub const DELETE_ALL: &str = "/delete_all_messages";
    pub const LOGOUT: &str = "/logout";
    pub const UPLOAD_IMAGE: &str = "/upload_image";
}

/// Remote capabilities of the chat backend.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Exchange credentials for a bearer token.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;

    /// Create an account. Does not sign in.
    async fn create_user(&self, request: &SignupRequest) -> Result<User>;

    async fn fetch_current_user(&self, token: &str) -> Result<User>;

    /// Full transcript in server order.
    async fn fetch_all_messages(&self, token: &str) -> Result<Vec<Message>>;

    async fn send_message(&self, token: &str, text: &str) -> Result<Ack>;

    async fn delete_all_messages(&self, token: &str) -> Result<Ack>;

    async fn logout(&self, token: &str) -> Result<Ack>;

    async fn upload_image(&self, token: &str, image: &ImageFile) -> Result<Ack>;
}

/// `reqwest`-backed gateway.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: Client,
}

impl HttpGateway {
    /// Create a gateway for `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a gateway from the backend section of the config.
    pub fn from_config(config: &phama_common::BackendConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    /// Create a gateway with a custom reqwest client.
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Send a request and map transport failures and non-success statuses.
    async fn send(
        &self,
        method: &'static str,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Response> {
        let trace_id = generate_trace_id();
        let span = api_call_span!(trace_id, endpoint = endpoint, method = method);

        async move {
            let started = std::time::Instant::now();
            let response = request.send().await.map_err(|e| {
                tracing::warn!(error = %e, "Backend request failed");
                ClientError::from(e)
            })?;

            let status = response.status();
            tracing::debug!(
                status = status.as_u16(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Backend responded"
            );

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let err = ClientError::from_status(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), kind = err.kind(), "Backend rejected request");
            Err(err)
        }
        .instrument(span)
        .await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Server {
            status,
            message: format!("invalid response body: {e}"),
        })
    }

    /// Acks may be empty, JSON, or plain text.
    async fn ack(response: Response) -> Result<Ack> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Ack::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Ack::String(body)))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = self
            .client
            .post(self.url(endpoints::LOGIN))
            .form(&[("username", username), ("password", password)]);

        let response = self.send("POST", endpoints::LOGIN, request).await?;
        Self::decode(response).await
    }

    async fn create_user(&self, request: &SignupRequest) -> Result<User> {
        let builder = self
            .client
            .post(self.url(endpoints::CREATE_USER))
            .json(request);

        let response = self.send("POST", endpoints::CREATE_USER, builder).await?;
        Self::decode(response).await
    }

    async fn fetch_current_user(&self, token: &str) -> Result<User> {
        let request = self
            .client
            .get(self.url(endpoints::CURRENT_USER))
            .bearer_auth(token);

        let response = self.send("GET", endpoints::CURRENT_USER, request).await?;
        Self::decode(response).await
    }

    async fn fetch_all_messages(&self, token: &str) -> Result<Vec<Message>> {
        let request = self
            .client
            .get(self.url(endpoints::ALL_MESSAGES))
            .bearer_auth(token);

        let response = self.send("GET", endpoints::ALL_MESSAGES, request).await?;
        Self::decode(response).await
    }

    async fn send_message(&self, token: &str, text: &str) -> Result<Ack> {
        let request = self
            .client
            .post(self.url(endpoints::SEND_MESSAGE))
            .bearer_auth(token)
            .json(&SendMessageRequest { msg: text });

        let response = self.send("POST", endpoints::SEND_MESSAGE, request).await?;
        Self::ack(response).await
    }

    async fn delete_all_messages(&self, token: &str) -> Result<Ack> {
        let request = self
            .client
            .delete(self.url(endpoints::DELETE_ALL))
            .bearer_auth(token);

        let response = self.send("DELETE", endpoints::DELETE_ALL, request).await?;
        Self::ack(response).await
    }

    async fn logout(&self, token: &str) -> Result<Ack> {
        let request = self
            .client
            .post(self.url(endpoints::LOGOUT))
            .bearer_auth(token)
            .json(&serde_json::json!({}));

        let response = self.send("POST", endpoints::LOGOUT, request).await?;
        Self::ack(response).await
    }

    async fn upload_image(&self, token: &str, image: &ImageFile) -> Result<Ack> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| ClientError::Validation(format!("invalid image type: {e}")))?;
        let form = Form::new().part("file", part);

        tracing::debug!(
            file = %image.file_name,
            size = image.bytes.len(),
            "Uploading image"
        );

        let request = self
            .client
            .post(self.url(endpoints::UPLOAD_IMAGE))
            .bearer_auth(token)
            .multipart(form);

        let response = self.send("POST", endpoints::UPLOAD_IMAGE, request).await?;
        Self::ack(response).await
    }
}
