use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, Secret};

use super::{ChatReply, ChatRequest, ChatTransport, TransportError};

/// Sends chat requests over a shared `reqwest` connection pool.
pub struct HttpTransport {
    client: Client,
    url: String,
    api_key: Secret<String>,
}

impl HttpTransport {
    pub fn new(url: String, api_key: Secret<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn post(&self, request: &ChatRequest<'_>) -> Result<ChatReply, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(request)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        // Only a 200 body is ever inspected.
        let body = if status == 200 {
            response.text().await.map_err(classify)?
        } else {
            String::new()
        };

        Ok(ChatReply { status, body })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(error.to_string())
    }
}
