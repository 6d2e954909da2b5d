use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ServicesConfig;
use crate::error::{HookError, Result};

/// HTTP plumbing shared by the scoring and transcription clients
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    api_key: Option<String>,
}

impl ServiceClient {
    pub fn new(config: &ServicesConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");

        Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    /// POST a JSON body and decode a JSON reply
    pub async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("POST {}", url);
        let response = self
            .authorize(self.client.post(url).json(body))
            .send()
            .await
            .map_err(|e| HookError::Remote(format!("Network error calling {}: {}", url, e)))?;

        Self::decode(url, response).await
    }

    /// POST a multipart form and decode a JSON reply
    pub async fn post_multipart<R: DeserializeOwned>(&self, url: &str, form: Form) -> Result<R> {
        debug!("POST multipart {}", url);
        let response = self
            .authorize(self.client.post(url).multipart(form))
            .send()
            .await
            .map_err(|e| HookError::Remote(format!("Network error calling {}: {}", url, e)))?;

        Self::decode(url, response).await
    }

    /// Fire a JSON body and only check the status
    pub async fn post_json_unit<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<()> {
        let response = self.client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(HookError::Notify(format!("{} returned {}", url, response.status())));
        }
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn decode<R: DeserializeOwned>(url: &str, response: Response) -> Result<R> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(HookError::Remote(format!("{} returned {}: {}", url, status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| HookError::Remote(format!("Failed to parse response from {}: {}", url, e)))
    }
}
