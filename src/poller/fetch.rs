use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;

use super::error::NetworkError;

const USER_AGENT: &str = concat!("flight-o-mat/", env!("CARGO_PKG_VERSION"));

/// One request to a provider's status endpoint.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, NetworkError>;
}

/// Unauthenticated GET against a fixed URL.
pub struct HttpFetcher {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_error(&self, err: reqwest::Error) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout(self.timeout)
        } else {
            NetworkError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self) -> Result<Vec<u8>, NetworkError> {
        log::debug!("GET {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| match self.map_error(e) {
            NetworkError::Request(msg) => NetworkError::Body(msg),
            other => other,
        })?;
        Ok(body.to_vec())
    }
}
