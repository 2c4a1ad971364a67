use std::time::Duration;

use log::warn;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{Result, TrackerBotError};

/// Timeout and retry policy applied to every collaborator request.
#[derive(Debug, Clone)]
pub struct HttpPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// `reqwest` client that retries on network errors, rate limits and server errors.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    policy: HttpPolicy,
}

impl HttpClient {
    pub fn new(policy: HttpPolicy, headers: HeaderMap) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("concourse-tracker-bot/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(policy.timeout)
            .build()
            .map_err(|e| TrackerBotError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, policy })
    }

    /// Sends the request built by `build`, rebuilding it for every attempt.
    ///
    /// Returns the first response with a non-retryable status. Non-success
    /// statuses are turned into [`TrackerBotError::Api`].
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.dispatch(Retry::Read, build).await
    }

    /// Like [`HttpClient::send`], for requests that must not be applied twice.
    ///
    /// Only connection failures and rate limiting are retried; a timeout or a
    /// server error may come after the server already acted on the request.
    pub async fn send_write<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.dispatch(Retry::Write, build).await
    }

    /// Sends the request and decodes a JSON body.
    ///
    /// The body is read as text first so that malformed documents surface as
    /// [`TrackerBotError::Decoding`] rather than as transport errors.
    pub async fn send_json<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        decode(self.send(build).await?).await
    }

    /// Sends a write with [`HttpClient::send_write`] and decodes a JSON body.
    pub async fn send_json_write<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        decode(self.send_write(build).await?).await
    }

    async fn dispatch<F>(&self, retry: Retry, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retry_count = 0;
        loop {
            let response = match build(&self.client).send().await {
                Ok(resp) => resp,
                Err(e) if retry.network_error(&e) => {
                    if retry_count >= self.policy.max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({}), retrying in {:?} ({}/{})...",
                        e,
                        self.policy.retry_delay,
                        retry_count + 1,
                        self.policy.max_retries
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == 429 || (retry == Retry::Read && status.is_server_error()) {
                if retry_count >= self.policy.max_retries {
                    return Err(TrackerBotError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: self.policy.max_retries,
                    });
                }

                warn!(
                    "API error (status {status}) from {}. Retrying in {:?} ({}/{})...",
                    response.url(),
                    self.policy.retry_delay,
                    retry_count + 1,
                    self.policy.max_retries
                );

                tokio::time::sleep(self.policy.retry_delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(TrackerBotError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Safe to repeat: network errors, rate limits and server errors are retried.
    Read,
    /// Retried only when the request cannot have reached the server.
    Write,
}

impl Retry {
    fn network_error(self, e: &reqwest::Error) -> bool {
        match self {
            Retry::Read => e.is_connect() || e.is_timeout() || e.is_request(),
            Retry::Write => e.is_connect(),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}
