use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;

use crate::{DestError, DestResult};

/// Network delegate used by [`DestinationRef`](crate::DestinationRef).
///
/// `url` is fully qualified, secret included. A JSON body is sent when
/// present and the decoded JSON response is returned; an empty response
/// body decodes to `Value::Null`. Failures are not retried.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> DestResult<Value>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> DestResult<Self> {
        let client = Client::builder()
            .user_agent("omig/0.1.0")
            .timeout(timeout)
            .build()
            .map_err(DestError::RequestFailed)?;
        Ok(Self { client })
    }

    async fn handle_response(&self, response: Response) -> DestResult<Value> {
        let status = response.status();

        if status.is_success() {
            let text = response.text().await.map_err(DestError::RequestFailed)?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(DestError::SerializationError)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(DestError::api_error(status.as_u16(), error_text))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> DestResult<Value> {
        // strip the query so the secret never reaches the log
        debug!("{} {}", method, url.split('?').next().unwrap_or(url));
        let mut request = self.client.request(method, url);
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(DestError::RequestFailed)?;
        self.handle_response(response).await
    }
}
