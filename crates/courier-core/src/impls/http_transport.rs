//! reqwest-backed delivery transport.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::ports::{DeliveryRequest, DeliveryResponse, DeliveryTransport, TransportError};

pub const USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Response bodies are kept for the attempt log only; cap what we store.
const MAX_BODY_CHARS: usize = 4096;

/// Shared HTTP client. Timeouts are applied per request from the tenant
/// policy, so the client itself carries none.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                map.insert(n, v);
            }
            _ => {
                tracing::warn!(target: "courier::delivery", header = %name, "skipping invalid header");
            }
        }
    }
    map
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn post(&self, request: DeliveryRequest) -> Result<DeliveryResponse, TransportError> {
        let timeout_ms = request.timeout.as_millis() as u64;
        let result = self
            .client
            .post(&request.url)
            .headers(header_map(&request.headers))
            .timeout(request.timeout)
            .json(&request.body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_BODY_CHARS)
                    .collect::<String>();
                Ok(DeliveryResponse { status, body })
            }
            Err(e) if e.is_timeout() => Err(TransportError::Timeout(timeout_ms)),
            Err(e) if e.is_connect() => Err(TransportError::Connect(e.to_string())),
            Err(e) => Err(TransportError::Request(e.to_string())),
        }
    }
}
