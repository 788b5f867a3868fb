//! DeliveryTransport port - 外向き HTTP の抽象化

use std::time::Duration;

use async_trait::async_trait;

/// テナントエンドポイントへの 1 回の POST
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub url: String,
    pub body: serde_json::Value,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

/// エンドポイントの応答（non-2xx も含む）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: String,
}

impl DeliveryResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 応答が得られなかった場合のエラー
///
/// メッセージはエラー分類が拾える文言にしている（"timed out", "connection"）。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn post(&self, request: DeliveryRequest) -> Result<DeliveryResponse, TransportError>;
}
