//! Payload classification.
//!
//! Stateless: every function here is a pure look at the payload (and, for
//! the source check, the configured ranges). Safe to share across tasks.

mod source;

pub use source::{SourceCheck, SourceFilter, parse_ranges};

use serde_json::Value;

use crate::domain::EventType;

pub const INVALID_PAYLOAD: &str = "Invalid payload format";

/// Endpoint-level hint. The gateway sends validation and timeout callbacks
/// to dedicated URLs with bodies shaped like their ordinary counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyHint {
    /// Collection payload arrived on the validation endpoint.
    Validation,
    /// Payment-result payload arrived on the timeout endpoint.
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Valid { event_type: EventType },
    Invalid { reason: String },
}

impl Classification {
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Classification::Valid { event_type } => Some(*event_type),
            Classification::Invalid { .. } => None,
        }
    }
}

fn is_string(v: &Value, key: &str) -> bool {
    v.get(key).is_some_and(Value::is_string)
}

/// `Body.stkCallback` with string request ids, numeric result code and a
/// string description.
pub fn is_payment_result(payload: &Value) -> bool {
    let Some(cb) = payload.get("Body").and_then(|b| b.get("stkCallback")) else {
        return false;
    };
    is_string(cb, "MerchantRequestID")
        && is_string(cb, "CheckoutRequestID")
        && cb.get("ResultCode").is_some_and(Value::is_number)
        && is_string(cb, "ResultDesc")
}

/// Flat collection notification; every field is a string on the wire,
/// including the amount.
pub fn is_collection(payload: &Value) -> bool {
    [
        "TransactionType",
        "TransID",
        "TransTime",
        "TransAmount",
        "BusinessShortCode",
    ]
    .iter()
    .all(|key| is_string(payload, key))
}

/// Decide the event type. First matching shape wins; a collection payload
/// without a hint is a confirmation.
pub fn classify(payload: &Value, hint: Option<ClassifyHint>) -> Classification {
    let event_type = if is_payment_result(payload) {
        match hint {
            Some(ClassifyHint::Timeout) => EventType::Timeout,
            _ => EventType::PaymentResult,
        }
    } else if is_collection(payload) {
        match hint {
            Some(ClassifyHint::Validation) => EventType::CollectionValidation,
            _ => EventType::CollectionConfirmation,
        }
    } else {
        return Classification::Invalid {
            reason: INVALID_PAYLOAD.to_string(),
        };
    };
    Classification::Valid { event_type }
}

/// Canned payment-result callback served by the test endpoint.
pub fn sample_payment_result() -> Value {
    serde_json::json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "test-merchant-request-123",
                "CheckoutRequestID": "test-checkout-request-456",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": 1000 },
                        { "Name": "MpesaReceiptNumber", "Value": "TEST123456" },
                        { "Name": "TransactionDate", "Value": 20231219120000u64 },
                        { "Name": "PhoneNumber", "Value": 254712345678u64 }
                    ]
                }
            }
        }
    })
}
