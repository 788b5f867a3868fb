//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpTransport**: reqwest による配送
//! - **InMemoryPolicyStore**: 開発用のポリシーストア
//! - **InMemorySettings**: テナントごとの配送先
//! - **TracingAttemptSink**: attempt をログに書く sink

pub mod http_transport;
pub mod inmem_policy;
pub mod inmem_settings;
pub mod tracing_sink;

pub use self::http_transport::HttpTransport;
pub use self::inmem_policy::InMemoryPolicyStore;
pub use self::inmem_settings::InMemorySettings;
pub use self::tracing_sink::TracingAttemptSink;
