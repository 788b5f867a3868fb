//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（テナントの HTTP エンドポイント、設定ストアなど）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//! 実装は `impls` にあります。

pub mod attempt_sink;
pub mod clock;
pub mod id_generator;
pub mod policy_store;
pub mod settings;
pub mod transport;

pub use self::attempt_sink::{AttemptSink, SinkError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::policy_store::PolicyStore;
pub use self::settings::SettingsLookup;
pub use self::transport::{DeliveryRequest, DeliveryResponse, DeliveryTransport, TransportError};
