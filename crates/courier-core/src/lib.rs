//! courier-core
//!
//! 決済 callback の webhook relay。gateway からの callback を分類して優先度つきで
//! キューに積み、テナントのエンドポイントへリトライしながら配送する。
//! リトライを使い切った job は dead letter store に置き、運用者が再投入できる。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, event, job, attempt, policy, category, decision）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, SettingsLookup, PolicyStore, DeliveryTransport, AttemptSink）
//! - **impls**: ports の実装（reqwest transport, in-memory stores, tracing sink）
//! - **classify**: payload の分類と送信元チェック
//! - **queue**: 優先度つき delivery queue
//! - **retry**: エラー分類と backoff、`decide()`
//! - **executor**: worker pool
//! - **dlq**: dead letter store
//! - **metrics**: queue health
//! - **ingress** / **http**: 受付と admin API
//! - **app**: 構築と起動

pub mod app;
pub mod classify;
pub mod config;
pub mod dlq;
pub mod domain;
pub mod error;
pub mod executor;
pub mod http;
pub mod impls;
pub mod ingress;
pub mod metrics;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod retry;

pub use app::{App, AppBuilder, BuildError, Running};
pub use config::CourierConfig;
pub use error::CourierError;
