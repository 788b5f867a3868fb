//! App - アプリケーション層
//!
//! ports と各コンポーネントを組み合わせて一つのサービスにする。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 構築とワイヤリング（起動時検証つき）
//! - **App / Running**: HTTP router とバックグラウンドタスクの起動・停止
//! - **maintenance**: DLQ retention と metrics sampling のループ

pub mod builder;
mod maintenance;

pub use self::builder::{App, AppBuilder, BuildError, Running};
