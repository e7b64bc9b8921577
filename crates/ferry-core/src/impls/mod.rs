//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpTransport**: reqwest multipart（本番用）
//! - **SimulatedTransport**: 疑似アップロード（デモ用）
//! - **ManualTransport**: 結果を外から決める（テスト用）

pub mod http;
pub mod manual;
pub mod simulated;

pub use self::http::HttpTransport;
pub use self::manual::{ManualTransport, PendingCall};
pub use self::simulated::SimulatedTransport;
