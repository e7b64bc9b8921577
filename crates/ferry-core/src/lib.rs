//! ferry-core
//!
//! メディアライブラリ向けのクライアント側アップロードキュー。
//! 1 件ずつ順番に送り、一時停止・再開・リトライ・キャンセルと全体進捗を扱います。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, file payload, destination, progress, failure, events）
//! - **queue**: 状態機械と in-memory の UploadQueue
//! - **ports**: 抽象化レイヤー（Transport, Clock, IdGenerator）
//! - **impls**: ports の実装（HttpTransport, SimulatedTransport, ManualTransport）
//! - **app**: QueueBuilder（起動時検証つきの組み立て）
//! - **config**: TOML 設定
//! - **observability**: QueueStats（集計）
//! - **error**: QueueError（操作エラー）

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

pub use app::{BuildError, QueueBuilder};
pub use config::{ConfigError, QueueConfig};
pub use domain::{Destination, FilePayload, Progress, QueueEvent, UploadFailure, UploadId};
pub use error::QueueError;
pub use observability::QueueStats;
pub use queue::{QueueItemView, StatusKind, UploadQueue, UploadStatus};
