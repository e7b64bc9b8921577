//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! Queue の外側にあるもの（ファイル送信、時刻、ID 生成）は trait で
//! 受け取り、実装は差し替え可能にしています。

pub mod clock;
pub mod id_generator;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::transport::{ProgressReporter, Transport, UploadRequest};
