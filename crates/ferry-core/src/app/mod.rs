//! App - アプリケーション層
//!
//! ports の実装を組み合わせて UploadQueue を組み立てます。

pub mod builder;

pub use self::builder::{BuildError, QueueBuilder};
