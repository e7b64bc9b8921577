//! QueueBuilder - UploadQueue の構築とワイヤリング
//!
//! - Builder パターン
//! - 起動時検証（Fail-fast 設計）: transport 未設定や不正な設定は build() で弾く

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::ports::{Clock, IdGenerator, SystemClock, Transport, UlidGenerator};
use crate::queue::{QueueSettings, UploadQueue};

/// QueueBuilder は UploadQueue を構築
///
/// # 使用例
/// ```ignore
/// let queue = UploadQueue::builder()
///     .transport(HttpTransport::from_config(&http)?)
///     .config(config)
///     .build()?;
/// ```
///
/// Clock と IdGenerator は省略可能（SystemClock / UlidGenerator）。
pub struct QueueBuilder {
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    config: QueueConfig,
}

/// BuildError はキュー構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BuildError {
    #[error("no transport configured; call QueueBuilder::transport before build")]
    MissingTransport,

    #[error("event_capacity must be at least 1")]
    ZeroEventCapacity,

    #[error("auto_retry.multiplier must be a finite number >= 1.0, got {0}")]
    InvalidRetryMultiplier(f64),
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            clock: None,
            id_generator: None,
            config: QueueConfig::default(),
        }
    }

    pub fn transport(self, transport: impl Transport + 'static) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    /// 他でも保持している transport を共有して使う
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn id_generator(mut self, id_generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Arc::new(id_generator));
        self
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// # 検証
    /// - transport が設定されているか
    /// - event_capacity > 0（broadcast channel の要件）
    /// - auto_retry.multiplier が有限かつ 1.0 以上
    pub fn build(self) -> Result<UploadQueue, BuildError> {
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        if self.config.event_capacity == 0 {
            return Err(BuildError::ZeroEventCapacity);
        }
        let multiplier = self.config.auto_retry.multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(BuildError::InvalidRetryMultiplier(multiplier));
        }

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let id_generator: Arc<dyn IdGenerator> = match self.id_generator {
            Some(id_generator) => id_generator,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };

        let settings = QueueSettings {
            start_paused: self.config.start_paused,
            retry_dispatch: self.config.retry_dispatch,
            auto_retry: self.config.auto_retry.policy(),
            default_destination: self.config.default_destination,
            event_capacity: self.config.event_capacity,
        };
        Ok(UploadQueue::from_parts(transport, clock, id_generator, settings))
    }
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutoRetryConfig;
    use crate::impls::ManualTransport;

    #[test]
    fn build_without_transport_fails() {
        let result = QueueBuilder::new().build();
        assert!(matches!(result, Err(BuildError::MissingTransport)));
    }

    #[test]
    fn build_rejects_zero_event_capacity() {
        let result = QueueBuilder::new()
            .transport(ManualTransport::new())
            .config(QueueConfig {
                event_capacity: 0,
                ..QueueConfig::default()
            })
            .build();
        assert!(matches!(result, Err(BuildError::ZeroEventCapacity)));
    }

    #[test]
    fn build_rejects_shrinking_backoff() {
        let result = QueueBuilder::new()
            .transport(ManualTransport::new())
            .config(QueueConfig {
                auto_retry: AutoRetryConfig {
                    multiplier: 0.5,
                    ..AutoRetryConfig::default()
                },
                ..QueueConfig::default()
            })
            .build();
        assert!(matches!(result, Err(BuildError::InvalidRetryMultiplier(m)) if m == 0.5));
    }

    #[tokio::test]
    async fn start_paused_is_honoured() {
        let queue = QueueBuilder::new()
            .transport(ManualTransport::new())
            .config(QueueConfig {
                start_paused: true,
                ..QueueConfig::default()
            })
            .build()
            .unwrap();
        assert!(queue.is_paused().await);
    }
}
