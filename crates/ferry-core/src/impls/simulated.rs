//! SimulatedTransport - 疑似的なアップロード（デモ・開発用）

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Progress, RemoteFileId, UploadFailure};
use crate::ports::{ProgressReporter, Transport, UploadRequest};

/// アップロードのふりをする transport
///
/// `step_delay` ごとに `steps` 回進捗を報告してから成功します。
/// ファイル名ごとに最初の `failures_per_file` 回は途中で transport エラー、
/// 名前に `reject_marker` を含むファイルは常に拒否されるので、サーバーなしで
/// リトライの経路を試せます。
#[derive(Debug)]
pub struct SimulatedTransport {
    step_delay: Duration,
    steps: u8,
    failures_per_file: u32,
    reject_marker: Option<String>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl SimulatedTransport {
    pub fn new(step_delay: Duration, steps: u8) -> Self {
        Self {
            step_delay,
            steps: steps.max(1),
            failures_per_file: 0,
            reject_marker: None,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing_first(mut self, failures_per_file: u32) -> Self {
        self.failures_per_file = failures_per_file;
        self
    }

    pub fn rejecting(mut self, marker: impl Into<String>) -> Self {
        self.reject_marker = Some(marker.into());
        self
    }

    fn record_attempt(&self, name: &str) -> u32 {
        let Ok(mut attempts) = self.attempts.lock() else {
            return u32::MAX;
        };
        let count = attempts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> Result<RemoteFileId, UploadFailure> {
        let name = &request.file.name;
        if let Some(marker) = &self.reject_marker {
            if name.contains(marker.as_str()) {
                return Err(UploadFailure::rejected(format!("{name} already exists")));
            }
        }
        let attempt = self.record_attempt(name);

        for step in 1..=self.steps {
            tokio::time::sleep(self.step_delay).await;
            if attempt <= self.failures_per_file && step > self.steps / 2 {
                return Err(UploadFailure::transport(format!(
                    "connection reset while sending {name}"
                )));
            }
            let percent = (u16::from(step) * 100 / u16::from(self.steps)) as u8;
            progress.report(Progress::new(percent));
        }

        let remote = match &request.destination.folder {
            Some(folder) => format!("{folder}/{}", request.id),
            None => request.id.to_string(),
        };
        Ok(RemoteFileId::new(remote))
    }
}
