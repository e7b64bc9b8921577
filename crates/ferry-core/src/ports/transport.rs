//! Transport port - ファイル送信の抽象化
//!
//! Queue は送信形式を知りません。transport はファイル 1 件と destination を
//! 受け取り、進捗を横のチャネルで報告し、サーバー側の ID か失敗で終わります。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{Destination, FilePayload, Progress, RemoteFileId, UploadFailure, UploadId};

/// 1 回の試行に必要なもの一式
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub id: UploadId,
    /// この item の試行番号（1 始まり）
    pub attempt: u32,
    pub file: Arc<FilePayload>,
    pub destination: Destination,
}

/// transport に渡す進捗チャネル
///
/// 報告は upload の future を poll している間に queue が取り込みます。
/// queue が聞くのをやめた後（キャンセル・クリア後）の報告は黙って捨てられます。
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<Progress>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, progress: Progress) {
        // 受信側がいなければ誰も見ていない
        let _ = self.tx.send(progress);
    }

    pub fn report_bytes(&self, sent: u64, total: u64) {
        self.report(Progress::from_bytes(sent, total));
    }
}

/// Transport はファイルを 1 件送る
///
/// # キャンセル
/// queue は実行中のアップロードを、ここで返した future を drop して止めます。
/// 実装は最後まで実行される前提に立たないこと。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> Result<RemoteFileId, UploadFailure>;
}
