//! ManualTransport - 呼び出しごとに結果を外から決めるテスト用 transport

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::domain::{RemoteFileId, UploadFailure};
use crate::ports::{ProgressReporter, Transport, UploadRequest};

type Outcome = Result<RemoteFileId, UploadFailure>;

/// 保留中の transport 呼び出し 1 件
///
/// 結果を決めずに drop すると transport エラーで失敗します。
pub struct PendingCall {
    pub request: UploadRequest,
    pub progress: ProgressReporter,
    responder: oneshot::Sender<Outcome>,
}

impl PendingCall {
    pub fn resolve(self, outcome: Outcome) {
        // queue 側で既にキャンセル済みのこともある
        let _ = self.responder.send(outcome);
    }

    pub fn succeed(self, remote_id: impl Into<String>) {
        self.resolve(Ok(RemoteFileId::new(remote_id)));
    }

    pub fn fail(self, failure: UploadFailure) {
        self.resolve(Err(failure));
    }
}

struct ManualInner {
    calls_tx: mpsc::UnboundedSender<PendingCall>,
    calls_rx: Mutex<mpsc::UnboundedReceiver<PendingCall>>,
    started: AtomicUsize,
}

/// 呼び出しを保留し、呼び出し側が結果を決める transport
///
/// 成功・失敗・進捗の順序をテストから正確に組み立てられます。
#[derive(Clone)]
pub struct ManualTransport {
    inner: Arc<ManualInner>,
}

impl ManualTransport {
    pub fn new() -> Self {
        let (calls_tx, calls_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ManualInner {
                calls_tx,
                calls_rx: Mutex::new(calls_rx),
                started: AtomicUsize::new(0),
            }),
        }
    }

    /// 次の transport 呼び出しを待つ
    pub async fn next_call(&self) -> Option<PendingCall> {
        self.inner.calls_rx.lock().await.recv().await
    }

    /// 既に届いている呼び出しがあれば返す（待たない）
    pub async fn try_next_call(&self) -> Option<PendingCall> {
        self.inner.calls_rx.lock().await.try_recv().ok()
    }

    /// `upload` が呼ばれた回数
    pub fn calls_started(&self) -> usize {
        self.inner.started.load(Ordering::SeqCst)
    }
}

impl Default for ManualTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ManualTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> Result<RemoteFileId, UploadFailure> {
        self.inner.started.fetch_add(1, Ordering::SeqCst);
        let (responder, outcome) = oneshot::channel();
        let call = PendingCall {
            request,
            progress,
            responder,
        };
        if self.inner.calls_tx.send(call).is_err() {
            return Err(UploadFailure::transport("manual transport closed"));
        }
        match outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(UploadFailure::transport("call dropped without an answer")),
        }
    }
}
