//! Upload driver: runs one transport call and feeds its outcome back to the
//! queue.

use std::sync::Arc;

use super::memory::Shared;
use crate::ports::{ProgressReporter, UploadRequest};

/// Drive a single attempt.
///
/// Progress reports are applied while the transport future is still
/// pending. The queue cancels the attempt by aborting this task, which drops
/// the transport future mid-flight.
pub(crate) async fn drive(shared: Arc<Shared>, request: UploadRequest) {
    let id = request.id;
    let attempt = request.attempt;
    let (reporter, mut progress_rx) = ProgressReporter::channel();

    let transport = shared.transport();
    let mut upload = transport.upload(request, reporter);
    let result = loop {
        tokio::select! {
            result = &mut upload => break result,
            Some(progress) = progress_rx.recv() => {
                shared.on_progress(id, attempt, progress).await;
            }
        }
    };

    shared.on_finished(id, attempt, result).await;
}
