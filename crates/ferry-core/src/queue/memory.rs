//! In-memory upload queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::driver;
use super::{AutoRetryPolicy, QueueItem, QueueItemView, RetryDispatch, StatusKind};
use crate::domain::{
    Destination, FilePayload, Progress, QueueEvent, RemoteFileId, UploadFailure, UploadId,
};
use crate::error::QueueError;
use crate::observability::QueueStats;
use crate::ports::{Clock, IdGenerator, Transport, UploadRequest};

/// Behaviour knobs resolved from `QueueConfig` at build time.
#[derive(Debug, Clone)]
pub(crate) struct QueueSettings {
    pub start_paused: bool,
    pub retry_dispatch: RetryDispatch,
    pub auto_retry: AutoRetryPolicy,
    pub default_destination: Destination,
    pub event_capacity: usize,
}

/// A running transport call.
struct InFlight {
    attempt: u32,
    handle: JoinHandle<()>,
}

/// In-memory queue state.
struct QueueState {
    /// All items, oldest first (single source of truth).
    items: Vec<QueueItem>,

    paused: bool,

    /// The upload picked by the processor: (item, attempt).
    /// The processor never starts another one while this is occupied.
    slot: Option<(UploadId, u32)>,

    /// Driver tasks, keyed by item.
    in_flight: HashMap<UploadId, InFlight>,

    /// Automatic retries waiting for their backoff delay.
    scheduled_retries: HashMap<UploadId, JoinHandle<()>>,
}

impl QueueState {
    fn position(&self, id: UploadId) -> Result<usize, QueueError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or(QueueError::NotFound(id))
    }

    fn item_mut(&mut self, id: UploadId) -> Result<&mut QueueItem, QueueError> {
        let idx = self.position(id)?;
        Ok(&mut self.items[idx])
    }

    fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::from_items(&self.items);
        stats.retry_scheduled = self.scheduled_retries.len();
        stats.paused = self.paused;
        stats
    }

    /// Stop the driver of `id`, if any, and free the serial slot it held.
    fn abort_in_flight(&mut self, id: UploadId) {
        if let Some(flight) = self.in_flight.remove(&id) {
            flight.handle.abort();
        }
        if matches!(self.slot, Some((slot_id, _)) if slot_id == id) {
            self.slot = None;
        }
    }

    fn abort_scheduled_retry(&mut self, id: UploadId) {
        if let Some(handle) = self.scheduled_retries.remove(&id) {
            handle.abort();
        }
    }
}

pub(crate) struct Shared {
    state: Mutex<QueueState>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    settings: QueueSettings,
    events: broadcast::Sender<QueueEvent>,
    stats_tx: watch::Sender<QueueStats>,
}

impl Shared {
    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    fn emit(&self, event: QueueEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_stats(&self, state: &QueueState) {
        self.stats_tx.send_replace(state.stats());
    }

    /// Processing loop step: if the serial slot is free and the queue is not
    /// paused, start the oldest pending item.
    fn pump(self: &Arc<Self>, state: &mut QueueState) {
        if state.paused || state.slot.is_some() {
            return;
        }
        let now = self.clock.now();
        let Some(item) = state
            .items
            .iter_mut()
            .find(|item| item.kind() == StatusKind::Pending)
        else {
            return;
        };
        let Ok(attempt) = item.start_attempt(now) else {
            return;
        };
        let request = request_for(item, attempt);
        let retry_count = item.retry_count;

        state.slot = Some((request.id, attempt));
        self.launch(state, request, retry_count);
    }

    /// Spawn the driver task for one attempt.
    fn launch(self: &Arc<Self>, state: &mut QueueState, request: UploadRequest, retry_count: u32) {
        let id = request.id;
        let attempt = request.attempt;
        info!(
            upload_id = %id,
            attempt,
            retry_count,
            file = %request.file.name,
            "upload started"
        );
        self.emit(QueueEvent::Started {
            id,
            attempt,
            retry_count,
        });

        let handle = tokio::spawn(driver::drive(Arc::clone(self), request));
        state.in_flight.insert(id, InFlight { attempt, handle });
    }

    /// Failed -> (re)send, following the configured dispatch mode.
    fn restart_failed(
        self: &Arc<Self>,
        state: &mut QueueState,
        id: UploadId,
    ) -> Result<(), QueueError> {
        match self.settings.retry_dispatch {
            RetryDispatch::Immediate => self.retry_immediately(state, id),
            RetryDispatch::Requeue => self.requeue_failed(state, id),
        }
    }

    /// Failed -> Uploading right away. Takes the serial slot only when nobody
    /// holds it and the queue is not paused.
    fn retry_immediately(
        self: &Arc<Self>,
        state: &mut QueueState,
        id: UploadId,
    ) -> Result<(), QueueError> {
        let now = self.clock.now();
        let item = state.item_mut(id)?;
        let attempt = item.retry_now(now)?;
        let request = request_for(item, attempt);
        let retry_count = item.retry_count;

        state.abort_scheduled_retry(id);
        if state.slot.is_none() && !state.paused {
            state.slot = Some((id, attempt));
        }
        self.launch(state, request, retry_count);
        Ok(())
    }

    /// Failed -> Pending; the processor picks it up in order, honouring
    /// pause and the serial slot.
    fn requeue_failed(
        self: &Arc<Self>,
        state: &mut QueueState,
        id: UploadId,
    ) -> Result<(), QueueError> {
        let now = self.clock.now();
        let item = state.item_mut(id)?;
        item.requeue(now)?;
        let retry_count = item.retry_count;

        state.abort_scheduled_retry(id);
        info!(upload_id = %id, retry_count, "upload requeued");
        self.emit(QueueEvent::Requeued { id, retry_count });
        self.pump(state);
        Ok(())
    }

    pub(crate) async fn on_progress(&self, id: UploadId, attempt: u32, progress: Progress) {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let Ok(item) = state.item_mut(id) else {
            return;
        };
        if item.record_progress(attempt, progress, now) {
            debug!(upload_id = %id, attempt, progress = progress.percent(), "upload progress");
            self.emit(QueueEvent::Progress { id, progress });
            self.publish_stats(&state);
        }
    }

    pub(crate) async fn on_finished(
        self: &Arc<Self>,
        id: UploadId,
        attempt: u32,
        result: Result<RemoteFileId, UploadFailure>,
    ) {
        let mut state = self.state.lock().await;

        if state
            .in_flight
            .get(&id)
            .is_some_and(|flight| flight.attempt == attempt)
        {
            state.in_flight.remove(&id);
        }
        if state.slot == Some((id, attempt)) {
            state.slot = None;
        }

        let now = self.clock.now();
        let mut retry_after = None;
        if let Ok(item) = state.item_mut(id) {
            match result {
                Ok(remote_id) => {
                    if item.complete(attempt, remote_id.clone(), now) {
                        info!(upload_id = %id, attempt, remote_id = %remote_id, "upload completed");
                        self.emit(QueueEvent::Completed { id, remote_id });
                    } else {
                        debug!(upload_id = %id, attempt, "discarding result of stale attempt");
                    }
                }
                Err(failure) => {
                    let retry_count = item.retry_count;
                    if item.fail(attempt, failure.clone(), now) {
                        warn!(
                            upload_id = %id,
                            attempt,
                            retry_count,
                            error = %failure,
                            "upload failed"
                        );
                        retry_after = self.settings.auto_retry.next_delay(retry_count, &failure);
                        self.emit(QueueEvent::Failed { id, failure });
                    } else {
                        debug!(upload_id = %id, attempt, "discarding failure of stale attempt");
                    }
                }
            }
        }

        if let Some(delay) = retry_after {
            self.schedule_retry(&mut state, id, attempt, delay);
        }
        self.pump(&mut state);
        self.publish_stats(&state);
    }

    fn schedule_retry(
        self: &Arc<Self>,
        state: &mut QueueState,
        id: UploadId,
        failed_attempt: u32,
        delay: Duration,
    ) {
        info!(upload_id = %id, delay_ms = delay.as_millis() as u64, "automatic retry scheduled");
        self.emit(QueueEvent::RetryScheduled {
            id,
            delay_ms: delay.as_millis() as u64,
        });

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.fire_scheduled_retry(id, failed_attempt).await;
        });
        state.scheduled_retries.insert(id, handle);
    }

    async fn fire_scheduled_retry(self: &Arc<Self>, id: UploadId, failed_attempt: u32) {
        let mut state = self.state.lock().await;
        state.scheduled_retries.remove(&id);

        // the user may have retried or removed the item in the meantime
        let still_waiting = state
            .item_mut(id)
            .is_ok_and(|item| item.kind() == StatusKind::Failed && item.attempt == failed_attempt);
        // automatic retries never bypass pause or the serial slot
        if still_waiting {
            if let Err(err) = self.requeue_failed(&mut state, id) {
                warn!(upload_id = %id, error = %err, "automatic retry refused");
            }
        }
        self.publish_stats(&state);
    }
}

fn request_for(item: &QueueItem, attempt: u32) -> UploadRequest {
    UploadRequest {
        id: item.id,
        attempt,
        file: Arc::clone(&item.file),
        destination: item.destination.clone(),
    }
}

/// Client-side upload queue.
///
/// Cheap to clone; every clone drives the same queue. Built once with
/// `QueueBuilder` and handed to whatever needs it.
///
/// Items are processed serially: the processor picks the oldest pending
/// item, waits for its transport call to resolve, then picks the next one.
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct UploadQueue {
    shared: Arc<Shared>,
}

impl UploadQueue {
    pub fn builder() -> crate::app::QueueBuilder {
        crate::app::QueueBuilder::new()
    }

    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        settings: QueueSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity);
        let state = QueueState {
            items: Vec::new(),
            paused: settings.start_paused,
            slot: None,
            in_flight: HashMap::new(),
            scheduled_retries: HashMap::new(),
        };
        let (stats_tx, _) = watch::channel(state.stats());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                transport,
                clock,
                ids,
                settings,
                events,
                stats_tx,
            }),
        }
    }

    /// Append one pending item per file (default destination), in
    /// submission order. Processing starts unless the queue is paused.
    pub async fn enqueue(
        &self,
        files: impl IntoIterator<Item = FilePayload>,
    ) -> Result<Vec<UploadId>, QueueError> {
        let destination = self.shared.settings.default_destination.clone();
        self.enqueue_to(files, destination).await
    }

    /// Same as `enqueue` with an explicit destination for the batch.
    pub async fn enqueue_to(
        &self,
        files: impl IntoIterator<Item = FilePayload>,
        destination: Destination,
    ) -> Result<Vec<UploadId>, QueueError> {
        let files: Vec<FilePayload> = files.into_iter().collect();
        if files.is_empty() {
            return Err(QueueError::EmptyBatch);
        }

        let mut state = self.shared.state.lock().await;
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = self.shared.ids.generate_upload_id();
            let name = file.name.clone();
            debug!(upload_id = %id, file = %name, size = file.size, "enqueued");
            state.items.push(QueueItem::new(
                id,
                Arc::new(file),
                destination.clone(),
                self.shared.clock.now(),
            ));
            self.shared.emit(QueueEvent::Enqueued { id, name });
            ids.push(id);
        }
        info!(count = ids.len(), paused = state.paused, "files enqueued");

        self.shared.pump(&mut state);
        self.shared.publish_stats(&state);
        Ok(ids)
    }

    /// Stop picking pending items. The in-flight upload keeps going.
    pub async fn pause(&self) {
        let mut state = self.shared.state.lock().await;
        if state.paused {
            return;
        }
        state.paused = true;
        info!("queue paused");
        self.shared.emit(QueueEvent::Paused);
        self.shared.publish_stats(&state);
    }

    /// Resume picking pending items in order.
    pub async fn resume(&self) {
        let mut state = self.shared.state.lock().await;
        if !state.paused {
            return;
        }
        state.paused = false;
        info!("queue resumed");
        self.shared.emit(QueueEvent::Resumed);
        self.shared.pump(&mut state);
        self.shared.publish_stats(&state);
    }

    /// Re-send a failed item. `retry_count` goes up by one and progress
    /// starts over at 0.
    pub async fn retry(&self, id: UploadId) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock().await;
        self.shared.restart_failed(&mut state, id)?;
        self.shared.publish_stats(&state);
        Ok(())
    }

    /// Cancel a pending or uploading item.
    ///
    /// An in-flight transport call is aborted; if it resolves anyway its
    /// result is discarded. Cancelling an item that is already terminal is a
    /// no-op.
    pub async fn cancel(&self, id: UploadId) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock().await;
        let now = self.shared.clock.now();
        let cancelled = state.item_mut(id)?.cancel(now)?;
        if !cancelled {
            return Ok(());
        }

        state.abort_in_flight(id);
        info!(upload_id = %id, "upload cancelled");
        self.shared.emit(QueueEvent::Cancelled { id });
        self.shared.pump(&mut state);
        self.shared.publish_stats(&state);
        Ok(())
    }

    /// Delete an item that is at rest (completed, cancelled or failed).
    pub async fn remove(&self, id: UploadId) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock().await;
        let idx = state.position(id)?;
        let kind = state.items[idx].kind();
        if !kind.is_at_rest() {
            return Err(QueueError::InvalidTransition {
                id,
                from: kind,
                action: "remove",
            });
        }

        state.items.remove(idx);
        state.abort_scheduled_retry(id);
        debug!(upload_id = %id, "removed from queue");
        self.shared.emit(QueueEvent::Removed { id });
        self.shared.publish_stats(&state);
        Ok(())
    }

    /// Drop every completed item. Returns how many were removed.
    pub async fn clear_completed(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        let before = state.items.len();
        state
            .items
            .retain(|item| item.kind() != StatusKind::Completed);
        let removed = before - state.items.len();

        if removed > 0 {
            info!(removed, "cleared completed uploads");
            self.shared.emit(QueueEvent::Cleared { removed });
            self.shared.publish_stats(&state);
        }
        removed
    }

    /// Cancel everything in flight or pending, then empty the queue.
    /// Returns how many items were dropped.
    pub async fn clear_all(&self) -> usize {
        let mut state = self.shared.state.lock().await;

        for (_, flight) in state.in_flight.drain() {
            flight.handle.abort();
        }
        for (_, handle) in state.scheduled_retries.drain() {
            handle.abort();
        }
        state.slot = None;

        let now = self.shared.clock.now();
        let mut cancelled = Vec::new();
        for item in state.items.iter_mut() {
            if let Ok(true) = item.cancel(now) {
                cancelled.push(item.id);
            }
        }
        for id in cancelled {
            self.shared.emit(QueueEvent::Cancelled { id });
        }

        let removed = state.items.len();
        state.items.clear();
        info!(removed, "queue cleared");
        self.shared.emit(QueueEvent::Cleared { removed });
        self.shared.publish_stats(&state);
        removed
    }

    /// Counts by status plus global progress. No side effects.
    pub async fn stats(&self) -> QueueStats {
        self.shared.state.lock().await.stats()
    }

    /// Row snapshots, oldest first.
    pub async fn items(&self) -> Vec<QueueItemView> {
        let state = self.shared.state.lock().await;
        state.items.iter().map(QueueItem::view).collect()
    }

    pub async fn get(&self, id: UploadId) -> Option<QueueItemView> {
        let state = self.shared.state.lock().await;
        state
            .items
            .iter()
            .find(|item| item.id == id)
            .map(QueueItem::view)
    }

    pub async fn is_paused(&self) -> bool {
        self.shared.state.lock().await.paused
    }

    /// Stream of queue events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    /// Latest stats, updated after every change.
    pub fn watch_stats(&self) -> watch::Receiver<QueueStats> {
        self.shared.stats_tx.subscribe()
    }

    /// Wait until nothing is uploading and nothing more will start on its
    /// own (no pending items or paused, no automatic retry scheduled).
    pub async fn wait_idle(&self) -> QueueStats {
        let mut rx = self.watch_stats();
        let idle = rx
            .wait_for(QueueStats::is_idle)
            .await
            .map(|stats| stats.clone());
        match idle {
            Ok(stats) => stats,
            // sender lives in `self`, so this only happens during teardown
            Err(_) => self.stats().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use crate::impls::ManualTransport;
    use crate::ports::{SystemClock, UlidGenerator};

    fn settings() -> QueueSettings {
        QueueSettings {
            start_paused: false,
            retry_dispatch: RetryDispatch::Immediate,
            auto_retry: AutoRetryPolicy::disabled(),
            default_destination: Destination::default(),
            event_capacity: 64,
        }
    }

    fn queue_with(transport: &ManualTransport, settings: QueueSettings) -> UploadQueue {
        UploadQueue::from_parts(
            Arc::new(transport.clone()),
            Arc::new(SystemClock),
            Arc::new(UlidGenerator::new(SystemClock)),
            settings,
        )
    }

    fn files(names: &[&str]) -> Vec<FilePayload> {
        names
            .iter()
            .map(|name| FilePayload::from_bytes(*name, vec![0u8; 16]))
            .collect()
    }

    async fn kinds(queue: &UploadQueue) -> Vec<StatusKind> {
        queue.items().await.iter().map(QueueItemView::kind).collect()
    }

    #[tokio::test]
    async fn enqueue_starts_first_item_only() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());

        let ids = queue.enqueue(files(&["a.png", "b.png", "c.png"])).await.unwrap();
        assert_eq!(ids.len(), 3);

        let call = transport.next_call().await.unwrap();
        assert_eq!(call.request.id, ids[0]);
        assert_eq!(
            kinds(&queue).await,
            vec![StatusKind::Uploading, StatusKind::Pending, StatusKind::Pending]
        );
        assert_eq!(transport.calls_started(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_refused() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());

        let err = queue.enqueue(Vec::new()).await.unwrap_err();
        assert_eq!(err, QueueError::EmptyBatch);
        assert_eq!(queue.stats().await.total, 0);
    }

    #[tokio::test]
    async fn progress_reaches_item_and_stats() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());
        let ids = queue.enqueue(files(&["a.png", "b.png"])).await.unwrap();

        let call = transport.next_call().await.unwrap();
        call.progress.report(Progress::new(60));
        call.progress.report(Progress::new(30));

        let mut stats_rx = queue.watch_stats();
        stats_rx
            .wait_for(|stats| stats.global_progress == 30)
            .await
            .unwrap();

        let item = queue.get(ids[0]).await.unwrap();
        assert_eq!(item.status.progress(), Some(Progress::new(60)));
    }

    #[tokio::test]
    async fn retry_of_non_failed_item_is_refused() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());
        let ids = queue.enqueue(files(&["a.png", "b.png"])).await.unwrap();
        let _call = transport.next_call().await.unwrap();

        let err = queue.retry(ids[1]).await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidTransition { from: StatusKind::Pending, .. }
        ));
        assert_eq!(queue.get(ids[1]).await.unwrap().retry_count, 0);

        let missing = UploadId::from_ulid(ulid::Ulid::new());
        assert_eq!(queue.retry(missing).await, Err(QueueError::NotFound(missing)));
    }

    #[tokio::test]
    async fn cancel_in_flight_discards_late_result_and_moves_on() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());
        let ids = queue.enqueue(files(&["a.png", "b.png"])).await.unwrap();

        let first = transport.next_call().await.unwrap();
        queue.cancel(ids[0]).await.unwrap();

        let second = transport.next_call().await.unwrap();
        assert_eq!(second.request.id, ids[1]);

        // resolving the aborted call changes nothing
        first.succeed("late");
        tokio::task::yield_now().await;
        assert_eq!(queue.get(ids[0]).await.unwrap().kind(), StatusKind::Cancelled);
        assert_eq!(queue.get(ids[1]).await.unwrap().kind(), StatusKind::Uploading);
    }

    #[tokio::test]
    async fn cancel_failed_item_is_refused_but_remove_works() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());
        let ids = queue.enqueue(files(&["a.png"])).await.unwrap();

        transport.next_call().await.unwrap().fail(UploadFailure::rejected("duplicate"));
        queue.wait_idle().await;

        let item = queue.get(ids[0]).await.unwrap();
        assert_eq!(item.status.failure().map(|f| f.kind), Some(FailureKind::Rejected));

        assert!(queue.cancel(ids[0]).await.is_err());
        queue.remove(ids[0]).await.unwrap();
        assert!(queue.items().await.is_empty());
    }

    #[tokio::test]
    async fn remove_refuses_active_items() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());
        let ids = queue.enqueue(files(&["a.png", "b.png"])).await.unwrap();
        let _call = transport.next_call().await.unwrap();

        for id in &ids {
            assert!(matches!(
                queue.remove(*id).await,
                Err(QueueError::InvalidTransition { action: "remove", .. })
            ));
        }
        assert_eq!(queue.stats().await.total, 2);
    }

    #[tokio::test]
    async fn pause_and_resume_are_idempotent() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());
        let mut events = queue.subscribe();

        queue.pause().await;
        queue.pause().await;
        assert!(queue.is_paused().await);
        queue.resume().await;
        queue.resume().await;
        assert!(!queue.is_paused().await);

        assert_eq!(events.recv().await.unwrap(), QueueEvent::Paused);
        assert_eq!(events.recv().await.unwrap(), QueueEvent::Resumed);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn clear_completed_leaves_others() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, settings());
        let ids = queue.enqueue(files(&["a.png", "b.png", "c.png"])).await.unwrap();

        transport.next_call().await.unwrap().succeed("m1");
        transport.next_call().await.unwrap().fail(UploadFailure::transport("reset"));
        let _third = transport.next_call().await.unwrap();

        assert_eq!(queue.clear_completed().await, 1);
        let remaining: Vec<UploadId> = queue.items().await.iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec![ids[1], ids[2]]);
    }

    #[tokio::test]
    async fn requeue_dispatch_keeps_single_upload() {
        let transport = ManualTransport::new();
        let queue = queue_with(
            &transport,
            QueueSettings {
                retry_dispatch: RetryDispatch::Requeue,
                ..settings()
            },
        );
        let ids = queue.enqueue(files(&["a.png", "b.png"])).await.unwrap();

        transport.next_call().await.unwrap().fail(UploadFailure::transport("reset"));
        let second = transport.next_call().await.unwrap();
        assert_eq!(second.request.id, ids[1]);

        queue.retry(ids[0]).await.unwrap();
        let stats = queue.stats().await;
        assert_eq!(stats.uploading, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(queue.get(ids[0]).await.unwrap().retry_count, 1);

        second.succeed("m2");
        let again = transport.next_call().await.unwrap();
        assert_eq!(again.request.id, ids[0]);
        assert_eq!(again.request.attempt, 2);
    }

    fn auto_retrying() -> QueueSettings {
        QueueSettings {
            auto_retry: AutoRetryPolicy::new(3, Duration::from_secs(1), 2.0),
            ..settings()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn automatic_retry_waits_for_the_serial_slot() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, auto_retrying());
        let ids = queue.enqueue(files(&["a.png", "b.png"])).await.unwrap();

        transport.next_call().await.unwrap().fail(UploadFailure::transport("reset"));
        let second = transport.next_call().await.unwrap();
        assert_eq!(second.request.id, ids[1]);

        tokio::time::sleep(Duration::from_secs(2)).await;

        let stats = queue.stats().await;
        assert_eq!(stats.uploading, 1);
        assert_eq!(stats.retry_scheduled, 0);
        assert_eq!(transport.calls_started(), 2);
        let first = queue.get(ids[0]).await.unwrap();
        assert_eq!(first.kind(), StatusKind::Pending);
        assert_eq!(first.retry_count, 1);

        second.succeed("m2");
        let again = transport.next_call().await.unwrap();
        assert_eq!(again.request.id, ids[0]);
        assert_eq!(again.request.attempt, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn automatic_retry_respects_pause() {
        let transport = ManualTransport::new();
        let queue = queue_with(&transport, auto_retrying());
        let ids = queue.enqueue(files(&["a.png"])).await.unwrap();

        transport.next_call().await.unwrap().fail(UploadFailure::transport("reset"));
        let mut stats_rx = queue.watch_stats();
        stats_rx
            .wait_for(|stats| stats.retry_scheduled == 1)
            .await
            .unwrap();
        queue.pause().await;

        tokio::time::sleep(Duration::from_secs(2)).await;

        let stats = queue.stats().await;
        assert_eq!(stats.uploading, 0);
        assert_eq!(stats.pending, 1);
        assert_eq!(transport.calls_started(), 1);
        assert!(transport.try_next_call().await.is_none());

        queue.resume().await;
        let again = transport.next_call().await.unwrap();
        assert_eq!(again.request.id, ids[0]);
        assert_eq!(again.request.attempt, 2);
    }
}
