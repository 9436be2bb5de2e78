//! Background population of the calendar cache.
//!
//! A cold year listing reads a chat's whole history. Instead of spawning a
//! task per message, the timestamps are handed over as one batch to a fixed
//! pool of workers reading from a bounded queue. Workers split each batch
//! into calendar dates and merge them into [`CalendarCache`] in chunks, one
//! lock acquisition per chunk.
//!
//! Submitting never blocks the request path. When the queue is full the
//! batch waits in a detached sender task instead of being dropped, so every
//! submitted batch is eventually merged unless the queue is shut down. A chat
//! has at most one waiting batch: later overflow for the same chat is folded
//! into it, so repeated cold listings cannot pile up copies of one history.

use super::cache::CalendarCache;
use super::config::CalendarConfig;
use super::range::{CalendarDate, CalendarZone};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Batch of timestamps discovered for one chat.
#[derive(Debug)]
struct PopulationJob {
    chat_id: i64,
    timestamps: Vec<i64>,
}

/// Count of submitted but unmerged jobs.
#[derive(Debug, Default)]
struct InFlight {
    jobs: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn begin(&self) {
        self.jobs.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        let previous = self
            .jobs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |jobs| jobs.checked_sub(1));
        if previous == Ok(1) {
            self.idle.notify_waiters();
        }
    }

    fn clear(&self) {
        self.jobs.store(0, Ordering::Release);
        self.idle.notify_waiters();
    }

    fn count(&self) -> usize {
        self.jobs.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Split timestamps into distinct calendar dates, skipping unrepresentable ones.
pub(crate) fn distinct_dates(
    zone: CalendarZone,
    chat_id: i64,
    timestamps: &[i64],
) -> BTreeSet<CalendarDate> {
    timestamps
        .iter()
        .filter_map(|&timestamp| {
            let date = zone.date_of(timestamp);
            if date.is_none() {
                log::warn!(
                    "chat {}: skipping timestamp {} outside the calendar range",
                    chat_id,
                    timestamp
                );
            }
            date
        })
        .collect()
}

/// Bounded worker pool that fills [`CalendarCache`] in the background.
#[derive(Debug)]
pub struct PopulationQueue {
    sender: mpsc::Sender<PopulationJob>,
    in_flight: Arc<InFlight>,
    deferred: Arc<Mutex<HashMap<i64, Vec<i64>>>>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PopulationQueue {
    /// Spawn the worker pool. Must be called inside a Tokio runtime.
    pub fn start(cache: Arc<CalendarCache>, config: &CalendarConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let in_flight = Arc::new(InFlight::default());
        let cancel = CancellationToken::new();

        let workers = (0..config.population_workers.max(1))
            .map(|id| {
                let worker = PopulationWorker {
                    id,
                    cache: Arc::clone(&cache),
                    zone: config.zone,
                    chunk_size: config.batch_size.max(1),
                    receiver: Arc::clone(&receiver),
                    in_flight: Arc::clone(&in_flight),
                    cancel: cancel.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        log::info!(
            "calendar population started: {} workers, queue capacity {}",
            config.population_workers.max(1),
            config.queue_capacity.max(1)
        );

        Self {
            sender,
            in_flight,
            deferred: Arc::new(Mutex::new(HashMap::new())),
            cancel,
            workers: Mutex::new(workers),
        }
    }

    /// Queue a batch of timestamps for `chat_id` without waiting.
    pub fn submit(&self, chat_id: i64, timestamps: Vec<i64>) {
        if timestamps.is_empty() || self.cancel.is_cancelled() {
            return;
        }

        self.in_flight.begin();
        let job = PopulationJob {
            chat_id,
            timestamps,
        };

        match self.sender.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => self.defer(job),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!("population queue closed, dropping batch for chat {}", chat_id);
                self.in_flight.finish();
            }
        }
    }

    /// Park a batch until the queue has room, folding it into the chat's
    /// waiting batch if there is one.
    fn defer(&self, job: PopulationJob) {
        let PopulationJob {
            chat_id,
            timestamps,
        } = job;

        {
            let mut deferred = self.deferred.lock();
            if let Some(waiting) = deferred.get_mut(&chat_id) {
                waiting.extend(timestamps);
                waiting.sort_unstable();
                waiting.dedup();
                log::debug!(
                    "population queue full, chat {} batch folded into waiting batch ({} timestamps)",
                    chat_id,
                    waiting.len()
                );
                // Already counted by the waiting batch.
                self.in_flight.finish();
                return;
            }
            log::debug!(
                "population queue full, deferring {} timestamps for chat {}",
                timestamps.len(),
                chat_id
            );
            deferred.insert(chat_id, timestamps);
        }

        let sender = self.sender.clone();
        let deferred = Arc::clone(&self.deferred);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let permit = sender.reserve().await;
            let timestamps = deferred.lock().remove(&chat_id);
            match (permit, timestamps) {
                (Ok(permit), Some(timestamps)) => permit.send(PopulationJob {
                    chat_id,
                    timestamps,
                }),
                (Err(_), Some(_)) => in_flight.finish(),
                // Discarded by shutdown.
                (_, None) => {}
            }
        });
    }

    /// Chats with a batch waiting for queue capacity.
    pub fn deferred_chats(&self) -> usize {
        self.deferred.lock().len()
    }

    /// Jobs submitted but not yet merged.
    pub fn pending(&self) -> usize {
        self.in_flight.count()
    }

    /// Wait until every submitted batch has been merged.
    pub async fn wait_idle(&self) {
        self.in_flight.wait().await;
    }

    /// Stop the workers. Batches still queued are discarded.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(err) = worker.await {
                log::error!("population worker failed: {}", err);
            }
        }

        let discarded = self.in_flight.count();
        if discarded > 0 {
            log::info!("calendar population stopped, {} batches discarded", discarded);
        }
        self.deferred.lock().clear();
        self.in_flight.clear();
    }
}

impl Drop for PopulationQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct PopulationWorker {
    id: usize,
    cache: Arc<CalendarCache>,
    zone: CalendarZone,
    chunk_size: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<PopulationJob>>>,
    in_flight: Arc<InFlight>,
    cancel: CancellationToken,
}

impl PopulationWorker {
    async fn run(self) {
        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = next_job(&self.receiver) => job,
            };
            let Some(job) = job else { break };

            self.merge(&job);
            self.in_flight.finish();
        }
        log::debug!("population worker {} stopped", self.id);
    }

    fn merge(&self, job: &PopulationJob) {
        let mut added = 0;
        for chunk in job.timestamps.chunks(self.chunk_size) {
            if self.cancel.is_cancelled() {
                break;
            }
            let dates = distinct_dates(self.zone, job.chat_id, chunk);
            added += self.cache.insert_many(job.chat_id, dates);
        }

        log::debug!(
            "population worker {}: chat {} merged {} timestamps, {} new dates",
            self.id,
            job.chat_id,
            job.timestamps.len(),
            added
        );
    }
}

async fn next_job(
    receiver: &tokio::sync::Mutex<mpsc::Receiver<PopulationJob>>,
) -> Option<PopulationJob> {
    receiver.lock().await.recv().await
}
