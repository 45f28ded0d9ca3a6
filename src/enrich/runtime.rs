//! Background enrichment runtime.
//!
//! Enrichment is the only stage that touches I/O. This module runs it on a
//! small, bounded pool of worker threads so callers never block on the
//! store. There is no cancellation: every submission gets a generation
//! number, and a result whose generation has been superseded is discarded
//! by [`EnrichmentHandle::join_latest`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error};

use crate::cluster::ClusterSet;
use crate::enrich::{EnrichmentOutcome, RecordEnricher};
use crate::error::{EntifyError, EntifyResult, ExecutionError};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct EnrichmentRuntimeConfig {
    /// Number of enrichment workers.
    pub workers: usize,
    /// Maximum queued jobs.
    pub queue_capacity: usize,
}

impl Default for EnrichmentRuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
        }
    }
}

enum Job {
    Enrich {
        generation: u64,
        set: ClusterSet,
        reply: Sender<EnrichmentOutcome>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize, enricher: &Arc<RecordEnricher>) -> Self {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let enricher = Arc::clone(enricher);
            let spawned = thread::Builder::new()
                .name(format!("entify-enrich-{idx}"))
                .spawn(move || loop {
                    match rx.recv() {
                        Ok(Job::Enrich {
                            generation,
                            set,
                            reply,
                        }) => {
                            debug!(target: "entify::enrich", generation, clusters = set.len(), "enrichment job started");
                            let outcome = enricher.enrich(&set);
                            let _ = reply.send(outcome);
                        }
                        Err(_) => break,

                        #[cfg(test)]
                        Ok(Job::Sleep { duration, reply }) => {
                            thread::sleep(duration);
                            let _ = reply.send(());
                        }
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => error!(target: "entify::enrich", worker = idx, "failed to spawn enrichment worker: {err}"),
            }
        }

        Self {
            tx,
            workers: handles,
            queue_capacity,
        }
    }

    fn try_submit(&self, job: Job) -> Result<(), ExecutionError> {
        if self.workers.is_empty() {
            return Err(ExecutionError::Disconnected);
        }
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ExecutionError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(ExecutionError::Disconnected),
        }
    }

    fn shutdown(self) {
        // Close the channel: workers drain queued jobs then exit.
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// Handle returned by [`EnrichmentRuntime::submit`].
pub struct EnrichmentHandle {
    generation: u64,
    latest: Arc<AtomicU64>,
    rx: Receiver<EnrichmentOutcome>,
}

impl EnrichmentHandle {
    /// Generation assigned at submission.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// True while no newer submission exists.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    /// Waits for the enrichment to complete.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::Disconnected`] when the worker went away.
    pub fn join(self) -> EntifyResult<EnrichmentOutcome> {
        self.rx
            .recv()
            .map_err(|_| EntifyError::Execution(ExecutionError::Disconnected))
    }

    /// Waits for the enrichment to complete with a timeout.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::Timeout`] or [`ExecutionError::Disconnected`].
    pub fn join_timeout(self, timeout: Duration) -> EntifyResult<EnrichmentOutcome> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            crossbeam_channel::RecvTimeoutError::Timeout => {
                EntifyError::Execution(ExecutionError::Timeout {
                    duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
                })
            }
            crossbeam_channel::RecvTimeoutError::Disconnected => {
                EntifyError::Execution(ExecutionError::Disconnected)
            }
        })
    }

    /// Waits, then returns the outcome only if it is still the newest.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::Disconnected`] when the worker went away.
    pub fn join_latest(self) -> EntifyResult<Option<EnrichmentOutcome>> {
        let generation = self.generation;
        let latest = Arc::clone(&self.latest);
        let outcome = self.join()?;
        if latest.load(Ordering::SeqCst) == generation {
            Ok(Some(outcome))
        } else {
            debug!(target: "entify::enrich", generation, "discarding superseded enrichment result");
            Ok(None)
        }
    }
}

/// Thread pool running [`RecordEnricher`] calls off the caller's thread.
pub struct EnrichmentRuntime {
    enricher: Arc<RecordEnricher>,
    pool: WorkerPool,
    latest: Arc<AtomicU64>,
}

impl EnrichmentRuntime {
    /// Starts the worker pool.
    #[must_use]
    pub fn new(enricher: RecordEnricher, config: EnrichmentRuntimeConfig) -> Self {
        let enricher = Arc::new(enricher);
        let pool = WorkerPool::start(config.workers, config.queue_capacity, &enricher);
        Self {
            enricher,
            pool,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queues enrichment of `set`. Supersedes every earlier submission.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::QueueFull`] when the queue is at capacity.
    pub fn submit(&self, set: ClusterSet) -> EntifyResult<EnrichmentHandle> {
        // Generations are taken before queueing so their order matches the
        // queue order across concurrent submitters.
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = bounded::<EnrichmentOutcome>(1);
        let job = Job::Enrich {
            generation,
            set,
            reply: tx,
        };
        if let Err(err) = self.pool.try_submit(job) {
            // Hand the generation back unless a newer submission took over.
            let _ = self.latest.compare_exchange(
                generation,
                generation - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            return Err(err.into());
        }
        Ok(EnrichmentHandle {
            generation,
            latest: Arc::clone(&self.latest),
            rx,
        })
    }

    /// Enriches synchronously on the caller's thread.
    #[must_use]
    pub fn enrich_now(&self, set: &ClusterSet) -> EnrichmentOutcome {
        self.enricher.enrich(set)
    }

    /// Newest generation handed out.
    #[must_use]
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> Result<Receiver<()>, ExecutionError> {
        let (tx, rx) = bounded::<()>(1);
        self.pool.try_submit(Job::Sleep { duration, reply: tx })?;
        Ok(rx)
    }
}

impl Drop for EnrichmentRuntime {
    fn drop(&mut self) {
        // Deterministic shutdown: stop workers and join threads.
        let pool = std::mem::replace(
            &mut self.pool,
            WorkerPool {
                tx: bounded::<Job>(1).0,
                workers: Vec::new(),
                queue_capacity: 1,
            },
        );
        pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::assemble::assemble_clusters;
    use crate::entity::{Attributes, EntityId};
    use crate::record::MatchRecord;
    use crate::storage::InMemoryRecordStore;

    fn rec(left: &str, right: &str) -> MatchRecord {
        MatchRecord {
            left_id: EntityId::parse(left).unwrap(),
            right_id: EntityId::parse(right).unwrap(),
            probability: 0.9,
            left_attrs: Attributes::new(),
            right_attrs: Attributes::new(),
        }
    }

    fn runtime(workers: usize, queue_capacity: usize) -> EnrichmentRuntime {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .load_csv("people", "id,name\na,Ann\nb,Bob\nc,Cy\n".as_bytes())
            .unwrap();
        EnrichmentRuntime::new(
            RecordEnricher::new(store, "people"),
            EnrichmentRuntimeConfig {
                workers,
                queue_capacity,
            },
        )
    }

    #[test]
    fn submit_and_join() {
        let rt = runtime(1, 4);
        let set = assemble_clusters(&[rec("a", "b")], 0.5).unwrap();
        let handle = rt.submit(set).unwrap();
        assert_eq!(handle.generation(), 1);
        let outcome = handle.join_timeout(Duration::from_secs(2)).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn newer_submission_supersedes_older() {
        let rt = runtime(2, 8);
        let first = rt.submit(assemble_clusters(&[rec("a", "b")], 0.5).unwrap()).unwrap();
        let second = rt.submit(assemble_clusters(&[rec("b", "c")], 0.5).unwrap()).unwrap();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(rt.latest_generation(), 2);

        assert!(first.join_latest().unwrap().is_none());
        let latest = second.join_latest().unwrap().unwrap();
        assert!(latest.record("c").is_some());
        assert!(latest.record("a").is_none());
    }

    #[test]
    fn each_call_produces_an_independent_map() {
        let rt = runtime(2, 8);
        let h1 = rt.submit(assemble_clusters(&[rec("a", "b")], 0.5).unwrap()).unwrap();
        let h2 = rt.submit(assemble_clusters(&[rec("c", "zz")], 0.5).unwrap()).unwrap();
        let o1 = h1.join().unwrap();
        let o2 = h2.join().unwrap();
        assert_eq!(o1.records.len(), 2);
        assert_eq!(o2.records.len(), 1);
        assert!(o1.record("c").is_none());
    }

    #[test]
    fn full_queue_is_reported_not_blocking() {
        let rt = runtime(1, 1);
        // Occupy the only worker, then fill the single queue slot.
        let busy = rt.submit_sleep(Duration::from_millis(200)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let _queued = rt.submit_sleep(Duration::from_millis(1)).unwrap();

        let err = rt
            .submit(assemble_clusters(&[rec("a", "b")], 0.5).unwrap())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            EntifyError::Execution(ExecutionError::QueueFull { capacity: 1 })
        ));
        assert!(err.is_retryable());
        assert_eq!(rt.latest_generation(), 0);
        busy.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn concurrent_submitters_get_distinct_ordered_generations() {
        let rt = Arc::new(runtime(2, 64));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let rt = Arc::clone(&rt);
                std::thread::spawn(move || {
                    let set = assemble_clusters(&[rec("a", "b")], 0.5).unwrap();
                    rt.submit(set).unwrap()
                })
            })
            .collect();
        let handles: Vec<EnrichmentHandle> =
            threads.into_iter().map(|t| t.join().unwrap()).collect();

        let mut generations: Vec<u64> = handles.iter().map(EnrichmentHandle::generation).collect();
        generations.sort_unstable();
        assert_eq!(generations, (1..=8).collect::<Vec<_>>());
        assert_eq!(rt.latest_generation(), 8);
        assert_eq!(handles.iter().filter(|h| h.is_current()).count(), 1);
    }

    #[test]
    fn join_reports_disconnected_when_reply_sender_dropped() {
        let (tx, rx) = bounded::<EnrichmentOutcome>(1);
        drop(tx);
        let handle = EnrichmentHandle {
            generation: 1,
            latest: Arc::new(AtomicU64::new(1)),
            rx,
        };
        let err = handle.join_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(
            err,
            EntifyError::Execution(ExecutionError::Disconnected)
        ));
    }

    #[test]
    fn enrich_now_matches_background_result() {
        let rt = runtime(1, 2);
        let set = assemble_clusters(&[rec("a", "c")], 0.5).unwrap();
        let direct = rt.enrich_now(&set);
        let background = rt.submit(set).unwrap().join().unwrap();
        assert_eq!(direct.records, background.records);
    }
}
