//! Concurrent bulk verification.
//!
//! A fixed-size pool of workers consumes addresses from a bounded queue,
//! runs the pipeline on each, and publishes results to a collector that
//! restores input order. Rate limiting, per-worker health gating and
//! cooperative cancellation keep long runs polite and stoppable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::pipeline::Verifier;
use crate::result::{Status, VerificationResult};

/// Pause applied to a worker whose health probe failed.
const HEALTH_FAILURE_BACKOFF: Duration = Duration::from_secs(30);

/// Tuning for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Fixed delay applied after each verification.
    pub delay: Duration,
    /// Upper bound of the uniform random addition to `delay`.
    pub jitter: Duration,
    /// Known-good address verified periodically to detect blocklisting.
    pub health_address: Option<String>,
    /// Run the health probe every N processed jobs per worker.
    pub health_interval: usize,
    /// Depth of the job and result queues.
    pub buffer_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            delay: Duration::from_secs(2),
            jitter: Duration::from_secs(1),
            health_address: None,
            health_interval: 10,
            buffer_size: 100,
        }
    }
}

#[derive(Debug, Clone)]
struct Job {
    email: String,
    #[allow(dead_code)]
    index: usize,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    errors: AtomicU64,
    health_failures: AtomicU64,
}

/// Snapshot of the pool's atomic counters.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub processed: u64,
    pub errors: u64,
    pub health_failures: u64,
    pub duration: Duration,
    /// Addresses per second over `duration`.
    pub rate: f64,
}

type ResultHook = Arc<dyn Fn(&VerificationResult) + Send + Sync>;

/// Fixed-size worker pool over a shared verifier.
pub struct WorkerPool {
    verifier: Arc<Verifier>,
    config: PoolConfig,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    on_result: Option<ResultHook>,
}

impl WorkerPool {
    pub fn new(verifier: Arc<Verifier>, config: PoolConfig) -> Self {
        Self {
            verifier,
            config,
            cancel: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
            on_result: None,
        }
    }

    /// Wires an externally owned cancellation token (the CLI connects this
    /// to the interrupt signal).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Registers a callback invoked by workers for every finished result.
    pub fn on_result(mut self, hook: impl Fn(&VerificationResult) + Send + Sync + 'static) -> Self {
        self.on_result = Some(Arc::new(hook));
        self
    }

    /// The token observed by every worker, producer and collector.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn processed(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    pub fn health_failures(&self) -> u64 {
        self.counters.health_failures.load(Ordering::Relaxed)
    }

    /// Counter snapshot with throughput over the elapsed wall clock.
    pub fn stats(&self, since: Instant) -> PoolStats {
        let processed = self.processed();
        let duration = since.elapsed();
        let rate = if duration.as_secs_f64() > 0.0 {
            processed as f64 / duration.as_secs_f64()
        } else {
            0.0
        };
        PoolStats {
            processed,
            errors: self.errors(),
            health_failures: self.health_failures(),
            duration,
            rate,
        }
    }

    /// Verifies every address and returns the results in input order.
    ///
    /// The producer closes the job queue when all addresses are enqueued;
    /// workers drain it and exit, which closes the result channel and ends
    /// collection. Cancelling the token stops producer and workers promptly,
    /// discarding undelivered results.
    pub async fn run(&self, emails: Vec<String>) -> Vec<VerificationResult> {
        info!(workers = self.config.workers, jobs = emails.len(), "starting worker pool");

        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(self.config.buffer_size.max(1));
        let (results_tx, mut results_rx) =
            mpsc::channel::<VerificationResult>(self.config.buffer_size.max(1));
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));

        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers.max(1) {
            workers.push(tokio::spawn(worker_loop(
                id,
                Arc::clone(&self.verifier),
                self.config.clone(),
                Arc::clone(&jobs_rx),
                results_tx.clone(),
                self.cancel.clone(),
                Arc::clone(&self.counters),
                self.on_result.clone(),
            )));
        }
        // The collector finishes once the last worker drops its sender.
        drop(results_tx);

        let producer = {
            let cancel = self.cancel.clone();
            let feed: Vec<Job> = emails
                .iter()
                .enumerate()
                .map(|(index, email)| Job {
                    email: email.clone(),
                    index,
                })
                .collect();
            tokio::spawn(async move {
                for job in feed {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = jobs_tx.send(job) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                // jobs_tx drops here, closing the queue for the workers.
            })
        };

        let mut by_email: HashMap<String, VerificationResult> = HashMap::new();
        while let Some(result) = results_rx.recv().await {
            by_email.insert(result.email.clone(), result);
        }

        producer.await.ok();
        for worker in workers {
            worker.await.ok();
        }

        debug!(collected = by_email.len(), "worker pool drained");

        // Restore input order at emit time.
        emails
            .iter()
            .filter_map(|email| by_email.get(email).cloned())
            .collect()
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    id: usize,
    verifier: Arc<Verifier>,
    config: PoolConfig,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<VerificationResult>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    on_result: Option<ResultHook>,
) {
    debug!(worker = id, "worker started");
    let mut local_processed: usize = 0;

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(worker = id, "worker cancelled");
                break;
            }
            job = recv_job(&jobs) => match job {
                Some(job) => job,
                None => {
                    debug!(worker = id, processed = local_processed, "worker shutting down");
                    break;
                }
            },
        };

        // Health gate: periodically re-verify a known-good address; a
        // failure means the server has likely started rejecting everything,
        // so back off instead of burning more probes.
        if let Some(health_address) = &config.health_address {
            if config.health_interval > 0
                && local_processed > 0
                && local_processed % config.health_interval == 0
                && !health_check(&verifier, health_address).await
            {
                error!(worker = id, "health check failed, pausing");
                counters.health_failures.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(HEALTH_FAILURE_BACKOFF).await;
                continue;
            }
        }

        let result = verifier.verify(&job.email).await;

        counters.processed.fetch_add(1, Ordering::Relaxed);
        if result.status == Status::Error {
            counters.errors.fetch_add(1, Ordering::Relaxed);
        }

        let published = result.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = results.send(published) => {
                if sent.is_err() {
                    break;
                }
            }
        }

        if let Some(hook) = &on_result {
            hook(&result);
        }

        local_processed += 1;
        rate_limit_delay(config.delay, config.jitter).await;
    }
}

async fn recv_job(jobs: &Arc<Mutex<mpsc::Receiver<Job>>>) -> Option<Job> {
    jobs.lock().await.recv().await
}

async fn health_check(verifier: &Verifier, address: &str) -> bool {
    info!(address, "running health check");
    let result = verifier.verify(address).await;
    if result.status == Status::Valid {
        debug!("health check passed");
        true
    } else {
        error!(address, status = %result.status, "health check failed");
        false
    }
}

/// Sleeps for the configured delay plus uniform jitter in `[0, jitter)`.
/// A zero delay disables rate limiting entirely.
async fn rate_limit_delay(delay: Duration, jitter: Duration) {
    if delay.is_zero() {
        return;
    }

    let mut total = delay;
    if !jitter.is_zero() {
        let extra = rand::thread_rng().gen_range(0..jitter.as_millis().max(1) as u64);
        total += Duration::from_millis(extra);
    }

    tokio::time::sleep(total).await;
}
