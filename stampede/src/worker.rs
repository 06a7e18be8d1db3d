use crate::check::{classify, Classification};
use crate::error::TargetError;
use crate::payload::PayloadGenerator;
use crate::recorder::Recorder;
use crate::target::Target;
use governor::DefaultDirectRateLimiter;
use stampede_core::{Check, PayloadConfig, RequestOutcome};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// One virtual user: payload, request, classify, record, think, repeat.
pub(crate) struct VirtualUser<T> {
    pub id: u32,
    pub target: Arc<T>,
    pub recorder: Recorder,
    pub payloads: PayloadGenerator,
    pub checks: Arc<[Check]>,
    pub think_time: Duration,
    pub request_timeout: Duration,
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    /// Graceful stop, honored between requests. Cancelled along with `abort`.
    pub stop: CancellationToken,
    /// Run-level abort, which also interrupts an in-flight request.
    pub abort: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerExit {
    pub id: u32,
    pub iterations: u64,
}

impl<T: Target + Sync + 'static> VirtualUser<T> {
    #[instrument(name = "vu", skip_all, fields(id = self.id))]
    pub async fn run(mut self) -> WorkerExit {
        let mut iterations = 0;

        loop {
            if self.stop.is_cancelled() {
                break;
            }

            if let Some(limiter) = &self.limiter {
                tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => break,
                    _ = limiter.until_ready() => {}
                }
            }

            let outcome = self.iterate(iterations).await;
            iterations += 1;
            self.recorder.record(outcome);

            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.think_time) => {}
            }
        }

        trace!("Stopping after {iterations} iterations.");
        WorkerExit {
            id: self.id,
            iterations,
        }
    }

    async fn iterate(&mut self, iteration: u64) -> RequestOutcome {
        let payload = self.payloads.generate(iteration);
        let timestamp = SystemTime::now();
        let start = Instant::now();

        let response = tokio::select! {
            biased;
            _ = self.abort.cancelled() => Err(TargetError::Cancelled),
            res = tokio::time::timeout(self.request_timeout, self.target.signup(&payload)) => {
                res.unwrap_or_else(|_| Err(TargetError::Timeout))
            }
        };
        let latency = start.elapsed();

        let Classification {
            passed,
            error,
            checks,
        } = classify(&response, latency, &payload.email, &self.checks);

        match (&response, error) {
            (Err(err), _) => debug!("Request {iteration} failed: {err}"),
            (Ok(snapshot), Some(tag)) => {
                debug!("Request {iteration} did not pass ({tag}), status {}", snapshot.status)
            }
            (Ok(_), None) => {}
        }

        RequestOutcome {
            timestamp,
            vu: self.id,
            iteration,
            email: payload.email,
            latency,
            status: response.as_ref().ok().map(|r| r.status),
            passed,
            error,
            checks,
        }
    }
}

/// Everything a new virtual user is built from.
pub(crate) struct WorkerContext<T> {
    pub target: Arc<T>,
    pub recorder: Recorder,
    pub payload: Arc<PayloadConfig>,
    pub checks: Arc<[Check]>,
    pub think_time: Duration,
    pub request_timeout: Duration,
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub abort: CancellationToken,
}

/// The live population of virtual users.
///
/// Shrinking signals the newest workers to stop; they finish their in-flight request and are
/// then reaped. Every spawned worker is eventually counted as completed by [`Self::shutdown`].
pub(crate) struct WorkerPool<T> {
    ctx: WorkerContext<T>,
    active: Vec<(CancellationToken, JoinHandle<WorkerExit>)>,
    retiring: Vec<JoinHandle<WorkerExit>>,
    next_id: u32,
    started: u64,
    completed: u64,
    iterations: u64,
    peak: u32,
}

impl<T: Target + Sync + 'static> WorkerPool<T> {
    pub fn new(ctx: WorkerContext<T>) -> Self {
        Self {
            ctx,
            active: vec![],
            retiring: vec![],
            next_id: 0,
            started: 0,
            completed: 0,
            iterations: 0,
            peak: 0,
        }
    }

    pub fn set_concurrency(&mut self, concurrency: u32) {
        let concurrency = concurrency as usize;
        if self.active.len() == concurrency {
            return;
        } else if self.active.len() > concurrency {
            debug!("Scaling down from {} to {concurrency} VUs", self.active.len());
            for (stop, handle) in self.active.drain(concurrency..) {
                stop.cancel();
                self.retiring.push(handle);
            }
        } else {
            debug!("Scaling up from {} to {concurrency} VUs", self.active.len());
            while self.active.len() < concurrency {
                let id = self.next_id;
                self.next_id += 1;

                let stop = self.ctx.abort.child_token();
                let vu = VirtualUser {
                    id,
                    target: self.ctx.target.clone(),
                    recorder: self.ctx.recorder.clone(),
                    payloads: PayloadGenerator::new(self.ctx.payload.clone(), id),
                    checks: self.ctx.checks.clone(),
                    think_time: self.ctx.think_time,
                    request_timeout: self.ctx.request_timeout,
                    limiter: self.ctx.limiter.clone(),
                    stop: stop.clone(),
                    abort: self.ctx.abort.clone(),
                };
                self.active.push((stop, tokio::spawn(vu.run())));
                self.started += 1;
            }
            self.peak = self.peak.max(self.active.len() as u32);
        }
    }

    /// Collect workers which have stopped since the last call.
    pub async fn reap(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retiring)
            .into_iter()
            .partition(|handle| handle.is_finished());
        self.retiring = running;

        for handle in finished {
            self.join(handle).await;
        }
    }

    /// Workers currently receiving new iterations. Retiring workers are not included.
    pub fn active(&self) -> u32 {
        self.active.len() as u32
    }

    pub fn started(&self) -> u64 {
        self.started
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn peak(&self) -> u32 {
        self.peak
    }

    /// Iterations completed by every worker collected so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Stop every worker and wait for all of them to exit. Returns the iterations of every
    /// worker the pool ever started.
    pub async fn shutdown(&mut self) -> u64 {
        self.set_concurrency(0);

        for handle in std::mem::take(&mut self.retiring) {
            self.join(handle).await;
        }
        self.iterations
    }

    async fn join(&mut self, handle: JoinHandle<WorkerExit>) {
        match handle.await {
            Ok(exit) => {
                trace!("VU {} exited after {} iterations", exit.id, exit.iterations);
                self.iterations += exit.iterations;
            }
            Err(err) => error!("Virtual user exited abnormally: {err}"),
        }
        self.completed += 1;
    }
}
