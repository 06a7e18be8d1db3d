//! A single load test run, from health check to verdict.
use crate::error::{SetupError, TargetError};
use crate::evaluator::evaluate;
use crate::recorder::Recorder;
use crate::scheduler::Schedule;
use crate::target::{HttpTarget, Target};
use crate::timer::ProgressTimer;
use crate::worker::{WorkerContext, WorkerPool};
use governor::{Quota, RateLimiter};
use stampede_core::{
    Check, RunConfig, RunReport, Stage, Threshold, Verdict, STATUS_HEALTHY,
};
use std::future::{Future, IntoFuture};
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Lifecycle of a run. `Completed` and `SetupFailed` are terminal.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RunState {
    #[default]
    Pending,
    Ramping {
        stage: usize,
    },
    Draining,
    Completed(Verdict),
    SetupFailed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed(_) | RunState::SetupFailed)
    }
}

/// Snapshot published on every change, see [`LoadTest::subscribe`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunStatus {
    pub state: RunState,
    pub active_vus: u32,
    pub started_vus: u64,
    pub completed_vus: u64,
}

/// A configured run against a [`Target`].
///
/// Awaiting a `LoadTest` runs it to completion:
///
/// ```no_run
/// use stampede::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), SetupError> {
///     let config = Profile::Smoke.config(Url::parse("http://localhost:3000").unwrap());
///     let report = LoadTest::http(config)?
///         .stage(Stage::new(Duration::from_secs(10), 0))
///         .await?;
///     println!("{report}");
///     Ok(())
/// }
/// ```
pub struct LoadTest<T> {
    config: RunConfig,
    target: Arc<T>,
    abort: CancellationToken,
    status: watch::Sender<RunStatus>,
}

impl LoadTest<HttpTarget> {
    /// Run against the HTTP service at the configured base URL.
    pub fn http(config: RunConfig) -> Result<Self, SetupError> {
        let target = HttpTarget::new(&config)?;
        Ok(Self::new(config, target))
    }
}

impl<T> LoadTest<T> {
    pub fn new(config: RunConfig, target: T) -> Self {
        let (status, _) = watch::channel(RunStatus::default());
        Self {
            config,
            target: Arc::new(target),
            abort: CancellationToken::new(),
            status,
        }
    }

    /// Append a stage to the ramp profile.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.config.stages.push(stage);
        self
    }

    pub fn threshold(mut self, threshold: Threshold) -> Self {
        self.config.thresholds.push(threshold);
        self
    }

    pub fn think_time(mut self, think_time: Duration) -> Self {
        self.config.think_time = think_time;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Cap the request rate across all virtual users.
    pub fn max_rps(mut self, max_rps: NonZeroU32) -> Self {
        self.config.max_rps = Some(max_rps);
        self
    }

    pub fn checks(mut self, checks: Vec<Check>) -> Self {
        self.config.checks = checks;
        self
    }

    /// Use an externally owned token to abort the run, e.g. on ctrl-c.
    pub fn abort_token(mut self, token: CancellationToken) -> Self {
        self.abort = token;
        self
    }

    pub fn abort_handle(&self) -> CancellationToken {
        self.abort.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

impl<T: Target + Sync + 'static> LoadTest<T> {
    #[instrument(name = "run", skip_all, fields(name = %self.config.name))]
    pub async fn run(self) -> Result<RunReport, SetupError> {
        let schedule = match self.setup().await {
            Ok(schedule) => schedule,
            Err(err) => {
                error!("Run did not start: {err}");
                self.status
                    .send_modify(|status| status.state = RunState::SetupFailed);
                return Err(err);
            }
        };

        info!(
            "Starting run: {} stages over {}",
            schedule.stages().len(),
            humantime::format_duration(schedule.total_duration())
        );
        Ok(self.drive(schedule).await)
    }

    async fn setup(&self) -> Result<Schedule, SetupError> {
        self.config.validate()?;
        let schedule = Schedule::from_config(&self.config)?;

        let url = self.config.health_url().to_string();
        let health = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return Err(SetupError::Aborted),
            res = tokio::time::timeout(self.config.request_timeout, self.target.health()) => {
                res.unwrap_or_else(|_| Err(TargetError::Timeout))
            }
        };

        match health {
            Ok(STATUS_HEALTHY) => {
                debug!("Health check against {url} passed");
                Ok(schedule)
            }
            Ok(status) => Err(SetupError::Unhealthy { url, status }),
            Err(source) => Err(SetupError::Unreachable { url, source }),
        }
    }

    async fn drive(&self, schedule: Schedule) -> RunReport {
        let recorder = Recorder::new(&self.config.name);
        let limiter = self
            .config
            .max_rps
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        let mut pool = WorkerPool::new(WorkerContext {
            target: self.target.clone(),
            recorder: recorder.clone(),
            payload: Arc::new(self.config.payload.clone()),
            checks: Arc::from(self.config.checks.clone()),
            think_time: self.config.think_time,
            request_timeout: self.config.request_timeout,
            limiter,
            abort: self.abort.clone(),
        });

        let start = Instant::now();
        let end = start + schedule.total_duration();
        let mut timer = ProgressTimer::new(TICK_INTERVAL, PROGRESS_INTERVAL);

        loop {
            let elapsed = start.elapsed();
            let Some(stage) = schedule.stage_at(elapsed) else {
                break;
            };

            pool.set_concurrency(schedule.target_at(elapsed));
            pool.reap().await;
            self.publish(RunState::Ramping { stage }, &pool);

            tokio::select! {
                biased;
                _ = self.abort.cancelled() => {
                    warn!("Run aborted after {}", humantime::format_duration(round(elapsed)));
                    break;
                }
                _ = tokio::time::sleep_until(end) => {}
                report = timer.tick() => {
                    if let Some(window) = report {
                        let measurement = recorder.collect_interval(window);
                        info!("{measurement}, VUs={}", pool.active());
                    }
                }
            }
        }

        self.publish(RunState::Draining, &pool);
        debug!("Draining {} VUs after {timer}", pool.active());
        let iterations = pool.shutdown().await;
        let elapsed = start.elapsed();

        let metrics = recorder.aggregate(elapsed, pool.peak());
        let verdict = evaluate(&metrics, &self.config.thresholds);
        self.publish(RunState::Completed(verdict.clone()), &pool);

        for failure in verdict.failures() {
            warn!(
                "Threshold {} failed (observed {:?})",
                failure.threshold, failure.observed
            );
        }
        info!(
            "Run finished after {}: {} requests over {iterations} iterations, {}",
            humantime::format_duration(round(elapsed)),
            metrics.requests,
            if verdict.passed { "passed" } else { "failed" }
        );

        RunReport {
            name: self.config.name.clone(),
            started_vus: pool.started(),
            completed_vus: pool.completed(),
            aborted: self.abort.is_cancelled(),
            metrics,
            verdict,
        }
    }

    fn publish(&self, state: RunState, pool: &WorkerPool<T>) {
        let next = RunStatus {
            state,
            active_vus: pool.active(),
            started_vus: pool.started(),
            completed_vus: pool.completed(),
        };

        #[cfg(feature = "metrics")]
        metrics::gauge!("stampede_vus", "run" => self.config.name.clone())
            .set(next.active_vus as f64);

        self.status.send_if_modified(|status| {
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        });
    }
}

impl<T: Target + Sync + 'static> IntoFuture for LoadTest<T> {
    type Output = Result<RunReport, SetupError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

fn round(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
