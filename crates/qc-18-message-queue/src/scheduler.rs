//! # Tick Scheduler
//!
//! A single tokio runtime with a small fixed worker pool drives the periodic
//! tick of every active message queue in the process. Connections register a
//! tick callback on activation and cancel it on close; no connection gets a
//! thread of its own.

use std::future::Future;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

use crate::config::{MessageQueueConfig, DEFAULT_SCHEDULER_WORKERS, DEFAULT_TICK_INTERVAL_MS};
use crate::error::{MessageQueueError, Result};

static SHARED: OnceLock<Arc<TickScheduler>> = OnceLock::new();

/// Shared pool running periodic per-connection ticks.
pub struct TickScheduler {
    /// Present when this scheduler built its own runtime.
    runtime: Option<Runtime>,
    handle: Handle,
    period: Duration,
}

impl TickScheduler {
    /// Builds a dedicated runtime with `workers` threads named `msg-queue-N`.
    pub fn new(workers: usize, period: Duration) -> Result<Self> {
        let counter = Arc::new(AtomicUsize::new(0));
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name_fn(move || {
                format!("msg-queue-{}", counter.fetch_add(1, Ordering::Relaxed))
            })
            .enable_time()
            .build()
            .map_err(|e| MessageQueueError::Scheduler(e.to_string()))?;

        debug!(workers, period_ms = period.as_millis() as u64, "[qc-18] Tick scheduler started");

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            period,
        })
    }

    /// Scheduler sized from `config`.
    pub fn from_config(config: &MessageQueueConfig) -> Result<Self> {
        Self::new(config.scheduler_workers, config.tick_interval())
    }

    /// Runs ticks on an existing runtime instead of building one.
    pub fn with_handle(handle: Handle, period: Duration) -> Self {
        Self {
            runtime: None,
            handle,
            period,
        }
    }

    /// The process-wide scheduler, built with default sizing on first use.
    ///
    /// Call [`TickScheduler::init_shared`] first to size it from a config.
    pub fn shared() -> Result<Arc<Self>> {
        if let Some(scheduler) = SHARED.get() {
            return Ok(Arc::clone(scheduler));
        }
        Self::install_shared(|| {
            Self::new(
                DEFAULT_SCHEDULER_WORKERS,
                Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            )
        })
    }

    /// Builds the process-wide scheduler from `tick_interval_ms` and
    /// `scheduler_workers`.
    ///
    /// Only the first initialisation takes effect; later calls, and calls
    /// after [`TickScheduler::shared`] has built the default, return the
    /// existing scheduler and log the ignored sizing.
    pub fn init_shared(config: &MessageQueueConfig) -> Result<Arc<Self>> {
        if let Some(scheduler) = SHARED.get() {
            if scheduler.period != config.tick_interval() {
                warn!(
                    period_ms = scheduler.period.as_millis() as u64,
                    requested_ms = config.tick_interval_ms,
                    "[qc-18] Shared scheduler already running, config ignored"
                );
            }
            return Ok(Arc::clone(scheduler));
        }
        Self::install_shared(|| Self::from_config(config))
    }

    fn install_shared(build: impl FnOnce() -> Result<Self>) -> Result<Arc<Self>> {
        let scheduler = Arc::new(build()?);
        // A concurrent caller may have won the race; its scheduler is kept.
        Ok(Arc::clone(SHARED.get_or_init(|| scheduler)))
    }

    /// Interval between two ticks of one registration.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runtime the ticks and background tasks are spawned on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Registers `tick` to run every period until cancelled or until it
    /// returns `ControlFlow::Break`.
    ///
    /// A panicking tick is logged and the schedule keeps running. The first
    /// tick fires one period after registration.
    pub fn schedule<F>(&self, tick: F) -> TickRegistration
    where
        F: Fn() -> ControlFlow<()> + Send + 'static,
    {
        let period = self.period;
        let task = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                match panic::catch_unwind(AssertUnwindSafe(&tick)) {
                    Ok(ControlFlow::Continue(())) => {}
                    Ok(ControlFlow::Break(())) => break,
                    Err(payload) => {
                        error!(panic = panic_message(&*payload), "[qc-18] Tick panicked");
                    }
                }
            }
        });
        TickRegistration { task }
    }

    /// Runs a one-off future on the scheduler's runtime.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("owns_runtime", &self.runtime.is_some())
            .field("period", &self.period)
            .finish()
    }
}

/// A recurring tick. Dropping or cancelling it stops future ticks; a tick
/// already running is allowed to finish.
#[derive(Debug)]
pub struct TickRegistration {
    task: JoinHandle<()>,
}

impl TickRegistration {
    /// Stops the schedule. Dropping the registration does the same.
    pub fn cancel(self) {
        // Drop aborts.
    }

    /// Whether the tick task has ended, by cancellation or `Break`.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TickRegistration {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_ticks_every_period() {
        let scheduler = TickScheduler::with_handle(Handle::current(), Duration::from_millis(1));
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);

        let registration = scheduler.schedule(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 9, "expected ~10 ticks, got {ticks}");

        registration.cancel();
        tokio::task::yield_now().await;
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_keeps_schedule() {
        let scheduler = TickScheduler::with_handle(Handle::current(), Duration::from_millis(1));
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);

        let _registration = scheduler.schedule(move || {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first tick fails");
            }
            ControlFlow::Continue(())
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(count.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_schedule() {
        let scheduler = TickScheduler::with_handle(Handle::current(), Duration::from_millis(1));
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);

        let registration = scheduler.schedule(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Break(())
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registration.is_finished());
    }

    #[test]
    fn test_owned_runtime_names_workers() {
        let scheduler = TickScheduler::new(2, Duration::from_millis(1)).unwrap();
        let name = scheduler
            .handle()
            .block_on(async {
                tokio::spawn(async { std::thread::current().name().map(str::to_owned) })
                    .await
                    .unwrap()
            })
            .unwrap();
        assert!(name.starts_with("msg-queue-"), "{name}");
    }

    #[test]
    fn test_shared_is_a_singleton() {
        let first = TickScheduler::shared().unwrap();
        let second = TickScheduler::shared().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.period(), Duration::from_millis(1));

        // Sizing arrives too late once the default is running.
        let late = TickScheduler::init_shared(&MessageQueueConfig {
            tick_interval_ms: 250,
            ..MessageQueueConfig::default()
        })
        .unwrap();
        assert!(Arc::ptr_eq(&first, &late));
        assert_eq!(late.period(), Duration::from_millis(1));
    }

    #[test]
    fn test_from_config_uses_tick_interval() {
        let config = MessageQueueConfig {
            tick_interval_ms: 40,
            scheduler_workers: 1,
            ..MessageQueueConfig::default()
        };
        let scheduler = TickScheduler::from_config(&config).unwrap();
        assert_eq!(scheduler.period(), Duration::from_millis(40));
    }
}
