//! The reaper: a timer-driven scheduler that periodically retires expired
//! leases across its registered workspaces.

use std::sync::Arc;
use std::time::Duration;

use lease_storage::RedisBackend;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::contract::LeaseExpiryContract;
use crate::error::{ProviderError, ReaperError};
use crate::executor::ExpireExecutor;
use crate::provider::LeaseProvider;
use crate::retry::{retry_backoff, RetryPolicy};
use crate::timestamp::Timestamp;

/// Context passed to [`ReaperHook`] callbacks.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub workspace: String,
    pub event_sink: String,
    pub tick_time: Timestamp,
}

/// Lifecycle hooks fired synchronously from the scheduler task.
///
/// Implementations must not block — the scheduler does not run concurrently
/// with hook invocation, so a slow hook delays every tick.
pub trait ReaperHook: Send + Sync {
    fn on_start(&self) {}
    fn on_stop(&self) {}
    fn on_process(&self, _ctx: &HookContext) {}
    fn on_retry(&self, _ctx: &HookContext, _attempt: u32) {}
    fn on_recover(&self, _ctx: &HookContext) {}
}

/// An `ErrorHandler(err) -> bool` — returning `true` suppresses a fatal
/// error and lets the scheduler keep ticking.
pub type ErrorHandler = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Initialized,
    Running,
    Stopped,
}

enum Control {
    Pause,
    Resume,
}

struct Inner {
    phase: Phase,
    hooks: Vec<Arc<dyn ReaperHook>>,
    contracts: Vec<LeaseExpiryContract>,
    workspaces: Vec<String>,
    control_tx: Option<mpsc::Sender<Control>>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Timer-driven scheduler. `Init()` must precede all other calls;
/// `AddExpiryContracts`/`AddHook` require `Initialized`; `Start` launches a
/// single background task that owns its own Redis connection.
pub struct LeaseReaper {
    redis_url: String,
    polling_timeout: Duration,
    idling_timeout: Duration,
    retry_policy: RetryPolicy,
    error_handler: Option<ErrorHandler>,
    inner: AsyncMutex<Inner>,
}

impl LeaseReaper {
    /// Build a fresh (uninitialized) reaper.
    #[must_use]
    pub fn new(redis_url: impl Into<String>, polling_timeout: Duration, idling_timeout: Duration) -> Self {
        Self {
            redis_url: redis_url.into(),
            polling_timeout,
            idling_timeout,
            retry_policy: RetryPolicy::default(),
            error_handler: None,
            inner: AsyncMutex::new(Inner {
                phase: Phase::Fresh,
                hooks: Vec::new(),
                contracts: Vec::new(),
                workspaces: Vec::new(),
                control_tx: None,
                cancel: None,
                task: None,
            }),
        }
    }

    /// Override the default retry policy (8ms/512ms, 0 retries).
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Install an error handler consulted when an executor's error is
    /// non-retriable or retries are exhausted.
    #[must_use]
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Idempotently initialize the reaper. Must precede every other call.
    pub async fn init(&self) {
        let mut inner = self.inner.lock().await;
        if inner.phase == Phase::Fresh {
            inner.phase = Phase::Initialized;
            info!("reaper initialized");
        }
    }

    /// Register expiry contracts. Each contract's workspace must be unique
    /// across the reaper's lifetime.
    ///
    /// # Panics
    ///
    /// Panics if the reaper has not been [`init`](Self::init)ialized yet —
    /// this is a programming error, not a recoverable condition.
    ///
    /// # Errors
    ///
    /// Returns [`ReaperError::DuplicateWorkspace`] if a contract's workspace
    /// was already registered.
    pub async fn add_expiry_contracts(&self, contracts: impl IntoIterator<Item = LeaseExpiryContract>) -> Result<(), ReaperError> {
        let mut inner = self.inner.lock().await;
        assert!(inner.phase != Phase::Fresh, "the LeaseReaper haven't be initialized yet");

        for contract in contracts {
            let workspace = contract.workspace.clone();
            match inner.workspaces.binary_search(&workspace) {
                Ok(_) => return Err(ReaperError::DuplicateWorkspace { workspace }),
                Err(pos) => inner.workspaces.insert(pos, workspace),
            }
            inner.contracts.push(contract);
        }

        Ok(())
    }

    /// Register a lifecycle hook.
    ///
    /// # Panics
    ///
    /// Panics if the reaper has not been [`init`](Self::init)ialized yet.
    pub async fn add_hook(&self, hook: Arc<dyn ReaperHook>) {
        let mut inner = self.inner.lock().await;
        assert!(inner.phase != Phase::Fresh, "the LeaseReaper haven't be initialized yet");
        inner.hooks.push(hook);
    }

    /// Connect to Redis and launch the scheduler task.
    ///
    /// # Panics
    ///
    /// Panics if the reaper is `disposed` (stopped) or already `running` —
    /// both are programming errors.
    ///
    /// # Errors
    ///
    /// Returns [`ReaperError::Connect`] if the Redis connection cannot be
    /// established.
    pub async fn start(&self) -> Result<(), ReaperError> {
        let mut inner = self.inner.lock().await;
        assert!(inner.phase != Phase::Stopped, "the LeaseReaper has been disposed");
        assert!(inner.phase != Phase::Running, "the LeaseReaper is running");
        assert!(inner.phase != Phase::Fresh, "the LeaseReaper haven't be initialized yet");

        let backend = match RedisBackend::connect(&self.redis_url).await {
            Ok(b) => b,
            Err(e) => {
                inner.phase = Phase::Stopped;
                return Err(ReaperError::Connect(e));
            }
        };
        let provider = Arc::new(LeaseProvider::new(Arc::new(backend)));

        let executors: Vec<ExpireExecutor> = inner
            .contracts
            .iter()
            .map(|c| c.create_expire_executor(Arc::clone(&provider)))
            .collect();

        let (control_tx, control_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Self::run_scheduler(
            executors,
            self.polling_timeout,
            self.idling_timeout,
            self.retry_policy,
            self.error_handler.clone(),
            inner.hooks.clone(),
            control_rx,
            cancel.clone(),
        ));

        inner.control_tx = Some(control_tx);
        inner.cancel = Some(cancel);
        inner.task = Some(task);
        inner.phase = Phase::Running;

        info!(redis_url = %self.redis_url, "reaper started");
        Ok(())
    }

    /// Pause ticking. A no-op unless currently running.
    pub async fn pause(&self) {
        let inner = self.inner.lock().await;
        if inner.phase == Phase::Running {
            if let Some(tx) = &inner.control_tx {
                let _ = tx.send(Control::Pause).await;
                info!("reaper paused");
            }
        }
    }

    /// Resume ticking. A no-op unless currently running.
    pub async fn resume(&self) {
        let inner = self.inner.lock().await;
        if inner.phase == Phase::Running {
            if let Some(tx) = &inner.control_tx {
                let _ = tx.send(Control::Resume).await;
                info!("reaper resumed");
            }
        }
    }

    /// Signal shutdown and wait for the scheduler task to drain.
    pub async fn stop(&self) {
        let (cancel, task) = {
            let mut inner = self.inner.lock().await;
            if inner.phase == Phase::Stopped {
                return;
            }
            inner.phase = Phase::Stopped;
            (inner.cancel.take(), inner.task.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("reaper stopped");
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_scheduler(
        executors: Vec<ExpireExecutor>,
        polling_timeout: Duration,
        idling_timeout: Duration,
        retry_policy: RetryPolicy,
        error_handler: Option<ErrorHandler>,
        hooks: Vec<Arc<dyn ReaperHook>>,
        mut control_rx: mpsc::Receiver<Control>,
        cancel: CancellationToken,
    ) {
        for hook in &hooks {
            hook.on_start();
        }

        let mut paused = false;
        let mut next_tick = Instant::now() + polling_timeout;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(control) = control_rx.recv() => {
                    match control {
                        Control::Pause => paused = true,
                        Control::Resume => {
                            paused = false;
                            next_tick = Instant::now() + polling_timeout;
                        }
                    }
                }
                () = sleep_until(next_tick) => {
                    if paused {
                        next_tick = Instant::now() + polling_timeout;
                        continue;
                    }

                    let tick_time = Timestamp::now();
                    let count = Self::remove_expired_leases(&executors, tick_time, retry_policy, error_handler.as_ref(), &hooks, &cancel).await;

                    match count {
                        Some(count) => {
                            debug!(count, "reaper tick complete");
                            next_tick = Instant::now() + if count > 0 { polling_timeout } else { idling_timeout };
                        }
                        None => {
                            error!("reaper scheduler exiting after unrecoverable error");
                            break;
                        }
                    }
                }
            }
        }

        for hook in &hooks {
            hook.on_stop();
        }
    }

    /// Returns `None` if an unrecoverable error occurred and the scheduler
    /// must exit; otherwise the total count of leases retired this tick.
    async fn remove_expired_leases(
        executors: &[ExpireExecutor],
        tick_time: Timestamp,
        retry_policy: RetryPolicy,
        error_handler: Option<&ErrorHandler>,
        hooks: &[Arc<dyn ReaperHook>],
        cancel: &CancellationToken,
    ) -> Option<u64> {
        let mut total = 0u64;
        let mut last_err: Option<ProviderError> = None;

        for executor in executors {
            let ctx = HookContext {
                workspace: executor.workspace().to_owned(),
                event_sink: executor.event_sink().to_owned(),
                tick_time,
            };
            for hook in hooks {
                hook.on_process(&ctx);
            }

            let max_retries = retry_policy.max_retries.max(0) as u32;
            let mut retrying = false;
            for attempt in 0..=max_retries {
                match executor.execute(tick_time).await {
                    Ok(count) => {
                        total += count;
                        if retrying {
                            for hook in hooks {
                                hook.on_recover(&ctx);
                            }
                        }
                        break;
                    }
                    Err(e) if e.is_retriable() && attempt < max_retries => {
                        if !retrying {
                            retrying = true;
                            for hook in hooks {
                                hook.on_retry(&ctx, attempt);
                            }
                        }
                        let backoff = retry_backoff(&retry_policy, attempt);
                        tokio::select! {
                            () = cancel.cancelled() => return None,
                            () = tokio::time::sleep(backoff) => {}
                        }
                    }
                    Err(e) => {
                        warn!(workspace = %ctx.workspace, error = %e, "expiry executor failed");
                        last_err = Some(e);
                        break;
                    }
                }
            }
        }

        if let Some(err) = last_err {
            let suppressed = error_handler.is_some_and(|h| h(&err));
            if !suppressed {
                return None;
            }
        }

        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[should_panic(expected = "haven't be initialized yet")]
    async fn add_contracts_before_init_panics() {
        let reaper = LeaseReaper::new("redis://127.0.0.1:0", Duration::from_millis(10), Duration::from_millis(10));
        reaper
            .add_expiry_contracts([LeaseExpiryContract::new("ws", "sink", 0)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_workspace_is_rejected() {
        let reaper = LeaseReaper::new("redis://127.0.0.1:0", Duration::from_millis(10), Duration::from_millis(10));
        reaper.init().await;

        reaper
            .add_expiry_contracts([LeaseExpiryContract::new("ws", "sink", 0)])
            .await
            .unwrap();

        let err = reaper
            .add_expiry_contracts([LeaseExpiryContract::new("ws", "sink2", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, ReaperError::DuplicateWorkspace { .. }));
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let reaper = LeaseReaper::new("redis://127.0.0.1:0", Duration::from_millis(10), Duration::from_millis(10));
        reaper.init().await;
        reaper.init().await;
        reaper
            .add_expiry_contracts([LeaseExpiryContract::new("ws", "sink", 0)])
            .await
            .unwrap();
    }
}
