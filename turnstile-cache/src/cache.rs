//! Single-slot cache with serialized access and two refresh policies.

use crate::error::CacheError;
use crate::mode::CacheMode;
use crate::stats::{RefreshStats, RefreshStatsSnapshot};
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use turnstile_cell::{ExclusiveCell, LaneOp};

/// Zero-argument refresh function producing the cached value.
type RefreshFn<T, E> = dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync;

/// Slot contents plus the staleness epoch, owned by the inner cell's lane.
struct CacheState<T> {
    /// Starts empty, populated by the first successful refresh, never
    /// emptied again.
    slot: Option<T>,

    /// Start instant of the last successful refresh. Meaningless while the
    /// slot is empty; only advanced on success, so a failed attempt never
    /// delays the retry.
    last_refresh: Instant,
}

// ============================================================================
// USE-OR-REFRESH LANE OPERATION
// ============================================================================

/// The cache's single lane operation: decide staleness, refresh while
/// holding the lane if due, then apply the caller's closure to the stored
/// value. Because the whole sequence runs as one lane turn, callers that
/// arrive during a refresh queue behind it and observe the freshly stored
/// value instead of refreshing again.
struct UseOrRefresh<T, E, F> {
    refresh: Arc<RefreshFn<T, E>>,
    stats: Arc<RefreshStats>,
    mode: CacheMode,
    op: F,
}

impl<T, E, F, Fut, R> LaneOp<CacheState<T>> for UseOrRefresh<T, E, F>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce(&mut T) -> Fut + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    type Output = Result<R, CacheError<E>>;

    fn run<'a>(self, state: &'a mut CacheState<T>) -> BoxFuture<'a, Self::Output> {
        let UseOrRefresh {
            refresh,
            stats,
            mode,
            op,
        } = self;
        async move {
            let due = match mode {
                // Freshness is solely the timer's responsibility.
                CacheMode::Periodic(_) => false,
                CacheMode::NeedBased(max_age) => state.last_refresh.elapsed() >= max_age,
            };
            if !due {
                if let Some(value) = state.slot.as_mut() {
                    stats.record_hit();
                    return Ok(op(value).await);
                }
            }

            stats.record_attempt();
            let started = Instant::now();
            match refresh().await {
                Ok(fresh) => {
                    stats.record_success();
                    state.last_refresh = started;
                    Ok(op(state.slot.insert(fresh)).await)
                }
                Err(error) => {
                    stats.record_failure();
                    Err(CacheError::Refresh(error))
                }
            }
        }
        .boxed()
    }
}

// ============================================================================
// PERIODIC REFRESH DRIVER
// ============================================================================

/// Background refresh driver for [`CacheMode::Periodic`]. The tick awaits
/// the refresh function outside the lane and only the store goes through it,
/// so `with_value` callers are never queued behind a slow recomputation.
/// The cache aborts this task when it is dropped.
async fn run_timer<T, E>(
    cell: ExclusiveCell<CacheState<T>>,
    refresh: Arc<RefreshFn<T, E>>,
    stats: Arc<RefreshStats>,
    period: Duration,
) where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    // First fire one full interval from now; `interval()` would fire
    // immediately.
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        stats.record_attempt();
        let started = Instant::now();
        match refresh().await {
            Ok(value) => {
                stats.record_success();
                let stored = cell.submit(move |state: &mut CacheState<T>| {
                    state.slot = Some(value);
                    state.last_refresh = started;
                });
                if stored.await.is_err() {
                    break;
                }
            }
            Err(error) => {
                // No caller is waiting on a tick; keep the previous value
                // and retry on the next one.
                stats.record_failure();
                tracing::warn!(%error, "periodic refresh failed");
            }
        }
    }
}

// ============================================================================
// REFRESHING CACHE
// ============================================================================

/// Single-slot cache around an expensive-to-compute value.
///
/// The slot lives inside one [`ExclusiveCell`], so user operations and
/// background refreshes are serialized through the same lane and at most one
/// refresh computation is in flight at a time, no matter how many callers
/// request access concurrently.
///
/// ```
/// use std::time::Duration;
/// use turnstile_cache::{CacheMode, RefreshingCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// # async fn fetch_price() -> u64 { 42 }
/// let cache = RefreshingCache::new(CacheMode::NeedBased(Duration::from_secs(60)), || async {
///     Ok::<_, std::convert::Infallible>(fetch_price().await)
/// });
/// let price = cache.with_value(|price| *price).await.unwrap();
/// assert_eq!(price, 42);
/// # }
/// ```
pub struct RefreshingCache<T, E> {
    cell: ExclusiveCell<CacheState<T>>,
    refresh: Arc<RefreshFn<T, E>>,
    mode: CacheMode,
    stats: Arc<RefreshStats>,
    timer: Option<JoinHandle<()>>,
}

impl<T, E> RefreshingCache<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Create a cache around `refresh_fn`.
    ///
    /// In [`CacheMode::Periodic`] a background timer task is also spawned:
    /// first fire one interval from now, then every interval. Tick failures
    /// are logged and swallowed; the slot keeps its previous value and the
    /// next tick retries.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new<F, Fut>(mode: CacheMode, refresh_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let refresh: Arc<RefreshFn<T, E>> = Arc::new(move || refresh_fn().boxed());
        let stats = Arc::new(RefreshStats::default());
        let cell = ExclusiveCell::new(CacheState {
            slot: None,
            last_refresh: Instant::now(),
        });

        let timer = match mode {
            CacheMode::Periodic(interval) => Some(tokio::spawn(run_timer(
                cell.clone(),
                Arc::clone(&refresh),
                Arc::clone(&stats),
                interval,
            ))),
            CacheMode::NeedBased(_) => None,
        };

        Self {
            cell,
            refresh,
            mode,
            stats,
            timer,
        }
    }

    /// Run `op` against the cached value, refreshing first when the policy
    /// requires it.
    ///
    /// - [`CacheMode::Periodic`]: a populated slot is used as-is; freshness
    ///   is the timer's job alone.
    /// - [`CacheMode::NeedBased`]: the slot is used as-is while younger than
    ///   `max_age`, refreshed first otherwise.
    /// - An empty slot always refreshes first.
    ///
    /// The whole sequence runs as one turn on the cache's lane: callers that
    /// arrive while a refresh is in flight queue behind it and observe the
    /// same freshly refreshed value rather than triggering their own.
    pub fn with_value<F, R>(&self, op: F) -> impl Future<Output = Result<R, CacheError<E>>>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.with_value_async(move |value| future::ready(op(value)))
    }

    /// Flat-map variant of [`with_value`](Self::with_value): the closure's
    /// returned future is awaited while the cache's lane is held.
    pub fn with_value_async<F, Fut, R>(
        &self,
        op: F,
    ) -> impl Future<Output = Result<R, CacheError<E>>>
    where
        F: FnOnce(&mut T) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let submitted = self.cell.submit_op(UseOrRefresh {
            refresh: Arc::clone(&self.refresh),
            stats: Arc::clone(&self.stats),
            mode: self.mode,
            op,
        });
        async move { submitted.await? }
    }

    /// The refresh policy this cache was built with.
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Counters tracking refresh activity so far.
    pub fn stats(&self) -> RefreshStatsSnapshot {
        self.stats.snapshot()
    }
}

impl<T, E> Drop for RefreshingCache<T, E> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
