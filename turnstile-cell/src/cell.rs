//! Exclusive-access cell with a single serialization lane.
//!
//! An [`ExclusiveCell`] owns one value and a lane task created at
//! construction. Every read or mutation is submitted to the lane and runs
//! there in FIFO order, so at most one operation ever touches the value at a
//! time. Different cells are fully independent.
//!
//! Handles are cheap to clone. The lane task holds only a weak back-reference
//! to the handle state: once the last handle drops, operations already queued
//! but not yet started fail with [`CellError::Deinitialized`] instead of
//! running, and the lane task exits after draining its queue.

use crate::error::CellError;
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};

// ============================================================================
// LANE OPERATIONS
// ============================================================================

/// An operation executed on a cell's lane with exclusive access to the value.
///
/// The returned future may keep borrowing the value across its internal
/// awaits; the lane holds the value untouched until it resolves. Most callers
/// use the [`ExclusiveCell::submit`] / [`ExclusiveCell::submit_async`]
/// closure conveniences instead of implementing this directly — the trait is
/// the seam for operations whose await must observe or mutate the value
/// afterwards (a use-or-refresh step, a drain, a compaction).
pub trait LaneOp<T>: Send {
    /// Result delivered through the submission future. Owned, not tied to
    /// the borrow of the value: it outlives the lane turn that produced it.
    type Output: Send + 'static;

    /// Run the operation against the exclusively borrowed value.
    fn run<'a>(self, value: &'a mut T) -> BoxFuture<'a, Self::Output>;
}

/// Adapter turning a synchronous closure into a [`LaneOp`].
struct MapOp<F>(F);

impl<T, R, F> LaneOp<T> for MapOp<F>
where
    T: Send,
    F: FnOnce(&mut T) -> R + Send,
    R: Send + 'static,
{
    type Output = R;

    fn run<'a>(self, value: &'a mut T) -> BoxFuture<'a, R> {
        future::ready((self.0)(value)).boxed()
    }
}

/// Adapter turning an asynchronous closure into a [`LaneOp`]. The closure's
/// synchronous part has exclusive access to the value; the future it returns
/// is awaited while the lane is still held.
struct FlatMapOp<F>(F);

impl<T, Fut, R, F> LaneOp<T> for FlatMapOp<F>
where
    T: Send,
    F: FnOnce(&mut T) -> Fut + Send,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    type Output = R;

    fn run<'a>(self, value: &'a mut T) -> BoxFuture<'a, R> {
        (self.0)(value).boxed()
    }
}

// ============================================================================
// QUEUED JOBS
// ============================================================================

/// Type-erased job queued on the lane, carrying its reply channel.
trait Job<T>: Send {
    /// Execute against the live value and resolve the reply.
    fn run<'a>(self: Box<Self>, value: &'a mut T) -> BoxFuture<'a, ()>;

    /// Resolve the reply with [`CellError::Deinitialized`] without running.
    fn reject(self: Box<Self>);
}

struct Envelope<T, O>
where
    O: LaneOp<T>,
{
    op: O,
    reply: oneshot::Sender<Result<O::Output, CellError>>,
}

impl<T, O> Job<T> for Envelope<T, O>
where
    T: Send,
    O: LaneOp<T>,
{
    fn run<'a>(self: Box<Self>, value: &'a mut T) -> BoxFuture<'a, ()> {
        let Envelope { op, reply } = *self;
        let work = op.run(value);
        async move {
            // A dropped receiver just means the caller stopped waiting.
            let _ = reply.send(Ok(work.await));
        }
        .boxed()
    }

    fn reject(self: Box<Self>) {
        let Envelope { reply, .. } = *self;
        let _ = reply.send(Err(CellError::Deinitialized));
    }
}

type QueuedJob<T> = Box<dyn Job<T>>;

struct Shared<T> {
    queue: mpsc::UnboundedSender<QueuedJob<T>>,
}

/// Drains the lane queue, one job at a time. A job that awaits internally
/// keeps the lane until its future resolves. Jobs found in the queue after
/// the last handle dropped are rejected, never run.
async fn run_lane<T: Send>(
    mut value: T,
    mut jobs: mpsc::UnboundedReceiver<QueuedJob<T>>,
    shared: Weak<Shared<T>>,
) {
    while let Some(job) = jobs.recv().await {
        if shared.upgrade().is_some() {
            job.run(&mut value).await;
        } else {
            tracing::debug!("rejecting operation queued on a dropped cell");
            job.reject();
        }
    }
}

// ============================================================================
// EXCLUSIVE CELL
// ============================================================================

/// Exclusive-access container serializing all reads and mutations of one
/// value through a single lane.
///
/// Operations are enqueued in arrival order and executed strictly one at a
/// time, so the closure passed to [`submit`](Self::submit) gets `&mut` access
/// without any locking visible to the caller. The value must only be touched
/// inside that closure; smuggling references out of it is a contract
/// violation the cell cannot detect.
///
/// ```
/// use turnstile_cell::ExclusiveCell;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cell = ExclusiveCell::new(Vec::new());
/// cell.submit(|seq: &mut Vec<u32>| seq.push(1)).await.unwrap();
/// assert_eq!(cell.get().await.unwrap(), vec![1]);
/// # }
/// ```
pub struct ExclusiveCell<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ExclusiveCell<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> ExclusiveCell<T> {
    /// Create a cell owning `value` and spawn its lane task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime (the lane is a spawned task).
    pub fn new(value: T) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared { queue });
        tokio::spawn(run_lane(value, jobs, Arc::downgrade(&shared)));
        Self { shared }
    }

    /// Submit `op` for exclusive access to the value.
    ///
    /// The operation is enqueued before this returns, so two `submit` calls
    /// from the same caller execute in call order even if the returned
    /// futures are awaited later or out of order.
    pub fn submit<F, R>(&self, op: F) -> impl Future<Output = Result<R, CellError>>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_op(MapOp(op))
    }

    /// Flat-map variant of [`submit`](Self::submit): the closure returns a
    /// future that is awaited while the lane is held, so no other operation
    /// touches the value until it resolves.
    pub fn submit_async<F, Fut, R>(&self, op: F) -> impl Future<Output = Result<R, CellError>>
    where
        F: FnOnce(&mut T) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.submit_op(FlatMapOp(op))
    }

    /// Submit a [`LaneOp`] directly.
    ///
    /// This is the seam for operations whose internal await needs to keep
    /// borrowing the value (the closure conveniences release the borrow
    /// before their future is awaited).
    pub fn submit_op<O>(&self, op: O) -> impl Future<Output = Result<O::Output, CellError>>
    where
        O: LaneOp<T> + 'static,
        O::Output: 'static,
    {
        let reply = self.enqueue(op);
        async move {
            match reply.await {
                Ok(result) => result,
                // Lane task gone without replying (runtime shutdown).
                Err(_) => Err(CellError::Deinitialized),
            }
        }
    }

    /// Read a clone of the value.
    pub fn get(&self) -> impl Future<Output = Result<T, CellError>>
    where
        T: Clone,
    {
        self.submit(|value| value.clone())
    }

    /// Replace the value.
    pub fn set(&self, value: T) -> impl Future<Output = Result<(), CellError>> {
        self.submit(move |slot| *slot = value)
    }

    /// Blocking read for non-async contexts.
    ///
    /// Must not be called from async code or from inside a lane operation on
    /// this cell; tokio's blocking-receive guard panics in async context
    /// rather than deadlocking.
    pub fn blocking_get(&self) -> Result<T, CellError>
    where
        T: Clone,
    {
        self.enqueue(MapOp(|value: &mut T| value.clone()))
            .blocking_recv()
            .unwrap_or(Err(CellError::Deinitialized))
    }

    /// Blocking write for non-async contexts. Same restrictions as
    /// [`blocking_get`](Self::blocking_get).
    pub fn blocking_set(&self, value: T) -> Result<(), CellError> {
        self.enqueue(MapOp(move |slot: &mut T| *slot = value))
            .blocking_recv()
            .unwrap_or(Err(CellError::Deinitialized))
    }

    fn enqueue<O>(&self, op: O) -> oneshot::Receiver<Result<O::Output, CellError>>
    where
        O: LaneOp<T> + 'static,
        O::Output: 'static,
    {
        let (reply, receiver) = oneshot::channel();
        let job: QueuedJob<T> = Box::new(Envelope { op, reply });
        if let Err(mpsc::error::SendError(job)) = self.shared.queue.send(job) {
            // Lane task already gone; fail the reply ourselves.
            job.reject();
        }
        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_returns_result() {
        let cell = ExclusiveCell::new(21u32);
        let doubled = cell
            .submit(|n| {
                *n *= 2;
                *n
            })
            .await
            .unwrap();
        assert_eq!(doubled, 42);
    }

    #[tokio::test]
    async fn test_get_set() {
        let cell = ExclusiveCell::new(String::from("a"));
        cell.set(String::from("b")).await.unwrap();
        assert_eq!(cell.get().await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_single_stream_fifo() {
        let cell = ExclusiveCell::new(Vec::new());
        let first = cell.submit(|seq: &mut Vec<u32>| seq.push(1));
        let second = cell.submit(|seq: &mut Vec<u32>| seq.push(2));
        // Awaiting out of order must not reorder execution.
        second.await.unwrap();
        first.await.unwrap();
        assert_eq!(cell.get().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_submit_async_holds_lane() {
        let cell = ExclusiveCell::new(());
        let released = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&released);
        let slow = cell.submit_async(move |_| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });
        let flag = Arc::clone(&released);
        let behind = cell.submit(move |_| flag.load(Ordering::SeqCst));

        slow.await.unwrap();
        // The queued operation only ran once the first future resolved.
        assert!(behind.await.unwrap());
    }

    #[tokio::test]
    async fn test_op_failures_leave_cell_usable() {
        let cell = ExclusiveCell::new(2u32);
        let failed = cell.submit(|_| Err::<u32, &str>("boom")).await.unwrap();
        assert_eq!(failed, Err("boom"));
        assert_eq!(cell.get().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_queued_ops_fail_after_drop() {
        let cell = ExclusiveCell::new(0u32);
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        // Holds the lane until the gate opens.
        let holding = cell.submit_async(move |_| {
            let _ = started_tx.send(());
            async move {
                let _ = gate_rx.await;
            }
        });
        started_rx.await.unwrap();

        let queued = cell.submit(|n| *n);
        drop(cell);
        let _ = gate_tx.send(());

        // The in-flight operation runs to completion; the queued one fails.
        holding.await.unwrap();
        assert_eq!(queued.await, Err(CellError::Deinitialized));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_serialize() {
        let cell = ExclusiveCell::new(Vec::new());
        let mut tasks = Vec::new();
        for i in 0..100u32 {
            let cell = cell.clone();
            tasks.push(tokio::spawn(async move {
                cell.submit(move |seq: &mut Vec<u32>| seq.push(i)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut seq = cell.get().await.unwrap();
        assert_eq!(seq.len(), 100);
        seq.sort_unstable();
        seq.dedup();
        assert_eq!(seq.len(), 100);
    }

    struct DrainSum;

    impl LaneOp<Vec<u32>> for DrainSum {
        type Output = u32;

        fn run<'a>(self, seq: &'a mut Vec<u32>) -> BoxFuture<'a, u32> {
            async move {
                tokio::task::yield_now().await;
                seq.drain(..).sum()
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_custom_lane_op_borrows_across_await() {
        let cell = ExclusiveCell::new(vec![1u32, 2, 3]);
        assert_eq!(cell.submit_op(DrainSum).await.unwrap(), 6);
        assert_eq!(cell.get().await.unwrap(), Vec::<u32>::new());
    }

    struct TakeAll;

    impl LaneOp<Vec<String>> for TakeAll {
        type Output = Vec<String>;

        fn run<'a>(self, seq: &'a mut Vec<String>) -> BoxFuture<'a, Vec<String>> {
            async move { std::mem::take(seq) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_op_output_owns_its_data() {
        let cell = ExclusiveCell::new(vec![String::from("a"), String::from("b")]);
        let taken = cell.submit_op(TakeAll).await.unwrap();
        // The result owns its data; it stays valid after the cell is gone.
        drop(cell);
        assert_eq!(taken, vec!["a", "b"]);
    }

    #[test]
    fn test_blocking_accessors_outside_runtime() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let cell = {
            let _guard = rt.enter();
            ExclusiveCell::new(5u32)
        };
        cell.blocking_set(7).unwrap();
        assert_eq!(cell.blocking_get().unwrap(), 7);
    }
}
