//! Fixed-size worker pool
//!
//! Two entry points:
//! - `submit`: fire-and-forget tasks
//! - `dispatch` / `dispatch_mut`: split `[0, count)` into one contiguous slice
//!   per worker and block until every slice has finished (a barrier)
//!
//! Workers are a `rayon::ThreadPool`. Dispatched slices run inside a rayon
//! scope, so they may borrow from the caller's stack.

use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::{Error, Result};

/// Split `[0, count)` into `min(count, workers)` contiguous near-equal ranges.
///
/// The remainder goes one-by-one to the earliest ranges, so 17 items over 4
/// workers yields lengths 5, 4, 4, 4.
pub fn partition(count: usize, workers: usize) -> Vec<Range<usize>> {
    let slices = count.min(workers);
    if slices == 0 {
        return Vec::new();
    }
    let batch = count / slices;
    let extra = count % slices;

    let mut ranges = Vec::with_capacity(slices);
    let mut start = 0;
    for i in 0..slices {
        let end = start + batch + usize::from(i < extra);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Counter with a wait-for-zero, shared with the workers
#[derive(Default)]
struct Counter {
    count: Mutex<usize>,
    zero: Condvar,
}

impl Counter {
    fn starting_at(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    fn wait_zero(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.zero.wait(&mut count);
        }
    }
}

/// A fixed set of named worker threads
pub struct WorkerPool {
    thread_count: usize,
    /// `None` once shut down
    pool: RwLock<Option<rayon::ThreadPool>>,
    /// Outstanding fire-and-forget tasks
    pending: Arc<Counter>,
    /// Worker threads that have not exited yet
    alive: Arc<Counter>,
}

impl WorkerPool {
    /// Spawn `thread_count` workers
    pub fn new(thread_count: usize) -> Result<Self> {
        if thread_count == 0 {
            return Err(Error::InvalidParam(
                "worker pool needs at least one thread".into(),
            ));
        }

        let alive = Arc::new(Counter::starting_at(thread_count));
        let on_exit = Arc::clone(&alive);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|i| format!("verlet-worker-{i}"))
            .exit_handler(move |_| on_exit.decrement())
            .build()?;

        log::info!("Worker pool started with {thread_count} threads");

        Ok(Self {
            thread_count,
            pool: RwLock::new(Some(pool)),
            pending: Arc::new(Counter::default()),
            alive,
        })
    }

    /// One worker per logical CPU
    pub fn with_available_parallelism() -> Result<Self> {
        Self::new(num_cpus::get().max(1))
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// True once `shutdown` has run; the pool accepts no more work
    pub fn is_closed(&self) -> bool {
        self.pool.read().is_none()
    }

    /// Queue a fire-and-forget task
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = self.pool.read();
        let Some(pool) = pool.as_ref() else {
            return Err(Error::PoolClosed);
        };
        self.pending.increment();
        let pending = Arc::clone(&self.pending);
        pool.spawn(move || {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                log::warn!("Pool task panicked");
            }
            pending.decrement();
        });
        Ok(())
    }

    /// Block until every task submitted so far has finished
    pub fn wait(&self) {
        self.pending.wait_zero();
    }

    /// Run `task` over `[0, count)`, one contiguous range per worker, and
    /// return only when every range has been processed.
    ///
    /// Must not be called from inside a pool task.
    pub fn dispatch<F>(&self, count: usize, task: F) -> Result<()>
    where
        F: Fn(Range<usize>) + Sync,
    {
        let pool = self.pool.read();
        let Some(pool) = pool.as_ref() else {
            return Err(Error::PoolClosed);
        };
        let ranges = partition(count, self.thread_count);
        log::trace!("dispatch {count} items as {} slices", ranges.len());

        let task = &task;
        let panicked = AtomicUsize::new(0);
        pool.scope(|scope| {
            for range in ranges {
                let panicked = &panicked;
                scope.spawn(move |_| {
                    if catch_unwind(AssertUnwindSafe(|| task(range))).is_err() {
                        panicked.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        check_panics(panicked.into_inner())
    }

    /// Like `dispatch`, but hands each worker an exclusive chunk of `items`
    /// together with the chunk's starting index.
    pub fn dispatch_mut<T, F>(&self, items: &mut [T], task: F) -> Result<()>
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        let pool = self.pool.read();
        let Some(pool) = pool.as_ref() else {
            return Err(Error::PoolClosed);
        };
        let ranges = partition(items.len(), self.thread_count);
        log::trace!("dispatch_mut {} items as {} slices", items.len(), ranges.len());

        let task = &task;
        let panicked = AtomicUsize::new(0);
        pool.scope(|scope| {
            let mut rest = items;
            for range in ranges {
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                rest = tail;
                let panicked = &panicked;
                scope.spawn(move |_| {
                    if catch_unwind(AssertUnwindSafe(|| task(range.start, chunk))).is_err() {
                        panicked.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        check_panics(panicked.into_inner())
    }

    /// Stop accepting work, let queued tasks finish, then wait for every
    /// worker thread to exit.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        let Some(pool) = self.pool.write().take() else {
            return;
        };
        self.pending.wait_zero();
        drop(pool);
        self.alive.wait_zero();
        log::info!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn check_panics(panicked: usize) -> Result<()> {
    if panicked > 0 {
        return Err(Error::TaskPanicked { panicked });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_partition_17_over_4() {
        let ranges = partition(17, 4);
        let lens: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(lens, vec![5, 4, 4, 4]);
        assert_eq!(ranges[0].start, 0);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "no gap or overlap");
        }
        assert_eq!(ranges.last().unwrap().end, 17);
    }

    #[test]
    fn test_partition_fewer_items_than_workers() {
        let ranges = partition(3, 8);
        assert_eq!(ranges, vec![0..1, 1..2, 2..3]);
        assert!(partition(0, 4).is_empty());
        assert!(partition(10, 0).is_empty());
    }

    #[test]
    fn test_dispatch_waits_for_all_slices() {
        let pool = WorkerPool::new(4).unwrap();
        let items = AtomicUsize::new(0);
        let slices = AtomicUsize::new(0);
        let seen = Mutex::new(Vec::new());

        pool.dispatch(17, |range| {
            thread::sleep(Duration::from_millis(20));
            items.fetch_add(range.len(), Ordering::SeqCst);
            slices.fetch_add(1, Ordering::SeqCst);
            seen.lock().push(range);
        })
        .unwrap();

        // Everything is visible the moment dispatch returns
        assert_eq!(items.load(Ordering::SeqCst), 17);
        assert_eq!(slices.load(Ordering::SeqCst), 4);
        let mut seen = seen.into_inner();
        seen.sort_by_key(|r| r.start);
        let lens: Vec<usize> = seen.iter().map(|r| r.len()).collect();
        assert_eq!(lens, vec![5, 4, 4, 4]);
    }

    #[test]
    fn test_dispatch_zero_items_is_noop() {
        let pool = WorkerPool::new(2).unwrap();
        let calls = AtomicUsize::new(0);
        pool.dispatch(0, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_mut_disjoint_chunks() {
        let pool = WorkerPool::new(3).unwrap();
        let mut values = vec![0usize; 10];
        pool.dispatch_mut(&mut values, |offset, chunk| {
            for (i, v) in chunk.iter_mut().enumerate() {
                *v = offset + i;
            }
        })
        .unwrap();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_dispatch_reports_panics_after_draining() {
        let pool = WorkerPool::new(4).unwrap();
        let finished = AtomicUsize::new(0);
        let result = pool.dispatch(4, |range| {
            if range.start == 0 {
                panic!("slice failure");
            }
            thread::sleep(Duration::from_millis(10));
            finished.fetch_add(1, Ordering::SeqCst);
        });
        assert!(matches!(result, Err(Error::TaskPanicked { panicked: 1 })));
        assert_eq!(finished.load(Ordering::SeqCst), 3);

        // Pool is still usable afterwards
        pool.dispatch(2, |_| {}).unwrap();
    }

    #[test]
    fn test_submit_and_wait() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_shutdown_drains_then_rejects() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(2));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert!(pool.is_closed());
        assert_eq!(counter.load(Ordering::SeqCst), 10, "queued work must finish");

        assert!(matches!(pool.submit(|| {}), Err(Error::PoolClosed)));
        assert!(matches!(pool.dispatch(4, |_| {}), Err(Error::PoolClosed)));

        // Second shutdown is a no-op
        pool.shutdown();
    }

    #[test]
    fn test_shutdown_waits_for_worker_exit() {
        let pool = WorkerPool::new(3).unwrap();
        let mut values = vec![1u32; 64];
        pool.dispatch_mut(&mut values, |_, chunk| chunk.iter_mut().for_each(|v| *v *= 2))
            .unwrap();
        assert!(values.iter().all(|&v| v == 2));

        pool.shutdown();
        assert_eq!(*pool.alive.count.lock(), 0, "every worker thread has exited");
        assert!(matches!(
            pool.dispatch_mut(&mut values, |_, _| {}),
            Err(Error::PoolClosed)
        ));
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(Error::InvalidParam(_))));
    }
}
