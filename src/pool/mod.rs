//! Work-stealing thread pool backing the system scheduler.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::error::SubmitError;

use self::deque::{Task, WorkStealingQueue};

mod deque;

/// How long an idle worker parks on the shared queue's condvar before
/// re-checking the steal targets.
const IDLE_WAIT: Duration = Duration::from_micros(10);

thread_local! {
    /// Identity of the current worker: the address of its pool's shared
    /// state plus its worker index. Unset on non-worker threads.
    static CURRENT_WORKER: Cell<Option<(usize, usize)>> = Cell::new(None);
}

struct Shared {
    queues: Vec<WorkStealingQueue>,
    injector: Mutex<VecDeque<Task>>,
    available: Condvar,
    stop: AtomicBool,
}

fn shared_key(shared: &Arc<Shared>) -> usize {
    Arc::as_ptr(shared) as usize
}

/// A fixed pool of worker threads with per-worker work-stealing deques.
///
/// Each worker owns a bounded local deque. A task submitted from a worker
/// thread goes to that worker's deque (LIFO); submissions from other threads,
/// or from a worker whose deque is full, go to a shared injector queue
/// guarded by a mutex and condvar. Idle workers try their own deque, then the
/// injector, then steal round-robin from the other workers.
///
/// Dropping the pool sets a stop flag, wakes every worker and joins them.
/// Tasks still queued at that point may or may not run; no task starts after
/// the join completes.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Creates a pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> ThreadPool {
        let count = workers.max(1);
        let shared = Arc::new(Shared {
            queues: (0..count).map(|_| WorkStealingQueue::new()).collect(),
            injector: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            stop: AtomicBool::new(false),
        });

        let workers = (0..count)
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("weft-worker-{index}"))
                    .spawn(move || worker_loop(shared, index))
                    .expect("failed to spawn pool worker")
            })
            .collect();

        debug!("thread pool started with {count} workers");
        ThreadPool { shared, workers }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.shared.queues.len()
    }

    /// Submits a fire-and-forget task.
    ///
    /// Fails only when the pool has begun shutting down.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> Result<(), SubmitError> {
        self.submit_boxed(Box::new(task))
    }

    fn submit_boxed(&self, task: Task) -> Result<(), SubmitError> {
        // A worker submitting into its own pool prefers its local deque.
        let task = match CURRENT_WORKER.with(Cell::get) {
            Some((pool, index)) if pool == shared_key(&self.shared) => {
                match self.shared.queues[index].push(task) {
                    Ok(()) => return Ok(()),
                    Err(task) => task, // deque full, fall back to the injector
                }
            }
            _ => task,
        };

        {
            let mut injector = self.shared.injector.lock().unwrap();
            if self.shared.stop.load(Ordering::Relaxed) {
                return Err(SubmitError);
            }
            injector.push_back(task);
        }
        self.shared.available.notify_one();
        Ok(())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        {
            let _guard = self.shared.injector.lock().unwrap();
            self.shared.stop.store(true, Ordering::SeqCst);
        }
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("thread pool stopped");
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    CURRENT_WORKER.with(|current| current.set(Some((shared_key(&shared), index))));

    loop {
        // 1. own deque
        let mut task = shared.queues[index].pop();

        // 2. shared injector; try-lock so a busy injector never blocks
        //    stealing
        if task.is_none() {
            if let Ok(mut injector) = shared.injector.try_lock() {
                task = injector.pop_front();
            }
        }

        // 3. steal round-robin, starting at the next worker
        if task.is_none() {
            let count = shared.queues.len();
            for offset in 0..count {
                let victim = (index + offset + 1) % count;
                task = shared.queues[victim].steal();
                if task.is_some() {
                    break;
                }
            }
        }

        match task {
            Some(task) => task(),
            None => {
                if shared.stop.load(Ordering::SeqCst) {
                    return;
                }

                let injector = shared.injector.lock().unwrap();
                let (injector, _) = shared
                    .available
                    .wait_timeout_while(injector, IDLE_WAIT, |injector| {
                        injector.is_empty()
                            && !shared.stop.load(Ordering::Relaxed)
                            && shared.queues[index].is_empty()
                    })
                    .unwrap();

                let stopped = shared.stop.load(Ordering::SeqCst);
                let drained = injector.is_empty();
                drop(injector);
                if stopped && drained && shared.queues[index].is_empty() {
                    return;
                }
            }
        }
    }
}

/// A count-down completion barrier: `wait` blocks until `count_down` has
/// been called as many times as the initial count.
pub struct CountLatch {
    count: Mutex<usize>,
    zero: Condvar,
}

impl CountLatch {
    /// Creates a latch expecting `count` completions.
    pub fn new(count: usize) -> CountLatch {
        CountLatch {
            count: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    /// Records one completion.
    pub fn count_down(&self) {
        let mut count = self.count.lock().unwrap();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count > 0 {
            count = self.zero.wait(count).unwrap();
        }
    }
}
