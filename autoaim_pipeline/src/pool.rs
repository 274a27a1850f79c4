//! Off-path thread pool.
//!
//! A plain mutex + condvar work queue for tasks that must stay off the
//! pipeline hot path (log rotation, artifact writes). The pipeline
//! workers themselves run on dedicated threads and never touch this.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue: Mutex<PoolQueue>,
    available: Condvar,
}

struct PoolQueue {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

/// Fixed-size worker pool; drains its queue on drop.
pub struct ThreadPool {
    state: Arc<PoolState>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `n_workers` pool threads.
    pub fn new(n_workers: usize) -> Self {
        let state = Arc::new(PoolState {
            queue: Mutex::new(PoolQueue {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        });

        let workers = (0..n_workers.max(1))
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::Builder::new()
                    .name(format!("pool-{i}"))
                    .spawn(move || worker_loop(&state))
                    .expect("spawn pool thread")
            })
            .collect();

        Self { state, workers }
    }

    /// Enqueue a job. Jobs submitted after drop begins are discarded.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.state.queue.lock().expect("pool lock");
        if queue.shutdown {
            debug!("job submitted to a shutting-down pool, dropped");
            return;
        }
        queue.jobs.push_back(Box::new(job));
        drop(queue);
        self.state.available.notify_one();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        {
            let mut queue = self.state.queue.lock().expect("pool lock");
            queue.shutdown = true;
        }
        self.state.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(state: &PoolState) {
    loop {
        let job = {
            let mut queue = state.queue.lock().expect("pool lock");
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.shutdown {
                    return;
                }
                queue = state.available.wait(queue).expect("pool wait");
            }
        };
        job();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn runs_all_jobs_before_drop_completes() {
        let counter = Arc::new(AtomicU32::new(0));
        {
            let pool = ThreadPool::new(3);
            for _ in 0..40 {
                let counter = Arc::clone(&counter);
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        }
        // Drop joins after draining the queue.
        assert_eq!(counter.load(Ordering::Relaxed), 40);
    }

    #[test]
    fn zero_workers_rounds_up_to_one() {
        let counter = Arc::new(AtomicU32::new(0));
        {
            let pool = ThreadPool::new(0);
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
