// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cancellable timers.
//
// Every periodic or delayed task the services run is spawned through a
// `Scheduler`, which hands back a `TaskHandle`.  Cancelling a handle (or the
// whole scheduler) guarantees the task body is not started again; a body
// that is already running is left to finish.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Marks a tick body as in flight; the flag clears when the guard drops.
#[derive(Debug)]
pub(crate) struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    /// `None` if another body already holds the flag.
    pub(crate) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle on one scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    token: CancellationToken,
}

impl TaskHandle {
    /// Stop the task. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Spawns timer-driven tasks on the current tokio runtime.
#[derive(Debug)]
pub struct Scheduler {
    root: Mutex<CancellationToken>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(CancellationToken::new()),
        }
    }

    fn child_token(&self) -> CancellationToken {
        match self.root.lock() {
            Ok(root) => root.child_token(),
            Err(poisoned) => poisoned.into_inner().child_token(),
        }
    }

    /// Run `task` now and then once per `interval`.
    ///
    /// Ticks missed while a body runs are skipped rather than bunched up.
    pub fn every<F, Fut>(&self, interval: Duration, mut task: F) -> TaskHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.child_token();
        let cancelled = token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if cancelled.is_cancelled() {
                    break;
                }
                task().await;
            }
            debug!("periodic task ended");
        });
        TaskHandle { token }
    }

    /// Run `task` once after `delay`.
    pub fn after<F, Fut>(&self, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.child_token();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    debug!("delayed task cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            if !cancelled.is_cancelled() {
                task().await;
            }
        });
        TaskHandle { token }
    }

    /// Cancel every task spawned so far. Tasks scheduled afterwards run
    /// normally.
    pub fn cancel_all(&self) {
        let mut root = match self.root.lock() {
            Ok(root) => root,
            Err(poisoned) => poisoned.into_inner(),
        };
        root.cancel();
        *root = CancellationToken::new();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    use super::*;

    fn counter_task(count: &Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[test]
    fn busy_guard_excludes_a_second_holder() {
        let flag = AtomicBool::new(false);
        let first = BusyGuard::try_acquire(&flag).expect("free flag");
        assert!(BusyGuard::try_acquire(&flag).is_none());
        drop(first);
        assert!(BusyGuard::try_acquire(&flag).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn every_runs_immediately_then_per_interval() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicU32::new(0));
        let handle = scheduler.every(Duration::from_secs(2), counter_task(&count));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_delay_never_runs() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicU32::new(0));
        let handle = scheduler.after(Duration::from_secs(5), counter_task(&count));
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_everything_but_allows_new_tasks() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicU32::new(0));
        let periodic = scheduler.every(Duration::from_secs(1), counter_task(&count));
        let delayed = scheduler.after(Duration::from_secs(3), counter_task(&count));

        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.cancel_all();
        assert!(periodic.is_cancelled());
        assert!(delayed.is_cancelled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.after(Duration::from_secs(1), counter_task(&count));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
