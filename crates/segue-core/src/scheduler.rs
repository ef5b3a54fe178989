//! Named, cancelable delayed actions
//!
//! The crossfade engine sequences its fade stages with wall-clock timers.
//! Instead of fire-and-forget callbacks, every timer has a name: arming a
//! name replaces any pending action under it, and `cancel` disarms one
//! explicitly. Timers from an earlier transition use that transition's
//! names, so overlapping transitions never cancel each other by accident.
//!
//! One worker thread owns the pending set; arm/cancel messages arrive over
//! a channel and due actions run on the worker.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, RecvTimeoutError, Sender};

type Action = Box<dyn FnOnce() + Send>;

enum Msg {
    Arm {
        name: String,
        deadline: Instant,
        action: Action,
    },
    Cancel(String),
    Shutdown,
}

struct Entry {
    name: String,
    deadline: Instant,
    action: Action,
}

/// Timer thread for fade-stage sequencing
pub struct FadeScheduler {
    tx: Sender<Msg>,
    worker: Option<JoinHandle<()>>,
}

impl FadeScheduler {
    pub fn new() -> Self {
        let (tx, rx) = unbounded::<Msg>();
        let worker = thread::Builder::new()
            .name("fade-scheduler".to_string())
            .spawn(move || {
                let mut pending: Vec<Entry> = Vec::new();
                loop {
                    let timeout = pending
                        .iter()
                        .map(|e| e.deadline.saturating_duration_since(Instant::now()))
                        .min()
                        .unwrap_or(Duration::from_secs(60));

                    match rx.recv_timeout(timeout) {
                        Ok(Msg::Arm {
                            name,
                            deadline,
                            action,
                        }) => {
                            if pending.iter().any(|e| e.name == name) {
                                log::debug!("re-arming timer '{}'", name);
                                pending.retain(|e| e.name != name);
                            }
                            pending.push(Entry {
                                name,
                                deadline,
                                action,
                            });
                        }
                        Ok(Msg::Cancel(name)) => {
                            pending.retain(|e| e.name != name);
                        }
                        Ok(Msg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    // Fire everything due, oldest deadline first
                    let now = Instant::now();
                    pending.sort_by_key(|e| e.deadline);
                    while pending.first().is_some_and(|e| e.deadline <= now) {
                        let entry = pending.remove(0);
                        (entry.action)();
                    }
                }
            })
            .expect("failed to spawn fade-scheduler thread");

        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Arm (or re-arm) the named timer to fire after `delay`
    pub fn schedule_in(
        &self,
        name: impl Into<String>,
        delay: Duration,
        action: impl FnOnce() + Send + 'static,
    ) {
        let msg = Msg::Arm {
            name: name.into(),
            deadline: Instant::now() + delay,
            action: Box::new(action),
        };
        if self.tx.send(msg).is_err() {
            log::error!("fade scheduler is gone, dropping timer");
        }
    }

    /// Disarm the named timer if it has not fired yet
    pub fn cancel(&self, name: &str) {
        let _ = self.tx.send(Msg::Cancel(name.to_string()));
    }
}

impl Default for FadeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FadeScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(worker) = self.worker.take() {
            // A timer action may own the last handle to this scheduler, in
            // which case the drop runs on the worker itself: don't self-join.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_timer_fires_once() {
        let sched = FadeScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        sched.schedule_in("fire", Duration::from_millis(20), move || {
            count2.fetch_add(1, Ordering::Relaxed);
        });
        thread::sleep(Duration::from_millis(120));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cancel_disarms() {
        let sched = FadeScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        sched.schedule_in("doomed", Duration::from_millis(50), move || {
            count2.fetch_add(1, Ordering::Relaxed);
        });
        sched.cancel("doomed");
        thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_rearming_replaces_pending_action() {
        let sched = FadeScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&count);
        sched.schedule_in("stage", Duration::from_millis(40), move || {
            first.fetch_add(1, Ordering::Relaxed);
        });
        let second = Arc::clone(&count);
        sched.schedule_in("stage", Duration::from_millis(40), move || {
            second.fetch_add(10, Ordering::Relaxed);
        });
        thread::sleep(Duration::from_millis(160));
        assert_eq!(count.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_distinct_names_fire_independently() {
        let sched = FadeScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        for name in ["a", "b", "c"] {
            let c = Arc::clone(&count);
            sched.schedule_in(name, Duration::from_millis(20), move || {
                c.fetch_add(1, Ordering::Relaxed);
            });
        }
        thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }
}
