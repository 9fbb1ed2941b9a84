use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

pub(crate) type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Pending {
    timer: JoinHandle<()>,
    job: Arc<Mutex<Option<Job>>>,
}

/// Runs the last scheduled job once `delay` has passed without a newer one.
///
/// Cancelling only ever drops a job that has not started. A job the timer already
/// handed off runs to completion on its own task.
pub(crate) struct Debouncer {
    delay: Duration,
    pending: Option<Pending>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let slot: Arc<Mutex<Option<Job>>> = Arc::new(Mutex::new(Some(Box::pin(job))));
        let delay = self.delay;
        let timer_slot = Arc::clone(&slot);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let job = take(&timer_slot);
            if let Some(job) = job {
                tokio::spawn(job);
            }
        });
        self.pending = Some(Pending { timer, job: slot });
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|pending| lock(&pending.job).is_some())
            .unwrap_or(false)
    }

    /// Drops the pending job, if it has not fired yet.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
            take(&pending.job);
        }
    }

    /// Takes the pending job out so it can run now instead of after the delay.
    pub fn flush(&mut self) -> Option<Job> {
        let pending = self.pending.take()?;
        pending.timer.abort();
        take(&pending.job)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(slot: &Mutex<Option<Job>>) -> std::sync::MutexGuard<'_, Option<Job>> {
    // The slot only ever holds an Option, a poisoned lock still has a usable value.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn take(slot: &Mutex<Option<Job>>) -> Option<Job> {
    lock(slot).take()
}
