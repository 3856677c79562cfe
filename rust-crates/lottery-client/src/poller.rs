//! Fixed-interval refresh owned by a view.
//!
//! A [`PollingDriver`] is either stopped or running exactly one timer task.
//! Results reach view state only through a [`CommitGate`]; once
//! [`PollingDriver::stop`] returns the gate is closed, so a fetch that was
//! already in flight can no longer write.

use color_eyre::eyre::Result;
use std::{
    future::Future,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

/// Locks a view-state mutex. A panic inside a setter leaves plain data
/// behind, so a poisoned lock is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Open while the owning driver runs. Closing waits for a commit in
/// progress to finish.
#[derive(Clone, Debug)]
pub struct CommitGate {
    open: Arc<Mutex<bool>>,
}

impl CommitGate {
    fn open() -> Self {
        Self {
            open: Arc::new(Mutex::new(true)),
        }
    }

    pub fn is_open(&self) -> bool {
        *lock(&self.open)
    }

    /// Runs `apply` if the gate is still open. `apply` must not stop the
    /// driver that owns this gate.
    pub fn commit(&self, apply: impl FnOnce()) -> bool {
        let open = lock(&self.open);
        if *open {
            apply();
        }
        *open
    }

    fn close(&self) {
        *lock(&self.open) = false;
    }
}

struct Running {
    gate: CommitGate,
    handle: JoinHandle<()>,
}

pub struct PollingDriver {
    name: &'static str,
    period: Duration,
    running: Option<Running>,
}

impl PollingDriver {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            running: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts ticking every period, the first tick one period from now.
    /// Each tick runs `fetch` and hands a successful result to `apply`;
    /// failures are logged and the timer keeps going. Starting a running
    /// driver replaces its timer.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start<F, Fut, T, A>(&mut self, mut fetch: F, apply: A)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
        A: Fn(T) + Send + 'static,
    {
        self.stop();

        let gate = CommitGate::open();
        let task_gate = gate.clone();
        let name = self.name;
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !task_gate.is_open() {
                    break;
                }
                match fetch().await {
                    Ok(value) => {
                        if !task_gate.commit(|| apply(value)) {
                            debug!(poller = name, "dropping result fetched before stop");
                            break;
                        }
                    }
                    Err(err) => warn!(poller = name, ?err, "poll tick failed"),
                }
            }
        });

        info!(poller = name, ?period, "polling started");
        self.running = Some(Running { gate, handle });
    }

    /// Cancels the timer. No result is applied after this returns.
    pub fn stop(&mut self) {
        if let Some(Running { gate, handle }) = self.running.take() {
            gate.close();
            handle.abort();
            info!(poller = self.name, "polling stopped");
        }
    }
}

impl Drop for PollingDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
