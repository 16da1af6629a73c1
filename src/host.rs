//! Marshaling work onto the host's execution context.
//!
//! Request handlers run on the tokio runtime, but the object graph they
//! read and mutate belongs to the host and is only touched from the host's
//! own context (its update loop, its main thread). Handlers never lock the
//! graph; they send a closure over and await the answer.
//!
//! ```text
//!  handler task                         host context
//! ┌──────────────────┐   Job (FnOnce)   ┌─────────────────────┐
//! │ handle.run(|s| ) │ ───────────────▶ │ queue.pump(&mut s)  │
//! │   .await         │ ◀─────────────── │   runs each job     │
//! └──────────────────┘  oneshot reply   └─────────────────────┘
//! ```
//!
//! Every closure runs to completion before the next one starts, so one
//! closure is one atomic span of host work.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use crate::error::ApiError;

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Creates a connected handle / queue pair for host state `S`.
pub fn channel<S>() -> (HostHandle<S>, HostQueue<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HostHandle { tx }, HostQueue { rx })
}

// ── HostHandle ────────────────────────────────────────────────────────────────

/// Sending side, cloned into every controller.
pub struct HostHandle<S> {
    tx: mpsc::UnboundedSender<Job<S>>,
}

impl<S> Clone for HostHandle<S> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<S: 'static> HostHandle<S> {
    /// Runs `f` on the host and returns its result.
    ///
    /// Fails with an internal error if the host has stopped or `f` panicked.
    pub async fn run<R, F>(&self, f: F) -> Result<R, ApiError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job<S> = Box::new(move |state: &mut S| {
            // The caller may have gone away; nothing to do then.
            let _ = reply_tx.send(f(state));
        });

        self.tx.send(job).map_err(|_| not_running())?;

        // A dropped sender means the job never replied: it panicked or the
        // queue was dropped with the job still in it.
        reply_rx.await.map_err(|_| ApiError::internal("host job did not complete"))
    }

    /// [`run`](Self::run) for closures that can fail themselves.
    pub async fn try_run<R, F>(&self, f: F) -> Result<R, ApiError>
    where
        F: FnOnce(&mut S) -> Result<R, ApiError> + Send + 'static,
        R: Send + 'static,
    {
        self.run(f).await?
    }

    /// Polls the host every `interval` until `predicate` holds.
    ///
    /// There is no timeout; wrap the call in `tokio::time::timeout` if the
    /// condition might never be reached.
    pub async fn wait_until<P>(&self, predicate: P, interval: Duration) -> Result<(), ApiError>
    where
        P: Fn(&S) -> bool + Clone + Send + 'static,
    {
        loop {
            let check = predicate.clone();
            if self.run(move |state: &mut S| check(&*state)).await? {
                return Ok(());
            }
            trace!(interval_ms = interval.as_millis() as u64, "host not settled, waiting");
            tokio::time::sleep(interval).await;
        }
    }

    /// `true` once the queue side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn not_running() -> ApiError {
    ApiError::internal("host is not running")
}

// ── HostQueue ─────────────────────────────────────────────────────────────────

/// Receiving side, owned by whatever drives the host.
pub struct HostQueue<S> {
    rx: mpsc::UnboundedReceiver<Job<S>>,
}

impl<S> HostQueue<S> {
    /// Runs every job queued so far against `state`. Call once per host
    /// update. Returns the number of jobs run.
    ///
    /// A panicking job is logged and dropped; its caller sees an internal
    /// error and the remaining jobs still run.
    pub fn pump(&mut self, state: &mut S) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            execute(job, state);
            ran += 1;
        }
        if ran > 0 {
            trace!(jobs = ran, "host queue pumped");
        }
        ran
    }

    /// Owns `state` on the current task and runs jobs as they arrive.
    ///
    /// Returns the state once every [`HostHandle`] has been dropped.
    pub async fn run(mut self, mut state: S) -> S {
        debug!("host loop started");
        while let Some(job) = self.rx.recv().await {
            execute(job, &mut state);
        }
        debug!("host loop stopped");
        state
    }
}

fn execute<S>(job: Job<S>, state: &mut S) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(state))) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        error!(panic = %message, "host job panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    #[derive(Default)]
    struct Clock {
        beat: f32,
        paused: bool,
    }

    #[tokio::test]
    async fn run_returns_closure_result() {
        let (handle, queue) = channel::<Clock>();
        let host = tokio::spawn(queue.run(Clock { beat: 2.5, paused: false }));

        let beat = handle.run(|c: &mut Clock| c.beat).await.unwrap();
        assert_eq!(beat, 2.5);

        handle.run(|c: &mut Clock| c.paused = true).await.unwrap();
        drop(handle);

        let clock = host.await.unwrap();
        assert!(clock.paused);
    }

    #[tokio::test]
    async fn try_run_flattens_closure_errors() {
        let (handle, queue) = channel::<Clock>();
        tokio::spawn(queue.run(Clock::default()));

        let err = handle
            .try_run(|_: &mut Clock| -> Result<(), ApiError> { Err(ApiError::not_found("no token")) })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }

    #[tokio::test]
    async fn stopped_host_is_an_internal_error() {
        let (handle, queue) = channel::<Clock>();
        drop(queue);

        let err = handle.run(|c: &mut Clock| c.beat).await.unwrap_err();
        assert_eq!(err.status(), Status::InternalServerError);
        assert_eq!(err.to_string(), "host is not running");
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_the_host() {
        let (handle, queue) = channel::<Clock>();
        tokio::spawn(queue.run(Clock::default()));

        let err = handle.run(|_: &mut Clock| -> u8 { panic!("boom") }).await.unwrap_err();
        assert_eq!(err.status(), Status::InternalServerError);

        assert_eq!(handle.run(|c: &mut Clock| c.beat).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn pump_drains_queued_jobs() {
        let (handle, mut queue) = channel::<Clock>();
        let mut clock = Clock::default();
        assert_eq!(queue.pump(&mut clock), 0);

        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.run(|c: &mut Clock| c.beat += 1.0).await }
        });
        while queue.pump(&mut clock) == 0 {
            tokio::task::yield_now().await;
        }
        pending.await.unwrap().unwrap();
        assert_eq!(clock.beat, 1.0);
    }

    #[tokio::test]
    async fn wait_until_polls_until_predicate_holds() {
        let (handle, mut queue) = channel::<Clock>();
        let driver = tokio::spawn(async move {
            let mut clock = Clock::default();
            // Each tick advances the clock, then serves queued jobs.
            for _ in 0..200 {
                clock.beat += 1.0;
                queue.pump(&mut clock);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            clock.beat
        });

        handle.wait_until(|c: &Clock| c.beat >= 3.0, Duration::from_millis(1)).await.unwrap();
        let beat = handle.run(|c: &mut Clock| c.beat).await.unwrap();
        assert!(beat >= 3.0);
        drop(handle);
        driver.abort();
    }
}
