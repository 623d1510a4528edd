// src/services/dispatcher.rs

//! Bounded-concurrency fetch queue for a single upstream host.
//!
//! A fixed number of worker tasks drain one shared FIFO queue. Callers hand a
//! URL over and wait for the worker that picked it up to finish the whole
//! request/retry cycle, so the number of requests in flight against a host
//! never exceeds the worker count no matter how many callers there are.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::DispatcherConfig;
use crate::services::transport::{Body, Transport};

/// Retry behaviour for transient upstream statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, including the first one
    pub max_attempts: u32,
    /// Fixed pause after each transient failure
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}

impl From<&DispatcherConfig> for RetryPolicy {
    fn from(config: &DispatcherConfig) -> Self {
        Self::new(config.max_attempts, config.backoff())
    }
}

/// How the dispatcher treats a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Transient,
    Fatal,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200 | 201 => StatusClass::Success,
            429 | 500 | 502 | 503 | 504 => StatusClass::Transient,
            _ => StatusClass::Fatal,
        }
    }
}

struct Job {
    url: String,
    reply: oneshot::Sender<Result<Body>>,
}

/// Worker pool plus request queue for one upstream host.
///
/// Must be started from within a tokio runtime.
pub struct Dispatcher {
    host: String,
    workers: usize,
    queue: StdMutex<Option<mpsc::UnboundedSender<Job>>>,
    handles: StdMutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawn `workers` worker tasks serving `host`.
    pub fn start(
        host: impl Into<String>,
        transport: Arc<dyn Transport>,
        workers: usize,
        policy: RetryPolicy,
    ) -> Self {
        let host = host.into();
        let workers = workers.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    host.clone(),
                    Arc::clone(&rx),
                    Arc::clone(&transport),
                    policy,
                ))
            })
            .collect();

        log::debug!("Started {} fetch workers for {}", workers, host);

        Self {
            host,
            workers,
            queue: StdMutex::new(Some(tx)),
            handles: StdMutex::new(handles),
        }
    }

    /// Start a dispatcher configured from [`DispatcherConfig`].
    pub fn from_config(
        host: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: &DispatcherConfig,
    ) -> Self {
        Self::start(host, transport, config.workers, RetryPolicy::from(config))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue a GET and wait until a worker has finished it.
    ///
    /// Returns the open body on success. Transient statuses are retried by the
    /// worker; every other failure is returned as is.
    pub async fn submit(&self, url: impl Into<String>) -> Result<Body> {
        let sender = self
            .queue
            .lock()
            .ok()
            .and_then(|queue| queue.clone())
            .ok_or_else(|| self.closed())?;

        let (reply, response) = oneshot::channel();
        sender
            .send(Job {
                url: url.into(),
                reply,
            })
            .map_err(|_| self.closed())?;
        drop(sender);

        response.await.map_err(|_| self.closed())?
    }

    /// Stop accepting requests, let workers drain the queue, and wait for them.
    pub async fn shutdown(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }
        let handles = self
            .handles
            .lock()
            .map(|mut handles| std::mem::take(&mut *handles))
            .unwrap_or_default();

        for result in join_all(handles).await {
            if let Err(e) = result {
                log::warn!("Fetch worker for {} ended abnormally: {}", self.host, e);
            }
        }
        log::debug!("Fetch workers for {} stopped", self.host);
    }

    fn closed(&self) -> AppError {
        AppError::DispatcherClosed {
            host: self.host.clone(),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("host", &self.host)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Ok(handles) = self.handles.get_mut() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
    }
}

async fn run_worker(
    id: usize,
    host: String,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
) {
    loop {
        let job = queue.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let result = fetch_with_retry(transport.as_ref(), &policy, &job.url).await;
        if job.reply.send(result).is_err() {
            log::debug!("Caller for {} went away before the response", job.url);
        }
    }
    log::debug!("Fetch worker {} for {} exiting", id, host);
}

/// Run one request through the retry cycle.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    policy: &RetryPolicy,
    url: &str,
) -> Result<Body> {
    let mut last_status = None;

    for attempt in 1..=policy.max_attempts {
        let response = transport.get(url).await?;
        let status = response.status;

        match StatusClass::of(status) {
            StatusClass::Success => return Ok(response.body),
            StatusClass::Transient => {
                drop(response.body);
                last_status = Some(status);

                if attempt < policy.max_attempts {
                    log::warn!(
                        "GET {} returned status code {}; try {}/{}; retrying in {:?}",
                        url,
                        status,
                        attempt,
                        policy.max_attempts,
                        policy.backoff
                    );
                    tokio::time::sleep(policy.backoff).await;
                } else {
                    log::warn!(
                        "GET {} returned status code {}; try {}/{}",
                        url,
                        status,
                        attempt,
                        policy.max_attempts
                    );
                }
            }
            StatusClass::Fatal => {
                drop(response.body);
                log::warn!("GET {} returned status code {}", url, status);
                return Err(AppError::Status {
                    url: url.to_string(),
                    status,
                });
            }
        }
    }

    Err(AppError::RetriesExhausted {
        url: url.to_string(),
        status: last_status.unwrap_or_default(),
        attempts: policy.max_attempts,
    })
}
