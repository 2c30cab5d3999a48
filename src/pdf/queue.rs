//! Serializes PDF service requests on one worker thread, spacing them out and
//! retrying when the service rate limits.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::document::PdfDocument;
use super::service::{PdfService, ServiceError};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueConfig {
    /// Minimum gap between two dispatches.
    pub min_delay: Duration,
    pub retry_backoff: Duration,
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(3000),
            retry_backoff: Duration::from_millis(6000),
            max_retries: 3,
        }
    }
}

struct Job {
    document: PdfDocument,
    reply: mpsc::Sender<Result<Vec<u8>>>,
}

pub struct PdfQueue {
    jobs: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl PdfQueue {
    pub fn start<S: PdfService>(service: S, config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = thread::spawn(move || {
            let mut last_dispatch: Option<Instant> = None;
            for job in rx {
                let result = dispatch(&service, &config, &mut last_dispatch, &job.document);
                if job.reply.send(result).is_err() {
                    debug!("pdf requester went away before the reply");
                }
            }
            debug!("pdf queue worker exiting");
        });
        Self { jobs: Some(tx), worker: Some(worker) }
    }

    /// Enqueues the document and blocks until the worker has an answer.
    pub fn submit(&self, document: PdfDocument) -> Result<Vec<u8>> {
        let (reply, answer) = mpsc::channel();
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| Error::PdfService("queue is shut down".to_string()))?;
        jobs.send(Job { document, reply })
            .map_err(|_| Error::PdfService("queue worker stopped".to_string()))?;
        answer
            .recv()
            .map_err(|_| Error::PdfService("queue worker stopped".to_string()))?
    }
}

impl Drop for PdfQueue {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("pdf queue worker panicked");
            }
        }
    }
}

fn wait_for_slot(config: &QueueConfig, last_dispatch: &Option<Instant>) {
    if let Some(last) = last_dispatch {
        let elapsed = last.elapsed();
        if elapsed < config.min_delay {
            let wait = config.min_delay - elapsed;
            debug!(wait_ms = wait.as_millis() as u64, "waiting before pdf request");
            thread::sleep(wait);
        }
    }
}

fn dispatch<S: PdfService>(
    service: &S,
    config: &QueueConfig,
    last_dispatch: &mut Option<Instant>,
    document: &PdfDocument,
) -> Result<Vec<u8>> {
    let mut retries_left = config.max_retries;
    loop {
        wait_for_slot(config, last_dispatch);
        *last_dispatch = Some(Instant::now());
        debug!(invoice_number = %document.invoice_number, "sending pdf request");

        match service.render(document) {
            Ok(bytes) => return Ok(bytes),
            Err(ServiceError::RateLimited) if retries_left > 0 => {
                warn!(
                    retries_left,
                    backoff_ms = config.retry_backoff.as_millis() as u64,
                    "rate limited by pdf service, retrying"
                );
                thread::sleep(config.retry_backoff);
                *last_dispatch = Some(Instant::now());
                retries_left -= 1;
            }
            Err(ServiceError::RateLimited) => return Err(Error::RateLimited),
            Err(ServiceError::Failed(message)) => {
                error!(invoice_number = %document.invoice_number, "pdf service failed: {}", message);
                return Err(Error::PdfService(message));
            }
        }
    }
}
