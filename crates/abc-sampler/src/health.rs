use std::any::Any;
use std::thread::ScopedJoinHandle;
use std::time::Duration;

use abc_core::{AbcError, ErrorInfo};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::sample::Sample;

/// Messages sent from workers to the coordinator.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Particles up to and including one accepted attempt.
    Batch {
        /// Evaluation id of the accepted attempt closing the batch.
        particle_id: u64,
        /// Attempts accumulated by the worker since its previous batch.
        sample: Sample,
    },
    /// Completion sentinel, the last message of a healthy worker.
    Done {
        /// Index of the finished worker.
        worker: usize,
    },
    /// A proposal or simulation raised a fatal error.
    Failed {
        /// Index of the failing worker.
        worker: usize,
        /// The error to surface to the caller.
        error: AbcError,
    },
}

/// Coordinator-side view of one worker thread.
pub struct WorkerHandle<'scope> {
    index: usize,
    handle: Option<ScopedJoinHandle<'scope, ()>>,
    done: bool,
}

impl<'scope> WorkerHandle<'scope> {
    /// Wraps a spawned worker thread.
    pub fn new(index: usize, handle: ScopedJoinHandle<'scope, ()>) -> Self {
        Self {
            index,
            handle: Some(handle),
            done: false,
        }
    }

    /// Index of the worker.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Records that the worker's final message was received.
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Whether the worker's final message was received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// True when the thread has exited without sending its final message.
    pub fn exited_without_sentinel(&self) -> bool {
        !self.done
            && self
                .handle
                .as_ref()
                .map_or(true, |handle| handle.is_finished())
    }

    /// Waits for the thread, turning a panic into `worker-died`.
    pub fn join(&mut self) -> Result<(), AbcError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|payload| worker_died(self.index, Some(panic_message(payload.as_ref())))),
            None => Ok(()),
        }
    }
}

/// Returns the next worker message, or fails if a worker died.
///
/// Channel receive is interleaved with liveness checks so that a worker
/// exiting without its sentinel is reported instead of blocking the
/// coordinator forever. Messages a dead worker managed to send before
/// exiting are still delivered first.
pub fn next_if_worker_healthy(
    workers: &[WorkerHandle<'_>],
    receiver: &Receiver<WorkerMessage>,
    poll: Duration,
) -> Result<WorkerMessage, AbcError> {
    loop {
        if let Some(dead) = workers.iter().find(|worker| worker.exited_without_sentinel()) {
            return match receiver.try_recv() {
                Ok(message) => Ok(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    Err(worker_died(dead.index, None))
                }
            };
        }
        match receiver.recv_timeout(poll) {
            Ok(message) => return Ok(message),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                let index = workers
                    .iter()
                    .find(|worker| !worker.is_done())
                    .map_or(0, |worker| worker.index);
                return Err(worker_died(index, None));
            }
        }
    }
}

pub(crate) fn worker_died(index: usize, reason: Option<String>) -> AbcError {
    let mut info = ErrorInfo::new(
        "worker-died",
        "worker terminated before sending its completion sentinel",
    )
    .with_context("worker", index);
    if let Some(reason) = reason {
        info = info.with_context("panic", reason);
    }
    AbcError::Worker(info)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
