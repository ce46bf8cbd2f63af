//! The coordinator side of a running operation.
//!
//! [`ConfiguredOperation::begin_execution`] moves the operation onto a scoped
//! worker thread and returns an [`Execution`] handle immediately. The handle
//! receives progress events in order, forwards cancellation requests and
//! hands back the single [`Outcome`].

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, Scope, ScopedJoinHandle};

use crate::cancel::CancellationToken;
use crate::codec::TripleStore;
use crate::executor::{ExecutionEvent, Executor, Outcome};
use crate::operation::ConfiguredOperation;
use crate::progress::ProgressEvent;

/// Failure message used when the worker ends without emitting an outcome.
pub const WORKER_LOST_MESSAGE: &str = "operation worker terminated unexpectedly";

impl<'s, S: TripleStore> ConfiguredOperation<'s, S> {
    /// Start the worker on `scope` and return without waiting for it.
    pub fn begin_execution<'scope, 'env>(
        self,
        scope: &'scope Scope<'scope, 'env>,
    ) -> Execution<'scope>
    where
        's: 'scope,
        S: 'scope,
    {
        let (tx, rx) = mpsc::channel();
        let token = self.cancel_token();
        let kind = self.kind();
        let mut executor = Executor::new(self, tx);

        let worker = scope.spawn(move || {
            if let Err(e) = executor.execute() {
                tracing::error!(operation = %kind, error = %e, "Executor misuse");
            }
        });

        Execution {
            events: rx,
            token,
            worker,
            outcome: None,
        }
    }

    /// Execute on a worker thread and block until the outcome arrives,
    /// passing every progress event to `on_progress` on the calling thread.
    pub fn run(self, on_progress: impl FnMut(&ProgressEvent)) -> Outcome {
        thread::scope(|scope| self.begin_execution(scope).wait(on_progress))
    }
}

pub struct Execution<'scope> {
    events: Receiver<ExecutionEvent>,
    token: CancellationToken,
    worker: ScopedJoinHandle<'scope, ()>,
    outcome: Option<Outcome>,
}

impl<'scope> Execution<'scope> {
    pub fn request_cancel(&self) {
        self.token.request_cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Block for the next event. Returns `None` once the outcome has been
    /// delivered and the worker has hung up.
    pub fn next_event(&mut self) -> Option<ExecutionEvent> {
        let event = self.events.recv().ok()?;
        self.remember(&event);
        Some(event)
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&mut self) -> Option<ExecutionEvent> {
        match self.events.try_recv() {
            Ok(event) => {
                self.remember(&event);
                Some(event)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Wait for the worker, forwarding remaining progress events, and return
    /// the outcome.
    pub fn wait(mut self, mut on_progress: impl FnMut(&ProgressEvent)) -> Outcome {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => loop {
                match self.events.recv() {
                    Ok(ExecutionEvent::Progress(event)) => on_progress(&event),
                    Ok(ExecutionEvent::Finished(outcome)) => break outcome,
                    Err(_) => break Outcome::Failure(WORKER_LOST_MESSAGE.to_string()),
                }
            },
        };

        if self.worker.join().is_err() {
            tracing::error!("Operation worker panicked");
        }
        outcome
    }

    fn remember(&mut self, event: &ExecutionEvent) {
        if let ExecutionEvent::Finished(outcome) = event {
            self.outcome = Some(outcome.clone());
        }
    }
}
