//! Runs a configured operation's stages, drives progress through per-stage
//! range scalers and turns the result into exactly one [`Outcome`].

use std::cell::Cell;
use std::sync::mpsc::Sender;

use crate::cancel::CancellationToken;
use crate::codec::TripleStore;
use crate::error::{OperationError, StageError};
use crate::operation::{ConfiguredOperation, Task};
use crate::progress::{to_event_percent, Flow, ProgressEvent, ProgressSink, RangeScaler, ScaledSink};

/// Outer `(lo, hi)` ranges of the load and derived-metadata stages.
pub const IMPORT_BINARY_RANGES: [(f32, f32); 2] = [(0.0, 70.0), (70.0, 100.0)];
pub const IMPORT_TEXT_RANGES: [(f32, f32); 2] = [(0.0, 90.0), (90.0, 100.0)];
const FULL_RANGE: (f32, f32) = (0.0, 100.0);

/// Terminal result of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// The failure message, `None` on success.
    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(msg) => Some(msg),
        }
    }
}

/// Everything the executor tells its observer, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    Progress(ProgressEvent),
    Finished(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Running,
    Completed,
    /// Also covers cancellation.
    Failed,
}

impl ExecutorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorState::Idle => "idle",
            ExecutorState::Running => "running",
            ExecutorState::Completed => "completed",
            ExecutorState::Failed => "failed",
        }
    }
}

pub struct Executor<'s, S: TripleStore> {
    store: &'s mut S,
    task: Option<Task>,
    token: CancellationToken,
    events: Sender<ExecutionEvent>,
    state: ExecutorState,
}

impl<'s, S: TripleStore> Executor<'s, S> {
    pub fn new(operation: ConfiguredOperation<'s, S>, events: Sender<ExecutionEvent>) -> Self {
        Self {
            store: operation.store,
            task: Some(operation.task),
            token: operation.token,
            events,
            state: ExecutorState::Idle,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Run every stage on the calling thread and emit the outcome.
    ///
    /// Only valid once; a second call returns [`OperationError::InvalidState`]
    /// and emits nothing.
    pub fn execute(&mut self) -> Result<Outcome, OperationError> {
        let task = match (self.state, self.task.take()) {
            (ExecutorState::Idle, Some(task)) => task,
            (state, task) => {
                self.task = task;
                return Err(OperationError::InvalidState {
                    expected: ExecutorState::Idle.as_str(),
                    actual: state.as_str(),
                });
            }
        };

        let kind = task.kind();
        self.state = ExecutorState::Running;
        tracing::info!(operation = %kind, path = %task.path().display(), "Operation started");

        let sink = ChannelSink::new(&self.token, &self.events);
        let result = match run_task(&mut *self.store, task, &sink) {
            // A stage that ignored an abort still ends cancelled.
            Ok(()) if sink.observed_cancel() => Err(StageError::Cancelled),
            other => other,
        };

        let outcome = match result {
            Ok(()) => {
                self.state = ExecutorState::Completed;
                tracing::info!(operation = %kind, "Operation completed");
                Outcome::Success
            }
            Err(e) => {
                self.state = ExecutorState::Failed;
                tracing::warn!(operation = %kind, error = %e, "Operation failed");
                Outcome::Failure(e.to_string())
            }
        };

        // The observer may already be gone; the outcome is still returned.
        let _ = self.events.send(ExecutionEvent::Finished(outcome.clone()));
        Ok(outcome)
    }
}

fn run_task<S: TripleStore>(
    store: &mut S,
    task: Task,
    sink: &dyn ProgressSink,
) -> Result<(), StageError> {
    match task {
        Task::ImportBinary { path } => {
            stage(sink, IMPORT_BINARY_RANGES[0], |p| store.load_binary(&path, p))?;
            stage(sink, IMPORT_BINARY_RANGES[1], |p| store.load_derived_metadata(p))
        }
        Task::ImportText {
            path,
            notation,
            base_uri,
        } => {
            stage(sink, IMPORT_TEXT_RANGES[0], |p| {
                store.load_text(&path, notation, &base_uri, p)
            })?;
            stage(sink, IMPORT_TEXT_RANGES[1], |p| store.load_derived_metadata(p))
        }
        Task::ExportBinary { path } => stage(sink, FULL_RANGE, |p| store.save_binary(&path, p)),
        Task::ExportText { path, notation } => stage(sink, FULL_RANGE, |p| {
            let mut serializer = store.make_serializer(&path, notation)?;
            serializer.serialize_all(&*store, p)?;
            serializer.finish()
        }),
        Task::ExportResults {
            path,
            cursor,
            expected_count,
            notation,
        } => stage(sink, FULL_RANGE, |p| {
            // On acquisition failure the cursor is dropped here with the closure.
            let mut serializer = store.make_serializer(&path, notation)?;
            serializer.serialize(cursor, p, expected_count)?;
            serializer.finish()
        }),
    }
}

fn stage<F>(sink: &dyn ProgressSink, (lo, hi): (f32, f32), call: F) -> Result<(), StageError>
where
    F: FnOnce(&dyn ProgressSink) -> Result<(), StageError>,
{
    tracing::debug!(lo, hi, "Stage started");
    let scaled = ScaledSink::new(sink, RangeScaler::new(lo, hi));
    call(&scaled)
}

/// The executor's own sink: polls the token, keeps the outer percent
/// non-decreasing and forwards events to the observer channel.
struct ChannelSink<'a> {
    token: &'a CancellationToken,
    events: &'a Sender<ExecutionEvent>,
    last_percent: Cell<u8>,
    aborted: Cell<bool>,
}

impl<'a> ChannelSink<'a> {
    fn new(token: &'a CancellationToken, events: &'a Sender<ExecutionEvent>) -> Self {
        Self {
            token,
            events,
            last_percent: Cell::new(0),
            aborted: Cell::new(false),
        }
    }

    fn observed_cancel(&self) -> bool {
        self.aborted.get()
    }
}

impl ProgressSink for ChannelSink<'_> {
    fn report(&self, percent: f32, label: &str) -> Flow {
        if self.aborted.get() {
            return Flow::Abort;
        }
        if self.token.is_set() {
            tracing::debug!("Cancellation observed at progress report");
            self.aborted.set(true);
            return Flow::Abort;
        }

        let percent = to_event_percent(percent).max(self.last_percent.get());
        self.last_percent.set(percent);
        let _ = self.events.send(ExecutionEvent::Progress(ProgressEvent {
            percent,
            label: label.to_string(),
        }));
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use crate::store::MemoryStore;
    use std::sync::mpsc;

    #[test]
    fn second_execute_is_rejected_without_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let op = Operation::new(&mut store).configure_export_binary(dir.path().join("out.hdt"));
        let (tx, rx) = mpsc::channel();
        let mut executor = Executor::new(op, tx);

        assert_eq!(executor.execute().unwrap(), Outcome::Success);
        assert_eq!(executor.state(), ExecutorState::Completed);
        let err = executor.execute().unwrap_err();
        assert!(matches!(
            err,
            OperationError::InvalidState { actual: "completed", .. }
        ));
        drop(executor);

        let finished = rx
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::Finished(_)))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn failure_moves_to_failed_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let op = Operation::new(&mut store).configure_import_binary(dir.path().join("missing.hdt"));
        let (tx, _rx) = mpsc::channel();
        let mut executor = Executor::new(op, tx);
        let outcome = executor.execute().unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.message().is_some());
        assert_eq!(executor.state(), ExecutorState::Failed);
    }

    #[test]
    fn channel_sink_holds_percent_non_decreasing() {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(&token, &tx);
        assert_eq!(sink.report(40.0, "a"), Flow::Continue);
        assert_eq!(sink.report(20.0, "b"), Flow::Continue);
        drop(tx);
        let percents: Vec<u8> = rx
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::Progress(p) => Some(p.percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![40, 40]);
    }

    #[test]
    fn channel_sink_stays_aborted() {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(&token, &tx);
        token.request_cancel();
        assert_eq!(sink.report(10.0, "a"), Flow::Abort);
        assert_eq!(sink.report(20.0, "b"), Flow::Abort);
        assert!(sink.observed_cancel());
        drop(tx);
        assert_eq!(rx.iter().count(), 0);
    }
}
