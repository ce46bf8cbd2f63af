//! Operation configuration: which kind of work to run, with which
//! parameters, against which store.
//!
//! An [`Operation`] is built around a borrowed store and configured exactly
//! once. Each `configure_*` call consumes it and yields a
//! [`ConfiguredOperation`], so conflicting setup calls cannot be expressed.

use std::path::{Path, PathBuf};

use crate::cancel::CancellationToken;
use crate::codec::{ResultCursor, TripleStore};
use crate::notation::Notation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ImportBinary,
    ImportText,
    ExportBinary,
    ExportText,
    ExportResults,
}

impl OperationKind {
    /// Human-readable title for progress displays.
    pub fn title(&self) -> &'static str {
        match self {
            OperationKind::ImportBinary => "Loading HDT file",
            OperationKind::ImportText => "Importing RDF file to HDT",
            OperationKind::ExportBinary => "Saving HDT file",
            OperationKind::ExportText => "Exporting HDT file to RDF",
            OperationKind::ExportResults => "Exporting results to RDF",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// The parameters of one operation. Each variant carries only what its kind reads.
#[derive(Debug)]
pub enum Task {
    ImportBinary {
        path: PathBuf,
    },
    ImportText {
        path: PathBuf,
        notation: Notation,
        base_uri: String,
    },
    ExportBinary {
        path: PathBuf,
    },
    ExportText {
        path: PathBuf,
        notation: Notation,
    },
    ExportResults {
        path: PathBuf,
        cursor: ResultCursor,
        expected_count: u64,
        notation: Notation,
    },
}

impl Task {
    pub fn kind(&self) -> OperationKind {
        match self {
            Task::ImportBinary { .. } => OperationKind::ImportBinary,
            Task::ImportText { .. } => OperationKind::ImportText,
            Task::ExportBinary { .. } => OperationKind::ExportBinary,
            Task::ExportText { .. } => OperationKind::ExportText,
            Task::ExportResults { .. } => OperationKind::ExportResults,
        }
    }

    /// Source for imports, target for exports.
    pub fn path(&self) -> &Path {
        match self {
            Task::ImportBinary { path }
            | Task::ImportText { path, .. }
            | Task::ExportBinary { path }
            | Task::ExportText { path, .. }
            | Task::ExportResults { path, .. } => path,
        }
    }
}

/// An unconfigured operation holding a non-owning reference to its store.
pub struct Operation<'s, S: TripleStore> {
    store: &'s mut S,
}

impl<'s, S: TripleStore> Operation<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    pub fn configure_import_binary(self, path: impl Into<PathBuf>) -> ConfiguredOperation<'s, S> {
        self.configure(Task::ImportBinary { path: path.into() })
    }

    pub fn configure_import_text(
        self,
        path: impl Into<PathBuf>,
        notation: Notation,
        base_uri: impl Into<String>,
    ) -> ConfiguredOperation<'s, S> {
        self.configure(Task::ImportText {
            path: path.into(),
            notation,
            base_uri: base_uri.into(),
        })
    }

    pub fn configure_export_binary(self, path: impl Into<PathBuf>) -> ConfiguredOperation<'s, S> {
        self.configure(Task::ExportBinary { path: path.into() })
    }

    pub fn configure_export_text(
        self,
        path: impl Into<PathBuf>,
        notation: Notation,
    ) -> ConfiguredOperation<'s, S> {
        self.configure(Task::ExportText {
            path: path.into(),
            notation,
        })
    }

    pub fn configure_export_results(
        self,
        path: impl Into<PathBuf>,
        cursor: ResultCursor,
        expected_count: u64,
        notation: Notation,
    ) -> ConfiguredOperation<'s, S> {
        self.configure(Task::ExportResults {
            path: path.into(),
            cursor,
            expected_count,
            notation,
        })
    }

    fn configure(self, task: Task) -> ConfiguredOperation<'s, S> {
        ConfiguredOperation {
            store: self.store,
            task,
            token: CancellationToken::new(),
        }
    }
}

/// An operation ready to execute once.
pub struct ConfiguredOperation<'s, S: TripleStore> {
    pub(crate) store: &'s mut S,
    pub(crate) task: Task,
    pub(crate) token: CancellationToken,
}

impl<'s, S: TripleStore> ConfiguredOperation<'s, S> {
    pub fn kind(&self) -> OperationKind {
        self.task.kind()
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The token the executor will poll. Clone it before execution to cancel
    /// from another thread.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Use a token created by the coordinator, e.g. one already wired to a
    /// signal handler.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }
}
