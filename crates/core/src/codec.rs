//! Capability traits the executor needs from a triple store and its
//! serializers. Implementations are free to be slow; they report progress
//! through the sink they are handed and must unwind with
//! [`StageError::Cancelled`] when the sink answers [`Flow::Abort`].
//!
//! [`Flow::Abort`]: crate::progress::Flow::Abort

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::notation::Notation;
use crate::progress::ProgressSink;

/// One statement. Terms are kept in N-Triples surface syntax
/// (`<iri>`, `_:label`, `"literal"@lang`, `"literal"^^<datatype>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// One-shot lazy sequence of result rows. Move-only; dropping it disposes
/// whatever backs the iteration.
pub struct ResultCursor {
    inner: Box<dyn Iterator<Item = Triple> + Send>,
}

impl ResultCursor {
    pub fn new(inner: impl Iterator<Item = Triple> + Send + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for ResultCursor {
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        self.inner.next()
    }
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor").finish_non_exhaustive()
    }
}

/// Read access to a whole set of triples.
pub trait TripleSource {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh cursor over every triple.
    fn cursor(&self) -> ResultCursor;
}

/// The store an operation acts on.
pub trait TripleStore: TripleSource + Send {
    /// Replace the store's content with the binary resource at `path`.
    fn load_binary(&mut self, path: &Path, progress: &dyn ProgressSink) -> Result<(), StageError>;

    /// Replace the store's content with a text resource, resolving relative
    /// references against `base_uri`.
    fn load_text(
        &mut self,
        path: &Path,
        notation: Notation,
        base_uri: &str,
        progress: &dyn ProgressSink,
    ) -> Result<(), StageError>;

    /// Rebuild cached information derived from the current content.
    fn load_derived_metadata(&mut self, progress: &dyn ProgressSink) -> Result<(), StageError>;

    fn save_binary(&self, path: &Path, progress: &dyn ProgressSink) -> Result<(), StageError>;

    /// Acquire a serializer writing `notation` to `path`. Acquisition may fail.
    fn make_serializer(
        &self,
        path: &Path,
        notation: Notation,
    ) -> Result<Box<dyn Serializer>, StageError>;
}

/// A text writer bound to one target. Dropping the box releases it on every
/// path; [`finish`](Serializer::finish) additionally surfaces flush errors.
pub trait Serializer: Send {
    fn serialize_all(
        &mut self,
        source: &dyn TripleSource,
        progress: &dyn ProgressSink,
    ) -> Result<(), StageError>;

    /// Serialize and consume `cursor`. `expected_count` only drives progress
    /// estimation and may be zero.
    fn serialize(
        &mut self,
        cursor: ResultCursor,
        progress: &dyn ProgressSink,
        expected_count: u64,
    ) -> Result<(), StageError>;

    fn finish(self: Box<Self>) -> Result<(), StageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_displays_as_ntriples_line() {
        let t = Triple::new("<http://a>", "<http://p>", "\"x\"");
        assert_eq!(t.to_string(), "<http://a> <http://p> \"x\" .");
    }

    #[test]
    fn cursor_is_lazy_and_one_shot() {
        let mut cursor =
            ResultCursor::new((0..3).map(|i| Triple::new(format!("<s{i}>"), "<p>", "<o>")));
        assert_eq!(cursor.next().map(|t| t.subject), Some("<s0>".to_string()));
        assert_eq!(cursor.count(), 2);
        assert_eq!(ResultCursor::empty().count(), 0);
    }
}
