//! Reference in-memory triple store implementing the codec traits.
//!
//! Content lives in an `Arc<Vec<Triple>>` so cursors handed out by
//! [`MemoryStore::search`] stay lazy without borrowing the store.

pub mod archive;
pub mod ntriples;
pub mod serializer;

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::{ResultCursor, Serializer, Triple, TripleSource, TripleStore};
use crate::error::StageError;
use crate::notation::Notation;
use crate::progress::ProgressSink;

use self::serializer::TextSerializer;

/// Resource limits applied while loading.
#[derive(Debug, Clone)]
pub struct StoreLimits {
    pub max_input_size_bytes: u64,
    pub max_compression_ratio: u64,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_input_size_bytes: 2 * 1024 * 1024 * 1024,
            max_compression_ratio: 100,
        }
    }
}

impl StoreLimits {
    pub fn check_input_size(&self, path: &Path) -> Result<(), StageError> {
        let size = std::fs::metadata(path)?.len();
        if size > self.max_input_size_bytes {
            return Err(StageError::Oversized {
                name: path.display().to_string(),
                size_mb: size / (1024 * 1024),
                limit_mb: self.max_input_size_bytes / (1024 * 1024),
            });
        }
        Ok(())
    }

    pub fn check_compression_ratio(
        &self,
        compressed: u64,
        uncompressed: u64,
    ) -> Result<(), StageError> {
        if compressed == 0 {
            return if uncompressed == 0 {
                Ok(())
            } else {
                Err(StageError::Corrupt("empty compressed payload".to_string()))
            };
        }
        let ratio = uncompressed / compressed;
        if ratio > self.max_compression_ratio {
            return Err(StageError::Corrupt(format!(
                "decompression ratio {}:1 exceeds limit {}:1",
                ratio, self.max_compression_ratio
            )));
        }
        Ok(())
    }
}

/// Information derived from the store's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub triples: u64,
    pub subjects: u64,
    pub predicates: u64,
    pub objects: u64,
    pub predicate_counts: BTreeMap<String, u64>,
}

/// Match pattern for [`MemoryStore::search`]; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
}

impl TriplePattern {
    /// Build from user input where empty or `?` means "any".
    pub fn from_parts(subject: &str, predicate: &str, object: &str) -> Self {
        fn part(s: &str) -> Option<String> {
            let s = s.trim();
            if s.is_empty() || s == "?" {
                None
            } else {
                Some(s.to_string())
            }
        }
        Self {
            subject: part(subject),
            predicate: part(predicate),
            object: part(object),
        }
    }

    pub fn matches(&self, triple: &Triple) -> bool {
        fn term(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |w| w == have)
        }
        term(&self.subject, &triple.subject)
            && term(&self.predicate, &triple.predicate)
            && term(&self.object, &triple.object)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    triples: Arc<Vec<Triple>>,
    info: Option<StoreInfo>,
    limits: StoreLimits,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn from_triples(triples: Vec<Triple>) -> Self {
        Self {
            triples: Arc::new(triples),
            ..Self::default()
        }
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    /// Derived information; `None` until `load_derived_metadata` has run on
    /// the current content.
    pub fn info(&self) -> Option<&StoreInfo> {
        self.info.as_ref()
    }

    /// Lazy cursor over matching triples plus the exact match count.
    pub fn search(&self, pattern: TriplePattern) -> (ResultCursor, u64) {
        let count = self.triples.iter().filter(|t| pattern.matches(t)).count() as u64;
        let triples = Arc::clone(&self.triples);
        let cursor = ResultCursor::new(
            (0..triples.len())
                .map(move |i| triples[i].clone())
                .filter(move |t| pattern.matches(t)),
        );
        (cursor, count)
    }

    fn replace(&mut self, triples: Vec<Triple>) {
        tracing::debug!(triples = triples.len(), "Store content replaced");
        self.triples = Arc::new(triples);
        self.info = None;
    }
}

impl TripleSource for MemoryStore {
    fn len(&self) -> u64 {
        self.triples.len() as u64
    }

    fn cursor(&self) -> ResultCursor {
        let triples = Arc::clone(&self.triples);
        ResultCursor::new((0..triples.len()).map(move |i| triples[i].clone()))
    }
}

impl TripleStore for MemoryStore {
    fn load_binary(&mut self, path: &Path, progress: &dyn ProgressSink) -> Result<(), StageError> {
        let triples = archive::read(path, &self.limits, progress)?;
        self.replace(triples);
        Ok(())
    }

    fn load_text(
        &mut self,
        path: &Path,
        notation: Notation,
        base_uri: &str,
        progress: &dyn ProgressSink,
    ) -> Result<(), StageError> {
        self.limits.check_input_size(path)?;
        let base = Some(base_uri).filter(|b| !b.is_empty());
        let triples = match notation {
            Notation::NTriples => read_ntriples(path, base, progress)?,
            Notation::Json => read_json(path, base, progress)?,
            other => {
                return Err(StageError::Unsupported(format!(
                    "reading {other} is not supported; supported notations: ntriples, json"
                )))
            }
        };
        self.replace(triples);
        Ok(())
    }

    fn load_derived_metadata(&mut self, progress: &dyn ProgressSink) -> Result<(), StageError> {
        progress.report(0.0, "Computing statistics").check()?;

        let total = self.triples.len() as u64;
        let interval = report_interval(total);
        let mut subjects = HashSet::new();
        let mut objects = HashSet::new();
        let mut predicate_counts: BTreeMap<String, u64> = BTreeMap::new();

        for (i, triple) in self.triples.iter().enumerate() {
            subjects.insert(triple.subject.as_str());
            objects.insert(triple.object.as_str());
            *predicate_counts.entry(triple.predicate.clone()).or_default() += 1;
            let done = i as u64 + 1;
            if done % interval == 0 {
                progress
                    .report(done as f32 * 100.0 / total as f32, "Computing statistics")
                    .check()?;
            }
        }

        let info = StoreInfo {
            triples: total,
            subjects: subjects.len() as u64,
            predicates: predicate_counts.len() as u64,
            objects: objects.len() as u64,
            predicate_counts,
        };
        self.info = Some(info);
        progress.report(100.0, "Statistics ready").check()?;
        Ok(())
    }

    fn save_binary(&self, path: &Path, progress: &dyn ProgressSink) -> Result<(), StageError> {
        archive::write(path, &self.triples, progress)
    }

    fn make_serializer(
        &self,
        path: &Path,
        notation: Notation,
    ) -> Result<Box<dyn Serializer>, StageError> {
        Ok(Box::new(TextSerializer::create(path, notation)?))
    }
}

/// Rows between progress reports: about one report per percent, never zero.
pub fn report_interval(total: u64) -> u64 {
    (total / 100).clamp(1, 10_000)
}

fn read_ntriples(
    path: &Path,
    base: Option<&str>,
    progress: &dyn ProgressSink,
) -> Result<Vec<Triple>, StageError> {
    let total_bytes = std::fs::metadata(path)?.len().max(1);
    let reader = BufReader::new(File::open(path)?);
    progress.report(0.0, "Parsing N-Triples").check()?;

    let mut triples = Vec::new();
    let mut consumed: u64 = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        consumed += line.len() as u64 + 1;
        if let Some(triple) = ntriples::parse_line(&line, idx + 1, base)? {
            triples.push(triple);
        }
        if (idx + 1) % 1000 == 0 {
            let pct = consumed as f32 * 100.0 / total_bytes as f32;
            progress.report(pct, "Parsing N-Triples").check()?;
        }
    }

    progress.report(100.0, "Parsed").check()?;
    Ok(triples)
}

fn read_json(
    path: &Path,
    base: Option<&str>,
    progress: &dyn ProgressSink,
) -> Result<Vec<Triple>, StageError> {
    progress.report(0.0, "Reading JSON").check()?;
    let raw: Vec<Triple> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    progress.report(50.0, "Resolving terms").check()?;

    let total = raw.len() as u64;
    let interval = report_interval(total);
    let mut triples = Vec::with_capacity(raw.len());
    for (i, t) in raw.into_iter().enumerate() {
        let line = format!("{} {} {} .", t.subject, t.predicate, t.object);
        match ntriples::parse_line(&line, i + 1, base)? {
            Some(triple) => triples.push(triple),
            None => {
                return Err(StageError::Syntax {
                    line: i + 1,
                    detail: "empty triple".to_string(),
                })
            }
        }
        let done = i as u64 + 1;
        if done % interval == 0 {
            progress
                .report(50.0 + done as f32 * 50.0 / total as f32, "Resolving terms")
                .check()?;
        }
    }

    progress.report(100.0, "Parsed").check()?;
    Ok(triples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{Flow, NoopProgress};
    use std::cell::Cell;

    fn sample_store() -> MemoryStore {
        MemoryStore::from_triples(vec![
            Triple::new("<http://a>", "<http://knows>", "<http://b>"),
            Triple::new("<http://a>", "<http://name>", "\"A\""),
            Triple::new("<http://b>", "<http://knows>", "<http://a>"),
        ])
    }

    /// Aborts from the nth report on.
    struct AbortAfter {
        remaining: Cell<u32>,
    }

    impl ProgressSink for AbortAfter {
        fn report(&self, _percent: f32, _label: &str) -> Flow {
            match self.remaining.get() {
                0 => Flow::Abort,
                n => {
                    self.remaining.set(n - 1);
                    Flow::Continue
                }
            }
        }
    }

    #[test]
    fn derived_metadata_counts_terms() {
        let mut store = sample_store();
        assert!(store.info().is_none());
        store.load_derived_metadata(&NoopProgress).unwrap();
        let info = store.info().unwrap();
        assert_eq!(info.triples, 3);
        assert_eq!(info.subjects, 2);
        assert_eq!(info.predicates, 2);
        assert_eq!(info.objects, 3);
        assert_eq!(info.predicate_counts.get("<http://knows>"), Some(&2));
    }

    #[test]
    fn search_filters_lazily() {
        let store = sample_store();
        let (cursor, count) = store.search(TriplePattern::from_parts("?", "<http://knows>", ""));
        assert_eq!(count, 2);
        assert_eq!(cursor.count(), 2);

        let (cursor, count) = store.search(TriplePattern::from_parts("<http://zzz>", "", ""));
        assert_eq!(count, 0);
        assert_eq!(cursor.count(), 0);
    }

    #[test]
    fn text_import_resolves_base_and_resets_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.nt");
        std::fs::write(
            &path,
            "# header\n<alice> <knows> <bob> .\n\n<bob> <name> \"Bob\" .\n",
        )
        .unwrap();

        let mut store = sample_store();
        store.load_derived_metadata(&NoopProgress).unwrap();
        store
            .load_text(&path, Notation::NTriples, "http://ex.org/", &NoopProgress)
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.triples()[0].subject, "<http://ex.org/alice>");
        assert!(store.info().is_none());
    }

    #[test]
    fn json_import_reads_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.json");
        std::fs::write(
            &path,
            r#"[{"subject":"<s>","predicate":"<http://p>","object":"\"v\""}]"#,
        )
        .unwrap();
        let mut store = MemoryStore::new();
        store.load_text(&path, Notation::Json, "http://e/", &NoopProgress).unwrap();
        assert_eq!(store.triples()[0].subject, "<http://e/s>");
    }

    #[test]
    fn syntax_error_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.nt");
        std::fs::write(
            &path,
            "<http://a> <http://p> <http://b> .\n<http://a> <http://p>\n",
        )
        .unwrap();
        let mut store = sample_store();
        let err = store
            .load_text(&path, Notation::NTriples, "", &NoopProgress)
            .unwrap_err();
        assert!(matches!(err, StageError::Syntax { line: 2, .. }));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn turtle_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.ttl");
        std::fs::write(&path, "").unwrap();
        let err = MemoryStore::new()
            .load_text(&path, Notation::Turtle, "", &NoopProgress)
            .unwrap_err();
        assert!(matches!(err, StageError::Unsupported(_)));
    }

    #[test]
    fn abort_unwinds_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.hdt");
        sample_store().save_binary(&path, &NoopProgress).unwrap();

        let mut store = MemoryStore::new();
        let sink = AbortAfter { remaining: Cell::new(1) };
        let err = store.load_binary(&path, &sink).unwrap_err();
        assert!(err.is_cancelled());
        assert!(store.is_empty());
    }

    #[test]
    fn oversized_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.nt");
        std::fs::write(&path, "<a:s> <a:p> <a:o> .\n").unwrap();
        let mut store = MemoryStore::with_limits(StoreLimits {
            max_input_size_bytes: 4,
            ..StoreLimits::default()
        });
        let err = store
            .load_text(&path, Notation::NTriples, "", &NoopProgress)
            .unwrap_err();
        assert!(matches!(err, StageError::Oversized { .. }));
    }

    #[test]
    fn compression_ratio_limits() {
        let limits = StoreLimits::default();
        assert!(limits.check_compression_ratio(0, 0).is_ok());
        assert!(limits.check_compression_ratio(100, 5_000).is_ok());
        assert!(limits.check_compression_ratio(10, 100_000).is_err());
    }

    #[test]
    fn report_interval_is_never_zero() {
        assert_eq!(report_interval(0), 1);
        assert_eq!(report_interval(50), 1);
        assert_eq!(report_interval(5_000), 50);
        assert_eq!(report_interval(u64::MAX), 10_000);
    }
}
