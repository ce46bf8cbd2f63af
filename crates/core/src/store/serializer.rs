//! File-backed text serializers for N-Triples and JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::codec::{ResultCursor, Serializer, TripleSource};
use crate::error::StageError;
use crate::notation::Notation;
use crate::progress::ProgressSink;
use crate::store::report_interval;

pub struct TextSerializer {
    path: PathBuf,
    notation: Notation,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl TextSerializer {
    /// Create the target file. Fails for notations without a writer.
    pub fn create(path: &Path, notation: Notation) -> Result<Self, StageError> {
        match notation {
            Notation::NTriples | Notation::Json => {}
            other => {
                return Err(StageError::Unsupported(format!(
                    "writing {other} is not supported; supported notations: ntriples, json"
                )))
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        tracing::debug!(path = %path.display(), %notation, "Serializer acquired");
        Ok(Self {
            path: path.to_path_buf(),
            notation,
            writer: Some(writer),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn write_rows(
        &mut self,
        cursor: ResultCursor,
        progress: &dyn ProgressSink,
        expected: u64,
        label: &str,
    ) -> Result<(), StageError> {
        progress.report(0.0, label).check()?;
        let interval = report_interval(expected);
        let notation = self.notation;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StageError::failed("serializer already released"))?;

        for triple in cursor {
            match notation {
                Notation::Json => {
                    writer.write_all(if self.written == 0 { b"[\n" } else { b",\n" })?;
                    serde_json::to_writer(&mut *writer, &triple)?;
                }
                _ => writeln!(writer, "{}", triple)?,
            }
            self.written += 1;
            if expected > 0 && self.written % interval == 0 {
                let pct = (self.written as f32 * 100.0 / expected as f32).min(100.0);
                progress.report(pct, label).check()?;
            }
        }

        progress.report(100.0, "Export complete").check()?;
        Ok(())
    }
}

impl Serializer for TextSerializer {
    fn serialize_all(
        &mut self,
        source: &dyn TripleSource,
        progress: &dyn ProgressSink,
    ) -> Result<(), StageError> {
        self.write_rows(source.cursor(), progress, source.len(), "Exporting triples")
    }

    fn serialize(
        &mut self,
        cursor: ResultCursor,
        progress: &dyn ProgressSink,
        expected_count: u64,
    ) -> Result<(), StageError> {
        self.write_rows(cursor, progress, expected_count, "Exporting results")
    }

    fn finish(mut self: Box<Self>) -> Result<(), StageError> {
        if let Some(mut writer) = self.writer.take() {
            if self.notation == Notation::Json {
                writer.write_all(if self.written == 0 { b"[]\n" } else { b"\n]\n" })?;
            }
            writer.flush()?;
        }
        tracing::debug!(path = %self.path.display(), rows = self.written, "Serializer finished");
        Ok(())
    }
}

impl Drop for TextSerializer {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
            tracing::debug!(path = %self.path.display(), "Serializer released before finishing");
        }
    }
}
