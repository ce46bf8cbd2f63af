//! Binary store container: a zip archive holding a JSON header and a
//! deflated N-Triples payload, checked with SHA-256.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::codec::Triple;
use crate::error::StageError;
use crate::progress::ProgressSink;
use crate::store::{ntriples, report_interval, StoreLimits};

pub const FORMAT_VERSION: u32 = 1;
const HEADER_ENTRY: &str = "header.json";
const PAYLOAD_ENTRY: &str = "triples.nt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveHeader {
    pub version: u32,
    pub triples: u64,
    pub sha256: String,
}

pub fn write(
    path: &Path,
    triples: &[Triple],
    progress: &dyn ProgressSink,
) -> Result<(), StageError> {
    progress.report(0.0, "Encoding triples").check()?;

    let total = triples.len();
    let interval = report_interval(total as u64) as usize;
    let mut payload = String::new();
    for (i, triple) in triples.iter().enumerate() {
        payload.push_str(&triple.to_string());
        payload.push('\n');
        if (i + 1) % interval == 0 {
            let pct = (i + 1) as f32 * 90.0 / total as f32;
            progress.report(pct, "Encoding triples").check()?;
        }
    }

    let header = ArchiveHeader {
        version: FORMAT_VERSION,
        triples: total as u64,
        sha256: sha256_hex(payload.as_bytes()),
    };

    progress.report(90.0, "Writing archive").check()?;
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    zip.start_file(
        HEADER_ENTRY,
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
    )?;
    zip.write_all(serde_json::to_string_pretty(&header)?.as_bytes())?;
    zip.start_file(
        PAYLOAD_ENTRY,
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
    )?;
    zip.write_all(payload.as_bytes())?;
    zip.finish()?.flush()?;

    progress.report(100.0, "Saved").check()?;
    Ok(())
}

pub fn read(
    path: &Path,
    limits: &StoreLimits,
    progress: &dyn ProgressSink,
) -> Result<Vec<Triple>, StageError> {
    limits.check_input_size(path)?;
    progress.report(0.0, "Opening archive").check()?;

    let mut archive = ZipArchive::new(File::open(path)?)?;

    let header: ArchiveHeader = {
        let mut entry = archive
            .by_name(HEADER_ENTRY)
            .map_err(|_| StageError::Corrupt(format!("missing {HEADER_ENTRY}")))?;
        let mut raw = String::new();
        entry.read_to_string(&mut raw)?;
        serde_json::from_str(&raw)?
    };
    if header.version != FORMAT_VERSION {
        return Err(StageError::Unsupported(format!(
            "archive format version {} (expected {})",
            header.version, FORMAT_VERSION
        )));
    }

    let payload = {
        let mut entry = archive
            .by_name(PAYLOAD_ENTRY)
            .map_err(|_| StageError::Corrupt(format!("missing {PAYLOAD_ENTRY}")))?;
        limits.check_compression_ratio(entry.compressed_size(), entry.size())?;
        let mut raw = String::new();
        entry.read_to_string(&mut raw)?;
        raw
    };
    progress.report(20.0, "Verifying checksum").check()?;

    if sha256_hex(payload.as_bytes()) != header.sha256 {
        return Err(StageError::Corrupt("payload checksum mismatch".to_string()));
    }

    // Each triple occupies one payload line.
    let lines = payload.lines().count() as u64;
    if header.triples > lines {
        return Err(StageError::Corrupt(format!(
            "header declares {} triples, payload has {} lines",
            header.triples, lines
        )));
    }

    let interval = report_interval(header.triples);
    let mut triples = Vec::with_capacity(header.triples as usize);
    for (idx, line) in payload.lines().enumerate() {
        if let Some(triple) = ntriples::parse_line(line, idx + 1, None)? {
            triples.push(triple);
            let done = triples.len() as u64;
            if done % interval == 0 {
                let pct = 20.0 + done as f32 * 80.0 / header.triples.max(1) as f32;
                progress.report(pct, "Decoding triples").check()?;
            }
        }
    }

    if triples.len() as u64 != header.triples {
        return Err(StageError::Corrupt(format!(
            "header declares {} triples, payload holds {}",
            header.triples,
            triples.len()
        )));
    }

    progress.report(100.0, "Loaded").check()?;
    Ok(triples)
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;

    fn sample() -> Vec<Triple> {
        vec![
            Triple::new("<http://a>", "<http://p>", "<http://b>"),
            Triple::new("<http://a>", "<http://q>", "\"x\"@en"),
        ]
    }

    #[test]
    fn write_then_read_restores_triples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.hdt");
        write(&path, &sample(), &NoopProgress).unwrap();
        let back = read(&path, &StoreLimits::default(), &NoopProgress).unwrap();
        assert_eq!(back, sample());
    }

    const ONE_TRIPLE: &[u8] = b"<http://a> <http://p> <http://b> .\n";

    fn write_raw(path: &Path, header: &ArchiveHeader, payload: &[u8]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        zip.start_file(HEADER_ENTRY, SimpleFileOptions::default()).unwrap();
        zip.write_all(serde_json::to_string(header).unwrap().as_bytes()).unwrap();
        zip.start_file(PAYLOAD_ENTRY, SimpleFileOptions::default()).unwrap();
        zip.write_all(payload).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.hdt");
        let header = ArchiveHeader {
            version: FORMAT_VERSION,
            triples: 1,
            sha256: "00".to_string(),
        };
        write_raw(&path, &header, ONE_TRIPLE);

        let err = read(&path, &StoreLimits::default(), &NoopProgress).unwrap_err();
        assert!(matches!(err, StageError::Corrupt(_)), "got {err:?}");
    }

    #[test]
    fn oversized_header_count_is_corrupt_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.hdt");
        let header = ArchiveHeader {
            version: FORMAT_VERSION,
            triples: u64::MAX,
            sha256: sha256_hex(ONE_TRIPLE),
        };
        write_raw(&path, &header, ONE_TRIPLE);

        let err = read(&path, &StoreLimits::default(), &NoopProgress).unwrap_err();
        assert!(matches!(err, StageError::Corrupt(_)), "got {err:?}");
        assert!(err.to_string().contains("payload has 1 lines"));
    }

    #[test]
    fn corrupt_count_reaches_the_coordinator_as_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.hdt");
        let header = ArchiveHeader {
            version: FORMAT_VERSION,
            triples: u64::MAX,
            sha256: sha256_hex(ONE_TRIPLE),
        };
        write_raw(&path, &header, ONE_TRIPLE);

        let mut store = crate::store::MemoryStore::new();
        let outcome = crate::operation::Operation::new(&mut store)
            .configure_import_binary(&path)
            .run(|_| {});
        let message = outcome.message().unwrap_or_default();
        assert!(message.starts_with("Corrupt archive"), "got {message:?}");
    }

    #[test]
    fn not_a_zip_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.hdt");
        std::fs::write(&path, b"plain text").unwrap();
        let err = read(&path, &StoreLimits::default(), &NoopProgress).unwrap_err();
        assert!(matches!(err, StageError::Archive(_)));
    }
}
