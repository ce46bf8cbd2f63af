//! Text serialization dialects for import and export.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Extension used for the binary store format.
pub const BINARY_EXTENSION: &str = "hdt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Notation {
    NTriples,
    Turtle,
    N3,
    RdfXml,
    Json,
}

impl Notation {
    pub fn extension(&self) -> &'static str {
        match self {
            Notation::NTriples => "nt",
            Notation::Turtle => "ttl",
            Notation::N3 => "n3",
            Notation::RdfXml => "rdf",
            Notation::Json => "json",
        }
    }

    /// Parse a user-supplied notation name.
    pub fn parse(s: &str) -> Option<Notation> {
        match s.to_lowercase().as_str() {
            "ntriples" | "n-triples" | "nt" => Some(Notation::NTriples),
            "turtle" | "ttl" => Some(Notation::Turtle),
            "n3" => Some(Notation::N3),
            "rdfxml" | "rdf-xml" | "rdf" | "xml" => Some(Notation::RdfXml),
            "json" => Some(Notation::Json),
            _ => None,
        }
    }

    /// Guess the notation from a file extension. Binary store files yield `None`.
    pub fn from_path(path: &Path) -> Option<Notation> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case(BINARY_EXTENSION) {
            return None;
        }
        Notation::parse(ext)
    }
}

impl std::fmt::Display for Notation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Notation::NTriples => "N-Triples",
            Notation::Turtle => "Turtle",
            Notation::N3 => "N3",
            Notation::RdfXml => "RDF/XML",
            Notation::Json => "JSON",
        };
        f.write_str(name)
    }
}

/// True if the path carries the binary store extension.
pub fn is_binary_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(BINARY_EXTENSION))
}
