//! Line-oriented N-Triples parsing.

use crate::codec::Triple;
use crate::error::StageError;

/// Parse one line. Blank lines and comments yield `Ok(None)`.
///
/// Relative IRIs (no scheme) are prefixed with `base_uri` when one is given.
pub fn parse_line(
    line: &str,
    line_no: usize,
    base_uri: Option<&str>,
) -> Result<Option<Triple>, StageError> {
    let rest = line.trim();
    if rest.is_empty() || rest.starts_with('#') {
        return Ok(None);
    }

    let syntax = |detail: &str| StageError::Syntax {
        line: line_no,
        detail: detail.to_string(),
    };

    let (subject, rest) = take_term(rest).map_err(|d| syntax(&d))?;
    if !(subject.starts_with('<') || subject.starts_with("_:")) {
        return Err(syntax("subject must be an IRI or blank node"));
    }
    let (predicate, rest) = take_term(rest.trim_start()).map_err(|d| syntax(&d))?;
    if !predicate.starts_with('<') {
        return Err(syntax("predicate must be an IRI"));
    }
    let (object, rest) = take_term(rest.trim_start()).map_err(|d| syntax(&d))?;

    let rest = rest.trim_start();
    let rest = rest.strip_prefix('.').ok_or_else(|| syntax("expected '.'"))?;
    let rest = rest.trim_start();
    if !(rest.is_empty() || rest.starts_with('#')) {
        return Err(syntax("unexpected content after '.'"));
    }

    Ok(Some(Triple {
        subject: resolve(subject, base_uri),
        predicate: resolve(predicate, base_uri),
        object: resolve(object, base_uri),
    }))
}

/// Prefix a relative `<iri>` term with `base_uri`; other terms pass through.
pub fn resolve(term: &str, base_uri: Option<&str>) -> String {
    match (base_uri, iri_body(term)) {
        (Some(base), Some(body)) if !has_scheme(body) => format!("<{}{}>", base, body),
        _ => term.to_string(),
    }
}

fn iri_body(term: &str) -> Option<&str> {
    term.strip_prefix('<')?.strip_suffix('>')
}

fn has_scheme(iri: &str) -> bool {
    match iri.find(':') {
        Some(idx) => {
            let scheme = &iri[..idx];
            !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Split the next term off `input`, returning `(term, remainder)`.
fn take_term(input: &str) -> Result<(&str, &str), String> {
    if input.starts_with('<') {
        let end = input.find('>').ok_or("unterminated IRI")?;
        let body = &input[1..end];
        if body.chars().any(char::is_whitespace) {
            return Err("whitespace inside IRI".to_string());
        }
        return Ok(input.split_at(end + 1));
    }

    if input.starts_with("_:") {
        let end = input
            .find(|c: char| c.is_whitespace() || matches!(c, '<' | '"'))
            .unwrap_or(input.len());
        // A label may contain '.' but never end with one.
        let end = input[..end].trim_end_matches('.').len();
        if end <= 2 {
            return Err("empty blank node label".to_string());
        }
        return Ok(input.split_at(end));
    }

    if input.starts_with('"') {
        let close = closing_quote(input).ok_or("unterminated literal")?;
        let after = &input[close + 1..];
        let suffix_len = if let Some(tag) = after.strip_prefix('@') {
            let len = tag
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                .unwrap_or(tag.len());
            if len == 0 {
                return Err("empty language tag".to_string());
            }
            1 + len
        } else if after.starts_with("^^<") {
            let end = after.find('>').ok_or("unterminated datatype IRI")?;
            end + 1
        } else {
            0
        };
        return Ok(input.split_at(close + 1 + suffix_len));
    }

    if input.is_empty() {
        Err("unexpected end of line".to_string())
    } else {
        Err(format!("unexpected character '{}'", input.chars().next().unwrap_or(' ')))
    }
}

/// Byte index of the quote closing the literal that opens `input`.
fn closing_quote(input: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in input.char_indices().skip(1) {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return Some(idx),
            _ => escaped = false,
        }
    }
    None
}
