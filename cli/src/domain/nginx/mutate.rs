//! Pure byte transforms behind the vhost mutator.
//!
//! The filesystem side (backups, atomic replacement) lives in
//! `crate::infra::vhost`; everything here takes file content in and returns
//! content out, preserving every byte it does not deliberately change.

use regex::bytes::Regex;

use super::scan::{self, ParseFailure};

/// Result of planning an insert against a vhost file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPlan {
    /// New file content with the directive added to every matching block.
    Insert { content: Vec<u8>, blocks: usize },
    /// The directive text already occurs in the file.
    AlreadyPresent,
    /// No server block declares the domain on a single-line `server_name`.
    DomainNotFound,
}

/// Plan inserting `directive` right after the first `server_name` line that
/// lists `domain` in each server block.
///
/// # Errors
///
/// Returns a [`ParseFailure`] when brace structure cannot be trusted; in that
/// case nothing about the content should be changed.
pub fn plan_insert(text: &[u8], domain: &str, directive: &str) -> Result<InsertPlan, ParseFailure> {
    scan::check_balance(text)?;

    let directive = directive.as_bytes();
    if contains(text, directive) {
        return Ok(InsertPlan::AlreadyPresent);
    }

    let mut out = Vec::with_capacity(text.len() + directive.len() * 2 + 8);
    let mut in_block = false;
    let mut handled = false;
    let mut depth: i64 = 0;
    let mut blocks = 0;

    for (idx, line) in text.split_inclusive(|&b| b == b'\n').enumerate() {
        let count = scan::count_braces(line).map_err(|reason| ParseFailure {
            line: idx + 1,
            reason: reason.to_string(),
        })?;
        out.extend_from_slice(line);

        if !in_block {
            if scan::opens_server_block(line) {
                depth = count.balance();
                in_block = depth > 0;
                handled = false;
            }
            continue;
        }

        if !handled && count.is_empty() && scan::declares_domain(line, domain) {
            let ending = line_ending(line);
            if ending.is_empty() {
                out.push(b'\n');
            }
            out.extend_from_slice(leading_whitespace(line));
            out.extend_from_slice(directive);
            out.extend_from_slice(if ending.is_empty() { b"\n".as_slice() } else { ending });
            handled = true;
            blocks += 1;
        }

        depth += count.balance();
        if depth <= 0 {
            in_block = false;
        }
    }

    if blocks == 0 {
        return Ok(InsertPlan::DomainNotFound);
    }
    Ok(InsertPlan::Insert {
        content: out,
        blocks,
    })
}

/// Delete every line matching `pattern` (tested without its line terminator).
///
/// Returns `None` when nothing matched so callers can skip the file entirely.
#[must_use]
pub fn remove_matching_lines(text: &[u8], pattern: &Regex) -> Option<(Vec<u8>, usize)> {
    let mut out = Vec::with_capacity(text.len());
    let mut removed = 0;
    for line in text.split_inclusive(|&b| b == b'\n') {
        if pattern.is_match(scan::strip_line_ending(line)) {
            removed += 1;
        } else {
            out.extend_from_slice(line);
        }
    }
    (removed > 0).then_some((out, removed))
}

/// Whole-line pattern for the managed include of one instance, tolerant of
/// whitespace differences left by older runs.
#[must_use]
pub fn include_pattern_for(slug: &str) -> Regex {
    build_include_pattern(&regex::escape(slug))
}

/// Whole-line pattern matching the managed include of any instance.
#[must_use]
pub fn any_include_pattern() -> Regex {
    build_include_pattern("[a-z0-9-]+")
}

/// ASCII-only classes (`(?-u)`) so paths with arbitrary bytes still match.
#[allow(clippy::expect_used)] // Pattern is assembled from escaped input and constants
fn build_include_pattern(slug_pattern: &str) -> Regex {
    let prefix = regex::escape(jmaka_common::MANAGED_PREFIX);
    Regex::new(&format!(
        r"(?-u)^\s*include\s+(\S*/)?{prefix}{slug_pattern}\.conf\s*;\s*$"
    ))
    .expect("valid include pattern")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn line_ending(line: &[u8]) -> &'static [u8] {
    if line.ends_with(b"\r\n") {
        b"\r\n"
    } else if line.ends_with(b"\n") {
        b"\n"
    } else {
        b""
    }
}

fn leading_whitespace(line: &[u8]) -> &[u8] {
    let width = line.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    &line[..width]
}
