//! Line-level recognizers for nginx configuration text.
//!
//! This is a best-effort single-pass structural scan, not an nginx parser.
//! Known limits, kept deliberately so matching stays predictable:
//!
//! - `server_name` must fit on one physical line, terminated by `;`.
//! - Only one level of `server { ... }` is tracked; nested server blocks are
//!   not distinguished.
//! - Commented-out directives are never recognized.
//!
//! Text is handled as bytes. Only ASCII is interpreted; any other byte
//! (Latin-1 comments, stray encodings) passes through untouched.
//!
//! Anything that defeats brace counting (braces inside quotes, unterminated
//! quotes, depth going negative or not returning to zero) is reported as a
//! [`ParseFailure`] so callers fail closed.

/// Why a configuration text cannot be scanned safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

/// Brace tally of one line, ignoring `#` comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BraceCount {
    pub opens: i64,
    pub closes: i64,
}

impl BraceCount {
    #[must_use]
    pub fn balance(self) -> i64 {
        self.opens - self.closes
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.opens == 0 && self.closes == 0
    }
}

/// Lines of `text` without their `\n` or `\r\n` terminators.
pub fn lines(text: &[u8]) -> impl Iterator<Item = &[u8]> {
    text.split_inclusive(|&b| b == b'\n').map(strip_line_ending)
}

/// `line` without a trailing `\n` or `\r\n`.
#[must_use]
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Count braces on a line outside comments.
///
/// # Errors
///
/// Returns a reason string when a brace sits inside a quoted string or a
/// quote is left open at end of line.
pub fn count_braces(line: &[u8]) -> Result<BraceCount, &'static str> {
    let mut count = BraceCount::default();
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for &b in line {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            } else if b == b'{' || b == b'}' {
                return Err("brace inside a quoted string");
            }
            continue;
        }
        match b {
            b'#' => break,
            b'"' | b'\'' => quote = Some(b),
            b'{' => count.opens += 1,
            b'}' => count.closes += 1,
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated quoted string");
    }
    Ok(count)
}

/// Verify that brace depth never goes negative and ends at zero.
///
/// # Errors
///
/// Returns the first line that defeats the heuristic.
pub fn check_balance(text: &[u8]) -> Result<(), ParseFailure> {
    let mut depth: i64 = 0;
    let mut last_line = 0;
    for (idx, raw) in lines(text).enumerate() {
        last_line = idx + 1;
        let count = count_braces(raw).map_err(|reason| ParseFailure {
            line: idx + 1,
            reason: reason.to_string(),
        })?;
        depth += count.balance();
        if depth < 0 {
            return Err(ParseFailure {
                line: idx + 1,
                reason: "unexpected closing brace".to_string(),
            });
        }
    }
    if depth != 0 {
        return Err(ParseFailure {
            line: last_line,
            reason: format!("{depth} unclosed brace(s) at end of file"),
        });
    }
    Ok(())
}

/// `true` for a line opening a server block: `server {` with optional spacing.
#[must_use]
pub fn opens_server_block(line: &[u8]) -> bool {
    line.trim_ascii_start()
        .strip_prefix(b"server")
        .is_some_and(|rest| rest.trim_ascii_start().starts_with(b"{"))
}

/// Values of a single-line directive `name v1 v2 ...;`, or `None`.
fn directive_values<'a>(line: &'a [u8], name: &str) -> Option<Vec<&'a [u8]>> {
    let rest = line.trim_ascii_start().strip_prefix(name.as_bytes())?;
    if !rest.first().is_some_and(u8::is_ascii_whitespace) {
        return None;
    }
    let end = rest.iter().position(|&b| b == b';')?;
    let values: Vec<&[u8]> = rest[..end]
        .split(u8::is_ascii_whitespace)
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Names listed by a single-line `server_name ...;` directive.
#[must_use]
pub fn server_names(line: &[u8]) -> Option<Vec<&[u8]>> {
    directive_values(line, "server_name")
}

/// `true` when `line` is a `server_name` directive listing `domain` as a whole token.
#[must_use]
pub fn declares_domain(line: &[u8], domain: &str) -> bool {
    server_names(line)
        .is_some_and(|names| names.iter().any(|n| n.eq_ignore_ascii_case(domain.as_bytes())))
}

/// What a `listen` directive says about TLS on 443.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listen {
    pub port_443: bool,
    pub ssl: bool,
}

/// Parse a single-line `listen ...;` directive.
#[must_use]
pub fn listen(line: &[u8]) -> Option<Listen> {
    let values = directive_values(line, "listen")?;
    let address = values[0];
    let port = if address.starts_with(b"unix:") {
        None
    } else if let Some(colon) = address.iter().rposition(|&b| b == b':') {
        Some(&address[colon + 1..])
    } else if address.iter().all(u8::is_ascii_digit) {
        Some(address)
    } else {
        None
    };
    Some(Listen {
        port_443: port == Some(b"443".as_slice()),
        ssl: values[1..].contains(&b"ssl".as_slice()),
    })
}

/// `true` for the legacy `ssl on;` directive.
#[must_use]
pub fn is_ssl_on(line: &[u8]) -> bool {
    directive_values(line, "ssl").is_some_and(|v| v == [b"on".as_slice()])
}
