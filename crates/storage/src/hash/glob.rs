//! Shell-style glob matching over raw bytes
//!
//! Supported syntax:
//! - `*` any sequence (including empty)
//! - `?` any single byte
//! - `[abc]`, `[a-z]`, `[^a-z]` / `[!a-z]` byte classes
//! - `\x` the literal byte `x`
//!
//! An unterminated `[` matches itself.

/// Match `text` against a glob `pattern`
///
/// Iterative, backtracking only to the most recent `*`, so matching is
/// O(pattern * text) in the worst case.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    // (pattern index after the star, text index it was tried at)
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            if pattern[p] == b'*' {
                p += 1;
                backtrack = Some((p, t));
                continue;
            }
            if let Some(next) = match_one(pattern, p, text[t]) {
                p = next;
                t += 1;
                continue;
            }
        }
        match backtrack {
            Some((star_p, star_t)) => {
                // Let the star swallow one more byte
                p = star_p;
                t = star_t + 1;
                backtrack = Some((star_p, t));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

/// Match one byte against the token at `pattern[p]`
///
/// Returns the index of the next token on success.
fn match_one(pattern: &[u8], p: usize, byte: u8) -> Option<usize> {
    match pattern[p] {
        b'?' => Some(p + 1),
        b'\\' if p + 1 < pattern.len() => (pattern[p + 1] == byte).then_some(p + 2),
        b'[' => match parse_class(pattern, p) {
            Some((matched, next)) => matched(byte).then_some(next),
            None => (byte == b'[').then_some(p + 1),
        },
        literal => (literal == byte).then_some(p + 1),
    }
}

/// Parse the class starting at `pattern[start] == b'['`
///
/// Returns a predicate and the index after the closing `]`, or `None` when the
/// class is unterminated.
fn parse_class(pattern: &[u8], start: usize) -> Option<(impl Fn(u8) -> bool + '_, usize)> {
    let mut i = start + 1;
    let negated = matches!(pattern.get(i), Some(b'^') | Some(b'!'));
    if negated {
        i += 1;
    }
    let body_start = i;
    // A `]` right after the opening bracket is a literal member
    if pattern.get(i) == Some(&b']') {
        i += 1;
    }
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' {
            i += 1;
        }
        i += 1;
    }
    if i >= pattern.len() {
        return None;
    }
    let body = &pattern[body_start..i];

    let matched = move |byte: u8| class_contains(body, byte) != negated;
    Some((matched, i + 1))
}

fn class_contains(body: &[u8], byte: u8) -> bool {
    let mut i = 0;
    while i < body.len() {
        let mut low = body[i];
        if low == b'\\' && i + 1 < body.len() {
            i += 1;
            low = body[i];
        }
        // Range `a-z`; a trailing `-` is a literal
        if i + 2 < body.len() && body[i + 1] == b'-' {
            let mut high = body[i + 2];
            i += 2;
            if high == b'\\' && i + 1 < body.len() {
                i += 1;
                high = body[i];
            }
            let (lo, hi) = if low <= high { (low, high) } else { (high, low) };
            if (lo..=hi).contains(&byte) {
                return true;
            }
        } else if low == byte {
            return true;
        }
        i += 1;
    }
    false
}
