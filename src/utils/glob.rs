// src/utils/glob.rs

//! Shell-style pattern matching for exam whitelists.
//!
//! Supported syntax:
//! * `*` matches any run of characters (including none).
//! * `?` matches exactly one character.
//! * `[seq]` matches one character in `seq`, `[!seq]` one character not in it.
//!   Ranges such as `[a-z]` work inside a set. An unterminated `[` is literal.
//!
//! Matching is case-insensitive, unlike POSIX `fnmatch`: `Bob@Uni.edu` and
//! `bob@uni.edu` name the same mailbox for every whitelist entry.

use regex::Regex;

/// Characters that turn a whitelist entry into a pattern instead of a literal address.
const WILDCARD_CHARS: [char; 3] = ['*', '?', '['];

/// A compiled whitelist entry.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&translate(pattern))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

/// One-shot match. A pattern that does not compile never matches.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    match GlobPattern::new(pattern) {
        Ok(glob) => glob.is_match(candidate),
        Err(e) => {
            tracing::warn!("Ignoring malformed whitelist pattern {:?}: {}", pattern, e);
            false
        }
    }
}

/// Whether the entry contains wildcard syntax, i.e. is not a plain email address.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(WILDCARD_CHARS)
}

/// Translates a shell pattern into an anchored regular expression.
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?si)^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;

        match c {
            '*' => {
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                // Find the closing bracket. A `]` right after `[` or `[!` belongs to the set.
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }

                if j >= chars.len() {
                    out.push_str("\\[");
                    continue;
                }

                let mut k = i;
                out.push('[');
                if chars[k] == '!' {
                    out.push('^');
                    k += 1;
                }
                for &ch in &chars[k..j] {
                    match ch {
                        '\\' | '[' | ']' | '&' | '~' | '^' => {
                            out.push('\\');
                            out.push(ch);
                        }
                        _ => out.push(ch),
                    }
                }
                out.push(']');
                i = j + 1;
            }
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}
