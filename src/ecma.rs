//! ECMA-262 regular expressions on top of the `regex` crate.
//!
//! Schemas use ECMA-262 syntax. A pattern is translated to the `regex`
//! crate's dialect before compiling. Constructs the `regex` crate cannot
//! express (backreferences and lookaround) are rejected.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use crate::error::EngineError;

const WORD: &str = "0-9A-Za-z_";
const SPACE: &str = r"\s\x{FEFF}";
const LINE_TERMINATORS: &str = r"\n\r\x{2028}\x{2029}";

/// A compiled ECMA-262 pattern.
#[derive(Debug, Clone)]
pub struct EcmaRegex {
    source: String,
    regex: Regex,
}

impl EcmaRegex {
    /// Translate and compile an ECMA-262 pattern.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Regex` for unsupported constructs or syntax
    /// errors.
    pub fn new(pattern: &str) -> Result<Self, EngineError> {
        let translated = translate(pattern).map_err(|message| EngineError::Regex {
            pattern: pattern.to_string(),
            message,
        })?;
        let regex = Regex::new(&translated).map_err(|e| EngineError::Regex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Unanchored search, like ECMA `RegExp.prototype.test`.
    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    /// The original ECMA pattern.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Compiled-pattern cache shared by one validator.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: RwLock<HashMap<String, Arc<EcmaRegex>>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pattern: &str) -> Result<Arc<EcmaRegex>, EngineError> {
        if let Some(regex) = self.compiled.read().get(pattern) {
            return Ok(Arc::clone(regex));
        }
        let regex = Arc::new(EcmaRegex::new(pattern)?);
        self.compiled
            .write()
            .entry(pattern.to_string())
            .or_insert_with(|| Arc::clone(&regex));
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.read().is_empty()
    }
}

/// Rewrite an ECMA-262 pattern in `regex` crate syntax.
fn translate(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "pattern ends with a lone backslash".to_string())?;
                translate_escape(escaped, &mut chars, in_class, &mut out)?;
            }
            '[' if in_class => out.push_str(r"\["),
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '[' => {
                if chars.peek() == Some(&']') {
                    chars.next();
                    out.push_str(r"[^\x00-\x{10FFFF}]");
                } else if starts_with(&chars, "^]") {
                    chars.next();
                    chars.next();
                    out.push_str("(?s:.)");
                } else {
                    in_class = true;
                    out.push('[');
                    if chars.peek() == Some(&'^') {
                        chars.next();
                        out.push('^');
                    }
                }
            }
            '(' if chars.peek() == Some(&'?') => {
                chars.next();
                match chars.peek().copied() {
                    Some('=') | Some('!') => return Err("lookahead is not supported".into()),
                    Some('<') => {
                        chars.next();
                        match chars.peek().copied() {
                            Some('=') | Some('!') => {
                                return Err("lookbehind is not supported".into())
                            }
                            _ => out.push_str("(?P<"),
                        }
                    }
                    Some(':') => {
                        chars.next();
                        out.push_str("(?:");
                    }
                    _ => return Err("invalid group".into()),
                }
            }
            '{' => {
                if quantifier_follows(&chars) {
                    out.push('{');
                    for q in chars.by_ref() {
                        out.push(q);
                        if q == '}' {
                            break;
                        }
                    }
                } else {
                    out.push_str(r"\{");
                }
            }
            '}' => out.push_str(r"\}"),
            '.' if !in_class => {
                out.push_str("[^");
                out.push_str(LINE_TERMINATORS);
                out.push(']');
            }
            _ => out.push(c),
        }
    }

    if in_class {
        return Err("unterminated character class".into());
    }
    Ok(out)
}

fn translate_escape(
    escaped: char,
    chars: &mut Peekable<Chars<'_>>,
    in_class: bool,
    out: &mut String,
) -> Result<(), String> {
    let class = |out: &mut String, body: &str, negated: bool| {
        out.push('[');
        if negated {
            out.push('^');
        }
        out.push_str(body);
        out.push(']');
    };

    match escaped {
        'd' if in_class => out.push_str("0-9"),
        'd' => class(out, "0-9", false),
        'D' => class(out, "0-9", true),
        'w' if in_class => out.push_str(WORD),
        'w' => class(out, WORD, false),
        'W' => class(out, WORD, true),
        's' if in_class => out.push_str(SPACE),
        's' => class(out, SPACE, false),
        'S' => class(out, SPACE, true),
        'b' if in_class => out.push_str(r"\x08"),
        'b' => out.push_str(r"(?-u:\b)"),
        'B' => out.push_str(r"(?-u:\B)"),
        'f' | 'n' | 'r' | 't' | 'v' => {
            out.push('\\');
            out.push(escaped);
        }
        '0' => out.push_str(r"\x00"),
        '1'..='9' => return Err("backreferences are not supported".into()),
        'k' => return Err("named backreferences are not supported".into()),
        'c' => match chars.next() {
            Some(letter) if letter.is_ascii_alphabetic() => {
                out.push_str(&format!(r"\x{:02X}", (letter as u8) % 32));
            }
            _ => return Err("invalid control escape".into()),
        },
        'x' => {
            let hex = take_hex(chars, 2).ok_or_else(|| "invalid \\x escape".to_string())?;
            out.push_str(&format!(r"\x{{{}}}", hex));
        }
        'u' => {
            let hex = if chars.peek() == Some(&'{') {
                chars.next();
                let mut hex = String::new();
                for h in chars.by_ref() {
                    if h == '}' {
                        break;
                    }
                    hex.push(h);
                }
                hex
            } else {
                take_hex(chars, 4).ok_or_else(|| "invalid \\u escape".to_string())?
            };
            let code = u32::from_str_radix(&hex, 16).map_err(|_| "invalid \\u escape")?;
            if char::from_u32(code).is_none() {
                return Err(format!("\\u{} is not a scalar value", hex));
            }
            out.push_str(&format!(r"\x{{{}}}", hex));
        }
        c if c.is_ascii_alphanumeric() => out.push(c),
        c => out.push_str(&regex::escape(&c.to_string())),
    }
    Ok(())
}

fn take_hex(chars: &mut Peekable<Chars<'_>>, count: usize) -> Option<String> {
    let mut hex = String::with_capacity(count);
    for _ in 0..count {
        let h = chars.next()?;
        if !h.is_ascii_hexdigit() {
            return None;
        }
        hex.push(h);
    }
    Some(hex)
}

fn starts_with(chars: &Peekable<Chars<'_>>, prefix: &str) -> bool {
    chars.clone().take(prefix.len()).eq(prefix.chars())
}

/// True if the text after a `{` is `n}`, `n,}` or `n,m}`.
fn quantifier_follows(chars: &Peekable<Chars<'_>>) -> bool {
    let rest: String = chars.clone().take_while(|c| *c != '}').collect();
    if chars.clone().nth(rest.chars().count()) != Some('}') {
        return false;
    }
    let mut parts = rest.splitn(2, ',');
    let min = parts.next().unwrap_or("");
    let max = parts.next();
    !min.is_empty()
        && min.chars().all(|c| c.is_ascii_digit())
        && max.map_or(true, |m| m.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, input: &str) -> bool {
        EcmaRegex::new(pattern).unwrap().is_match(input)
    }

    #[test]
    fn digit_class_is_ascii() {
        assert!(matches(r"^\d+$", "0123"));
        assert!(!matches(r"^\d+$", "١٢٣"));
        assert!(matches(r"^[\d-]+$", "12-34"));
    }

    #[test]
    fn word_class_is_ascii() {
        assert!(matches(r"^\w+$", "abc_DEF_09"));
        assert!(!matches(r"^\w+$", "héllo"));
        assert!(matches(r"^\W$", "é"));
    }

    #[test]
    fn unanchored_search() {
        assert!(matches("es", "test"));
        assert!(!matches("^es", "test"));
    }

    #[test]
    fn dot_excludes_line_terminators() {
        assert!(matches("^a.c$", "abc"));
        assert!(!matches("^a.c$", "a\rc"));
        assert!(!matches("^a.c$", "a\u{2028}c"));
    }

    #[test]
    fn literal_braces() {
        assert!(matches("^a{2}$", "aa"));
        assert!(matches("^a{1,}$", "aaa"));
        assert!(matches("^{}$", "{}"));
        assert!(matches("^x{a}$", "x{a}"));
    }

    #[test]
    fn escaped_slash() {
        assert!(matches(r"^a\/b$", "a/b"));
    }

    #[test]
    fn named_groups() {
        assert!(matches(r"^(?<year>\d{4})$", "2024"));
    }

    #[test]
    fn unicode_escapes() {
        assert!(matches(r"^\u00e9$", "é"));
        assert!(matches(r"^\x41$", "A"));
    }

    #[test]
    fn control_escape() {
        assert!(matches(r"^\cJ$", "\n"));
    }

    #[test]
    fn rejects_backreferences_and_lookaround() {
        for pattern in [r"(a)\1", "a(?=b)", "a(?!b)", "(?<=a)b", "(?<!a)b", r"(?<n>a)\k<n>"] {
            assert!(
                matches!(EcmaRegex::new(pattern), Err(EngineError::Regex { .. })),
                "{pattern} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_syntax_errors() {
        assert!(EcmaRegex::new("(").is_err());
        assert!(EcmaRegex::new("[a").is_err());
        assert!(EcmaRegex::new("\\").is_err());
    }

    #[test]
    fn class_with_ampersand_and_tilde() {
        assert!(matches("^[&~]+$", "&~&"));
        assert!(matches("^[a[]$", "["));
    }

    #[test]
    fn empty_classes() {
        assert!(!matches("[]", "a"));
        assert!(matches("^[^]$", "\n"));
    }

    #[test]
    fn cache_reuses_compiled_patterns() {
        let cache = RegexCache::new();
        let a = cache.get("^a+$").unwrap();
        let b = cache.get("^a+$").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("(").is_err());
        assert_eq!(cache.len(), 1);
    }
}
