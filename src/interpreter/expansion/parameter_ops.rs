//! Parameter Operations
//!
//! Parses the body of a `${...}` reference into a [`ParamExpr`] and provides
//! the pure string operations behind its modifiers:
//! - defaults: `:-` `-` `:=` `=` `:+` `+` `:?` `?`
//! - pattern removal and replacement: `#` `##` `%` `%%` `/` `//` `/#` `/%`
//! - substring `:offset:length`, length `${#name}`
//! - case modification `^` `^^` `,` `,,` and transforms `@Q` `@U` `@L` `@u`
//! - indirection `${!name}`, name listing `${!prefix*}`, keys `${!arr[@]}`
//!
//! Operand words (`word` in `${x:-word}`, patterns, replacements, offsets)
//! are kept as raw text and expanded by the caller when the operation runs.

use crate::interpreter::errors::ExpansionError;
use crate::interpreter::expansion::pattern::ReplaceMode;
use crate::parser::lexer::span_end;
use crate::parser::types::is_valid_name;

/// Array subscript of a parameter reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscript {
    /// `[@]` or `[*]`
    All { star: bool },
    /// `[expr]`, evaluated arithmetically
    Index(String),
}

/// `name`, `name[sub]`, a positional number or a special character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRef {
    pub name: String,
    pub subscript: Option<Subscript>,
}

impl ParamRef {
    fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscript: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamOp {
    /// `:-` / `-`
    Default { colon: bool, word: String },
    /// `:=` / `=`
    Assign { colon: bool, word: String },
    /// `:+` / `+`
    Alternative { colon: bool, word: String },
    /// `:?` / `?`
    Error { colon: bool, word: String },
    /// `#` / `##`
    RemovePrefix { longest: bool, pattern: String },
    /// `%` / `%%`
    RemoveSuffix { longest: bool, pattern: String },
    /// `/`, `//`, `/#`, `/%`
    Replace {
        mode: ReplaceMode,
        pattern: String,
        replacement: String,
    },
    /// `:offset` / `:offset:length`
    Substring { offset: String, length: Option<String> },
    /// `^`, `^^`, `,`, `,,` with an optional character pattern
    Case {
        upper: bool,
        all: bool,
        pattern: String,
    },
    /// `@Q`, `@U`, `@L`, `@u`
    Transform(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamExpr {
    Simple { param: ParamRef, op: Option<ParamOp> },
    /// `${#name}`
    Length(ParamRef),
    /// `${!name}` with an optional modifier applied to the target
    Indirect { param: ParamRef, op: Option<ParamOp> },
    /// `${!prefix*}` / `${!prefix@}`
    PrefixNames { prefix: String, star: bool },
    /// `${!arr[@]}` / `${!arr[*]}`
    Keys { name: String, star: bool },
}

/// Special single-character parameters.
const SPECIAL_PARAMS: &[char] = &['@', '*', '#', '?', '-', '$', '!', '0'];

/// Split `body` into a parameter reference and the remaining operator text.
fn split_param_ref(body: &str) -> Option<(ParamRef, &str)> {
    let first = body.chars().next()?;
    let name_len = if first.is_ascii_digit() {
        body.chars().take_while(char::is_ascii_digit).count()
    } else if SPECIAL_PARAMS.contains(&first) {
        1
    } else if first.is_ascii_alphabetic() || first == '_' {
        body.chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .count()
    } else {
        return None;
    };
    let (name, mut rest) = body.split_at(name_len);

    let mut subscript = None;
    if rest.starts_with('[') && is_valid_name(name) {
        let close = find_top_level(rest, 1, &[']'])?;
        let inner = &rest[1..close];
        subscript = Some(match inner {
            "@" => Subscript::All { star: false },
            "*" => Subscript::All { star: true },
            _ => Subscript::Index(inner.to_string()),
        });
        rest = &rest[close + 1..];
    }
    Some((
        ParamRef {
            name: name.to_string(),
            subscript,
        },
        rest,
    ))
}

/// Byte offset of the first of `stops` at nesting depth zero, at or after
/// `from`, skipping quotes, backslash escapes and nested expansions.
pub fn find_top_level(text: &str, from: usize, stops: &[char]) -> Option<usize> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let plain: Vec<char> = chars.iter().map(|(_, c)| *c).collect();
    let mut i = chars.iter().position(|(b, _)| *b >= from)?;
    let mut depth = 0usize;
    while i < chars.len() {
        let (byte, c) = chars[i];
        match c {
            '\\' => {
                i += 2;
                continue;
            }
            '\'' => {
                i += 1;
                while i < chars.len() && chars[i].1 != '\'' {
                    i += 1;
                }
            }
            '"' => {
                i += 1;
                while i < chars.len() && chars[i].1 != '"' {
                    if chars[i].1 == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            '$' | '`' => {
                if let Some(end) = span_end(&plain, i) {
                    i = end;
                    continue;
                }
            }
            '[' | '(' if !stops.contains(&c) => depth += 1,
            ']' | ')' if depth > 0 && !stops.contains(&c) => depth -= 1,
            c if depth == 0 && stops.contains(&c) => return Some(byte),
            ']' | ')' if depth > 0 => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Parse the modifier following a parameter reference.
fn parse_op(name: &str, rest: &str) -> Result<Option<ParamOp>, ExpansionError> {
    if rest.is_empty() {
        return Ok(None);
    }
    let word = |n: usize| rest[n..].to_string();
    let op = if let Some(tail) = rest.strip_prefix(':') {
        match tail.chars().next() {
            Some('-') => ParamOp::Default { colon: true, word: word(2) },
            Some('=') => ParamOp::Assign { colon: true, word: word(2) },
            Some('+') => ParamOp::Alternative { colon: true, word: word(2) },
            Some('?') => ParamOp::Error { colon: true, word: word(2) },
            _ => match find_top_level(tail, 0, &[':']) {
                Some(split) => ParamOp::Substring {
                    offset: tail[..split].to_string(),
                    length: Some(tail[split + 1..].to_string()),
                },
                None => ParamOp::Substring {
                    offset: tail.to_string(),
                    length: None,
                },
            },
        }
    } else if rest.starts_with("##") || rest.starts_with("%%") {
        let pattern = word(2);
        if rest.starts_with('#') {
            ParamOp::RemovePrefix { longest: true, pattern }
        } else {
            ParamOp::RemoveSuffix { longest: true, pattern }
        }
    } else if rest.starts_with("^^") || rest.starts_with(",,") {
        ParamOp::Case {
            upper: rest.starts_with('^'),
            all: true,
            pattern: word(2),
        }
    } else {
        match rest.chars().next() {
            Some('-') => ParamOp::Default { colon: false, word: word(1) },
            Some('=') => ParamOp::Assign { colon: false, word: word(1) },
            Some('+') => ParamOp::Alternative { colon: false, word: word(1) },
            Some('?') => ParamOp::Error { colon: false, word: word(1) },
            Some('#') => ParamOp::RemovePrefix { longest: false, pattern: word(1) },
            Some('%') => ParamOp::RemoveSuffix { longest: false, pattern: word(1) },
            Some('^') | Some(',') => ParamOp::Case {
                upper: rest.starts_with('^'),
                all: false,
                pattern: word(1),
            },
            Some('/') => parse_replace(&rest[1..]),
            Some('@') if matches!(&rest[1..], "Q" | "U" | "L" | "u") => {
                ParamOp::Transform(rest[1..].chars().next().unwrap_or('Q'))
            }
            _ => return Err(ExpansionError::BadSubstitution(format!("${{{}{}}}", name, rest))),
        }
    };
    Ok(Some(op))
}

fn parse_replace(spec: &str) -> ParamOp {
    let (mode, body) = match spec.chars().next() {
        Some('/') => (ReplaceMode::All, &spec[1..]),
        Some('#') => (ReplaceMode::Prefix, &spec[1..]),
        Some('%') => (ReplaceMode::Suffix, &spec[1..]),
        _ => (ReplaceMode::First, spec),
    };
    match find_top_level(body, 0, &['/']) {
        Some(split) => ParamOp::Replace {
            mode,
            pattern: body[..split].to_string(),
            replacement: body[split + 1..].to_string(),
        },
        None => ParamOp::Replace {
            mode,
            pattern: body.to_string(),
            replacement: String::new(),
        },
    }
}

/// Parse the text between `${` and `}`.
pub fn parse_parameter(body: &str) -> Result<ParamExpr, ExpansionError> {
    let bad = || ExpansionError::BadSubstitution(format!("${{{}}}", body));

    if let Some(rest) = body.strip_prefix('#') {
        if !rest.is_empty() {
            if let Some((param, "")) = split_param_ref(rest) {
                return Ok(ParamExpr::Length(param));
            }
        }
    }

    if let Some(rest) = body.strip_prefix('!') {
        if !rest.is_empty() {
            if let Some(prefix) = rest.strip_suffix('*').or_else(|| rest.strip_suffix('@')) {
                if is_valid_name(prefix) {
                    return Ok(ParamExpr::PrefixNames {
                        prefix: prefix.to_string(),
                        star: rest.ends_with('*'),
                    });
                }
            }
            let (param, op_text) = split_param_ref(rest).ok_or_else(bad)?;
            if let (Some(Subscript::All { star }), "") = (&param.subscript, op_text) {
                return Ok(ParamExpr::Keys {
                    name: param.name,
                    star: *star,
                });
            }
            let op = parse_op(&param.name, op_text)?;
            return Ok(ParamExpr::Indirect { param, op });
        }
    }

    let (param, op_text) = split_param_ref(body).ok_or_else(bad)?;
    let op = parse_op(&param.name, op_text)?;
    Ok(ParamExpr::Simple { param, op })
}

/// Parse an indirect target like `arr[2]` or `name`.
pub fn parse_indirect_target(target: &str) -> Option<ParamRef> {
    match split_param_ref(target) {
        Some((param, "")) => Some(param),
        _ => None,
    }
}

/// A reference naming the whole positional list.
pub fn plain_ref(name: &str) -> ParamRef {
    ParamRef::plain(name)
}

// =============================================================================
// STRING OPERATIONS
// =============================================================================

/// Apply substring extraction to a list of characters.
/// offset: starting position (negative counts from end)
/// length: optional length (negative counts from end)
pub fn substring_range(len: usize, offset: i64, length: Option<i64>) -> Option<(usize, usize)> {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let start = if offset < 0 {
        len_i.saturating_add(offset).max(0)
    } else {
        offset.min(len_i)
    };
    let end = match length {
        Some(l) if l < 0 => {
            let computed = len_i.saturating_add(l);
            if computed < start {
                return None;
            }
            computed
        }
        Some(l) => start.saturating_add(l).min(len_i),
        None => len_i,
    };
    Some((start as usize, end.max(start) as usize))
}

/// Apply `^`/`^^`/`,`/`,,`. `matches` decides which characters convert.
pub fn apply_case_modification<F>(value: &str, upper: bool, all: bool, matches: F) -> String
where
    F: Fn(char) -> bool,
{
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        if (all || i == 0) && matches(c) {
            if upper {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Quote a value so the shell reads it back as the same single word.
pub fn quote_value(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Apply an `@X` transform.
pub fn apply_transform(value: &str, op: char) -> String {
    match op {
        'Q' => quote_value(value),
        'U' => value.to_uppercase(),
        'L' => value.to_lowercase(),
        'u' => apply_case_modification(value, true, false, |_| true),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn simple(body: &str) -> (ParamRef, Option<ParamOp>) {
        match parse_parameter(body).unwrap() {
            ParamExpr::Simple { param, op } => (param, op),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_default_forms() {
        let (param, op) = simple("X:-foo bar");
        assert_eq!(param.name, "X");
        assert_eq!(
            op,
            Some(ParamOp::Default {
                colon: true,
                word: "foo bar".into()
            })
        );
        let (_, op) = simple("X=v");
        assert_eq!(op, Some(ParamOp::Assign { colon: false, word: "v".into() }));
    }

    #[test]
    fn test_pattern_ops() {
        let (_, op) = simple("path##*/");
        assert_eq!(op, Some(ParamOp::RemovePrefix { longest: true, pattern: "*/".into() }));
        let (_, op) = simple("f%.*");
        assert_eq!(op, Some(ParamOp::RemoveSuffix { longest: false, pattern: ".*".into() }));
        let (_, op) = simple("s//a/b");
        assert_eq!(
            op,
            Some(ParamOp::Replace {
                mode: ReplaceMode::All,
                pattern: "a".into(),
                replacement: "b".into()
            })
        );
        let (_, op) = simple("s/\"/\"/x");
        assert_eq!(
            op,
            Some(ParamOp::Replace {
                mode: ReplaceMode::First,
                pattern: "\"/\"".into(),
                replacement: "x".into()
            })
        );
    }

    #[test]
    fn test_substring_and_case() {
        let (_, op) = simple("s:1:2");
        assert_eq!(
            op,
            Some(ParamOp::Substring { offset: "1".into(), length: Some("2".into()) })
        );
        let (_, op) = simple("s: -3");
        assert_eq!(op, Some(ParamOp::Substring { offset: " -3".into(), length: None }));
        let (_, op) = simple("s^^");
        assert_eq!(op, Some(ParamOp::Case { upper: true, all: true, pattern: String::new() }));
        let (_, op) = simple("s@Q");
        assert_eq!(op, Some(ParamOp::Transform('Q')));
    }

    #[test]
    fn test_special_forms() {
        assert_eq!(
            parse_parameter("#arr[@]").unwrap(),
            ParamExpr::Length(ParamRef {
                name: "arr".into(),
                subscript: Some(Subscript::All { star: false })
            })
        );
        assert_eq!(
            parse_parameter("!BASH*").unwrap(),
            ParamExpr::PrefixNames { prefix: "BASH".into(), star: true }
        );
        assert_eq!(
            parse_parameter("!arr[@]").unwrap(),
            ParamExpr::Keys { name: "arr".into(), star: false }
        );
        assert!(matches!(parse_parameter("!ref").unwrap(), ParamExpr::Indirect { .. }));
        let (param, op) = simple("#");
        assert_eq!((param.name.as_str(), op), ("#", None));
        let (param, _) = simple("10");
        assert_eq!(param.name, "10");
        let (param, _) = simple("a[i+1]");
        assert_eq!(param.subscript, Some(Subscript::Index("i+1".into())));
    }

    #[test]
    fn test_bad_substitution() {
        assert!(matches!(
            parse_parameter("x!y"),
            Err(ExpansionError::BadSubstitution(_))
        ));
        assert!(parse_parameter("").is_err());
    }

    fn apply_substring(value: &str, offset: i64, length: Option<i64>) -> Option<String> {
        let chars: Vec<char> = value.chars().collect();
        let (start, end) = substring_range(chars.len(), offset, length)?;
        Some(chars[start..end].iter().collect())
    }

    #[test]
    fn test_substring_extreme_offsets() {
        assert_eq!(substring_range(3, i64::MAX, Some(i64::MAX)), Some((3, 3)));
        assert_eq!(substring_range(3, 1, Some(i64::MAX)), Some((1, 3)));
        assert_eq!(substring_range(3, i64::MIN, None), Some((0, 3)));
        assert_eq!(substring_range(3, 0, Some(i64::MIN)), None);
    }

    #[test]
    fn test_string_ops() {
        assert_eq!(apply_substring("hello", 1, Some(3)).as_deref(), Some("ell"));
        assert_eq!(apply_substring("hello", -3, None).as_deref(), Some("llo"));
        assert_eq!(apply_substring("hello", 1, Some(-1)).as_deref(), Some("ell"));
        assert_eq!(apply_substring("hello", 4, Some(-3)), None);
        assert_eq!(apply_substring("hi", 5, None).as_deref(), Some(""));
        assert_eq!(apply_case_modification("hello", true, false, |_| true), "Hello");
        assert_eq!(apply_case_modification("hello", true, true, |c| c == 'l'), "heLLo");
        assert_eq!(apply_transform("it's", 'Q'), "'it'\\''s'");
    }
}
