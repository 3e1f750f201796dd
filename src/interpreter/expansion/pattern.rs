//! Pattern Matching
//!
//! Converts shell glob patterns to regex equivalents for pattern matching
//! in parameter expansion (${var%pattern}, ${var/pattern/replacement}, etc.),
//! `case` items and `[[ == ]]`.
//!
//! A backslash makes the next character literal. The expansion engine uses
//! this to protect characters that were quoted in the source, so
//! `${x#"*"}` strips a literal star.
//!
//! ## Error Handling
//!
//! - Invalid character ranges (e.g., `[z-a]`) fail to compile; the pattern
//!   then only matches itself literally
//! - Unknown POSIX classes (e.g., `[:foo:]`) match nothing
//! - Unclosed character classes (`[abc`) are treated as literal `[`

use std::collections::HashMap;

use regex_lite::Regex;

lazy_static::lazy_static! {
    /// Valid POSIX character class names
    static ref POSIX_CLASSES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("alnum", "a-zA-Z0-9");
        m.insert("alpha", "a-zA-Z");
        m.insert("ascii", "\\x00-\\x7F");
        m.insert("blank", " \\t");
        m.insert("cntrl", "\\x00-\\x1F\\x7F");
        m.insert("digit", "0-9");
        m.insert("graph", "!-~");
        m.insert("lower", "a-z");
        m.insert("print", " -~");
        m.insert("punct", "!-/:-@\\[-`{-~");
        m.insert("space", " \\t\\n\\r\\f\\v");
        m.insert("upper", "A-Z");
        m.insert("word", "a-zA-Z0-9_");
        m.insert("xdigit", "0-9A-Fa-f");
        m
    };
}

/// Convert a shell glob pattern to a regex string.
///
/// `greedy` picks `.*` over `.*?` for `*`; anchored full matches do not
/// care, but substring searches do.
pub fn pattern_to_regex(pattern: &str, greedy: bool) -> String {
    let mut regex = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            // Shell escape: \X means literal X
            if i + 1 < chars.len() {
                push_literal(&mut regex, chars[i + 1]);
                i += 2;
            } else {
                regex.push_str("\\\\");
                i += 1;
            }
        } else if c == '*' {
            // Collapse runs of stars
            while i + 1 < chars.len() && chars[i + 1] == '*' {
                i += 1;
            }
            regex.push_str(if greedy { ".*" } else { ".*?" });
            i += 1;
        } else if c == '?' {
            regex.push('.');
            i += 1;
        } else if c == '[' {
            let class_end = find_char_class_end(&chars, i);
            if class_end == usize::MAX {
                regex.push_str("\\[");
                i += 1;
            } else {
                let class_content: String = chars[i + 1..class_end].iter().collect();
                regex.push_str(&convert_char_class(&class_content));
                i = class_end + 1;
            }
        } else {
            push_literal(&mut regex, c);
            i += 1;
        }
    }
    regex
}

fn push_literal(regex: &mut String, c: char) {
    if is_regex_special(c) {
        regex.push('\\');
    }
    regex.push(c);
}

/// Check if a character is a regex special character
fn is_regex_special(c: char) -> bool {
    "\\^$.|+(){}[]*?".contains(c)
}

/// Does the pattern contain an unescaped glob metacharacter?
pub fn has_glob_chars(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' | '[' => return true,
            _ => {}
        }
    }
    false
}

/// Remove pattern escapes, yielding the literal text a pattern stands for.
pub fn unescape_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Find the end of a character class starting at position i (where chars[i] is '[')
fn find_char_class_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;

    if i < chars.len() && (chars[i] == '^' || chars[i] == '!') {
        i += 1;
    }

    // A ] immediately after [ or [! is literal, not closing
    if i < chars.len() && chars[i] == ']' {
        i += 1;
    }

    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            i += 2;
            continue;
        }

        if chars[i] == ']' {
            return i;
        }

        if chars[i] == '[' && i + 1 < chars.len() && chars[i + 1] == ':' {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(close_pos) = rest.find(":]") {
                i = i + 2 + rest[..close_pos].chars().count() + 2;
                continue;
            }
        }
        i += 1;
    }
    usize::MAX
}

/// Convert a shell character class content to regex equivalent.
/// Input is the content inside [...], e.g., ":alpha:" for [[:alpha:]]
fn convert_char_class(content: &str) -> String {
    let mut result = String::from("[");
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;

    if !chars.is_empty() && (chars[0] == '^' || chars[0] == '!') {
        result.push('^');
        i += 1;
    }
    let body_start = i;

    while i < chars.len() {
        if chars[i] == '[' && i + 1 < chars.len() && chars[i + 1] == ':' {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(close_pos) = rest.find(":]") {
                let posix_class = &rest[..close_pos];
                result.push_str(posix_class_to_regex(posix_class));
                i = i + 2 + posix_class.chars().count() + 2;
                continue;
            }
        }

        let c = chars[i];
        match c {
            '\\' if i + 1 < chars.len() => {
                result.push('\\');
                result.push(chars[i + 1]);
                i += 2;
                continue;
            }
            '\\' => result.push_str("\\\\"),
            '-' if i > body_start && i + 1 < chars.len() => result.push('-'),
            '-' | ']' | '[' | '^' | '&' | '~' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
        i += 1;
    }

    result.push(']');
    result
}

/// Convert POSIX character class name to regex equivalent.
/// Returns empty string for unknown class names.
fn posix_class_to_regex(name: &str) -> &'static str {
    POSIX_CLASSES.get(name).copied().unwrap_or("")
}

/// Compile a pattern that must match the whole subject.
pub fn compile_pattern(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("^(?s:{})$", pattern_to_regex(pattern, true))).ok()
}

/// Whole-string glob match. A pattern that does not compile only matches
/// its own literal text.
pub fn pattern_matches(pattern: &str, text: &str) -> bool {
    match compile_pattern(pattern) {
        Some(re) => re.is_match(text),
        None => unescape_pattern(pattern) == text,
    }
}

/// Byte offsets of every char boundary in `s`, including both ends.
fn boundaries(s: &str) -> Vec<usize> {
    s.char_indices().map(|(i, _)| i).chain([s.len()]).collect()
}

/// `${v#pat}` and `${v##pat}`
pub fn remove_prefix(value: &str, pattern: &str, longest: bool) -> String {
    let Some(re) = compile_pattern(pattern) else {
        return value.to_string();
    };
    let mut ends = boundaries(value);
    if longest {
        ends.reverse();
    }
    for end in ends {
        if re.is_match(&value[..end]) {
            return value[end..].to_string();
        }
    }
    value.to_string()
}

/// `${v%pat}` and `${v%%pat}`
pub fn remove_suffix(value: &str, pattern: &str, longest: bool) -> String {
    let Some(re) = compile_pattern(pattern) else {
        return value.to_string();
    };
    let mut starts = boundaries(value);
    if !longest {
        starts.reverse();
    }
    for start in starts {
        if re.is_match(&value[start..]) {
            return value[..start].to_string();
        }
    }
    value.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// `${v/pat/rep}`
    First,
    /// `${v//pat/rep}`
    All,
    /// `${v/#pat/rep}`
    Prefix,
    /// `${v/%pat/rep}`
    Suffix,
}

/// Longest match of `re` starting at byte offset `start`.
fn longest_match_at(re: &Regex, value: &str, start: usize, ends: &[usize]) -> Option<usize> {
    ends.iter()
        .rev()
        .copied()
        .filter(|&end| end >= start)
        .find(|&end| re.is_match(&value[start..end]))
}

/// `${v/pat/rep}` and friends. Matches are longest-first at each position.
pub fn replace_pattern(value: &str, pattern: &str, replacement: &str, mode: ReplaceMode) -> String {
    if pattern.is_empty() && !matches!(mode, ReplaceMode::Prefix | ReplaceMode::Suffix) {
        return value.to_string();
    }
    let Some(re) = compile_pattern(pattern) else {
        return value.to_string();
    };
    let ends = boundaries(value);

    match mode {
        ReplaceMode::Prefix => match longest_match_at(&re, value, 0, &ends) {
            Some(end) => format!("{}{}", replacement, &value[end..]),
            None => value.to_string(),
        },
        ReplaceMode::Suffix => {
            for &start in &ends {
                if re.is_match(&value[start..]) {
                    return format!("{}{}", &value[..start], replacement);
                }
            }
            value.to_string()
        }
        ReplaceMode::First | ReplaceMode::All => {
            let mut out = String::with_capacity(value.len());
            let mut idx = 0;
            while idx < ends.len() {
                let start = ends[idx];
                match longest_match_at(&re, value, start, &ends) {
                    Some(end) if end > start => {
                        out.push_str(replacement);
                        if mode == ReplaceMode::First {
                            out.push_str(&value[end..]);
                            return out;
                        }
                        idx = ends.iter().position(|&e| e == end).unwrap_or(ends.len());
                    }
                    _ => {
                        if start < value.len() {
                            let ch_end = ends[idx + 1];
                            out.push_str(&value[start..ch_end]);
                        }
                        idx += 1;
                    }
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_patterns() {
        assert_eq!(pattern_to_regex("*", true), ".*");
        assert_eq!(pattern_to_regex("*", false), ".*?");
        assert_eq!(pattern_to_regex("?", true), ".");
        assert_eq!(pattern_to_regex("a.b", true), "a\\.b");
    }

    #[test]
    fn test_escaped_chars() {
        assert_eq!(pattern_to_regex("\\*", true), "\\*");
        assert_eq!(pattern_to_regex("\\[", true), "\\[");
        assert!(!has_glob_chars("a\\*b"));
        assert!(has_glob_chars("a*b"));
    }

    #[test]
    fn test_character_class() {
        assert_eq!(pattern_to_regex("[abc]", true), "[abc]");
        assert_eq!(pattern_to_regex("[a-z]", true), "[a-z]");
        assert_eq!(pattern_to_regex("[!abc]", true), "[^abc]");
        assert_eq!(pattern_to_regex("[[:digit:]]", true), "[0-9]");
        assert_eq!(pattern_to_regex("[abc", true), "\\[abc");
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("*.rs", "main.rs"));
        assert!(!pattern_matches("*.rs", "main.rsx"));
        assert!(pattern_matches("a?c", "abc"));
        assert!(pattern_matches("[[:upper:]]*", "Hello"));
        assert!(pattern_matches("\\*", "*"));
        assert!(!pattern_matches("\\*", "x"));
    }

    #[test]
    fn test_prefix_suffix_removal() {
        assert_eq!(remove_prefix("a/b/c", "*/", false), "b/c");
        assert_eq!(remove_prefix("a/b/c", "*/", true), "c");
        assert_eq!(remove_suffix("file.tar.gz", ".*", false), "file.tar");
        assert_eq!(remove_suffix("file.tar.gz", ".*", true), "file");
        assert_eq!(remove_prefix("abc", "x", false), "abc");
    }

    #[test]
    fn test_replace() {
        assert_eq!(replace_pattern("hello", "l", "L", ReplaceMode::First), "heLlo");
        assert_eq!(replace_pattern("hello", "l", "L", ReplaceMode::All), "heLLo");
        assert_eq!(replace_pattern("hello", "h*l", "X", ReplaceMode::First), "Xo");
        assert_eq!(replace_pattern("hello", "he", "", ReplaceMode::Prefix), "llo");
        assert_eq!(replace_pattern("hello", "lo", "p", ReplaceMode::Suffix), "help");
        assert_eq!(replace_pattern("hello", "x", "y", ReplaceMode::All), "hello");
    }
}
