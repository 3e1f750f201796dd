//! Brace Expansion
//!
//! Expands `{a,b}` alternations and `{1..5}` / `{a..e}` ranges in raw word
//! text. Quoted text, backslash escapes, `${...}`, `$(...)` and backtick
//! spans are skipped, so only unquoted braces take part. A brace that does
//! not form a valid expression is kept literally.

/// Largest range expanded; a longer range stays literal
const MAX_RANGE_ITEMS: i128 = 100_000;

/// Most words one brace expression may produce; a word that would produce
/// more stays literal
const MAX_BRACE_RESULTS: usize = 100_000;

/// Expand every brace expression in `word`. Always returns at least one word.
pub fn expand_braces(word: &str) -> Vec<String> {
    let mut results = Vec::new();
    if !expand_into(word, &mut results) || results.is_empty() {
        return vec![word.to_string()];
    }
    results
}

/// Returns false once the result limit is exceeded.
fn expand_into(word: &str, results: &mut Vec<String>) -> bool {
    let chars: Vec<char> = word.chars().collect();
    let mut search_from = 0;

    while let Some(open) = find_unquoted_open(&chars, search_from) {
        let Some((close, commas)) = find_matching_close(&chars, open) else {
            search_from = open + 1;
            continue;
        };

        let prefix: String = chars[..open].iter().collect();
        let suffix: String = chars[close + 1..].iter().collect();
        let body: String = chars[open + 1..close].iter().collect();

        let alternatives = if commas.is_empty() {
            match expand_range(&body) {
                Some(items) => items,
                None => {
                    search_from = open + 1;
                    continue;
                }
            }
        } else {
            let mut parts = Vec::with_capacity(commas.len() + 1);
            let mut last = open + 1;
            for &comma in &commas {
                parts.push(chars[last..comma].iter().collect::<String>());
                last = comma + 1;
            }
            parts.push(chars[last..close].iter().collect::<String>());
            parts
        };

        for alternative in alternatives {
            if !expand_into(&format!("{}{}{}", prefix, alternative, suffix), results) {
                return false;
            }
        }
        return true;
    }

    if results.len() >= MAX_BRACE_RESULTS {
        return false;
    }
    results.push(word.to_string());
    true
}

/// Find the next `{` outside quotes and outside `${`.
fn find_unquoted_open(chars: &[char], from: usize) -> Option<usize> {
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\'' => i = skip_until(chars, i + 1, '\'') + 1,
            '"' => i = skip_double_quoted(chars, i + 1) + 1,
            '`' => i = skip_until(chars, i + 1, '`') + 1,
            '$' if chars.get(i + 1) == Some(&'{') => i = skip_nested(chars, i + 1, '{', '}') + 1,
            '$' if chars.get(i + 1) == Some(&'(') => i = skip_nested(chars, i + 1, '(', ')') + 1,
            '{' if i >= from => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Find the `}` matching the brace at `open`, returning top-level comma positions.
fn find_matching_close(chars: &[char], open: usize) -> Option<(usize, Vec<usize>)> {
    let mut depth = 0usize;
    let mut commas = Vec::new();
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '\'' => i = skip_until(chars, i + 1, '\''),
            '"' => i = skip_double_quoted(chars, i + 1),
            '`' => i = skip_until(chars, i + 1, '`'),
            '$' if chars.get(i + 1) == Some(&'{') => i = skip_nested(chars, i + 1, '{', '}'),
            '$' if chars.get(i + 1) == Some(&'(') => i = skip_nested(chars, i + 1, '(', ')'),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((i, commas));
                }
            }
            ',' if depth == 1 => commas.push(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn skip_until(chars: &[char], mut i: usize, end: char) -> usize {
    while i < chars.len() && chars[i] != end {
        if chars[i] == '\\' && end == '`' {
            i += 1;
        }
        i += 1;
    }
    i
}

fn skip_double_quoted(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '"' {
        if chars[i] == '\\' {
            i += 1;
        }
        i += 1;
    }
    i
}

/// Skip a nested span whose opening delimiter is at `i`; returns the index of
/// the closing delimiter.
fn skip_nested(chars: &[char], mut i: usize, open: char, close: char) -> usize {
    let mut depth = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if c == '\'' {
            i = skip_until(chars, i + 1, '\'') + 1;
            continue;
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return i;
            }
        }
        i += 1;
    }
    i
}

/// Expand `a..b` or `a..b..step`; `None` when the body is not a range.
fn expand_range(body: &str) -> Option<Vec<String>> {
    let parts: Vec<&str> = body.split("..").collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let step = match parts.get(2) {
        Some(s) => Some(s.parse::<i64>().ok()?),
        None => None,
    };

    if let (Ok(start), Ok(end)) = (parts[0].parse::<i64>(), parts[1].parse::<i64>()) {
        return expand_numeric_range(start, end, step, parts[0], parts[1]);
    }

    let mut start_chars = parts[0].chars();
    let mut end_chars = parts[1].chars();
    match (
        start_chars.next(),
        start_chars.next(),
        end_chars.next(),
        end_chars.next(),
    ) {
        (Some(start), None, Some(end), None)
            if start.is_ascii_alphabetic() && end.is_ascii_alphabetic() =>
        {
            expand_char_range(start, end, step)
        }
        _ => None,
    }
}

/// Numeric range with optional step.
///
/// A zero step counts as 1, the sign of the step is ignored, and a leading
/// zero on either end pads every value to the wider width. `None` when the
/// range holds more than [`MAX_RANGE_ITEMS`] values.
fn expand_numeric_range(
    start: i64,
    end: i64,
    raw_step: Option<i64>,
    start_str: &str,
    end_str: &str,
) -> Option<Vec<String>> {
    let step = match raw_step.unwrap_or(1) {
        0 => 1,
        s => i128::from(s).abs(),
    };
    let (start, end) = (i128::from(start), i128::from(end));
    let count = (end - start).abs() / step + 1;
    if count > MAX_RANGE_ITEMS {
        return None;
    }

    let mut pad_width = 0usize;
    for s in [start_str, end_str] {
        let digits = s.trim_start_matches('-');
        if digits.len() > 1 && digits.starts_with('0') {
            pad_width = pad_width.max(s.len());
        }
    }

    let format_num = |n: i128| -> String {
        if pad_width == 0 {
            return n.to_string();
        }
        if n < 0 {
            format!("-{:0>width$}", n.unsigned_abs(), width = pad_width - 1)
        } else {
            format!("{:0>width$}", n, width = pad_width)
        }
    };

    let direction = if start <= end { 1 } else { -1 };
    Some(
        (0..count)
            .map(|k| format_num(start + direction * k * step))
            .collect(),
    )
}

/// Letter range; mixed-case ranges such as `{z..A}` are not expanded.
fn expand_char_range(start: char, end: char, raw_step: Option<i64>) -> Option<Vec<String>> {
    if start.is_ascii_uppercase() != end.is_ascii_uppercase() {
        return None;
    }
    let step = match raw_step.unwrap_or(1) {
        0 => 1,
        s => u32::try_from(s.unsigned_abs()).unwrap_or(u32::MAX),
    };
    let (from, to) = (start as u32, end as u32);
    let mut results = Vec::new();
    let mut code = from;
    loop {
        results.push(char::from_u32(code)?.to_string());
        let next = if from <= to {
            code.checked_add(step).filter(|&next| next <= to)
        } else {
            code.checked_sub(step).filter(|&next| next >= to)
        };
        match next {
            Some(next) => code = next,
            None => break,
        }
    }
    Some(results)
}
