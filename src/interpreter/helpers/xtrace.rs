//! xtrace (set -x) formatting
//!
//! The prefix comes from PS4 (default "+ "); arguments are quoted so the
//! trace line could be pasted back into a shell.

/// Default PS4 value when not set
pub const DEFAULT_PS4: &str = "+ ";

fn needs_quoting(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t' | '\n' | '\'' | '"' | '\\' | '$' | '`' | '!' | '*' | '?' | '[' | ']'
            | '{' | '}' | '|' | '&' | ';' | '<' | '>' | '(' | ')' | '~' | '#'
    )
}

/// Quote a value for trace output if needed.
pub fn quote_for_trace(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    if !value.chars().any(needs_quoting) && !value.chars().any(char::is_control) {
        return value.to_string();
    }

    // $'...' for anything a plain single-quoted string can't carry
    if value.chars().any(|c| c.is_control() || c == '\\') {
        let mut escaped = String::with_capacity(value.len() + 3);
        for c in value.chars() {
            match c {
                '\n' => escaped.push_str("\\n"),
                '\t' => escaped.push_str("\\t"),
                '\\' => escaped.push_str("\\\\"),
                '\'' => escaped.push_str("\\'"),
                c if c.is_control() => escaped.push_str(&format!("\\x{:02x}", c as u32)),
                c => escaped.push(c),
            }
        }
        return format!("$'{}'", escaped);
    }

    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    let escaped: String = value
        .chars()
        .map(|c| match c {
            '\\' | '$' | '`' | '"' => format!("\\{}", c),
            _ => c.to_string(),
        })
        .collect();
    format!("\"{}\"", escaped)
}

/// One trace line for a simple command, newline included.
pub fn trace_command(prefix: &str, argv: &[String]) -> String {
    let line: Vec<String> = argv.iter().map(|arg| quote_for_trace(arg)).collect();
    format!("{}{}\n", prefix, line.join(" "))
}

/// One trace line for an assignment. The value is shown unquoted.
pub fn trace_assignment(prefix: &str, name: &str, value: &str) -> String {
    format!("{}{}={}\n", prefix, name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_for_trace_simple() {
        assert_eq!(quote_for_trace("hello"), "hello");
        assert_eq!(quote_for_trace("world123"), "world123");
        assert_eq!(quote_for_trace(""), "''");
    }

    #[test]
    fn test_quote_for_trace_special() {
        assert_eq!(quote_for_trace("hello world"), "'hello world'");
        assert_eq!(quote_for_trace("it's"), "\"it's\"");
        assert_eq!(quote_for_trace("line1\nline2"), "$'line1\\nline2'");
        assert_eq!(quote_for_trace("col1\tcol2"), "$'col1\\tcol2'");
        assert_eq!(quote_for_trace("path\\file"), "$'path\\\\file'");
    }

    #[test]
    fn test_trace_command() {
        let argv = vec!["echo".to_string(), "hello world".to_string()];
        assert_eq!(trace_command(DEFAULT_PS4, &argv), "+ echo 'hello world'\n");
        assert_eq!(trace_command(">> ", &argv[..1]), ">> echo\n");
    }

    #[test]
    fn test_trace_assignment() {
        assert_eq!(trace_assignment("+ ", "FOO", "a b"), "+ FOO=a b\n");
    }
}
