//! echo - Write arguments to standard output
//!
//! echo [-neE] [arg ...]
//!
//! Leading option words are accepted only when every letter is one of
//! `n`, `e` or `E`; anything else starts the operands.

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_echo(_interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let mut newline = true;
    let mut escapes = false;
    let mut start = 0;

    for arg in args {
        let Some(letters) = arg.strip_prefix('-') else {
            break;
        };
        if letters.is_empty() || !letters.chars().all(|c| matches!(c, 'n' | 'e' | 'E')) {
            break;
        }
        for letter in letters.chars() {
            match letter {
                'n' => newline = false,
                'e' => escapes = true,
                _ => escapes = false,
            }
        }
        start += 1;
    }

    let mut output = args[start..].join(" ");
    if escapes {
        let (text, stopped) = interpret_escapes(&output);
        output = text;
        if stopped {
            return BuiltinResult::output(output);
        }
    }
    if newline {
        output.push('\n');
    }
    BuiltinResult::output(output)
}

/// Expand `echo -e` escapes. The flag is true when `\c` cut the output short.
fn interpret_escapes(input: &str) -> (String, bool) {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'e' | 'E' => out.push('\x1b'),
            'c' => return (out, true),
            '0' => {
                let mut code = 0u32;
                for _ in 0..3 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code % 256).unwrap_or('\0'));
            }
            'x' => {
                let mut code = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(digit) => {
                            code = code * 16 + digit;
                            chars.next();
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    out.push_str("\\x");
                } else {
                    out.push(char::from_u32(code).unwrap_or('\0'));
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    (out, false)
}
