//! Arithmetic Expression Parser
//!
//! Parses the text of `$(( ))`, `(( ))`, `let` arguments and array
//! subscripts into an [`ArithExpr`]. Parameter expansion has already run
//! over the text, so only numbers, names and operators remain.
//!
//! Precedence, loosest first:
//!   `,`  assignment ops  `?:`  `||`  `&&`  `|`  `^`  `&`  `== !=`
//!   `< <= > >=`  `<< >>`  `+ -`  `* / %`  `**`  unary  postfix

use thiserror::Error;

use crate::ast::types::{ArithAssignOp, ArithBinaryOp, ArithExpr, ArithUnaryOp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (error token is \"{token}\")")]
pub struct ArithSyntaxError {
    pub message: String,
    pub token: String,
}

impl ArithSyntaxError {
    fn new(message: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            token: token.into(),
        }
    }
}

pub type ArithParseResult<T> = Result<T, ArithSyntaxError>;

#[derive(Debug, Clone, PartialEq)]
enum ArithToken {
    Number(i64),
    Name(String),
    Op(&'static str),
}

const OPERATORS: &[&str] = &[
    "<<=", ">>=", "**", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=",
    "*=", "/=", "%=", "&=", "^=", "|=", "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&",
    "^", "|", "?", ":", ",", "(", ")", "[", "]",
];

/// Parse a number literal: decimal, `0x` hex, leading-zero octal or
/// `base#digits` with a base from 2 to 64.
pub fn parse_number(text: &str) -> ArithParseResult<i64> {
    let invalid = || ArithSyntaxError::new("value too great for base", text);

    if let Some((base, digits)) = text.split_once('#') {
        let base: u32 = base.parse().map_err(|_| invalid())?;
        if !(2..=64).contains(&base) || digits.is_empty() {
            return Err(ArithSyntaxError::new("invalid arithmetic base", text));
        }
        let mut value: i64 = 0;
        for c in digits.chars() {
            let digit = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'a'..='z' => c as u32 - 'a' as u32 + 10,
                'A'..='Z' if base <= 36 => c as u32 - 'A' as u32 + 10,
                'A'..='Z' => c as u32 - 'A' as u32 + 36,
                '@' => 62,
                '_' => 63,
                _ => return Err(invalid()),
            };
            if digit >= base {
                return Err(invalid());
            }
            value = value.wrapping_mul(base as i64).wrapping_add(digit as i64);
        }
        return Ok(value);
    }

    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    if digits.is_empty() {
        return Err(invalid());
    }
    let mut value: i64 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(radix).ok_or_else(invalid)?;
        value = value.wrapping_mul(radix as i64).wrapping_add(digit as i64);
    }
    Ok(value)
}

fn tokenize(input: &str) -> ArithParseResult<Vec<ArithToken>> {
    let chars: Vec<char> = input.chars().filter(|c| *c != '"').collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '#' | '@' | '_')) {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(ArithToken::Number(parse_number(&text)?));
            continue;
        }
        if c == '$' && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') {
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(ArithToken::Name(chars[start..i].iter().collect()));
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push(ArithToken::Op(*op));
                i += op.chars().count();
            }
            None => {
                let remaining: String = chars[i..].iter().collect();
                return Err(ArithSyntaxError::new(
                    "syntax error: invalid arithmetic operator",
                    remaining.trim(),
                ));
            }
        }
    }
    Ok(tokens)
}

fn binary_op(op: &str) -> Option<ArithBinaryOp> {
    Some(match op {
        "+" => ArithBinaryOp::Add,
        "-" => ArithBinaryOp::Sub,
        "*" => ArithBinaryOp::Mul,
        "/" => ArithBinaryOp::Div,
        "%" => ArithBinaryOp::Mod,
        "**" => ArithBinaryOp::Pow,
        "<<" => ArithBinaryOp::Shl,
        ">>" => ArithBinaryOp::Shr,
        "<" => ArithBinaryOp::Lt,
        "<=" => ArithBinaryOp::Le,
        ">" => ArithBinaryOp::Gt,
        ">=" => ArithBinaryOp::Ge,
        "==" => ArithBinaryOp::Eq,
        "!=" => ArithBinaryOp::Ne,
        "&" => ArithBinaryOp::BitAnd,
        "^" => ArithBinaryOp::BitXor,
        "|" => ArithBinaryOp::BitOr,
        "&&" => ArithBinaryOp::LogicalAnd,
        "||" => ArithBinaryOp::LogicalOr,
        _ => return None,
    })
}

fn assign_op(op: &str) -> Option<ArithAssignOp> {
    let inner = match op {
        "=" => None,
        "+=" => Some(ArithBinaryOp::Add),
        "-=" => Some(ArithBinaryOp::Sub),
        "*=" => Some(ArithBinaryOp::Mul),
        "/=" => Some(ArithBinaryOp::Div),
        "%=" => Some(ArithBinaryOp::Mod),
        "<<=" => Some(ArithBinaryOp::Shl),
        ">>=" => Some(ArithBinaryOp::Shr),
        "&=" => Some(ArithBinaryOp::BitAnd),
        "^=" => Some(ArithBinaryOp::BitXor),
        "|=" => Some(ArithBinaryOp::BitOr),
        _ => return None,
    };
    Some(ArithAssignOp { op: inner })
}

/// Binary operator levels from loosest to tightest, starting below `?:`.
const BINARY_LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["|"],
    &["^"],
    &["&"],
    &["==", "!="],
    &["<", "<=", ">", ">="],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "%"],
];

/// Parse an arithmetic expression. Blank input evaluates to zero.
pub fn parse_arithmetic(input: &str) -> ArithParseResult<ArithExpr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(ArithExpr::Number(0));
    }
    let mut parser = ArithParser { tokens, pos: 0 };
    let expr = parser.parse_comma()?;
    if let Some(token) = parser.tokens.get(parser.pos) {
        return Err(ArithSyntaxError::new(
            "syntax error in expression",
            token_text(token),
        ));
    }
    Ok(expr)
}

fn token_text(token: &ArithToken) -> String {
    match token {
        ArithToken::Number(n) => n.to_string(),
        ArithToken::Name(name) => name.clone(),
        ArithToken::Op(op) => op.to_string(),
    }
}

struct ArithParser {
    tokens: Vec<ArithToken>,
    pos: usize,
}

impl ArithParser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(ArithToken::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn eat(&mut self, op: &str) -> bool {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, op: &str) -> ArithParseResult<()> {
        if self.eat(op) {
            return Ok(());
        }
        let found = self.tokens.get(self.pos).map(token_text).unwrap_or_default();
        Err(ArithSyntaxError::new(format!("`{}' expected", op), found))
    }

    fn missing_operand(&self) -> ArithSyntaxError {
        let found = self.tokens.get(self.pos).map(token_text).unwrap_or_default();
        ArithSyntaxError::new("syntax error: operand expected", found)
    }

    fn parse_comma(&mut self) -> ArithParseResult<ArithExpr> {
        let mut left = self.parse_assign()?;
        while self.eat(",") {
            let right = self.parse_assign()?;
            left = ArithExpr::Comma(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_assign(&mut self) -> ArithParseResult<ArithExpr> {
        let target = self.parse_ternary()?;
        let Some(op) = self.peek_op().and_then(assign_op) else {
            return Ok(target);
        };
        let ArithExpr::Variable { name, index } = target else {
            return Err(ArithSyntaxError::new(
                "attempted assignment to non-variable",
                self.peek_op().unwrap_or_default(),
            ));
        };
        self.pos += 1;
        let value = self.parse_assign()?;
        Ok(ArithExpr::Assign {
            op,
            name,
            index,
            value: Box::new(value),
        })
    }

    fn parse_ternary(&mut self) -> ArithParseResult<ArithExpr> {
        let condition = self.parse_binary(0)?;
        if !self.eat("?") {
            return Ok(condition);
        }
        let when_true = self.parse_assign()?;
        self.expect(":")?;
        let when_false = self.parse_assign()?;
        Ok(ArithExpr::Ternary(
            Box::new(condition),
            Box::new(when_true),
            Box::new(when_false),
        ))
    }

    fn parse_binary(&mut self, level: usize) -> ArithParseResult<ArithExpr> {
        if level >= BINARY_LEVELS.len() {
            return self.parse_power();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = self.peek_op().filter(|op| BINARY_LEVELS[level].contains(op)) {
            self.pos += 1;
            let right = self.parse_binary(level + 1)?;
            let Some(bin) = binary_op(op) else {
                return Err(ArithSyntaxError::new("unknown operator", op));
            };
            left = ArithExpr::Binary(bin, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// `**` is right associative and binds tighter than `*`.
    fn parse_power(&mut self) -> ArithParseResult<ArithExpr> {
        let base = self.parse_unary()?;
        if self.eat("**") {
            let exponent = self.parse_power()?;
            return Ok(ArithExpr::Binary(ArithBinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> ArithParseResult<ArithExpr> {
        let Some(op) = self.peek_op() else {
            return self.parse_postfix();
        };
        let unary = match op {
            "+" => ArithUnaryOp::Plus,
            "-" => ArithUnaryOp::Minus,
            "!" => ArithUnaryOp::Not,
            "~" => ArithUnaryOp::BitNot,
            "++" | "--" => {
                self.pos += 1;
                let delta = if op == "++" { 1 } else { -1 };
                if let Some(ArithToken::Name(_)) = self.tokens.get(self.pos) {
                    let (name, index) = self.parse_name_reference()?;
                    return Ok(ArithExpr::Update {
                        name,
                        index,
                        delta,
                        prefix: true,
                    });
                }
                // `--5` is two negations
                let inner = self.parse_unary()?;
                let sign = if delta > 0 {
                    ArithUnaryOp::Plus
                } else {
                    ArithUnaryOp::Minus
                };
                return Ok(ArithExpr::Unary(
                    sign,
                    Box::new(ArithExpr::Unary(sign, Box::new(inner))),
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(ArithExpr::Unary(unary, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> ArithParseResult<ArithExpr> {
        let primary = self.parse_primary()?;
        if let ArithExpr::Variable { name, index } = &primary {
            let delta = match self.peek_op() {
                Some("++") => 1,
                Some("--") => -1,
                _ => return Ok(primary),
            };
            self.pos += 1;
            return Ok(ArithExpr::Update {
                name: name.clone(),
                index: index.clone(),
                delta,
                prefix: false,
            });
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> ArithParseResult<ArithExpr> {
        match self.tokens.get(self.pos).cloned() {
            Some(ArithToken::Number(n)) => {
                self.pos += 1;
                Ok(ArithExpr::Number(n))
            }
            Some(ArithToken::Name(_)) => {
                let (name, index) = self.parse_name_reference()?;
                Ok(ArithExpr::Variable { name, index })
            }
            Some(ArithToken::Op("(")) => {
                self.pos += 1;
                let inner = self.parse_comma()?;
                self.expect(")")?;
                Ok(inner)
            }
            _ => Err(self.missing_operand()),
        }
    }

    /// `name` or `name[expr]`
    fn parse_name_reference(&mut self) -> ArithParseResult<(String, Option<Box<ArithExpr>>)> {
        let Some(ArithToken::Name(name)) = self.tokens.get(self.pos).cloned() else {
            return Err(self.missing_operand());
        };
        self.pos += 1;
        if self.eat("[") {
            let index = self.parse_comma()?;
            self.expect("]")?;
            return Ok((name, Some(Box::new(index))));
        }
        Ok((name, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: i64) -> Box<ArithExpr> {
        Box::new(ArithExpr::Number(n))
    }

    #[test]
    fn test_parse_number_bases() {
        assert_eq!(parse_number("42").unwrap(), 42);
        assert_eq!(parse_number("0x1F").unwrap(), 31);
        assert_eq!(parse_number("017").unwrap(), 15);
        assert_eq!(parse_number("2#1010").unwrap(), 10);
        assert_eq!(parse_number("36#z").unwrap(), 35);
        assert_eq!(parse_number("64#_").unwrap(), 63);
        assert!(parse_number("09").is_err());
        assert!(parse_number("2#2").is_err());
        assert!(parse_number("65#1").is_err());
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_arithmetic("1 + 2 * 3").unwrap(),
            ArithExpr::Binary(
                ArithBinaryOp::Add,
                num(1),
                Box::new(ArithExpr::Binary(ArithBinaryOp::Mul, num(2), num(3)))
            )
        );
    }

    #[test]
    fn test_power_right_associative() {
        assert_eq!(
            parse_arithmetic("2 ** 3 ** 2").unwrap(),
            ArithExpr::Binary(
                ArithBinaryOp::Pow,
                num(2),
                Box::new(ArithExpr::Binary(ArithBinaryOp::Pow, num(3), num(2)))
            )
        );
    }

    #[test]
    fn test_assignment_chain() {
        match parse_arithmetic("a = b += 2").unwrap() {
            ArithExpr::Assign { name, value, .. } => {
                assert_eq!(name, "a");
                assert!(matches!(*value, ArithExpr::Assign { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_increments() {
        assert!(matches!(
            parse_arithmetic("i++").unwrap(),
            ArithExpr::Update { prefix: false, delta: 1, .. }
        ));
        assert!(matches!(
            parse_arithmetic("--arr[2]").unwrap(),
            ArithExpr::Update { prefix: true, delta: -1, index: Some(_), .. }
        ));
        assert!(matches!(parse_arithmetic("--5").unwrap(), ArithExpr::Unary(..)));
    }

    #[test]
    fn test_ternary_and_comma() {
        assert!(matches!(parse_arithmetic("a ? 1 : 2").unwrap(), ArithExpr::Ternary(..)));
        assert!(matches!(parse_arithmetic("x=1, y=2").unwrap(), ArithExpr::Comma(..)));
    }

    #[test]
    fn test_blank_is_zero() {
        assert_eq!(parse_arithmetic("  ").unwrap(), ArithExpr::Number(0));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_arithmetic("1 +").is_err());
        assert!(parse_arithmetic("(1").is_err());
        assert!(parse_arithmetic("1 2").is_err());
        assert!(parse_arithmetic("3 = 4").is_err());
        assert!(parse_arithmetic("1 @ 2").is_err());
    }
}
