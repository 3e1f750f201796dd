//! Conditional Expression Parser
//!
//! Handles parsing of `[[ ... ]]` conditional commands. Precedence from
//! loosest to tightest is `||`, `&&`, `!`, then primaries (a parenthesized
//! expression, a unary test, a binary test or a bare word).

use crate::ast::types::{CondBinaryOp, CondExpr, Command, Word};
use crate::parser::lexer::{Token, TokenType};
use crate::parser::parser::Parser;
use crate::parser::types::{ParseError, ParseResult};

/// Unary operators for conditional expressions
pub const UNARY_OPS: &[&str] = &[
    "-a", "-b", "-c", "-d", "-e", "-f", "-g", "-h", "-k", "-p", "-r", "-s", "-t", "-u", "-w", "-x",
    "-G", "-L", "-N", "-O", "-S", "-z", "-n", "-o", "-v", "-R",
];

fn operand_word(token: &Token) -> Word {
    Word::new(token.value.clone(), token.quoted, token.expand)
}

impl<'a> Parser<'a> {
    pub(crate) fn parse_conditional(&mut self) -> ParseResult<Command> {
        self.expect_keyword("[[")?;
        self.skip_newlines();
        if self.current().is_word("]]") {
            return Err(self.unexpected_token());
        }
        let expr = self.parse_cond_or()?;
        self.skip_newlines();
        self.expect_keyword("]]")?;
        Ok(Command::Conditional(expr))
    }

    fn parse_cond_or(&mut self) -> ParseResult<CondExpr> {
        let mut left = self.parse_cond_and()?;
        loop {
            self.skip_newlines();
            if !self.check(TokenType::OrOr) {
                return Ok(left);
            }
            self.advance();
            self.skip_newlines();
            let right = self.parse_cond_and()?;
            left = CondExpr::Or(Box::new(left), Box::new(right));
        }
    }

    fn parse_cond_and(&mut self) -> ParseResult<CondExpr> {
        let mut left = self.parse_cond_not()?;
        loop {
            self.skip_newlines();
            if !self.check(TokenType::AndAnd) {
                return Ok(left);
            }
            self.advance();
            self.skip_newlines();
            let right = self.parse_cond_not()?;
            left = CondExpr::And(Box::new(left), Box::new(right));
        }
    }

    fn parse_cond_not(&mut self) -> ParseResult<CondExpr> {
        self.skip_newlines();
        if self.current().is_word("!") {
            self.advance();
            let inner = self.parse_cond_not()?;
            return Ok(CondExpr::Not(Box::new(inner)));
        }
        self.parse_cond_primary()
    }

    /// Take the next token as an operand; `]]` and operators are rejected.
    fn cond_operand(&mut self) -> ParseResult<Token> {
        if self.at_eof() {
            return Err(ParseError::incomplete("`]]'", self.current().line));
        }
        if !self.check(TokenType::Word) || self.current().is_word("]]") {
            return Err(self.unexpected_token());
        }
        Ok(self.advance())
    }

    fn parse_cond_primary(&mut self) -> ParseResult<CondExpr> {
        if self.check(TokenType::LParen) {
            self.advance();
            let inner = self.parse_cond_or()?;
            self.skip_newlines();
            self.expect(TokenType::RParen)?;
            return Ok(inner);
        }

        let first = self.cond_operand()?;

        if !first.quoted && UNARY_OPS.contains(&first.value.as_str()) {
            let has_operand = self.check(TokenType::Word) && !self.current().is_word("]]");
            if has_operand && !self.at_binary_operator() {
                let operand = self.advance();
                return Ok(CondExpr::Unary {
                    op: first.value,
                    operand: operand_word(&operand),
                });
            }
        }

        let left = operand_word(&first);
        if self.current().is_word("=~") {
            self.advance();
            let pattern = self.read_regex_text()?;
            return Ok(CondExpr::Regex { left, pattern });
        }

        let op = match self.current().token_type {
            TokenType::Less => Some(CondBinaryOp::StrLess),
            TokenType::Great => Some(CondBinaryOp::StrGreater),
            TokenType::Word if !self.current().quoted => CondBinaryOp::from_str(&self.current().value),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(CondExpr::Word(left));
        };
        self.advance();
        let right = self.cond_operand()?;
        Ok(CondExpr::Binary {
            op,
            left,
            right: operand_word(&right),
        })
    }

    fn at_binary_operator(&self) -> bool {
        let token = self.current();
        match token.token_type {
            TokenType::Less | TokenType::Great => true,
            TokenType::Word if !token.quoted => {
                token.value == "=~" || CondBinaryOp::from_str(&token.value).is_some()
            }
            _ => false,
        }
    }

    /// Raw source of the regex operand: every token up to `]]`, `&&` or `||`
    /// outside parentheses.
    fn read_regex_text(&mut self) -> ParseResult<String> {
        let start = self.current().start;
        let mut end = start;
        let mut depth = 0usize;
        loop {
            let token = self.current();
            match token.token_type {
                TokenType::Eof => {
                    return Err(ParseError::incomplete("`]]'", token.line));
                }
                TokenType::Newline if depth == 0 => break,
                TokenType::AndAnd | TokenType::OrOr if depth == 0 => break,
                TokenType::Word if depth == 0 && token.is_word("]]") => break,
                TokenType::LParen => depth += 1,
                TokenType::RParen => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            end = self.current().end;
            self.advance();
        }
        if end == start {
            return Err(self.unexpected_token());
        }
        Ok(self.source_slice(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parser::parse;

    fn cond(input: &str) -> CondExpr {
        match parse(input).unwrap().entries.remove(0).command {
            Command::Conditional(expr) => expr,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unary_and_binary() {
        assert!(matches!(cond("[[ -z $x ]]"), CondExpr::Unary { .. }));
        assert!(matches!(
            cond("[[ $a -lt 3 ]]"),
            CondExpr::Binary { op: CondBinaryOp::NumLt, .. }
        ));
        assert!(matches!(
            cond("[[ a < b ]]"),
            CondExpr::Binary { op: CondBinaryOp::StrLess, .. }
        ));
    }

    #[test]
    fn test_operator_word_as_operand() {
        assert!(matches!(cond("[[ -n ]]"), CondExpr::Word(_)));
        assert!(matches!(
            cond("[[ -f == -f ]]"),
            CondExpr::Binary { op: CondBinaryOp::PatternEq, .. }
        ));
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        match cond("[[ ! a && b ]]") {
            CondExpr::And(left, _) => assert!(matches!(*left, CondExpr::Not(_))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_regex_stops_at_logical_operator() {
        match cond("[[ $x =~ [0-9]+ && -n $y ]]") {
            CondExpr::And(left, _) => match *left {
                CondExpr::Regex { pattern, .. } => assert_eq!(pattern, "[0-9]+"),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_conditional_is_incomplete() {
        assert!(parse("[[ -f x").unwrap_err().is_incomplete());
        assert!(parse("[[ ]]").is_err());
    }
}
