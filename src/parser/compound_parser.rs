//! Compound Command Parser
//!
//! Handles parsing of compound commands: if, while, until, for, select, case,
//! subshell, group, arithmetic commands and function definitions. Each body
//! is parsed with the top-level list parser, so nesting needs no extra
//! bookkeeping: an inner `do ... done` is consumed by the inner loop's call.

use crate::ast::types::{
    ArithCommand, CaseCommand, CaseItem, CaseTerminator, Command, CommandList, ForArithCommand,
    ForCommand, FunctionDef, IfClause, IfCommand, LoopCommand, Pipeline, Word,
};
use crate::parser::brace_expansion::expand_braces;
use crate::parser::lexer::TokenType;
use crate::parser::parser::Parser;
use crate::parser::types::{is_valid_name, ParseError, ParseResult};

/// Split the inside of `for (( ... ))` on its two top-level semicolons.
pub fn split_arith_for(expr: &str) -> Option<(String, String, String)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in expr.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
                continue;
            }
            None => {}
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ';' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    if parts.len() != 3 {
        return None;
    }
    let update = parts.pop()?;
    let condition = parts.pop()?;
    let init = parts.pop()?;
    Some((init, condition, update))
}

impl<'a> Parser<'a> {
    /// A command list that must contain at least one statement.
    fn parse_required_list(&mut self) -> ParseResult<CommandList> {
        let list = self.parse_list()?;
        if list.is_empty() {
            return Err(self.unexpected_token());
        }
        Ok(list)
    }

    /// Skip `;` and newlines before a `do`/`then` style keyword.
    fn skip_separators(&mut self) {
        while self.check(TokenType::Semicolon) || self.check(TokenType::Newline) {
            self.advance();
        }
    }

    pub(crate) fn parse_if(&mut self) -> ParseResult<Command> {
        self.expect_keyword("if")?;
        let mut clauses = Vec::new();

        let condition = self.parse_required_list()?;
        self.expect_keyword("then")?;
        let body = self.parse_required_list()?;
        clauses.push(IfClause { condition, body });

        let mut else_body = None;
        loop {
            if self.current().is_word("elif") {
                self.advance();
                let condition = self.parse_required_list()?;
                self.expect_keyword("then")?;
                let body = self.parse_required_list()?;
                clauses.push(IfClause { condition, body });
            } else if self.current().is_word("else") {
                self.advance();
                else_body = Some(self.parse_required_list()?);
            } else {
                break;
            }
        }
        self.expect_keyword("fi")?;

        Ok(Command::If(IfCommand { clauses, else_body }))
    }

    /// `while` or, with `until` set, `until`.
    pub(crate) fn parse_while(&mut self, until: bool) -> ParseResult<Command> {
        self.advance();
        let condition = self.parse_required_list()?;
        let body = self.parse_do_group()?;
        let node = LoopCommand { condition, body };
        Ok(if until {
            Command::Until(node)
        } else {
            Command::While(node)
        })
    }

    /// `do list done`
    fn parse_do_group(&mut self) -> ParseResult<CommandList> {
        self.expect_keyword("do")?;
        let body = self.parse_required_list()?;
        self.expect_keyword("done")?;
        Ok(body)
    }

    pub(crate) fn parse_for(&mut self) -> ParseResult<Command> {
        let for_token = self.advance();

        if self.check(TokenType::DParenExpr) {
            let expr = self.advance();
            let (init, condition, update) = split_arith_for(&expr.value).ok_or_else(|| {
                ParseError::syntax("arithmetic for loop needs three expressions", expr.line)
            })?;
            self.skip_separators();
            let body = self.parse_do_group()?;
            return Ok(Command::ForArith(ForArithCommand {
                init,
                condition,
                update,
                body,
                line: for_token.line,
            }));
        }

        Ok(Command::For(self.parse_for_clause()?))
    }

    pub(crate) fn parse_select(&mut self) -> ParseResult<Command> {
        self.advance();
        Ok(Command::Select(self.parse_for_clause()?))
    }

    /// `name [in words] ; do list done`, shared by `for` and `select`.
    fn parse_for_clause(&mut self) -> ParseResult<ForCommand> {
        if self.at_eof() {
            return Err(ParseError::incomplete("loop variable", self.current().line));
        }
        let name_token = self.advance();
        if name_token.token_type != TokenType::Word || !is_valid_name(&name_token.value) {
            return Err(ParseError::syntax(
                format!("`{}': not a valid identifier", name_token.value),
                name_token.line,
            ));
        }

        self.skip_newlines();
        let mut words = None;
        if self.current().is_word("in") {
            self.advance();
            let mut list = Vec::new();
            while self.check(TokenType::Word) {
                let token = self.advance();
                for text in expand_braces(&token.value) {
                    list.push(Word::new(text, token.quoted, token.expand));
                }
            }
            words = Some(list);
        }
        self.skip_separators();
        let body = self.parse_do_group()?;

        Ok(ForCommand {
            variable: name_token.value,
            words,
            body,
        })
    }

    pub(crate) fn parse_case(&mut self) -> ParseResult<Command> {
        self.advance();
        if self.at_eof() {
            return Err(ParseError::incomplete("case word", self.current().line));
        }
        if !self.check(TokenType::Word) {
            return Err(self.unexpected_token());
        }
        let subject_token = self.advance();
        let subject = Word::new(subject_token.value, subject_token.quoted, subject_token.expand);
        self.skip_newlines();
        self.expect_keyword("in")?;

        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.current().is_word("esac") {
                self.advance();
                break;
            }
            if self.at_eof() {
                return Err(ParseError::incomplete("`esac'", self.current().line));
            }

            if self.check(TokenType::LParen) {
                self.advance();
            }
            let mut patterns = Vec::new();
            loop {
                if !self.check(TokenType::Word) {
                    return Err(self.unexpected_token());
                }
                let token = self.advance();
                patterns.push(Word::new(token.value, token.quoted, token.expand));
                if self.check(TokenType::Pipe) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(TokenType::RParen)?;

            let body = self.parse_list()?;
            let terminator = match self.current().token_type {
                TokenType::DSemi => CaseTerminator::Break,
                TokenType::SemiAnd => CaseTerminator::FallThrough,
                TokenType::SemiSemiAnd => CaseTerminator::ContinueMatching,
                _ => {
                    if !self.current().is_word("esac") {
                        if self.at_eof() {
                            return Err(ParseError::incomplete("`esac'", self.current().line));
                        }
                        return Err(self.unexpected_token());
                    }
                    items.push(CaseItem {
                        patterns,
                        body,
                        terminator: CaseTerminator::Break,
                    });
                    continue;
                }
            };
            self.advance();
            items.push(CaseItem {
                patterns,
                body,
                terminator,
            });
        }

        Ok(Command::Case(CaseCommand { subject, items }))
    }

    pub(crate) fn parse_subshell(&mut self) -> ParseResult<Command> {
        self.expect(TokenType::LParen)?;
        let body = self.parse_required_list()?;
        self.expect(TokenType::RParen)?;
        Ok(Command::Subshell(body))
    }

    pub(crate) fn parse_group(&mut self) -> ParseResult<Command> {
        self.expect_keyword("{")?;
        let body = self.parse_required_list()?;
        self.expect_keyword("}")?;
        Ok(Command::Group(body))
    }

    pub(crate) fn parse_arithmetic_command(&mut self) -> ParseResult<Command> {
        let token = self.expect(TokenType::DParenExpr)?;
        Ok(Command::Arithmetic(ArithCommand {
            expression: token.value,
            line: token.line,
        }))
    }

    /// `name () compound` or `function name [()] compound`.
    pub(crate) fn parse_function_def(&mut self) -> ParseResult<Command> {
        let start = self.current().start;
        let line = self.current().line;

        if self.current().is_word("function") {
            self.advance();
        }
        if !self.check(TokenType::Word) {
            if self.at_eof() {
                return Err(ParseError::incomplete("function name", line));
            }
            return Err(self.unexpected_token());
        }
        let name = self.advance().value;
        if name.contains(['$', '`', '=']) {
            return Err(ParseError::syntax(format!("`{}': not a valid identifier", name), line));
        }
        if self.check(TokenType::LParen) {
            self.advance();
            self.expect(TokenType::RParen)?;
        }
        self.skip_newlines();
        if self.at_eof() {
            return Err(ParseError::incomplete("function body", self.current().line));
        }

        let segment = self.parse_segment()?;
        if segment.compound.is_none() {
            return Err(ParseError::syntax(
                format!("function `{}' needs a compound command body", name),
                line,
            ));
        }
        let body = if segment.redirections.is_empty() {
            match segment.compound {
                Some(compound) => *compound,
                None => return Err(ParseError::syntax("missing function body", line)),
            }
        } else {
            Command::Pipeline(Pipeline {
                segments: vec![segment],
            })
        };

        Ok(Command::FunctionDef(FunctionDef {
            name,
            body: Box::new(body),
            source_text: self.source_slice(start, self.last_end()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parser::parse;

    #[test]
    fn test_split_arith_for() {
        assert_eq!(split_arith_for("i=0; i<3"), None);
        assert_eq!(
            split_arith_for("i=0; i<(3;4); i++").map(|(_, cond, _)| cond),
            Some(" i<(3;4)".to_string())
        );
        assert_eq!(
            split_arith_for("i=0; i<f(1); i++"),
            Some(("i=0".to_string(), " i<f(1)".to_string(), " i++".to_string()))
        );
        assert_eq!(
            split_arith_for(";;"),
            Some((String::new(), String::new(), String::new()))
        );
    }

    #[test]
    fn test_for_without_in_iterates_positionals() {
        let list = parse("for arg; do echo $arg; done").unwrap();
        match &list.entries[0].command {
            Command::For(node) => assert!(node.words.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_for_words_brace_expanded() {
        let list = parse("for i in {1..3} x; do :; done").unwrap();
        match &list.entries[0].command {
            Command::For(node) => {
                let words: Vec<&str> = node
                    .words
                    .as_ref()
                    .unwrap()
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect();
                assert_eq!(words, vec!["1", "2", "3", "x"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_select_parses() {
        let list = parse("select x in a b\ndo\n break\ndone").unwrap();
        assert!(matches!(list.entries[0].command, Command::Select(_)));
    }

    #[test]
    fn test_case_last_item_without_terminator() {
        let list = parse("case a in\n a) echo yes\nesac").unwrap();
        match &list.entries[0].command {
            Command::Case(node) => assert_eq!(node.items.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_with_redirections() {
        let list = parse("f() { echo hi; } > out").unwrap();
        match &list.entries[0].command {
            Command::FunctionDef(def) => {
                assert!(matches!(*def.body, Command::Pipeline(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_needs_compound_body() {
        assert!(parse("f() echo hi").is_err());
    }

    #[test]
    fn test_empty_group_is_error() {
        assert!(parse("{ }").is_err());
    }
}
