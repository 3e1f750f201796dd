//! Command Parser
//!
//! Handles parsing of pipeline segments: simple commands with their leading
//! assignments and redirections, and the dispatch to compound commands.

use crate::ast::types::{
    Assignment, AssignmentValue, Command, PipelineSegment, Redirection, RedirectionOp, Word,
};
use crate::parser::brace_expansion::expand_braces;
use crate::parser::lexer::{Token, TokenType};
use crate::parser::parser::Parser;
use crate::parser::types::{
    is_list_terminator_word, is_redirection_token, is_valid_name, ParseError, ParseResult,
};

/// Split `NAME=value`, `NAME+=value` or `NAME[idx]=value` into its parts.
///
/// Returns `None` when the word is not an assignment (the name part must be
/// unquoted and valid).
pub fn split_assignment(raw: &str) -> Option<(String, Option<String>, bool, String)> {
    let name_len = raw
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
        .last()
        .map(|(i, c)| i + c.len_utf8())?;
    let name = &raw[..name_len];
    if !is_valid_name(name) {
        return None;
    }
    let mut rest = &raw[name_len..];

    let mut index = None;
    if rest.starts_with('[') {
        let mut depth = 0usize;
        let mut close = None;
        for (i, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = close?;
        index = Some(rest[1..close].to_string());
        rest = &rest[close + 1..];
    }

    let (append, value) = if let Some(v) = rest.strip_prefix("+=") {
        (true, v)
    } else if let Some(v) = rest.strip_prefix('=') {
        (false, v)
    } else {
        return None;
    };
    Some((name.to_string(), index, append, value.to_string()))
}

fn word_from_token(token: &Token) -> Word {
    Word::new(token.value.clone(), token.quoted, token.expand)
}

/// Brace-expand a word token into one or more words.
fn expand_word_token(token: &Token) -> Vec<Word> {
    if !token.value.contains('{') {
        return vec![word_from_token(token)];
    }
    expand_braces(&token.value)
        .into_iter()
        .map(|text| Word::new(text, token.quoted, token.expand))
        .collect()
}

impl<'a> Parser<'a> {
    /// Parse one pipeline segment in command position.
    pub(crate) fn parse_segment(&mut self) -> ParseResult<PipelineSegment> {
        self.expand_alias_at_cursor()?;
        let line = self.current().line;
        let token = self.current().clone();

        let compound = match token.token_type {
            TokenType::DParenExpr => Some(self.parse_arithmetic_command()?),
            TokenType::LParen => Some(self.parse_subshell()?),
            TokenType::Word if !token.quoted => match token.value.as_str() {
                "if" => Some(self.parse_if()?),
                "while" => Some(self.parse_while(false)?),
                "until" => Some(self.parse_while(true)?),
                "for" => Some(self.parse_for()?),
                "select" => Some(self.parse_select()?),
                "case" => Some(self.parse_case()?),
                "{" => Some(self.parse_group()?),
                "[[" => Some(self.parse_conditional()?),
                "function" => Some(self.parse_function_def()?),
                word if is_list_terminator_word(word) => return Err(self.unexpected_token()),
                _ if self.is_function_def_start() => Some(self.parse_function_def()?),
                _ => None,
            },
            TokenType::Word | TokenType::IoNumber => None,
            t if is_redirection_token(t) => None,
            _ => return Err(self.unexpected_token()),
        };

        match compound {
            Some(command) => {
                let redirections = if matches!(command, Command::FunctionDef(_)) {
                    Vec::new()
                } else {
                    self.parse_trailing_redirections()?
                };
                Ok(PipelineSegment {
                    compound: Some(Box::new(command)),
                    redirections,
                    line,
                    ..Default::default()
                })
            }
            None => self.parse_simple_command(line),
        }
    }

    /// `name ( )` in command position. `NAME=( )` is an empty array
    /// assignment instead.
    fn is_function_def_start(&self) -> bool {
        let token = self.current();
        token.token_type == TokenType::Word
            && !token.quoted
            && !token.expand
            && split_assignment(&token.value).is_none()
            && self.peek(1).is_some_and(|t| t.token_type == TokenType::LParen)
            && self.peek(2).is_some_and(|t| t.token_type == TokenType::RParen)
    }

    /// Redirections following a compound command.
    pub(crate) fn parse_trailing_redirections(&mut self) -> ParseResult<Vec<Redirection>> {
        let mut redirections = Vec::new();
        while self.check(TokenType::IoNumber) || is_redirection_token(self.current().token_type) {
            redirections.push(self.parse_redirection()?);
        }
        Ok(redirections)
    }

    fn parse_simple_command(&mut self, line: usize) -> ParseResult<PipelineSegment> {
        let mut segment = PipelineSegment {
            line,
            ..Default::default()
        };

        loop {
            let token_type = self.current().token_type;
            if token_type == TokenType::IoNumber || is_redirection_token(token_type) {
                segment.redirections.push(self.parse_redirection()?);
                continue;
            }
            if token_type != TokenType::Word {
                break;
            }

            if segment.words.is_empty() {
                if let Some(parts) = split_assignment(&self.current().value) {
                    let assignment = self.parse_assignment(parts)?;
                    segment.assignments.push(assignment);
                    continue;
                }
            } else if self.alias_next_word {
                self.alias_next_word = false;
                self.expand_alias_at_cursor()?;
                if self.current().token_type != TokenType::Word {
                    continue;
                }
            }

            let token = self.advance();
            segment.words.extend(expand_word_token(&token));
        }

        if segment.words.is_empty()
            && segment.assignments.is_empty()
            && segment.redirections.is_empty()
        {
            return Err(self.unexpected_token());
        }
        if self.check(TokenType::LParen) {
            return Err(self.unexpected_token());
        }
        Ok(segment)
    }

    /// Consume the assignment word at the cursor; `NAME=(...)` also consumes
    /// the parenthesized element list.
    fn parse_assignment(
        &mut self,
        (name, index, append, value): (String, Option<String>, bool, String),
    ) -> ParseResult<Assignment> {
        let token = self.advance();
        let opens_array = value.is_empty()
            && index.is_none()
            && self
                .peek(0)
                .is_some_and(|next| next.token_type == TokenType::LParen && next.start == token.end);

        if !opens_array {
            let quoted = value.contains(['\'', '"', '\\']);
            let expand = value.contains(['$', '`']) || value.contains('~');
            return Ok(Assignment {
                name,
                index,
                value: AssignmentValue::Scalar(Word::new(value, quoted, expand)),
                append,
            });
        }

        self.advance();
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            let current = self.current().clone();
            match current.token_type {
                TokenType::RParen => {
                    self.advance();
                    break;
                }
                TokenType::Word => {
                    self.advance();
                    items.extend(expand_word_token(&current));
                }
                TokenType::Eof => {
                    return Err(ParseError::incomplete("`)' to close array", current.line));
                }
                _ => return Err(self.unexpected_token()),
            }
        }

        Ok(Assignment {
            name,
            index,
            value: AssignmentValue::Array(items),
            append,
        })
    }

    /// Parse `[n]op target`.
    pub(crate) fn parse_redirection(&mut self) -> ParseResult<Redirection> {
        let fd = if self.check(TokenType::IoNumber) {
            let token = self.advance();
            match token.value.parse::<i32>() {
                Ok(fd) => Some(fd),
                Err(_) => return Err(ParseError::syntax("bad file descriptor", token.line)),
            }
        } else {
            None
        };

        let op_token = self.advance();
        let op = match op_token.token_type {
            TokenType::Less => RedirectionOp::Input,
            TokenType::Great => RedirectionOp::Output,
            TokenType::DGreat => RedirectionOp::Append,
            TokenType::Clobber => RedirectionOp::Clobber,
            TokenType::LessGreat => RedirectionOp::ReadWrite,
            TokenType::AndGreat => RedirectionOp::OutputAll,
            TokenType::AndDGreat => RedirectionOp::AppendAll,
            TokenType::LessAnd => RedirectionOp::DupInput,
            TokenType::GreatAnd => RedirectionOp::DupOutput,
            TokenType::DLess | TokenType::DLessDash => RedirectionOp::HereDoc,
            TokenType::TLess => RedirectionOp::HereString,
            _ => return Err(ParseError::unexpected(op_token.value, op_token.line)),
        };

        if !self.check(TokenType::Word) {
            return Err(self.unexpected_token());
        }
        let target = self.advance();

        let mut redirection = Redirection::new(fd, op, word_from_token(&target));
        if op == RedirectionOp::HereDoc {
            match target.heredoc {
                Some(heredoc) => redirection.heredoc = Some(heredoc),
                None => {
                    return Err(ParseError::incomplete(
                        format!("here-document delimiter `{}'", target.value),
                        target.line,
                    ))
                }
            }
        }
        Ok(redirection)
    }
}
