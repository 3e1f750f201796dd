//! Recursive Descent Parser for shell input
//!
//! This parser consumes tokens from the lexer and produces an AST.
//!
//! Grammar (simplified):
//!   program      ::= list EOF
//!   list         ::= and_or ((';' | '&' | NEWLINE) and_or)*
//!   and_or       ::= pipeline (('&&' | '||') NEWLINE* pipeline)*
//!   pipeline     ::= ['time'] ['!'] segment ('|' NEWLINE* segment)*
//!   segment      ::= function_def | compound redirection* | simple_command
//!   simple_cmd   ::= (assignment | redirection)* (word | redirection)*
//!   compound     ::= if | while | until | for | select | case | '(' list ')'
//!                  | '{' list '}' | '((' expr '))' | '[[' cond ']]'
//!
//! Aliases are spliced into the token stream when a word in command
//! position names one; see [`AliasLookup`].

use std::collections::HashMap;

use crate::ast::types::{Command, CommandList, ListEntry, ListOperator, Pipeline};
use crate::parser::lexer::{tokenize, Token, TokenType};
use crate::parser::types::{
    is_list_terminator_word, ParseError, ParseResult, DEFAULT_MAX_ALIAS_DEPTH, MAX_PARSER_DEPTH,
};

/// Read access to alias definitions while parsing.
pub trait AliasLookup {
    fn lookup_alias(&self, name: &str) -> Option<&str>;
}

impl AliasLookup for HashMap<String, String> {
    fn lookup_alias(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// Parse a complete program without alias expansion.
pub fn parse(input: &str) -> ParseResult<CommandList> {
    Parser::new(input)?.parse_program()
}

/// Parser state over a fully tokenized input.
pub struct Parser<'a> {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    input: Vec<char>,
    aliases: Option<&'a dyn AliasLookup>,
    max_alias_depth: usize,
    /// Aliases currently being expanded, with the token index their text ends at
    active_aliases: Vec<(String, usize)>,
    /// Previous alias value ended in a blank: alias-expand the next word too
    pub(crate) alias_next_word: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Tokenize `input` and prepare a parser over it.
    pub fn new(input: &str) -> ParseResult<Self> {
        let tokens = tokenize(input)?;
        Ok(Self {
            tokens,
            pos: 0,
            input: input.chars().collect(),
            aliases: None,
            max_alias_depth: DEFAULT_MAX_ALIAS_DEPTH,
            active_aliases: Vec::new(),
            alias_next_word: false,
            depth: 0,
        })
    }

    /// Enable first-word alias expansion.
    pub fn with_aliases(mut self, aliases: &'a dyn AliasLookup, max_depth: usize) -> Self {
        self.aliases = Some(aliases);
        self.max_alias_depth = max_depth;
        self
    }

    /// Parse the whole input as one command list.
    pub fn parse_program(&mut self) -> ParseResult<CommandList> {
        let list = self.parse_list()?;
        if !self.at_eof() {
            return Err(self.unexpected_token());
        }
        Ok(list)
    }

    // ===========================================================================
    // HELPER METHODS
    // ===========================================================================

    pub(crate) fn current(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    pub(crate) fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn check(&self, token_type: TokenType) -> bool {
        self.current().token_type == token_type
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.check(TokenType::Eof)
    }

    /// Source text between two character offsets.
    pub(crate) fn source_slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.input.len());
        if start >= end {
            return String::new();
        }
        self.input[start..end].iter().collect()
    }

    /// End offset of the most recently consumed token.
    pub(crate) fn last_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.end)
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.check(TokenType::Newline) {
            self.advance();
        }
    }

    /// Error for the current token; running out of input asks for more.
    pub(crate) fn unexpected_token(&self) -> ParseError {
        let token = self.current();
        match token.token_type {
            TokenType::Eof => ParseError::incomplete("command", token.line),
            TokenType::Newline => ParseError::unexpected("newline", token.line),
            _ => ParseError::unexpected(token.value.clone(), token.line),
        }
    }

    /// Consume the reserved word `keyword` or fail.
    pub(crate) fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        if self.current().is_word(keyword) {
            self.advance();
            return Ok(());
        }
        if self.at_eof() {
            return Err(ParseError::incomplete(format!("`{}'", keyword), self.current().line));
        }
        Err(self.unexpected_token())
    }

    pub(crate) fn expect(&mut self, token_type: TokenType) -> ParseResult<Token> {
        if self.check(token_type) {
            return Ok(self.advance());
        }
        if self.at_eof() {
            return Err(ParseError::incomplete(
                format!("`{}'", token_type.as_str()),
                self.current().line,
            ));
        }
        Err(self.unexpected_token())
    }

    /// Tokens that end a command list: EOF, `)`, case terminators and
    /// closing reserved words in command position.
    fn at_list_end(&self) -> bool {
        let token = self.current();
        match token.token_type {
            TokenType::Eof
            | TokenType::RParen
            | TokenType::DSemi
            | TokenType::SemiAnd
            | TokenType::SemiSemiAnd => true,
            TokenType::Word => !token.quoted && is_list_terminator_word(&token.value),
            _ => false,
        }
    }

    // ===========================================================================
    // ALIASES
    // ===========================================================================

    /// Replace the word at the cursor by its alias text, repeatedly, while it
    /// names an alias. A word naming the alias that produced it ends the chain;
    /// one naming an outer alias of the chain is a cycle.
    pub(crate) fn expand_alias_at_cursor(&mut self) -> ParseResult<()> {
        let Some(aliases) = self.aliases else {
            return Ok(());
        };
        let mut expansions = 0usize;
        loop {
            let (name, start, end, line) = {
                let token = self.current();
                if token.token_type != TokenType::Word || token.quoted {
                    return Ok(());
                }
                (token.value.clone(), token.start, token.end, token.line)
            };
            let pos = self.pos;
            self.active_aliases.retain(|(_, active_end)| *active_end > pos);
            if self.active_aliases.iter().any(|(active, _)| *active == name) {
                if self.active_aliases.last().is_some_and(|(inner, _)| *inner == name) {
                    return Ok(());
                }
                return Err(ParseError::AliasCycle {
                    name,
                    depth: expansions,
                });
            }
            let Some(value) = aliases.lookup_alias(&name) else {
                return Ok(());
            };

            expansions += 1;
            if expansions > self.max_alias_depth {
                return Err(ParseError::AliasCycle {
                    name,
                    depth: self.max_alias_depth,
                });
            }

            let mut replacement = tokenize(value)?;
            replacement.pop();
            for t in &mut replacement {
                t.start = start;
                t.end = end;
                t.line = line;
            }
            let count = replacement.len();
            log::trace!("alias {} expands to {} tokens", name, count);

            self.alias_next_word = value.ends_with([' ', '\t']);
            self.tokens.splice(pos..pos + 1, replacement);
            for (_, active_end) in &mut self.active_aliases {
                if *active_end > pos {
                    *active_end = *active_end + count - 1;
                }
            }
            self.active_aliases.push((name, pos + count));
        }
    }

    // ===========================================================================
    // LISTS
    // ===========================================================================

    /// Parse statements until a list terminator.
    pub(crate) fn parse_list(&mut self) -> ParseResult<CommandList> {
        self.depth += 1;
        if self.depth > MAX_PARSER_DEPTH {
            return Err(ParseError::syntax("nesting too deep", self.current().line));
        }

        let mut entries: Vec<ListEntry> = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_list_end() {
                break;
            }

            let first = entries.len();
            let start = self.current().start;
            self.parse_and_or(&mut entries)?;

            match self.current().token_type {
                TokenType::Semicolon | TokenType::Newline => {
                    self.advance();
                    if let Some(last) = entries.last_mut() {
                        last.op = ListOperator::Seq;
                    }
                }
                TokenType::Amp => {
                    let end = self.last_end();
                    self.advance();
                    self.mark_background(&mut entries, first, start, end);
                }
                _ => break,
            }
        }

        if let Some(last) = entries.last_mut() {
            last.op = ListOperator::None;
        }
        self.depth -= 1;
        Ok(CommandList::new(entries))
    }

    /// Background the and-or list that starts at `first`. A chain of more
    /// than one pipeline runs as a single backgrounded group.
    fn mark_background(
        &mut self,
        entries: &mut Vec<ListEntry>,
        first: usize,
        start: usize,
        end: usize,
    ) {
        let source_text = self.source_slice(start, end);
        if entries.len() - first > 1 {
            let mut chain: Vec<ListEntry> = entries.drain(first..).collect();
            if let Some(last) = chain.last_mut() {
                last.op = ListOperator::None;
            }
            let line = chain[0].line;
            let mut entry = ListEntry::new(Command::Group(CommandList::new(chain)), line);
            entry.source_text = source_text.clone();
            entries.push(entry);
        }
        if let Some(last) = entries.last_mut() {
            last.background = true;
            last.op = ListOperator::Seq;
            if last.source_text.is_empty() {
                last.source_text = source_text;
            }
        }
    }

    fn parse_and_or(&mut self, entries: &mut Vec<ListEntry>) -> ParseResult<()> {
        loop {
            let entry = self.parse_pipeline_entry()?;
            entries.push(entry);

            let op = match self.current().token_type {
                TokenType::AndAnd => ListOperator::And,
                TokenType::OrOr => ListOperator::Or,
                _ => return Ok(()),
            };
            self.advance();
            if let Some(last) = entries.last_mut() {
                last.op = op;
            }
            self.skip_newlines();
            if self.at_eof() {
                return Err(ParseError::incomplete(
                    format!("command after `{}'", op.as_str()),
                    self.current().line,
                ));
            }
        }
    }

    /// Parse `[time] [!] segment | segment ...` into one list entry.
    fn parse_pipeline_entry(&mut self) -> ParseResult<ListEntry> {
        let line = self.current().line;
        let start = self.current().start;
        let mut negated = false;
        let mut timed = false;

        loop {
            self.expand_alias_at_cursor()?;
            let token = self.current();
            if token.is_word("!") {
                negated = !negated;
                self.advance();
            } else if token.is_word("time")
                && !self
                    .peek(1)
                    .is_some_and(|next| next.token_type == TokenType::Word && next.value.starts_with('-'))
            {
                timed = true;
                self.advance();
            } else {
                break;
            }
        }

        let mut segments = Vec::new();
        loop {
            segments.push(self.parse_segment()?);
            if !self.check(TokenType::Pipe) {
                break;
            }
            self.advance();
            self.skip_newlines();
            if self.at_eof() {
                return Err(ParseError::incomplete("command after `|'", self.current().line));
            }
        }

        let command = if segments.len() == 1
            && segments[0].redirections.is_empty()
            && segments[0].compound.is_some()
        {
            match segments.pop().and_then(|s| s.compound) {
                Some(compound) => *compound,
                None => return Err(ParseError::syntax("empty pipeline", line)),
            }
        } else {
            Command::Pipeline(Pipeline { segments })
        };

        let mut entry = ListEntry::new(command, line);
        entry.negated = negated;
        entry.timed = timed;
        entry.source_text = self.source_slice(start, self.last_end());
        Ok(entry)
    }
}
