//! Lexer for shell input
//!
//! The lexer tokenizes input into a stream of tokens that the parser consumes.
//! It handles:
//! - Operators and delimiters (longest match wins)
//! - Words, keeping their raw text so quote removal can happen at expansion time
//! - `$(...)`, `$((...))`, `${...}` and backtick spans as part of one word
//! - `$'...'` ANSI-C strings, rewritten into an equivalent single-quoted form
//! - Comments and backslash-newline continuation
//! - Here-documents, whose bodies are attached to the delimiter token
//! - `((...))` arithmetic spans
//!
//! Running out of input inside a construct yields `ParseError::Incomplete`.

use crate::ast::types::HereDoc;
use crate::parser::types::{ParseError, ParseResult};

/// Token types for the shell lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // End of input
    Eof,

    // Newlines and separators
    Newline,
    Semicolon,
    Amp, // &

    // Operators
    Pipe,   // |
    AndAnd, // &&
    OrOr,   // ||

    // Redirections
    Less,      // <
    Great,     // >
    DLess,     // <<
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    DLessDash, // <<-
    Clobber,   // >|
    TLess,     // <<<
    AndGreat,  // &>
    AndDGreat, // &>>

    // Grouping
    LParen, // (
    RParen, // )

    // Case terminators
    DSemi,       // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&

    /// `(( ... ))`; the value holds the inner expression
    DParenExpr,

    /// Digits directly before a redirection operator (`2>`)
    IoNumber,

    Word,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Newline => "newline",
            Self::Semicolon => ";",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Less => "<",
            Self::Great => ">",
            Self::DLess => "<<",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::LessGreat => "<>",
            Self::DLessDash => "<<-",
            Self::Clobber => ">|",
            Self::TLess => "<<<",
            Self::AndGreat => "&>",
            Self::AndDGreat => "&>>",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::DSemi => ";;",
            Self::SemiAnd => ";&",
            Self::SemiSemiAnd => ";;&",
            Self::DParenExpr => "((",
            Self::IoNumber => "number",
            Self::Word => "word",
        }
    }
}

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    /// Character offsets into the input
    pub start: usize,
    pub end: usize,
    pub line: usize,
    /// For words: some quoting character appears in the raw text
    pub quoted: bool,
    /// For words: the raw text contains an expansion trigger
    pub expand: bool,
    /// For here-document delimiter words: the collected body
    pub heredoc: Option<HereDoc>,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        value: impl Into<String>,
        start: usize,
        end: usize,
        line: usize,
    ) -> Self {
        Self {
            token_type,
            value: value.into(),
            start,
            end,
            line,
            quoted: false,
            expand: false,
            heredoc: None,
        }
    }

    /// An unquoted word with exactly this text.
    pub fn is_word(&self, text: &str) -> bool {
        self.token_type == TokenType::Word && !self.quoted && self.value == text
    }
}

/// Here-document waiting for its body
#[derive(Debug, Clone)]
struct PendingHeredoc {
    delimiter: String,
    strip_tabs: bool,
    quoted: bool,
    token_index: usize,
}

/// Three-character operators
const THREE_CHAR_OPS: &[(&str, TokenType)] = &[
    (";;&", TokenType::SemiSemiAnd),
    ("<<<", TokenType::TLess),
    ("&>>", TokenType::AndDGreat),
    ("<<-", TokenType::DLessDash),
];

/// Two-character operators
const TWO_CHAR_OPS: &[(&str, TokenType)] = &[
    ("&&", TokenType::AndAnd),
    ("||", TokenType::OrOr),
    (";;", TokenType::DSemi),
    (";&", TokenType::SemiAnd),
    (">>", TokenType::DGreat),
    ("<<", TokenType::DLess),
    ("<&", TokenType::LessAnd),
    (">&", TokenType::GreatAnd),
    ("<>", TokenType::LessGreat),
    (">|", TokenType::Clobber),
    ("&>", TokenType::AndGreat),
];

/// Single-character operators
const SINGLE_CHAR_OPS: &[(char, TokenType)] = &[
    ('|', TokenType::Pipe),
    ('&', TokenType::Amp),
    (';', TokenType::Semicolon),
    ('(', TokenType::LParen),
    (')', TokenType::RParen),
    ('<', TokenType::Less),
    ('>', TokenType::Great),
];

/// Check if a character is a word boundary (ends a word token)
pub fn is_word_boundary(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

/// Tokenize a complete input string.
pub fn tokenize(input: &str) -> ParseResult<Vec<Token>> {
    Lexer::new(input).tokenize()
}

/// End offset (exclusive, in chars) of the `$(...)`, `${...}`, backtick or
/// `<(...)` span starting at `start`. `None` when no span starts there or it
/// is unterminated.
pub fn span_end(chars: &[char], start: usize) -> Option<usize> {
    let mut lexer = Lexer::new("");
    lexer.input = chars.to_vec();
    lexer.pos = start;
    let mut sink = String::new();
    let copied = match (chars.get(start), chars.get(start + 1)) {
        (Some('$'), Some('(')) | (Some('<'), Some('(')) | (Some('>'), Some('(')) => {
            lexer.pos += 1;
            lexer.copy_paren_span(&mut sink)
        }
        (Some('$'), Some('{')) => lexer.copy_brace_span(&mut sink),
        (Some('`'), _) => lexer.copy_backtick_span(&mut sink),
        _ => return None,
    };
    copied.ok().map(|_| lexer.pos)
}

/// Lexer state
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    pending_heredocs: Vec<PendingHeredoc>,
    /// Set after `<<`/`<<-`: the next word is a here-doc delimiter
    heredoc_operator: Option<bool>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            pending_heredocs: Vec::new(),
            heredoc_operator: None,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> ParseResult<Vec<Token>> {
        let len = self.input.len();

        while self.pos < len {
            if !self.pending_heredocs.is_empty()
                && self.tokens.last().map(|t| t.token_type) == Some(TokenType::Newline)
            {
                self.read_heredoc_content()?;
                continue;
            }

            self.skip_whitespace();

            if self.pos >= len {
                break;
            }

            if let Some(token) = self.next_token()? {
                self.register_token(token)?;
            }
        }

        if let Some(heredoc) = self.pending_heredocs.first() {
            return Err(ParseError::incomplete(
                format!("here-document delimiter `{}'", heredoc.delimiter),
                self.line,
            ));
        }
        if self.heredoc_operator.is_some() {
            return Err(ParseError::incomplete("here-document delimiter", self.line));
        }

        self.tokens
            .push(Token::new(TokenType::Eof, "", self.pos, self.pos, self.line));
        Ok(self.tokens)
    }

    fn register_token(&mut self, token: Token) -> ParseResult<()> {
        match token.token_type {
            TokenType::DLess | TokenType::DLessDash => {
                self.heredoc_operator = Some(token.token_type == TokenType::DLessDash);
            }
            TokenType::Word => {
                if let Some(strip_tabs) = self.heredoc_operator.take() {
                    self.pending_heredocs.push(PendingHeredoc {
                        delimiter: remove_delimiter_quotes(&token.value),
                        strip_tabs,
                        quoted: token.quoted,
                        token_index: self.tokens.len(),
                    });
                }
            }
            _ => {
                if self.heredoc_operator.is_some() {
                    return Err(ParseError::unexpected(token.value, token.line));
                }
            }
        }
        self.tokens.push(token);
        Ok(())
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current();
        if let Some(ch) = c {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
            }
        }
        c
    }

    fn matches_at(&self, pos: usize, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.input.get(pos + i) == Some(&c))
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            match c {
                ' ' | '\t' => self.pos += 1,
                '\\' if self.peek(1) == Some('\n') && self.pos + 2 < self.input.len() => {
                    self.pos += 2;
                    self.line += 1;
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> ParseResult<Option<Token>> {
        let start = self.pos;
        let line = self.line;

        let c0 = match self.current() {
            Some(c) => c,
            None => return Ok(None),
        };
        let c1 = self.peek(1);

        if c0 == '#' {
            while let Some(c) = self.current() {
                if c == '\n' {
                    break;
                }
                self.pos += 1;
            }
            return Ok(None);
        }

        if c0 == '\n' {
            self.advance();
            return Ok(Some(Token::new(TokenType::Newline, "\n", start, self.pos, line)));
        }

        if c0 == '(' && c1 == Some('(') {
            if let Some(token) = self.read_arith_span(start, line)? {
                return Ok(Some(token));
            }
        }

        // Process substitution starts a word, not a redirection
        if matches!(c0, '<' | '>') && c1 == Some('(') {
            return self.read_word(start, line).map(Some);
        }

        if c0.is_ascii_digit() {
            let digits: String = self.input[self.pos..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            let after = self.pos + digits.chars().count();
            let next = self.input.get(after).copied();
            let next2 = self.input.get(after + 1).copied();
            if matches!(next, Some('<') | Some('>')) && next2 != Some('(') {
                self.pos = after;
                return Ok(Some(Token::new(TokenType::IoNumber, digits, start, after, line)));
            }
        }

        for (op, token_type) in THREE_CHAR_OPS {
            if self.matches_at(self.pos, op) {
                self.pos += 3;
                return Ok(Some(Token::new(*token_type, *op, start, self.pos, line)));
            }
        }
        for (op, token_type) in TWO_CHAR_OPS {
            if self.matches_at(self.pos, op) {
                self.pos += 2;
                return Ok(Some(Token::new(*token_type, *op, start, self.pos, line)));
            }
        }
        for (op, token_type) in SINGLE_CHAR_OPS {
            if c0 == *op {
                self.pos += 1;
                return Ok(Some(Token::new(
                    *token_type,
                    op.to_string(),
                    start,
                    self.pos,
                    line,
                )));
            }
        }

        self.read_word(start, line).map(Some)
    }

    /// Scan `(( ... ))`. Returns `None` when the parentheses do not close as
    /// an arithmetic pair, in which case `(` is lexed as a subshell opener.
    fn read_arith_span(&mut self, start: usize, line: usize) -> ParseResult<Option<Token>> {
        let mut i = start + 2;
        let mut depth = 0usize;
        let mut text = String::new();
        while let Some(&c) = self.input.get(i) {
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => {
                    if self.input.get(i + 1) == Some(&')') {
                        let newlines = self.input[start..i + 2]
                            .iter()
                            .filter(|&&c| c == '\n')
                            .count();
                        self.pos = i + 2;
                        self.line += newlines;
                        return Ok(Some(Token::new(
                            TokenType::DParenExpr,
                            text,
                            start,
                            self.pos,
                            line,
                        )));
                    }
                    return Ok(None);
                }
                ')' => depth -= 1,
                '\'' | '"' => {
                    text.push(c);
                    i += 1;
                    while let Some(&q) = self.input.get(i) {
                        text.push(q);
                        if q == c {
                            break;
                        }
                        i += 1;
                    }
                    if self.input.get(i).is_none() {
                        return Err(ParseError::incomplete("`))'", self.line));
                    }
                    i += 1;
                    continue;
                }
                _ => {}
            }
            text.push(c);
            i += 1;
        }
        Err(ParseError::incomplete("`))'", self.line))
    }

    fn read_word(&mut self, start: usize, line: usize) -> ParseResult<Token> {
        let mut value = String::new();
        let mut quoted = false;
        let mut expand = false;

        if matches!(self.current(), Some('<') | Some('>')) && self.peek(1) == Some('(') {
            if let Some(c) = self.advance() {
                value.push(c);
            }
            self.copy_paren_span(&mut value)?;
            expand = true;
        } else if self.current() == Some('~') {
            expand = true;
        }

        while let Some(c) = self.current() {
            if is_word_boundary(c) {
                break;
            }
            match c {
                '\'' => {
                    quoted = true;
                    self.copy_single_quoted(&mut value)?;
                }
                '"' => {
                    quoted = true;
                    if self.copy_double_quoted(&mut value)? {
                        expand = true;
                    }
                }
                '\\' => match self.peek(1) {
                    Some('\n') if self.pos + 2 >= self.input.len() => {
                        return Err(ParseError::incomplete("continuation line", self.line));
                    }
                    Some('\n') => {
                        self.pos += 2;
                        self.line += 1;
                    }
                    Some(next) => {
                        quoted = true;
                        value.push('\\');
                        value.push(next);
                        self.advance();
                        self.advance();
                    }
                    None => return Err(ParseError::incomplete("escaped character", self.line)),
                },
                '$' => match self.peek(1) {
                    Some('\'') => {
                        quoted = true;
                        self.pos += 2;
                        let text = self.read_ansi_c_string()?;
                        value.push('\'');
                        value.push_str(&text.replace('\'', "'\\''"));
                        value.push('\'');
                    }
                    Some('(') => {
                        expand = true;
                        self.advance();
                        value.push('$');
                        self.copy_paren_span(&mut value)?;
                    }
                    Some('{') => {
                        expand = true;
                        self.copy_brace_span(&mut value)?;
                    }
                    _ => {
                        expand = true;
                        value.push('$');
                        self.advance();
                    }
                },
                '`' => {
                    expand = true;
                    self.copy_backtick_span(&mut value)?;
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        let mut token = Token::new(TokenType::Word, value, start, self.pos, line);
        token.quoted = quoted;
        token.expand = expand;
        Ok(token)
    }

    fn copy_single_quoted(&mut self, value: &mut String) -> ParseResult<()> {
        value.push('\'');
        self.advance();
        loop {
            match self.advance() {
                Some('\'') => {
                    value.push('\'');
                    return Ok(());
                }
                Some(c) => value.push(c),
                None => return Err(ParseError::incomplete("matching `''", self.line)),
            }
        }
    }

    /// Copy a double-quoted string. Returns true if it contains expansions.
    fn copy_double_quoted(&mut self, value: &mut String) -> ParseResult<bool> {
        let mut expand = false;
        value.push('"');
        self.advance();
        loop {
            let c = match self.current() {
                Some(c) => c,
                None => return Err(ParseError::incomplete("matching `\"'", self.line)),
            };
            match c {
                '"' => {
                    value.push('"');
                    self.advance();
                    return Ok(expand);
                }
                '\\' => match self.peek(1) {
                    Some('\n') => {
                        self.pos += 2;
                        self.line += 1;
                    }
                    Some(next) => {
                        value.push('\\');
                        value.push(next);
                        self.advance();
                        self.advance();
                    }
                    None => return Err(ParseError::incomplete("matching `\"'", self.line)),
                },
                '$' if self.peek(1) == Some('(') => {
                    expand = true;
                    self.advance();
                    value.push('$');
                    self.copy_paren_span(value)?;
                }
                '$' if self.peek(1) == Some('{') => {
                    expand = true;
                    self.copy_brace_span(value)?;
                }
                '$' => {
                    expand = true;
                    value.push('$');
                    self.advance();
                }
                '`' => {
                    expand = true;
                    self.copy_backtick_span(value)?;
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    /// Copy a parenthesized span starting at `(`, tracking nesting, quotes
    /// and `case ... esac` patterns whose `)` do not close the span.
    fn copy_paren_span(&mut self, value: &mut String) -> ParseResult<()> {
        let mut depth = 0usize;
        let mut case_depth = 0usize;
        let mut command_position = true;
        loop {
            let c = match self.current() {
                Some(c) => c,
                None => return Err(ParseError::incomplete("matching `)'", self.line)),
            };
            match c {
                '(' => {
                    depth += 1;
                    value.push(c);
                    self.advance();
                    command_position = true;
                }
                ')' => {
                    value.push(c);
                    self.advance();
                    if case_depth > 0 && depth == 1 {
                        command_position = true;
                        continue;
                    }
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                    command_position = false;
                }
                ' ' | '\t' => {
                    value.push(c);
                    self.advance();
                }
                '\n' | ';' | '|' | '&' => {
                    value.push(c);
                    self.advance();
                    command_position = true;
                }
                '\'' => {
                    self.copy_single_quoted(value)?;
                    command_position = false;
                }
                '"' => {
                    self.copy_double_quoted(value)?;
                    command_position = false;
                }
                '`' => {
                    self.copy_backtick_span(value)?;
                    command_position = false;
                }
                '\\' => {
                    value.push(c);
                    self.advance();
                    if let Some(next) = self.advance() {
                        value.push(next);
                    }
                    command_position = false;
                }
                '$' if self.peek(1) == Some('{') => {
                    self.copy_brace_span(value)?;
                    command_position = false;
                }
                c if c.is_ascii_alphabetic() => {
                    let word: String = self.input[self.pos..]
                        .iter()
                        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                        .collect();
                    let len = word.chars().count();
                    let following = self.input.get(self.pos + len).copied();
                    let ends_word = following.map_or(true, |c| c.is_whitespace() || c == ';');
                    if command_position {
                        if word == "case" && ends_word {
                            case_depth += 1;
                        } else if word == "esac" && (ends_word || following == Some(')')) {
                            case_depth = case_depth.saturating_sub(1);
                        }
                    }
                    value.push_str(&word);
                    self.pos += len;
                    command_position = false;
                }
                _ => {
                    value.push(c);
                    self.advance();
                    command_position = false;
                }
            }
        }
    }

    /// Copy `${ ... }` including nested expansions.
    fn copy_brace_span(&mut self, value: &mut String) -> ParseResult<()> {
        value.push_str("${");
        self.pos += 2;
        let mut depth = 1usize;
        loop {
            let c = match self.current() {
                Some(c) => c,
                None => return Err(ParseError::incomplete("matching `}'", self.line)),
            };
            match c {
                '}' => {
                    value.push(c);
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '$' if self.peek(1) == Some('{') => {
                    value.push_str("${");
                    self.pos += 2;
                    depth += 1;
                }
                '$' if self.peek(1) == Some('(') => {
                    self.advance();
                    value.push('$');
                    self.copy_paren_span(value)?;
                }
                '\'' => self.copy_single_quoted(value)?,
                '"' => {
                    self.copy_double_quoted(value)?;
                }
                '`' => self.copy_backtick_span(value)?,
                '\\' => {
                    value.push(c);
                    self.advance();
                    if let Some(next) = self.advance() {
                        value.push(next);
                    }
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn copy_backtick_span(&mut self, value: &mut String) -> ParseResult<()> {
        value.push('`');
        self.advance();
        loop {
            match self.advance() {
                Some('`') => {
                    value.push('`');
                    return Ok(());
                }
                Some('\\') => {
                    value.push('\\');
                    if let Some(next) = self.advance() {
                        value.push(next);
                    }
                }
                Some(c) => value.push(c),
                None => return Err(ParseError::incomplete("matching ``'", self.line)),
            }
        }
    }

    /// Read the body of `$'...'` (after the opening quote), resolving escapes.
    fn read_ansi_c_string(&mut self) -> ParseResult<String> {
        let mut out = String::new();
        loop {
            let c = match self.advance() {
                Some(c) => c,
                None => return Err(ParseError::incomplete("matching `''", self.line)),
            };
            match c {
                '\'' => return Ok(out),
                '\\' => {
                    let esc = match self.advance() {
                        Some(e) => e,
                        None => return Err(ParseError::incomplete("matching `''", self.line)),
                    };
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'a' => out.push('\x07'),
                        'b' => out.push('\x08'),
                        'e' | 'E' => out.push('\x1b'),
                        'f' => out.push('\x0c'),
                        'v' => out.push('\x0b'),
                        '\\' | '\'' | '"' | '?' => out.push(esc),
                        'x' => {
                            let code = self.read_radix_digits(16, 2);
                            match code.and_then(char::from_u32) {
                                Some(ch) => out.push(ch),
                                None => out.push_str("\\x"),
                            }
                        }
                        'u' | 'U' => {
                            let max = if esc == 'u' { 4 } else { 8 };
                            match self.read_radix_digits(16, max).and_then(char::from_u32) {
                                Some(ch) => out.push(ch),
                                None => {
                                    out.push('\\');
                                    out.push(esc);
                                }
                            }
                        }
                        '0'..='7' => {
                            self.pos -= 1;
                            if let Some(ch) = self.read_radix_digits(8, 3).and_then(char::from_u32)
                            {
                                out.push(ch);
                            }
                        }
                        'c' => {
                            if let Some(ctl) = self.advance() {
                                out.push(char::from((ctl.to_ascii_uppercase() as u8) ^ 0x40));
                            }
                        }
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn read_radix_digits(&mut self, radix: u32, max: usize) -> Option<u32> {
        let mut value: u32 = 0;
        let mut count = 0;
        while count < max {
            match self.current().and_then(|c| c.to_digit(radix)) {
                Some(d) => {
                    value = value * radix + d;
                    self.pos += 1;
                    count += 1;
                }
                None => break,
            }
        }
        (count > 0).then_some(value)
    }

    fn read_heredoc_content(&mut self) -> ParseResult<()> {
        for heredoc in std::mem::take(&mut self.pending_heredocs) {
            let mut content = String::new();
            let mut terminated = false;

            while self.pos < self.input.len() {
                let mut line_content = String::new();
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    line_content.push(c);
                    self.pos += 1;
                }
                let had_newline = self.current() == Some('\n');
                if had_newline {
                    self.advance();
                }

                let line_to_check = if heredoc.strip_tabs {
                    line_content.trim_start_matches('\t').to_string()
                } else {
                    line_content
                };

                if line_to_check == heredoc.delimiter {
                    terminated = true;
                    break;
                }

                content.push_str(&line_to_check);
                if had_newline {
                    content.push('\n');
                }
            }

            if !terminated {
                return Err(ParseError::incomplete(
                    format!("here-document delimiter `{}'", heredoc.delimiter),
                    self.line,
                ));
            }

            if let Some(token) = self.tokens.get_mut(heredoc.token_index) {
                token.heredoc = Some(HereDoc {
                    body: content,
                    expand: !heredoc.quoted,
                });
            }
        }
        Ok(())
    }
}

/// Strip quoting from a here-document delimiter word.
fn remove_delimiter_quotes(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {}
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(input: &str) -> Vec<String> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .filter(|t| t.token_type == TokenType::Word)
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn test_simple_command() {
        let tokens = tokenize("echo hello").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].value, "echo");
        assert_eq!(tokens[1].value, "hello");
        assert_eq!(tokens[2].token_type, TokenType::Eof);
    }

    #[test]
    fn test_longest_operator_wins() {
        let tokens = tokenize("a >> b; c ;; d ;& e ;;& f &>> g <<< h").unwrap();
        let ops: Vec<TokenType> = tokens
            .iter()
            .map(|t| t.token_type)
            .filter(|t| *t != TokenType::Word && *t != TokenType::Eof)
            .collect();
        assert_eq!(
            ops,
            vec![
                TokenType::DGreat,
                TokenType::Semicolon,
                TokenType::DSemi,
                TokenType::SemiAnd,
                TokenType::SemiSemiAnd,
                TokenType::AndDGreat,
                TokenType::TLess,
            ]
        );
    }

    #[test]
    fn test_io_number() {
        let tokens = tokenize("cmd 2>&1 2>err").unwrap();
        assert_eq!(tokens[1].token_type, TokenType::IoNumber);
        assert_eq!(tokens[1].value, "2");
        assert_eq!(tokens[2].token_type, TokenType::GreatAnd);
        assert_eq!(tokens[3].value, "1");
        assert_eq!(tokens[4].token_type, TokenType::IoNumber);
    }

    #[test]
    fn test_quotes_preserved_in_raw_text() {
        let tokens = tokenize("echo 'a b' \"c $d\" e\\ f").unwrap();
        assert_eq!(tokens[1].value, "'a b'");
        assert!(tokens[1].quoted);
        assert!(!tokens[1].expand);
        assert_eq!(tokens[2].value, "\"c $d\"");
        assert!(tokens[2].expand);
        assert_eq!(tokens[3].value, "e\\ f");
    }

    #[test]
    fn test_word_boundaries_round_trip() {
        let input = "echo \"a|b\" 'c;d' $(x | y) ${z:-w v} `q r`>out";
        let tokens = tokenize(input).unwrap();
        let chars: Vec<char> = input.chars().collect();
        for token in tokens.iter().filter(|t| t.token_type == TokenType::Word) {
            let slice: String = chars[token.start..token.end].iter().collect();
            assert_eq!(slice, token.value);
        }
        assert_eq!(
            words(input),
            vec!["echo", "\"a|b\"", "'c;d'", "$(x | y)", "${z:-w v}", "`q r`", "out"]
        );
    }

    #[test]
    fn test_nested_command_substitution() {
        assert_eq!(
            words("echo $(echo \"$(echo hi)\" ) x"),
            vec!["echo", "$(echo \"$(echo hi)\" )", "x"]
        );
        assert_eq!(words("echo $((1 + (2 * 3)))"), vec!["echo", "$((1 + (2 * 3)))"]);
    }

    #[test]
    fn test_case_inside_command_substitution() {
        assert_eq!(
            words("echo $(case x in x) echo y;; esac)"),
            vec!["echo", "$(case x in x) echo y;; esac)"]
        );
        assert_eq!(
            words("x=$(case a in a) echo yes;; esac); echo $x"),
            vec!["x=$(case a in a) echo yes;; esac)", "echo", "$x"]
        );
    }

    #[test]
    fn test_ansi_c_string() {
        let tokens = tokenize("echo $'a\\tb\\'c'").unwrap();
        assert_eq!(tokens[1].value, "'a\tb'\\''c'");
        assert!(tokens[1].quoted);
    }

    #[test]
    fn test_unterminated_quotes_are_incomplete() {
        assert!(tokenize("echo 'abc").unwrap_err().is_incomplete());
        assert!(tokenize("echo \"abc").unwrap_err().is_incomplete());
        assert!(tokenize("echo $(ls").unwrap_err().is_incomplete());
        assert!(tokenize("echo `ls").unwrap_err().is_incomplete());
        assert!(tokenize("echo abc\\").unwrap_err().is_incomplete());
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(words("echo ab\\\ncd"), vec!["echo", "abcd"]);
    }

    #[test]
    fn test_heredoc_body_attached_to_delimiter() {
        let tokens = tokenize("cat <<EOF\nhello $x\nEOF\necho done\n").unwrap();
        assert_eq!(tokens[1].token_type, TokenType::DLess);
        let heredoc = tokens[2].heredoc.clone().unwrap();
        assert_eq!(heredoc.body, "hello $x\n");
        assert!(heredoc.expand);
        assert!(tokens.iter().any(|t| t.value == "done"));
    }

    #[test]
    fn test_heredocs_read_in_order() {
        let tokens = tokenize("cat <<A <<-'B'\none\nA\n\ttwo\n\tB\n").unwrap();
        assert_eq!(tokens[2].heredoc.as_ref().unwrap().body, "one\n");
        let second = tokens[4].heredoc.as_ref().unwrap();
        assert_eq!(second.body, "two\n");
        assert!(!second.expand);
    }

    #[test]
    fn test_unterminated_heredoc_is_incomplete() {
        assert!(tokenize("cat <<EOF\nhello\n").unwrap_err().is_incomplete());
    }

    #[test]
    fn test_comment_skipped() {
        assert_eq!(words("echo hello # a comment"), vec!["echo", "hello"]);
        assert_eq!(words("echo a#b"), vec!["echo", "a#b"]);
    }

    #[test]
    fn test_arith_span() {
        let tokens = tokenize("(( x = (1 + 2) * 3 ))").unwrap();
        assert_eq!(tokens[0].token_type, TokenType::DParenExpr);
        assert_eq!(tokens[0].value, " x = (1 + 2) * 3 ");
    }

    #[test]
    fn test_nested_subshell_not_arith() {
        let tokens = tokenize("((echo a) | cat)").unwrap();
        assert_eq!(tokens[0].token_type, TokenType::LParen);
        assert_eq!(tokens[1].token_type, TokenType::LParen);
    }

    #[test]
    fn test_span_end() {
        let chars: Vec<char> = "a$(echo \")\")b".chars().collect();
        assert_eq!(span_end(&chars, 1), Some(12));
        let chars: Vec<char> = "${x:-}}".chars().collect();
        assert_eq!(span_end(&chars, 0), Some(6));
        let chars: Vec<char> = "$(".chars().collect();
        assert_eq!(span_end(&chars, 0), None);
    }

    #[test]
    fn test_process_substitution_word() {
        assert_eq!(words("diff <(ls a) >(cat)"), vec!["diff", "<(ls a)", ">(cat)"]);
    }

    #[test]
    fn test_line_continuation_at_end_of_input() {
        assert_eq!(words("echo a \\\nb\n"), vec!["echo", "a", "b"]);
        assert!(tokenize("echo a \\\n").unwrap_err().is_incomplete());
        assert!(tokenize("echo a\\\n").unwrap_err().is_incomplete());
    }
}
