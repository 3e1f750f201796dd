//! Word Expansion
//!
//! Turns the raw text of a word into its final fields. One left-to-right
//! scan handles quote removal, tilde expansion, parameter expansion, command
//! and arithmetic substitution, and process substitution, producing
//! [`Piece`]s. Unquoted words are then split on IFS and globbed.
//!
//! Expansion always works on a copy of the word text; the parsed tree is
//! never modified, so function bodies and loops re-expand on every run.
//!
//! Entry points:
//! - [`Interpreter::expand_words`]: command arguments and `for` lists
//! - [`Interpreter::expand_word_to_string`]: redirection targets, `case`
//!   subjects, here-strings (no splitting or globbing)
//! - [`Interpreter::expand_assignment_value`]: right-hand sides (tilde also
//!   after `:`)
//! - [`Interpreter::expand_pattern`]: `case` and `[[ == ]]` patterns
//! - [`Interpreter::expand_heredoc`]: here-document bodies

use crate::ast::types::Word;
use crate::interpreter::arithmetic::ArithEvaluator;
use crate::interpreter::errors::{ArithmeticError, ExpansionError, ExpansionResult};
use crate::interpreter::expansion::command_substitution::unescape_backticks;
use crate::interpreter::expansion::parameter_ops::{
    apply_case_modification, apply_transform, parse_indirect_target, parse_parameter,
    plain_ref, substring_range, ParamExpr, ParamOp, ParamRef, Subscript,
};
use crate::interpreter::expansion::pattern::{
    has_glob_chars, pattern_matches, remove_prefix, remove_suffix, replace_pattern,
};
use crate::interpreter::expansion::tilde::expand_tilde_prefix;
use crate::interpreter::expansion::word_glob_expansion::{glob_field, glob_fields};
use crate::interpreter::expansion::word_split::{
    join_pieces, pieces_to_pattern, split_pieces, Field, Piece,
};
use crate::interpreter::helpers::ifs::{get_ifs_separator, Ifs};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::variables::VarValue;
use crate::parser::lexer::span_end;
use crate::parser::types::is_valid_name;

/// Quoting context of the text being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Ordinary word: quotes are syntax
    Word,
    /// Assignment value: like `Word`, tilde also expands after `:`
    Assignment,
    /// Inside `"..."`
    DoubleQuoted,
    /// Here-document body or arithmetic text: `"` and `'` are ordinary
    HereDoc,
}

impl Mode {
    fn in_quotes(self) -> bool {
        matches!(self, Mode::DoubleQuoted | Mode::HereDoc)
    }
}

/// Value of a parameter before it becomes pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamValue {
    Scalar(Option<String>),
    /// `$@`, `$*`, `${arr[@]}`, `${arr[*]}`
    List { items: Vec<String>, star: bool },
}

impl ParamValue {
    fn is_unset(&self) -> bool {
        match self {
            ParamValue::Scalar(value) => value.is_none(),
            ParamValue::List { items, .. } => items.is_empty(),
        }
    }

    fn is_null(&self) -> bool {
        match self {
            ParamValue::Scalar(value) => value.as_deref().map_or(true, str::is_empty),
            ParamValue::List { items, .. } => items.iter().all(String::is_empty),
        }
    }

    fn map<F>(self, mut f: F) -> ParamValue
    where
        F: FnMut(&str) -> String,
    {
        match self {
            ParamValue::Scalar(value) => ParamValue::Scalar(value.map(|v| f(&v))),
            ParamValue::List { items, star } => ParamValue::List {
                items: items.iter().map(|v| f(v)).collect(),
                star,
            },
        }
    }
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

fn flush(lit: &mut String, quoted: bool, out: &mut Vec<Piece>) {
    if !lit.is_empty() {
        let text = std::mem::take(lit);
        out.push(if quoted {
            Piece::quoted(text)
        } else {
            Piece::literal(text)
        });
    }
}

/// Index of the `"` closing a double-quoted run that starts at `from`.
fn find_dquote_end(chars: &[char], from: usize) -> usize {
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '"' => return i,
            '\\' => i += 2,
            '$' | '`' => match span_end(chars, i) {
                Some(end) => i = end,
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    chars.len()
}

fn is_special_char(c: char) -> bool {
    matches!(c, '@' | '*' | '#' | '?' | '-' | '$' | '!')
}

impl Interpreter {
    // =========================================================================
    // ENTRY POINTS
    // =========================================================================

    /// Expand words into argument fields: split and glob unquoted results.
    pub fn expand_words(&mut self, words: &[Word]) -> ExpansionResult<Vec<String>> {
        let mut out = Vec::with_capacity(words.len());
        for word in words {
            out.extend(self.expand_word_fields(word)?);
        }
        Ok(out)
    }

    pub fn expand_word_fields(&mut self, word: &Word) -> ExpansionResult<Vec<String>> {
        let noglob = self.state.options.noglob;
        if !word.expand && !word.quoted {
            if noglob || !has_glob_chars(&word.text) {
                return Ok(vec![word.text.clone()]);
            }
            let field = Field {
                value: word.text.clone(),
                glob_pattern: word.text.clone(),
                globbable: true,
            };
            return Ok(glob_field(field, false));
        }
        let mut pieces = Vec::new();
        self.scan(&word.text, Mode::Word, &mut pieces)?;
        let fields = split_pieces(&pieces, &Ifs::from_vars(&self.state.vars));
        Ok(glob_fields(fields, noglob))
    }

    /// Expand without field splitting or globbing.
    pub fn expand_word_to_string(&mut self, word: &Word) -> ExpansionResult<String> {
        if !word.expand && !word.quoted {
            return Ok(word.text.clone());
        }
        self.expand_text(&word.text)
    }

    pub fn expand_assignment_value(&mut self, word: &Word) -> ExpansionResult<String> {
        let mut pieces = Vec::new();
        self.scan(&word.text, Mode::Assignment, &mut pieces)?;
        Ok(join_pieces(&pieces, " "))
    }

    /// Expand a pattern word; quoted characters come back escaped.
    pub fn expand_pattern(&mut self, word: &Word) -> ExpansionResult<String> {
        self.expand_pattern_text(&word.text)
    }

    /// Expand the right side of `[[ =~ ]]`; quoted text matches literally.
    pub fn expand_regex(&mut self, text: &str) -> ExpansionResult<String> {
        let mut pieces = Vec::new();
        self.scan(text, Mode::Word, &mut pieces)?;
        let mut out = String::new();
        for piece in &pieces {
            match piece {
                Piece::Text { text, quoted: true, .. } => out.push_str(&regex_lite::escape(text)),
                Piece::Text { text, .. } => out.push_str(text),
                Piece::Break => out.push(' '),
            }
        }
        Ok(out)
    }

    /// Expand a here-document body: parameters, command and arithmetic
    /// substitution; backslash only escapes `$`, backtick, `\` and newline.
    pub fn expand_heredoc(&mut self, body: &str) -> ExpansionResult<String> {
        let mut pieces = Vec::new();
        self.scan(body, Mode::HereDoc, &mut pieces)?;
        Ok(join_pieces(&pieces, " "))
    }

    /// Expand `$` references in arithmetic text, then evaluate it.
    pub fn eval_arith(&mut self, text: &str) -> ExpansionResult<i64> {
        let mut pieces = Vec::new();
        self.scan(text, Mode::HereDoc, &mut pieces)?;
        let expanded = join_pieces(&pieces, " ");
        Ok(ArithEvaluator::new(&mut self.state).evaluate_text(&expanded)?)
    }

    fn expand_text(&mut self, text: &str) -> ExpansionResult<String> {
        let mut pieces = Vec::new();
        self.scan(text, Mode::Word, &mut pieces)?;
        Ok(join_pieces(&pieces, " "))
    }

    fn expand_pattern_text(&mut self, text: &str) -> ExpansionResult<String> {
        let mut pieces = Vec::new();
        self.scan(text, Mode::Word, &mut pieces)?;
        Ok(pieces_to_pattern(&pieces))
    }

    // =========================================================================
    // SCANNER
    // =========================================================================

    /// Scan `text` into pieces. Returns true when a list expansion
    /// (`$@`, `${arr[@]}`) took place, which may legitimately produce
    /// zero fields even inside quotes.
    fn scan(&mut self, text: &str, mode: Mode, out: &mut Vec<Piece>) -> ExpansionResult<bool> {
        let chars: Vec<char> = text.chars().collect();
        let quoted = mode.in_quotes();
        let mut lit = String::new();
        let mut saw_list = false;
        let mut i = 0;

        if matches!(mode, Mode::Word | Mode::Assignment) {
            i = self.scan_tilde(&chars, 0, mode, out);
        }

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\'' if !quoted => {
                    flush(&mut lit, quoted, out);
                    let close = chars[i + 1..]
                        .iter()
                        .position(|&c| c == '\'')
                        .map_or(chars.len(), |p| i + 1 + p);
                    out.push(Piece::quoted(collect(&chars[i + 1..close])));
                    i = close + 1;
                }
                '"' if !quoted => {
                    flush(&mut lit, quoted, out);
                    let close = find_dquote_end(&chars, i + 1);
                    let inner = collect(&chars[i + 1..close]);
                    let mut inside = Vec::new();
                    let had_list = self.scan(&inner, Mode::DoubleQuoted, &mut inside)?;
                    if inside.is_empty() && !had_list {
                        out.push(Piece::quoted(""));
                    }
                    saw_list |= had_list;
                    out.extend(inside);
                    i = close + 1;
                }
                '\\' => {
                    let next = chars.get(i + 1).copied();
                    match (mode, next) {
                        (_, None) => {
                            lit.push('\\');
                            i += 1;
                        }
                        (Mode::Word | Mode::Assignment, Some(n)) => {
                            flush(&mut lit, quoted, out);
                            out.push(Piece::quoted(n.to_string()));
                            i += 2;
                        }
                        (_, Some('\n')) => i += 2,
                        (Mode::DoubleQuoted, Some(n)) if matches!(n, '$' | '`' | '"' | '\\') => {
                            lit.push(n);
                            i += 2;
                        }
                        (Mode::HereDoc, Some(n)) if matches!(n, '$' | '`' | '\\') => {
                            lit.push(n);
                            i += 2;
                        }
                        _ => {
                            lit.push('\\');
                            i += 1;
                        }
                    }
                }
                '$' => {
                    let next = chars.get(i + 1).copied();
                    match next {
                        Some('(') | Some('{') => {
                            let Some(end) = span_end(&chars, i) else {
                                lit.push('$');
                                i += 1;
                                continue;
                            };
                            flush(&mut lit, quoted, out);
                            if next == Some('(') && chars.get(i + 2) == Some(&'(') && chars[end - 2] == ')' {
                                let expr = collect(&chars[i + 3..end - 2]);
                                let value = self.eval_arith(&expr)?;
                                out.push(Piece::expanded(value.to_string(), quoted));
                            } else if next == Some('(') {
                                let command = collect(&chars[i + 2..end - 1]);
                                let output = self.command_substitution(&command)?;
                                out.push(Piece::expanded(output, quoted));
                            } else {
                                let body = collect(&chars[i + 2..end - 1]);
                                saw_list |= self.expand_braced_param(&body, mode, out)?;
                            }
                            i = end;
                        }
                        Some('"') if !quoted => i += 1,
                        Some(n) if n.is_ascii_alphabetic() || n == '_' => {
                            let len = chars[i + 1..]
                                .iter()
                                .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                                .count();
                            flush(&mut lit, quoted, out);
                            let param = plain_ref(&collect(&chars[i + 1..i + 1 + len]));
                            saw_list |= self.expand_param(&param, mode, out)?;
                            i += 1 + len;
                        }
                        Some(n) if n.is_ascii_digit() || is_special_char(n) => {
                            flush(&mut lit, quoted, out);
                            saw_list |= self.expand_param(&plain_ref(&n.to_string()), mode, out)?;
                            i += 2;
                        }
                        _ => {
                            lit.push('$');
                            i += 1;
                        }
                    }
                }
                '`' => match span_end(&chars, i) {
                    Some(end) => {
                        flush(&mut lit, quoted, out);
                        let command = unescape_backticks(&chars[i + 1..end - 1]);
                        let output = self.command_substitution(&command)?;
                        out.push(Piece::expanded(output, quoted));
                        i = end;
                    }
                    None => {
                        lit.push('`');
                        i += 1;
                    }
                },
                '<' | '>' if mode == Mode::Word && i == 0 && chars.get(1) == Some(&'(') => {
                    match span_end(&chars, 0) {
                        Some(end) => {
                            let command = collect(&chars[2..end - 1]);
                            let path = self.process_substitution(&command, c == '>')?;
                            out.push(Piece::quoted(path));
                            i = end;
                        }
                        None => {
                            lit.push(c);
                            i += 1;
                        }
                    }
                }
                ':' if mode == Mode::Assignment && chars.get(i + 1) == Some(&'~') => {
                    lit.push(':');
                    flush(&mut lit, quoted, out);
                    i = self.scan_tilde(&chars, i + 1, mode, out);
                    if chars.get(i) == Some(&'~') {
                        lit.push('~');
                        i += 1;
                    }
                }
                _ => {
                    lit.push(c);
                    i += 1;
                }
            }
        }
        flush(&mut lit, quoted, out);
        Ok(saw_list)
    }

    /// Expand a tilde prefix at `start`; returns the index scanning resumes at.
    fn scan_tilde(&mut self, chars: &[char], start: usize, mode: Mode, out: &mut Vec<Piece>) -> usize {
        if chars.get(start) != Some(&'~') {
            return start;
        }
        let end = chars[start..]
            .iter()
            .position(|&c| c == '/' || (mode == Mode::Assignment && c == ':'))
            .map_or(chars.len(), |p| start + p);
        let prefix = &chars[start + 1..end];
        if prefix.iter().any(|c| matches!(c, '\'' | '"' | '\\' | '$' | '`')) {
            return start;
        }
        match expand_tilde_prefix(&self.state.vars, &collect(prefix)) {
            Some(home) => {
                out.push(Piece::quoted(home));
                end
            }
            None => start,
        }
    }

    // =========================================================================
    // PARAMETERS
    // =========================================================================

    fn expand_param(&mut self, param: &ParamRef, mode: Mode, out: &mut Vec<Piece>) -> ExpansionResult<bool> {
        let value = self.lookup_param(param)?;
        self.apply_param_op(param, value, None, mode, out)
    }

    fn expand_braced_param(&mut self, body: &str, mode: Mode, out: &mut Vec<Piece>) -> ExpansionResult<bool> {
        let quoted = mode.in_quotes();
        match parse_parameter(body)? {
            ParamExpr::Simple { param, op } => {
                let value = self.lookup_param(&param)?;
                self.apply_param_op(&param, value, op, mode, out)
            }
            ParamExpr::Length(param) => {
                let value = self.lookup_param(&param)?;
                self.check_unbound(&param, &value)?;
                let length = match value {
                    ParamValue::Scalar(value) => value.map_or(0, |v| v.chars().count()),
                    ParamValue::List { items, .. } => items.len(),
                };
                out.push(Piece::expanded(length.to_string(), quoted));
                Ok(false)
            }
            ParamExpr::Indirect { param, op } => {
                let reference = self.lookup_param(&param)?;
                let target = match reference {
                    ParamValue::Scalar(Some(name)) if !name.is_empty() => name,
                    ParamValue::List { items, .. } if !items.is_empty() => items.join(" "),
                    _ => {
                        if self.state.options.nounset {
                            return Err(ExpansionError::Unbound(param.name));
                        }
                        return self.apply_param_op(&param, ParamValue::Scalar(None), op, mode, out);
                    }
                };
                let target_ref = parse_indirect_target(&target)
                    .ok_or_else(|| ExpansionError::BadSubstitution(target.clone()))?;
                let value = self.lookup_param(&target_ref)?;
                self.apply_param_op(&target_ref, value, op, mode, out)
            }
            ParamExpr::PrefixNames { prefix, star } => {
                let items = self
                    .state
                    .vars
                    .names()
                    .into_iter()
                    .filter(|name| name.starts_with(&prefix))
                    .collect();
                let param = plain_ref(&prefix);
                self.apply_param_op(&param, ParamValue::List { items, star }, None, mode, out)
            }
            ParamExpr::Keys { name, star } => {
                let items = match self.state.vars.get(&name).map(|v| &v.value) {
                    Some(VarValue::Array(items)) => items.keys().map(usize::to_string).collect(),
                    Some(VarValue::Scalar(_)) => vec!["0".to_string()],
                    None => Vec::new(),
                };
                let param = plain_ref(&name);
                self.apply_param_op(&param, ParamValue::List { items, star }, None, mode, out)
            }
        }
    }

    fn lookup_param(&mut self, param: &ParamRef) -> ExpansionResult<ParamValue> {
        let name = param.name.as_str();
        let state = &self.state;
        let scalar = |s: String| Ok(ParamValue::Scalar(Some(s)));
        match name {
            "@" | "*" => Ok(ParamValue::List {
                items: state.positional.clone(),
                star: name == "*",
            }),
            "#" => scalar(state.positional.len().to_string()),
            "?" => scalar(state.last_exit_code.to_string()),
            "$" => scalar(state.shell_pid.to_string()),
            "-" => scalar(state.options.flags()),
            "0" => scalar(state.script_name.clone()),
            "!" => Ok(ParamValue::Scalar(
                state.last_background_pid.map(|pid| pid.to_string()),
            )),
            n if n.starts_with(|c: char| c.is_ascii_digit()) => {
                let index: usize = n.parse().unwrap_or(0);
                Ok(ParamValue::Scalar(
                    index
                        .checked_sub(1)
                        .and_then(|i| state.positional.get(i))
                        .cloned(),
                ))
            }
            _ => match &param.subscript {
                None => Ok(ParamValue::Scalar(state.scalar(name))),
                Some(Subscript::All { star }) => Ok(ParamValue::List {
                    items: state.vars.get(name).map(|v| v.values()).unwrap_or_default(),
                    star: *star,
                }),
                Some(Subscript::Index(expr)) => {
                    let index = self.resolve_index(name, expr)?;
                    Ok(ParamValue::Scalar(
                        self.state.vars.get_element(name, index).map(str::to_string),
                    ))
                }
            },
        }
    }

    /// Evaluate a subscript; negative values count back from the end.
    pub(crate) fn resolve_index(&mut self, name: &str, expr: &str) -> ExpansionResult<usize> {
        let index = self.eval_arith(expr)?;
        if index >= 0 {
            return Ok(index as usize);
        }
        let next = match self.state.vars.get(name).map(|v| &v.value) {
            Some(VarValue::Array(items)) => items.keys().next_back().map_or(0, |k| k + 1),
            Some(VarValue::Scalar(_)) => 1,
            None => 0,
        };
        let resolved = next as i64 + index;
        if resolved < 0 {
            return Err(ArithmeticError::Syntax(format!("{}: bad array subscript", index)).into());
        }
        Ok(resolved as usize)
    }

    fn check_unbound(&self, param: &ParamRef, value: &ParamValue) -> ExpansionResult<()> {
        if self.state.options.nounset
            && matches!(value, ParamValue::Scalar(None))
            && !matches!(param.name.as_str(), "@" | "*")
        {
            return Err(ExpansionError::Unbound(param.name.clone()));
        }
        Ok(())
    }

    /// Scan an operand word in the context of its `${...}`.
    fn scan_operand(&mut self, word: &str, mode: Mode, out: &mut Vec<Piece>) -> ExpansionResult<bool> {
        if !mode.in_quotes() {
            return self.scan(word, Mode::Word, out);
        }
        let mut pieces = Vec::new();
        let had_list = self.scan(word, Mode::Word, &mut pieces)?;
        out.extend(pieces.into_iter().map(|piece| match piece {
            Piece::Text { text, .. } => Piece::quoted(text),
            Piece::Break => Piece::Break,
        }));
        Ok(had_list)
    }

    fn apply_param_op(
        &mut self,
        param: &ParamRef,
        value: ParamValue,
        op: Option<ParamOp>,
        mode: Mode,
        out: &mut Vec<Piece>,
    ) -> ExpansionResult<bool> {
        let quoted = mode.in_quotes();
        let use_word = |colon: bool, value: &ParamValue| value.is_unset() || (colon && value.is_null());

        match op {
            None => {
                self.check_unbound(param, &value)?;
                Ok(self.push_value(value, quoted, out))
            }
            Some(ParamOp::Default { colon, word }) => {
                if use_word(colon, &value) {
                    self.scan_operand(&word, mode, out)
                } else {
                    Ok(self.push_value(value, quoted, out))
                }
            }
            Some(ParamOp::Assign { colon, word }) => {
                if !use_word(colon, &value) {
                    return Ok(self.push_value(value, quoted, out));
                }
                let text = self.expand_text(&word)?;
                self.assign_param(param, &text)?;
                out.push(Piece::expanded(text, quoted));
                Ok(false)
            }
            Some(ParamOp::Alternative { colon, word }) => {
                if use_word(colon, &value) {
                    if quoted {
                        out.push(Piece::quoted(""));
                    }
                    Ok(false)
                } else {
                    self.scan_operand(&word, mode, out)
                }
            }
            Some(ParamOp::Error { colon, word }) => {
                if !use_word(colon, &value) {
                    return Ok(self.push_value(value, quoted, out));
                }
                let message = if word.is_empty() {
                    if colon {
                        "parameter null or not set".to_string()
                    } else {
                        "parameter not set".to_string()
                    }
                } else {
                    self.expand_text(&word)?
                };
                Err(ExpansionError::NullOrUnset {
                    name: param.name.clone(),
                    message,
                })
            }
            Some(op) => {
                self.check_unbound(param, &value)?;
                let value = self.transform_value(param, value, op)?;
                Ok(self.push_value(value, quoted, out))
            }
        }
    }

    fn transform_value(&mut self, param: &ParamRef, value: ParamValue, op: ParamOp) -> ExpansionResult<ParamValue> {
        Ok(match op {
            ParamOp::RemovePrefix { longest, pattern } => {
                let pattern = self.expand_pattern_text(&pattern)?;
                value.map(|v| remove_prefix(v, &pattern, longest))
            }
            ParamOp::RemoveSuffix { longest, pattern } => {
                let pattern = self.expand_pattern_text(&pattern)?;
                value.map(|v| remove_suffix(v, &pattern, longest))
            }
            ParamOp::Replace {
                mode,
                pattern,
                replacement,
            } => {
                let pattern = self.expand_pattern_text(&pattern)?;
                let replacement = self.expand_text(&replacement)?;
                value.map(|v| replace_pattern(v, &pattern, &replacement, mode))
            }
            ParamOp::Substring { offset, length } => {
                let offset = self.eval_arith(&offset)?;
                let length = match length {
                    Some(text) => Some(self.eval_arith(&text)?),
                    None => None,
                };
                let out_of_range =
                    || ExpansionError::from(ArithmeticError::Syntax("substring expression < 0".into()));
                match value {
                    ParamValue::Scalar(None) => ParamValue::Scalar(None),
                    ParamValue::Scalar(Some(s)) => {
                        let chars: Vec<char> = s.chars().collect();
                        let (start, end) =
                            substring_range(chars.len(), offset, length).ok_or_else(out_of_range)?;
                        ParamValue::Scalar(Some(collect(&chars[start..end])))
                    }
                    ParamValue::List { mut items, star } => {
                        if matches!(param.name.as_str(), "@" | "*") {
                            items.insert(0, self.state.script_name.clone());
                        }
                        let (start, end) =
                            substring_range(items.len(), offset, length).ok_or_else(out_of_range)?;
                        ParamValue::List {
                            items: items[start..end].to_vec(),
                            star,
                        }
                    }
                }
            }
            ParamOp::Case { upper, all, pattern } => {
                let pattern = if pattern.is_empty() {
                    String::new()
                } else {
                    self.expand_pattern_text(&pattern)?
                };
                value.map(|v| {
                    apply_case_modification(v, upper, all, |c| {
                        pattern.is_empty() || pattern_matches(&pattern, &c.to_string())
                    })
                })
            }
            ParamOp::Transform(op) => value.map(|v| apply_transform(v, op)),
            ParamOp::Default { .. }
            | ParamOp::Assign { .. }
            | ParamOp::Alternative { .. }
            | ParamOp::Error { .. } => value,
        })
    }

    /// `${name:=word}` assignment.
    fn assign_param(&mut self, param: &ParamRef, text: &str) -> ExpansionResult<()> {
        if !is_valid_name(&param.name) {
            return Err(ExpansionError::BadSubstitution(format!(
                "${}: cannot assign in this way",
                param.name
            )));
        }
        match &param.subscript {
            Some(Subscript::Index(expr)) => {
                let index = self.resolve_index(&param.name, expr)?;
                self.state.set_var_element(&param.name, index, text.to_string())
            }
            _ => self.state.set_var(&param.name, text),
        }
    }

    /// Emit a value as pieces. Returns true for list expansions.
    fn push_value(&self, value: ParamValue, quoted: bool, out: &mut Vec<Piece>) -> bool {
        match value {
            ParamValue::Scalar(value) => {
                out.push(Piece::expanded(value.unwrap_or_default(), quoted));
                false
            }
            ParamValue::List { items, star: true } if quoted => {
                let sep = get_ifs_separator(&self.state.vars);
                out.push(Piece::expanded(items.join(&sep), true));
                false
            }
            ParamValue::List { items, .. } => {
                for (i, item) in items.into_iter().enumerate() {
                    if i > 0 {
                        out.push(Piece::Break);
                    }
                    out.push(Piece::expanded(item, quoted));
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    fn interp() -> Interpreter {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.vars.set_scalar("HOME", "/home/me").unwrap();
        interp
    }

    fn fields(interp: &mut Interpreter, raw: &str) -> Vec<String> {
        interp.expand_word_fields(&Word::from_raw(raw)).unwrap()
    }

    fn string(interp: &mut Interpreter, raw: &str) -> String {
        interp.expand_word_to_string(&Word::from_raw(raw)).unwrap()
    }

    #[test]
    fn test_quote_removal() {
        let mut i = interp();
        assert_eq!(fields(&mut i, "'a b'"), vec!["a b"]);
        assert_eq!(fields(&mut i, "\"a b\"c"), vec!["a bc"]);
        assert_eq!(fields(&mut i, "a\\ b"), vec!["a b"]);
        assert_eq!(fields(&mut i, "\"\""), vec![""]);
        assert_eq!(fields(&mut i, "\"\\$x \\q\""), vec!["$x \\q"]);
    }

    #[test]
    fn test_default_leaves_unset() {
        let mut i = interp();
        assert_eq!(string(&mut i, "${X:-foo}"), "foo");
        assert_eq!(i.state.vars.get_scalar("X"), None);
        assert_eq!(string(&mut i, "${X:=foo}"), "foo");
        assert_eq!(i.state.vars.get_scalar("X"), Some("foo"));
    }

    #[test]
    fn test_colon_variants_distinguish_null() {
        let mut i = interp();
        i.state.vars.set_scalar("E", "").unwrap();
        assert_eq!(string(&mut i, "${E-unset}"), "");
        assert_eq!(string(&mut i, "${E:-null}"), "null");
        assert_eq!(string(&mut i, "${E+set}"), "set");
        assert_eq!(string(&mut i, "${E:+set}"), "");
    }

    #[test]
    fn test_error_operator() {
        let mut i = interp();
        let err = i.expand_word_to_string(&Word::from_raw("${NOPE:?custom}")).unwrap_err();
        assert_eq!(err.to_string(), "NOPE: custom");
    }

    #[test]
    fn test_field_splitting() {
        let mut i = interp();
        i.state.vars.set_scalar("V", "  a  b ").unwrap();
        assert_eq!(fields(&mut i, "$V"), vec!["a", "b"]);
        assert_eq!(fields(&mut i, "\"$V\""), vec!["  a  b "]);
        i.state.vars.set_scalar("IFS", ":").unwrap();
        i.state.vars.set_scalar("V", "a::b").unwrap();
        assert_eq!(fields(&mut i, "$V"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_positional_lists() {
        let mut i = interp();
        i.state.positional = vec!["a b".into(), "".into(), "c".into()];
        assert_eq!(fields(&mut i, "\"$@\""), vec!["a b", "", "c"]);
        assert_eq!(fields(&mut i, "$@"), vec!["a", "b", "c"]);
        assert_eq!(fields(&mut i, "\"$*\""), vec!["a b  c"]);
        assert_eq!(fields(&mut i, "$#"), vec!["3"]);
        assert_eq!(fields(&mut i, "\"x$@y\""), vec!["xa b", "", "cy"]);
        i.state.positional.clear();
        assert!(fields(&mut i, "\"$@\"").is_empty());
        assert_eq!(fields(&mut i, "\"$*\""), vec![""]);
    }

    #[test]
    fn test_arrays() {
        let mut i = interp();
        i.state
            .vars
            .set_array("arr", vec!["x".into(), "y z".into()])
            .unwrap();
        assert_eq!(fields(&mut i, "\"${arr[@]}\""), vec!["x", "y z"]);
        assert_eq!(fields(&mut i, "${arr[1]}"), vec!["y", "z"]);
        assert_eq!(string(&mut i, "${arr[-1]}"), "y z");
        assert_eq!(string(&mut i, "${#arr[@]}"), "2");
        assert_eq!(fields(&mut i, "${!arr[@]}"), vec!["0", "1"]);
        assert_eq!(string(&mut i, "$arr"), "x");
    }

    #[test]
    fn test_pattern_operators() {
        let mut i = interp();
        i.state.vars.set_scalar("P", "/usr/local/bin.tar.gz").unwrap();
        assert_eq!(string(&mut i, "${P##*/}"), "bin.tar.gz");
        assert_eq!(string(&mut i, "${P#*/}"), "usr/local/bin.tar.gz");
        assert_eq!(string(&mut i, "${P%.*}"), "/usr/local/bin.tar");
        assert_eq!(string(&mut i, "${P%%.*}"), "/usr/local/bin");
        assert_eq!(string(&mut i, "${P//\\//:}"), ":usr:local:bin.tar.gz");
        assert_eq!(string(&mut i, "${P/#\\/usr/X}"), "X/local/bin.tar.gz");
        i.state.vars.set_scalar("S", "a*b").unwrap();
        assert_eq!(string(&mut i, "${S#\"a*\"}"), "b");
    }

    #[test]
    fn test_length_substring_case() {
        let mut i = interp();
        i.state.vars.set_scalar("W", "hello").unwrap();
        assert_eq!(string(&mut i, "${#W}"), "5");
        assert_eq!(string(&mut i, "${W:1:3}"), "ell");
        assert_eq!(string(&mut i, "${W: -2}"), "lo");
        assert_eq!(string(&mut i, "${W^}"), "Hello");
        assert_eq!(string(&mut i, "${W^^}"), "HELLO");
        assert_eq!(string(&mut i, "${W^^l}"), "heLLo");
        i.state.vars.set_scalar("U", "ABC").unwrap();
        assert_eq!(string(&mut i, "${U,,}"), "abc");
        assert_eq!(string(&mut i, "${U,}"), "aBC");
        i.state.vars.set_scalar("Q", "it's").unwrap();
        assert_eq!(string(&mut i, "${Q@Q}"), "'it'\\''s'");
    }

    #[test]
    fn test_indirection_and_prefix() {
        let mut i = interp();
        i.state.vars.set_scalar("ref", "target").unwrap();
        i.state.vars.set_scalar("target", "value").unwrap();
        assert_eq!(string(&mut i, "${!ref}"), "value");
        i.state.vars.set_scalar("PL_A", "1").unwrap();
        i.state.vars.set_scalar("PL_B", "2").unwrap();
        assert_eq!(string(&mut i, "${!PL_*}"), "PL_A PL_B");
    }

    #[test]
    fn test_special_parameters() {
        let mut i = interp();
        i.state.last_exit_code = 3;
        i.state.script_name = "myscript".into();
        i.state.positional = vec!["one".into()];
        assert_eq!(string(&mut i, "$?"), "3");
        assert_eq!(string(&mut i, "$0"), "myscript");
        assert_eq!(string(&mut i, "$1"), "one");
        assert_eq!(string(&mut i, "${10}"), "");
        assert_eq!(string(&mut i, "$$"), i.state.shell_pid.to_string());
    }

    #[test]
    fn test_nounset() {
        let mut i = interp();
        i.state.options.nounset = true;
        let err = i.expand_word_to_string(&Word::from_raw("$MISSING")).unwrap_err();
        assert!(matches!(err, ExpansionError::Unbound(ref n) if n == "MISSING"));
        assert_eq!(string(&mut i, "${MISSING:-ok}"), "ok");
        assert_eq!(fields(&mut i, "\"$@\""), Vec::<String>::new());
    }

    #[test]
    fn test_bad_substitution() {
        let mut i = interp();
        assert!(matches!(
            i.expand_word_to_string(&Word::from_raw("${x!y}")),
            Err(ExpansionError::BadSubstitution(_))
        ));
    }

    #[test]
    fn test_arithmetic_expansion() {
        let mut i = interp();
        i.state.vars.set_scalar("X", "1").unwrap();
        assert_eq!(string(&mut i, "$((X+2))"), "3");
        assert_eq!(i.state.vars.get_scalar("X"), Some("1"));
        assert_eq!(string(&mut i, "$((X+=4))"), "5");
        assert_eq!(i.state.vars.get_scalar("X"), Some("5"));
        assert_eq!(string(&mut i, "$(( $X * 2 ))"), "10");
        assert!(i.expand_word_to_string(&Word::from_raw("$((1/0))")).is_err());
    }

    #[test]
    fn test_tilde() {
        let mut i = interp();
        assert_eq!(fields(&mut i, "~"), vec!["/home/me"]);
        assert_eq!(fields(&mut i, "~/src"), vec!["/home/me/src"]);
        assert_eq!(fields(&mut i, "'~'"), vec!["~"]);
        assert_eq!(fields(&mut i, "a~"), vec!["a~"]);
        let value = i
            .expand_assignment_value(&Word::from_raw("~/a:~/b"))
            .unwrap();
        assert_eq!(value, "/home/me/a:/home/me/b");
    }

    #[test]
    fn test_pattern_expansion_escapes_quotes() {
        let mut i = interp();
        assert_eq!(i.expand_pattern(&Word::from_raw("\"*\"*")).unwrap(), "\\**");
        assert_eq!(i.expand_pattern(&Word::from_raw("a\\?")).unwrap(), "a\\?");
    }

    #[test]
    fn test_regex_expansion_quotes_literal() {
        let mut i = interp();
        i.state.vars.set_scalar("EXT", "t.t").unwrap();
        assert_eq!(i.expand_regex("^a+\\.\"$EXT\"$").unwrap(), "^a+\\.t\\.t$");
    }

    #[test]
    fn test_heredoc_expansion() {
        let mut i = interp();
        i.state.vars.set_scalar("N", "42").unwrap();
        assert_eq!(
            i.expand_heredoc("n=$N \"q\" \\$N \\x\n").unwrap(),
            "n=42 \"q\" $N \\x\n"
        );
    }
}
