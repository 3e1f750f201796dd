//! Conditional Expression Evaluation
//!
//! Evaluates the `[[ ... ]]` command:
//! - string tests (-z, -n), variable and option tests (-v, -o)
//! - file tests (-f, -d, -e, ...; -nt, -ot, -ef)
//! - pattern matching (==, !=) and string ordering (<, >)
//! - numeric comparisons (-eq, -ne, -lt, ...), both sides arithmetic
//! - regex matching (=~), captures stored in BASH_REMATCH
//!
//! Operands are expanded without field splitting or globbing.

use regex_lite::Regex;

use crate::ast::types::{CondBinaryOp, CondExpr, Word};
use crate::interpreter::arithmetic::ArithEvaluator;
use crate::interpreter::errors::{ExecResult, ExpansionError};
use crate::interpreter::expansion::pattern::pattern_matches;
use crate::interpreter::helpers::file_tests::{
    compare_files, test_file, BinaryFileTestOperator, FileTestOperator,
};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys;

/// Outcome of a `[[ ]]` evaluation that could not be decided.
const STATUS_INVALID: i32 = 2;

impl Interpreter {
    /// Run `[[ expr ]]` and return its status: 0 true, 1 false, 2 when a
    /// regex fails to compile.
    pub fn execute_conditional(&mut self, expr: &CondExpr) -> ExecResult<i32> {
        Ok(match self.evaluate_conditional(expr)? {
            Some(true) => 0,
            Some(false) => 1,
            None => STATUS_INVALID,
        })
    }

    /// `None` means the expression was malformed and a diagnostic has
    /// already been printed.
    fn evaluate_conditional(&mut self, expr: &CondExpr) -> ExecResult<Option<bool>> {
        match expr {
            CondExpr::Word(word) => Ok(Some(!self.expand_word_to_string(word)?.is_empty())),
            CondExpr::Not(inner) => Ok(self.evaluate_conditional(inner)?.map(|b| !b)),
            CondExpr::And(left, right) => match self.evaluate_conditional(left)? {
                Some(true) => self.evaluate_conditional(right),
                other => Ok(other),
            },
            CondExpr::Or(left, right) => match self.evaluate_conditional(left)? {
                Some(false) => self.evaluate_conditional(right),
                other => Ok(other),
            },
            CondExpr::Unary { op, operand } => {
                let value = self.expand_word_to_string(operand)?;
                Ok(Some(self.unary_test(op, &value)?))
            }
            CondExpr::Binary { op, left, right } => self.binary_test(*op, left, right).map(Some),
            CondExpr::Regex { left, pattern } => self.regex_test(left, pattern),
        }
    }

    fn unary_test(&mut self, op: &str, value: &str) -> ExecResult<bool> {
        Ok(match op {
            "-z" => value.is_empty(),
            "-n" => !value.is_empty(),
            "-v" => self.variable_is_set(value)?,
            "-o" => self.state.options.get(value).unwrap_or(false),
            _ => match FileTestOperator::from_str(op) {
                Some(test) => test_file(test, value),
                None => false,
            },
        })
    }

    fn variable_is_set(&mut self, name: &str) -> ExecResult<bool> {
        if let Some(open) = name.find('[') {
            if let Some(subscript) = name[open + 1..].strip_suffix(']') {
                let base = &name[..open];
                if matches!(subscript, "@" | "*") {
                    return Ok(self.state.vars.contains(base));
                }
                let index = self.resolve_index(base, subscript)?;
                return Ok(self.state.vars.get_element(base, index).is_some());
            }
        }
        Ok(self.state.vars.contains(name) || self.state.dynamic_var(name).is_some())
    }

    fn binary_test(&mut self, op: CondBinaryOp, left: &Word, right: &Word) -> ExecResult<bool> {
        let lhs = self.expand_word_to_string(left)?;
        match op {
            CondBinaryOp::PatternEq | CondBinaryOp::PatternNe => {
                let pattern = self.expand_pattern(right)?;
                let matched = pattern_matches(&pattern, &lhs);
                return Ok(matched == (op == CondBinaryOp::PatternEq));
            }
            _ => {}
        }

        let rhs = self.expand_word_to_string(right)?;
        Ok(match op {
            CondBinaryOp::StrLess => lhs < rhs,
            CondBinaryOp::StrGreater => lhs > rhs,
            CondBinaryOp::NewerThan => compare_files(BinaryFileTestOperator::NewerThan, &lhs, &rhs),
            CondBinaryOp::OlderThan => compare_files(BinaryFileTestOperator::OlderThan, &lhs, &rhs),
            CondBinaryOp::SameFile => compare_files(BinaryFileTestOperator::SameFile, &lhs, &rhs),
            numeric => {
                let a = self.arith_operand(&lhs)?;
                let b = self.arith_operand(&rhs)?;
                match numeric {
                    CondBinaryOp::NumEq => a == b,
                    CondBinaryOp::NumNe => a != b,
                    CondBinaryOp::NumLt => a < b,
                    CondBinaryOp::NumLe => a <= b,
                    CondBinaryOp::NumGt => a > b,
                    _ => a >= b,
                }
            }
        })
    }

    fn arith_operand(&mut self, text: &str) -> ExecResult<i64> {
        if text.trim().is_empty() {
            return Ok(0);
        }
        ArithEvaluator::new(&mut self.state)
            .evaluate_text(text)
            .map_err(|err| ExpansionError::from(err).into())
    }

    fn regex_test(&mut self, left: &Word, pattern: &str) -> ExecResult<Option<bool>> {
        let subject = self.expand_word_to_string(left)?;
        let source = self.expand_regex(pattern)?;
        let regex = match Regex::new(&source) {
            Ok(regex) => regex,
            Err(err) => {
                sys::print_err(&format!("plush: {}: invalid regular expression: {}\n", source, err));
                return Ok(None);
            }
        };
        let captures: Vec<String> = match regex.captures(&subject) {
            Some(caps) => caps
                .iter()
                .map(|group| group.map_or(String::new(), |m| m.as_str().to_string()))
                .collect(),
            None => Vec::new(),
        };
        let matched = !captures.is_empty();
        self.state.set_array("BASH_REMATCH", captures)?;
        Ok(Some(matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    fn interp() -> Interpreter {
        Interpreter::new(ShellOptions::default(), "plush")
    }

    #[test]
    fn test_string_tests() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("[[ -z '' ]]"), 0);
        assert_eq!(interp.execute_text("[[ -n '' ]]"), 1);
        assert_eq!(interp.execute_text("X=abc; [[ $X ]]"), 0);
        assert_eq!(interp.execute_text("[[ abc < abd ]]"), 0);
        assert_eq!(interp.execute_text("[[ b > c ]]"), 1);
    }

    #[test]
    fn test_pattern_match() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("[[ hello.rs == *.rs ]]"), 0);
        assert_eq!(interp.execute_text("[[ hello.rs != *.rs ]]"), 1);
        assert_eq!(interp.execute_text("[[ 'a*' == \"a*\" ]]"), 0);
        assert_eq!(interp.execute_text("[[ abc == \"a*\" ]]"), 1);
    }

    #[test]
    fn test_numeric_compare() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("[[ 10 -gt 9 ]]"), 0);
        assert_eq!(interp.execute_text("N=3; [[ N+1 -eq 4 ]]"), 0);
        assert_eq!(interp.execute_text("[[ 2 -le 1 ]]"), 1);
    }

    #[test]
    fn test_logical_operators() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("[[ -n a && ! -z b ]]"), 0);
        assert_eq!(interp.execute_text("[[ -z a || -n '' ]]"), 1);
        assert_eq!(interp.execute_text("[[ ( -z a || -n b ) && -n c ]]"), 0);
    }

    #[test]
    fn test_variable_and_option_tests() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("[[ -v NOPE ]]"), 1);
        assert_eq!(interp.execute_text("A=(x y); [[ -v A[1] ]]"), 0);
        assert_eq!(interp.execute_text("[[ -v A[5] ]]"), 1);
        assert_eq!(interp.execute_text("set -o pipefail; [[ -o pipefail ]]"), 0);
        assert_eq!(interp.execute_text("[[ -o errexit ]]"), 1);
    }

    #[test]
    fn test_regex_sets_rematch() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("[[ key=value =~ ^([a-z]+)=(.*)$ ]]"), 0);
        assert_eq!(interp.state.vars.get_element("BASH_REMATCH", 0), Some("key=value"));
        assert_eq!(interp.state.vars.get_element("BASH_REMATCH", 1), Some("key"));
        assert_eq!(interp.state.vars.get_element("BASH_REMATCH", 2), Some("value"));
        assert_eq!(interp.execute_text("[[ abc =~ ^x ]]"), 1);
        assert_eq!(interp.state.vars.get_element("BASH_REMATCH", 0), None);
    }

    #[test]
    fn test_invalid_regex() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("[[ a =~ [b ]]"), 2);
    }

    #[test]
    fn test_file_operators() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        let mut interp = interp();
        interp.state.set_var("F", file.display().to_string()).unwrap();
        interp.state.set_var("D", dir.path().display().to_string()).unwrap();
        assert_eq!(interp.execute_text("[[ -f $F && -d $D && -s $F ]]"), 0);
        assert_eq!(interp.execute_text("[[ -d $F ]]"), 1);
        assert_eq!(interp.execute_text("[[ $F -ef $F ]]"), 0);
        assert_eq!(interp.execute_text("[[ -e $D/missing ]]"), 1);
    }
}
