//! Arithmetic Evaluation
//!
//! Evaluates parsed arithmetic expressions against the shell state:
//! - Basic operators (+, -, *, /, %, **)
//! - Comparison operators (<, <=, >, >=, ==, !=)
//! - Bitwise operators (&, |, ^, ~, <<, >>)
//! - Logical operators (&&, ||, !) with short-circuiting
//! - Assignment operators (=, +=, -=, etc.)
//! - Ternary operator (? :)
//! - Pre/post increment/decrement (++, --)
//!
//! Integers are 64-bit and wrap on overflow. A variable whose value is itself
//! an expression is evaluated recursively, bounded by [`MAX_ARITH_DEPTH`].
//! `$` expansions inside the text are resolved by the caller before parsing.

use crate::ast::types::{ArithAssignOp, ArithBinaryOp, ArithExpr, ArithUnaryOp};
use crate::interpreter::errors::{ArithmeticError, ExpansionError};
use crate::interpreter::types::InterpreterState;
use crate::parser::arithmetic_parser::{parse_arithmetic, parse_number};
use crate::parser::types::is_valid_name;

/// Deepest chain of variables-holding-expressions we follow.
pub const MAX_ARITH_DEPTH: usize = 256;

// ============================================================================
// Operators
// ============================================================================

fn bool_value(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

/// Pure binary operator evaluation. `&&` and `||` are handled by the caller.
fn apply_binary_op(left: i64, right: i64, op: ArithBinaryOp) -> Result<i64, ArithmeticError> {
    Ok(match op {
        ArithBinaryOp::Add => left.wrapping_add(right),
        ArithBinaryOp::Sub => left.wrapping_sub(right),
        ArithBinaryOp::Mul => left.wrapping_mul(right),
        ArithBinaryOp::Div => {
            if right == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            left.wrapping_div(right)
        }
        ArithBinaryOp::Mod => {
            if right == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            left.wrapping_rem(right)
        }
        ArithBinaryOp::Pow => {
            if right < 0 {
                return Err(ArithmeticError::NegativeExponent);
            }
            left.wrapping_pow(right.min(u32::MAX as i64) as u32)
        }
        ArithBinaryOp::Shl => left.wrapping_shl((right & 63) as u32),
        ArithBinaryOp::Shr => left.wrapping_shr((right & 63) as u32),
        ArithBinaryOp::Lt => bool_value(left < right),
        ArithBinaryOp::Le => bool_value(left <= right),
        ArithBinaryOp::Gt => bool_value(left > right),
        ArithBinaryOp::Ge => bool_value(left >= right),
        ArithBinaryOp::Eq => bool_value(left == right),
        ArithBinaryOp::Ne => bool_value(left != right),
        ArithBinaryOp::BitAnd => left & right,
        ArithBinaryOp::BitXor => left ^ right,
        ArithBinaryOp::BitOr => left | right,
        ArithBinaryOp::LogicalAnd => bool_value(left != 0 && right != 0),
        ArithBinaryOp::LogicalOr => bool_value(left != 0 || right != 0),
    })
}

fn apply_unary_op(operand: i64, op: ArithUnaryOp) -> i64 {
    match op {
        ArithUnaryOp::Plus => operand,
        ArithUnaryOp::Minus => operand.wrapping_neg(),
        ArithUnaryOp::Not => bool_value(operand == 0),
        ArithUnaryOp::BitNot => !operand,
    }
}

fn readonly_error(err: ExpansionError) -> ArithmeticError {
    match err {
        ExpansionError::Readonly(name) => ArithmeticError::Readonly(name),
        other => ArithmeticError::Syntax(other.to_string()),
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Arithmetic evaluator bound to the shell state.
pub struct ArithEvaluator<'a> {
    state: &'a mut InterpreterState,
}

impl<'a> ArithEvaluator<'a> {
    pub fn new(state: &'a mut InterpreterState) -> Self {
        Self { state }
    }

    /// Parse and evaluate expression text.
    pub fn evaluate_text(&mut self, text: &str) -> Result<i64, ArithmeticError> {
        let expr = parse_arithmetic(text)?;
        self.evaluate(&expr)
    }

    pub fn evaluate(&mut self, expr: &ArithExpr) -> Result<i64, ArithmeticError> {
        match expr {
            ArithExpr::Number(n) => Ok(*n),
            ArithExpr::Variable { name, index } => {
                let index = self.eval_index(index.as_deref())?;
                self.read_variable(name, index)
            }
            ArithExpr::Unary(op, operand) => Ok(apply_unary_op(self.evaluate(operand)?, *op)),
            ArithExpr::Binary(ArithBinaryOp::LogicalAnd, left, right) => {
                if self.evaluate(left)? == 0 {
                    return Ok(0);
                }
                Ok(bool_value(self.evaluate(right)? != 0))
            }
            ArithExpr::Binary(ArithBinaryOp::LogicalOr, left, right) => {
                if self.evaluate(left)? != 0 {
                    return Ok(1);
                }
                Ok(bool_value(self.evaluate(right)? != 0))
            }
            ArithExpr::Binary(op, left, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                apply_binary_op(left, right, *op)
            }
            ArithExpr::Ternary(cond, then, otherwise) => {
                if self.evaluate(cond)? != 0 {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            ArithExpr::Assign {
                op,
                name,
                index,
                value,
            } => self.eval_assign(*op, name, index.as_deref(), value),
            ArithExpr::Update {
                name,
                index,
                delta,
                prefix,
            } => {
                let index = self.eval_index(index.as_deref())?;
                let old = self.read_variable(name, index)?;
                let new = old.wrapping_add(*delta);
                self.write_variable(name, index, new)?;
                Ok(if *prefix { new } else { old })
            }
            ArithExpr::Comma(first, second) => {
                self.evaluate(first)?;
                self.evaluate(second)
            }
        }
    }

    fn eval_assign(
        &mut self,
        op: ArithAssignOp,
        name: &str,
        index: Option<&ArithExpr>,
        value: &ArithExpr,
    ) -> Result<i64, ArithmeticError> {
        let index = self.eval_index(index)?;
        let rhs = self.evaluate(value)?;
        let result = match op.op {
            None => rhs,
            Some(bin) => {
                let current = self.read_variable(name, index)?;
                apply_binary_op(current, rhs, bin)?
            }
        };
        self.write_variable(name, index, result)?;
        Ok(result)
    }

    fn eval_index(&mut self, index: Option<&ArithExpr>) -> Result<Option<usize>, ArithmeticError> {
        match index {
            None => Ok(None),
            Some(expr) => {
                let value = self.evaluate(expr)?;
                if value < 0 {
                    return Err(ArithmeticError::Syntax(format!("{}: bad array subscript", value)));
                }
                Ok(Some(value as usize))
            }
        }
    }

    fn read_variable(&mut self, name: &str, index: Option<usize>) -> Result<i64, ArithmeticError> {
        let raw = match index {
            Some(i) => self.state.vars.get_element(name, i).map(str::to_string),
            None => self.state.scalar(name),
        };
        let Some(raw) = raw else {
            if self.state.options.nounset {
                return Err(ArithmeticError::Unbound(name.to_string()));
            }
            return Ok(0);
        };
        self.value_of(name, raw.trim())
    }

    /// Integer value of a variable's text: a number, another variable name
    /// or a nested expression.
    fn value_of(&mut self, name: &str, text: &str) -> Result<i64, ArithmeticError> {
        if text.is_empty() {
            return Ok(0);
        }
        if let Ok(n) = parse_number(text) {
            return Ok(n);
        }
        if self.state.arith_depth >= MAX_ARITH_DEPTH {
            return Err(ArithmeticError::Recursion(name.to_string()));
        }
        self.state.arith_depth += 1;
        let result = if is_valid_name(text) {
            self.read_variable(text, None)
        } else {
            self.evaluate_text(text)
        };
        self.state.arith_depth -= 1;
        result
    }

    fn write_variable(&mut self, name: &str, index: Option<usize>, value: i64) -> Result<(), ArithmeticError> {
        let text = value.to_string();
        match index {
            Some(i) => self.state.set_var_element(name, i, text),
            None => self.state.set_var(name, text),
        }
        .map_err(readonly_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;

    fn state() -> InterpreterState {
        InterpreterState::new(ShellOptions::default(), "plush")
    }

    fn eval(state: &mut InterpreterState, text: &str) -> Result<i64, ArithmeticError> {
        ArithEvaluator::new(state).evaluate_text(text)
    }

    #[test]
    fn test_apply_binary_op() {
        assert_eq!(apply_binary_op(7, 2, ArithBinaryOp::Div).unwrap(), 3);
        assert_eq!(apply_binary_op(-7, 2, ArithBinaryOp::Mod).unwrap(), -1);
        assert_eq!(apply_binary_op(2, 10, ArithBinaryOp::Pow).unwrap(), 1024);
        assert_eq!(apply_binary_op(i64::MAX, 1, ArithBinaryOp::Add).unwrap(), i64::MIN);
    }

    #[test]
    fn test_division_by_zero() {
        let mut s = state();
        assert_eq!(eval(&mut s, "1/0"), Err(ArithmeticError::DivisionByZero));
        assert_eq!(eval(&mut s, "5%0"), Err(ArithmeticError::DivisionByZero));
        assert_eq!(eval(&mut s, "2**-1"), Err(ArithmeticError::NegativeExponent));
    }

    #[test]
    fn test_precedence_and_logic() {
        let mut s = state();
        assert_eq!(eval(&mut s, "1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval(&mut s, "(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval(&mut s, "2 ** 3 ** 2").unwrap(), 512);
        assert_eq!(eval(&mut s, "1 < 2 && 3 > 4").unwrap(), 0);
        assert_eq!(eval(&mut s, "0 || 5").unwrap(), 1);
        assert_eq!(eval(&mut s, "1 ? 10 : 20").unwrap(), 10);
        assert_eq!(eval(&mut s, "~0").unwrap(), -1);
        assert_eq!(eval(&mut s, "0x10 + 010 + 2#11").unwrap(), 27);
    }

    #[test]
    fn test_short_circuit_skips_side_effects() {
        let mut s = state();
        eval(&mut s, "0 && (x = 5)").unwrap();
        assert_eq!(s.vars.get_scalar("x"), None);
    }

    #[test]
    fn test_assignment_and_update() {
        let mut s = state();
        assert_eq!(eval(&mut s, "x = 5").unwrap(), 5);
        assert_eq!(eval(&mut s, "x += 2").unwrap(), 7);
        assert_eq!(eval(&mut s, "x++").unwrap(), 7);
        assert_eq!(eval(&mut s, "++x").unwrap(), 9);
        assert_eq!(s.vars.get_scalar("x"), Some("9"));
        assert_eq!(eval(&mut s, "a[2] = 4, a[2] * 2").unwrap(), 8);
        assert_eq!(s.vars.get_element("a", 2), Some("4"));
    }

    #[test]
    fn test_unset_and_nounset() {
        let mut s = state();
        assert_eq!(eval(&mut s, "missing + 1").unwrap(), 1);
        s.options.nounset = true;
        assert_eq!(
            eval(&mut s, "missing + 1"),
            Err(ArithmeticError::Unbound("missing".into()))
        );
    }

    #[test]
    fn test_recursive_variables() {
        let mut s = state();
        s.vars.set_scalar("a", "b + 1").unwrap();
        s.vars.set_scalar("b", "2").unwrap();
        assert_eq!(eval(&mut s, "a * 2").unwrap(), 6);
        s.vars.set_scalar("c", "c").unwrap();
        assert!(matches!(eval(&mut s, "c"), Err(ArithmeticError::Recursion(_))));
        assert_eq!(s.arith_depth, 0);
    }

    #[test]
    fn test_readonly_assignment_fails() {
        let mut s = state();
        s.vars.set_scalar("r", "1").unwrap();
        s.vars.mark_readonly("r");
        assert_eq!(eval(&mut s, "r = 2"), Err(ArithmeticError::Readonly("r".into())));
    }

    #[test]
    fn test_syntax_error() {
        let mut s = state();
        assert!(matches!(eval(&mut s, "1 +"), Err(ArithmeticError::Syntax(_))));
        assert_eq!(eval(&mut s, "").unwrap(), 0);
    }
}
