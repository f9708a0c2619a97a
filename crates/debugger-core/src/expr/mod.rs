//! Watch and breakpoint-condition expressions.
//!
//! Grammar, loosest binding first: `||`, `&&`, `|`, `^`, `&`, `== !=`,
//! `< <= > >=`, `<< >>`, `+ -`, `* / %`, then unary `- ! ~` and primaries.
//! Primaries are decimal, `$hex` or `0xhex` literals, identifiers,
//! parenthesized expressions, `[addr]` (byte read) and `{addr}` (word read).
//! Arithmetic wraps at 32 bits.

mod lexer;
mod parser;

use std::collections::HashMap;

use crate::EvalError;
use parser::{BinaryOp, Expr, UnaryOp};

const MAX_CACHED_EXPRESSIONS: usize = 1024;

/// Machine state an expression is evaluated against.
pub trait EvalContext {
    /// Value of a lowercase identifier, or `None` when it is unknown.
    fn resolve(&self, name: &str) -> Option<i32>;

    /// Side-effect-free read of one CPU-visible byte.
    fn read_byte(&self, address: u32) -> u8;
}

/// Kind of value an expression produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EvalResultType {
    /// Integer result.
    Numeric,
    /// Comparison or logical result; the value is 0 or 1.
    Boolean,
}

/// Evaluated expression value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EvalResult {
    /// Numeric value; booleans are 0 or 1.
    pub value: i32,
    /// Result kind.
    pub kind: EvalResultType,
}

impl EvalResult {
    const fn numeric(value: i32) -> Self {
        Self {
            value,
            kind: EvalResultType::Numeric,
        }
    }

    const fn boolean(value: bool) -> Self {
        Self {
            value: value as i32,
            kind: EvalResultType::Boolean,
        }
    }

    /// Returns `true` for any non-zero value.
    #[must_use]
    pub const fn is_truthy(self) -> bool {
        self.value != 0
    }
}

/// Parses and evaluates expressions, caching parse trees and results.
///
/// Parse trees are cached by normalized text. Results are cached per
/// generation; the owner bumps the generation whenever machine state may
/// have changed.
#[derive(Debug, Default)]
pub struct ExpressionEvaluator {
    parsed: HashMap<String, Expr>,
    values: HashMap<String, (u64, EvalResult)>,
    generation: u64,
}

impl ExpressionEvaluator {
    /// Creates an evaluator with empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cache generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks every cached result stale.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Drops both caches.
    pub fn clear_cache(&mut self) {
        self.parsed.clear();
        self.values.clear();
    }

    /// Checks that `text` parses, without evaluating it.
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed text.
    pub fn validate(&mut self, text: &str) -> Result<(), EvalError> {
        self.parsed_tree(text).map(|_| ())
    }

    /// Evaluates `text` against `context`.
    ///
    /// With `use_cache`, a result computed in the current generation is
    /// returned without re-evaluating.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] for malformed text, unknown identifiers and
    /// division by zero.
    pub fn evaluate(
        &mut self,
        text: &str,
        context: &dyn EvalContext,
        use_cache: bool,
    ) -> Result<EvalResult, EvalError> {
        let key = normalize(text);
        if use_cache {
            if let Some(&(generation, result)) = self.values.get(&key) {
                if generation == self.generation {
                    return Ok(result);
                }
            }
        }

        let expr = self.parsed_tree(text)?;
        let result = evaluate(expr, context)?;

        if use_cache {
            if self.values.len() >= MAX_CACHED_EXPRESSIONS {
                let current = self.generation;
                self.values.retain(|_, (generation, _)| *generation == current);
            }
            self.values.insert(key, (self.generation, result));
        }
        Ok(result)
    }

    fn parsed_tree(&mut self, text: &str) -> Result<&Expr, EvalError> {
        let key = normalize(text);
        if !self.parsed.contains_key(&key) {
            let expr = parser::parse(text)?;
            if self.parsed.len() >= MAX_CACHED_EXPRESSIONS {
                self.parsed.clear();
            }
            self.parsed.insert(key.clone(), expr);
        }
        self.parsed.get(&key).ok_or(EvalError::Empty)
    }
}

/// Trims and collapses whitespace runs so formatting variants share a cache slot.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn evaluate(expr: &Expr, context: &dyn EvalContext) -> Result<EvalResult, EvalError> {
    Ok(match expr {
        Expr::Number(value) => EvalResult::numeric(*value),
        Expr::Ident(name) => context
            .resolve(name)
            .map(EvalResult::numeric)
            .ok_or_else(|| EvalError::UnknownIdentifier(name.clone()))?,
        Expr::Unary(op, operand) => {
            let value = evaluate(operand, context)?.value;
            match op {
                UnaryOp::Neg => EvalResult::numeric(value.wrapping_neg()),
                UnaryOp::BitNot => EvalResult::numeric(!value),
                UnaryOp::Not => EvalResult::boolean(value == 0),
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, context)?.value;
            match op {
                BinaryOp::And if lhs == 0 => return Ok(EvalResult::boolean(false)),
                BinaryOp::Or if lhs != 0 => return Ok(EvalResult::boolean(true)),
                _ => {}
            }
            let rhs = evaluate(rhs, context)?.value;
            binary(*op, lhs, rhs)?
        }
        Expr::ReadByte(address) => {
            let address = address_of(evaluate(address, context)?);
            EvalResult::numeric(i32::from(context.read_byte(address)))
        }
        Expr::ReadWord(address) => {
            let address = address_of(evaluate(address, context)?);
            let low = context.read_byte(address);
            let high = context.read_byte(address.wrapping_add(1) & 0xFFFF);
            EvalResult::numeric(i32::from(u16::from_le_bytes([low, high])))
        }
    })
}

#[allow(clippy::cast_sign_loss)]
const fn address_of(result: EvalResult) -> u32 {
    (result.value as u32) & 0xFFFF
}

#[allow(clippy::cast_sign_loss)]
fn binary(op: BinaryOp, lhs: i32, rhs: i32) -> Result<EvalResult, EvalError> {
    let shift = (rhs as u32) & 31;
    let value = match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div | BinaryOp::Rem if rhs == 0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => lhs.wrapping_div(rhs),
        BinaryOp::Rem => lhs.wrapping_rem(rhs),
        BinaryOp::Shl => lhs.wrapping_shl(shift),
        BinaryOp::Shr => lhs.wrapping_shr(shift),
        BinaryOp::BitAnd => lhs & rhs,
        BinaryOp::BitXor => lhs ^ rhs,
        BinaryOp::BitOr => lhs | rhs,
        BinaryOp::Lt => i32::from(lhs < rhs),
        BinaryOp::LtEq => i32::from(lhs <= rhs),
        BinaryOp::Gt => i32::from(lhs > rhs),
        BinaryOp::GtEq => i32::from(lhs >= rhs),
        BinaryOp::Eq => i32::from(lhs == rhs),
        BinaryOp::NotEq => i32::from(lhs != rhs),
        // The left operand already failed to short-circuit.
        BinaryOp::And | BinaryOp::Or => i32::from(rhs != 0),
    };
    Ok(if op.is_boolean() {
        EvalResult::boolean(value != 0)
    } else {
        EvalResult::numeric(value)
    })
}
