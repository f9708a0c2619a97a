//! Error taxonomy surfaced by debugger operations.

use std::io;
use std::ops::Range;

use thiserror::Error;

use crate::MemoryType;

/// Crate-wide result alias for debugger operations.
pub type Result<T> = std::result::Result<T, DebuggerError>;

/// Failure categories returned synchronously to the immediate caller.
///
/// A search miss is not represented here: it is an ordinary `None` result.
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// An index, address or count fell outside the valid range of its target.
    #[error("{what} {value:#x} is outside {valid:#x?}")]
    OutOfRange {
        /// Name of the rejected quantity.
        what: &'static str,
        /// Rejected value.
        value: u64,
        /// Half-open range of accepted values.
        valid: Range<u64>,
    },
    /// A bulk memory operation used a buffer whose length differs from the region size.
    #[error("{memory_type} holds {expected} bytes but the buffer holds {actual}")]
    SizeMismatch {
        /// Memory region targeted by the operation.
        memory_type: MemoryType,
        /// Size of the region.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
    /// The trace log file could not be opened or written.
    #[error("trace log i/o failed: {0}")]
    Io(#[from] io::Error),
    /// An expression was malformed or could not be resolved.
    #[error("expression evaluation failed: {0}")]
    Eval(#[from] EvalError),
    /// The session has no attached debugger.
    #[error("debugger is not initialized")]
    NotInitialized,
}

impl DebuggerError {
    pub(crate) fn out_of_range(
        what: &'static str,
        value: impl Into<u64>,
        valid: Range<u64>,
    ) -> Self {
        Self::OutOfRange {
            what,
            value: value.into(),
            valid,
        }
    }
}

/// Expression parse and evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The expression contained no tokens.
    #[error("expression is empty")]
    Empty,
    /// A character that starts no token was found.
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Byte offset into the expression text.
        offset: usize,
    },
    /// A token appeared where the grammar does not allow it.
    #[error("unexpected `{token}` at offset {offset}")]
    UnexpectedToken {
        /// Rendered token text.
        token: String,
        /// Byte offset into the expression text.
        offset: usize,
    },
    /// The expression ended while an operand or closing bracket was expected.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A numeric literal could not be represented.
    #[error("invalid numeric literal `{0}`")]
    InvalidLiteral(String),
    /// An identifier named no register, flag or counter.
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
}

#[cfg(test)]
mod tests {
    use super::{DebuggerError, EvalError};
    use crate::MemoryType;

    #[test]
    fn out_of_range_message_names_value_and_bounds() {
        let err = DebuggerError::out_of_range("address", 0x800_u32, 0..0x800);
        assert_eq!(err.to_string(), "address 0x800 is outside 0x0..0x800");
    }

    #[test]
    fn size_mismatch_message_names_memory_type() {
        let err = DebuggerError::SizeMismatch {
            memory_type: MemoryType::WorkRam,
            expected: 0x800,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "work RAM holds 2048 bytes but the buffer holds 4"
        );
    }

    #[test]
    fn eval_errors_convert_into_debugger_errors() {
        let err: DebuggerError = EvalError::DivisionByZero.into();
        assert!(matches!(err, DebuggerError::Eval(EvalError::DivisionByZero)));
    }
}
