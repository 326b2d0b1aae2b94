//! FILENAME: core/parser/src/error.rs
//! PURPOSE: Errors raised while parsing or evaluating a formula.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Function {function} requires {expected} arguments but received {received}")]
    Arity {
        function: String,
        expected: usize,
        received: usize,
    },

    #[error("Unrecognized expression: '{0}'")]
    Unrecognized(String),

    #[error("{function}: expected a number, got {value}")]
    NotNumeric { function: String, value: String },

    #[error("IF: cannot use '{0}' as a condition")]
    InvalidCondition(String),

    #[error("{function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Unexpected '{ch}' at position {position} in '{formula}'")]
    UnexpectedCharacter {
        ch: char,
        position: usize,
        formula: String,
    },

    #[error("Missing ')' in '{0}'")]
    Unbalanced(String),
}

pub type FormulaResult<T> = Result<T, FormulaError>;
