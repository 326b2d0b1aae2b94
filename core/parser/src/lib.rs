//! FILENAME: core/parser/src/lib.rs
//! PURPOSE: Library root for the report formula evaluator.
//! CONTEXT: Report columns are computed by small spreadsheet-style formulas
//! evaluated against a `VariableScope` (`input.*`, `pivot.sum.*`, `total.count.*`, ...).
//!
//! PIPELINE: Formula String --> Cursor --> (recursive call / token evaluation) --> Value
//!
//! SUPPORTED FEATURES:
//! - Decimal literals: 42, -1.5
//! - Text literals: "Yes"
//! - Variable references: input.region, pivot.sum.amount
//! - Function calls, nested to any depth: IF(GT(pivot.sum.b, 10), "big", "small")
//! - Functions: ADD, MINUS, MULTIPLY, DIVIDE, DIVIDE_SCALE, ROUND, SCALE, NVL,
//!   IF, LT, LTE, GT, GTE

pub mod error;
pub mod evaluator;
pub mod function;


// Re-export commonly used types for convenience
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, FormulaEvaluator};
pub use function::{condition_is_true, Function, DIVIDE_SCALE};
