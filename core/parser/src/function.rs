//! FILENAME: core/parser/src/function.rs
//! PURPOSE: The built-in function table and its evaluation rules.
//! CONTEXT: Every function takes already-evaluated arguments. Arithmetic is done
//! on `BigDecimal`; a null operand makes the whole result null.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};
use engine::Value;

use crate::error::{FormulaError, FormulaResult};

/// Scale used by DIVIDE.
pub const DIVIDE_SCALE: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Add,
    Minus,
    Multiply,
    Divide,
    DivideScale,
    Round,
    Scale,
    Nvl,
    If,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Function {
    /// Looks up a function by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Function> {
        let function = match name.trim().to_ascii_uppercase().as_str() {
            "ADD" => Function::Add,
            "MINUS" => Function::Minus,
            "MULTIPLY" => Function::Multiply,
            "DIVIDE" => Function::Divide,
            "DIVIDE_SCALE" => Function::DivideScale,
            "ROUND" => Function::Round,
            "SCALE" => Function::Scale,
            "NVL" => Function::Nvl,
            "IF" => Function::If,
            "LT" => Function::Lt,
            "LTE" => Function::Lte,
            "GT" => Function::Gt,
            "GTE" => Function::Gte,
            _ => return None,
        };
        Some(function)
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::DivideScale | Function::If => 3,
            _ => 2,
        }
    }

    /// Checks the argument count and evaluates.
    pub fn apply(&self, args: Vec<Value>) -> FormulaResult<Value> {
        if args.len() != self.arity() {
            return Err(FormulaError::Arity {
                function: self.to_string(),
                expected: self.arity(),
                received: args.len(),
            });
        }

        match self {
            Function::Nvl => {
                let mut args = args.into_iter();
                let first = args.next().unwrap_or_default();
                let second = args.next().unwrap_or_default();
                Ok(if first.is_null() { second } else { first })
            }
            Function::If => {
                let mut args = args.into_iter();
                let condition = args.next().unwrap_or_default();
                let when_true = args.next().unwrap_or_default();
                let when_false = args.next().unwrap_or_default();
                Ok(if condition_is_true(&condition)? {
                    when_true
                } else {
                    when_false
                })
            }
            Function::Add => self.numeric(&args, |n| Ok(Value::Decimal(&n[0] + &n[1]))),
            Function::Minus => self.numeric(&args, |n| Ok(Value::Decimal(&n[0] - &n[1]))),
            Function::Multiply => self.numeric(&args, |n| Ok(Value::Decimal(&n[0] * &n[1]))),
            Function::Divide => self.numeric(&args, |n| Ok(divide(&n[0], &n[1], DIVIDE_SCALE))),
            Function::DivideScale => self.numeric(&args, |n| {
                let scale = self.whole_number(&n[2])?;
                Ok(divide(&n[0], &n[1], scale))
            }),
            Function::Round => self.numeric(&args, |n| {
                let digits = self.whole_number(&n[1])?;
                if digits < 0 {
                    return Err(FormulaError::InvalidArgument {
                        function: self.to_string(),
                        message: format!("significant digits must not be negative, got {}", digits),
                    });
                }
                // Zero significant digits leaves the value as it is.
                Ok(match NonZeroU64::new(digits as u64) {
                    Some(precision) => {
                        Value::Decimal(n[0].with_precision_round(precision, RoundingMode::HalfUp))
                    }
                    None => Value::Decimal(n[0].clone()),
                })
            }),
            Function::Scale => self.numeric(&args, |n| {
                let scale = self.whole_number(&n[1])?;
                Ok(Value::Decimal(n[0].with_scale_round(scale, RoundingMode::HalfUp)))
            }),
            Function::Lt => self.numeric(&args, |n| Ok(Value::Boolean(n[0] < n[1]))),
            Function::Lte => self.numeric(&args, |n| Ok(Value::Boolean(n[0] <= n[1]))),
            Function::Gt => self.numeric(&args, |n| Ok(Value::Boolean(n[0] > n[1]))),
            Function::Gte => self.numeric(&args, |n| Ok(Value::Boolean(n[0] >= n[1]))),
        }
    }

    /// Converts every argument to a decimal and runs `op`, or returns null as
    /// soon as one argument is null.
    fn numeric(
        &self,
        args: &[Value],
        op: impl FnOnce(&[BigDecimal]) -> FormulaResult<Value>,
    ) -> FormulaResult<Value> {
        let mut operands = Vec::with_capacity(args.len());
        for arg in args {
            match self.operand(arg)? {
                Some(d) => operands.push(d),
                None => return Ok(Value::Null),
            }
        }
        op(&operands)
    }

    /// Numeric operand, `None` for null. Numeric text is accepted.
    fn operand(&self, value: &Value) -> FormulaResult<Option<BigDecimal>> {
        match value {
            Value::Null => Ok(None),
            Value::Text(text) => BigDecimal::from_str(text.trim())
                .map(Some)
                .map_err(|_| self.not_numeric(value)),
            other => other.as_decimal().map(Some).ok_or_else(|| self.not_numeric(other)),
        }
    }

    fn whole_number(&self, value: &BigDecimal) -> FormulaResult<i64> {
        if !value.is_integer() {
            return Err(FormulaError::InvalidArgument {
                function: self.to_string(),
                message: format!("expected a whole number, got {}", value),
            });
        }
        value.to_i64().ok_or_else(|| FormulaError::InvalidArgument {
            function: self.to_string(),
            message: format!("{} is out of range", value),
        })
    }

    fn not_numeric(&self, value: &Value) -> FormulaError {
        FormulaError::NotNumeric {
            function: self.to_string(),
            value: format!("{} '{}'", value.type_name(), value),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Function::Add => "ADD",
            Function::Minus => "MINUS",
            Function::Multiply => "MULTIPLY",
            Function::Divide => "DIVIDE",
            Function::DivideScale => "DIVIDE_SCALE",
            Function::Round => "ROUND",
            Function::Scale => "SCALE",
            Function::Nvl => "NVL",
            Function::If => "IF",
            Function::Lt => "LT",
            Function::Lte => "LTE",
            Function::Gt => "GT",
            Function::Gte => "GTE",
        };
        write!(f, "{}", name)
    }
}

/// Zero divisors yield null rather than an error.
fn divide(a: &BigDecimal, b: &BigDecimal, scale: i64) -> Value {
    if b.is_zero() {
        return Value::Null;
    }
    Value::Decimal((a / b).with_scale_round(scale, RoundingMode::HalfUp))
}

/// IF condition coercion.
///
/// Booleans pass through, numbers are true when non-zero and text must spell
/// `true` or `false`. Null and every other type count as false, while text that
/// is neither word is an error.
pub fn condition_is_true(value: &Value) -> FormulaResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Integer(i) => Ok(*i != 0),
        Value::Decimal(d) => Ok(!d.is_zero()),
        Value::Text(text) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("true") {
                Ok(true)
            } else if text.eq_ignore_ascii_case("false") {
                Ok(false)
            } else {
                Err(FormulaError::InvalidCondition(text.to_string()))
            }
        }
        Value::Null | Value::Date(_) => Ok(false),
    }
}
