//! FILENAME: core/parser/src/evaluator.rs
//! PURPOSE: Single-pass recursive descent evaluator for report formulas.
//! CONTEXT: There is no separate lexer or AST. One cursor walks the formula;
//! every `(` recurses into an argument list and each argument is evaluated as
//! soon as its closing `,` or `)` is reached.
//!
//! GRAMMAR:
//!   formula   --> call | token
//!   call      --> NAME "(" arguments? ")"
//!   arguments --> formula ("," formula)*
//!   token     --> NUMBER | "\"" TEXT "\"" | scope "." name
//!
//! Quoted text has no escapes: a `,` or `)` inside quotes still ends the argument.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use engine::{Value, VariableScope};
use log::trace;

use crate::error::{FormulaError, FormulaResult};
use crate::function::Function;

/// Evaluates `formula` against `scope`.
pub fn evaluate(formula: &str, scope: &VariableScope) -> FormulaResult<Value> {
    FormulaEvaluator::new(scope).evaluate(formula)
}

pub struct FormulaEvaluator<'a> {
    scope: &'a VariableScope,
}

impl<'a> FormulaEvaluator<'a> {
    pub fn new(scope: &'a VariableScope) -> Self {
        FormulaEvaluator { scope }
    }

    pub fn evaluate(&self, formula: &str) -> FormulaResult<Value> {
        let mut cursor = Cursor {
            formula,
            chars: formula.chars().collect(),
            pos: 0,
        };
        let value = self.formula(&mut cursor)?;
        trace!("{} => {}", formula, value);
        Ok(value)
    }

    /// Top level: a bare token or one call, optionally surrounded by whitespace.
    fn formula(&self, cursor: &mut Cursor<'_>) -> FormulaResult<Value> {
        let mut token = String::new();
        let mut evaluated: Option<Value> = None;

        while let Some(ch) = cursor.next() {
            match ch {
                '(' => {
                    let value = self.call(&token, cursor)?;
                    token.clear();
                    if evaluated.replace(value).is_some() {
                        return Err(FormulaError::Unrecognized(cursor.formula.to_string()));
                    }
                }
                ',' | ')' => return Err(cursor.unexpected(ch)),
                _ => token.push(ch),
            }
        }

        self.finish_argument(token, evaluated)
    }

    /// Parses the argument list after `name(` and applies the function.
    fn call(&self, name: &str, cursor: &mut Cursor<'_>) -> FormulaResult<Value> {
        let name = name.trim();
        let function = Function::from_name(name)
            .ok_or_else(|| FormulaError::Unrecognized(format!("{}(", name)))?;
        let args = self.arguments(cursor)?;
        function.apply(args)
    }

    fn arguments(&self, cursor: &mut Cursor<'_>) -> FormulaResult<Vec<Value>> {
        let mut args = Vec::new();
        let mut token = String::new();
        // Set when the current argument was a nested call that is already evaluated.
        let mut evaluated: Option<Value> = None;

        loop {
            let ch = cursor
                .next()
                .ok_or_else(|| FormulaError::Unbalanced(cursor.formula.to_string()))?;
            match ch {
                '(' => {
                    let value = self.call(&token, cursor)?;
                    token.clear();
                    if evaluated.replace(value).is_some() {
                        return Err(cursor.unexpected(ch));
                    }
                }
                ',' | ')' => {
                    let empty_call =
                        ch == ')' && args.is_empty() && evaluated.is_none() && token.trim().is_empty();
                    if !empty_call {
                        args.push(self.finish_argument(std::mem::take(&mut token), evaluated.take())?);
                    }
                    if ch == ')' {
                        return Ok(args);
                    }
                }
                _ => token.push(ch),
            }
        }
    }

    /// An argument is either the value of a nested call or a bare token, never both.
    fn finish_argument(&self, token: String, evaluated: Option<Value>) -> FormulaResult<Value> {
        match evaluated {
            Some(value) if token.trim().is_empty() => Ok(value),
            Some(_) => Err(FormulaError::Unrecognized(token.trim().to_string())),
            None => self.token(&token),
        }
    }

    /// Quoted text, then a decimal literal, then a variable reference.
    fn token(&self, token: &str) -> FormulaResult<Value> {
        let token = token.trim();

        if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
            return Ok(Value::Text(token[1..token.len() - 1].to_string()));
        }
        if let Ok(number) = BigDecimal::from_str(token) {
            return Ok(Value::Decimal(number));
        }
        if let Some(value) = self.scope.resolve(token) {
            return Ok(value.clone());
        }
        Err(FormulaError::Unrecognized(token.to_string()))
    }
}

struct Cursor<'f> {
    formula: &'f str,
    chars: Vec<char>,
    pos: usize,
}

impl Cursor<'_> {
    fn next(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn unexpected(&self, ch: char) -> FormulaError {
        FormulaError::UnexpectedCharacter {
            ch,
            position: self.pos,
            formula: self.formula.to_string(),
        }
    }
}
