//! FILENAME: core/engine/src/variables.rs
//! PURPOSE: Scoped variable lookup and `${scope.name}` interpolation.
//! CONTEXT: Reports expose caller inputs as `input.*` and aggregates as
//! `pivot.sum.field`, `total.count.field`, ... The same scope resolves formula
//! variables and query-filter placeholders.

use std::collections::HashMap;

use crate::value::Value;

/// Named value maps addressed as `scope.name`.
///
/// The reference is split at its FIRST dot only, so `pivot.sum.amount` looks up
/// the key `sum.amount` in the `pivot` map.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    scopes: HashMap<String, HashMap<String, Value>>,
}

impl VariableScope {
    pub fn new() -> Self {
        VariableScope::default()
    }

    pub fn with_scope(mut self, scope: impl Into<String>, values: HashMap<String, Value>) -> Self {
        self.scopes.insert(scope.into(), values);
        self
    }

    pub fn insert_scope(&mut self, scope: impl Into<String>, values: HashMap<String, Value>) {
        self.scopes.insert(scope.into(), values);
    }

    pub fn set(&mut self, scope: &str, name: impl Into<String>, value: impl Into<Value>) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .insert(name.into(), value.into());
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains_key(scope)
    }

    /// Resolves `scope.name`. Returns `None` for unknown scopes, unknown names,
    /// or references without a dot.
    pub fn resolve(&self, reference: &str) -> Option<&Value> {
        let (scope, name) = reference.trim().split_once('.')?;
        self.scopes.get(scope)?.get(name)
    }

    /// Substitutes `${...}` placeholders inside a value. Non-text values pass through.
    pub fn interpolate_value(&self, value: &Value) -> Value {
        match value {
            Value::Text(text) => self.interpolate_str(text),
            other => other.clone(),
        }
    }

    /// A string that is exactly one placeholder becomes the referenced typed value
    /// (null when unresolved). Otherwise each placeholder is replaced by the
    /// referenced value's text; an unterminated `${` is left untouched.
    pub fn interpolate_str(&self, text: &str) -> Value {
        if let Some(reference) = sole_placeholder(text) {
            return self.resolve(reference).cloned().unwrap_or(Value::Null);
        }
        if !text.contains("${") {
            return Value::Text(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    if let Some(value) = self.resolve(&after[..end]) {
                        out.push_str(&value.to_string());
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        Value::Text(out)
    }
}

fn sole_placeholder(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains("${") || inner.contains('}') {
        return None;
    }
    Some(inner)
}
