use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::callable::Callable;

/// A dynamically typed value produced by evaluating an expression.
///
/// `Value` is the concrete runtime representation shipped by this crate; a host embedding this
/// language is free to ignore it entirely and work only in terms of [ValueInterpreter] and its
/// own value type, as long as that type implements [ObjectView] where member/index access is
/// needed.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    Str(String),
    List(Arc<Vec<Value>>),
    Map(Arc<HashMap<String, Value>>),
    Callable(Arc<dyn Callable>),
    /// An opaque host value exposing member/index access via [ObjectView], for embeddings whose
    /// record types don't fit the built-in [Value::Map] shape.
    Object(Arc<dyn ObjectView>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A host-supplied surface for member access (`.`) and indexing (`[]`) over opaque values that
/// aren't one of the built-in [Value] shapes -- e.g. a record type defined by the embedding
/// application.
pub trait ObjectView: Debug {
    fn get_member(&self, name: &str) -> Option<Value>;
    fn get_index(&self, index: &Value) -> Option<Value>;
}

impl ObjectView for HashMap<String, Value> {
    fn get_member(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn get_index(&self, index: &Value) -> Option<Value> {
        if let Value::Str(key) = index {
            self.get(key).cloned()
        } else {
            None
        }
    }
}

impl ObjectView for Vec<Value> {
    fn get_member(&self, _name: &str) -> Option<Value> {
        None
    }

    fn get_index(&self, index: &Value) -> Option<Value> {
        let Value::Long(i) = index else { return None };
        let i = *i;
        if i < 0 {
            return None;
        }
        self.get(i as usize).cloned()
    }
}

/// A coarse classification used by [ValueInterpreter::perform_math] to decide whether an
/// operation should be carried out in integer or floating point arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Long,
    Double,
}

/// Every coercion, comparison and arithmetic rule the interpreter needs is delegated here,
/// rather than hard-coded against [Value]. A host can supply its own implementation to evaluate
/// expressions against its own value type and coercion rules; [DefaultValueInterpreter] is the
/// one this crate ships for [Value] itself.
pub trait ValueInterpreter: Debug + Send + Sync {
    fn as_boolean(&self, value: &Value) -> bool;
    fn as_long(&self, value: &Value) -> Option<i64>;
    fn as_double(&self, value: &Value) -> Option<f64>;
    fn as_string(&self, value: &Value) -> String;
    fn has_decimal_point(&self, value: &Value) -> bool;
    fn try_parse_number(&self, text: &str) -> Option<Value>;
    fn are_equal(&self, lhs: &Value, rhs: &Value, exact: bool) -> bool;
    fn compare(&self, lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering>;
    fn perform_math(&self, op: crate::MathOp, lhs: &Value, rhs: &Value) -> crate::Result<Value>;
    fn is_null(&self, value: &Value) -> bool {
        matches!(value, Value::Null)
    }
}

/// The [ValueInterpreter] this crate ships for its own [Value] type.
///
/// Coercion rules: [DefaultValueInterpreter::as_boolean] treats `Null`, `false`, `0`, `0.0` and
/// the empty string as falsy, everything else as truthy. Division (`/`) always produces a
/// `Double`; every other arithmetic operator stays a `Long` when both operands are `Long` and
/// promotes to `Double` the moment either operand is a `Double`.
#[derive(Debug, Default)]
pub struct DefaultValueInterpreter;

impl DefaultValueInterpreter {
    pub fn new() -> Self {
        Self
    }
}

impl ValueInterpreter for DefaultValueInterpreter {
    fn as_boolean(&self, value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Long(l) => *l != 0,
            Value::Double(d) => *d != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Callable(_) => true,
            Value::Object(_) => true,
        }
    }

    fn as_long(&self, value: &Value) -> Option<i64> {
        match value {
            Value::Long(l) => Some(*l),
            Value::Double(d) => Some(*d as i64),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_double(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_string(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Long(l) => l.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| self.as_string(v)).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Map(_) => "[object]".to_string(),
            Value::Callable(_) => "[callback]".to_string(),
            Value::Object(_) => "[object]".to_string(),
        }
    }

    fn has_decimal_point(&self, value: &Value) -> bool {
        matches!(value, Value::Double(_))
    }

    fn try_parse_number(&self, text: &str) -> Option<Value> {
        if let Ok(l) = text.parse::<i64>() {
            return Some(Value::Long(l));
        }
        text.parse::<f64>().ok().map(Value::Double)
    }

    fn are_equal(&self, lhs: &Value, rhs: &Value, exact: bool) -> bool {
        if exact {
            return lhs == rhs;
        }
        match (lhs, rhs) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Long(_) | Value::Double(_), Value::Long(_) | Value::Double(_)) => {
                self.as_double(lhs) == self.as_double(rhs)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => lhs == rhs,
        }
    }

    fn compare(&self, lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
        match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.as_double(lhs)?;
                let b = self.as_double(rhs)?;
                a.partial_cmp(&b)
            }
        }
    }

    fn perform_math(&self, op: crate::MathOp, lhs: &Value, rhs: &Value) -> crate::Result<Value> {
        use crate::MathOp::*;

        if op == Div {
            let a = self
                .as_double(lhs)
                .ok_or_else(|| non_numeric_operand(lhs))?;
            let b = self
                .as_double(rhs)
                .ok_or_else(|| non_numeric_operand(rhs))?;
            return Ok(Value::Double(a / b));
        }

        let both_long = matches!(lhs, Value::Long(_)) && matches!(rhs, Value::Long(_));
        if both_long {
            let a = self.as_long(lhs).ok_or_else(|| non_numeric_operand(lhs))?;
            let b = self.as_long(rhs).ok_or_else(|| non_numeric_operand(rhs))?;
            let result = match op {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Mul => a.wrapping_mul(b),
                Mod => {
                    if b == 0 {
                        return Err(crate::Error::Internal {
                            message: "modulo by zero".to_string(),
                        });
                    }
                    a.wrapping_rem(b)
                }
                Pow => (a as f64).powi(b as i32) as i64,
                Div => unreachable!(),
            };
            return Ok(Value::Long(result));
        }

        let a = self
            .as_double(lhs)
            .ok_or_else(|| non_numeric_operand(lhs))?;
        let b = self
            .as_double(rhs)
            .ok_or_else(|| non_numeric_operand(rhs))?;
        let result = match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Mod => a % b,
            Pow => a.powf(b),
            Div => unreachable!(),
        };
        Ok(Value::Double(result))
    }
}

fn non_numeric_operand(value: &Value) -> crate::Error {
    crate::Error::Internal {
        message: format!("expected a number, found {:?}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MathOp;

    #[test]
    fn boolean_coercion_matches_truthiness_table() {
        let vi = DefaultValueInterpreter::new();
        assert!(!vi.as_boolean(&Value::Null));
        assert!(!vi.as_boolean(&Value::Long(0)));
        assert!(vi.as_boolean(&Value::Long(1)));
        assert!(!vi.as_boolean(&Value::Str(String::new())));
        assert!(vi.as_boolean(&Value::Str("x".to_string())));
    }

    #[test]
    fn division_always_returns_double() {
        let vi = DefaultValueInterpreter::new();
        let result = vi
            .perform_math(MathOp::Div, &Value::Long(7), &Value::Long(2))
            .unwrap();
        assert_eq!(result, Value::Double(3.5));
    }

    #[test]
    fn integer_math_stays_integer() {
        let vi = DefaultValueInterpreter::new();
        let result = vi
            .perform_math(MathOp::Add, &Value::Long(2), &Value::Long(3))
            .unwrap();
        assert_eq!(result, Value::Long(5));
    }

    #[test]
    fn mixed_math_promotes_to_double() {
        let vi = DefaultValueInterpreter::new();
        let result = vi
            .perform_math(MathOp::Add, &Value::Long(2), &Value::Double(0.5))
            .unwrap();
        assert_eq!(result, Value::Double(2.5));
    }

    #[test]
    fn loose_equality_crosses_long_and_double() {
        let vi = DefaultValueInterpreter::new();
        assert!(vi.are_equal(&Value::Long(2), &Value::Double(2.0), false));
        assert!(!vi.are_equal(&Value::Long(2), &Value::Double(2.0), true));
    }
}
