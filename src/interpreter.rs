//! Tree-walking evaluation of a parsed [AExpression] against a caller-supplied
//! [IEvaluationEnvironment]. Every coercion, comparison and arithmetic decision is delegated to
//! that environment's [ValueInterpreter] rather than hard-coded against [Value] here.

use std::sync::Arc;

use crate::ast::{CallArgument, ComparisonOp, EqualityOp, IdentifierExpression, LiteralValue, MathOp};
use crate::callable::{Callable, CallContext};
use crate::environment::{IEvaluationEnvironment, InterpretationEnvironment};
use crate::value::{ObjectView, Value, ValueInterpreter};
use crate::{AExpression, Error, Position, Result};

/// Evaluate `expr` against `env`, starting from a fresh [InterpretationEnvironment]. Every `=`
/// assignment made while evaluating `expr` (including inside nested callback invocations) lives
/// only for the duration of this call.
pub fn evaluate_expression(expr: &AExpression, env: &dyn IEvaluationEnvironment) -> Result<Value> {
    let mut interpretation = InterpretationEnvironment::new();
    evaluate_internal(expr, env, &mut interpretation)
}

pub(crate) fn evaluate_internal(
    expr: &AExpression,
    env: &dyn IEvaluationEnvironment,
    interp: &mut InterpretationEnvironment,
) -> Result<Value> {
    match expr {
        AExpression::Program { lines, .. } => {
            let mut result = Value::Null;
            for line in lines {
                result = evaluate_internal(line, env, interp)?;
            }
            Ok(result)
        }
        AExpression::Long { value, .. } => Ok(Value::Long(*value)),
        AExpression::Double { value, .. } => Ok(Value::Double(*value)),
        AExpression::Str { value, .. } => Ok(Value::Str(value.clone())),
        AExpression::Literal { value, .. } => Ok(match value {
            LiteralValue::True => Value::Bool(true),
            LiteralValue::False => Value::Bool(false),
            LiteralValue::Null => Value::Null,
        }),
        AExpression::Identifier(id) => resolve_variable(id, env, interp),
        AExpression::Math { op, lhs, rhs, .. } => {
            let l = evaluate_internal(lhs, env, interp)?;
            let r = evaluate_internal(rhs, env, interp)?;
            env.value_interpreter().perform_math(*op, &l, &r)
        }
        AExpression::Comparison { op, lhs, rhs, span } => {
            let l = evaluate_internal(lhs, env, interp)?;
            let r = evaluate_internal(rhs, env, interp)?;
            let ordering = env.value_interpreter().compare(&l, &r).ok_or_else(|| Error::Internal {
                message: format!("values at {} cannot be compared", span.head_position()),
            })?;
            let result = match op {
                ComparisonOp::Lt => ordering == std::cmp::Ordering::Less,
                ComparisonOp::Le => ordering != std::cmp::Ordering::Greater,
                ComparisonOp::Gt => ordering == std::cmp::Ordering::Greater,
                ComparisonOp::Ge => ordering != std::cmp::Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        AExpression::Equality { op, lhs, rhs, .. } => {
            let l = evaluate_internal(lhs, env, interp)?;
            let r = evaluate_internal(rhs, env, interp)?;
            let exact = matches!(op, EqualityOp::EqExact | EqualityOp::NeExact);
            let equal = env.value_interpreter().are_equal(&l, &r, exact);
            let result = match op {
                EqualityOp::Eq | EqualityOp::EqExact => equal,
                EqualityOp::Ne | EqualityOp::NeExact => !equal,
            };
            Ok(Value::Bool(result))
        }
        // Not short-circuiting: both sides are always evaluated, matching the embedded source's
        // behavior rather than a conventional language's (SPEC_FULL.md §5 ADR 1).
        AExpression::Conjunction { lhs, rhs, .. } => {
            let l = evaluate_internal(lhs, env, interp)?;
            let r = evaluate_internal(rhs, env, interp)?;
            let vi = env.value_interpreter();
            Ok(Value::Bool(vi.as_boolean(&l) && vi.as_boolean(&r)))
        }
        AExpression::Disjunction { lhs, rhs, .. } => {
            let l = evaluate_internal(lhs, env, interp)?;
            let r = evaluate_internal(rhs, env, interp)?;
            let vi = env.value_interpreter();
            Ok(Value::Bool(vi.as_boolean(&l) || vi.as_boolean(&r)))
        }
        AExpression::Concatenation { lhs, rhs, .. } => {
            let l = evaluate_internal(lhs, env, interp)?;
            let r = evaluate_internal(rhs, env, interp)?;
            let vi = env.value_interpreter();
            Ok(Value::Str(format!("{}{}", vi.as_string(&l), vi.as_string(&r))))
        }
        AExpression::NullCoalesce { lhs, rhs, .. } => {
            let l = evaluate_internal(lhs, env, interp)?;
            if env.value_interpreter().is_null(&l) {
                evaluate_internal(rhs, env, interp)
            } else {
                Ok(l)
            }
        }
        AExpression::Assignment { name, value, .. } => {
            let key = name.lowercased();
            if identifier_in_use(&key, env, interp) {
                return Err(Error::IdentifierInUse {
                    symbol: name.symbol.clone(),
                    position: name.span.head_position(),
                });
            }
            let evaluated = evaluate_internal(value, env, interp)?;
            match &evaluated {
                Value::Callable(callable) => interp.set_function(key, Arc::clone(callable)),
                _ => interp.set(key, evaluated.clone()),
            }
            Ok(evaluated)
        }
        AExpression::MemberAccess {
            optional,
            object,
            member,
            span,
        } => {
            let obj_val = evaluate_internal(object, env, interp)?;
            let member_name = match member.as_ref() {
                AExpression::Identifier(id) => id.symbol.clone(),
                other => env.value_interpreter().as_string(&evaluate_internal(other, env, interp)?),
            };
            if env.value_interpreter().is_null(&obj_val) {
                return optional_null_or_error(*optional, span.head_position());
            }
            let found = match &obj_val {
                Value::Map(map) => map.get(&member_name).cloned(),
                Value::Object(obj) => obj.get_member(&member_name),
                _ => None,
            };
            match found {
                Some(value) => Ok(value),
                None if *optional => Ok(Value::Null),
                None => Err(Error::UnknownMember {
                    symbol: member_name,
                    position: span.head_position(),
                }),
            }
        }
        AExpression::Index {
            optional,
            object,
            index,
            span,
        } => {
            let obj_val = evaluate_internal(object, env, interp)?;
            let idx_val = evaluate_internal(index, env, interp)?;
            if env.value_interpreter().is_null(&obj_val) {
                return optional_null_or_error(*optional, span.head_position());
            }
            evaluate_index(&obj_val, &idx_val, *optional, env.value_interpreter(), span.head_position())
        }
        AExpression::Invert { operand, .. } => {
            let v = evaluate_internal(operand, env, interp)?;
            Ok(Value::Bool(!env.value_interpreter().as_boolean(&v)))
        }
        AExpression::FlipSign { operand, span } => {
            let v = evaluate_internal(operand, env, interp)?;
            match v {
                Value::Long(l) => Ok(Value::Long(l.wrapping_neg())),
                Value::Double(d) => Ok(Value::Double(-d)),
                other => {
                    let vi = env.value_interpreter();
                    if vi.has_decimal_point(&other) {
                        vi.as_double(&other).map(|d| Value::Double(-d))
                    } else {
                        vi.as_long(&other).map(|l| Value::Long(l.wrapping_neg()))
                    }
                    .ok_or_else(|| Error::Internal {
                        message: format!("cannot negate a non-numeric value at {}", span.head_position()),
                    })
                }
            }
        }
        AExpression::Invocation {
            optional,
            name,
            args,
            span,
        } => {
            let callable = resolve_function(name, env, interp);
            match callable {
                Some(callable) => {
                    invoke(callable.as_ref(), args, env, interp, &name.symbol, span.head_position())
                }
                None if *optional => Ok(Value::Null),
                None => Err(Error::UndefinedFunction {
                    symbol: name.symbol.clone(),
                    position: span.head_position(),
                }),
            }
        }
        AExpression::Call {
            optional,
            callee,
            args,
            span,
        } => {
            let callee_val = evaluate_internal(callee, env, interp)?;
            match callee_val {
                Value::Callable(callable) => {
                    invoke(callable.as_ref(), args, env, interp, "<expression>", span.head_position())
                }
                other if env.value_interpreter().is_null(&other) && *optional => Ok(Value::Null),
                _ => Err(Error::Internal {
                    message: format!("value at {} is not callable", span.head_position()),
                }),
            }
        }
        AExpression::Callback { signature, body, .. } => {
            let callback = crate::callable::CallbackFunction {
                signature: signature.iter().map(|p| p.symbol.clone()).collect(),
                body: Arc::clone(body),
                captured_statics: env.snapshot_static_variables(),
            };
            Ok(Value::Callable(Arc::new(callback)))
        }
        AExpression::IfThenElse {
            condition,
            positive,
            negative,
            ..
        } => {
            let cond = evaluate_internal(condition, env, interp)?;
            if env.value_interpreter().as_boolean(&cond) {
                evaluate_internal(positive, env, interp)
            } else {
                evaluate_internal(negative, env, interp)
            }
        }
    }
}

fn resolve_variable(
    id: &IdentifierExpression,
    env: &dyn IEvaluationEnvironment,
    interp: &InterpretationEnvironment,
) -> Result<Value> {
    let key = id.lowercased();
    env.lookup_static_variable(&key)
        .or_else(|| env.lookup_live_variable(&key))
        .or_else(|| interp.get(&key))
        .ok_or_else(|| Error::UndefinedVariable {
            symbol: id.symbol.clone(),
            position: id.span.head_position(),
        })
}

fn resolve_function(
    name: &IdentifierExpression,
    env: &dyn IEvaluationEnvironment,
    interp: &InterpretationEnvironment,
) -> Option<Arc<dyn Callable>> {
    let key = name.lowercased();
    env.standard_registry()
        .lookup(&key)
        .or_else(|| env.lookup_function(&key))
        .or_else(|| interp.get_function(&key))
}

fn identifier_in_use(key: &str, env: &dyn IEvaluationEnvironment, interp: &InterpretationEnvironment) -> bool {
    env.lookup_static_variable(key).is_some()
        || env.lookup_live_variable(key).is_some()
        || env.lookup_function(key).is_some()
        || env.standard_registry().lookup(key).is_some()
        || interp.contains_variable(key)
        || interp.contains_function(key)
}

fn optional_null_or_error(optional: bool, position: Position) -> Result<Value> {
    if optional {
        Ok(Value::Null)
    } else {
        Err(Error::NonIndexableValue { position })
    }
}

fn evaluate_index(
    object: &Value,
    index: &Value,
    optional: bool,
    vi: &Arc<dyn ValueInterpreter>,
    position: Position,
) -> Result<Value> {
    match object {
        Value::List(items) => {
            let i = vi.as_long(index).ok_or_else(|| Error::InvalidIndex {
                message: "list index must be a number".to_string(),
                position,
            })?;
            if i < 0 || i as usize >= items.len() {
                return if optional {
                    Ok(Value::Null)
                } else {
                    Err(Error::InvalidIndex {
                        message: "index out of bounds".to_string(),
                        position,
                    })
                };
            }
            Ok(items[i as usize].clone())
        }
        Value::Str(s) => {
            let i = vi.as_long(index).ok_or_else(|| Error::InvalidIndex {
                message: "string index must be a number".to_string(),
                position,
            })?;
            let chars: Vec<char> = s.chars().collect();
            if i < 0 || i as usize >= chars.len() {
                return if optional {
                    Ok(Value::Null)
                } else {
                    Err(Error::InvalidIndex {
                        message: "index out of bounds".to_string(),
                        position,
                    })
                };
            }
            Ok(Value::Str(chars[i as usize].to_string()))
        }
        Value::Map(map) => {
            let key = vi.as_string(index);
            match map.get(&key) {
                Some(value) => Ok(value.clone()),
                None if optional => Ok(Value::Null),
                None => Err(Error::InvalidMapKey { key, position }),
            }
        }
        Value::Object(obj) => match obj.get_index(index) {
            Some(value) => Ok(value),
            None if optional => Ok(Value::Null),
            None => Err(Error::InvalidIndex {
                message: "no value at that index".to_string(),
                position,
            }),
        },
        _ => {
            if optional {
                Ok(Value::Null)
            } else {
                Err(Error::NonIndexableValue { position })
            }
        }
    }
}

/// Evaluate each [CallArgument] and bind it against `callable`'s declared signature (named
/// arguments resolved case-insensitively against [Callable::arg_names], positional arguments
/// filling remaining slots in order), then invoke it. A `None` signature marks a variadic callee
/// that rejects named arguments outright.
fn invoke(
    callable: &dyn Callable,
    args: &[CallArgument],
    env: &dyn IEvaluationEnvironment,
    interp: &mut InterpretationEnvironment,
    label: &str,
    position: Position,
) -> Result<Value> {
    let bound = bind_arguments(callable, args, env, interp, label, position)?;
    let mut ctx = CallContext {
        env,
        interpretation: interp,
    };
    callable.apply(&mut ctx, &bound).map_err(|err| {
        let argument_index = err
            .argument
            .as_deref()
            .and_then(|wanted| {
                callable
                    .arg_names()
                    .and_then(|names| names.iter().position(|n| n.eq_ignore_ascii_case(wanted)))
            })
            .unwrap_or(0);
        Error::InvalidFunctionInvocation {
            function: label.to_string(),
            argument_index,
            message: err.message,
            position,
        }
    })
}

fn bind_arguments(
    callable: &dyn Callable,
    args: &[CallArgument],
    env: &dyn IEvaluationEnvironment,
    interp: &mut InterpretationEnvironment,
    label: &str,
    position: Position,
) -> Result<Vec<Value>> {
    match callable.arg_names() {
        Some(names) => {
            let mut slots: Vec<Option<Value>> = vec![None; names.len()];
            let mut positional_index = 0usize;
            for arg in args {
                let value = evaluate_internal(&arg.value, env, interp)?;
                match &arg.name {
                    Some(id) => {
                        let key = id.lowercased();
                        let idx = names
                            .iter()
                            .position(|n| n.eq_ignore_ascii_case(&key))
                            .ok_or_else(|| Error::UndefinedFunctionArgumentName {
                                function: label.to_string(),
                                argument: id.symbol.clone(),
                                position: id.span.head_position(),
                            })?;
                        slots[idx] = Some(value);
                    }
                    None => {
                        if positional_index >= names.len() {
                            return Err(Error::InvalidFunctionInvocation {
                                function: label.to_string(),
                                argument_index: positional_index,
                                message: "too many positional arguments".to_string(),
                                position,
                            });
                        }
                        slots[positional_index] = Some(value);
                        positional_index += 1;
                    }
                }
            }
            Ok(slots.into_iter().map(|s| s.unwrap_or(Value::Null)).collect())
        }
        None => {
            let mut bound = Vec::with_capacity(args.len());
            for arg in args {
                if let Some(id) = &arg.name {
                    return Err(Error::UndefinedFunctionArgumentName {
                        function: label.to_string(),
                        argument: id.symbol.clone(),
                        position: id.span.head_position(),
                    });
                }
                bound.push(evaluate_internal(&arg.value, env, interp)?);
            }
            Ok(bound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{EvaluationEnvironment, StandardFunctionRegistry};
    use crate::value::DefaultValueInterpreter;

    fn env() -> EvaluationEnvironment {
        EvaluationEnvironment::new(
            Arc::new(DefaultValueInterpreter::new()),
            Arc::new(StandardFunctionRegistry::new()),
        )
    }

    fn eval(source: &str, env: &EvaluationEnvironment) -> Result<Value> {
        let ast = crate::parse(source)?;
        evaluate_expression(&ast, env)
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3", &env()).unwrap(), Value::Long(7));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval(r#""a" & "b""#, &env()).unwrap(), Value::Str("ab".to_string()));
    }

    #[test]
    fn sequential_assignment_and_reuse() {
        assert_eq!(eval("a = 10\na + 5", &env()).unwrap(), Value::Long(15));
    }

    #[test]
    fn reassigning_identifier_errors() {
        let err = eval("a = 1\na = 2", &env()).unwrap_err();
        assert!(matches!(err, Error::IdentifierInUse { .. }));
    }

    #[test]
    fn boolean_operators_are_not_short_circuiting() {
        let e = env().with_function(
            "boom",
            Arc::new(crate::callable::NativeFunction::new("boom", Some(vec![]), |_| {
                Err(crate::callable::missing_argument("boom", "x"))
            })),
        );
        let err = eval("false && boom()", &e).unwrap_err();
        assert!(matches!(err, Error::InvalidFunctionInvocation { .. }));
    }

    #[test]
    fn named_and_positional_arguments_bind_by_signature() {
        let e = env();
        let value = eval("contains(haystack = \"hello\", needle = \"ell\")", &e).unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn optional_chaining_short_circuits_on_null() {
        assert_eq!(eval("null?.foo?.bar", &env()).unwrap(), Value::Null);
    }

    #[test]
    fn member_access_on_null_without_optional_errors() {
        let err = eval("null.foo", &env()).unwrap_err();
        assert!(matches!(err, Error::NonIndexableValue { .. }));
    }

    #[test]
    fn callback_iife_invokes_immediately() {
        assert_eq!(eval("((x, y) -> x + y)(3, 4)", &env()).unwrap(), Value::Long(7));
    }

    #[test]
    fn case_insensitive_identifier_resolution() {
        let e = env().with_static("Name", Value::Str("ok".to_string()));
        assert_eq!(eval("name", &e).unwrap(), Value::Str("ok".to_string()));
        assert_eq!(eval("NAME", &e).unwrap(), Value::Str("ok".to_string()));
    }

    #[test]
    fn if_then_else_only_evaluates_taken_branch() {
        let e = env().with_function(
            "boom",
            Arc::new(crate::callable::NativeFunction::new("boom", Some(vec![]), |_| {
                Err(crate::callable::missing_argument("boom", "x"))
            })),
        );
        let value = eval("if true then 1 else boom()", &e).unwrap();
        assert_eq!(value, Value::Long(1));
    }
}
