//! Black-box tests exercising the public `tokenize` / `parse` / `evaluate_expression` API the way
//! a host application embedding this language would: whole source strings in, a [Value] or an
//! [Error] out. Internal unit tests for tokenizer/parser/interpreter mechanics live inline in
//! their own modules under `src/`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use embed_expr::callable::{missing_argument, Callable, CallContext, FunctionInvocationError, NativeFunction};
use embed_expr::environment::StandardFunctionRegistry;
use embed_expr::value::{DefaultValueInterpreter, ObjectView, Value};
use embed_expr::{evaluate_expression, parse, tokenize, EvaluationEnvironment, Error, TokenType};

fn env() -> EvaluationEnvironment {
    EvaluationEnvironment::new(
        Arc::new(DefaultValueInterpreter::new()),
        Arc::new(StandardFunctionRegistry::new()),
    )
}

fn eval(source: &str, env: &EvaluationEnvironment) -> Result<Value, Error> {
    let program = parse(source)?;
    evaluate_expression(&program, env)
}

#[test]
fn scenario_tokenize_arithmetic() {
    let tokens = tokenize("1 + 2 * 3").unwrap();
    let kinds: Vec<TokenType> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenType::Long,
            TokenType::Plus,
            TokenType::Long,
            TokenType::Star,
            TokenType::Long,
        ]
    );
    assert_eq!(eval("1 + 2 * 3", &env()).unwrap(), Value::Long(7));
}

#[test]
fn scenario_if_then_else() {
    let value = eval(r#"if 1 < 2 then "y" else "n""#, &env()).unwrap();
    assert_eq!(value, Value::Str("y".to_string()));
}

#[test]
fn scenario_named_and_positional_arguments() {
    let f_env = env().with_function(
        "f",
        Arc::new(NativeFunction::new("f", Some(vec!["x", "y", "z"]), |args| {
            Ok(Value::List(Arc::new(args.to_vec())))
        })),
    );
    let value = eval("f(1, y = 2, z = 3)", &f_env).unwrap();
    assert_eq!(
        value,
        Value::List(Arc::new(vec![Value::Long(1), Value::Long(2), Value::Long(3)]))
    );

    let err = eval("f(a = 1, 2)", &f_env).unwrap_err();
    assert!(matches!(err, Error::NonNamedFunctionArgument { .. }));
}

#[test]
fn scenario_sequential_assignment_and_reassignment_error() {
    assert_eq!(eval("a = 10\na + 5", &env()).unwrap(), Value::Long(15));
    let err = eval("a = 1\na = 2", &env()).unwrap_err();
    assert!(matches!(err, Error::IdentifierInUse { .. }));
}

#[test]
fn scenario_callback_iife() {
    assert_eq!(
        eval("((x, y) -> x + y)(3, 4)", &env()).unwrap(),
        Value::Long(7)
    );
}

#[test]
fn scenario_optional_chaining_on_null() {
    assert_eq!(eval("null?.foo?.bar", &env()).unwrap(), Value::Null);
    assert_eq!(eval("null?[0]", &env()).unwrap(), Value::Null);
}

#[test]
fn scenario_unterminated_string() {
    let err = tokenize("\"unterminated").unwrap_err();
    assert!(matches!(err, Error::UnterminatedString { .. }));
}

#[test]
fn scenario_precedence_and_exponent_associativity() {
    assert_eq!(eval("1 + 2 * 3", &env()).unwrap(), Value::Long(7));
    assert_eq!(eval("2 ^ 3 ^ 2", &env()).unwrap(), Value::Long(64));
}

#[test]
fn case_insensitive_resolution_agrees_across_case() {
    let e = env().with_static("A", Value::Long(42));
    assert_eq!(eval("A", &e).unwrap(), Value::Long(42));
    assert_eq!(eval("a", &e).unwrap(), Value::Long(42));
}

#[test]
fn null_coalesce_short_circuits_rhs() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    let e = env().with_function(
        "boom",
        Arc::new(NativeFunction::new("boom", Some(vec![]), move |_| {
            calls_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Value::Long(5))
        })),
    );
    let value = eval("5 ?? boom()", &e).unwrap();
    assert_eq!(value, Value::Long(5));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);

    let value = eval("null ?? boom()", &e).unwrap();
    assert_eq!(value, Value::Long(5));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn argument_evaluation_order_is_left_to_right() {
    let counter = Arc::new(AtomicI64::new(0));
    let counter_clone = Arc::clone(&counter);
    let e = env().with_function(
        "next",
        Arc::new(NativeFunction::new("next", Some(vec![]), move |_| {
            let value = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Value::Long(value))
        })),
    );
    let e = e.with_function(
        "pair",
        Arc::new(NativeFunction::new("pair", Some(vec!["a", "b"]), |args| {
            Ok(Value::List(Arc::new(args.to_vec())))
        })),
    );
    let value = eval("pair(next(), next())", &e).unwrap();
    assert_eq!(
        value,
        Value::List(Arc::new(vec![Value::Long(1), Value::Long(2)]))
    );
}

#[test]
fn boolean_operators_are_not_short_circuiting() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    let e = env().with_function(
        "mark",
        Arc::new(NativeFunction::new("mark", Some(vec![]), move |_| {
            calls_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Value::Bool(true))
        })),
    );
    let value = eval("false && mark()", &e).unwrap();
    assert_eq!(value, Value::Bool(false));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let value = eval("true || mark()", &e).unwrap();
    assert_eq!(value, Value::Bool(true));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[test]
fn string_concatenation_uses_dedicated_operator_not_plus() {
    assert_eq!(
        eval(r#""a" & "b""#, &env()).unwrap(),
        Value::Str("ab".to_string())
    );
    // `+` stays arithmetic: adding two strings is not a valid numeric operand.
    assert!(eval(r#""a" + "b""#, &env()).is_err());
}

#[test]
fn list_indexing_bounds_check() {
    let e = env().with_function(
        "range3",
        Arc::new(NativeFunction::new("range3", Some(vec![]), |_| {
            Ok(Value::List(Arc::new(vec![
                Value::Long(10),
                Value::Long(20),
                Value::Long(30),
            ])))
        })),
    );
    assert_eq!(eval("range3()[1]", &e).unwrap(), Value::Long(20));
    let err = eval("range3()[99]", &e).unwrap_err();
    assert!(matches!(err, Error::InvalidIndex { .. }));
    assert_eq!(eval("range3()?[99]", &e).unwrap(), Value::Null);
}

#[test]
fn map_member_and_index_access() {
    let mut map = HashMap::new();
    map.insert("name".to_string(), Value::Str("ok".to_string()));
    let e = env().with_static("config", Value::Map(Arc::new(map)));
    assert_eq!(eval("config.name", &e).unwrap(), Value::Str("ok".to_string()));
    assert_eq!(eval("config[\"name\"]", &e).unwrap(), Value::Str("ok".to_string()));
    let err = eval("config.missing", &e).unwrap_err();
    assert!(matches!(err, Error::UnknownMember { .. }));
    assert_eq!(eval("config?.missing", &e).unwrap(), Value::Null);
}

#[derive(Debug)]
struct Point {
    x: i64,
    y: i64,
}

impl ObjectView for Point {
    fn get_member(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(Value::Long(self.x)),
            "y" => Some(Value::Long(self.y)),
            _ => None,
        }
    }

    fn get_index(&self, _index: &Value) -> Option<Value> {
        None
    }
}

#[test]
fn object_view_exposes_host_fields() {
    let e = env().with_static("p", Value::Object(Arc::new(Point { x: 3, y: 4 })));
    assert_eq!(eval("p.x + p.y", &e).unwrap(), Value::Long(7));
}

#[derive(Debug)]
struct Doubler;

impl Callable for Doubler {
    fn name(&self) -> &str {
        "double"
    }

    fn arg_names(&self) -> Option<&[String]> {
        None
    }

    fn apply(&self, _ctx: &mut CallContext, args: &[Value]) -> Result<Value, FunctionInvocationError> {
        match args.first() {
            Some(Value::Long(l)) => Ok(Value::Long(l * 2)),
            Some(other) => Err(missing_argument("double", &format!("{:?}", other))),
            None => Err(missing_argument("double", "value")),
        }
    }
}

#[test]
fn variadic_callable_rejects_named_arguments() {
    let e = env().with_function("double", Arc::new(Doubler));
    assert_eq!(eval("double(21)", &e).unwrap(), Value::Long(42));
    let err = eval("double(value = 21)", &e).unwrap_err();
    assert!(matches!(err, Error::UndefinedFunctionArgumentName { .. }));
}

#[test]
fn undefined_function_optional_call_returns_null() {
    assert_eq!(eval("nonexistent?()", &env()).unwrap(), Value::Null);
    let err = eval("nonexistent()", &env()).unwrap_err();
    assert!(matches!(err, Error::UndefinedFunction { .. }));
}

#[test]
fn program_pretty_print_round_trips_to_equivalent_ast() {
    let original = parse("1 + 2 * 3").unwrap();
    let rendered = original.expressionify();
    let reparsed = parse(&rendered).unwrap();
    let env = env();
    assert_eq!(
        evaluate_expression(&original, &env).unwrap(),
        evaluate_expression(&reparsed, &env).unwrap()
    );
}

#[test]
fn standard_registry_worked_examples() {
    let e = env();
    assert_eq!(eval(r#"len("hello")"#, &e).unwrap(), Value::Long(5));
    assert_eq!(eval("abs(-4)", &e).unwrap(), Value::Long(4));
    assert_eq!(
        eval(r#"contains("hello world", "world")"#, &e).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(eval("len(range(0, 3))", &e).unwrap(), Value::Long(3));
}
