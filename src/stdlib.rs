use crate::{
    diagnostics::{DiagnosticKind, Result, SourceSpan},
    environment::EnvironmentRef,
    runtime::{Interpreter, runtime_error},
    value::{NativeCallback, NativeFunction, Value, ValueKind},
};

/// Binds the native builtins into `env`, normally the global scope.
pub fn install(env: &EnvironmentRef) {
    let builtins: [(&'static str, usize, NativeCallback); 8] = [
        ("len", 1, collections_len),
        ("print", usize::MAX, io_print),
        ("str", 1, convert_str),
        ("type", 1, convert_type),
        ("keys", 1, collections_keys),
        ("push", 2, collections_push),
        ("map", 2, functional_map),
        ("filter", 2, functional_filter),
    ];
    let mut scope = env.borrow_mut();
    for (name, arity, callback) in builtins {
        scope.define(name, native(name, arity, callback));
    }
}

fn native(name: &'static str, arity: usize, callback: NativeCallback) -> Value {
    Value::new(ValueKind::NativeFunction(NativeFunction {
        name,
        arity,
        callback,
    }))
}

fn collections_len(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let length = match &*args[0].0 {
        ValueKind::String(text) => text.chars().count(),
        ValueKind::List(values) => values.len(),
        ValueKind::Map(map) => map.len(),
        _ => {
            return Err(runtime_error(
                DiagnosticKind::TypeMismatch,
                format!("`len` expects a String, List or Map, found {}", args[0].type_name()),
                span,
            ));
        }
    };
    Ok(Value::int(length as i64))
}

/// Writes its arguments separated by single spaces.
fn io_print(interpreter: &mut Interpreter, args: &[Value], _: SourceSpan) -> Result<Value> {
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    interpreter.write_line(&line)?;
    Ok(Value::nil())
}

fn convert_str(_: &mut Interpreter, args: &[Value], _: SourceSpan) -> Result<Value> {
    Ok(Value::string(args[0].to_string()))
}

fn convert_type(_: &mut Interpreter, args: &[Value], _: SourceSpan) -> Result<Value> {
    Ok(Value::string(args[0].type_name()))
}

fn collections_keys(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Map(map) => Ok(Value::list(map.keys().map(|key| key.to_value()).collect())),
        ValueKind::Instance(instance) => Ok(Value::list(
            instance
                .borrow()
                .fields
                .keys()
                .map(|name| Value::string(name.clone()))
                .collect(),
        )),
        _ => Err(runtime_error(
            DiagnosticKind::TypeMismatch,
            format!("`keys` expects a Map, found {}", args[0].type_name()),
            span,
        )),
    }
}

/// Lists are values, so `push` returns a new list with `item` appended.
fn collections_push(_: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let mut values = expect_list("push", &args[0], span)?.to_vec();
    values.push(args[1].clone());
    Ok(Value::list(values))
}

fn functional_map(interpreter: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = expect_list("map", &args[1], span)?;
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(interpreter.call_value(&args[0], vec![item.clone()], span)?);
    }
    Ok(Value::list(mapped))
}

fn functional_filter(interpreter: &mut Interpreter, args: &[Value], span: SourceSpan) -> Result<Value> {
    let items = expect_list("filter", &args[1], span)?;
    let mut kept = Vec::new();
    for item in items {
        if interpreter
            .call_value(&args[0], vec![item.clone()], span)?
            .is_truthy()
        {
            kept.push(item.clone());
        }
    }
    Ok(Value::list(kept))
}

fn expect_list<'a>(name: &str, value: &'a Value, span: SourceSpan) -> Result<&'a [Value]> {
    match &*value.0 {
        ValueKind::List(values) => Ok(values),
        _ => Err(runtime_error(
            DiagnosticKind::TypeMismatch,
            format!("`{name}` expects a List, found {}", value.type_name()),
            span,
        )),
    }
}
