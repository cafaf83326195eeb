//! The standard built-in function table.
//!
//! Grounded in `original_source/predef.c`'s `module_funcs` table (`len`,
//! `assert`, `id`, `open`, `close`) plus `builtin.c`'s `builtin_len`; `read`/
//! `write` are additions needed to make a `File` value usable for anything
//! beyond `close` (the original never exposed them as predef functions, but
//! `file.c`'s `Nfhob` handle is the same construct). `str`/`int`/`real`/
//! `type` cover the conversions §4.1's arithmetic promotion rules imply a
//! script needs but which the evaluator doesn't perform implicitly.

use std::{
    fs::OpenOptions,
    io::{Read, Write},
    rc::Rc,
};

use crate::{
    errors::{EvalResult, RunError},
    heap::Heap,
    namespace::Scope,
    value::{BuiltinDescriptor, Value},
};

fn expect_arity(name: &str, args: &[Value], want: usize) -> EvalResult<()> {
    if args.len() == want {
        Ok(())
    } else {
        Err(RunError::arity(None, name, want as i32, args.len()))
    }
}

fn builtin_len(_heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("len", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::new_int(s.0.chars().count() as i64)),
        Value::Array(a) => Ok(Value::new_int(a.items.borrow().len() as i64)),
        other => Err(RunError::type_error(None, "len", &[other.repr_type()])),
    }
}

fn builtin_assert(_heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("assert", args, 2)?;
    if args[0].value_eq(&args[1]) {
        Ok(Value::new_int(1))
    } else {
        Err(RunError::new(crate::errors::ErrorKind::TypeError, None, "assertion failed"))
    }
}

fn builtin_id(_heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("id", args, 1)?;
    let addr = match &args[0] {
        Value::Str(s) => Rc::as_ptr(s) as usize,
        Value::Array(a) => Rc::as_ptr(a) as usize,
        Value::File(f) => Rc::as_ptr(f) as usize,
        Value::Closure(c) => Rc::as_ptr(c) as usize,
        Value::Builtin(b) => Rc::as_ptr(b) as usize,
        _ => 0,
    };
    Ok(Value::new_int(addr as i64))
}

fn builtin_str(heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("str", args, 1)?;
    Ok(Value::new_str(heap, &args[0].display_text()))
}

fn builtin_type(heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("type", args, 1)?;
    Ok(Value::new_str(heap, args[0].repr_type()))
}

fn builtin_int(_heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("int", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::new_int(*n)),
        Value::Real(n) => Ok(Value::new_int(*n as i64)),
        Value::Char(c) => Ok(Value::new_int(i64::from(*c as u32))),
        Value::Str(s) => {
            s.0.trim().parse().map(Value::new_int).map_err(|_| RunError::type_error(None, "int", &["str"]))
        }
        other => Err(RunError::type_error(None, "int", &[other.repr_type()])),
    }
}

fn builtin_real(_heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("real", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::new_real(*n as f64)),
        Value::Real(n) => Ok(Value::new_real(*n)),
        Value::Str(s) => {
            s.0.trim().parse().map(Value::new_real).map_err(|_| RunError::type_error(None, "real", &["str"]))
        }
        other => Err(RunError::type_error(None, "real", &[other.repr_type()])),
    }
}

/// `open(path, mode)`. The original took the path positionally and the
/// mode via option characters at the call site (`open:w "f"`); since the
/// grammar this rewrite parses has no flag-call syntax, mode is a second
/// positional string (`"r"`, `"w"`, or `"a"`), defaulting to read.
fn builtin_open(heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("open", args, 2)?;
    let (Value::Str(path), Value::Str(mode)) = (&args[0], &args[1]) else {
        return Err(RunError::type_error(None, "open", &[args[0].repr_type(), args[1].repr_type()]));
    };
    let mut opts = OpenOptions::new();
    match mode.0.as_str() {
        "w" => opts.write(true).create(true).truncate(true),
        "a" => opts.append(true).create(true),
        _ => opts.read(true),
    };
    let file = opts.open(&path.0).map_err(|e| RunError::io(None, &path.0, e))?;
    Ok(Value::new_file(heap, &path.0, file))
}

fn builtin_close(_heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("close", args, 1)?;
    let Value::File(handle) = &args[0] else {
        return Err(RunError::type_error(None, "close", &[args[0].repr_type()]));
    };
    handle.file.borrow_mut().take();
    Ok(Value::new_int(1))
}

fn builtin_read(heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("read", args, 1)?;
    let Value::File(handle) = &args[0] else {
        return Err(RunError::type_error(None, "read", &[args[0].repr_type()]));
    };
    let mut guard = handle.file.borrow_mut();
    let file = guard.as_mut().ok_or_else(|| RunError::io(None, &handle.path, "file is closed"))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(|e| RunError::io(None, &handle.path, e))?;
    Ok(Value::new_str(heap, &contents))
}

fn builtin_write(_heap: &Heap, args: &[Value]) -> EvalResult<Value> {
    expect_arity("write", args, 2)?;
    let Value::File(handle) = &args[0] else {
        return Err(RunError::type_error(None, "write", &[args[0].repr_type()]));
    };
    let mut guard = handle.file.borrow_mut();
    let file = guard.as_mut().ok_or_else(|| RunError::io(None, &handle.path, "file is closed"))?;
    let text = args[1].display_text();
    file.write_all(text.as_bytes()).map_err(|e| RunError::io(None, &handle.path, e))?;
    Ok(Value::new_int(text.len() as i64))
}

const TABLE: &[(&str, i32, crate::value::BuiltinFn)] = &[
    ("len", 1, builtin_len),
    ("assert", 2, builtin_assert),
    ("id", 1, builtin_id),
    ("str", 1, builtin_str),
    ("type", 1, builtin_type),
    ("int", 1, builtin_int),
    ("real", 1, builtin_real),
    ("open", 2, builtin_open),
    ("close", 1, builtin_close),
    ("read", 1, builtin_read),
    ("write", 2, builtin_write),
];

/// Declares the standard built-in table into `scope` (§6
/// `register_builtins`). Each entry becomes an ordinary, const-bound
/// variable holding a [`Value::Builtin`], so user code shadowing e.g. `len`
/// in a nested scope works exactly like shadowing any other name.
pub fn register_builtins(scope: &Rc<Scope>) -> EvalResult<()> {
    for (name, arity, func) in TABLE {
        let descriptor = Rc::new(BuiltinDescriptor { name, arity: *arity, func: *func });
        scope.declare(name, Value::new_builtin(descriptor), true)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Scope;

    #[test]
    fn len_counts_codepoints_not_bytes() {
        let heap = Heap::default();
        let result = builtin_len(&heap, &[Value::new_str(&heap, "héllo")]).unwrap();
        assert!(matches!(result, Value::Int(5)));
    }

    #[test]
    fn len_rejects_non_sized_values() {
        let heap = Heap::default();
        let err = builtin_len(&heap, &[Value::new_int(1)]).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::TypeError);
    }

    #[test]
    fn assert_fails_on_mismatch() {
        let heap = Heap::default();
        assert!(builtin_assert(&heap, &[Value::new_int(1), Value::new_int(1)]).is_ok());
        assert!(builtin_assert(&heap, &[Value::new_int(1), Value::new_int(2)]).is_err());
    }

    #[test]
    fn int_parses_trimmed_string() {
        let heap = Heap::default();
        let result = builtin_int(&heap, &[Value::new_str(&heap, "  42 ")]).unwrap();
        assert!(matches!(result, Value::Int(42)));
    }

    #[test]
    fn register_builtins_binds_const_names() {
        let scope = Scope::root();
        register_builtins(&scope).unwrap();
        let len_var = scope.lookup("len").unwrap();
        assert!(len_var.is_const);
        assert!(scope.declare("len", Value::new_int(1), false).is_err());
    }

    #[test]
    fn wrong_arity_is_an_arity_error() {
        let heap = Heap::default();
        let err = builtin_len(&heap, &[]).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::ArityError);
    }
}
