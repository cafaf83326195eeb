//! Runtime values.
//!
//! One variant per entry in the value taxonomy, plus the two additions this
//! rewrite needs to make "evaluate callee to a function value" (§4.4)
//! expressible at all: `Closure` (a user `fun` together with the scope it
//! closed over) and `Builtin` (a native function registered by
//! [`crate::builtins::register_builtins`]). The original interpreter got
//! away with a single `NmFunction` tag because C functions and script
//! closures both lived behind one function pointer; Rust's enums make that
//! union explicit instead of tagging a `void *`.

use std::{cell::RefCell, fmt, fs::File, rc::Rc};

use crate::{
    ast::Node,
    errors::{EvalResult, RunError},
    heap::Heap,
    namespace::Scope,
};

/// Backing storage for [`Value::Str`]. Strings are immutable once built:
/// every operation that "changes" a string produces a fresh one.
#[derive(Debug)]
pub struct StrData(pub String);

/// Backing storage for [`Value::Array`]. Elements are mutable through
/// builtins (e.g. a hypothetical `push`) even though the language surface
/// only exposes read access via the `.` operator (§3 lvalues are names
/// only).
#[derive(Debug)]
pub struct ArrayData {
    pub items: RefCell<Vec<Value>>,
}

/// Backing storage for [`Value::File`]. `file` is `None` once `close` has
/// run; further reads/writes are an `IoError`, not a panic.
#[derive(Debug)]
pub struct FileHandle {
    pub path: String,
    pub file: RefCell<Option<File>>,
}

/// A `fun PARAM { ... }` literal, paired with the scope it closed over.
#[derive(Debug)]
pub struct Closure {
    pub param: String,
    pub body: Node,
    pub scope: Rc<Scope>,
}

/// A native function registered by [`crate::builtins::register_builtins`].
pub type BuiltinFn = fn(&Heap, &[Value]) -> EvalResult<Value>;

/// One entry of the built-in descriptor table (§6): a name, an arity (`-1`
/// variadic, otherwise exact), and the function pointer itself. Positional
/// typemasks and option characters are enforced by the wrapping `func`
/// rather than carried here, since Rust's type system already rejects most
/// of what the original's typemask bitset was defending against.
pub struct BuiltinDescriptor {
    pub name: &'static str,
    pub arity: i32,
    pub func: BuiltinFn,
}

impl fmt::Debug for BuiltinDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinDescriptor").field("name", &self.name).field("arity", &self.arity).finish()
    }
}

/// A builtin mid-application. Every call (curried, one argument at a
/// time, per §4.4) appends to `args`; once `args.len()` reaches the
/// descriptor's arity the call fires. Needed because a builtin is just
/// another callable [`Value`] and calls are always single-argument.
#[derive(Debug)]
pub struct BuiltinCall {
    pub descriptor: Rc<BuiltinDescriptor>,
    pub args: Vec<Value>,
}

/// The outcome of [`Value::apply`]: either a finished value (a builtin that
/// fired, or one still accumulating arguments) or a closure body that still
/// needs to run in a fresh child scope — left to the evaluator, which is
/// the only thing that knows how to walk a [`Node`].
pub enum ApplyResult {
    Value(Value),
    Enter(Rc<Closure>, Value),
}

/// A runtime value. `Null`/`Int`/`Real`/`Char` are copied by value; the rest
/// are `Rc`-shared handles into a [`Heap`]'s arenas.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Char(char),
    Str(Rc<StrData>),
    Array(Rc<ArrayData>),
    File(Rc<FileHandle>),
    Closure(Rc<Closure>),
    Builtin(Rc<BuiltinCall>),
}

impl Value {
    #[must_use]
    pub fn new_null() -> Self {
        Self::Null
    }

    #[must_use]
    pub fn new_int(n: i64) -> Self {
        Self::Int(n)
    }

    #[must_use]
    pub fn new_real(n: f64) -> Self {
        Self::Real(n)
    }

    #[must_use]
    pub fn new_char(c: char) -> Self {
        Self::Char(c)
    }

    /// Builds a string value and registers its backing storage on `heap`.
    #[must_use]
    pub fn new_str(heap: &Heap, s: &str) -> Self {
        let data = Rc::new(StrData(s.to_owned()));
        heap.register_str(Rc::clone(&data));
        Self::Str(data)
    }

    /// Builds a `nmemb`-element array, every slot initialized to `Null`, and
    /// registers its backing storage on `heap`.
    #[must_use]
    pub fn new_array(heap: &Heap, nmemb: usize) -> Self {
        let data = Rc::new(ArrayData { items: RefCell::new(vec![Self::Null; nmemb]) });
        heap.register_array(Rc::clone(&data));
        Self::Array(data)
    }

    #[must_use]
    pub fn new_file(heap: &Heap, path: &str, file: File) -> Self {
        let data = Rc::new(FileHandle { path: path.to_owned(), file: RefCell::new(Some(file)) });
        heap.register_file(Rc::clone(&data));
        Self::File(data)
    }

    #[must_use]
    pub fn new_closure(param: impl Into<String>, body: Node, scope: Rc<Scope>) -> Self {
        Self::Closure(Rc::new(Closure { param: param.into(), body, scope }))
    }

    #[must_use]
    pub fn new_builtin(descriptor: Rc<BuiltinDescriptor>) -> Self {
        Self::Builtin(Rc::new(BuiltinCall { descriptor, args: Vec::new() }))
    }

    /// Applies one more argument to a callable value (§4.4 Call). A
    /// closure's single parameter is always satisfied immediately; a
    /// builtin accumulates arguments until its declared arity is met, at
    /// which point it fires and returns its result.
    pub fn apply(&self, heap: &Heap, arg: Self) -> EvalResult<ApplyResult> {
        match self {
            Self::Closure(c) => Ok(ApplyResult::Enter(Rc::clone(c), arg)),
            Self::Builtin(call) => {
                let mut args = call.args.clone();
                args.push(arg);
                if args.len() as i32 >= call.descriptor.arity.max(1) {
                    (call.descriptor.func)(heap, &args).map(ApplyResult::Value)
                } else {
                    Ok(ApplyResult::Value(Self::Builtin(Rc::new(BuiltinCall { descriptor: Rc::clone(&call.descriptor), args }))))
                }
            }
            _ => Err(RunError::type_error(None, "call", &[self.repr_type()])),
        }
    }

    /// The lowercase type name used in error messages and by `type()`.
    #[must_use]
    pub fn repr_type(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Char(_) => "char",
            Self::Str(_) => "str",
            Self::Array(_) => "array",
            Self::File(_) => "file",
            Self::Closure(_) | Self::Builtin(_) => "function",
        }
    }

    /// Truthiness, per §4.1: every type has a sensible boolish reading, so
    /// this function is total and never fails.
    #[must_use]
    pub fn boolish(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Int(n) => *n != 0,
            Self::Real(n) => *n != 0.0,
            Self::Char(c) => *c != '\0',
            Self::Str(s) => !s.0.is_empty(),
            Self::Array(a) => !a.items.borrow().is_empty(),
            Self::File(f) => f.file.borrow().is_some(),
            Self::Closure(_) | Self::Builtin(_) => true,
        }
    }

    /// The human-readable text `print`/string-concatenation use. Reals are
    /// rendered `%.2f`-style (§4.1), matching the original's `printf`-based
    /// formatter.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Int(n) => n.to_string(),
            Self::Real(n) => format!("{n:.2}"),
            Self::Char(c) => c.to_string(),
            Self::Str(s) => s.0.clone(),
            Self::Array(a) => {
                let items = a.items.borrow();
                let inner: Vec<String> = items.iter().map(Self::display_text).collect();
                format!("({})", inner.join(", "))
            }
            Self::File(f) => format!("<file {}>", f.path),
            Self::Closure(_) | Self::Builtin(_) => "<function>".to_owned(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Real(n) => Some(*n),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Real(_))
    }

    /// Narrows a real arithmetic result back to `Int` when it exactly
    /// represents one (`float.c`'s `(int)r == r ? new_int : new_float`
    /// pattern, repeated by every `nm_float_*` operator).
    fn narrow_real(r: f64) -> Self {
        if r.is_finite() && r.fract() == 0.0 && r >= i64::MIN as f64 && r <= i64::MAX as f64 {
            Self::Int(r as i64)
        } else {
            Self::Real(r)
        }
    }

    /// `+`. `Int + Int` stays exact; any other numeric pairing promotes
    /// through `f64` and narrows back to `Int` when the exact result is
    /// integral (§4.1 — `1 + 2.0` narrows to `Int(3)`); a `Str` operand on
    /// either side concatenates the other operand's [`Self::display_text`];
    /// two `Array` operands concatenate element-wise into a
    /// freshly-allocated array.
    pub fn add(&self, other: &Self, heap: &Heap) -> EvalResult<Self> {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => {
                let result = Self::new_array(heap, 0);
                let Self::Array(data) = &result else { unreachable!("new_array always returns Value::Array") };
                data.items.borrow_mut().extend(a.items.borrow().iter().cloned());
                data.items.borrow_mut().extend(b.items.borrow().iter().cloned());
                Ok(result)
            }
            (Self::Str(a), _) => Ok(Self::new_str(heap, &(a.0.clone() + &other.display_text()))),
            (_, Self::Str(b)) => Ok(Self::new_str(heap, &(self.display_text() + &b.0))),
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(a.wrapping_add(*b))),
            _ if self.is_numeric() && other.is_numeric() => {
                Ok(Self::narrow_real(self.as_f64().unwrap() + other.as_f64().unwrap()))
            }
            _ => Err(RunError::type_error(None, "+", &[self.repr_type(), other.repr_type()])),
        }
    }

    pub fn sub(&self, other: &Self) -> EvalResult<Self> {
        self.numeric_binop(other, "-", |a, b| a - b, |a, b| a.wrapping_sub(b))
    }

    pub fn mul(&self, other: &Self) -> EvalResult<Self> {
        self.numeric_binop(other, "*", |a, b| a * b, |a, b| a.wrapping_mul(b))
    }

    /// `/`. Always goes through real division and narrows (§4.1: `5 / 2` is
    /// `Real(2.5)`, `4 / 2` narrows back to `Int(2)`), matching the
    /// original's `nm_int_div`/`nm_float_div`. Division by zero is
    /// `ErrorKind::DivideByZero` for both int and real operands, not
    /// IEEE-754 infinity.
    pub fn div(&self, other: &Self) -> EvalResult<Self> {
        if self.is_numeric() && other.is_numeric() {
            let b = other.as_f64().unwrap();
            if b == 0.0 {
                return Err(RunError::divide_by_zero(None));
            }
            return Ok(Self::narrow_real(self.as_f64().unwrap() / b));
        }
        Err(RunError::type_error(None, "/", &[self.repr_type(), other.repr_type()]))
    }

    /// `%`. Always produces an `Int`: a `Real` operand on either side is
    /// first truncated toward zero (`nodes_exec.c`'s `(int)right.v.f`),
    /// then ordinary integer remainder applies.
    pub fn rem(&self, other: &Self) -> EvalResult<Self> {
        let (a, b) = match (self, other) {
            (Self::Int(a), Self::Int(b)) => (*a, *b),
            (Self::Int(a), Self::Real(b)) => (*a, *b as i64),
            (Self::Real(a), Self::Int(b)) => (*a as i64, *b),
            (Self::Real(a), Self::Real(b)) => (*a as i64, *b as i64),
            _ => return Err(RunError::type_error(None, "%", &[self.repr_type(), other.repr_type()])),
        };
        if b == 0 {
            return Err(RunError::divide_by_zero(None));
        }
        Ok(Self::Int(a.wrapping_rem(b)))
    }

    fn numeric_binop(
        &self,
        other: &Self,
        op: &str,
        real_op: impl Fn(f64, f64) -> f64,
        int_op: impl Fn(i64, i64) -> i64,
    ) -> EvalResult<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(int_op(*a, *b))),
            _ if self.is_numeric() && other.is_numeric() => {
                Ok(Self::narrow_real(real_op(self.as_f64().unwrap(), other.as_f64().unwrap())))
            }
            _ => Err(RunError::type_error(None, op, &[self.repr_type(), other.repr_type()])),
        }
    }

    /// Three-way comparison backing `> < >= <= == !=`. Numbers compare by
    /// value (with int/real promotion); strings and chars compare
    /// lexicographically/by code point (the "stringwise compares" of §3);
    /// everything else only supports `==`/`!=`, by reference identity for
    /// the heap-backed variants.
    pub fn compare(&self, other: &Self) -> EvalResult<std::cmp::Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(a.cmp(b)),
            _ if self.is_numeric() && other.is_numeric() => self
                .as_f64()
                .unwrap()
                .partial_cmp(&other.as_f64().unwrap())
                .ok_or_else(|| RunError::type_error(None, "cmp", &[self.repr_type(), other.repr_type()])),
            (Self::Char(a), Self::Char(b)) => Ok(a.cmp(b)),
            (Self::Str(a), Self::Str(b)) => Ok(a.0.cmp(&b.0)),
            _ => Err(RunError::type_error(None, "cmp", &[self.repr_type(), other.repr_type()])),
        }
    }

    /// `==`/`!=` fall back to this for types [`Self::compare`] rejects
    /// (arrays, files, functions): identity rather than a type error, so
    /// every value pair is comparable for equality even if not for order.
    #[must_use]
    pub fn value_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::File(a), Self::File(b)) => Rc::ptr_eq(a, b),
            (Self::Closure(a), Self::Closure(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => Rc::ptr_eq(a, b),
            _ => self.compare(other).is_ok_and(std::cmp::Ordering::is_eq),
        }
    }

    /// Unary `+`/`-`/`!`.
    pub fn plus(&self) -> EvalResult<Self> {
        if self.is_numeric() { Ok(self.clone()) } else { Err(RunError::type_error(None, "unary +", &[self.repr_type()])) }
    }

    pub fn negate(&self) -> EvalResult<Self> {
        match self {
            Self::Int(n) => Ok(Self::Int(-n)),
            Self::Real(n) => Ok(Self::Real(-n)),
            _ => Err(RunError::type_error(None, "unary -", &[self.repr_type()])),
        }
    }

    #[must_use]
    pub fn not(&self) -> Self {
        Self::Int(i64::from(!self.boolish()))
    }

    /// `++`/`--`. Only defined for `Int`/`Real`, matching the arithmetic ops
    /// they desugar to.
    pub fn step(&self, delta: i64) -> EvalResult<Self> {
        match self {
            Self::Int(n) => Ok(Self::Int(n.wrapping_add(delta))),
            Self::Real(n) => Ok(Self::Real(n + delta as f64)),
            _ => Err(RunError::type_error(None, "++/--", &[self.repr_type()])),
        }
    }

    /// `arr.i` / `s.i` (the `.` operator, §4.1 `Array[Int]`). Negative
    /// indices are out of range, not Python-style wraparound: the grammar
    /// gives no syntax for a negative index literal to reach here except
    /// through `- i`, and the original never supported it either.
    pub fn index(&self, idx: i64) -> EvalResult<Self> {
        match self {
            Self::Array(a) => {
                let items = a.items.borrow();
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .ok_or_else(|| RunError::index(None, items.len(), idx))
            }
            Self::Str(s) => {
                let chars: Vec<char> = s.0.chars().collect();
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| chars.get(i).copied())
                    .map(Self::Char)
                    .ok_or_else(|| RunError::index(None, chars.len(), idx))
            }
            _ => Err(RunError::type_error(None, ".", &[self.repr_type(), "int"])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_div_goes_through_real_division_and_narrows() {
        let a = Value::new_int(5);
        let b = Value::new_int(2);
        assert!(matches!(a.div(&b).unwrap(), Value::Real(r) if r == 2.5));

        let c = Value::new_int(4);
        assert!(matches!(c.div(&b).unwrap(), Value::Int(2)));
    }

    #[test]
    fn real_results_narrow_to_int_when_exact() {
        let a = Value::new_real(2.5);
        let b = Value::new_real(2.5);
        assert!(matches!(a.add(&b, &Heap::new()).unwrap(), Value::Int(5)));

        let c = Value::new_real(2.0);
        let d = Value::new_real(3.0);
        assert!(matches!(c.mul(&d).unwrap(), Value::Int(6)));

        let e = Value::new_int(1);
        let f = Value::new_real(2.0);
        assert!(matches!(e.add(&f, &Heap::new()).unwrap(), Value::Int(3)));
    }

    #[test]
    fn non_integral_real_results_stay_real() {
        let a = Value::new_int(1);
        let b = Value::new_real(2.5);
        assert!(matches!(a.add(&b, &Heap::new()).unwrap(), Value::Real(r) if r == 3.5));
    }

    #[test]
    fn int_int_arithmetic_stays_exact() {
        let a = Value::new_int(3);
        let b = Value::new_int(4);
        assert!(matches!(a.add(&b, &Heap::new()).unwrap(), Value::Int(7)));
        assert!(matches!(a.mul(&b).unwrap(), Value::Int(12)));
    }

    #[test]
    fn rem_truncates_a_real_operand_toward_zero() {
        let a = Value::new_int(5);
        let b = Value::new_real(2.5);
        assert!(matches!(a.rem(&b).unwrap(), Value::Int(1)));

        let c = Value::new_real(5.9);
        let d = Value::new_int(2);
        assert!(matches!(c.rem(&d).unwrap(), Value::Int(1)));
    }

    #[test]
    fn division_and_remainder_by_zero_are_errors() {
        let zero = Value::new_int(0);
        let one = Value::new_int(1);
        assert!(one.div(&zero).is_err());
        assert!(one.rem(&zero).is_err());
    }
}
