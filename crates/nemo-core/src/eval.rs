//! The tree-walking evaluator.
//!
//! Grounded in `original_source/nodes_exec.c`'s per-tag dispatch (`NmAST_Exec`
//! switching on `node->type`); the jump table there becomes an exhaustive
//! `match` here, and the `setjmp`-based error unwinding becomes ordinary `?`
//! propagation through [`EvalResult`].

use std::{cell::Cell, rc::Rc};

use crate::{
    ast::{BinOp, Node, UnOp},
    errors::{EvalResult, RunError},
    heap::Heap,
    namespace::Scope,
    options::InterpreterOptions,
    value::{ApplyResult, Value},
};

/// Evaluates `block` in `scope`, threading `heap` (for value construction)
/// and `options` (recursion limit, debug logging) through every nested
/// call. This is the `eval_block` entry point from §6.
pub fn eval_block(block: &Node, scope: &Rc<Scope>, heap: &Heap, options: &InterpreterOptions) -> EvalResult<Value> {
    if options.debug {
        tracing::debug!("evaluating top-level block");
    }
    Evaluator { heap, options, depth: Cell::new(0) }.eval(block, scope)
}

struct Evaluator<'a> {
    heap: &'a Heap,
    options: &'a InterpreterOptions,
    depth: Cell<usize>,
}

impl Evaluator<'_> {
    fn eval(&self, node: &Node, scope: &Rc<Scope>) -> EvalResult<Value> {
        match node {
            Node::Nop => Ok(Value::new_null()),
            Node::Int(n) => Ok(Value::new_int(*n)),
            Node::Real(n) => Ok(Value::new_real(*n)),
            Node::Str(s) => Ok(Value::new_str(self.heap, s)),
            Node::Char(c) => Ok(Value::new_char(*c)),
            Node::Tuple(items) => self.eval_tuple(items, scope),
            Node::Name(name) => {
                let var = scope.lookup(name).ok_or_else(|| RunError::name_not_found(None, name))?;
                Ok(var.value.borrow().clone())
            }
            Node::Unop(op, child) => self.eval_unop(*op, child, scope),
            Node::Binop(op, l, r) => self.eval_binop(*op, l, r, scope),
            Node::Ternop(c, t, e) => {
                if self.eval(c, scope)?.boolish() { self.eval(t, scope) } else { self.eval(e, scope) }
            }
            Node::If(guard, body, else_) => {
                if self.eval(guard, scope)?.boolish() {
                    self.eval(body, scope)
                } else if let Some(else_) = else_ {
                    self.eval(else_, scope)
                } else {
                    Ok(Value::new_null())
                }
            }
            Node::While(guard, body, else_) => self.eval_while(guard, body, else_.as_deref(), scope),
            Node::Decl(name, init) => {
                let value = self.eval(init, scope)?;
                scope.declare(name, value.clone(), false)?;
                Ok(value)
            }
            Node::Call(callee, arg) => self.eval_call(callee, arg, scope),
            Node::Fun(param, body) => Ok(Value::new_closure(param.clone(), (**body).clone(), Rc::clone(scope))),
            Node::Use(_) => Ok(Value::new_null()),
            Node::Print(items, newline) => self.eval_print(items, *newline, scope),
            Node::Block(stmts) => self.eval_block_stmts(stmts, scope),
        }
    }

    fn eval_tuple(&self, items: &[Node], scope: &Rc<Scope>) -> EvalResult<Value> {
        let array = Value::new_array(self.heap, items.len());
        let Value::Array(data) = &array else { unreachable!("new_array always returns Value::Array") };
        for (i, item) in items.iter().enumerate() {
            data.items.borrow_mut()[i] = self.eval(item, scope)?;
        }
        Ok(array)
    }

    fn eval_block_stmts(&self, stmts: &[Node], scope: &Rc<Scope>) -> EvalResult<Value> {
        let child = scope.child();
        let mut last = Value::new_null();
        for stmt in stmts {
            last = self.eval(stmt, &child)?;
        }
        Ok(last)
    }

    fn eval_print(&self, items: &[Node], newline: bool, scope: &Rc<Scope>) -> EvalResult<Value> {
        for item in items {
            print!("{}", self.eval(item, scope)?.display_text());
        }
        if newline {
            println!();
        }
        Ok(Value::new_int(1))
    }

    fn eval_while(&self, guard: &Node, body: &Node, else_: Option<&Node>, scope: &Rc<Scope>) -> EvalResult<Value> {
        let mut entered = false;
        while self.eval(guard, scope)?.boolish() {
            entered = true;
            self.eval(body, scope)?;
        }
        if !entered {
            if let Some(else_) = else_ {
                self.eval(else_, scope)?;
            }
        }
        Ok(Value::new_null())
    }

    fn eval_unop(&self, op: UnOp, child: &Node, scope: &Rc<Scope>) -> EvalResult<Value> {
        match op {
            UnOp::Plus => self.eval(child, scope)?.plus(),
            UnOp::Minus => self.eval(child, scope)?.negate(),
            UnOp::Not => Ok(self.eval(child, scope)?.not()),
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let Node::Name(name) = child else {
                    return Err(RunError::type_error(None, "++/--", &["non-lvalue"]));
                };
                let delta = if matches!(op, UnOp::PreInc | UnOp::PostInc) { 1 } else { -1 };
                let before = self.eval(child, scope)?;
                let after = before.step(delta)?;
                scope.assign(name, after.clone())?;
                Ok(if matches!(op, UnOp::PreInc | UnOp::PreDec) { after } else { before })
            }
        }
    }

    fn eval_binop(&self, op: BinOp, l: &Node, r: &Node, scope: &Rc<Scope>) -> EvalResult<Value> {
        if op.is_assignment() {
            return self.eval_assign(op, l, r, scope);
        }
        let left = self.eval(l, scope)?;
        let right = self.eval(r, scope)?;
        self.apply_binop(op, &left, &right)
    }

    fn apply_binop(&self, op: BinOp, left: &Value, right: &Value) -> EvalResult<Value> {
        match op {
            BinOp::Add => left.add(right, self.heap),
            BinOp::Sub => left.sub(right),
            BinOp::Mul => left.mul(right),
            BinOp::Div => left.div(right),
            BinOp::Mod => left.rem(right),
            BinOp::Gt => Ok(Value::new_int(i64::from(left.compare(right)?.is_gt()))),
            BinOp::Lt => Ok(Value::new_int(i64::from(left.compare(right)?.is_lt()))),
            BinOp::Ge => Ok(Value::new_int(i64::from(left.compare(right)?.is_ge()))),
            BinOp::Le => Ok(Value::new_int(i64::from(left.compare(right)?.is_le()))),
            BinOp::Eq => Ok(Value::new_int(i64::from(left.value_eq(right)))),
            BinOp::Ne => Ok(Value::new_int(i64::from(!left.value_eq(right)))),
            BinOp::And => Ok(Value::new_int(i64::from(left.boolish() && right.boolish()))),
            BinOp::Or => Ok(Value::new_int(i64::from(left.boolish() || right.boolish()))),
            BinOp::Index => {
                let Value::Int(idx) = right else {
                    return Err(RunError::type_error(None, ".", &[left.repr_type(), right.repr_type()]));
                };
                left.index(*idx)
            }
            BinOp::Assign
            | BinOp::AddAssign
            | BinOp::SubAssign
            | BinOp::MulAssign
            | BinOp::DivAssign
            | BinOp::ModAssign => unreachable!("handled by eval_assign"),
        }
    }

    fn eval_assign(&self, op: BinOp, l: &Node, r: &Node, scope: &Rc<Scope>) -> EvalResult<Value> {
        let Node::Name(name) = l else {
            return Err(RunError::type_error(None, "=", &["non-lvalue"]));
        };
        let rhs = self.eval(r, scope)?;
        let stored = if let Some(underlying) = op.underlying() {
            let current = self.eval(l, scope)?;
            self.apply_binop(underlying, &current, &rhs)?
        } else {
            rhs
        };
        scope.assign(name, stored.clone())?;
        Ok(stored)
    }

    fn eval_call(&self, callee: &Node, arg: &Node, scope: &Rc<Scope>) -> EvalResult<Value> {
        let fun = self.eval(callee, scope)?;
        let arg = self.eval(arg, scope)?;

        let depth = self.depth.get() + 1;
        if depth > self.options.max_recursion_depth {
            return Err(RunError::recursion(None, self.options.max_recursion_depth));
        }
        if self.options.debug {
            tracing::trace!(depth, callee = fun.repr_type(), "entering call");
        }
        self.depth.set(depth);
        let result = match fun.apply(self.heap, arg)? {
            ApplyResult::Value(v) => Ok(v),
            ApplyResult::Enter(closure, arg) => {
                let child = closure.scope.child();
                child.declare(&closure.param, arg, false)?;
                self.eval(&closure.body, &child)
            }
        };
        self.depth.set(self.depth.get() - 1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builtins::register_builtins, parser::parse_string};

    fn run(src: &str) -> Value {
        let options = InterpreterOptions::default();
        let ast = parse_string(src, &options).unwrap();
        let scope = Scope::root();
        register_builtins(&scope).unwrap();
        let heap = Heap::default();
        eval_block(&ast, &scope, &heap, &options).unwrap()
    }

    #[test]
    fn declaration_then_reference_yields_the_value() {
        assert!(matches!(run("my x = 41; x;"), Value::Int(41)));
    }

    #[test]
    fn lexical_scoping_restores_outer_binding_after_block() {
        assert!(matches!(run("my x = 1; { my x = 2; } x;"), Value::Int(1)));
    }

    #[test]
    fn while_loop_counts_down_to_zero() {
        assert!(matches!(run("my x = 10; while x > 0 { x = x - 1; } x;"), Value::Int(0)));
    }

    #[test]
    fn recursive_factorial() {
        assert!(matches!(run("fn fact(n) { if n < 2 1 else n * fact(n - 1); } fact(5);"), Value::Int(120)));
    }

    #[test]
    fn string_concat_then_len() {
        assert!(matches!(run("my s = \"he\" + \"llo\"; len(s);"), Value::Int(5)));
    }

    #[test]
    fn array_concat_then_index() {
        assert!(matches!(run("my a = [1, 2, 3]; my b = [4, 5]; (a + b)[3];"), Value::Int(4)));
    }

    #[test]
    fn division_by_zero_is_an_error_not_infinity() {
        let options = InterpreterOptions::default();
        let ast = parse_string("1 / 0;", &options).unwrap();
        let scope = Scope::root();
        let heap = Heap::default();
        let err = eval_block(&ast, &scope, &heap, &options).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::DivideByZero);
    }

    #[test]
    fn and_or_evaluate_both_sides_without_short_circuiting() {
        // The right operand (a call with a side effect) always runs, even
        // though the left operand `0` already forces `&&` to be false.
        assert!(matches!(run("my hits = 0; fn f(_) { hits = hits + 1; 1 } 0 && f(0); hits;"), Value::Int(1)));
    }

    #[test]
    fn recursion_beyond_the_configured_depth_fails_cleanly() {
        let options = InterpreterOptions { max_recursion_depth: 3, ..InterpreterOptions::default() };
        let ast = parse_string("fn loop_forever(n) { loop_forever(n + 1); } loop_forever(0);", &options).unwrap();
        let scope = Scope::root();
        register_builtins(&scope).unwrap();
        let heap = Heap::default();
        let err = eval_block(&ast, &scope, &heap, &options).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Recursion);
    }
}
