//! The type system and a Hindley-Milner-style inferencer (Algorithm W).
//!
//! Grounded directly in `original_source/infer.c`: `fresh`/`unify`/`prune`
//! here are line-for-line translations of `freshrec`/`unify`/`prune`, with
//! the `setjmp`-based abort replaced by `Result`.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    rc::Rc,
};

use crate::{
    ast::Node,
    errors::{EvalResult, RunError},
    namespace::Scope,
};

/// A type variable's identity. Two variables are the same iff their ids
/// match; `instance` is populated by `unify` and chased by `prune`.
#[derive(Debug, Clone)]
struct TypeVar {
    id: u32,
    instance: RefCell<Option<Type>>,
}

/// The inferencer's type language (§3 Type).
///
/// `Int`/`Real`/`Char`/`Str`/`Void` are cheap to construct and compare by
/// value; they are not heap-interned singletons in this rewrite (unlike the
/// C original's `nob_type*` registry) because `Type` is a small `Clone`
/// value type, not a pointer — comparing them structurally is just as cheap
/// and avoids a global registry entirely.
#[derive(Debug, Clone)]
pub enum Type {
    Var(Rc<TypeVar>),
    Int,
    Real,
    Char,
    Str,
    Void,
    Tuple(Vec<Type>),
    Fun(Box<Type>, Box<Type>),
    Custom(String, Option<Box<Type>>),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Var(a), Self::Var(b)) => Rc::ptr_eq(a, b),
            (Self::Int, Self::Int)
            | (Self::Real, Self::Real)
            | (Self::Char, Self::Char)
            | (Self::Str, Self::Str)
            | (Self::Void, Self::Void) => true,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Fun(ra, pa), Self::Fun(rb, pb)) => ra == rb && pa == pb,
            (Self::Custom(na, va), Self::Custom(nb, vb)) => na == nb && va == vb,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(v) => match &*v.instance.borrow() {
                Some(t) => write!(f, "{t}"),
                None => write!(f, "'t{}", v.id),
            },
            Self::Int => write!(f, "int"),
            Self::Real => write!(f, "real"),
            Self::Char => write!(f, "char"),
            Self::Str => write!(f, "str"),
            Self::Void => write!(f, "void"),
            Self::Tuple(ts) => {
                write!(f, "(")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Self::Fun(ret, param) => write!(f, "{param} -> {ret}"),
            Self::Custom(name, Some(inner)) => write!(f, "{name}<{inner}>"),
            Self::Custom(name, None) => write!(f, "{name}"),
        }
    }
}

/// Monotonic counter for fresh type variable ids, scoped to one
/// [`TypeRegistry`] (and therefore to one inference run).
#[derive(Debug, Default)]
pub struct TypeRegistry {
    next_id: Cell<u32>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a brand-new, unbound type variable.
    #[must_use]
    pub fn new_var(&self) -> Type {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Type::Var(Rc::new(TypeVar { id, instance: RefCell::new(None) }))
    }
}

/// The set of type variables that are "pinned" by an enclosing binding and
/// must therefore stay rigid (not be copied by [`fresh`]) during inference
/// of a function body. See Glossary: Generic / non-generic.
#[derive(Debug, Clone, Default)]
pub struct NonGen(Vec<Type>);

impl NonGen {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn extended(&self, var: Type) -> Self {
        let mut slots = self.0.clone();
        slots.push(var);
        Self(slots)
    }

    fn is_generic(&self, registry: &TypeRegistry, ty: &Type) -> bool {
        !self.0.iter().any(|bound| occurs_in_type(registry, ty, bound))
    }
}

/// Chases a type variable's `instance` chain to its canonical
/// representative. A no-op for non-variable types.
#[must_use]
pub fn prune(ty: &Type) -> Type {
    if let Type::Var(v) = ty {
        let resolved = v.instance.borrow().clone();
        if let Some(inner) = resolved {
            let canon = prune(&inner);
            *v.instance.borrow_mut() = Some(canon.clone());
            return canon;
        }
    }
    ty.clone()
}

fn is_type_variable(ty: &Type) -> bool {
    matches!(ty, Type::Var(_))
}

/// The occurs-in check: does type variable `needle` appear anywhere inside
/// `haystack`? Prevents `unify` from building a cyclic `instance` chain
/// (§3 invariant; §8 "Occurs check").
fn occurs_in_type(registry: &TypeRegistry, needle: &Type, haystack: &Type) -> bool {
    let pruned = prune(haystack);
    if is_type_variable(&pruned) {
        return pruned == *needle;
    }
    occurs_in(registry, needle, &pruned)
}

fn occurs_in(registry: &TypeRegistry, needle: &Type, haystack: &Type) -> bool {
    let children: &[Type] = match haystack {
        Type::Tuple(ts) => ts,
        Type::Fun(ret, param) => {
            return occurs_in_type(registry, needle, ret) || occurs_in_type(registry, needle, param);
        }
        Type::Custom(_, Some(inner)) => std::slice::from_ref(inner.as_ref()),
        _ => &[],
    };
    children.iter().any(|t| occurs_in_type(registry, needle, t))
}

/// Creates a fresh copy of `ty`: every *generic* type variable (one not
/// present in `nongen`) is replaced by a brand-new variable, consistently
/// across the whole type; variables bound by `nongen` are left as-is
/// (rigid). This is `fresh`/`freshrec` from `original_source/infer.c`.
#[must_use]
pub fn fresh(registry: &TypeRegistry, ty: &Type, nongen: &NonGen) -> Type {
    let mut mapping: HashMap<u32, Type> = HashMap::new();
    freshrec(registry, ty, nongen, &mut mapping)
}

fn freshrec(registry: &TypeRegistry, ty: &Type, nongen: &NonGen, mapping: &mut HashMap<u32, Type>) -> Type {
    let pruned = prune(ty);
    match &pruned {
        Type::Var(v) => {
            if nongen.is_generic(registry, &pruned) {
                mapping.entry(v.id).or_insert_with(|| registry.new_var()).clone()
            } else {
                pruned
            }
        }
        Type::Tuple(ts) => Type::Tuple(ts.iter().map(|t| freshrec(registry, t, nongen, mapping)).collect()),
        Type::Fun(ret, param) => Type::Fun(
            Box::new(freshrec(registry, ret, nongen, mapping)),
            Box::new(freshrec(registry, param, nongen, mapping)),
        ),
        Type::Custom(name, Some(inner)) => {
            Type::Custom(name.clone(), Some(Box::new(freshrec(registry, inner, nongen, mapping))))
        }
        other => other.clone(),
    }
}

/// Unifies two types by substitution, binding type variables as needed.
/// Fails with `TypeError` on a structural mismatch or an occurs-in
/// violation. This is `unify` from `original_source/infer.c`.
pub fn unify(registry: &TypeRegistry, a: &Type, b: &Type) -> EvalResult<()> {
    let pa = prune(a);
    let pb = prune(b);
    match (&pa, &pb) {
        (Type::Var(va), _) if !matches!(&pb, Type::Var(vb) if Rc::ptr_eq(va, vb)) => {
            if occurs_in_type(registry, &pa, &pb) {
                Err(RunError::inference("unify", "recursive unification"))
            } else {
                *va.instance.borrow_mut() = Some(pb);
                Ok(())
            }
        }
        (_, Type::Var(_)) => unify(registry, &pb, &pa),
        (Type::Tuple(ta), Type::Tuple(tb)) if ta.len() == tb.len() => {
            for (x, y) in ta.iter().zip(tb.iter()) {
                unify(registry, x, y)?;
            }
            Ok(())
        }
        (Type::Fun(ra, pa2), Type::Fun(rb, pb2)) => {
            unify(registry, ra, rb)?;
            unify(registry, pa2, pb2)
        }
        (Type::Custom(na, va), Type::Custom(nb, vb)) if na == nb => match (va, vb) {
            (Some(x), Some(y)) => unify(registry, x, y),
            (None, None) => Ok(()),
            _ => Err(RunError::inference("unify", format!("type mismatch: {pa} != {pb}"))),
        },
        _ if pa == pb => Ok(()),
        _ => Err(RunError::inference("unify", format!("type mismatch: {pa} != {pb}"))),
    }
}

/// Counts the implicit positional parameters (`%1`, `%2`, ...) referenced in
/// a function body, as a bitmask. The highest set bit gives the arity; see
/// §4.6 and `original_source/count_params.h`.
#[must_use]
pub fn count_implicit_params(node: &Node) -> u32 {
    let mut mask = 0u32;
    count_params_rec(node, &mut mask);
    mask
}

fn count_params_rec(node: &Node, mask: &mut u32) {
    match node {
        Node::Name(name) => {
            if let Some(rest) = name.strip_prefix('%') {
                if let Ok(index) = rest.parse::<u32>() {
                    if index >= 1 {
                        *mask |= 1 << (index - 1);
                    }
                }
            }
        }
        Node::Tuple(items) | Node::Print(items, _) | Node::Block(items) => {
            for n in items {
                count_params_rec(n, mask);
            }
        }
        Node::Unop(_, child) => count_params_rec(child, mask),
        Node::Binop(_, l, r) => {
            count_params_rec(l, mask);
            count_params_rec(r, mask);
        }
        Node::Ternop(c, t, e) => {
            count_params_rec(c, mask);
            count_params_rec(t, mask);
            count_params_rec(e, mask);
        }
        Node::If(g, b, e) | Node::While(g, b, e) => {
            count_params_rec(g, mask);
            count_params_rec(b, mask);
            if let Some(e) = e {
                count_params_rec(e, mask);
            }
        }
        Node::Decl(_, init) => count_params_rec(init, mask),
        Node::Call(f, arg) => {
            count_params_rec(f, mask);
            count_params_rec(arg, mask);
        }
        Node::Fun(_, body) => count_params_rec(body, mask),
        Node::Nop | Node::Int(_) | Node::Real(_) | Node::Str(_) | Node::Char(_) | Node::Use(_) => {}
    }
}

/// Infers the principal type of `node` under `scope`, using Algorithm W
/// (§4.6). Inference failures are non-fatal at the interpreter level: callers
/// should downgrade the node's cached type to "unknown" and fall back to
/// runtime checks, per §4.6 and §7.
pub fn infer(registry: &TypeRegistry, scope: &Rc<Scope>, node: &Node) -> EvalResult<Type> {
    infer_internal(registry, scope, node, &NonGen::new())
}

fn infer_internal(registry: &TypeRegistry, scope: &Rc<Scope>, node: &Node, nongen: &NonGen) -> EvalResult<Type> {
    if let Some(t) = node.literal_type() {
        return Ok(t);
    }
    match node {
        Node::Tuple(items) => {
            let mut types = Vec::with_capacity(items.len());
            for item in items {
                types.push(infer_internal(registry, scope, item, nongen)?);
            }
            Ok(Type::Tuple(types))
        }
        Node::Name(name) => scope
            .lookup_type(name)
            .map(|bound| fresh(registry, &bound, nongen))
            .ok_or_else(|| RunError::inference("infer", format!("unknown symbol '{name}'"))),
        Node::Fun(param, body) => {
            // Every parameter gets a fresh variable, including one a body
            // never references (the synthetic `_` of a zero-argument
            // declaration among them): a zero-argument call site applies
            // `Node::Nop`, whose literal type is `Void`, so unification at
            // that call site pins the variable to `Void` on its own. No
            // special case is needed here for that to fall out correctly.
            let param_type = registry.new_var();
            let child = scope.child();
            child.bind_type(param, param_type.clone());
            let nongen = nongen.extended(param_type.clone());
            let result_type = infer_internal(registry, &child, body, &nongen)?;
            Ok(Type::Fun(Box::new(result_type), Box::new(param_type)))
        }
        Node::Call(f, arg) => {
            let fun_type = infer_internal(registry, scope, f, nongen)?;
            let arg_type = infer_internal(registry, scope, arg, nongen)?;
            let result_type = registry.new_var();
            unify(registry, &Type::Fun(Box::new(result_type.clone()), Box::new(arg_type)), &fun_type)?;
            Ok(result_type)
        }
        Node::Decl(_, init) => infer_internal(registry, scope, init, nongen),
        Node::Block(stmts) => {
            let mut last = Type::Void;
            for stmt in stmts {
                last = infer_internal(registry, scope, stmt, nongen)?;
            }
            Ok(last)
        }
        Node::Binop(_, l, r) => {
            infer_internal(registry, scope, l, nongen)?;
            infer_internal(registry, scope, r, nongen)
        }
        Node::Unop(_, child) => infer_internal(registry, scope, child, nongen),
        Node::If(g, b, e) | Node::While(g, b, e) => {
            infer_internal(registry, scope, g, nongen)?;
            let t = infer_internal(registry, scope, b, nongen)?;
            if let Some(e) = e {
                infer_internal(registry, scope, e, nongen)?;
            }
            Ok(t)
        }
        Node::Ternop(c, t, e) => {
            infer_internal(registry, scope, c, nongen)?;
            infer_internal(registry, scope, t, nongen)?;
            infer_internal(registry, scope, e, nongen)
        }
        Node::Print(items, _) => {
            for item in items {
                infer_internal(registry, scope, item, nongen)?;
            }
            Ok(Type::Void)
        }
        Node::Use(_) | Node::Nop => Ok(Type::Void),
        Node::Int(_) | Node::Real(_) | Node::Str(_) | Node::Char(_) => unreachable!("handled by literal_type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Scope;

    #[test]
    fn literals_produce_primitive_types() {
        let registry = TypeRegistry::new();
        let scope = Scope::root();
        assert_eq!(infer(&registry, &scope, &Node::Int(1)).unwrap(), Type::Int);
        assert_eq!(infer(&registry, &scope, &Node::Real(1.0)).unwrap(), Type::Real);
        assert_eq!(infer(&registry, &scope, &Node::Str("x".into())).unwrap(), Type::Str);
    }

    #[test]
    fn unify_is_symmetric() {
        let registry = TypeRegistry::new();
        let v = registry.new_var();
        assert!(unify(&registry, &v, &Type::Int).is_ok());
        let registry2 = TypeRegistry::new();
        let v2 = registry2.new_var();
        assert!(unify(&registry2, &Type::Int, &v2).is_ok());
    }

    #[test]
    fn occurs_check_rejects_self_reference() {
        let registry = TypeRegistry::new();
        let v = registry.new_var();
        let fun = Type::Fun(Box::new(v.clone()), Box::new(Type::Void));
        assert!(unify(&registry, &v, &fun).is_err());
    }

    #[test]
    fn implicit_param_bitmask_counts_highest_bit() {
        let body = Node::Binop(
            crate::ast::BinOp::Add,
            Box::new(Node::Name("%1".into())),
            Box::new(Node::Name("%3".into())),
        );
        assert_eq!(count_implicit_params(&body), 0b101);
    }

    #[test]
    fn identity_function_is_polymorphic_across_call_sites() {
        let registry = TypeRegistry::new();
        let scope = Scope::root();
        let identity = Node::Fun("x".to_owned(), Box::new(Node::Name("x".into())));
        scope.bind_type("id", infer(&registry, &scope, &identity).unwrap());

        let call_int = Node::Call(Box::new(Node::Name("id".into())), Box::new(Node::Int(1)));
        let call_str = Node::Call(Box::new(Node::Name("id".into())), Box::new(Node::Str("s".into())));
        assert_eq!(infer(&registry, &scope, &call_int).unwrap(), Type::Int);
        assert_eq!(infer(&registry, &scope, &call_str).unwrap(), Type::Str);
    }
}
