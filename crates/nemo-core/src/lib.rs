//! Core library for nemo: lexer, parser, tree-walking evaluator and a
//! Hindley-Milner type inferencer for a small dynamically-typed scripting
//! language.
//!
//! This crate has no `main`; [`nemo-cli`](../nemo_cli/index.html) wires these
//! pieces together into a runnable driver. A typical embedding:
//!
//! ```no_run
//! use nemo_core::{eval_block, heap::Heap, namespace::Scope, options::InterpreterOptions, parser};
//!
//! let options = InterpreterOptions::default();
//! let ast = parser::parse_string("print 1 + 1;", &options).unwrap();
//! let scope = Scope::root();
//! nemo_core::builtins::register_builtins(&scope).unwrap();
//! let heap = Heap::default();
//! eval_block(&ast, &scope, &heap, &options).unwrap();
//! ```

pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod errors;
pub mod eval;
pub mod heap;
pub mod lexer;
pub mod namespace;
pub mod options;
pub mod parser;
pub mod types;
pub mod value;

pub use errors::{ErrorKind, EvalResult, RunError};
pub use eval::eval_block;
pub use options::InterpreterOptions;
pub use types::{infer, TypeRegistry};
