//! nickel: a tiny language of 64-bit integer expressions and first order functions.
//!
//! This crate holds everything that doesn't depend on LLVM: the [ast],
//! the [parser] front end, name resolution ([function_table]) and a
//! tree-walking [interpreter]. The `nickel-llvm` crate lowers the same
//! [ast] to LLVM IR and runs it just-in-time.

#[forbid(unsafe_code)]
pub mod ast;
pub mod environment;
pub mod function_table;
pub mod identifier;
pub mod interpreter;
pub mod parser;
pub mod result;
