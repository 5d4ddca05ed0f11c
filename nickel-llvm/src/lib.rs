//! Native backend for nickel: programs are lowered to LLVM IR,
//! optimized, and run in-process with MCJIT.

pub mod codegen;
pub mod executor;
pub mod llvm_sys;
