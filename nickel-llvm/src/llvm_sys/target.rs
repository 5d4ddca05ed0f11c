//! Safe(r) wrappers around llvm_sys::target

use std::sync::OnceLock;

use llvm_sys::target::{
    LLVM_InitializeNativeAsmParser, LLVM_InitializeNativeAsmPrinter, LLVM_InitializeNativeTarget,
};

use crate::llvm_sys::ToBool;

/// LLVM_InitializeNativeTarget
pub fn llvm_initialize_native_target() -> Result<(), String> {
    if !unsafe { LLVM_InitializeNativeTarget().to_bool() } {
        Ok(())
    } else {
        Err("Failed to initialize native target".to_string())
    }
}

/// LLVM_InitializeNativeAsmParser
pub fn llvm_initialize_native_asm_parser() -> Result<(), String> {
    if !unsafe { LLVM_InitializeNativeAsmParser().to_bool() } {
        Ok(())
    } else {
        Err("Failed to initialize native asm parser".to_string())
    }
}

/// LLVM_InitializeNativeAsmPrinter
pub fn llvm_initialize_native_asm_printer() -> Result<(), String> {
    if !unsafe { LLVM_InitializeNativeAsmPrinter().to_bool() } {
        Ok(())
    } else {
        Err("Failed to initialize native asm printer".to_string())
    }
}

/// Initialize the native target, its asm printer and parser.
/// Only the first call in a process does the work, later calls
/// return the outcome of the first.
pub fn initialize_native() -> Result<(), String> {
    static INITIALIZED: OnceLock<Result<(), String>> = OnceLock::new();
    INITIALIZED
        .get_or_init(|| {
            llvm_initialize_native_target()?;
            llvm_initialize_native_asm_printer()?;
            llvm_initialize_native_asm_parser()?;
            Ok(())
        })
        .clone()
}
