//! Safe(r) wrappers around llvm_sys::execution_engine

use std::mem::{forget, MaybeUninit};

use llvm_sys::{
    core::LLVMDisposeMessage,
    execution_engine::{
        LLVMCreateMCJITCompilerForModule, LLVMDisposeExecutionEngine, LLVMExecutionEngineRef,
        LLVMGetFunctionAddress, LLVMInitializeMCJITCompilerOptions, LLVMLinkInMCJIT,
        LLVMMCJITCompilerOptions,
    },
};

use crate::llvm_sys::{core::LLVMModule, cstr_to_string, to_c_str};

/// Rust wrapper around [LLVMMCJITCompilerOptions]
#[derive(Clone, Debug, Copy)]
pub struct MCJITCompilerOptions(pub LLVMMCJITCompilerOptions);

impl Default for MCJITCompilerOptions {
    fn default() -> Self {
        let mut options = MaybeUninit::uninit();
        unsafe {
            LLVMInitializeMCJITCompilerOptions(
                options.as_mut_ptr(),
                std::mem::size_of::<LLVMMCJITCompilerOptions>(),
            );
            MCJITCompilerOptions(options.assume_init())
        }
    }
}

impl MCJITCompilerOptions {
    /// Code generation optimization level, 0 to 3.
    pub fn with_opt_level(mut self, opt_level: u32) -> Self {
        assert!(opt_level <= 3);
        self.0.OptLevel = opt_level;
        self
    }
}

/// Rust wrapper around [LLVMExecutionEngineRef]
pub struct ExecutionEngine(LLVMExecutionEngineRef);

impl ExecutionEngine {
    /// Creates a new MCJIT [ExecutionEngine] for the given module.
    /// The engine takes ownership of the module, whether or not creation
    /// succeeds. [ExecutionEngine::link_in_mcjit] must have been called,
    /// and the native target initialized.
    pub fn new_mcjit_for_module(
        module: LLVMModule,
        options: MCJITCompilerOptions,
    ) -> Result<Self, String> {
        let mut ee = MaybeUninit::uninit();
        let mut error_string = MaybeUninit::uninit();
        let result = unsafe {
            LLVMCreateMCJITCompilerForModule(
                ee.as_mut_ptr(),
                module.inner_ref(),
                // This is ok, `LLVMCreateMCJITCompilerForModule` creates a copy.
                &options.0 as *const LLVMMCJITCompilerOptions as *mut LLVMMCJITCompilerOptions,
                std::mem::size_of::<LLVMMCJITCompilerOptions>(),
                error_string.as_mut_ptr(),
            )
        };
        // We can forget the module, as the execution engine now owns it.
        forget(module);
        if result != 0 {
            unsafe {
                let err_str = error_string.assume_init();
                let err_string = cstr_to_string(err_str)
                    .unwrap_or_else(|| "Failed to create execution engine".into());
                LLVMDisposeMessage(err_str);
                Err(err_string)
            }
        } else {
            let ee = unsafe { ee.assume_init() };
            Ok(ExecutionEngine(ee))
        }
    }

    /// Address of the compiled function `name`. Compiles the module
    /// if that hasn't happened yet.
    pub fn get_function_address(&self, name: &str) -> Option<u64> {
        let addr = unsafe { LLVMGetFunctionAddress(self.0, to_c_str(name).as_ptr()) };
        (addr != 0).then_some(addr)
    }

    /// Call the function `name`, which must have type `void ()`.
    ///
    /// ### Safety
    /// This function executes arbitrary code.
    pub unsafe fn run_void_function(&self, name: &str) -> Result<(), String> {
        let addr = self
            .get_function_address(name)
            .ok_or_else(|| format!("Function {name} not found"))?;
        let func: extern "C" fn() = unsafe { std::mem::transmute(addr as usize) };
        func();
        Ok(())
    }

    /// Link in MCJIT.
    pub fn link_in_mcjit() {
        unsafe {
            LLVMLinkInMCJIT();
        }
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        unsafe {
            LLVMDisposeExecutionEngine(self.0);
        }
    }
}
