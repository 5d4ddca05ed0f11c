//! Compile a program to native code and run it.
//!
//! A run goes through these stages, each one fatal on failure:
//! lowering to a fresh module, verification, optimization with the
//! `default<O3>` pipeline, and execution of the entry function under MCJIT.
//! With [ExecutorConfig::dump_bitcode] set, the module is written out
//! before and after optimization.

use std::env;

use nickel::{
    ast::Program, backend_err, backend_error, function_table::ENTRY_SYMBOL, result::Result,
    verify_err,
};

use crate::{
    codegen::lower_program,
    llvm_sys::{
        core::{llvm_print_module_to_string, LLVMContext, LLVMModule},
        execution_engine::{ExecutionEngine, MCJITCompilerOptions},
        pass_builder::{llvm_run_passes, PassBuilderOptions},
        target::initialize_native,
    },
};

/// Name of the module programs are compiled into.
pub const MODULE_NAME: &str = "jit_module";
/// Bitcode of the module as lowered.
pub const UNOPTIMISED_BITCODE: &str = "unoptimised_module.bc";
/// Bitcode of the module after optimization.
pub const OPTIMISED_BITCODE: &str = "optimised_module.bc";
/// Setting this to `true` enables [ExecutorConfig::dump_bitcode].
pub const DUMP_BITCODE_VAR: &str = "DUMP_BITCODE";
/// The optimization pipeline.
pub const OPT_PIPELINE: &str = "default<O3>";
/// Inlining threshold of the optimization pipeline.
pub const INLINER_THRESHOLD: i32 = 225;
/// Machine code optimization level of the JIT compiler.
pub const CODEGEN_OPT_LEVEL: u32 = 2;

/// Options of an [Executor].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Write [UNOPTIMISED_BITCODE] and [OPTIMISED_BITCODE]
    /// to the working directory.
    pub dump_bitcode: bool,
}

impl ExecutorConfig {
    /// Read the configuration from the environment.
    /// Only the exact value `true` of [DUMP_BITCODE_VAR] enables dumping.
    pub fn from_env() -> Self {
        ExecutorConfig {
            dump_bitcode: env::var(DUMP_BITCODE_VAR).is_ok_and(|val| val == "true"),
        }
    }
}

/// Compiles and runs programs.
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Executor { config }
    }

    /// Lower `program` into a new, verified module of `llvm_ctx`.
    fn build_module(&self, llvm_ctx: &LLVMContext, program: &Program) -> Result<LLVMModule> {
        let module = LLVMModule::new(MODULE_NAME, llvm_ctx);
        lower_program(llvm_ctx, &module, program)?;
        self.dump(&module, UNOPTIMISED_BITCODE);
        module.verify().or_else(|err| verify_err!("{err}"))?;
        log::trace!("lowered module verified");
        Ok(module)
    }

    fn optimize(&self, module: &LLVMModule) -> Result<()> {
        let options = PassBuilderOptions::default();
        options.set_inliner_threshold(INLINER_THRESHOLD);
        llvm_run_passes(module, OPT_PIPELINE, &options)
            .map_err(|err| backend_error!("Optimization failed: {err}"))?;
        log::trace!("module optimized with {OPT_PIPELINE}");
        self.dump(module, OPTIMISED_BITCODE);
        Ok(())
    }

    /// Write `module` to `filename`, if enabled. Failing to write
    /// is not fatal.
    fn dump(&self, module: &LLVMModule, filename: &str) {
        if !self.config.dump_bitcode {
            return;
        }
        match module.bitcode_to_file(filename) {
            Ok(()) => log::info!("wrote bitcode to {filename}"),
            Err(err) => log::warn!("{err}, skipping"),
        }
    }

    /// The textual IR of `program`, before optimization.
    pub fn lower_to_ir(&self, program: &Program) -> Result<String> {
        let llvm_ctx = LLVMContext::default();
        let module = self.build_module(&llvm_ctx, program)?;
        Ok(llvm_print_module_to_string(&module).unwrap_or_default())
    }

    /// The textual IR of `program`, after optimization.
    pub fn optimized_ir(&self, program: &Program) -> Result<String> {
        let llvm_ctx = LLVMContext::default();
        let module = self.build_module(&llvm_ctx, program)?;
        self.optimize(&module)?;
        Ok(llvm_print_module_to_string(&module).unwrap_or_default())
    }

    /// Compile and run `program`. Printed values go to standard
    /// output through the C library.
    pub fn run(&self, program: &Program) -> Result<()> {
        log::info!("compiling program with {} functions", program.functions.len());
        // Declared first, so that it outlives the engine owning the module.
        let llvm_ctx = LLVMContext::default();
        let module = self.build_module(&llvm_ctx, program)?;
        self.optimize(&module)?;

        ExecutionEngine::link_in_mcjit();
        initialize_native().or_else(|err| backend_err!("{err}"))?;
        let options = MCJITCompilerOptions::default().with_opt_level(CODEGEN_OPT_LEVEL);
        let engine = ExecutionEngine::new_mcjit_for_module(module, options)
            .or_else(|err| backend_err!("Failed to create JIT compiler: {err}"))?;

        log::trace!("running {ENTRY_SYMBOL}");
        // The entry function was generated from a verified module,
        // with type `void ()`.
        let result = unsafe { engine.run_void_function(ENTRY_SYMBOL) };
        result.or_else(|err| backend_err!("{err}"))
    }
}
