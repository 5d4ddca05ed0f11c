//! Safe(r) wrappers around llvm_sys::transforms::pass_builder

use std::ptr;

use llvm_sys::{
    error::{LLVMDisposeErrorMessage, LLVMGetErrorMessage},
    transforms::pass_builder::{
        LLVMCreatePassBuilderOptions, LLVMDisposePassBuilderOptions, LLVMPassBuilderOptionsRef,
        LLVMPassBuilderOptionsSetInlinerThreshold, LLVMPassBuilderOptionsSetVerifyEach,
        LLVMRunPasses,
    },
};

use crate::llvm_sys::{core::LLVMModule, cstr_to_string, to_c_str};

/// RAII wrapper around [LLVMPassBuilderOptionsRef]
pub struct PassBuilderOptions(LLVMPassBuilderOptionsRef);

impl Default for PassBuilderOptions {
    fn default() -> Self {
        PassBuilderOptions(unsafe { LLVMCreatePassBuilderOptions() })
    }
}

impl Drop for PassBuilderOptions {
    fn drop(&mut self) {
        unsafe { LLVMDisposePassBuilderOptions(self.0) }
    }
}

impl PassBuilderOptions {
    /// Inlining threshold of the inliner pass.
    pub fn set_inliner_threshold(&self, threshold: i32) {
        unsafe { LLVMPassBuilderOptionsSetInlinerThreshold(self.0, threshold) }
    }

    /// Run the verifier after each pass.
    pub fn set_verify_each(&self, verify_each: bool) {
        unsafe { LLVMPassBuilderOptionsSetVerifyEach(self.0, verify_each.into()) }
    }
}

/// LLVMRunPasses, with no target machine.
/// `passes` is a pipeline description, such as `default<O3>`.
pub fn llvm_run_passes(
    module: &LLVMModule,
    passes: &str,
    options: &PassBuilderOptions,
) -> Result<(), String> {
    let err = unsafe {
        LLVMRunPasses(
            module.inner_ref(),
            to_c_str(passes).as_ptr(),
            ptr::null_mut(),
            options.0,
        )
    };
    if err.is_null() {
        return Ok(());
    }
    unsafe {
        // Consumes `err`.
        let msg = LLVMGetErrorMessage(err);
        let result = cstr_to_string(msg).unwrap_or_else(|| "Unknown pass pipeline error".into());
        LLVMDisposeErrorMessage(msg);
        Err(result)
    }
}

#[cfg(test)]
mod tests {
    use super::{llvm_run_passes, PassBuilderOptions};
    use crate::llvm_sys::core::{
        llvm_add_function, llvm_append_basic_block_in_context, llvm_build_add, llvm_build_ret,
        llvm_const_int, llvm_function_type, llvm_get_param, llvm_int_type_in_context,
        llvm_position_builder_at_end, llvm_print_module_to_string, llvm_set_value_name,
        LLVMBuilder, LLVMContext, LLVMModule,
    };

    #[test]
    fn add_zero_is_simplified() {
        let context = LLVMContext::default();
        let module = LLVMModule::new("test_module", &context);
        let builder = LLVMBuilder::new(&context);
        let i64_ty = llvm_int_type_in_context(&context, 64);
        let func = llvm_add_function(&module, "id", llvm_function_type(i64_ty, &[i64_ty], false));
        llvm_set_value_name(llvm_get_param(func, 0), "x");
        let entry = llvm_append_basic_block_in_context(&context, func, "entry");
        llvm_position_builder_at_end(&builder, entry);
        let sum = llvm_build_add(
            &builder,
            llvm_get_param(func, 0),
            llvm_const_int(i64_ty, 0, false),
            "sum",
        );
        llvm_build_ret(&builder, sum);

        let options = PassBuilderOptions::default();
        options.set_inliner_threshold(225);
        options.set_verify_each(true);
        llvm_run_passes(&module, "default<O3>", &options).unwrap();
        let ir = llvm_print_module_to_string(&module).unwrap();
        assert!(ir.contains("ret i64 %x"), "{ir}");
        assert!(!ir.contains("%sum"), "{ir}");
    }

    #[test]
    fn unknown_pipeline() {
        let context = LLVMContext::default();
        let module = LLVMModule::new("test_module", &context);
        let options = PassBuilderOptions::default();
        assert!(llvm_run_passes(&module, "no-such-pass", &options).is_err());
    }
}
