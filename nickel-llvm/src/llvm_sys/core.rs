//! Safe wrappers around llvm_sys::core.

use std::ptr;

use llvm_sys::{
    analysis::{LLVMVerifierFailureAction, LLVMVerifyModule},
    bit_writer::LLVMWriteBitcodeToFile,
    core::{
        LLVMAddFunction, LLVMAddIncoming, LLVMAppendBasicBlockInContext, LLVMBuildAdd,
        LLVMBuildAnd, LLVMBuildBr, LLVMBuildCall2, LLVMBuildCondBr, LLVMBuildGlobalString,
        LLVMBuildICmp, LLVMBuildMul, LLVMBuildPhi, LLVMBuildRet, LLVMBuildRetVoid, LLVMBuildShl, LLVMBuildSub,
        LLVMBuildZExt, LLVMConstInt, LLVMContextCreate, LLVMContextDispose, LLVMCountParams,
        LLVMCreateBuilderInContext, LLVMDisposeMessage, LLVMDisposeModule, LLVMFunctionType,
        LLVMGetFirstParam, LLVMGetInsertBlock, LLVMGetNextParam, LLVMGetParam, LLVMGetTypeKind,
        LLVMGetValueName2, LLVMIntTypeInContext, LLVMIsAArgument, LLVMIsAFunction, LLVMIsAPHINode,
        LLVMModuleCreateWithNameInContext, LLVMPointerTypeInContext, LLVMPositionBuilderAtEnd,
        LLVMPrintModuleToString, LLVMSetValueName2, LLVMVoidTypeInContext,
    },
    prelude::{
        LLVMBasicBlockRef, LLVMBuilderRef, LLVMContextRef, LLVMModuleRef, LLVMTypeRef,
        LLVMValueRef,
    },
    LLVMIntPredicate, LLVMTypeKind,
};

use crate::llvm_sys::{cstr_to_string, sized_cstr_to_string, to_c_str};

/// Opaque wrapper around LLVMValueRef to hide the raw pointer
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LLVMValue(LLVMValueRef);

impl From<LLVMValueRef> for LLVMValue {
    fn from(value: LLVMValueRef) -> Self {
        LLVMValue(value)
    }
}

impl From<LLVMValue> for LLVMValueRef {
    fn from(value: LLVMValue) -> Self {
        value.0
    }
}

/// Opaque wrapper around LLVMTypeRef to hide the raw pointer
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LLVMType(LLVMTypeRef);

impl From<LLVMTypeRef> for LLVMType {
    fn from(ty: LLVMTypeRef) -> Self {
        LLVMType(ty)
    }
}

impl From<LLVMType> for LLVMTypeRef {
    fn from(ty: LLVMType) -> Self {
        ty.0
    }
}

// We wrap LLVMContext in a module to limit its visibility for constructing
mod llvm_context {
    use super::*;

    /// Managed LLVMContext
    pub struct LLVMContext(LLVMContextRef);

    impl Default for LLVMContext {
        fn default() -> Self {
            unsafe { LLVMContext(LLVMContextCreate()) }
        }
    }

    impl Drop for LLVMContext {
        fn drop(&mut self) {
            unsafe { LLVMContextDispose(self.0) }
        }
    }

    impl LLVMContext {
        pub(crate) fn inner_ref(&self) -> LLVMContextRef {
            self.0
        }
    }
}
pub use llvm_context::LLVMContext;

/// Opaque wrapper around LLVMBasicBlockRef to hide the raw pointer
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LLVMBasicBlock(LLVMBasicBlockRef);

impl From<LLVMBasicBlockRef> for LLVMBasicBlock {
    fn from(block: LLVMBasicBlockRef) -> Self {
        LLVMBasicBlock(block)
    }
}

impl From<LLVMBasicBlock> for LLVMBasicBlockRef {
    fn from(block: LLVMBasicBlock) -> Self {
        block.0
    }
}

mod llvm_builder {

    use llvm_sys::core::LLVMDisposeBuilder;

    use super::*;
    /// Managed LLVMBuilder.
    pub struct LLVMBuilder(LLVMBuilderRef);

    impl LLVMBuilder {
        /// Create a new LLVMBuilder in the given context.
        pub fn new(context: &LLVMContext) -> Self {
            unsafe { LLVMBuilder(LLVMCreateBuilderInContext(context.inner_ref())) }
        }

        /// Get the inner LLVMBuilderRef
        pub(crate) fn inner_ref(&self) -> LLVMBuilderRef {
            self.0
        }
    }

    impl Drop for LLVMBuilder {
        fn drop(&mut self) {
            unsafe { LLVMDisposeBuilder(self.0) }
        }
    }
}

pub use llvm_builder::LLVMBuilder;

/// LLVMPrintModuleToString
pub fn llvm_print_module_to_string(module: &LLVMModule) -> Option<String> {
    let buf_ptr = unsafe { LLVMPrintModuleToString(module.inner_ref()) };
    if buf_ptr.is_null() {
        return None;
    }
    let result = cstr_to_string(buf_ptr);
    unsafe { LLVMDisposeMessage(buf_ptr) };
    result
}

/// LLVMGetValueName2
pub fn llvm_get_value_name(val: LLVMValue) -> Option<String> {
    let mut len = 0;
    let buf_ptr = unsafe { LLVMGetValueName2(val.into(), &mut len) };
    if buf_ptr.is_null() {
        return None;
    }
    sized_cstr_to_string(buf_ptr, len)
}

/// LLVMSetValueName2
pub fn llvm_set_value_name(val: LLVMValue, name: &str) {
    unsafe { LLVMSetValueName2(val.into(), name.as_ptr() as *const _, name.len()) }
}

/// The family of LLVMIsA* functions for Value
pub mod llvm_is_a {
    use super::*;

    /// LLVMIsAFunction
    pub fn function(val: LLVMValue) -> bool {
        unsafe { !LLVMIsAFunction(val.into()).is_null() }
    }

    /// LLVMIsAPHINode
    pub fn phi_node(val: LLVMValue) -> bool {
        unsafe { !LLVMIsAPHINode(val.into()).is_null() }
    }

    /// LLVMIsAArgument
    pub fn argument(val: LLVMValue) -> bool {
        unsafe { !LLVMIsAArgument(val.into()).is_null() }
    }
}

/// LLVMGetTypeKind
pub fn llvm_get_type_kind(ty: LLVMType) -> LLVMTypeKind {
    unsafe { LLVMGetTypeKind(ty.into()) }
}

/// LLVMCountParams
pub fn llvm_count_params(func: LLVMValue) -> u32 {
    assert!(llvm_is_a::function(func));
    unsafe { LLVMCountParams(func.into()) }
}

/// LLVMGetFirstParam
pub fn llvm_get_first_param(func: LLVMValue) -> Option<LLVMValue> {
    assert!(llvm_is_a::function(func));
    unsafe {
        let first_param = LLVMGetFirstParam(func.into());
        (!first_param.is_null()).then_some(first_param.into())
    }
}

/// LLVMGetNextParam
pub fn llvm_get_next_param(val: LLVMValue) -> Option<LLVMValue> {
    assert!(llvm_is_a::argument(val));
    unsafe {
        let next_param = LLVMGetNextParam(val.into());
        (!next_param.is_null()).then_some(next_param.into())
    }
}

/// Iterate over all `Parameters`s of a `Function`.
pub struct ParamIter(pub Option<LLVMValue>);

impl Iterator for ParamIter {
    type Item = LLVMValue;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(param) = self.0 {
            self.0 = llvm_get_next_param(param);
            Some(param)
        } else {
            None
        }
    }
}

/// Get an iterator over the parameters of a function.
pub fn param_iter(func: LLVMValue) -> ParamIter {
    assert!(llvm_is_a::function(func));
    ParamIter(llvm_get_first_param(func))
}

/// LLVMGetParam
pub fn llvm_get_param(func: LLVMValue, idx: u32) -> LLVMValue {
    assert!(idx < llvm_count_params(func));
    unsafe { LLVMGetParam(func.into(), idx).into() }
}

/// LLVMGetInsertBlock
pub fn llvm_get_insert_block(builder: &LLVMBuilder) -> Option<LLVMBasicBlock> {
    unsafe {
        let insert_block = LLVMGetInsertBlock(builder.inner_ref());
        (!insert_block.is_null()).then_some(insert_block.into())
    }
}

/// LLVMPositionBuilderAtEnd
pub fn llvm_position_builder_at_end(builder: &LLVMBuilder, block: LLVMBasicBlock) {
    unsafe { LLVMPositionBuilderAtEnd(builder.inner_ref(), block.into()) }
}

/// LLVMIntTypeInContext
pub fn llvm_int_type_in_context(context: &LLVMContext, width: u32) -> LLVMType {
    unsafe { LLVMIntTypeInContext(context.inner_ref(), width).into() }
}

/// LLVMVoidTypeInContext
pub fn llvm_void_type_in_context(context: &LLVMContext) -> LLVMType {
    unsafe { LLVMVoidTypeInContext(context.inner_ref()).into() }
}

/// LLVMPointerTypeInContext
pub fn llvm_pointer_type_in_context(context: &LLVMContext, addr_space: u32) -> LLVMType {
    unsafe { LLVMPointerTypeInContext(context.inner_ref(), addr_space).into() }
}

/// isFirstClassType
pub fn llvm_is_first_class_type(ty: LLVMType) -> bool {
    !matches!(
        llvm_get_type_kind(ty),
        LLVMTypeKind::LLVMVoidTypeKind | LLVMTypeKind::LLVMFunctionTypeKind
    )
}

/// FunctionType::isValidReturnType
pub fn llvm_is_valid_function_return_type(ret_ty: LLVMType) -> bool {
    !matches!(
        llvm_get_type_kind(ret_ty),
        LLVMTypeKind::LLVMLabelTypeKind
            | LLVMTypeKind::LLVMFunctionTypeKind
            | LLVMTypeKind::LLVMMetadataTypeKind
    )
}

/// LLVMFunctionType
pub fn llvm_function_type(ret_ty: LLVMType, param_tys: &[LLVMType], is_var_arg: bool) -> LLVMType {
    assert!(llvm_is_valid_function_return_type(ret_ty));
    assert!(param_tys
        .iter()
        .all(|param_ty| llvm_is_first_class_type(*param_ty)));
    let mut param_tys: Vec<_> = param_tys.iter().cloned().map(Into::into).collect();
    unsafe {
        LLVMFunctionType(
            ret_ty.into(),
            param_tys.as_mut_ptr(),
            param_tys.len().try_into().unwrap(),
            is_var_arg as i32,
        )
        .into()
    }
}

/// LLVMBuildAdd
pub fn llvm_build_add(
    builder: &LLVMBuilder,
    lhs: LLVMValue,
    rhs: LLVMValue,
    name: &str,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildAdd(
            builder.inner_ref(),
            lhs.into(),
            rhs.into(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMBuildSub
pub fn llvm_build_sub(
    builder: &LLVMBuilder,
    lhs: LLVMValue,
    rhs: LLVMValue,
    name: &str,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildSub(
            builder.inner_ref(),
            lhs.into(),
            rhs.into(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMBuildMul
pub fn llvm_build_mul(
    builder: &LLVMBuilder,
    lhs: LLVMValue,
    rhs: LLVMValue,
    name: &str,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildMul(
            builder.inner_ref(),
            lhs.into(),
            rhs.into(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMBuildAnd
pub fn llvm_build_and(
    builder: &LLVMBuilder,
    lhs: LLVMValue,
    rhs: LLVMValue,
    name: &str,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildAnd(
            builder.inner_ref(),
            lhs.into(),
            rhs.into(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMBuildShl
pub fn llvm_build_shl(
    builder: &LLVMBuilder,
    lhs: LLVMValue,
    rhs: LLVMValue,
    name: &str,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildShl(
            builder.inner_ref(),
            lhs.into(),
            rhs.into(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMBuildZExt
pub fn llvm_build_zext(
    builder: &LLVMBuilder,
    val: LLVMValue,
    dest_ty: LLVMType,
    name: &str,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildZExt(
            builder.inner_ref(),
            val.into(),
            dest_ty.into(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMBuildICmp
pub fn llvm_build_icmp(
    builder: &LLVMBuilder,
    op: LLVMIntPredicate,
    lhs: LLVMValue,
    rhs: LLVMValue,
    name: &str,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildICmp(
            builder.inner_ref(),
            op,
            lhs.into(),
            rhs.into(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMAddIncoming
pub fn llvm_add_incoming(
    phi_node: LLVMValue,
    incoming_values: &[LLVMValue],
    incoming_blocks: &[LLVMBasicBlock],
) {
    assert!(llvm_is_a::phi_node(phi_node));
    assert!(incoming_values.len() == incoming_blocks.len());
    let mut incoming_values: Vec<LLVMValueRef> =
        incoming_values.iter().cloned().map(Into::into).collect();
    let mut incoming_blocks: Vec<_> = incoming_blocks.iter().cloned().map(Into::into).collect();
    unsafe {
        LLVMAddIncoming(
            phi_node.into(),
            incoming_values.as_mut_ptr(),
            incoming_blocks.as_mut_ptr(),
            incoming_blocks.len().try_into().unwrap(),
        )
    }
}

/// LLVMBuildCondBr
pub fn llvm_build_cond_br(
    builder: &LLVMBuilder,
    if_val: LLVMValue,
    then_block: LLVMBasicBlock,
    else_block: LLVMBasicBlock,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildCondBr(
            builder.inner_ref(),
            if_val.into(),
            then_block.into(),
            else_block.into(),
        )
        .into()
    }
}

/// LLVMBuildBr
pub fn llvm_build_br(builder: &LLVMBuilder, dest: LLVMBasicBlock) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe { LLVMBuildBr(builder.inner_ref(), dest.into()).into() }
}

/// LLVMBuildRetVoid
pub fn llvm_build_ret_void(builder: &LLVMBuilder) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe { LLVMBuildRetVoid(builder.inner_ref()).into() }
}

/// LLVMBuildRet
pub fn llvm_build_ret(builder: &LLVMBuilder, val: LLVMValue) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe { LLVMBuildRet(builder.inner_ref(), val.into()).into() }
}

/// LLVMBuildPhi
pub fn llvm_build_phi(builder: &LLVMBuilder, ty: LLVMType, name: &str) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe { LLVMBuildPhi(builder.inner_ref(), ty.into(), to_c_str(name).as_ptr()).into() }
}

/// LLVMBuildCall2
pub fn llvm_build_call2(
    builder: &LLVMBuilder,
    ty: LLVMType,
    callee: LLVMValue,
    args: &[LLVMValue],
    name: &str,
) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    assert!(llvm_get_type_kind(ty) == LLVMTypeKind::LLVMFunctionTypeKind);
    let mut args: Vec<_> = args.iter().cloned().map(Into::into).collect();
    unsafe {
        LLVMBuildCall2(
            builder.inner_ref(),
            ty.into(),
            callee.into(),
            args.as_mut_ptr(),
            args.len().try_into().unwrap(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMBuildGlobalString: a private, null terminated constant
/// holding `s`, in the module of the builder's insert block.
pub fn llvm_build_global_string(builder: &LLVMBuilder, s: &str, name: &str) -> LLVMValue {
    assert!(llvm_get_insert_block(builder).is_some());
    unsafe {
        LLVMBuildGlobalString(
            builder.inner_ref(),
            to_c_str(s).as_ptr(),
            to_c_str(name).as_ptr(),
        )
        .into()
    }
}

/// LLVMConstInt
pub fn llvm_const_int(int_ty: LLVMType, val: u64, sign_extend: bool) -> LLVMValue {
    assert!(llvm_get_type_kind(int_ty) == LLVMTypeKind::LLVMIntegerTypeKind);
    unsafe { LLVMConstInt(int_ty.into(), val, sign_extend as i32).into() }
}

/// LLVMAddFunction
pub fn llvm_add_function(module: &LLVMModule, name: &str, fn_ty: LLVMType) -> LLVMValue {
    assert!(llvm_get_type_kind(fn_ty) == LLVMTypeKind::LLVMFunctionTypeKind);
    unsafe { LLVMAddFunction(module.inner_ref(), to_c_str(name).as_ptr(), fn_ty.into()).into() }
}

/// LLVMAppendBasicBlockInContext
pub fn llvm_append_basic_block_in_context(
    context: &LLVMContext,
    func: LLVMValue,
    name: &str,
) -> LLVMBasicBlock {
    assert!(llvm_is_a::function(func));
    unsafe {
        LLVMAppendBasicBlockInContext(context.inner_ref(), func.into(), to_c_str(name).as_ptr())
            .into()
    }
}

// We wrap LLVMModule in a module to limit its visibility for constructing
mod llvm_module {
    use super::*;

    /// RAII wrapper around LLVMModuleRef
    pub struct LLVMModule(LLVMModuleRef);

    impl Drop for LLVMModule {
        fn drop(&mut self) {
            unsafe { LLVMDisposeModule(self.0) }
        }
    }

    impl LLVMModule {
        pub fn new(module_id: &str, context: &LLVMContext) -> Self {
            Self(unsafe {
                LLVMModuleCreateWithNameInContext(to_c_str(module_id).as_ptr(), context.inner_ref())
            })
        }

        /// Print this [LLVMModule] to a bitcode file
        pub fn bitcode_to_file(&self, filename: &str) -> Result<(), String> {
            unsafe {
                if LLVMWriteBitcodeToFile(self.0, to_c_str(filename).as_ptr()) == 0 {
                    Ok(())
                } else {
                    Err(format!("Error writing bitcode to file {filename}"))
                }
            }
        }

        /// Verify this module
        pub fn verify(&self) -> Result<(), String> {
            let mut err_str = ptr::null_mut();
            let return_code = unsafe {
                LLVMVerifyModule(
                    self.0,
                    LLVMVerifierFailureAction::LLVMReturnStatusAction,
                    &mut err_str,
                )
            };
            let message = cstr_to_string(err_str);
            if !err_str.is_null() {
                unsafe { LLVMDisposeMessage(err_str) };
            }
            if return_code == 1 {
                return Err(message.unwrap_or_else(|| "Module verification failed".into()));
            }
            Ok(())
        }

        ///  Get internal reference
        pub(crate) fn inner_ref(&self) -> LLVMModuleRef {
            self.0
        }
    }
}

pub use llvm_module::LLVMModule;

#[cfg(test)]
mod tests {
    use llvm_sys::LLVMIntPredicate;

    use super::*;

    #[test]
    fn build_and_verify() {
        let context = LLVMContext::default();
        let module = LLVMModule::new("test_module", &context);
        let builder = LLVMBuilder::new(&context);
        let i64_ty = llvm_int_type_in_context(&context, 64);

        let fn_ty = llvm_function_type(i64_ty, &[i64_ty, i64_ty], false);
        let func = llvm_add_function(&module, "le", fn_ty);
        for (param, name) in param_iter(func).zip(["a", "b"]) {
            llvm_set_value_name(param, name);
        }
        assert_eq!(llvm_count_params(func), 2);
        assert_eq!(llvm_get_value_name(llvm_get_param(func, 1)).as_deref(), Some("b"));

        let entry = llvm_append_basic_block_in_context(&context, func, "entry");

        llvm_position_builder_at_end(&builder, entry);
        let cmp = llvm_build_icmp(
            &builder,
            LLVMIntPredicate::LLVMIntSLE,
            llvm_get_param(func, 0),
            llvm_get_param(func, 1),
            "cmp",
        );
        let res = llvm_build_zext(&builder, cmp, i64_ty, "res");
        llvm_build_ret(&builder, res);

        assert!(module.verify().is_ok());

        let ir = llvm_print_module_to_string(&module).unwrap();
        assert!(ir.contains("define i64 @le(i64 %a, i64 %b)"), "{ir}");
        assert!(ir.contains("icmp sle i64 %a, %b"), "{ir}");
        assert!(ir.contains("zext i1 %cmp to i64"), "{ir}");
    }

    #[test]
    fn missing_terminator_fails_verification() {
        let context = LLVMContext::default();
        let module = LLVMModule::new("test_module", &context);
        let fn_ty = llvm_function_type(llvm_void_type_in_context(&context), &[], false);
        let func = llvm_add_function(&module, "f", fn_ty);
        llvm_append_basic_block_in_context(&context, func, "entry");

        let err = module.verify().unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    #[should_panic]
    fn build_without_insert_block() {
        let context = LLVMContext::default();
        let builder = LLVMBuilder::new(&context);
        let i64_ty = llvm_int_type_in_context(&context, 64);
        let one = llvm_const_int(i64_ty, 1, false);
        llvm_build_add(&builder, one, one, "sum");
    }
}
