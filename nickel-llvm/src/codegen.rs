//! Lowering of nickel programs to LLVM IR.
//!
//! Every function becomes `i64 @name(i64 %param, ...)`, its parameters
//! named after the source. Lowering runs in two passes over the function
//! table: all functions are declared first, so that bodies can call any
//! function regardless of definition order, and then defined.
//! The main expression is lowered into `void @__anon_tl()`.

use llvm_sys::LLVMIntPredicate;
use rustc_hash::FxHashMap;

use nickel::{
    ast::{BinaryOp, Expr, Program},
    environment::MAIN_FRAME_OWNER,
    function_table::{check_arity, FunctionTable, LookupErr, ENTRY_SYMBOL, PRINTF_SYMBOL},
    identifier::Identifier,
    invalid_program_err,
    result::Result,
};

use crate::llvm_sys::core::{
    llvm_add_function, llvm_add_incoming, llvm_append_basic_block_in_context, llvm_build_add,
    llvm_build_and, llvm_build_br, llvm_build_call2, llvm_build_cond_br,
    llvm_build_global_string, llvm_build_icmp, llvm_build_mul, llvm_build_phi, llvm_build_ret,
    llvm_build_ret_void, llvm_build_shl, llvm_build_sub, llvm_build_zext, llvm_const_int, llvm_function_type,
    llvm_get_insert_block, llvm_get_value_name, llvm_int_type_in_context,
    llvm_pointer_type_in_context, llvm_position_builder_at_end, llvm_set_value_name,
    llvm_void_type_in_context, param_iter, LLVMBasicBlock, LLVMBuilder, LLVMContext, LLVMModule,
    LLVMType, LLVMValue,
};

/// The `printf` format `print` uses.
pub const PRINT_FORMAT: &str = "%ld\n";

/// A function added to the module.
#[derive(Clone, Copy)]
struct DeclaredFunction {
    value: LLVMValue,
    ty: LLVMType,
    arity: usize,
}

/// The function whose body is being lowered.
#[derive(Clone, Copy)]
struct Scope<'p> {
    func: LLVMValue,
    /// Source name of the function, for diagnostics.
    owner: &'p str,
}

/// State for lowering one [Program] into one [LLVMModule].
pub struct CodegenContext<'a, 'p> {
    llvm_ctx: &'a LLVMContext,
    module: &'a LLVMModule,
    // The active LLVM builder.
    builder: LLVMBuilder,
    i64_ty: LLVMType,
    // User functions, by source name.
    functions: FxHashMap<&'p str, DeclaredFunction>,
    printf: DeclaredFunction,
    // The global holding [PRINT_FORMAT], created by the first `print`.
    print_format: Option<LLVMValue>,
}

impl<'a, 'p> CodegenContext<'a, 'p> {
    /// Prepare to lower into `module`, declaring `printf` in it.
    pub fn new(llvm_ctx: &'a LLVMContext, module: &'a LLVMModule) -> Self {
        let i64_ty = llvm_int_type_in_context(llvm_ctx, 64);
        let printf_ty = llvm_function_type(
            llvm_int_type_in_context(llvm_ctx, 32),
            &[llvm_pointer_type_in_context(llvm_ctx, 0)],
            true,
        );
        let printf = DeclaredFunction {
            value: llvm_add_function(module, PRINTF_SYMBOL, printf_ty),
            ty: printf_ty,
            arity: 1,
        };
        CodegenContext {
            llvm_ctx,
            module,
            builder: LLVMBuilder::new(llvm_ctx),
            i64_ty,
            functions: FxHashMap::default(),
            printf,
            print_format: None,
        }
    }

    /// Add every function of `table` to the module, without a body.
    pub fn declare_functions(&mut self, table: &FunctionTable<'p>) {
        for func in table.iter() {
            let param_tys = vec![self.i64_ty; func.arity()];
            let ty = llvm_function_type(self.i64_ty, &param_tys, false);
            let value = llvm_add_function(self.module, &func.name, ty);
            for (param, name) in param_iter(value).zip(&func.params) {
                llvm_set_value_name(param, name);
            }
            self.functions.insert(
                func.name.as_str(),
                DeclaredFunction {
                    value,
                    ty,
                    arity: func.arity(),
                },
            );
        }
        log::debug!("declared {} functions", table.len());
    }

    /// Lower the body of every function in `table`.
    /// [CodegenContext::declare_functions] must have run first.
    pub fn define_functions(&mut self, table: &FunctionTable<'p>) -> Result<()> {
        for func in table.iter() {
            let declared = *self
                .functions
                .get(func.name.as_str())
                .expect("functions are declared before they are defined");
            let entry = llvm_append_basic_block_in_context(self.llvm_ctx, declared.value, "entry");
            llvm_position_builder_at_end(&self.builder, entry);

            let scope = Scope {
                func: declared.value,
                owner: func.name.as_str(),
            };
            let result = self.lower_expr(scope, &func.body)?;
            llvm_build_ret(&self.builder, result);
            log::trace!("defined function {}", func.name);
        }
        Ok(())
    }

    /// Lower `main` into the body of a new `void` function named [ENTRY_SYMBOL].
    pub fn define_entry(&mut self, main: &'p Expr) -> Result<()> {
        let ty = llvm_function_type(llvm_void_type_in_context(self.llvm_ctx), &[], false);
        let func = llvm_add_function(self.module, ENTRY_SYMBOL, ty);
        let entry = llvm_append_basic_block_in_context(self.llvm_ctx, func, "entry");
        llvm_position_builder_at_end(&self.builder, entry);

        let scope = Scope {
            func,
            owner: MAIN_FRAME_OWNER,
        };
        self.lower_expr(scope, main)?;
        llvm_build_ret_void(&self.builder);
        Ok(())
    }

    fn insert_block(&self) -> LLVMBasicBlock {
        llvm_get_insert_block(&self.builder).expect("builder is positioned while lowering")
    }

    fn print_format(&mut self) -> LLVMValue {
        *self
            .print_format
            .get_or_insert_with(|| llvm_build_global_string(&self.builder, PRINT_FORMAT, "format"))
    }

    /// The parameter of the current function named `name`.
    fn lower_variable(&self, scope: Scope<'p>, name: &Identifier) -> Result<LLVMValue> {
        match param_iter(scope.func)
            .find(|param| llvm_get_value_name(*param).as_deref() == Some(name.as_str()))
        {
            Some(param) => Ok(param),
            None => invalid_program_err!(LookupErr::UnresolvedVariable {
                var: name.to_string(),
                func: scope.owner.to_string(),
            }),
        }
    }

    /// Compare, widening the `i1` result to 0 or 1.
    fn lower_comparison(
        &self,
        pred: LLVMIntPredicate,
        lhs: LLVMValue,
        rhs: LLVMValue,
    ) -> LLVMValue {
        let cmp = llvm_build_icmp(&self.builder, pred, lhs, rhs, "cmp");
        llvm_build_zext(&self.builder, cmp, self.i64_ty, "cmp_ext")
    }

    /// Shift by the amount modulo 64. A bare `shl` by 64 or more is poison.
    fn lower_shift_left(&self, lhs: LLVMValue, rhs: LLVMValue) -> LLVMValue {
        let mask = llvm_const_int(self.i64_ty, 63, false);
        let amount = llvm_build_and(&self.builder, rhs, mask, "shamt");
        llvm_build_shl(&self.builder, lhs, amount, "shl")
    }

    /// Emit code computing `expr` at the builder's position.
    fn lower_expr(&mut self, scope: Scope<'p>, expr: &'p Expr) -> Result<LLVMValue> {
        match expr {
            Expr::Literal(value) => Ok(llvm_const_int(self.i64_ty, *value, false)),
            Expr::Variable(name) => self.lower_variable(scope, name),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(scope, lhs)?;
                let rhs = self.lower_expr(scope, rhs)?;
                Ok(match op {
                    BinaryOp::Add => llvm_build_add(&self.builder, lhs, rhs, "add"),
                    BinaryOp::Multiply => llvm_build_mul(&self.builder, lhs, rhs, "mul"),
                    BinaryOp::ShiftLeft => self.lower_shift_left(lhs, rhs),
                    BinaryOp::Subtract => llvm_build_sub(&self.builder, lhs, rhs, "sub"),
                    BinaryOp::LessOrEqual => {
                        self.lower_comparison(LLVMIntPredicate::LLVMIntSLE, lhs, rhs)
                    }
                    BinaryOp::Equal => self.lower_comparison(LLVMIntPredicate::LLVMIntEQ, lhs, rhs),
                })
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let cond = self.lower_expr(scope, cond)?;
                let then_block = llvm_append_basic_block_in_context(self.llvm_ctx, scope.func, "then");
                let else_block = llvm_append_basic_block_in_context(self.llvm_ctx, scope.func, "else");
                let merge_block =
                    llvm_append_basic_block_in_context(self.llvm_ctx, scope.func, "merge");

                let zero = llvm_const_int(self.i64_ty, 0, false);
                let nonzero =
                    llvm_build_icmp(&self.builder, LLVMIntPredicate::LLVMIntNE, cond, zero, "nz");
                llvm_build_cond_br(&self.builder, nonzero, then_block, else_block);

                // Lowering a branch may move the builder to a new block,
                // so the phi's predecessors are wherever each branch ended.
                llvm_position_builder_at_end(&self.builder, then_block);
                let then_value = self.lower_expr(scope, then_expr)?;
                llvm_build_br(&self.builder, merge_block);
                let then_end = self.insert_block();

                llvm_position_builder_at_end(&self.builder, else_block);
                let else_value = self.lower_expr(scope, else_expr)?;
                llvm_build_br(&self.builder, merge_block);
                let else_end = self.insert_block();

                llvm_position_builder_at_end(&self.builder, merge_block);
                let phi = llvm_build_phi(&self.builder, self.i64_ty, "conditional");
                llvm_add_incoming(phi, &[then_value, else_value], &[then_end, else_end]);
                Ok(phi)
            }
            Expr::Print(body) => {
                let value = self.lower_expr(scope, body)?;
                let format = self.print_format();
                llvm_build_call2(
                    &self.builder,
                    self.printf.ty,
                    self.printf.value,
                    &[format, value],
                    "printf",
                );
                Ok(value)
            }
            Expr::Call { callee, args } => {
                let Some(&target) = self.functions.get(callee.as_str()) else {
                    return invalid_program_err!(LookupErr::UnresolvedFunction(callee.to_string()));
                };
                check_arity(callee, target.arity, args.len())?;
                let args = args
                    .iter()
                    .map(|arg| self.lower_expr(scope, arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(llvm_build_call2(
                    &self.builder,
                    target.ty,
                    target.value,
                    &args,
                    "call",
                ))
            }
        }
    }
}

/// Lower `program` into `module`: declare every function, define them,
/// then define the entry function. Ill-formed programs are rejected
/// exactly as the interpreter rejects them.
pub fn lower_program(llvm_ctx: &LLVMContext, module: &LLVMModule, program: &Program) -> Result<()> {
    let table = FunctionTable::new(program)?;
    let cctx = &mut CodegenContext::new(llvm_ctx, module);
    cctx.declare_functions(&table);
    cctx.define_functions(&table)?;
    cctx.define_entry(&program.main)
}

#[cfg(test)]
mod tests {
    use nickel::{
        ast::{BinaryOp, Expr, Function, Program},
        function_table::{FunctionTableErr, LookupErr},
        result::ErrorKind,
    };

    use super::lower_program;
    use crate::llvm_sys::core::{llvm_print_module_to_string, LLVMContext, LLVMModule};

    fn lower(program: &Program) -> nickel::result::Result<String> {
        let llvm_ctx = LLVMContext::default();
        let module = LLVMModule::new("test_module", &llvm_ctx);
        lower_program(&llvm_ctx, &module, program)?;
        module.verify().expect("lowered module verifies");
        Ok(llvm_print_module_to_string(&module).unwrap())
    }

    #[test]
    fn functions_take_named_i64_params() {
        let add = Function::new(
            "add",
            vec!["a".into(), "b".into()],
            Expr::binary(BinaryOp::Add, Expr::variable("a"), Expr::variable("b")),
        );
        let program = Program::new(
            vec![add],
            Expr::call("add", vec![Expr::literal(2), Expr::literal(3)]),
        );
        let ir = lower(&program).unwrap();
        assert!(ir.contains("define i64 @add(i64 %a, i64 %b)"), "{ir}");
        assert!(ir.contains("define void @__anon_tl()"), "{ir}");
        assert!(ir.contains("declare i32 @printf(ptr, ...)"), "{ir}");
        assert!(ir.contains("call i64 @add(i64 2, i64 3)"), "{ir}");
    }

    #[test]
    fn call_before_definition() {
        // `first` calls `second`, defined after it.
        let first = Function::new("first", vec![], Expr::call("second", vec![]));
        let second = Function::new("second", vec![], Expr::literal(7));
        let program = Program::new(vec![first, second], Expr::call("first", vec![]));
        assert!(lower(&program).unwrap().contains("call i64 @second()"));
    }

    #[test]
    fn print_uses_one_format_string() {
        let program = Program::new(
            vec![],
            Expr::binary(
                BinaryOp::Add,
                Expr::print(Expr::literal(1)),
                Expr::print(Expr::literal(2)),
            ),
        );
        let ir = lower(&program).unwrap();
        assert_eq!(ir.matches(r#"c"%ld\0A\00""#).count(), 1, "{ir}");
        assert_eq!(ir.matches("call i32 (ptr, ...) @printf").count(), 2, "{ir}");
    }

    #[test]
    fn shift_amount_is_masked() {
        let f = Function::new(
            "f",
            vec!["n".into()],
            Expr::binary(BinaryOp::ShiftLeft, Expr::literal(1), Expr::variable("n")),
        );
        let program = Program::new(vec![f], Expr::call("f", vec![Expr::literal(64)]));
        let ir = lower(&program).unwrap();
        assert!(ir.contains("%shamt = and i64 %n, 63"), "{ir}");
        assert!(ir.contains("%shl = shl i64 1, %shamt"), "{ir}");
    }

    #[test]
    fn unresolved_variable_names_the_function() {
        let f = Function::new("f", vec!["a".into()], Expr::variable("b"));
        let program = Program::new(vec![f], Expr::literal(0));
        let err = lower(&program).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidProgram);
        assert_eq!(
            err.err.to_string(),
            "Could not find var b in stack frame of f!"
        );
    }

    #[test]
    fn variable_in_main() {
        let program = Program::new(vec![], Expr::variable("x"));
        let err = lower(&program).unwrap_err();
        assert_eq!(
            err.downcast_cause::<LookupErr>(),
            Some(&LookupErr::UnresolvedVariable {
                var: "x".into(),
                func: "main".into()
            })
        );
    }

    #[test]
    fn unresolved_function() {
        let program = Program::new(vec![], Expr::call("undefinedFn", vec![]));
        let err = lower(&program).unwrap_err();
        assert_eq!(
            err.downcast_cause::<LookupErr>(),
            Some(&LookupErr::UnresolvedFunction("undefinedFn".into()))
        );
    }

    #[test]
    fn arity_mismatch() {
        let id = Function::new("id", vec!["a".into()], Expr::variable("a"));
        let program = Program::new(
            vec![id],
            Expr::call("id", vec![Expr::literal(1), Expr::literal(2)]),
        );
        let err = lower(&program).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid program: Unexpected arg count for id, expected 1, got 2 args"
        );
    }

    #[test]
    fn reserved_names() {
        for name in ["printf", "__anon_tl"] {
            let program = Program::new(
                vec![Function::new(name, vec![], Expr::literal(0))],
                Expr::literal(0),
            );
            let err = lower(&program).unwrap_err();
            assert!(err.is::<FunctionTableErr>(), "{name}");
        }
    }
}
