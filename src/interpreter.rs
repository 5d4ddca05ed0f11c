//! A tree-walking interpreter.

use std::io::{self, Write};

use crate::{
    ast::{BinaryOp, Expr, Program},
    environment::{Environment, StackFrame},
    function_table::check_arity,
    result::Result,
};

/// Apply `op` to two already evaluated operands.
/// Arithmetic wraps, comparisons yield 0 or 1.
pub fn apply_binary_op(op: BinaryOp, lhs: i64, rhs: i64) -> i64 {
    match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Multiply => lhs.wrapping_mul(rhs),
        // The amount is taken modulo 64, as in compiled code.
        BinaryOp::ShiftLeft => lhs.wrapping_shl((rhs & 63) as u32),
        BinaryOp::Subtract => lhs.wrapping_sub(rhs),
        BinaryOp::LessOrEqual => (lhs <= rhs) as i64,
        BinaryOp::Equal => (lhs == rhs) as i64,
    }
}

/// Evaluates a [Program], writing printed values to `W`.
pub struct Interpreter<'p, W: Write> {
    program: &'p Program,
    env: Environment<'p>,
    out: W,
}

impl<'p> Interpreter<'p, io::Stdout> {
    /// An interpreter that prints to standard output.
    pub fn new(program: &'p Program) -> Result<Self> {
        Self::with_output(program, io::stdout())
    }
}

impl<'p, W: Write> Interpreter<'p, W> {
    pub fn with_output(program: &'p Program, out: W) -> Result<Self> {
        Ok(Interpreter {
            program,
            env: Environment::new(program)?,
            out,
        })
    }

    /// Evaluate the program's main expression.
    pub fn run(&mut self) -> Result<i64> {
        let program = self.program;
        let result = self.evaluate(&program.main);
        self.out.flush()?;
        result
    }

    /// Evaluate `expr` in the current stack frame.
    pub fn evaluate(&mut self, expr: &'p Expr) -> Result<i64> {
        match expr {
            Expr::Literal(value) => Ok(*value as i64),
            Expr::Variable(name) => self.env.lookup_var(name),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate(lhs)?;
                let rhs = self.evaluate(rhs)?;
                Ok(apply_binary_op(*op, lhs, rhs))
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.evaluate(cond)? != 0 {
                    self.evaluate(then_expr)
                } else {
                    self.evaluate(else_expr)
                }
            }
            Expr::Print(body) => {
                let value = self.evaluate(body)?;
                writeln!(self.out, "{value}")?;
                Ok(value)
            }
            Expr::Call { callee, args } => {
                let func = self.env.lookup_func(callee)?;
                check_arity(&func.name, func.arity(), args.len())?;

                // Arguments are evaluated in the caller's frame.
                let mut bindings = Vec::with_capacity(args.len());
                for (param, arg) in func.params.iter().zip(args) {
                    bindings.push((param, self.evaluate(arg)?));
                }

                log::trace!("call {} at depth {}", func.name, self.env.call_depth());
                self.env.push_frame(StackFrame::new(&func.name, bindings));
                let result = self.evaluate(&func.body);
                self.env.pop_frame();
                result
            }
        }
    }

    /// Consume the interpreter, returning its output sink.
    pub fn into_output(self) -> W {
        self.out
    }
}

/// Interpret `program`, printing to standard output. Returns the value of
/// the main expression.
pub fn interpret(program: &Program) -> Result<i64> {
    log::info!("interpreting program with {} functions", program.functions.len());
    Interpreter::new(program)?.run()
}
