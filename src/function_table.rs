//! Name resolution shared by both backends.
//!
//! The [FunctionTable] is built once per run from the program's
//! definitions. Building it is where ill-formed definitions are
//! rejected, so the interpreter and the code generator refuse exactly
//! the same programs, before either of them produces any output.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::{
    ast::{Function, Program},
    identifier::Identifier,
    invalid_program_err,
    result::Result,
};

/// Failures to resolve a name, or to match a call against its callee.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupErr {
    #[error("Could not find var {var} in stack frame of {func}!")]
    UnresolvedVariable { var: String, func: String },
    #[error("Could not find func {0}")]
    UnresolvedFunction(String),
    #[error("Unexpected arg count for {func}, expected {expected}, got {got} args")]
    ArityMismatch {
        func: String,
        expected: usize,
        got: usize,
    },
}

/// Ill-formed function definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FunctionTableErr {
    #[error("Function {0} is defined more than once")]
    DuplicateFunction(String),
    #[error("Parameter {param} of function {func} is declared more than once")]
    DuplicateParameter { func: String, param: String },
    #[error("Function name {0} is reserved")]
    ReservedName(String),
}

/// Symbol of the C library routine that `print` compiles to.
pub const PRINTF_SYMBOL: &str = "printf";
/// Symbol of the compiled function that evaluates the main expression.
pub const ENTRY_SYMBOL: &str = "__anon_tl";
/// Function names a program may not define, as compiled code uses them.
pub const RESERVED_NAMES: [&str; 2] = [PRINTF_SYMBOL, ENTRY_SYMBOL];

/// Functions of a program, by name.
pub struct FunctionTable<'p> {
    functions: Vec<&'p Function>,
    index: FxHashMap<&'p str, usize>,
}

impl<'p> FunctionTable<'p> {
    /// Build the table for `program`. Rejects malformed identifiers, reserved
    /// and duplicate function names, and duplicate parameter names.
    pub fn new(program: &'p Program) -> Result<Self> {
        let mut functions = Vec::with_capacity(program.functions.len());
        let mut index = FxHashMap::default();

        for func in &program.functions {
            func.name.verify()?;
            if RESERVED_NAMES.contains(&func.name.as_str()) {
                return invalid_program_err!(FunctionTableErr::ReservedName(func.name.to_string()));
            }
            let mut seen_params = FxHashSet::default();
            for param in &func.params {
                param.verify()?;
                if !seen_params.insert(param.as_str()) {
                    return invalid_program_err!(FunctionTableErr::DuplicateParameter {
                        func: func.name.to_string(),
                        param: param.to_string(),
                    });
                }
            }
            if index.insert(func.name.as_str(), functions.len()).is_some() {
                return invalid_program_err!(FunctionTableErr::DuplicateFunction(
                    func.name.to_string()
                ));
            }
            functions.push(func);
        }

        log::debug!("function table built with {} functions", functions.len());
        Ok(FunctionTable { functions, index })
    }

    /// Find the function named `name`.
    pub fn lookup(&self, name: &Identifier) -> Result<&'p Function> {
        match self.index.get(name.as_str()) {
            Some(&idx) => Ok(self.functions[idx]),
            None => invalid_program_err!(LookupErr::UnresolvedFunction(name.to_string())),
        }
    }

    /// Functions, in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &'p Function> + '_ {
        self.functions.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Check that a call to `func` with `got` arguments has the right arity.
pub fn check_arity(func: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return invalid_program_err!(LookupErr::ArityMismatch {
            func: func.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}
