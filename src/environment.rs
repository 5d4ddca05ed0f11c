//! Run-time state of the interpreter: the function table and the call stack.

use crate::{
    ast::{Function, Program},
    function_table::{FunctionTable, LookupErr},
    identifier::Identifier,
    invalid_program_err,
    result::Result,
};

/// Owner of the frame in which the main expression is evaluated.
pub const MAIN_FRAME_OWNER: &str = "main";

/// The variable bindings of one call.
pub struct StackFrame<'p> {
    /// The function this frame belongs to, for diagnostics.
    owner: &'p str,
    bindings: Vec<(&'p Identifier, i64)>,
}

impl<'p> StackFrame<'p> {
    pub fn new(owner: &'p str, bindings: Vec<(&'p Identifier, i64)>) -> Self {
        StackFrame { owner, bindings }
    }

    pub fn owner(&self) -> &'p str {
        self.owner
    }

    /// First binding of `name` in this frame.
    pub fn lookup(&self, name: &Identifier) -> Option<i64> {
        self.bindings
            .iter()
            .find_map(|(var, value)| (*var == name).then_some(*value))
    }
}

/// Functions of the program being run, and the stack of active calls.
/// The stack is never empty: its bottom frame belongs to the main expression.
pub struct Environment<'p> {
    functions: FunctionTable<'p>,
    stack: Vec<StackFrame<'p>>,
}

impl<'p> Environment<'p> {
    pub fn new(program: &'p Program) -> Result<Self> {
        Ok(Environment {
            functions: FunctionTable::new(program)?,
            stack: vec![StackFrame::new(MAIN_FRAME_OWNER, vec![])],
        })
    }

    fn current_frame(&self) -> &StackFrame<'p> {
        self.stack
            .last()
            .expect("the main frame is never popped")
    }

    /// Resolve `name` in the current frame only. Frames of callers are not visible.
    pub fn lookup_var(&self, name: &Identifier) -> Result<i64> {
        let frame = self.current_frame();
        match frame.lookup(name) {
            Some(value) => Ok(value),
            None => invalid_program_err!(LookupErr::UnresolvedVariable {
                var: name.to_string(),
                func: frame.owner().to_string(),
            }),
        }
    }

    pub fn lookup_func(&self, name: &Identifier) -> Result<&'p Function> {
        self.functions.lookup(name)
    }

    pub fn push_frame(&mut self, frame: StackFrame<'p>) {
        self.stack.push(frame);
    }

    /// Pop the current frame, releasing its bindings.
    pub fn pop_frame(&mut self) {
        assert!(self.stack.len() > 1, "attempt to pop the main frame");
        self.stack.pop();
    }

    /// Number of active calls.
    pub fn call_depth(&self) -> usize {
        self.stack.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::{Environment, StackFrame};
    use crate::{
        ast::{Expr, Program},
        function_table::LookupErr,
        identifier::Identifier,
    };

    #[test]
    fn frames_are_isolated() {
        let program = Program::new(vec![], Expr::literal(0));
        let mut env = Environment::new(&program).unwrap();
        let (a, b): (Identifier, Identifier) = ("a".into(), "b".into());

        env.push_frame(StackFrame::new("f", vec![(&a, 1)]));
        env.push_frame(StackFrame::new("g", vec![(&b, 2)]));
        assert_eq!(env.call_depth(), 2);
        assert_eq!(env.lookup_var(&b).unwrap(), 2);

        let err = env.lookup_var(&a).unwrap_err();
        assert_eq!(
            err.downcast_cause::<LookupErr>(),
            Some(&LookupErr::UnresolvedVariable {
                var: "a".into(),
                func: "g".into()
            })
        );

        env.pop_frame();
        assert_eq!(env.lookup_var(&a).unwrap(), 1);
        env.pop_frame();
        assert_eq!(env.call_depth(), 0);
    }

    #[test]
    fn first_binding_wins() {
        let x: Identifier = "x".into();
        let frame = StackFrame::new("f", vec![(&x, 1), (&x, 2)]);
        assert_eq!(frame.lookup(&x), Some(1));
    }
}
