//! The abstract syntax of nickel programs.
//!
//! The tree is built once, by the [parser](crate::parser) or directly
//! through the constructors below, and is never mutated afterwards.
//! Construction does no validation: unresolved names and arity
//! mismatches are detected by the backends.

use std::fmt::Display;

use crate::identifier::Identifier;

/// Binary operators. All of them operate on 64-bit integers,
/// comparisons produce 0 or 1.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Multiply,
    ShiftLeft,
    Subtract,
    LessOrEqual,
    Equal,
}

impl BinaryOp {
    /// The operator's surface syntax.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Multiply => "*",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::Subtract => "-",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Equal => "==",
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An expression. Both backends match on this one enum, so adding a
/// variant forces both of them to handle it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Literal(u64),
    Variable(Identifier),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Print(Box<Expr>),
    Call {
        callee: Identifier,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn literal(value: u64) -> Expr {
        Expr::Literal(value)
    }

    pub fn variable(name: impl Into<Identifier>) -> Expr {
        Expr::Variable(name.into())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn conditional(cond: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
        Expr::Conditional {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    pub fn print(body: Expr) -> Expr {
        Expr::Print(Box::new(body))
    }

    pub fn call(callee: impl Into<Identifier>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: callee.into(),
            args,
        }
    }
}

/// Writes a comma separated list.
fn fmt_list<T: Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Prints the surface syntax. Binary operations are always
/// parenthesized, so the output parses back to the same tree.
impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Variable(name) => write!(f, "{name}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => write!(f, "(if {cond} then {then_expr} else {else_expr})"),
            Expr::Print(body) => write!(f, "print({body})"),
            Expr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                fmt_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

/// A function definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub body: Expr,
}

impl Function {
    pub fn new(name: impl Into<Identifier>, params: Vec<Identifier>, body: Expr) -> Function {
        Function {
            name: name.into(),
            params,
            body,
        }
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "function {}(", self.name)?;
        fmt_list(f, &self.params)?;
        write!(f, ") = {};", self.body)
    }
}

/// A whole program: function definitions, in source order,
/// and the expression to evaluate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    pub functions: Vec<Function>,
    pub main: Expr,
}

impl Program {
    pub fn new(functions: Vec<Function>, main: Expr) -> Program {
        Program { functions, main }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for func in &self.functions {
            writeln!(f, "{func}")?;
        }
        write!(f, "main = {}", self.main)
    }
}
