//! Parser for the surface syntax of nickel programs.
//!
//! ```text
//! function fact(n) = if n <= 1 then 1 else n * fact(n - 1);
//! main = print(fact(5))
//! ```
//!
//! Binary operators are left associative. From loosest to tightest:
//! `==` and `<=`, then `<<`, then `+` and `-`, then `*`.
//! `#` starts a comment that runs to the end of the line.

use combine::{
    attempt, between, chainl1, choice, eof, many, many1, not_followed_by, optional,
    parser::char::{alpha_num, digit, letter, space, string},
    satisfy, sep_by, skip_many, skip_many1,
    stream::{
        easy,
        position::{self, SourcePosition},
    },
    token, EasyParser, Parser,
};
use thiserror::Error;

use crate::{
    ast::{BinaryOp, Expr, Function, Program},
    identifier::Identifier,
    input_err,
    result::Result,
};

/// The input every parser in this module works on.
pub type SourceStream<'a> = easy::Stream<position::Stream<&'a str, SourcePosition>>;

const KEYWORDS: [&str; 5] = ["function", "if", "then", "else", "print"];

#[derive(Debug, Error)]
#[error("{0}")]
pub struct SyntaxErr(pub String);

#[derive(Debug, Error)]
#[error("{0} is a keyword")]
struct KeywordErr(String);

/// Whitespace and comments.
fn trivia<'a>() -> impl Parser<SourceStream<'a>, Output = ()> {
    let comment = token('#').with(skip_many(satisfy(|c: char| c != '\n')));
    skip_many(skip_many1(space()).or(comment))
}

/// Parse with `parser`, then skip trailing trivia.
fn lex<'a, P>(parser: P) -> impl Parser<SourceStream<'a>, Output = P::Output>
where
    P: Parser<SourceStream<'a>>,
{
    parser.skip(trivia())
}

fn symbol<'a>(sym: &'static str) -> impl Parser<SourceStream<'a>, Output = &'static str> {
    lex(attempt(string(sym)))
}

/// A single `=`, not the start of `==`.
fn assign<'a>() -> impl Parser<SourceStream<'a>, Output = ()> {
    lex(attempt(token('=').skip(not_followed_by(token('='))))).map(|_| ())
}

fn keyword<'a>(kw: &'static str) -> impl Parser<SourceStream<'a>, Output = ()> {
    lex(attempt(
        string(kw).skip(not_followed_by(alpha_num().or(token('_')))),
    ))
    .map(|_| ())
}

fn identifier<'a>() -> impl Parser<SourceStream<'a>, Output = Identifier> {
    lex(attempt(
        letter()
            .or(token('_'))
            .and(many::<String, _, _>(alpha_num().or(token('_'))))
            .map(|(first, rest)| format!("{first}{rest}"))
            .and_then(|name| {
                if KEYWORDS.contains(&name.as_str()) {
                    Err(KeywordErr(name))
                } else {
                    Ok(name)
                }
            }),
    ))
    .map(Identifier::from)
}

fn integer<'a>() -> impl Parser<SourceStream<'a>, Output = u64> {
    lex(many1::<String, _, _>(digit()).and_then(|digits| digits.parse::<u64>()))
}

fn parenthesized<'a, P>(parser: P) -> impl Parser<SourceStream<'a>, Output = P::Output>
where
    P: Parser<SourceStream<'a>>,
{
    between(symbol("("), symbol(")"), parser)
}

/// Everything that binds tighter than any binary operator.
fn atom<'a>() -> impl Parser<SourceStream<'a>, Output = Expr> {
    let conditional = (
        keyword("if").with(expr()),
        keyword("then").with(expr()),
        keyword("else").with(expr()),
    )
        .map(|(cond, then_expr, else_expr)| Expr::conditional(cond, then_expr, else_expr));

    let print = keyword("print")
        .with(parenthesized(expr()))
        .map(Expr::print);

    let call_or_var = identifier()
        .and(optional(parenthesized(sep_by::<Vec<_>, _, _, _>(
            expr(),
            symbol(","),
        ))))
        .map(|(name, args)| match args {
            Some(args) => Expr::call(name, args),
            None => Expr::Variable(name),
        });

    choice((
        integer().map(Expr::literal),
        parenthesized(expr()),
        conditional,
        print,
        call_or_var,
    ))
}

fn binary(op: BinaryOp) -> impl FnMut(Expr, Expr) -> Expr {
    move |lhs: Expr, rhs: Expr| Expr::binary(op, lhs, rhs)
}

fn product<'a>() -> impl Parser<SourceStream<'a>, Output = Expr> {
    chainl1(atom(), symbol("*").map(|_| binary(BinaryOp::Multiply)))
}

fn sum<'a>() -> impl Parser<SourceStream<'a>, Output = Expr> {
    let op = choice((
        symbol("+").map(|_| BinaryOp::Add),
        symbol("-").map(|_| BinaryOp::Subtract),
    ));
    chainl1(product(), op.map(binary))
}

fn shift<'a>() -> impl Parser<SourceStream<'a>, Output = Expr> {
    chainl1(sum(), symbol("<<").map(|_| binary(BinaryOp::ShiftLeft)))
}

fn comparison<'a>() -> impl Parser<SourceStream<'a>, Output = Expr> {
    let op = choice((
        symbol("==").map(|_| BinaryOp::Equal),
        symbol("<=").map(|_| BinaryOp::LessOrEqual),
    ));
    chainl1(shift(), op.map(binary))
}

/// A parser combinator for expressions. Boxed, since expressions nest.
pub fn expr<'a>() -> Box<dyn Parser<SourceStream<'a>, Output = Expr, PartialState = ()> + 'a> {
    combine::parser(|input: &mut SourceStream<'a>| comparison().parse_stream(input).into_result())
        .boxed()
}

fn definition<'a>() -> impl Parser<SourceStream<'a>, Output = Function> {
    (
        keyword("function").with(identifier()),
        parenthesized(sep_by::<Vec<_>, _, _, _>(identifier(), symbol(","))),
        assign().with(expr()).skip(symbol(";")),
    )
        .map(|(name, params, body)| Function::new(name, params, body))
}

/// A parser combinator for whole programs.
pub fn program<'a>() -> impl Parser<SourceStream<'a>, Output = Program> {
    let main_prefix = attempt(lex(string("main")).with(assign()));
    (
        trivia().with(many::<Vec<_>, _, _>(definition())),
        optional(main_prefix).with(expr()),
        optional(symbol(";")),
        eof(),
    )
        .map(|(functions, main, _, _)| Program::new(functions, main))
}

/// Parse the source text of a program.
pub fn parse_program(src: &str) -> Result<Program> {
    match program().easy_parse(position::Stream::new(src)) {
        Ok((program, _)) => {
            log::debug!("parsed program:\n{program}");
            Ok(program)
        }
        Err(err) => {
            // Diagnostics are a single line.
            let msg = err
                .to_string()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("; ");
            input_err!(SyntaxErr(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::{parse_program, SyntaxErr};
    use crate::{
        ast::{BinaryOp, Expr, Function, Program},
        result::ErrorKind,
    };

    #[test]
    fn print_literal() {
        let program = parse_program("print(42)").unwrap();
        assert_eq!(program, Program::new(vec![], Expr::print(Expr::literal(42))));
    }

    #[test]
    fn function_and_main() {
        let program = parse_program("function add(a, b) = a + b; main = add(2, 3)").unwrap();
        let add = Function::new(
            "add",
            vec!["a".into(), "b".into()],
            Expr::binary(BinaryOp::Add, Expr::variable("a"), Expr::variable("b")),
        );
        assert_eq!(
            program,
            Program::new(
                vec![add],
                Expr::call("add", vec![Expr::literal(2), Expr::literal(3)])
            )
        );
    }

    #[test]
    fn precedence_and_associativity() {
        let program = parse_program("main = 1 + 2 * 3 - 4 << 1 <= 10 == 1").unwrap();
        expect!["main = (((((1 + (2 * 3)) - 4) << 1) <= 10) == 1)"]
            .assert_eq(&program.to_string());
    }

    #[test]
    fn conditional_and_comments() {
        let src = r#"
            # factorial
            function fact(n) =
                if n <= 1 then 1 else n * fact(n - 1);   # recursive
            function zero() = 0;
            main = print(fact(5)) + zero();
        "#;
        let program = parse_program(src).unwrap();
        expect![[r#"
            function fact(n) = (if (n <= 1) then 1 else (n * fact((n - 1))));
            function zero() = 0;
            main = (print(fact(5)) + zero())"#]]
        .assert_eq(&program.to_string());
    }

    #[test]
    fn keywords_as_prefixes() {
        let program = parse_program("function iffy(printer) = printer; iffy(1)").unwrap();
        assert_eq!(program.functions[0].name.as_str(), "iffy");
        assert_eq!(program.functions[0].params[0].as_str(), "printer");
    }

    #[test]
    fn display_parses_back() {
        let src = "function f(x, y) = if x == y then print(x << 2) else (y - 1) * x; f(3, 4)";
        let program = parse_program(src).unwrap();
        assert_eq!(parse_program(&program.to_string()).unwrap(), program);
    }

    #[test]
    fn syntax_errors() {
        for src in [
            "",
            "print(42",
            "function f(a) = a main = f(1)",
            "1 +",
            "function if(a) = a; 1",
            "99999999999999999999999",
            "1 2",
        ] {
            let err = parse_program(src).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidInput, "{src:?}");
            assert!(err.is::<SyntaxErr>());
            assert!(!err.to_string().contains('\n'));
        }
    }
}
