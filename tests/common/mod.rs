//! Common utils for tests

use nickel::{interpreter::Interpreter, parser::parse_program, result::Result};

/// Initialize the logger for tests
pub fn init_env_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Parse and interpret `src`, capturing what it prints.
/// Returns the value of the main expression, and the output so far,
/// which is kept even if evaluation fails.
pub fn run_source(src: &str) -> Result<(Result<i64>, String)> {
    init_env_logger();
    let program = parse_program(src)?;
    let mut interp = Interpreter::with_output(&program, Vec::new())?;
    let result = interp.run();
    let out = String::from_utf8_lossy(&interp.into_output()).into_owned();
    Ok((result, out))
}
