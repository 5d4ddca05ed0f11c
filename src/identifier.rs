//! [Identifier]s name functions and their parameters.

use std::{fmt::Display, ops::Deref, sync::OnceLock};

use regex::Regex;
use thiserror::Error;

use crate::{invalid_program_err, result::Result};

#[derive(Clone, Hash, PartialEq, Eq, Debug)]
/// An [Identifier] is well-formed if it satisfies the regex `[a-zA-Z_][a-zA-Z0-9_]*`.
/// Construction does not check this, [Identifier::verify] does.
pub struct Identifier(String);

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier(value.to_string())
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl Deref for Identifier {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[derive(Debug, Error)]
#[error("Malformed identifier {0:?}")]
pub struct MalformedIdentifierErr(pub String);

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap())
}

impl Identifier {
    /// Check that this is a well-formed identifier.
    pub fn verify(&self) -> Result<()> {
        if !identifier_regex().is_match(&self.0) {
            return invalid_program_err!(MalformedIdentifierErr(self.0.clone()));
        }
        Ok(())
    }
}
