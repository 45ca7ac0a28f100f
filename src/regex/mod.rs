//! Compilation of the meta-language's restricted POSIX-ERE surface to
//! Thompson-construction NFAs, and lazy subset-construction simulation of
//! those NFAs.
mod ast;
mod nfa;
mod parser;

pub use ast::{CharClass, RegexAst};
pub use nfa::{run, ByteMatcher, Nfa, NfaState};
pub use parser::parse;

use crate::error::GrammarLoadError;

/// Parses `source` under the meta-language's fixed escape grammar and
/// compiles it directly to an NFA, tagging its accept state with
/// `terminal_id`.
pub fn compile(
    source: &str,
    terminal_id: usize,
    terminal_name: &str,
) -> Result<Nfa, GrammarLoadError> {
    let ast = parser::parse(source).map_err(|message| GrammarLoadError::MalformedRegex {
        terminal: terminal_name.to_string(),
        message,
    })?;
    Ok(nfa::compile(&ast, terminal_id))
}
