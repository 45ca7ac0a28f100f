//! A self-hosting front end for the meta-language surface itself: grammar
//! source text is parsed by the engine's own [`crate::session::Session`]
//! running over a hand-authored [`bootstrap::grammar`], and the resulting
//! parse is lowered into an ordinary [`crate::grammar::GrammarIr`] that the
//! rest of the engine can load like any other.
pub mod bootstrap;
mod lower;

use crate::condition::Assignment;
use crate::error::{GrammarLoadError, SessionError};
use crate::grammar::GrammarIr;
use crate::session::Session;
use crate::util::Code;
use std::fmt::{Display, Formatter};

/// Everything that can go wrong turning grammar source text into a
/// [`GrammarIr`]: either the bootstrap grammar itself failed to load (an
/// engine bug, not a user error), or the source failed to parse against it,
/// or the parsed tree lowered into an inconsistent grammar.
#[derive(Debug, Clone)]
pub enum MetaError {
    Bootstrap(GrammarLoadError),
    Parse(SessionError),
    Lower(GrammarLoadError),
}

impl Display for MetaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaError::Bootstrap(e) => write!(f, "bootstrap grammar failed to load: {}", e),
            MetaError::Parse(e) => write!(f, "grammar source failed to parse: {}", e),
            MetaError::Lower(e) => write!(f, "parsed grammar lowered inconsistently: {}", e),
        }
    }
}

/// Parses `source` (grammar text in the meta-language's concrete syntax)
/// against the bootstrap grammar and lowers the result into a `GrammarIr`
/// ready to open its own sessions over.
pub fn parse_grammar_source(source: &str) -> Result<GrammarIr, MetaError> {
    let bootstrap = bootstrap::grammar().map_err(MetaError::Bootstrap)?;
    let code = Code::new(source.as_bytes());
    let session = Session::open(&bootstrap, &code, Assignment::new());
    let report = session.parse();
    if let Err(err) = report.outcome {
        return Err(MetaError::Parse(err));
    }
    let roots = report
        .forest()
        .expect("a successful parse outcome always has a forest");
    lower::lower(&bootstrap, source.as_bytes(), &roots).map_err(MetaError::Lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session as EngineSession;
    use crate::util::Code as EngineCode;

    #[test]
    fn lowers_iteration_sugar_into_a_working_grammar() {
        let source = r#"S(start): "a" {/"a"};"#;
        let grammar = parse_grammar_source(source).unwrap();
        let code = EngineCode::new(b"aaa");
        let session = EngineSession::open(&grammar, &code, Assignment::new());
        let report = session.parse();
        assert!(report.outcome.is_ok());
        let ast = report.ast().unwrap();
        assert_eq!(ast.len(), 1);
    }

    #[test]
    fn lowers_terminal_precedence_and_condition_guard() {
        let source = "Kw(+Id): \"if\";\nId: \"[A-Za-z]+\";\nS(start)/flag: Kw;\n";
        let grammar = parse_grammar_source(source).unwrap();
        let code = EngineCode::new(b"if");
        let mut sigma = Assignment::new();
        sigma.set("flag", true);
        let session = EngineSession::open(&grammar, &code, sigma);
        let report = session.parse();
        assert!(report.outcome.is_ok());
    }

    #[test]
    fn rejects_source_that_fails_to_parse() {
        let source = "S(start): ;;;";
        assert!(matches!(parse_grammar_source(source), Err(MetaError::Parse(_))));
    }
}
