//! The session API (spec.md §6): `open`/`parse`/`cancel`/`close`, the only
//! entry points external collaborators (the CLI driver, the code generator)
//! use. A session owns every per-parse table; dropping it releases them all
//! together, since nothing outlives it by reference.
use crate::bsr::BsrSet;
use crate::condition::Assignment;
use crate::epn::{CancelFlag, Epn};
use crate::error::{ParseOutcome, SessionError};
use crate::forest::{build_ast, AstNode, ForestBuilder, SyntaxForest};
use crate::grammar::GrammarIr;
use crate::lexer::Lexer;
use crate::util::{Code, Log};
use std::cell::Cell;
use std::rc::Rc;

/// Everything one call to [`Session::parse`] produced: the BSR set is always
/// present (per spec.md §6's `{ok: ..., err: ..., bsr: set}`), and `outcome`
/// distinguishes a farthest-position failure, a cancellation, or success.
pub struct ParseReport<'g> {
    grammar: &'g GrammarIr,
    source_len: usize,
    pub bsr: BsrSet,
    pub outcome: ParseOutcome<()>,
}

impl<'g> ParseReport<'g> {
    /// The disambiguated, ambiguity-preserving syntax forest roots, or
    /// `None` if the parse did not succeed.
    pub fn forest(&self) -> Option<Vec<Rc<SyntaxForest>>> {
        if self.outcome.is_err() {
            return None;
        }
        let builder = ForestBuilder::new(&self.bsr, self.grammar);
        Some(
            builder
                .roots(self.grammar.start, 0, self.source_len)
                .as_ref()
                .clone(),
        )
    }

    /// The fully materialized AST roots (CST with chains collapsed and
    /// punctuation elided), or `None` if the parse did not succeed.
    pub fn ast(&self) -> Option<Vec<AstNode>> {
        if self.outcome.is_err() {
            return None;
        }
        Some(build_ast(&self.bsr, self.grammar, self.source_len))
    }
}

/// A single parse attempt over one grammar and one source. Not re-entrant:
/// each call to [`Session::parse`] re-drives the engine from scratch against
/// the session's fixed `(grammar, source, sigma)`.
pub struct Session<'g, 'c> {
    grammar: &'g GrammarIr,
    code: &'c Code<'c>,
    sigma: Assignment,
    cancel: CancelFlag,
    debug: Log<&'static str>,
}

impl<'g, 'c> Session<'g, 'c> {
    /// `open(grammar_ir, source, sigma) -> session`.
    pub fn open(grammar: &'g GrammarIr, code: &'c Code<'c>, sigma: Assignment) -> Self {
        Self {
            grammar,
            code,
            sigma,
            cancel: Rc::new(Cell::new(false)),
            debug: Log::None,
        }
    }

    /// Attaches a debug trace level to every lexer/EPN call this session
    /// drives, printed under `#[cfg(debug_assertions)]`.
    pub fn with_debug(mut self, level: Log<&'static str>) -> Self {
        self.debug = level;
        self
    }

    /// Cooperative cancellation: checked by the EPN driver at each
    /// non-terminal descent. Takes effect on the next `parse()` call already
    /// in flight, or immediately for one about to start.
    pub fn cancel(&self) {
        self.cancel.set(true);
    }

    /// `parse(session) -> {ok, err, bsr}`.
    pub fn parse(&self) -> ParseReport<'g> {
        let lexer =
            Lexer::new(&self.grammar.terminals, self.sigma.clone(), self.code).with_debug(self.debug);
        let epn = Epn::new(
            self.grammar,
            &lexer,
            self.sigma.clone(),
            self.cancel.clone(),
            self.code.value.len(),
        )
        .with_debug(self.debug);
        match epn.run() {
            Ok(result) if result.cancelled => ParseReport {
                grammar: self.grammar,
                source_len: self.code.value.len(),
                bsr: result.bsr,
                outcome: Err(SessionError::Cancelled),
            },
            Ok(result) => ParseReport {
                grammar: self.grammar,
                source_len: self.code.value.len(),
                bsr: result.bsr,
                outcome: Ok(()),
            },
            Err(syntactic) => ParseReport {
                grammar: self.grammar,
                source_len: self.code.value.len(),
                bsr: BsrSet::new(),
                outcome: Err(SessionError::Syntactic(syntactic)),
            },
        }
    }

    /// `close(session)`. All per-session state is owned by `self`; dropping
    /// it is the whole of "close" (spec.md §3's "all are released together
    /// at session end").
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::grammar::{AlternativeSpec, GrammarBuilder, Separator, SymbolSpec};

    fn ambiguous_choice_grammar() -> GrammarIr {
        let mut builder = GrammarBuilder::new();
        builder.declare_terminal("x", "x", Condition::True, false, vec![], vec![], false);
        builder.declare_non_terminal(
            "S",
            true,
            Condition::True,
            vec![
                AlternativeSpec {
                    symbols: vec![SymbolSpec::Terminal("x".to_string())],
                    condition: Condition::True,
                    separator_before: None,
                },
                AlternativeSpec {
                    symbols: vec![SymbolSpec::Terminal("x".to_string())],
                    condition: Condition::True,
                    separator_before: Some(Separator::Ambiguous),
                },
            ],
        );
        builder.build().unwrap()
    }

    fn ordered_choice_grammar() -> GrammarIr {
        let mut builder = GrammarBuilder::new();
        builder.declare_terminal("x", "x", Condition::True, false, vec![], vec![], false);
        builder.declare_non_terminal(
            "S",
            true,
            Condition::True,
            vec![
                AlternativeSpec {
                    symbols: vec![SymbolSpec::Terminal("x".to_string())],
                    condition: Condition::True,
                    separator_before: None,
                },
                AlternativeSpec {
                    symbols: vec![SymbolSpec::Terminal("x".to_string())],
                    condition: Condition::True,
                    separator_before: Some(Separator::Ordered),
                },
            ],
        );
        builder.build().unwrap()
    }

    #[test]
    fn ambiguous_separator_keeps_both_roots() {
        let grammar = ambiguous_choice_grammar();
        let code = Code::new(b"x");
        let session = Session::open(&grammar, &code, Assignment::new());
        let report = session.parse();
        assert!(report.outcome.is_ok());
        assert_eq!(report.forest().unwrap().len(), 2);
    }

    #[test]
    fn ordered_separator_keeps_only_first_root() {
        let grammar = ordered_choice_grammar();
        let code = Code::new(b"x");
        let session = Session::open(&grammar, &code, Assignment::new());
        let report = session.parse();
        assert!(report.outcome.is_ok());
        assert_eq!(report.forest().unwrap().len(), 1);
    }

    #[test]
    fn farthest_error_reports_expected_terminals() {
        let mut builder = GrammarBuilder::new();
        builder.declare_terminal("a", "a", Condition::True, false, vec![], vec![], false);
        builder.declare_terminal("b", "b", Condition::True, false, vec![], vec![], false);
        builder.declare_terminal("c", "c", Condition::True, false, vec![], vec![], false);
        builder.declare_non_terminal(
            "S",
            true,
            Condition::True,
            vec![AlternativeSpec {
                symbols: vec![
                    SymbolSpec::Terminal("a".to_string()),
                    SymbolSpec::Terminal("b".to_string()),
                    SymbolSpec::Terminal("c".to_string()),
                ],
                condition: Condition::True,
                separator_before: None,
            }],
        );
        let grammar = builder.build().unwrap();
        let code = Code::new(b"ab!");
        let session = Session::open(&grammar, &code, Assignment::new());
        let report = session.parse();
        match report.outcome {
            Err(SessionError::Syntactic(err)) => {
                assert_eq!(err.farthest_position, 2);
                assert_eq!(err.expected_terminals, vec!["c".to_string()]);
            }
            other => panic!("expected a syntactic error, got {:?}", other.is_ok()),
        }
    }
}
