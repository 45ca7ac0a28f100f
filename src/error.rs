use crate::util::{Code, Position};
use std::fmt::{Display, Formatter};

/// Failure while loading a grammar IR, before any source is parsed.
#[derive(Debug, Clone)]
pub enum GrammarLoadError {
    UndefinedCondition(String),
    UndefinedTerminal(String),
    UndefinedNonTerminal(String),
    CyclicPrecedence(Vec<String>),
    NoStartSymbol,
    MultipleStartSymbols(String, String),
    MalformedRegex { terminal: String, message: String },
}

impl Display for GrammarLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarLoadError::UndefinedCondition(name) => {
                write!(f, "GrammarLoadError: undefined condition `{}`", name)
            }
            GrammarLoadError::UndefinedTerminal(name) => {
                write!(f, "GrammarLoadError: undefined terminal `{}`", name)
            }
            GrammarLoadError::UndefinedNonTerminal(name) => {
                write!(f, "GrammarLoadError: undefined non-terminal `{}`", name)
            }
            GrammarLoadError::CyclicPrecedence(chain) => write!(
                f,
                "GrammarLoadError: cyclic precedence among terminals: {}",
                chain.join(" -> ")
            ),
            GrammarLoadError::NoStartSymbol => {
                write!(f, "GrammarLoadError: grammar declares no start symbol")
            }
            GrammarLoadError::MultipleStartSymbols(a, b) => write!(
                f,
                "GrammarLoadError: multiple start symbols `{}` and `{}`",
                a, b
            ),
            GrammarLoadError::MalformedRegex { terminal, message } => write!(
                f,
                "GrammarLoadError: malformed regex for terminal `{}`: {}",
                terminal, message
            ),
        }
    }
}

/// A lexical failure at a single position. The engine never surfaces this on
/// its own; [`SyntacticError`] promotes it once no parse branch survives past
/// the position.
#[derive(Debug, Clone)]
pub struct LexicalError {
    pub position: usize,
}

impl LexicalError {
    pub fn new(position: usize) -> Self {
        Self { position }
    }

    pub fn describe(&self, code: &Code) -> String {
        format!(
            "LexicalError: no admitted terminal matches at {}",
            code.obtain_position(self.position)
        )
    }
}

/// No BSR spans `(start, 0, n)` survived the parse.
#[derive(Debug, Clone)]
pub struct SyntacticError {
    pub farthest_position: usize,
    pub expected_terminals: Vec<String>,
}

impl SyntacticError {
    pub fn new(farthest_position: usize, expected_terminals: Vec<String>) -> Self {
        Self {
            farthest_position,
            expected_terminals,
        }
    }

    pub fn describe(&self, code: &Code) -> String {
        let position: Position = code.obtain_position(self.farthest_position);
        if self.expected_terminals.is_empty() {
            format!("SyntacticError: unexpected input at {}", position)
        } else {
            format!(
                "SyntacticError: at {} expected one of: {}",
                position,
                self.expected_terminals.join(", ")
            )
        }
    }
}

/// An assertion about engine-internal invariants failed; these are never
/// expected from a correct implementation and a correct grammar.
#[derive(Debug, Clone)]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "InternalError: {}", self.message)
    }
}

/// Every distinct failure a parse session can end in, short of success.
#[derive(Debug, Clone)]
pub enum SessionError {
    Lexical(LexicalError),
    Syntactic(SyntacticError),
    Cancelled,
    Internal(InternalError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Lexical(e) => write!(f, "LexicalError: no match at {}", e.position),
            SessionError::Syntactic(e) => write!(
                f,
                "SyntacticError: farthest position {}, expected {:?}",
                e.farthest_position, e.expected_terminals
            ),
            SessionError::Cancelled => write!(f, "Cancelled: session was cancelled"),
            SessionError::Internal(e) => write!(f, "{}", e),
        }
    }
}

/// Result alias returned by [`crate::session::Session::parse`].
pub type ParseOutcome<T> = Result<T, SessionError>;
