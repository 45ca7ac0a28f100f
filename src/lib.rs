//! `aether_engine` is the runtime core of a self-hosting front-end
//! generator: given a grammar written in the small "Aether" meta-language,
//! it produces a working lexer and parser for the described language.
//!
//! # Overview
//!
//! The generator itself is out of scope here (file I/O, the CLI driver, the
//! code generator that emits target-language source, the bootstrap
//! release-policy verifier). What this crate provides is the engine every
//! generated front-end is built on:
//!
//! - A condition-guarded, regex-NFA-driven, on-demand [lexer](lexer::Lexer)
//!   that produces an ambiguity-friendly token stream with longest-match and
//!   precedence-based disambiguation ([`terminal`], [`regex`]).
//! - A condition-guarded, generalized recursive-descent
//!   [parser core](epn::Epn) (the GLL-family algorithm derived from
//!   Frost/Hafiz/Callaghan and Scott/Johnstone) that builds a Binary
//!   Subtree Representation forest ([`bsr`]) for arbitrarily ambiguous,
//!   left-recursive grammars in worst-case cubic time.
//! - The BSR → syntax forest → CST → AST materialization that extracts
//!   disambiguated trees from the BSR set ([`forest`]).
//! - The conditional-compilation machinery (`@lexical`, `@syntactic`,
//!   `+Name`, `-Name`) that makes single productions polymorphic across
//!   dialects ([`condition`], [`grammar`]).
//! - The [`session`] API (`open`/`parse`/`cancel`/`close`) external
//!   collaborators drive the engine through.
//! - A self-hosting [`meta`] front-end that parses the Aether meta-language
//!   surface itself, using the engine's own [`session::Session`], over a
//!   hand-authored bootstrap grammar.
//!
//! # Example
//!
//! ```
//! use aether_engine::condition::{Assignment, Condition};
//! use aether_engine::grammar::{AlternativeSpec, GrammarBuilder, SymbolSpec};
//! use aether_engine::session::Session;
//! use aether_engine::util::Code;
//!
//! // S: "a" {/"a"} ;
//! let mut builder = GrammarBuilder::new();
//! builder.declare_terminal("a", "a", Condition::True, false, vec![], vec![], false);
//! builder.declare_non_terminal(
//!     "S",
//!     true,
//!     Condition::True,
//!     vec![AlternativeSpec {
//!         symbols: vec![
//!             SymbolSpec::Terminal("a".to_string()),
//!             SymbolSpec::Iteration {
//!                 inner: Box::new(SymbolSpec::Terminal("a".to_string())),
//!                 left_fold: true,
//!             },
//!         ],
//!         condition: Condition::True,
//!         separator_before: None,
//!     }],
//! );
//! let grammar = builder.build().unwrap();
//!
//! let code = Code::new(b"aaa");
//! let session = Session::open(&grammar, &code, Assignment::new());
//! let report = session.parse();
//! assert!(report.outcome.is_ok());
//! assert_eq!(report.ast().unwrap().len(), 1);
//! ```
//!
//! # License
//! Provided under the MIT OR Apache-2.0 license.

pub mod bsr;
pub mod condition;
pub mod epn;
pub mod error;
pub mod forest;
pub mod grammar;
pub mod lexer;
pub mod meta;
pub mod regex;
pub mod session;
pub mod terminal;
pub mod util;
