//! Crate-level scenarios exercising the public session API end to end,
//! rather than any single module in isolation.
use aether_engine::condition::{Assignment, Condition};
use aether_engine::grammar::{AlternativeSpec, GrammarBuilder, GrammarIr, Separator, SymbolSpec};
use aether_engine::session::Session;
use aether_engine::util::Code;

fn left_recursive_arithmetic() -> GrammarIr {
    // E: E "+" E | "n" ;
    let mut builder = GrammarBuilder::new();
    builder.declare_terminal("plus", "\\+", Condition::True, false, vec![], vec![], true);
    builder.declare_terminal("n", "n", Condition::True, false, vec![], vec![], false);
    builder.declare_non_terminal(
        "E",
        true,
        Condition::True,
        vec![
            AlternativeSpec {
                symbols: vec![
                    SymbolSpec::NonTerminal("E".to_string()),
                    SymbolSpec::Terminal("plus".to_string()),
                    SymbolSpec::NonTerminal("E".to_string()),
                ],
                condition: Condition::True,
                separator_before: None,
            },
            AlternativeSpec {
                symbols: vec![SymbolSpec::Terminal("n".to_string())],
                condition: Condition::True,
                separator_before: Some(Separator::Ambiguous),
            },
        ],
    );
    builder.build().unwrap()
}

/// Scenario 2: left recursion produces both the left- and right-associative
/// parse of `n+n+n`, surfaced as two roots at the same span.
#[test]
fn left_recursive_grammar_keeps_both_associativity_parses() {
    let grammar = left_recursive_arithmetic();
    let code = Code::new(b"n+n+n");
    let session = Session::open(&grammar, &code, Assignment::new());
    let report = session.parse();
    assert!(report.outcome.is_ok());
    assert_eq!(report.forest().unwrap().len(), 2);
}

fn ordered_left_recursive_arithmetic() -> GrammarIr {
    // E: E "+" E / "n" ;
    let mut builder = GrammarBuilder::new();
    builder.declare_terminal("plus", "\\+", Condition::True, false, vec![], vec![], true);
    builder.declare_terminal("n", "n", Condition::True, false, vec![], vec![], false);
    builder.declare_non_terminal(
        "E",
        true,
        Condition::True,
        vec![
            AlternativeSpec {
                symbols: vec![
                    SymbolSpec::NonTerminal("E".to_string()),
                    SymbolSpec::Terminal("plus".to_string()),
                    SymbolSpec::NonTerminal("E".to_string()),
                ],
                condition: Condition::True,
                separator_before: None,
            },
            AlternativeSpec {
                symbols: vec![SymbolSpec::Terminal("n".to_string())],
                condition: Condition::True,
                separator_before: Some(Separator::Ordered),
            },
        ],
    );
    builder.build().unwrap()
}

/// Scenario 2 (ordered form): joining the two alternatives with `/` instead
/// of `|` collapses the associativity ambiguity down to the single
/// left-associative parse of `n+n+n`.
#[test]
fn ordered_choice_collapses_left_recursion_to_one_root() {
    let grammar = ordered_left_recursive_arithmetic();
    let code = Code::new(b"n+n+n");
    let session = Session::open(&grammar, &code, Assignment::new());
    let report = session.parse();
    assert!(report.outcome.is_ok());
    let roots = report.forest().unwrap();
    assert_eq!(roots.len(), 1);
}

/// Scenario 1: a right-recursive-looking but left-folded iteration sugar
/// collapses `aaa` into one root with three flattened leaves.
#[test]
fn iteration_sugar_flattens_to_sibling_leaves() {
    let mut builder = GrammarBuilder::new();
    builder.declare_terminal("a", "a", Condition::True, false, vec![], vec![], false);
    builder.declare_non_terminal(
        "S",
        true,
        Condition::True,
        vec![AlternativeSpec {
            symbols: vec![
                SymbolSpec::Terminal("a".to_string()),
                SymbolSpec::Iteration {
                    inner: Box::new(SymbolSpec::Terminal("a".to_string())),
                    left_fold: true,
                },
            ],
            condition: Condition::True,
            separator_before: None,
        }],
    );
    let grammar = builder.build().unwrap();
    let code = Code::new(b"aaa");
    let session = Session::open(&grammar, &code, Assignment::new());
    let report = session.parse();
    assert!(report.outcome.is_ok());
    assert_eq!(report.forest().unwrap().len(), 1);
    let ast = report.ast().unwrap();
    assert_eq!(ast.len(), 1);
}

/// Scenario 3: a lexical-dialect keyword shadows the identifier terminal it
/// specializes only when its guard condition holds.
#[test]
fn conditional_keyword_wins_over_identifier_only_under_its_guard() {
    let mut builder = GrammarBuilder::new();
    builder.declare_terminal(
        "Id",
        "[A-Za-z]+",
        Condition::True,
        false,
        vec![],
        vec![],
        false,
    );
    builder.declare_condition("lexical");
    builder.declare_terminal(
        "Kw",
        "if",
        Condition::atom("lexical"),
        false,
        vec!["Id".to_string()],
        vec![],
        false,
    );
    builder.declare_non_terminal(
        "S",
        true,
        Condition::True,
        vec![AlternativeSpec {
            symbols: vec![SymbolSpec::Terminal("Id".to_string())],
            condition: Condition::True,
            separator_before: None,
        }],
    );
    let grammar = builder.build().unwrap();

    let code = Code::new(b"if");
    let mut sigma = Assignment::new();
    sigma.set("lexical", true);
    let lexical_session = Session::open(&grammar, &code, sigma);
    let lexical_report = lexical_session.parse();
    assert!(lexical_report.outcome.is_err());

    let plain_session = Session::open(&grammar, &code, Assignment::new());
    let plain_report = plain_session.parse();
    assert!(plain_report.outcome.is_ok());
}

/// Scenario 6: the farthest-position error names the terminal(s) still
/// expected at the point parsing actually got stuck.
#[test]
fn farthest_error_names_expected_terminal() {
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
        Err(aether_engine::error::SessionError::Syntactic(err)) => {
            assert_eq!(err.farthest_position, 2);
            assert_eq!(err.expected_terminals, vec!["c".to_string()]);
        }
        other => panic!("expected a syntactic error, got ok = {}", other.is_ok()),
    }
}

/// The meta-language front end loads its own bootstrap grammar, parses a
/// small grammar written in that surface syntax, and the resulting
/// `GrammarIr` parses source exactly as the hand-built equivalent would.
#[test]
fn meta_parsed_grammar_parses_like_its_hand_built_equivalent() {
    let source = r#"S(start): "a" {/"a"};"#;
    let grammar = aether_engine::meta::parse_grammar_source(source).unwrap();
    let code = Code::new(b"aaaa");
    let session = Session::open(&grammar, &code, Assignment::new());
    let report = session.parse();
    assert!(report.outcome.is_ok());
    let ast = report.ast().unwrap();
    assert_eq!(ast.len(), 1);
}
