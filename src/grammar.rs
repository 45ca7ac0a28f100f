//! The non-terminal table plus the grammar-IR construction
//! path:
//! turning declared terminals/non-terminals, guards and specifiers into the
//! resolved tables the rest of the engine consults in O(1).
use crate::condition::{validate_against_universe, Condition};
use crate::error::GrammarLoadError;
use crate::regex;
use crate::terminal::{Terminal, TerminalId, TerminalTable};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonTerminalId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(TerminalId),
    NonTerminal(NonTerminalId),
}

/// Whether a synthesized non-terminal came from `{X}`/`{/X}` iteration
/// sugar, kept as a tag for downstream consumers (resolves the fold-direction
/// open question; see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationKind {
    RightFold,
    LeftFold,
}

/// Whether a synthesized or user-written non-terminal is an ordinary grammar
/// production, or one the grammar builder introduced while desugaring
/// iteration/optional/quantifier sugar. Synthesized non-terminals are always
/// inlined by the AST builder and never surface as their own tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Declared,
    Synthesized(Option<IterationKind>),
}

/// Separator preceding an alternative in the source alternative list.
/// `None` marks the first alternative. Consecutive `Ordered`-linked
/// alternatives form one ordered-choice run; `Ambiguous`
/// separates runs that stay genuinely ambiguous with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Ordered,
    Ambiguous,
}

pub struct Alternative {
    pub symbols: Vec<Symbol>,
    pub condition: Condition,
    pub separator_before: Option<Separator>,
}

pub struct NonTerminal {
    pub name: String,
    pub is_start: bool,
    pub condition: Condition,
    pub alternatives: Vec<Alternative>,
    pub origin: Origin,
}

/// The resolved grammar IR the EPN driver and lexer consult. Built
/// once from a [`GrammarBuilder`] and shared read-only across a session.
pub struct GrammarIr {
    pub terminals: TerminalTable,
    pub non_terminals: Vec<NonTerminal>,
    name_to_non_terminal: HashMap<String, NonTerminalId>,
    pub start: NonTerminalId,
}

impl GrammarIr {
    pub fn non_terminal(&self, id: NonTerminalId) -> &NonTerminal {
        &self.non_terminals[id.0]
    }

    pub fn non_terminal_id(&self, name: &str) -> Option<NonTerminalId> {
        self.name_to_non_terminal.get(name).copied()
    }
}

/// Grammar-level symbol sugar, accepted by [`GrammarBuilder`] before
/// desugaring.
#[derive(Debug, Clone)]
pub enum SymbolSpec {
    Terminal(String),
    NonTerminal(String),
    /// `{X}` (right fold) or `{/X}` (left fold).
    Iteration { inner: Box<SymbolSpec>, left_fold: bool },
    /// `[X]` (ambiguous) or `[/X]` (ordered, present preferred).
    Optional { inner: Box<SymbolSpec>, ordered: bool },
    /// `*`, `+`, `?`, `{m}`, `{m,}`, `{m,n}`.
    Quantified {
        inner: Box<SymbolSpec>,
        min: u32,
        max: Option<u32>,
    },
}

pub struct AlternativeSpec {
    pub symbols: Vec<SymbolSpec>,
    pub condition: Condition,
    pub separator_before: Option<Separator>,
}

struct TerminalDecl {
    name: String,
    pattern: String,
    condition: Condition,
    ignorable: bool,
    includes: Vec<String>,
    excludes: Vec<String>,
    punctuation: bool,
}

struct NonTerminalDecl {
    name: String,
    is_start: bool,
    condition: Condition,
    alternatives: Vec<AlternativeSpec>,
}

/// Accumulates terminal/non-terminal declarations and lowers them into a
/// [`GrammarIr`], surfacing any validation failure as a `GrammarLoadError`.
#[derive(Default)]
pub struct GrammarBuilder {
    conditions: HashSet<String>,
    terminals: Vec<TerminalDecl>,
    non_terminals: Vec<NonTerminalDecl>,
    synthetic_counter: usize,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_condition(&mut self, name: impl Into<String>) -> &mut Self {
        self.conditions.insert(name.into());
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn declare_terminal(
        &mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        condition: Condition,
        ignorable: bool,
        includes: Vec<String>,
        excludes: Vec<String>,
        punctuation: bool,
    ) -> &mut Self {
        self.terminals.push(TerminalDecl {
            name: name.into(),
            pattern: pattern.into(),
            condition,
            ignorable,
            includes,
            excludes,
            punctuation,
        });
        self
    }

    pub fn declare_non_terminal(
        &mut self,
        name: impl Into<String>,
        is_start: bool,
        condition: Condition,
        alternatives: Vec<AlternativeSpec>,
    ) -> &mut Self {
        self.non_terminals.push(NonTerminalDecl {
            name: name.into(),
            is_start,
            condition,
            alternatives,
        });
        self
    }

    pub fn build(mut self) -> Result<GrammarIr, GrammarLoadError> {
        for terminal in &self.terminals {
            validate_against_universe(&terminal.condition, &self.conditions)?;
        }
        for nt in &self.non_terminals {
            validate_against_universe(&nt.condition, &self.conditions)?;
            for alt in &nt.alternatives {
                validate_against_universe(&alt.condition, &self.conditions)?;
            }
        }

        let terminal_names: HashSet<String> =
            self.terminals.iter().map(|t| t.name.clone()).collect();
        let non_terminal_names: HashSet<String> =
            self.non_terminals.iter().map(|n| n.name.clone()).collect();

        let terminals = self
            .terminals
            .into_iter()
            .map(|decl| {
                let nfa = regex::compile(&decl.pattern, 0, &decl.name)?;
                Ok(Terminal {
                    name: decl.name,
                    nfa,
                    condition: decl.condition,
                    ignorable: decl.ignorable,
                    includes: decl.includes,
                    excludes: decl.excludes,
                    punctuation: decl.punctuation,
                })
            })
            .collect::<Result<Vec<_>, GrammarLoadError>>()?;
        let terminals = TerminalTable::build(terminals)?;

        let mut name_to_non_terminal: HashMap<String, NonTerminalId> = self
            .non_terminals
            .iter()
            .enumerate()
            .map(|(idx, nt)| (nt.name.clone(), NonTerminalId(idx)))
            .collect();

        let mut non_terminals: Vec<NonTerminal> = self
            .non_terminals
            .iter()
            .map(|decl| NonTerminal {
                name: decl.name.clone(),
                is_start: decl.is_start,
                condition: decl.condition.clone(),
                alternatives: Vec::new(),
                origin: Origin::Declared,
            })
            .collect();

        let declared_specs: Vec<Vec<AlternativeSpec>> = self
            .non_terminals
            .into_iter()
            .map(|decl| decl.alternatives)
            .collect();

        for (idx, alt_specs) in declared_specs.into_iter().enumerate() {
            let resolved = alt_specs
                .into_iter()
                .map(|spec| {
                    let symbols = spec
                        .symbols
                        .into_iter()
                        .map(|symbol_spec| {
                            desugar_symbol(
                                symbol_spec,
                                &terminals,
                                &terminal_names,
                                &non_terminal_names,
                                &mut name_to_non_terminal,
                                &mut non_terminals,
                                &mut self.synthetic_counter,
                            )
                        })
                        .collect::<Result<Vec<Vec<Symbol>>, GrammarLoadError>>()?
                        .into_iter()
                        .flatten()
                        .collect();
                    Ok(Alternative {
                        symbols,
                        condition: spec.condition,
                        separator_before: spec.separator_before,
                    })
                })
                .collect::<Result<Vec<Alternative>, GrammarLoadError>>()?;
            non_terminals[idx].alternatives = resolved;
        }

        let mut start: Option<NonTerminalId> = None;
        for (idx, nt) in non_terminals.iter().enumerate() {
            if nt.is_start {
                if let Some(existing) = start {
                    return Err(GrammarLoadError::MultipleStartSymbols(
                        non_terminals[existing.0].name.clone(),
                        nt.name.clone(),
                    ));
                }
                start = Some(NonTerminalId(idx));
            }
        }
        let start = start.ok_or(GrammarLoadError::NoStartSymbol)?;

        Ok(GrammarIr {
            terminals,
            non_terminals,
            name_to_non_terminal,
            start,
        })
    }
}

/// Lowers one `SymbolSpec` into the flat list of [`Symbol`]s it splices into
/// its alternative, synthesizing fresh non-terminals for iteration, optional
/// and quantifier sugar.
fn desugar_symbol(
    spec: SymbolSpec,
    terminals: &TerminalTable,
    terminal_names: &HashSet<String>,
    non_terminal_names: &HashSet<String>,
    name_to_non_terminal: &mut HashMap<String, NonTerminalId>,
    non_terminals: &mut Vec<NonTerminal>,
    synthetic_counter: &mut usize,
) -> Result<Vec<Symbol>, GrammarLoadError> {
    match spec {
        SymbolSpec::Terminal(name) => {
            if !terminal_names.contains(&name) {
                return Err(GrammarLoadError::UndefinedTerminal(name));
            }
            let id = terminals
                .id_of(&name)
                .ok_or(GrammarLoadError::UndefinedTerminal(name))?;
            Ok(vec![Symbol::Terminal(id)])
        }
        SymbolSpec::NonTerminal(name) => {
            if !non_terminal_names.contains(&name) {
                return Err(GrammarLoadError::UndefinedNonTerminal(name));
            }
            let id = *name_to_non_terminal
                .get(&name)
                .ok_or(GrammarLoadError::UndefinedNonTerminal(name))?;
            Ok(vec![Symbol::NonTerminal(id)])
        }
        SymbolSpec::Iteration { inner, left_fold } => {
            let single = as_single_symbol(
                *inner,
                terminals,
                terminal_names,
                non_terminal_names,
                name_to_non_terminal,
                non_terminals,
                synthetic_counter,
            )?;
            let kind = if left_fold {
                IterationKind::LeftFold
            } else {
                IterationKind::RightFold
            };
            let id = fresh_non_terminal(synthetic_counter, non_terminals, Origin::Synthesized(Some(kind)));
            // N$iterK: X N$iterK | ;
            non_terminals[id.0].alternatives = vec![
                Alternative {
                    symbols: vec![single, Symbol::NonTerminal(id)],
                    condition: Condition::True,
                    separator_before: None,
                },
                Alternative {
                    symbols: vec![],
                    condition: Condition::True,
                    separator_before: Some(Separator::Ambiguous),
                },
            ];
            Ok(vec![Symbol::NonTerminal(id)])
        }
        SymbolSpec::Optional { inner, ordered } => {
            let single = as_single_symbol(
                *inner,
                terminals,
                terminal_names,
                non_terminal_names,
                name_to_non_terminal,
                non_terminals,
                synthetic_counter,
            )?;
            let id = fresh_non_terminal(synthetic_counter, non_terminals, Origin::Synthesized(None));
            let separator = if ordered {
                Separator::Ordered
            } else {
                Separator::Ambiguous
            };
            non_terminals[id.0].alternatives = vec![
                Alternative {
                    symbols: vec![single],
                    condition: Condition::True,
                    separator_before: None,
                },
                Alternative {
                    symbols: vec![],
                    condition: Condition::True,
                    separator_before: Some(separator),
                },
            ];
            Ok(vec![Symbol::NonTerminal(id)])
        }
        SymbolSpec::Quantified { inner, min, max } => desugar_quantified(
            *inner,
            min,
            max,
            terminals,
            terminal_names,
            non_terminal_names,
            name_to_non_terminal,
            non_terminals,
            synthetic_counter,
        ),
    }
}

fn desugar_quantified(
    inner: SymbolSpec,
    min: u32,
    max: Option<u32>,
    terminals: &TerminalTable,
    terminal_names: &HashSet<String>,
    non_terminal_names: &HashSet<String>,
    name_to_non_terminal: &mut HashMap<String, NonTerminalId>,
    non_terminals: &mut Vec<NonTerminal>,
    synthetic_counter: &mut usize,
) -> Result<Vec<Symbol>, GrammarLoadError> {
    match max {
        None if min == 0 => desugar_symbol(
            SymbolSpec::Iteration {
                inner: Box::new(inner),
                left_fold: false,
            },
            terminals,
            terminal_names,
            non_terminal_names,
            name_to_non_terminal,
            non_terminals,
            synthetic_counter,
        ),
        None => {
            let mut symbols = Vec::new();
            for _ in 0..min {
                symbols.extend(desugar_symbol(
                    inner.clone(),
                    terminals,
                    terminal_names,
                    non_terminal_names,
                    name_to_non_terminal,
                    non_terminals,
                    synthetic_counter,
                )?);
            }
            symbols.extend(desugar_symbol(
                SymbolSpec::Iteration {
                    inner: Box::new(inner),
                    left_fold: false,
                },
                terminals,
                terminal_names,
                non_terminal_names,
                name_to_non_terminal,
                non_terminals,
                synthetic_counter,
            )?);
            Ok(symbols)
        }
        Some(max) => {
            let mut symbols = Vec::new();
            for _ in 0..min {
                symbols.extend(desugar_symbol(
                    inner.clone(),
                    terminals,
                    terminal_names,
                    non_terminal_names,
                    name_to_non_terminal,
                    non_terminals,
                    synthetic_counter,
                )?);
            }
            let tail = synth_bounded_tail(
                inner,
                max.saturating_sub(min),
                terminals,
                terminal_names,
                non_terminal_names,
                name_to_non_terminal,
                non_terminals,
                synthetic_counter,
            )?;
            if let Some(tail) = tail {
                symbols.push(Symbol::NonTerminal(tail));
            }
            Ok(symbols)
        }
    }
}

/// Nested optional wrapper for the `(max - min)` trailing optional copies of
/// a bounded quantifier, mirroring [`crate::regex::nfa`]'s bounded-repeat
/// construction at the grammar level.
fn synth_bounded_tail(
    inner: SymbolSpec,
    remaining: u32,
    terminals: &TerminalTable,
    terminal_names: &HashSet<String>,
    non_terminal_names: &HashSet<String>,
    name_to_non_terminal: &mut HashMap<String, NonTerminalId>,
    non_terminals: &mut Vec<NonTerminal>,
    synthetic_counter: &mut usize,
) -> Result<Option<NonTerminalId>, GrammarLoadError> {
    if remaining == 0 {
        return Ok(None);
    }
    let next = synth_bounded_tail(
        inner.clone(),
        remaining - 1,
        terminals,
        terminal_names,
        non_terminal_names,
        name_to_non_terminal,
        non_terminals,
        synthetic_counter,
    )?;
    let single = as_single_symbol(
        inner,
        terminals,
        terminal_names,
        non_terminal_names,
        name_to_non_terminal,
        non_terminals,
        synthetic_counter,
    )?;
    let id = fresh_non_terminal(synthetic_counter, non_terminals, Origin::Synthesized(None));
    let mut present = vec![single];
    if let Some(next_id) = next {
        present.push(Symbol::NonTerminal(next_id));
    }
    non_terminals[id.0].alternatives = vec![
        Alternative {
            symbols: present,
            condition: Condition::True,
            separator_before: None,
        },
        Alternative {
            symbols: vec![],
            condition: Condition::True,
            separator_before: Some(Separator::Ambiguous),
        },
    ];
    Ok(Some(id))
}

/// Desugars `spec` and, if it produced more than one symbol, wraps those
/// symbols in a single-alternative synthetic non-terminal so that callers
/// needing exactly one symbol reference (iteration/optional bodies) always
/// get one.
#[allow(clippy::too_many_arguments)]
fn as_single_symbol(
    spec: SymbolSpec,
    terminals: &TerminalTable,
    terminal_names: &HashSet<String>,
    non_terminal_names: &HashSet<String>,
    name_to_non_terminal: &mut HashMap<String, NonTerminalId>,
    non_terminals: &mut Vec<NonTerminal>,
    synthetic_counter: &mut usize,
) -> Result<Symbol, GrammarLoadError> {
    let mut symbols = desugar_symbol(
        spec,
        terminals,
        terminal_names,
        non_terminal_names,
        name_to_non_terminal,
        non_terminals,
        synthetic_counter,
    )?;
    if symbols.len() == 1 {
        return Ok(symbols.pop().unwrap());
    }
    let id = fresh_non_terminal(synthetic_counter, non_terminals, Origin::Synthesized(None));
    non_terminals[id.0].alternatives = vec![Alternative {
        symbols,
        condition: Condition::True,
        separator_before: None,
    }];
    Ok(Symbol::NonTerminal(id))
}

fn fresh_non_terminal(
    synthetic_counter: &mut usize,
    non_terminals: &mut Vec<NonTerminal>,
    origin: Origin,
) -> NonTerminalId {
    let id = NonTerminalId(non_terminals.len());
    let name = format!("$synth{}", synthetic_counter);
    *synthetic_counter += 1;
    non_terminals.push(NonTerminal {
        name,
        is_start: false,
        condition: Condition::True,
        alternatives: Vec::new(),
        origin,
    });
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_terminal(
        name: &str,
        pattern: &str,
    ) -> (String, String, Condition, bool, Vec<String>, Vec<String>, bool) {
        (
            name.to_string(),
            pattern.to_string(),
            Condition::True,
            false,
            vec![],
            vec![],
            false,
        )
    }

    #[test]
    fn rejects_multiple_start_symbols() {
        let mut builder = GrammarBuilder::new();
        let (n, p, c, ig, inc, exc, punct) = simple_terminal("a", "a");
        builder.declare_terminal(n, p, c, ig, inc, exc, punct);
        builder.declare_non_terminal(
            "S",
            true,
            Condition::True,
            vec![AlternativeSpec {
                symbols: vec![SymbolSpec::Terminal("a".to_string())],
                condition: Condition::True,
                separator_before: None,
            }],
        );
        builder.declare_non_terminal(
            "T",
            true,
            Condition::True,
            vec![AlternativeSpec {
                symbols: vec![SymbolSpec::Terminal("a".to_string())],
                condition: Condition::True,
                separator_before: None,
            }],
        );
        assert!(matches!(
            builder.build(),
            Err(GrammarLoadError::MultipleStartSymbols(_, _))
        ));
    }

    #[test]
    fn iteration_desugars_to_synthesized_non_terminal() {
        let mut builder = GrammarBuilder::new();
        let (n, p, c, ig, inc, exc, punct) = simple_terminal("a", "a");
        builder.declare_terminal(n, p, c, ig, inc, exc, punct);
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
        let ir = builder.build().unwrap();
        let start = ir.non_terminal(ir.start);
        assert_eq!(start.alternatives.len(), 1);
        assert_eq!(start.alternatives[0].symbols.len(), 2);
        match start.alternatives[0].symbols[1] {
            Symbol::NonTerminal(id) => {
                assert!(matches!(
                    ir.non_terminal(id).origin,
                    Origin::Synthesized(Some(IterationKind::LeftFold))
                ));
            }
            _ => panic!("expected the iteration sugar to desugar to a non-terminal ref"),
        }
    }
}
