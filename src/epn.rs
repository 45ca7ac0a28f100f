//! The EPN (explicit-parent-notification) driver: generalized recursive
//! descent that produces a BSR forest for arbitrarily ambiguous,
//! left-recursive grammars in worst-case cubic time.
//!
//! Three tables exist conceptually here: `P`, the popped set of
//! completed `(non_terminal, start) -> {end}` derivations; `Y`, the BSR set;
//! and `U`, the pending work. spec.md §9 requires `U` to be realized as an
//! explicit work-queue of `(slot, start, parent_continuation)` records
//! rather than native call-stack recursion, because the call stack must not
//! carry parse state across memoized returns, and because a recursive
//! formulation's native stack depth would otherwise scale with input length
//! — a long valid input to a self-recursive grammar would overflow the
//! stack and abort the process. [`Epn::run`] drives a single flat loop over
//! an explicit [`Frame`] stack (`U`, heap-allocated, bounded only by
//! available memory, never by the Rust call stack) instead of recursing:
//! every place the informal algorithm in spec.md §4.4 would call itself is
//! a pushed `Frame` here, and every place it would receive a callee's
//! return value is a pop off the `results` value stack sitting next to it.
use crate::bsr::{Bsr, BsrSet, Slot};
use crate::condition::{Assignment, ConditionCache};
use crate::error::{LexicalError, SyntacticError};
use crate::grammar::{GrammarIr, NonTerminalId, Origin, Symbol};
use crate::lexer::Lexer;
use crate::util::Log;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

/// Cooperative cancel flag shared with [`crate::session::Session`]. Checked
/// at every `U`-pop, the unit of work this driver processes one at a time.
pub type CancelFlag = Rc<Cell<bool>>;

enum EntryStatus {
    InProgress,
}

/// One unit of pending work on the explicit `U` stack. Each variant
/// corresponds either to a call of the informal recursive algorithm in
/// spec.md §4.4, or to the point just after one of its calls returns;
/// together they defunctionalize that algorithm's call graph onto the heap
/// instead of the native call stack.
enum Frame {
    /// Begin or resume deriving `nt` from `start`: `derive_non_terminal`,
    /// entered once per distinct `(nt, start)`.
    NonTerminal { nt: NonTerminalId, start: usize },
    /// One round of `nt`'s seed-and-grow loop has produced a fresh `computed`
    /// set (on `results`); merge it into the growing set and either loop
    /// again or finalize.
    NonTerminalLoop { nt: NonTerminalId, start: usize },
    /// `derive_alternatives`: drive alternative `alt_idx` of `nt` onward,
    /// accumulating `acc`. Never expects a value on `results` — alternatives
    /// already handled (condition false, empty symbols) are folded into
    /// `acc` before moving on.
    Alternatives {
        nt: NonTerminalId,
        start: usize,
        alt_idx: usize,
        acc: BTreeSet<usize>,
    },
    /// Resume `Alternatives` after the `FromDot` pushed for `alt_idx`
    /// completes (consumes one value off `results`), then moves on to
    /// `alt_idx + 1`.
    AlternativesResume {
        nt: NonTerminalId,
        start: usize,
        alt_idx: usize,
        acc: BTreeSet<usize>,
    },
    /// `derive_from_dot`: extend alternative `alt_idx` of `nt` from dot
    /// position `dot`, having started the whole alternative at `i` and
    /// currently standing at source position `k`.
    FromDot {
        nt: NonTerminalId,
        alt_idx: usize,
        dot: usize,
        i: usize,
        k: usize,
    },
    /// Resume `FromDot` once the symbol at `dot` (a non-terminal) has
    /// produced its end-position set on `results`.
    FromDotSymbolResume {
        nt: NonTerminalId,
        alt_idx: usize,
        dot: usize,
        i: usize,
        k: usize,
    },
    /// Fold the symbol's end positions (`remaining`, stored so `pop` walks
    /// them in ascending order) one at a time into `acc`, recursing into
    /// `FromDot` at `dot + 1` for each and inserting the matching BSR
    /// element first.
    FromDotBranch {
        nt: NonTerminalId,
        alt_idx: usize,
        dot: usize,
        i: usize,
        k: usize,
        remaining: Vec<usize>,
        acc: BTreeSet<usize>,
    },
    /// Resume `FromDotBranch` after the `FromDot { dot: dot + 1, .. }` push
    /// for one branch value completes (consumes one value off `results`).
    FromDotBranchResume {
        nt: NonTerminalId,
        alt_idx: usize,
        dot: usize,
        i: usize,
        k: usize,
        remaining: Vec<usize>,
        acc: BTreeSet<usize>,
    },
}

pub struct Epn<'g, 'c> {
    grammar: &'g GrammarIr,
    lexer: &'g Lexer<'g, 'c>,
    sigma: Assignment,
    conditions: ConditionCache,
    bsr: BsrSet,
    popped: HashMap<(NonTerminalId, usize), BTreeSet<usize>>,
    growing: HashMap<(NonTerminalId, usize), BTreeSet<usize>>,
    status: HashMap<(NonTerminalId, usize), EntryStatus>,
    farthest: usize,
    farthest_expected: HashSet<String>,
    cancel: CancelFlag,
    cancelled_mid_parse: bool,
    source_len: usize,
    debug: Log<&'static str>,
}

/// Everything a successful or partial parse attempt produced.
pub struct EpnResult {
    pub bsr: BsrSet,
    pub succeeded: bool,
    pub cancelled: bool,
}

impl<'g, 'c> Epn<'g, 'c> {
    pub fn new(
        grammar: &'g GrammarIr,
        lexer: &'g Lexer<'g, 'c>,
        sigma: Assignment,
        cancel: CancelFlag,
        source_len: usize,
    ) -> Self {
        Self {
            grammar,
            lexer,
            sigma,
            conditions: ConditionCache::new(),
            bsr: BsrSet::new(),
            popped: HashMap::new(),
            growing: HashMap::new(),
            status: HashMap::new(),
            farthest: 0,
            farthest_expected: HashSet::new(),
            cancel,
            cancelled_mid_parse: false,
            source_len,
            debug: Log::None,
        }
    }

    /// Attaches a debug trace level, printing `[EPN; ...]` lines under
    /// `#[cfg(debug_assertions)]` as non-terminal descents pop.
    pub fn with_debug(mut self, level: Log<&'static str>) -> Self {
        self.debug = level;
        self
    }

    /// Drives the whole parse from the grammar's start symbol and returns the
    /// completed BSR set plus whether a full-span derivation was found.
    ///
    /// Implemented as a single flat loop over an explicit `Vec<Frame>` work
    /// stack (`U`) and a companion `Vec<BTreeSet<usize>>` value stack
    /// (`results`) standing in for call-return values; the Rust call stack
    /// underneath this function never grows with the size of the grammar or
    /// the input, only the heap-allocated `stack`/`results` vectors do.
    pub fn run(mut self) -> Result<EpnResult, SyntacticError> {
        let start_nt = self.grammar.start;
        let mut stack: Vec<Frame> = vec![Frame::NonTerminal {
            nt: start_nt,
            start: 0,
        }];
        let mut results: Vec<BTreeSet<usize>> = Vec::new();

        while let Some(frame) = stack.pop() {
            if self.cancel.get() {
                self.cancelled_mid_parse = true;
                break;
            }
            self.step(frame, &mut stack, &mut results);
        }

        let succeeded = !self.cancelled_mid_parse
            && self
                .popped
                .get(&(start_nt, 0))
                .map(|ends| ends.contains(&self.source_len))
                .unwrap_or(false);

        if self.cancelled_mid_parse {
            return Ok(EpnResult {
                bsr: self.bsr,
                succeeded: false,
                cancelled: true,
            });
        }
        if succeeded {
            Ok(EpnResult {
                bsr: self.bsr,
                succeeded: true,
                cancelled: false,
            })
        } else {
            let mut expected: Vec<String> = self.farthest_expected.iter().cloned().collect();
            expected.sort();
            Err(SyntacticError::new(self.farthest, expected))
        }
    }

    fn record_expectation(&mut self, position: usize, terminal_name: &str) {
        match position.cmp(&self.farthest) {
            std::cmp::Ordering::Greater => {
                self.farthest = position;
                self.farthest_expected.clear();
                self.farthest_expected.insert(terminal_name.to_string());
            }
            std::cmp::Ordering::Equal => {
                self.farthest_expected.insert(terminal_name.to_string());
            }
            std::cmp::Ordering::Less => {}
        }
    }

    /// Processes one `Frame` popped off `U`, pushing whatever follow-up
    /// frames it implies onto `stack` and/or a value onto `results` for
    /// whichever frame beneath it is waiting to consume it. Never recurses
    /// into itself or into another call that could nest as deeply as the
    /// input is long — every transition either returns directly or pushes
    /// onto `stack` for a later iteration of the `run` loop to pick up.
    fn step(&mut self, frame: Frame, stack: &mut Vec<Frame>, results: &mut Vec<BTreeSet<usize>>) {
        match frame {
            Frame::NonTerminal { nt, start } => {
                let key = (nt, start);
                if let Some(ends) = self.popped.get(&key) {
                    results.push(ends.clone());
                    return;
                }
                if matches!(self.status.get(&key), Some(EntryStatus::InProgress)) {
                    // Self-recursive reentry at the same start: hand back a
                    // snapshot of what the enclosing derivation has grown so
                    // far, exactly as the informal seed-and-grow algorithm
                    // does when it finds itself already in progress.
                    results.push(self.growing.get(&key).cloned().unwrap_or_default());
                    return;
                }
                self.status.insert(key, EntryStatus::InProgress);
                self.growing.entry(key).or_default();
                stack.push(Frame::NonTerminalLoop { nt, start });
                stack.push(Frame::Alternatives {
                    nt,
                    start,
                    alt_idx: 0,
                    acc: BTreeSet::new(),
                });
            }
            Frame::NonTerminalLoop { nt, start } => {
                let computed = results.pop().expect("Alternatives always yields a result");
                let key = (nt, start);
                let before = self.growing.get(&key).cloned().unwrap_or_default();
                let mut merged = before.clone();
                merged.extend(computed);
                if merged == before {
                    let mut result = self.growing.remove(&key).unwrap_or_default();
                    self.status.remove(&key);

                    // Iteration sugar (`{X}`/`{/X}`) desugars to a
                    // synthesized non-terminal whose every alternative just
                    // tries to consume one more repetition; left to itself
                    // that collapses into genuine ambiguity over how many
                    // repetitions were taken. Only the longest repeat count
                    // is a valid parse of the sugar, so keep just the
                    // maximum end here rather than threading that
                    // distinction through forest reconstruction.
                    if let Origin::Synthesized(Some(_)) = self.grammar.non_terminal(nt).origin {
                        if let Some(&longest) = result.iter().max() {
                            result = BTreeSet::from([longest]);
                        }
                    }

                    let ends_vec: Vec<usize> = result.iter().copied().collect();
                    self.debug.trace_pop(
                        &self.grammar.non_terminal(nt).name,
                        start,
                        &ends_vec,
                        self.lexer.code(),
                    );
                    self.popped.insert(key, result.clone());
                    results.push(result);
                } else {
                    self.growing.insert(key, merged);
                    stack.push(Frame::NonTerminalLoop { nt, start });
                    stack.push(Frame::Alternatives {
                        nt,
                        start,
                        alt_idx: 0,
                        acc: BTreeSet::new(),
                    });
                }
            }
            Frame::Alternatives {
                nt,
                start,
                alt_idx,
                mut acc,
            } => {
                let definition = self.grammar.non_terminal(nt);
                if !self
                    .conditions
                    .evaluate(&definition.condition, nt.0, &self.sigma)
                {
                    results.push(BTreeSet::new());
                    return;
                }
                if alt_idx == definition.alternatives.len() {
                    results.push(acc);
                    return;
                }
                let condition_id = (nt.0 + 1) * 100_000 + alt_idx;
                let alternative = &definition.alternatives[alt_idx];
                if !self
                    .conditions
                    .evaluate(&alternative.condition, condition_id, &self.sigma)
                {
                    stack.push(Frame::Alternatives {
                        nt,
                        start,
                        alt_idx: alt_idx + 1,
                        acc,
                    });
                    return;
                }
                if alternative.symbols.is_empty() {
                    self.bsr.mark_empty(nt, alt_idx, start);
                    acc.insert(start);
                    stack.push(Frame::Alternatives {
                        nt,
                        start,
                        alt_idx: alt_idx + 1,
                        acc,
                    });
                    return;
                }
                stack.push(Frame::AlternativesResume {
                    nt,
                    start,
                    alt_idx,
                    acc,
                });
                stack.push(Frame::FromDot {
                    nt,
                    alt_idx,
                    dot: 0,
                    i: start,
                    k: start,
                });
            }
            Frame::AlternativesResume {
                nt,
                start,
                alt_idx,
                mut acc,
            } => {
                let prev = results
                    .pop()
                    .expect("FromDot always yields a result before an AlternativesResume");
                acc.extend(prev);
                stack.push(Frame::Alternatives {
                    nt,
                    start,
                    alt_idx: alt_idx + 1,
                    acc,
                });
            }
            Frame::FromDot {
                nt,
                alt_idx,
                dot,
                i,
                k,
            } => {
                let symbols = &self.grammar.non_terminal(nt).alternatives[alt_idx].symbols;
                if dot == symbols.len() {
                    results.push(BTreeSet::from([k]));
                    return;
                }
                match symbols[dot] {
                    Symbol::Terminal(terminal_id) => {
                        let matches = match self.lexer.lex(k) {
                            Ok(tokens) => {
                                let matches: BTreeSet<usize> = tokens
                                    .iter()
                                    .filter(|token| token.terminal == terminal_id)
                                    .map(|token| token.end)
                                    .collect();
                                if matches.is_empty() {
                                    let name = self.grammar.terminals.get(terminal_id).name.clone();
                                    self.record_expectation(k, &name);
                                }
                                matches
                            }
                            Err(LexicalError { position }) => {
                                let name = self.grammar.terminals.get(terminal_id).name.clone();
                                self.record_expectation(position, &name);
                                BTreeSet::new()
                            }
                        };
                        stack.push(Frame::FromDotBranch {
                            nt,
                            alt_idx,
                            dot,
                            i,
                            k,
                            remaining: matches.into_iter().rev().collect(),
                            acc: BTreeSet::new(),
                        });
                    }
                    Symbol::NonTerminal(child) => {
                        stack.push(Frame::FromDotSymbolResume {
                            nt,
                            alt_idx,
                            dot,
                            i,
                            k,
                        });
                        stack.push(Frame::NonTerminal { nt: child, start: k });
                    }
                }
            }
            Frame::FromDotSymbolResume {
                nt,
                alt_idx,
                dot,
                i,
                k,
            } => {
                let child_ends = results
                    .pop()
                    .expect("NonTerminal always yields a result before a FromDotSymbolResume");
                stack.push(Frame::FromDotBranch {
                    nt,
                    alt_idx,
                    dot,
                    i,
                    k,
                    // `splits_at`/downstream consumers don't depend on
                    // iteration order, but walking ascending (via `pop` off
                    // a reversed vec) mirrors the original recursive walk.
                    remaining: child_ends.into_iter().rev().collect(),
                    acc: BTreeSet::new(),
                });
            }
            Frame::FromDotBranch {
                nt,
                alt_idx,
                dot,
                i,
                k,
                mut remaining,
                acc,
            } => match remaining.pop() {
                None => results.push(acc),
                Some(j) => {
                    let symbols_len = self.grammar.non_terminal(nt).alternatives[alt_idx]
                        .symbols
                        .len();
                    let slot = Slot {
                        non_terminal: nt,
                        alternative: alt_idx,
                        dot: dot + 1,
                    };
                    self.bsr.insert(Bsr { slot, i, k, j }, dot + 1 == symbols_len);
                    stack.push(Frame::FromDotBranchResume {
                        nt,
                        alt_idx,
                        dot,
                        i,
                        k,
                        remaining,
                        acc,
                    });
                    stack.push(Frame::FromDot {
                        nt,
                        alt_idx,
                        dot: dot + 1,
                        i,
                        k: j,
                    });
                }
            },
            Frame::FromDotBranchResume {
                nt,
                alt_idx,
                dot,
                i,
                k,
                remaining,
                mut acc,
            } => {
                let extended = results
                    .pop()
                    .expect("FromDot always yields a result before a FromDotBranchResume");
                acc.extend(extended);
                stack.push(Frame::FromDotBranch {
                    nt,
                    alt_idx,
                    dot,
                    i,
                    k,
                    remaining,
                    acc,
                });
            }
        }
    }
}
