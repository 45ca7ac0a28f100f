//! BSR → syntax forest → CST → AST materialization (spec.md §4.5).
//!
//! The BSR set is read back as a binary-branching grammar: for a span
//! `(non_terminal, i, j)` the recorded roots enumerate which alternatives
//! derive it whole, and for a chosen alternative the recorded splits
//! enumerate the middle position `k`, recursively. [`ForestBuilder`]
//! performs that walk once per distinct `(non_terminal, alternative, dot,
//! i, j)` quadruple, applying ordered-choice (`/`) selection along the way;
//! [`build_ast`] then collapses the forest into an [`AstNode`] tree.
use crate::bsr::BsrSet;
use crate::grammar::{GrammarIr, NonTerminal, NonTerminalId, Origin, Separator, Symbol};
use crate::terminal::TerminalId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A node of the (possibly ambiguous) syntax forest extracted from the BSR
/// set. A token leaf, or an internal node spanning a contiguous sub-range.
#[derive(Debug, Clone)]
pub enum SyntaxForest {
    Token {
        terminal: TerminalId,
        start: usize,
        end: usize,
    },
    Node {
        non_terminal: NonTerminalId,
        alternative: usize,
        start: usize,
        end: usize,
        children: Vec<Rc<SyntaxForest>>,
    },
}

impl SyntaxForest {
    pub fn span(&self) -> (usize, usize) {
        match self {
            SyntaxForest::Token { start, end, .. } => (*start, *end),
            SyntaxForest::Node { start, end, .. } => (*start, *end),
        }
    }
}

type NodeCacheKey = (NonTerminalId, usize, usize);
type SeqCacheKey = (NonTerminalId, usize, usize, usize, usize, bool);

/// Walks a [`BsrSet`] lazily, memoizing both "which alternative roots exist
/// at this span" and "which children sequences realize this alternative
/// prefix", so that shared sub-derivations are built (and shared via [`Rc`])
/// exactly once.
pub struct ForestBuilder<'b> {
    bsr: &'b BsrSet,
    grammar: &'b GrammarIr,
    node_cache: RefCell<HashMap<NodeCacheKey, Rc<Vec<Rc<SyntaxForest>>>>>,
    seq_cache: RefCell<HashMap<SeqCacheKey, Rc<Vec<Vec<Rc<SyntaxForest>>>>>>,
}

impl<'b> ForestBuilder<'b> {
    pub fn new(bsr: &'b BsrSet, grammar: &'b GrammarIr) -> Self {
        Self {
            bsr,
            grammar,
            node_cache: RefCell::new(HashMap::new()),
            seq_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Every root node of `non_terminal` spanning `source[i..j]`, after
    /// ordered-choice (`/`) selection among alternatives that separate with
    /// `/` rather than `|`.
    pub fn roots(&self, non_terminal: NonTerminalId, i: usize, j: usize) -> Rc<Vec<Rc<SyntaxForest>>> {
        let key = (non_terminal, i, j);
        if let Some(cached) = self.node_cache.borrow().get(&key) {
            return cached.clone();
        }
        let definition = self.grammar.non_terminal(non_terminal);
        let present = self.bsr.roots_at(non_terminal, i, j);
        let selected = ordered_choice(definition, &present);

        let mut nodes = Vec::new();
        for (alt_idx, greedy) in selected {
            let symbols = &definition.alternatives[alt_idx].symbols;
            if symbols.is_empty() {
                nodes.push(Rc::new(SyntaxForest::Node {
                    non_terminal,
                    alternative: alt_idx,
                    start: i,
                    end: j,
                    children: Vec::new(),
                }));
                continue;
            }
            for children in self
                .sequences(non_terminal, alt_idx, symbols.len(), i, j, greedy)
                .iter()
            {
                nodes.push(Rc::new(SyntaxForest::Node {
                    non_terminal,
                    alternative: alt_idx,
                    start: i,
                    end: j,
                    children: children.clone(),
                }));
            }
        }

        let nodes = Rc::new(nodes);
        self.node_cache.borrow_mut().insert(key, nodes.clone());
        nodes
    }

    /// Every children sequence that realizes symbols `0..dot` of
    /// `alternative` spanning `source[i..j]`, found by recursing on the
    /// binary split recorded at `(non_terminal, alternative, dot, i, j)`.
    ///
    /// `greedy` is set for alternatives chosen via an ordered-choice (`/`)
    /// run of more than one alternative: ordered choice means "resolve to a
    /// single, deterministic parse," which has to reach past alternative
    /// selection into the split points of a left-recursive alternative too,
    /// or genuinely ambiguous splits (e.g. two associativity parses of the
    /// same `E: E "+" E` alternative) would survive untouched. When greedy,
    /// only the largest middle split `k` at each dot is kept, which walks
    /// out the left-associative derivation (the left operand grows as large
    /// as possible before the alternative is allowed to recurse on the
    /// right).
    fn sequences(
        &self,
        non_terminal: NonTerminalId,
        alternative: usize,
        dot: usize,
        i: usize,
        j: usize,
        greedy: bool,
    ) -> Rc<Vec<Vec<Rc<SyntaxForest>>>> {
        let key = (non_terminal, alternative, dot, i, j, greedy);
        if let Some(cached) = self.seq_cache.borrow().get(&key) {
            return cached.clone();
        }
        if dot == 0 {
            let result = Rc::new(vec![Vec::new()]);
            self.seq_cache.borrow_mut().insert(key, result.clone());
            return result;
        }

        let symbol = self.grammar.non_terminal(non_terminal).alternatives[alternative].symbols
            [dot - 1];
        let mut splits = self.bsr.splits_at(non_terminal, alternative, dot, i, j);
        if greedy {
            if let Some(&largest) = splits.last() {
                splits = vec![largest];
            }
        }
        let mut out = Vec::new();
        for k in splits {
            let left_seqs = self.sequences(non_terminal, alternative, dot - 1, i, k, greedy);
            let right_nodes = self.symbol_nodes(symbol, k, j);
            for left in left_seqs.iter() {
                for right in right_nodes.iter() {
                    let mut combined = left.clone();
                    combined.push(right.clone());
                    out.push(combined);
                }
            }
        }

        let result = Rc::new(out);
        self.seq_cache.borrow_mut().insert(key, result.clone());
        result
    }

    fn symbol_nodes(&self, symbol: Symbol, k: usize, j: usize) -> Rc<Vec<Rc<SyntaxForest>>> {
        match symbol {
            Symbol::Terminal(terminal) => Rc::new(vec![Rc::new(SyntaxForest::Token {
                terminal,
                start: k,
                end: j,
            })]),
            Symbol::NonTerminal(child) => self.roots(child, k, j),
        }
    }
}

/// Groups `definition`'s alternatives into ordered-choice runs by
/// `separator_before` (a run boundary is an `Ambiguous` separator) and, for
/// each run, keeps only the earliest-listed alternative present in
/// `present_alts`. Distinct runs stay mutually ambiguous.
///
/// Returns `(alt_idx, greedy)` pairs: `greedy` is set when the winning
/// alternative came from a run joining two or more alternatives with `/` —
/// a run of size one (an alternative that is its own run, whether it was
/// written with `|` or is simply the only member) carries no such
/// "deterministic choice" intent and keeps every split ambiguous.
fn ordered_choice(definition: &NonTerminal, present_alts: &[usize]) -> Vec<(usize, bool)> {
    let present: std::collections::HashSet<usize> = present_alts.iter().copied().collect();
    let mut selected = Vec::new();
    let mut current_run: Vec<usize> = Vec::new();

    let mut flush = |run: &mut Vec<usize>, selected: &mut Vec<(usize, bool)>| {
        if let Some(&first) = run.iter().find(|idx| present.contains(idx)) {
            selected.push((first, run.len() > 1));
        }
        run.clear();
    };

    for (idx, alt) in definition.alternatives.iter().enumerate() {
        match alt.separator_before {
            Some(Separator::Ambiguous) | None => {
                flush(&mut current_run, &mut selected);
                current_run.push(idx);
            }
            Some(Separator::Ordered) => {
                current_run.push(idx);
            }
        }
    }
    flush(&mut current_run, &mut selected);
    selected
}

/// The disambiguated, condition-resolved abstract syntax tree.
/// Synthesized (iteration/optional/quantifier sugar) non-terminals never
/// appear here: their children are spliced directly into their parent.
/// Declared non-terminals whose only surviving child is itself a single
/// node collapse away, keeping the tree free of unary wrapper chains.
#[derive(Debug, Clone)]
pub enum AstNode {
    Leaf {
        terminal: TerminalId,
        start: usize,
        end: usize,
    },
    Node {
        non_terminal: NonTerminalId,
        start: usize,
        end: usize,
        children: Vec<AstNode>,
    },
}

impl AstNode {
    pub fn span(&self) -> (usize, usize) {
        match self {
            AstNode::Leaf { start, end, .. } => (*start, *end),
            AstNode::Node { start, end, .. } => (*start, *end),
        }
    }
}

/// Lowers one forest node into zero or more AST nodes: zero if it is an
/// elided punctuation token, more than one if it is a synthesized
/// non-terminal whose children splice into the caller.
pub fn lower(node: &Rc<SyntaxForest>, grammar: &GrammarIr) -> Vec<AstNode> {
    match node.as_ref() {
        SyntaxForest::Token {
            terminal,
            start,
            end,
        } => {
            if grammar.terminals.get(*terminal).punctuation {
                Vec::new()
            } else {
                vec![AstNode::Leaf {
                    terminal: *terminal,
                    start: *start,
                    end: *end,
                }]
            }
        }
        SyntaxForest::Node {
            non_terminal,
            start,
            end,
            children,
            ..
        } => {
            let lowered_children: Vec<AstNode> =
                children.iter().flat_map(|child| lower(child, grammar)).collect();
            match grammar.non_terminal(*non_terminal).origin {
                Origin::Synthesized(_) => lowered_children,
                Origin::Declared => {
                    if lowered_children.len() == 1 {
                        lowered_children
                    } else {
                        vec![AstNode::Node {
                            non_terminal: *non_terminal,
                            start: *start,
                            end: *end,
                            children: lowered_children,
                        }]
                    }
                }
            }
        }
    }
}

/// Builds every disambiguated AST root for the whole source, one per
/// surviving forest root at `(start_non_terminal, 0, source_len)`.
pub fn build_ast(bsr: &BsrSet, grammar: &GrammarIr, source_len: usize) -> Vec<AstNode> {
    let builder = ForestBuilder::new(bsr, grammar);
    builder
        .roots(grammar.start, 0, source_len)
        .iter()
        .flat_map(|root| lower(root, grammar))
        .collect()
}

/// Pairs an [`AstNode`] with the [`GrammarIr`] it was built from so it can
/// render terminal/non-terminal names instead of bare ids. Produced by
/// [`AstNode::view`]; the only way to print or walk a tree by name.
#[derive(Clone)]
pub struct AstView<'g> {
    node: &'g AstNode,
    grammar: &'g GrammarIr,
}

impl AstNode {
    pub fn view<'g>(&'g self, grammar: &'g GrammarIr) -> AstView<'g> {
        AstView { node: self, grammar }
    }
}

impl<'g> ptree::TreeItem for AstView<'g> {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        match self.node {
            AstNode::Leaf { terminal, start, end } => {
                write!(f, "{} # {}-{}", self.grammar.terminals.get(*terminal).name, start, end)
            }
            AstNode::Node { non_terminal, start, end, .. } => write!(
                f,
                "{} # {}-{}",
                self.grammar.non_terminal(*non_terminal).name,
                start,
                end
            ),
        }
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        match self.node {
            AstNode::Leaf { .. } => std::borrow::Cow::from(Vec::new()),
            AstNode::Node { children, .. } => std::borrow::Cow::from(
                children
                    .iter()
                    .map(|child| child.view(self.grammar))
                    .collect::<Vec<_>>(),
            ),
        }
    }
}

impl<'g> AstView<'g> {
    /// Prints the tree to stdout, mirroring the tree dumps used while
    /// debugging a grammar interactively.
    pub fn print(&self) -> std::io::Result<()> {
        ptree::print_tree(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::grammar::{AlternativeSpec, GrammarBuilder, SymbolSpec};

    fn iteration_grammar() -> GrammarIr {
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
        builder.build().unwrap()
    }

    #[test]
    fn flattens_iteration_into_sibling_leaves() {
        use crate::condition::Assignment;
        use crate::epn::{CancelFlag, Epn};
        use crate::lexer::Lexer;
        use crate::util::Code;
        use std::cell::Cell;
        use std::rc::Rc as StdRc;

        let grammar = iteration_grammar();
        let code = Code::new(b"aaa");
        let lexer = Lexer::new(&grammar.terminals, Assignment::new(), &code);
        let cancel: CancelFlag = StdRc::new(Cell::new(false));
        let epn = Epn::new(&grammar, &lexer, Assignment::new(), cancel, code.value.len());
        let result = epn.run().unwrap();
        assert!(result.succeeded);

        let ast = build_ast(&result.bsr, &grammar, code.value.len());
        assert_eq!(ast.len(), 1);
        match &ast[0] {
            AstNode::Node { children, .. } => assert_eq!(children.len(), 3),
            _ => panic!("expected a single S node with three flattened `a` leaves"),
        }
    }
}
